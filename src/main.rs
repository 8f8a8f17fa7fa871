//! heapdb - inspect and modify heap-file tables from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use heapdb::access::scan::{collect_tuples, Cursor, OpIterator};
use heapdb::access::tuple::Tuple;
use heapdb::database::{Database, DatabaseConfig};
use heapdb::executor::{Aggregate, AggregateOp};
use heapdb::storage::buffer::{EvictionPolicy, DEFAULT_POOL_PAGES};
use heapdb::storage::disk::DEFAULT_PAGE_SIZE;
use log::info;
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Schema file declaring the tables, one `name (field type [pk], ...)` per line
    #[arg(short, long)]
    catalog: PathBuf,

    /// Page size in bytes
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Buffer pool capacity in pages
    #[arg(long, default_value_t = DEFAULT_POOL_PAGES)]
    pool_pages: usize,

    /// Eviction policy: sweep, lru or lru-no-steal
    #[arg(long, default_value_t = EvictionPolicy::Sweep)]
    eviction: EvictionPolicy,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables in the catalog
    Tables,
    /// Print every row of a table
    Scan { table: String },
    /// Insert one row; values are given in column order
    Insert { table: String, values: Vec<String> },
    /// Count the rows of a table
    Count { table: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let db = Database::new(DatabaseConfig {
        page_size: args.page_size,
        pool_pages: args.pool_pages,
        eviction: args.eviction,
    });
    db.load_schema(&args.catalog)
        .with_context(|| format!("failed to load catalog {}", args.catalog.display()))?;

    match args.command {
        Command::Tables => list_tables(&db),
        Command::Scan { table } => scan_table(&db, &table),
        Command::Insert { table, values } => insert_row(&db, &table, &values),
        Command::Count { table } => count_rows(&db, &table),
    }
}

fn list_tables(db: &Database) -> Result<()> {
    let catalog = db.catalog();
    for table_id in catalog.table_ids() {
        let name = catalog.table_name(table_id)?;
        let schema = catalog.schema(table_id)?;
        let file = catalog.database_file(table_id)?;
        println!(
            "{}\t{} pages\t{}",
            name,
            file.num_pages()?,
            schema
        );
    }
    Ok(())
}

fn scan_table(db: &Database, table: &str) -> Result<()> {
    let table_id = db.catalog().table_id(table)?;
    let tid = db.begin();
    let mut scan = db.scan(tid, table_id)?;
    scan.open()?;
    while scan.has_next()? {
        println!("{}", scan.next()?);
    }
    scan.close();
    Ok(())
}

fn insert_row(db: &Database, table: &str, values: &[String]) -> Result<()> {
    let table_id = db.catalog().table_id(table)?;
    let schema = db.catalog().schema(table_id)?;
    if values.len() != schema.len() {
        bail!(
            "table {} has {} columns but {} values were given",
            table,
            schema.len(),
            values.len()
        );
    }

    let mut tuple = Tuple::new(schema.clone());
    for (i, literal) in values.iter().enumerate() {
        let value = schema
            .field_type(i)?
            .parse_value(literal)
            .with_context(|| format!("bad value for column {}", i))?;
        tuple.set_field(i, value)?;
    }

    let tid = db.begin();
    db.buffer_pool().insert_tuple(tid, table_id, &mut tuple)?;
    db.flush()?;
    if let Some(record_id) = tuple.record_id() {
        info!("inserted into {} at {}", table, record_id);
    }
    Ok(())
}

fn count_rows(db: &Database, table: &str) -> Result<()> {
    let table_id = db.catalog().table_id(table)?;
    let tid = db.begin();
    let scan = db.scan(tid, table_id)?;
    let mut count = Cursor::new(Aggregate::new(Box::new(scan), 0, None, AggregateOp::Count)?);
    count.open()?;
    let rows = collect_tuples(&mut count)?;
    count.close();
    match rows.first() {
        Some(row) => println!("{}", row),
        None => println!("0"),
    }
    Ok(())
}
