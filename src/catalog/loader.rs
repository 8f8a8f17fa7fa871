//! Schema-file loading.
//!
//! Each non-blank line declares one table:
//!
//! ```text
//! people (id int pk, name string)
//! ```
//!
//! Types are `int` and `string`; a third word `pk` marks the primary key.
//! The table's heap file is `<name>.dat` next to the schema file.

use super::{Catalog, TableId};
use crate::access::heap::HeapFile;
use crate::access::schema::{Column, Schema};
use crate::access::value::DataType;
use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// One parsed table declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDecl {
    pub name: String,
    pub columns: Vec<(String, DataType)>,
    pub primary_key: Option<String>,
}

impl Catalog {
    /// Registers every table declared in the schema file at `path`, opening
    /// (or creating) their heap files. Returns the new table ids in file order.
    pub fn load_schema(&self, path: &Path, page_size: usize) -> Result<Vec<TableId>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut ids = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let decl = parse_table_decl(line)
                .with_context(|| format!("{}:{}", path.display(), line_no + 1))?;

            let columns = decl
                .columns
                .iter()
                .map(|(name, data_type)| Column::new(Some(name.clone()), *data_type))
                .collect();
            let schema = Arc::new(Schema::from_columns(columns)?);
            let data_path = base.join(format!("{}.dat", decl.name));
            let file = HeapFile::open(&data_path, schema.clone(), page_size)
                .with_context(|| format!("failed to open {}", data_path.display()))?;
            let table_id = file.id();
            self.add_table(Arc::new(file), &decl.name, decl.primary_key.as_deref());
            info!("added table {} with schema {}", decl.name, schema);
            ids.push(table_id);
        }
        Ok(ids)
    }
}

/// Parses `name (field type [pk], ...)`.
pub fn parse_table_decl(line: &str) -> Result<TableDecl> {
    let (name, rest) = line
        .split_once('(')
        .with_context(|| format!("expected '(' in {:?}", line))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("missing table name in {:?}", line);
    }
    let body = rest
        .trim_end()
        .strip_suffix(')')
        .with_context(|| format!("expected ')' at end of {:?}", line))?;

    let mut columns = Vec::new();
    let mut primary_key = None;
    for field in body.split(',') {
        let words: Vec<&str> = field.split_whitespace().collect();
        let (field_name, type_word, annotation) = match words.as_slice() {
            [n, t] => (*n, *t, None),
            [n, t, a] => (*n, *t, Some(*a)),
            _ => bail!("malformed field {:?}", field.trim()),
        };
        let data_type = DataType::parse(type_word)
            .with_context(|| format!("unknown type {:?} for field {}", type_word, field_name))?;
        match annotation {
            None => {}
            Some("pk") => primary_key = Some(field_name.to_string()),
            Some(other) => bail!("unknown annotation {:?} on field {}", other, field_name),
        }
        columns.push((field_name.to_string(), data_type));
    }

    Ok(TableDecl {
        name: name.to_string(),
        columns,
        primary_key,
    })
}
