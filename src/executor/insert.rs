//! Insert executor implementation.

use crate::access::scan::{OpIterator, TupleSource};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::catalog::TableId;
use crate::executor::ExecutionContext;
use crate::storage::error::{StorageError, StorageResult};
use std::sync::Arc;

/// Inserts every child tuple into a table through the buffer pool, then
/// yields a single tuple holding the number of rows inserted.
pub struct Insert {
    ctx: ExecutionContext,
    /// Child operator producing the rows to insert
    child: Box<dyn OpIterator>,
    table_id: TableId,
    /// One `INT` column: the inserted row count
    schema: Arc<Schema>,
    /// Whether the count tuple has been produced
    done: bool,
}

impl Insert {
    /// Fails with `SchemaMismatch` if the child's column types differ from
    /// the table's.
    pub fn new(
        ctx: ExecutionContext,
        child: Box<dyn OpIterator>,
        table_id: TableId,
    ) -> StorageResult<Self> {
        let table_schema = ctx.catalog().schema(table_id)?;
        if child.schema().as_ref() != table_schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "cannot insert [{}] into table with [{}]",
                child.schema(),
                table_schema
            )));
        }
        Ok(Self {
            ctx,
            child,
            table_id,
            schema: Arc::new(Schema::new(&[DataType::Int32], &[Some("inserted")])?),
            done: false,
        })
    }
}

impl TupleSource for Insert {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> StorageResult<()> {
        self.done = false;
        self.child.open()
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.ctx
                .pool
                .insert_tuple(self.ctx.tid, self.table_id, &mut tuple)?;
            count += 1;
        }
        Ok(Some(Tuple::from_values(
            self.schema.clone(),
            vec![Value::Int32(count)],
        )?))
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.done = false;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }
}
