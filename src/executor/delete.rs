//! Delete executor implementation.

use crate::access::scan::{OpIterator, TupleSource};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::executor::ExecutionContext;
use crate::storage::error::StorageResult;
use std::sync::Arc;

/// Deletes every child tuple from the table its record id names, then yields
/// a single tuple holding the number of rows deleted.
pub struct Delete {
    ctx: ExecutionContext,
    /// Child operator producing stored tuples
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    done: bool,
}

impl Delete {
    pub fn new(ctx: ExecutionContext, child: Box<dyn OpIterator>) -> StorageResult<Self> {
        Ok(Self {
            ctx,
            child,
            schema: Arc::new(Schema::new(&[DataType::Int32], &[Some("deleted")])?),
            done: false,
        })
    }
}

impl TupleSource for Delete {
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
            self.ctx.pool.delete_tuple(self.ctx.tid, &mut tuple)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::scan::{collect_tuples, Cursor, TupleList};
    use crate::access::value::CompareOp;
    use crate::executor::test_support::{ints, table_with_rows};
    use crate::executor::{Filter, Predicate, SeqScan};
    use anyhow::Result;

    #[test]
    fn test_delete_filtered_rows() -> Result<()> {
        let db = table_with_rows(&[(1, 1), (2, 2), (3, 3), (4, 4)])?;
        let scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        let tail = Filter::new(
            Predicate::new(0, CompareOp::GreaterThan, Value::Int32(2)),
            Box::new(scan),
        )?;
        let mut delete = Cursor::new(Delete::new(db.ctx.clone(), Box::new(Cursor::new(tail)))?);

        delete.open()?;
        assert_eq!(ints(&delete.next()?), vec![2]);
        assert!(!delete.has_next()?);
        delete.close();

        let mut scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        scan.open()?;
        let left: Vec<_> = collect_tuples(&mut scan)?.iter().map(ints).collect();
        assert_eq!(left, vec![vec![1, 1], vec![2, 2]]);
        Ok(())
    }

    #[test]
    fn test_delete_unstored_tuple_fails() -> Result<()> {
        let db = table_with_rows(&[])?;
        let loose = Tuple::from_values(db.schema.clone(), vec![Value::Int32(1), Value::Int32(1)])?;
        let child = TupleList::cursor(db.schema.clone(), vec![loose]);
        let mut delete = Cursor::new(Delete::new(db.ctx.clone(), Box::new(child))?);
        delete.open()?;
        assert!(delete.next().is_err());
        Ok(())
    }
}
