//! Filter executor implementation.

use crate::access::scan::{OpIterator, TupleSource};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::value::{CompareOp, Value};
use crate::storage::error::{StorageError, StorageResult};
use std::fmt;
use std::sync::Arc;

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: usize,
    pub op: CompareOp,
    pub operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    /// True when `tuple`'s field satisfies the comparison. Unset fields never
    /// match.
    pub fn filter(&self, tuple: &Tuple) -> StorageResult<bool> {
        Ok(tuple
            .field(self.field)?
            .is_some_and(|value| value.compare(self.op, &self.operand)))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Passes through the child tuples that satisfy a predicate.
pub struct Filter {
    /// Condition each tuple must meet
    predicate: Predicate,
    /// Child operator that produces tuples
    child: Box<dyn OpIterator>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> StorageResult<Self> {
        child.schema().field_type(predicate.field).map_err(|_| {
            StorageError::FieldNotFound(format!(
                "predicate {} refers to a field outside [{}]",
                predicate,
                child.schema()
            ))
        })?;
        Ok(Self { predicate, child })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl TupleSource for Filter {
    fn schema(&self) -> &Arc<Schema> {
        self.child.schema()
    }

    fn open(&mut self) -> StorageResult<()> {
        self.child.open()
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::scan::{collect_tuples, Cursor};
    use crate::executor::test_support::{ints, table_with_rows};
    use crate::executor::SeqScan;
    use anyhow::Result;

    #[test]
    fn test_filter_greater_than() -> Result<()> {
        let db = table_with_rows(&[(1, 5), (2, 15), (3, 25)])?;
        let scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        let predicate = Predicate::new(1, CompareOp::GreaterThan, Value::Int32(10));
        let mut filter = Cursor::new(Filter::new(predicate, Box::new(scan))?);

        filter.open()?;
        let rows: Vec<_> = collect_tuples(&mut filter)?.iter().map(ints).collect();
        assert_eq!(rows, vec![vec![2, 15], vec![3, 25]]);

        filter.rewind()?;
        assert_eq!(collect_tuples(&mut filter)?.len(), 2);
        filter.close();
        Ok(())
    }

    #[test]
    fn test_filter_matches_nothing() -> Result<()> {
        let db = table_with_rows(&[(1, 1), (2, 2)])?;
        let scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        let predicate = Predicate::new(0, CompareOp::Equals, Value::Int32(99));
        let mut filter = Cursor::new(Filter::new(predicate, Box::new(scan))?);
        filter.open()?;
        assert!(!filter.has_next()?);
        Ok(())
    }

    #[test]
    fn test_filter_field_out_of_range() -> Result<()> {
        let db = table_with_rows(&[])?;
        let scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        let predicate = Predicate::new(5, CompareOp::Equals, Value::Int32(1));
        assert!(Filter::new(predicate, Box::new(scan)).is_err());
        Ok(())
    }

    #[test]
    fn test_predicate_on_unset_field() -> Result<()> {
        let db = table_with_rows(&[])?;
        let tuple = Tuple::new(db.schema.clone());
        let predicate = Predicate::new(0, CompareOp::NotEquals, Value::Int32(1));
        assert!(!predicate.filter(&tuple)?);
        Ok(())
    }
}
