//! Sequential scan over one table.

use crate::access::scan::{Cursor, HeapFileScan, OpIterator, TupleSource};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::executor::ExecutionContext;
use crate::storage::error::StorageResult;
use std::sync::Arc;

/// Reads every tuple of a table, in page then slot order. Output columns are
/// named `alias.column`.
pub struct SeqScan {
    table_id: TableId,
    alias: String,
    schema: Arc<Schema>,
    scan: Cursor<HeapFileScan>,
}

impl SeqScan {
    pub fn new(ctx: &ExecutionContext, table_id: TableId, alias: &str) -> StorageResult<Self> {
        let file = ctx.catalog().database_file(table_id)?;
        let schema = Arc::new(file.schema().with_prefix(alias));
        Ok(Self {
            table_id,
            alias: alias.to_string(),
            schema,
            scan: file.iterator(ctx.tid, &ctx.pool),
        })
    }

    /// Scan aliased by the table's registered name.
    pub fn by_name(ctx: &ExecutionContext, table_id: TableId) -> StorageResult<Self> {
        let name = ctx.catalog().table_name(table_id)?;
        Self::new(ctx, table_id, &name)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl TupleSource for SeqScan {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> StorageResult<()> {
        self.scan.open()
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.scan.has_next()? {
            return Ok(None);
        }
        let mut tuple = self.scan.next()?;
        tuple.reset_schema(self.schema.clone())?;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.scan.rewind()
    }

    fn close(&mut self) {
        self.scan.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::scan::collect_tuples;
    use crate::executor::test_support::{ints, table_with_rows};
    use anyhow::Result;

    #[test]
    fn test_scan_all_rows() -> Result<()> {
        let db = table_with_rows(&[(1, 10), (2, 20), (3, 30)])?;
        let mut scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "x")?);
        scan.open()?;
        let rows: Vec<_> = collect_tuples(&mut scan)?.iter().map(ints).collect();
        assert_eq!(rows, vec![vec![1, 10], vec![2, 20], vec![3, 30]]);
        scan.close();
        Ok(())
    }

    #[test]
    fn test_prefixed_schema() -> Result<()> {
        let db = table_with_rows(&[(1, 1)])?;
        let scan = SeqScan::by_name(&db.ctx, db.table_id)?;
        assert_eq!(scan.alias(), "t");
        assert_eq!(scan.schema().field_name(0)?, Some("t.k"));
        assert_eq!(scan.schema().field_name(1)?, Some("t.v"));
        Ok(())
    }

    #[test]
    fn test_rewind() -> Result<()> {
        let db = table_with_rows(&[(1, 1), (2, 2)])?;
        let mut scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        scan.open()?;
        scan.next()?;
        scan.rewind()?;
        assert_eq!(collect_tuples(&mut scan)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_table() -> Result<()> {
        let db = table_with_rows(&[])?;
        assert!(SeqScan::new(&db.ctx, db.table_id.wrapping_add(1), "t").is_err());
        Ok(())
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        let db = table_with_rows(&[])?;
        let mut scan = Cursor::new(SeqScan::new(&db.ctx, db.table_id, "t")?);
        scan.open()?;
        assert!(!scan.has_next()?);
        Ok(())
    }
}
