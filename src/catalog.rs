//! Registry of the tables a database knows about.
//!
//! The storage layer only ever looks tables up by [`TableId`]; names and
//! primary keys are kept for the operators and the command line.

pub mod loader;
pub mod table_info;

use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::storage::error::{StorageError, StorageResult};
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

pub use table_info::TableInfo;

pub type TableId = u32;

#[derive(Debug, Default)]
pub struct Catalog {
    tables: DashMap<TableId, TableInfo>,
    names: DashMap<String, TableId>,
    /// Serializes registration so the two maps stay consistent
    write_latch: Mutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. A table already registered with the
    /// same id, or under the same name, is replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: Option<&str>) {
        let _latch = self.write_latch.lock();
        let table_id = file.id();

        let previous_name = self.tables.get(&table_id).map(|e| e.name.clone());
        if let Some(previous_name) = previous_name {
            self.names.remove_if(&previous_name, |_, id| *id == table_id);
        }
        let previous_id = self.names.get(name).map(|e| *e.value());
        if let Some(previous_id) = previous_id {
            if previous_id != table_id {
                self.tables.remove(&previous_id);
            }
        }

        self.tables.insert(
            table_id,
            TableInfo::new(file, name.to_string(), primary_key.map(str::to_string)),
        );
        self.names.insert(name.to_string(), table_id);
        info!("registered table {:?} as {}", name, table_id);
    }

    pub fn table_id(&self, name: &str) -> StorageResult<TableId> {
        self.names
            .get(name)
            .map(|e| *e.value())
            .ok_or_else(|| StorageError::TableNameNotFound(name.to_string()))
    }

    pub fn table_info(&self, table_id: TableId) -> StorageResult<TableInfo> {
        self.tables
            .get(&table_id)
            .map(|e| e.value().clone())
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> StorageResult<Arc<Schema>> {
        Ok(self.table_info(table_id)?.file.schema().clone())
    }

    /// The heap file backing `table_id`.
    pub fn database_file(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|e| e.file.clone())
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn primary_key(&self, table_id: TableId) -> StorageResult<Option<String>> {
        Ok(self.table_info(table_id)?.primary_key)
    }

    pub fn table_name(&self, table_id: TableId) -> StorageResult<String> {
        Ok(self.table_info(table_id)?.name)
    }

    /// Ids of every registered table, sorted.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Forgets every table. Files on disk are untouched.
    pub fn clear(&self) {
        let _latch = self.write_latch.lock();
        self.tables.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::DataType;
    use crate::storage::disk::DEFAULT_PAGE_SIZE;
    use anyhow::Result;
    use std::path::Path;

    fn open(dir: &Path, file: &str, types: &[DataType]) -> Result<Arc<HeapFile>> {
        let schema = Arc::new(Schema::unnamed(types)?);
        Ok(Arc::new(HeapFile::open(
            &dir.join(file),
            schema,
            DEFAULT_PAGE_SIZE,
        )?))
    }

    #[test]
    fn test_lookups() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = open(dir.path(), "a.dat", &[DataType::Int32, DataType::varchar()])?;
        let catalog = Catalog::new();
        catalog.add_table(file.clone(), "people", Some("id"));

        let id = catalog.table_id("people")?;
        assert_eq!(id, file.id());
        assert_eq!(catalog.table_name(id)?, "people");
        assert_eq!(catalog.primary_key(id)?, Some("id".to_string()));
        assert_eq!(catalog.schema(id)?.len(), 2);
        assert!(Arc::ptr_eq(&catalog.database_file(id)?, &file));
        assert_eq!(catalog.table_ids(), vec![id]);
        Ok(())
    }

    #[test]
    fn test_unknown_table() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.table_id("nope"),
            Err(StorageError::TableNameNotFound(_))
        ));
        assert!(matches!(
            catalog.database_file(17),
            Err(StorageError::TableNotFound(17))
        ));
        assert!(catalog.schema(17).is_err());
    }

    #[test]
    fn test_same_name_replaces_previous_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let first = open(dir.path(), "a.dat", &[DataType::Int32])?;
        let second = open(dir.path(), "b.dat", &[DataType::Int32])?;
        let catalog = Catalog::new();
        catalog.add_table(first.clone(), "t", None);
        catalog.add_table(second.clone(), "t", None);

        assert_eq!(catalog.table_id("t")?, second.id());
        assert!(catalog.database_file(first.id()).is_err());
        assert_eq!(catalog.len(), 1);
        Ok(())
    }

    #[test]
    fn test_same_id_replaces_previous_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = open(dir.path(), "a.dat", &[DataType::Int32])?;
        let catalog = Catalog::new();
        catalog.add_table(file.clone(), "old", None);
        catalog.add_table(file.clone(), "new", None);

        assert!(catalog.table_id("old").is_err());
        assert_eq!(catalog.table_id("new")?, file.id());
        assert_eq!(catalog.len(), 1);
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = Catalog::new();
        catalog.add_table(open(dir.path(), "a.dat", &[DataType::Int32])?, "a", None);
        catalog.clear();
        assert!(catalog.is_empty());
        assert!(catalog.table_id("a").is_err());
        Ok(())
    }
}
