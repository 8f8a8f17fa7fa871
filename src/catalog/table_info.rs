use crate::access::heap::HeapFile;
use std::sync::Arc;

/// What the catalog knows about one table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub file: Arc<HeapFile>,
    pub name: String,
    pub primary_key: Option<String>,
}

impl TableInfo {
    pub fn new(file: Arc<HeapFile>, name: String, primary_key: Option<String>) -> Self {
        Self {
            file,
            name,
            primary_key,
        }
    }
}
