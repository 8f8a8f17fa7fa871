//! Tuple schemas.

use crate::access::value::DataType;
use crate::storage::error::{StorageError, StorageResult};
use std::fmt;

/// One column of a schema. Names are optional metadata.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: Option<String>,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: Option<String>, data_type: DataType) -> Self {
        Self { name, data_type }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.data_type, name),
            None => write!(f, "{}(null)", self.data_type),
        }
    }
}

/// Ordered list of typed columns. Immutable once built.
///
/// Two schemas are equal when their type sequences are equal; column names
/// do not take part in the comparison.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Builds a schema from parallel type and name lists.
    pub fn new(types: &[DataType], names: &[Option<&str>]) -> StorageResult<Self> {
        if types.len() != names.len() {
            return Err(StorageError::InvalidSchema(format!(
                "{} types but {} names",
                types.len(),
                names.len()
            )));
        }
        let columns = types
            .iter()
            .zip(names)
            .map(|(t, n)| Column::new(n.map(str::to_string), *t))
            .collect();
        Self::from_columns(columns)
    }

    /// Builds a schema whose columns are all unnamed.
    pub fn unnamed(types: &[DataType]) -> StorageResult<Self> {
        let columns = types.iter().map(|t| Column::new(None, *t)).collect();
        Self::from_columns(columns)
    }

    pub fn from_columns(columns: Vec<Column>) -> StorageResult<Self> {
        if columns.is_empty() {
            return Err(StorageError::InvalidSchema(
                "a schema needs at least one column".to_string(),
            ));
        }
        Ok(Self { columns })
    }

    /// Concatenates `first`'s columns followed by `second`'s.
    pub fn merge(first: &Schema, second: &Schema) -> Schema {
        let columns = first
            .columns
            .iter()
            .chain(second.columns.iter())
            .cloned()
            .collect();
        Schema { columns }
    }

    /// Copy of this schema with every named column renamed to `alias.name`.
    pub fn with_prefix(&self, alias: &str) -> Schema {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let name = c.name.as_deref().unwrap_or("null");
                Column::new(Some(format!("{}.{}", alias, name)), c.data_type)
            })
            .collect();
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> StorageResult<&Column> {
        self.columns.get(index).ok_or_else(|| {
            StorageError::FieldNotFound(format!(
                "index {} out of range for {} columns",
                index,
                self.columns.len()
            ))
        })
    }

    pub fn field_name(&self, index: usize) -> StorageResult<Option<&str>> {
        Ok(self.column(index)?.name.as_deref())
    }

    pub fn field_type(&self, index: usize) -> StorageResult<DataType> {
        Ok(self.column(index)?.data_type)
    }

    pub fn types(&self) -> impl Iterator<Item = DataType> + '_ {
        self.columns.iter().map(|c| c.data_type)
    }

    /// Index of the first column named `name`, in declared order.
    pub fn index_of(&self, name: Option<&str>) -> StorageResult<usize> {
        let name = name.ok_or_else(|| StorageError::FieldNotFound("null field name".into()))?;
        if self.columns.iter().all(|c| c.name.is_none()) {
            return Err(StorageError::FieldNotFound(format!(
                "{:?}: all columns are unnamed",
                name
            )));
        }
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
            .ok_or_else(|| StorageError::FieldNotFound(name.to_string()))
    }

    /// Serialized width of one tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.types().map(|t| t.byte_len()).sum()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len() && self.types().eq(other.types())
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", column)?;
        }
        Ok(())
    }
}
