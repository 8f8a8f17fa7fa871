use crate::access::schema::Schema;
use crate::access::value::Value;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::RecordId;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// A row conforming to a schema, optionally tagged with where it is stored.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Option<Value>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple with every field unset.
    pub fn new(schema: Arc<Schema>) -> Self {
        let fields = vec![None; schema.len()];
        Self {
            schema,
            fields,
            record_id: None,
        }
    }

    /// Creates a tuple with all fields set, checking each against the schema.
    pub fn from_values(schema: Arc<Schema>, values: Vec<Value>) -> StorageResult<Self> {
        if values.len() != schema.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "{} values for {} columns",
                values.len(),
                schema.len()
            )));
        }
        let mut tuple = Tuple::new(schema);
        for (i, value) in values.into_iter().enumerate() {
            tuple.set_field(i, value)?;
        }
        Ok(tuple)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Replaces the schema without touching the field values. The new schema
    /// may rename columns but must have the same column types.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) -> StorageResult<()> {
        if schema.as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "cannot reset [{}] to [{}]",
                self.schema, schema
            )));
        }
        self.schema = schema;
        Ok(())
    }

    fn not_found(&self, index: usize) -> StorageError {
        StorageError::FieldNotFound(format!(
            "index {} out of range for {} fields",
            index,
            self.fields.len()
        ))
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn set_field(&mut self, index: usize, value: Value) -> StorageResult<()> {
        let data_type = self.schema.field_type(index)?;
        value.check_type(data_type).map_err(|e| match e {
            StorageError::TypeMismatch {
                expected, actual, ..
            } => StorageError::TypeMismatch {
                index,
                expected,
                actual,
            },
            other => other,
        })?;
        if index >= self.fields.len() {
            return Err(self.not_found(index));
        }
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = Some(value);
        }
        Ok(())
    }

    /// The value of field `index`, or `None` if it has not been set.
    pub fn field(&self, index: usize) -> StorageResult<Option<&Value>> {
        self.schema.field_type(index)?;
        self.fields
            .get(index)
            .map(Option::as_ref)
            .ok_or_else(|| self.not_found(index))
    }

    pub fn fields(&self) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.fields.iter().map(Option::as_ref)
    }

    /// Writes the fixed-width image of this tuple. Every field must be set.
    pub fn serialize_into<W: Write>(&self, out: &mut W) -> StorageResult<()> {
        for (i, (field, data_type)) in self.fields.iter().zip(self.schema.types()).enumerate() {
            let value = field
                .as_ref()
                .ok_or_else(|| StorageError::SchemaMismatch(format!("field {} is unset", i)))?;
            value.serialize_into(data_type, out)?;
        }
        Ok(())
    }

    pub fn deserialize_from<R: Read>(schema: Arc<Schema>, input: &mut R) -> StorageResult<Self> {
        let fields = schema
            .types()
            .map(|t| Value::deserialize_from(t, input).map(Some))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }
}

/// Equality compares field values only; schema names and location are ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            match field {
                Some(value) => write!(f, "{}", value)?,
                None => f.write_str("null")?,
            }
        }
        Ok(())
    }
}
