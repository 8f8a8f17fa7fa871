use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

/// Column types. Every type has a fixed serialized width, so a schema fixes
/// the width of its tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    /// String of at most the given number of bytes.
    Varchar(u16),
}

impl DataType {
    /// Default maximum length of a string column.
    pub const STRING_LEN: u16 = 128;

    pub fn varchar() -> Self {
        DataType::Varchar(Self::STRING_LEN)
    }

    /// Serialized width in bytes. Strings carry a 4-byte length prefix.
    pub fn byte_len(&self) -> usize {
        match self {
            DataType::Int32 => 4,
            DataType::Varchar(max_len) => 4 + *max_len as usize,
        }
    }

    /// Parses the type words used in schema files.
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "int" => Some(DataType::Int32),
            "string" => Some(DataType::varchar()),
            _ => None,
        }
    }

    /// Parses a literal of this type, as typed on a command line.
    pub fn parse_value(&self, literal: &str) -> StorageResult<Value> {
        let value = match self {
            DataType::Int32 => {
                let n = literal.trim().parse::<i32>().map_err(|e| {
                    StorageError::SchemaMismatch(format!("{:?} is not an integer: {}", literal, e))
                })?;
                Value::Int32(n)
            }
            DataType::Varchar(_) => Value::String(literal.to_string()),
        };
        value.check_type(*self)?;
        Ok(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int32 => write!(f, "INT"),
            DataType::Varchar(n) => write!(f, "STRING({})", n),
        }
    }
}

/// Comparison operators usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring match for strings, equality for integers.
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        f.write_str(s)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int32(i32),
    String(String),
}

impl Value {
    pub fn data_type_matches(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Int32(_), DataType::Int32) | (Value::String(_), DataType::Varchar(_))
        )
    }

    /// Checks both the variant and, for strings, the length bound.
    pub fn check_type(&self, data_type: DataType) -> StorageResult<()> {
        if let (Value::String(s), DataType::Varchar(max_len)) = (self, data_type) {
            if s.len() > max_len as usize {
                return Err(StorageError::ValueTooLong {
                    len: s.len(),
                    max_len: max_len as usize,
                });
            }
        }
        if !self.data_type_matches(data_type) {
            return Err(StorageError::TypeMismatch {
                index: 0,
                expected: data_type.to_string(),
                actual: self.type_name().to_string(),
            });
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "INT",
            Value::String(_) => "STRING",
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            Value::String(_) => None,
        }
    }

    /// Writes exactly `data_type.byte_len()` bytes.
    pub fn serialize_into<W: Write>(&self, data_type: DataType, out: &mut W) -> StorageResult<()> {
        self.check_type(data_type)?;
        match (self, data_type) {
            (Value::Int32(n), DataType::Int32) => out.write_i32::<BigEndian>(*n)?,
            (Value::String(s), DataType::Varchar(max_len)) => {
                let bytes = s.as_bytes();
                out.write_u32::<BigEndian>(bytes.len() as u32)?;
                out.write_all(bytes)?;
                let padding = vec![0u8; max_len as usize - bytes.len()];
                out.write_all(&padding)?;
            }
            _ => unreachable!("type checked above"),
        }
        Ok(())
    }

    /// Reads exactly `data_type.byte_len()` bytes.
    pub fn deserialize_from<R: Read>(data_type: DataType, input: &mut R) -> StorageResult<Self> {
        match data_type {
            DataType::Int32 => Ok(Value::Int32(input.read_i32::<BigEndian>()?)),
            DataType::Varchar(max_len) => {
                let len = input.read_u32::<BigEndian>()? as usize;
                let mut buf = vec![0u8; max_len as usize];
                input.read_exact(&mut buf)?;
                if len > buf.len() {
                    return Err(StorageError::ValueTooLong {
                        len,
                        max_len: max_len as usize,
                    });
                }
                buf.truncate(len);
                let s = String::from_utf8(buf)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Value::String(s))
            }
        }
    }

    /// Evaluates `self <op> other`. Values of different types never match.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => match op {
                CompareOp::Equals | CompareOp::Like => a == b,
                CompareOp::NotEquals => a != b,
                CompareOp::GreaterThan => a > b,
                CompareOp::GreaterThanOrEq => a >= b,
                CompareOp::LessThan => a < b,
                CompareOp::LessThanOrEq => a <= b,
            },
            (Value::String(a), Value::String(b)) => match op {
                CompareOp::Equals => a == b,
                CompareOp::NotEquals => a != b,
                CompareOp::GreaterThan => a > b,
                CompareOp::GreaterThanOrEq => a >= b,
                CompareOp::LessThan => a < b,
                CompareOp::LessThanOrEq => a <= b,
                CompareOp::Like => a.contains(b.as_str()),
            },
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len() {
        assert_eq!(DataType::Int32.byte_len(), 4);
        assert_eq!(DataType::varchar().byte_len(), 132);
        assert_eq!(DataType::Varchar(10).byte_len(), 14);
    }

    #[test]
    fn test_parse_type_words() {
        assert_eq!(DataType::parse("int"), Some(DataType::Int32));
        assert_eq!(DataType::parse("STRING"), Some(DataType::varchar()));
        assert_eq!(DataType::parse("float"), None);
    }

    #[test]
    fn test_int_encoding_is_big_endian() -> anyhow::Result<()> {
        let mut buf = Vec::new();
        Value::Int32(0x01020304).serialize_into(DataType::Int32, &mut buf)?;
        assert_eq!(buf, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_string_is_padded_to_fixed_width() -> anyhow::Result<()> {
        let mut buf = Vec::new();
        let value = Value::String("abc".to_string());
        value.serialize_into(DataType::Varchar(8), &mut buf)?;
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);
        assert_eq!(&buf[4..7], b"abc");
        assert!(buf[7..].iter().all(|&b| b == 0));

        let decoded = Value::deserialize_from(DataType::Varchar(8), &mut buf.as_slice())?;
        assert_eq!(decoded, value);
        Ok(())
    }

    #[test]
    fn test_string_too_long() {
        let value = Value::String("x".repeat(9));
        let mut buf = Vec::new();
        let err = value.serialize_into(DataType::Varchar(8), &mut buf).unwrap_err();
        assert!(matches!(err, StorageError::ValueTooLong { len: 9, max_len: 8 }));
    }

    #[test]
    fn test_type_mismatch() {
        assert!(Value::Int32(1).check_type(DataType::varchar()).is_err());
        assert!(Value::String("a".into()).check_type(DataType::Int32).is_err());
        assert!(Value::Int32(1).check_type(DataType::Int32).is_ok());
    }

    #[test]
    fn test_compare() {
        let one = Value::Int32(1);
        let two = Value::Int32(2);
        assert!(one.compare(CompareOp::LessThan, &two));
        assert!(two.compare(CompareOp::GreaterThanOrEq, &two));
        assert!(one.compare(CompareOp::Like, &one));
        assert!(!one.compare(CompareOp::Equals, &Value::String("1".into())));

        let hay = Value::String("haystack".into());
        assert!(hay.compare(CompareOp::Like, &Value::String("st".into())));
        assert!(!hay.compare(CompareOp::Like, &Value::String("needle".into())));
    }

    #[test]
    fn test_parse_value() -> anyhow::Result<()> {
        assert_eq!(DataType::Int32.parse_value(" 42 ")?, Value::Int32(42));
        assert!(DataType::Int32.parse_value("forty").is_err());
        assert_eq!(
            DataType::Varchar(5).parse_value("hello")?,
            Value::String("hello".into())
        );
        assert!(DataType::Varchar(4).parse_value("hello").is_err());
        Ok(())
    }
}
