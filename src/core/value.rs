//! Purpose: Typed values stored in the `value` column and the rules for reading them back.
//! Exports: `Value`, `ValueKind`, `ValueView`.
//! Role: The engine's storage class is the type tag; no tag column is stored.
//! Invariants: Integers read as doubles widen; text reads as bytes yields UTF-8.
//! Invariants: NULL reads as empty text/bytes and mismatches numeric requests.
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Null,
    Int,
    Double,
    Text,
    Bytes,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Int => "int",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    pub fn view(&self) -> ValueView<'_> {
        ValueView { value: self }
    }

    pub(crate) fn from_engine(value: ValueRef<'_>) -> Result<Self, Error> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(int) => Value::Int(int),
            ValueRef::Real(double) => Value::Double(double),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8(bytes.to_vec()).map_err(
                |err| {
                    Error::new(ErrorKind::Corrupt)
                        .with_message("stored text is not valid UTF-8")
                        .with_source(err)
                },
            )?),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int(int) => ToSqlOutput::Borrowed(ValueRef::Integer(*int)),
            Value::Double(double) => ToSqlOutput::Borrowed(ValueRef::Real(*double)),
            Value::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::Bytes(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

/// Borrowed view of the row currently held by a stepped select.
#[derive(Clone, Copy, Debug)]
pub struct ValueView<'a> {
    value: &'a Value,
}

impl<'a> ValueView<'a> {
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn int(&self) -> Result<i64, Error> {
        match self.value {
            Value::Int(int) => Ok(*int),
            _ => Err(mismatch(ValueKind::Int, self.kind())),
        }
    }

    pub fn double(&self) -> Result<f64, Error> {
        match self.value {
            Value::Double(double) => Ok(*double),
            Value::Int(int) => Ok(*int as f64),
            _ => Err(mismatch(ValueKind::Double, self.kind())),
        }
    }

    pub fn text(&self) -> Result<&'a str, Error> {
        match self.value {
            Value::Text(text) => Ok(text.as_str()),
            Value::Null => Ok(""),
            _ => Err(mismatch(ValueKind::Text, self.kind())),
        }
    }

    /// Text reads as its UTF-8 bytes here; the C interface re-encodes text as UTF-16.
    pub fn bytes(&self) -> Result<&'a [u8], Error> {
        match self.value {
            Value::Bytes(bytes) => Ok(bytes.as_slice()),
            Value::Text(text) => Ok(text.as_bytes()),
            Value::Null => Ok(&[]),
            _ => Err(mismatch(ValueKind::Bytes, self.kind())),
        }
    }

    pub fn to_value(&self) -> Value {
        self.value.clone()
    }
}

fn mismatch(requested: ValueKind, stored: ValueKind) -> Error {
    Error::new(ErrorKind::TypeMismatch).with_message(format!(
        "requested {} but stored value is {}",
        requested.as_str(),
        stored.as_str()
    ))
}
