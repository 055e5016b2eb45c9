//! Column values and the conversion between values and entity field types.
//!
//! A record travels between the codec and the mapper as a slice of [`Value`]s,
//! one per logical column. [`ColumnValue`] is implemented for every Rust type
//! a scalar member may have.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::error::ValueError;

/// A single typed column value.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Borrow the value as a string slice when it holds text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// JSON has no date or uuid types; those arrive as strings and are coerced by
/// the column definition when the value is formatted.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

/// Conversion between a Rust field type and [`Value`].
pub trait ColumnValue: Sized + 'static {
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Whether the type can hold `Value::Null`.
    const NULLABLE: bool = false;

    fn to_value(&self) -> Result<Value, ValueError>;

    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: &'static str, value: &Value) -> ValueError {
    if value.is_null() {
        ValueError::UnexpectedNull { expected }
    } else {
        ValueError::TypeMismatch {
            expected,
            found: value.kind_name(),
        }
    }
}

macro_rules! int_column_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn to_value(&self) -> Result<Value, ValueError> {
                    Ok(Value::Int(i64::from(*self)))
                }

                fn from_value(value: &Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(*i).map_err(|_| ValueError::OutOfRange {
                            value: i.to_string(),
                            target: stringify!($ty),
                        }),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

int_column_value!(i8, i16, i32, i64, u8, u16, u32);

impl ColumnValue for u64 {
    const TYPE_NAME: &'static str = "u64";

    fn to_value(&self) -> Result<Value, ValueError> {
        i64::try_from(*self)
            .map(Value::Int)
            .map_err(|_| ValueError::OutOfRange {
                value: self.to_string(),
                target: "i64",
            })
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => u64::try_from(*i).map_err(|_| ValueError::OutOfRange {
                value: i.to_string(),
                target: "u64",
            }),
            other => Err(mismatch("u64", other)),
        }
    }
}

impl ColumnValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl ColumnValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Float(f64::from(*self)))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(*f as f32),
            Value::Int(i) => Ok(*i as f32),
            other => Err(mismatch("f32", other)),
        }
    }
}

impl ColumnValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl ColumnValue for char {
    const TYPE_NAME: &'static str = "char";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Char(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Char(c) => Ok(*c),
            Value::String(s) if s.chars().count() == 1 => {
                s.chars().next().ok_or(ValueError::UnexpectedNull { expected: "char" })
            }
            other => Err(mismatch("char", other)),
        }
    }
}

impl ColumnValue for String {
    const TYPE_NAME: &'static str = "String";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Char(c) => Ok(c.to_string()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl ColumnValue for NaiveDate {
    const TYPE_NAME: &'static str = "NaiveDate";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Date(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            other => Err(mismatch("NaiveDate", other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "NaiveDateTime";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::DateTime(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            other => Err(mismatch("NaiveDateTime", other)),
        }
    }
}

impl ColumnValue for Uuid {
    const TYPE_NAME: &'static str = "Uuid";

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(Value::Uuid(*self))
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

impl ColumnValue for Value {
    const TYPE_NAME: &'static str = "Value";
    const NULLABLE: bool = true;

    fn to_value(&self) -> Result<Value, ValueError> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        Ok(value.clone())
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Result<Value, ValueError> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
