//! Column definitions: conversion between raw tokens and [`Value`]s.
//!
//! The binding runtime treats a column as an opaque capability behind
//! [`ColumnDefinition`]. [`Column`] is the stock implementation used by the
//! mapping builders and YAML mapping files.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::codec::ColumnContext;
use crate::error::ValueError;
use crate::value::Value;

/// Parses raw tokens into values and formats values back into tokens.
pub trait ColumnDefinition: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Ignored columns occupy a physical position but produce no value.
    fn is_ignored(&self) -> bool {
        false
    }

    fn is_nullable(&self) -> bool {
        true
    }

    /// Value substituted when the raw token is the null token.
    fn default_value(&self) -> Option<&Value> {
        None
    }

    fn parse(&self, ctx: &ColumnContext<'_>, raw: &str) -> Result<Value, ValueError>;

    fn format(&self, ctx: &ColumnContext<'_>, value: &Value) -> Result<String, ValueError>;
}

/// Value type of a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Char,
    Date,
    DateTime,
    Uuid,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Char => "char",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Uuid => "uuid",
        }
    }

    fn default_format(&self) -> Option<&'static str> {
        match self {
            ColumnType::Date => Some("%Y-%m-%d"),
            ColumnType::DateTime => Some("%Y-%m-%d %H:%M:%S"),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Stock column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    null_token: Option<String>,
    trim: bool,
    default_value: Option<Value>,
    format: Option<String>,
    ignored: bool,
}

impl Column {
    /// Text columns take tokens verbatim: no null token and no trimming.
    /// Every other type treats the empty token as null and trims whitespace.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let text = column_type == ColumnType::String;
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            null_token: (!text).then(String::new),
            trim: !text,
            default_value: None,
            format: None,
            ignored: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }

    /// A column whose token is skipped on read and left empty on write.
    pub fn ignored(name: impl Into<String>) -> Self {
        Self {
            ignored: true,
            ..Self::string(name)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_null_token(mut self, token: impl Into<String>) -> Self {
        self.null_token = Some(token.into());
        self
    }

    /// Every token is a value; nulls are written as the empty token.
    pub fn without_null_token(mut self) -> Self {
        self.null_token = None;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// chrono format string for date and datetime columns.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn null_token(&self) -> Option<&str> {
        self.null_token.as_deref()
    }

    fn null_text(&self) -> String {
        self.null_token.clone().unwrap_or_default()
    }

    fn chrono_format(&self) -> &str {
        self.format
            .as_deref()
            .or_else(|| self.column_type.default_format())
            .unwrap_or_default()
    }

    fn parse_token(&self, token: &str) -> Result<Value, ValueError> {
        let expected = self.column_type.name();
        let parse_error = |reason: String| ValueError::Parse {
            raw: token.to_string(),
            expected,
            reason,
        };

        match self.column_type {
            ColumnType::String => Ok(Value::String(token.to_string())),
            ColumnType::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::Float => token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::Bool => match token.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(parse_error("not a boolean".to_string())),
            },
            ColumnType::Char => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(parse_error("expected exactly one character".to_string())),
                }
            }
            ColumnType::Date => NaiveDate::parse_from_str(token, self.chrono_format())
                .map(Value::Date)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::DateTime => NaiveDateTime::parse_from_str(token, self.chrono_format())
                .map(Value::DateTime)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::Uuid => Uuid::parse_str(token)
                .map(Value::Uuid)
                .map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Bring a value to this column's type. Text is parsed, so values that
    /// arrive untyped (from JSON, say) can be written to typed columns.
    fn coerce(&self, value: &Value) -> Result<Value, ValueError> {
        let coerced = match (self.column_type, value) {
            (ColumnType::String, _) => value.clone(),
            (_, Value::String(s)) => self.parse_token(s.trim())?,
            (ColumnType::Float, Value::Int(i)) => Value::Float(*i as f64),
            (ColumnType::Date, Value::DateTime(dt)) => Value::Date(dt.date()),
            _ => value.clone(),
        };

        let matches_type = matches!(
            (self.column_type, &coerced),
            (ColumnType::String, _)
                | (ColumnType::Int, Value::Int(_))
                | (ColumnType::Float, Value::Float(_))
                | (ColumnType::Bool, Value::Bool(_))
                | (ColumnType::Char, Value::Char(_))
                | (ColumnType::Date, Value::Date(_))
                | (ColumnType::DateTime, Value::DateTime(_))
                | (ColumnType::Uuid, Value::Uuid(_))
        );
        if matches_type {
            Ok(coerced)
        } else {
            Err(ValueError::TypeMismatch {
                expected: self.column_type.name(),
                found: value.kind_name(),
            })
        }
    }
}

impl ColumnDefinition for Column {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ignored(&self) -> bool {
        self.ignored
    }

    fn is_nullable(&self) -> bool {
        self.nullable
    }

    fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    fn parse(&self, _ctx: &ColumnContext<'_>, raw: &str) -> Result<Value, ValueError> {
        if self.ignored {
            return Ok(Value::Null);
        }
        let token = if self.trim { raw.trim() } else { raw };
        if self.null_token.as_deref() == Some(token) {
            return Ok(self.default_value.clone().unwrap_or(Value::Null));
        }
        self.parse_token(token)
    }

    fn format(&self, _ctx: &ColumnContext<'_>, value: &Value) -> Result<String, ValueError> {
        if self.ignored {
            return Ok(String::new());
        }
        let value = match (value, &self.default_value) {
            (Value::Null, Some(default)) => default.clone(),
            (Value::Null, None) => return Ok(self.null_text()),
            (other, _) => self.coerce(other)?,
        };

        Ok(match value {
            Value::Date(d) => d.format(self.chrono_format()).to_string(),
            Value::DateTime(dt) => dt.format(self.chrono_format()).to_string(),
            Value::Null => self.null_text(),
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RecordContext;

    fn parse(column: &Column, raw: &str) -> Result<Value, ValueError> {
        let record = RecordContext::default();
        column.parse(&ColumnContext::new(&record, column.name(), 0, 0), raw)
    }

    fn format(column: &Column, value: &Value) -> Result<String, ValueError> {
        let record = RecordContext::default();
        column.format(&ColumnContext::new(&record, column.name(), 0, 0), value)
    }

    #[test]
    fn test_parse_typed_tokens() {
        assert_eq!(parse(&Column::int("n"), " 42 "), Ok(Value::Int(42)));
        assert_eq!(parse(&Column::float("f"), "2.5"), Ok(Value::Float(2.5)));
        assert_eq!(parse(&Column::bool("b"), "Y"), Ok(Value::Bool(true)));
        assert_eq!(
            parse(&Column::date("d"), "2024-03-01"),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert!(matches!(
            parse(&Column::int("n"), "abc"),
            Err(ValueError::Parse { expected: "int", .. })
        ));
    }

    #[test]
    fn test_null_token_and_default() {
        let plain = Column::int("n");
        let with_null = Column::int("n").with_null_token("NULL");
        let defaulted = Column::int("n").with_default(Value::Int(-1));

        assert_eq!(parse(&plain, ""), Ok(Value::Null));
        assert_eq!(parse(&with_null, "NULL"), Ok(Value::Null));
        assert_eq!(parse(&defaulted, "  "), Ok(Value::Int(-1)));
        assert_eq!(format(&with_null, &Value::Null), Ok("NULL".to_string()));
    }

    #[test]
    fn test_text_tokens_are_verbatim() {
        let text = Column::string("s");
        let nullable_text = Column::string("s").with_null_token("");

        assert_eq!(text.null_token(), None);
        assert_eq!(parse(&text, ""), Ok(Value::String(String::new())));
        assert_eq!(parse(&text, " padded "), Ok(Value::String(" padded ".to_string())));
        assert_eq!(format(&text, &Value::Null), Ok(String::new()));
        assert_eq!(parse(&nullable_text, ""), Ok(Value::Null));
        assert_eq!(parse(&Column::int("n").without_null_token(), "").ok(), None);
    }

    #[test]
    fn test_custom_date_format() {
        let column = Column::date("d").with_format("%d/%m/%Y");
        let date = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();

        assert_eq!(parse(&column, "25/12/2023"), Ok(Value::Date(date)));
        assert_eq!(format(&column, &Value::Date(date)), Ok("25/12/2023".to_string()));
    }

    #[test]
    fn test_format_coerces_text() {
        let column = Column::date("d");
        assert_eq!(
            format(&column, &Value::String("2020-01-02".to_string())),
            Ok("2020-01-02".to_string())
        );
        assert_eq!(format(&Column::float("f"), &Value::Int(3)), Ok("3".to_string()));
        assert!(matches!(
            format(&Column::int("n"), &Value::Bool(true)),
            Err(ValueError::TypeMismatch { expected: "int", found: "bool" })
        ));
    }

    #[test]
    fn test_ignored_column() {
        let column = Column::ignored("filler");

        assert!(column.is_ignored());
        assert_eq!(parse(&column, "anything"), Ok(Value::Null));
        assert_eq!(format(&column, &Value::Int(1)), Ok(String::new()));
    }
}
