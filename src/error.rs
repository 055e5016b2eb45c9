//! Error types for the binding runtime.
//!
//! Configuration problems (bad member paths, missing constructors, duplicate
//! custom keys) surface while a mapping or mapper is built. Per-record
//! problems (nulls in non-nullable members, conversion failures, records no
//! schema claims) surface from `read`/`write`; callers choose to stop or skip.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = BindError> = std::result::Result<T, E>;

/// Errors raised while converting between a [`crate::Value`] and a typed field
/// or a raw column token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("null is not a valid {expected}")]
    UnexpectedNull { expected: &'static str },

    #[error("cannot parse '{raw}' as {expected}: {reason}")]
    Parse {
        raw: String,
        expected: &'static str,
        reason: String,
    },
}

/// A column-level failure attributed to its position in the record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {record}, column '{column}' (physical {physical_index}): {source}")]
pub struct ColumnError {
    pub record: u64,
    pub column: String,
    pub physical_index: usize,
    pub logical_index: Option<usize>,
    #[source]
    pub source: ValueError,
}

/// A record-level failure coming from the line codec or the schema.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record {record}: expected {expected} columns, found {actual}")]
    ColumnCountMismatch {
        record: u64,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Column(#[from] ColumnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delimited codec error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised by the binding runtime.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("type {type_name} has no default constructor and no factory was registered")]
    NoDefaultConstructor { type_name: &'static str },

    #[error("member '{0}' has no setter and cannot be read into")]
    ReadOnlyMember(String),

    #[error("member '{0}' has no getter and cannot be written from")]
    WriteOnlyMember(String),

    #[error("record {record}, column {logical_index}: null assigned to non-nullable member '{member}'")]
    NullAssignedToNonNullable {
        member: String,
        record: u64,
        logical_index: usize,
    },

    #[error("no schema matches the record and no default schema is registered")]
    NoMatchingSchema,

    #[error("generated accessors are unavailable for {type_name}: {reason}")]
    UnsupportedRuntime {
        type_name: &'static str,
        reason: String,
    },

    #[error("member '{0}' nests its own enclosing type; cyclic mappings are not supported")]
    CyclicMappingNotSupported(String),

    #[error("bad member path '{path}': {reason}")]
    BadMemberPath { path: String, reason: String },

    #[error("member '{member}' expects an instance of {expected}")]
    InvalidTarget {
        member: String,
        expected: &'static str,
    },

    #[error("custom mapping for column '{0}' is already configured")]
    DuplicateCustomKey(String),

    #[error("expected {expected} values, found {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },

    #[error("{}member '{member}': {source}", position(.record, .logical_index))]
    Conversion {
        member: String,
        record: Option<u64>,
        logical_index: Option<usize>,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Column(#[from] ColumnError),
}

fn position(record: &Option<u64>, logical_index: &Option<usize>) -> String {
    match (record, logical_index) {
        (Some(record), Some(logical)) => format!("record {record}, column {logical}: "),
        (Some(record), None) => format!("record {record}: "),
        (None, Some(logical)) => format!("column {logical}: "),
        (None, None) => String::new(),
    }
}

impl BindError {
    /// Attribute a member conversion failure to the record and logical
    /// column being mapped. Other errors pass through unchanged.
    pub(crate) fn at_column(self, record: u64, logical: usize) -> Self {
        match self {
            Self::Conversion {
                member,
                record: None,
                logical_index: None,
                source,
            } => Self::Conversion {
                member,
                record: Some(record),
                logical_index: Some(logical),
                source,
            },
            other => other,
        }
    }

    pub(crate) fn bad_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadMemberPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that only concern the current record. The remaining
    /// variants are configuration problems that will repeat on every record.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::NullAssignedToNonNullable { .. }
                | Self::NoMatchingSchema
                | Self::ValueCountMismatch { .. }
                | Self::Conversion { .. }
                | Self::Record(_)
                | Self::Column(_)
        )
    }
}

/// Errors raised while loading a YAML mapping file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mapping YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern in schema '{schema}': {source}")]
    Pattern {
        schema: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid mapping: {0}")]
    Invalid(String),

    #[error(transparent)]
    Bind(#[from] BindError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_error_display() {
        let err = ColumnError {
            record: 3,
            column: "age".to_string(),
            physical_index: 2,
            logical_index: Some(1),
            source: ValueError::Parse {
                raw: "abc".to_string(),
                expected: "int",
                reason: "invalid digit found in string".to_string(),
            },
        };

        let msg = err.to_string();
        assert!(msg.contains("record 3"));
        assert!(msg.contains("'age'"));
        assert!(msg.contains("physical 2"));
        assert!(msg.contains("'abc'"));
    }

    #[test]
    fn test_record_errors_are_classified() {
        assert!(BindError::NoMatchingSchema.is_record_error());
        assert!(BindError::NullAssignedToNonNullable {
            member: "x".to_string(),
            record: 1,
            logical_index: 0,
        }
        .is_record_error());
        assert!(!BindError::ReadOnlyMember("x".to_string()).is_record_error());
        assert!(!BindError::bad_path("a..b", "empty segment").is_record_error());
    }

    #[test]
    fn test_conversion_is_attributed_once() {
        let err = BindError::Conversion {
            member: "qty".to_string(),
            record: None,
            logical_index: None,
            source: ValueError::UnexpectedNull { expected: "u32" },
        };
        assert_eq!(err.to_string(), "member 'qty': null is not a valid u32");

        let err = err.at_column(4, 2).at_column(9, 9);
        assert!(matches!(
            err,
            BindError::Conversion {
                record: Some(4),
                logical_index: Some(2),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "record 4, column 2: member 'qty': null is not a valid u32"
        );
    }
}
