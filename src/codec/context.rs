//! Record and column contexts handed to mappers and column definitions.
//!
//! A [`RecordContext`] is owned by the codec and describes the record it most
//! recently produced or consumed. A [`ColumnContext`] narrows it to a single
//! column position.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Options shared by every record of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Field separator.
    #[serde(serialize_with = "ascii_out", deserialize_with = "ascii_in")]
    pub delimiter: u8,

    /// Quote character.
    #[serde(serialize_with = "ascii_out", deserialize_with = "ascii_in")]
    pub quote: u8,

    /// Whether the first line holds column names.
    pub has_header: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: false,
        }
    }
}

impl CodecOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

fn ascii_out<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_char(char::from(*value))
}

fn ascii_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let c = char::deserialize(deserializer)?;
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| serde::de::Error::custom(format!("'{}' is not an ASCII character", c)))
}

/// Position of the current record within its stream.
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    /// Records seen so far, including skipped ones.
    physical_record_number: u64,

    /// Records handed to the caller so far.
    logical_record_number: u64,

    options: Arc<CodecOptions>,

    /// Stream-wide properties such as the source file name.
    properties: HashMap<String, String>,
}

impl RecordContext {
    pub fn new(options: Arc<CodecOptions>) -> Self {
        Self {
            physical_record_number: 0,
            logical_record_number: 0,
            options,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn physical_record_number(&self) -> u64 {
        self.physical_record_number
    }

    pub fn logical_record_number(&self) -> u64 {
        self.logical_record_number
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Count one more record. Skipped records only advance the physical
    /// counter.
    pub(crate) fn advance(&mut self, logical: bool) {
        self.physical_record_number += 1;
        if logical {
            self.logical_record_number += 1;
        }
    }
}

/// A single column position within the current record.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub record: &'a RecordContext,
    pub column: &'a str,
    pub physical_index: usize,
    pub logical_index: usize,
}

impl<'a> ColumnContext<'a> {
    pub fn new(
        record: &'a RecordContext,
        column: &'a str,
        physical_index: usize,
        logical_index: usize,
    ) -> Self {
        Self {
            record,
            column,
            physical_index,
            logical_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_counts_skipped_records_physically() {
        let mut ctx = RecordContext::new(Arc::new(CodecOptions::default()));

        ctx.advance(true);
        ctx.advance(false);
        ctx.advance(true);

        assert_eq!(ctx.physical_record_number(), 3);
        assert_eq!(ctx.logical_record_number(), 2);
    }

    #[test]
    fn test_properties() {
        let ctx = RecordContext::default().with_property("filename", "orders.csv");

        assert_eq!(ctx.property("filename"), Some("orders.csv"));
        assert_eq!(ctx.property("missing"), None);
    }

    #[test]
    fn test_options_from_yaml() {
        let options: CodecOptions = serde_yaml::from_str("delimiter: '|'\nhas_header: true\n").unwrap();

        assert_eq!(options.delimiter, b'|');
        assert_eq!(options.quote, b'"');
        assert!(options.has_header);
        assert!(serde_yaml::from_str::<CodecOptions>("delimiter: 'é'\n").is_err());
    }
}
