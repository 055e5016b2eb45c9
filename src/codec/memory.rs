//! In-memory record streams, mostly for tests and for records produced by
//! other means.

use std::collections::VecDeque;
use std::sync::Arc;

use super::{
    AsyncRecordReader, AsyncRecordWriter, CodecOptions, RecordContext, RecordReader, RecordWriter,
};
use crate::error::RecordError;

/// Reader over a queue of token rows.
#[derive(Debug, Default)]
pub struct MemoryReader {
    pending: VecDeque<Vec<String>>,
    current: Vec<String>,
    context: RecordContext,
}

impl MemoryReader {
    pub fn new(records: Vec<Vec<String>>) -> Self {
        Self {
            pending: records.into(),
            current: Vec::new(),
            context: RecordContext::new(Arc::new(CodecOptions::default())),
        }
    }

    /// Build from string slices.
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|token| token.to_string()).collect())
                .collect(),
        )
    }

    fn advance(&mut self, logical: bool) -> bool {
        match self.pending.pop_front() {
            Some(record) => {
                self.current = record;
                self.context.advance(logical);
                true
            }
            None => {
                self.current.clear();
                false
            }
        }
    }
}

impl RecordReader for MemoryReader {
    fn read(&mut self) -> Result<bool, RecordError> {
        Ok(self.advance(true))
    }

    fn skip(&mut self) -> Result<bool, RecordError> {
        Ok(self.advance(false))
    }

    fn raw_values(&self) -> &[String] {
        &self.current
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

impl AsyncRecordReader for MemoryReader {
    async fn read(&mut self) -> Result<bool, RecordError> {
        Ok(self.advance(true))
    }

    async fn skip(&mut self) -> Result<bool, RecordError> {
        Ok(self.advance(false))
    }

    fn raw_values(&self) -> &[String] {
        &self.current
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

/// Writer collecting token rows in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    header: Option<Vec<String>>,
    records: Vec<Vec<String>>,
    context: RecordContext,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Vec<String>> {
        self.records
    }

    fn push(&mut self, tokens: &[String]) {
        self.records.push(tokens.to_vec());
        self.context.advance(true);
    }
}

impl RecordWriter for MemoryWriter {
    fn write(&mut self, tokens: &[String]) -> Result<(), RecordError> {
        self.push(tokens);
        Ok(())
    }

    fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError> {
        self.header = Some(names.to_vec());
        Ok(())
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

impl AsyncRecordWriter for MemoryWriter {
    async fn write(&mut self, tokens: &[String]) -> Result<(), RecordError> {
        self.push(tokens);
        Ok(())
    }

    async fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError> {
        self.header = Some(names.to_vec());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RecordError> {
        Ok(())
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_skip() {
        let mut reader = MemoryReader::from_rows(&[&["a", "1"], &["b", "2"], &["c", "3"]]);

        assert!(RecordReader::read(&mut reader).unwrap());
        assert_eq!(RecordReader::raw_values(&reader), ["a", "1"]);
        assert!(RecordReader::skip(&mut reader).unwrap());
        assert!(RecordReader::read(&mut reader).unwrap());
        assert_eq!(RecordReader::raw_values(&reader), ["c", "3"]);
        assert!(!RecordReader::read(&mut reader).unwrap());

        let ctx = RecordReader::metadata(&reader);
        assert_eq!(ctx.physical_record_number(), 3);
        assert_eq!(ctx.logical_record_number(), 2);
    }

    #[test]
    fn test_writer_collects_rows() {
        let mut writer = MemoryWriter::new();
        RecordWriter::write_schema(&mut writer, &["id".to_string()]).unwrap();
        RecordWriter::write(&mut writer, &["7".to_string()]).unwrap();

        assert_eq!(writer.header(), Some(&["id".to_string()][..]));
        assert_eq!(writer.records(), &[vec!["7".to_string()]]);
    }
}
