//! JSON output and input for bound entities.
//!
//! The CLI converts flat files to NDJSON or a JSON array and back. Any
//! `Serialize` entity can be written; NDJSON input is read as
//! [`DynamicRecord`]s.

use serde::Serialize;
use std::io::{BufRead, Write};
use thiserror::Error;

use crate::entity::DynamicRecord;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: usize },
}

/// Writes entities as NDJSON, one JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write<T: Serialize>(&mut self, entity: &T) -> Result<(), SerializationError> {
        serde_json::to_writer(&mut self.writer, entity)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes entities as a single JSON array.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Create the writer and emit the opening bracket.
    pub fn new(mut writer: W) -> Result<Self, SerializationError> {
        writer.write_all(b"[")?;
        Ok(Self {
            writer,
            first: true,
        })
    }

    pub fn write<T: Serialize>(&mut self, entity: &T) -> Result<(), SerializationError> {
        if !self.first {
            self.writer.write_all(b",")?;
        }
        self.first = false;
        serde_json::to_writer(&mut self.writer, entity)?;
        Ok(())
    }

    /// Close the array and flush.
    pub fn finish(mut self) -> Result<W, SerializationError> {
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads NDJSON objects as [`DynamicRecord`]s. Blank lines are skipped.
pub struct NdjsonReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = Result<DynamicRecord, SerializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<serde_json::Value>(&line)
                .map_err(SerializationError::from)
                .and_then(|json| {
                    DynamicRecord::from_json(&json)
                        .ok_or(SerializationError::NotAnObject { line: self.line })
                });
            return Some(parsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[derive(Serialize)]
    struct TestEntity {
        name: String,
        value: i32,
    }

    #[test]
    fn test_ndjson_writer() {
        let mut buf = Vec::new();
        let mut writer = NdjsonWriter::new(&mut buf);

        writer
            .write(&TestEntity {
                name: "Alice".to_string(),
                value: 42,
            })
            .unwrap();
        writer
            .write(&TestEntity {
                name: "Bob".to_string(),
                value: 24,
            })
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines, vec![r#"{"name":"Alice","value":42}"#, r#"{"name":"Bob","value":24}"#]);
    }

    #[test]
    fn test_json_array_writer() {
        let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
        writer.write(&1).unwrap();
        writer.write(&2).unwrap();

        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(output, "[1,2]");
    }

    #[test]
    fn test_ndjson_reader() {
        let input = "{\"id\": 1, \"payment\": {\"amount\": 2.5}}\n\n[1]\n";
        let mut reader = NdjsonReader::new(input.as_bytes());

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(
            record.child("payment").and_then(|p| p.get("amount")),
            Some(&Value::Float(2.5))
        );

        assert!(matches!(
            reader.next(),
            Some(Err(SerializationError::NotAnObject { line: 3 }))
        ));
        assert!(reader.next().is_none());
    }
}
