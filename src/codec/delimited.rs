//! Delimited text codec backed by the `csv` crate.

use std::io;
use std::sync::Arc;

use super::{CodecOptions, RecordContext, RecordReader, RecordWriter};
use crate::error::RecordError;

/// Reader over delimited text. When the options declare a header, the first
/// line is consumed as column names.
pub struct DelimitedReader<R> {
    inner: csv::Reader<R>,
    record: csv::StringRecord,
    current: Vec<String>,
    headers: Option<Vec<String>>,
    context: RecordContext,
}

impl<R: io::Read> DelimitedReader<R> {
    pub fn new(reader: R, options: CodecOptions) -> Self {
        let inner = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self {
            inner,
            record: csv::StringRecord::new(),
            current: Vec::new(),
            headers: None,
            context: RecordContext::new(Arc::new(options)),
        }
    }

    /// Attach a stream-wide property, such as the source file name.
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.context = self.context.with_property(key, value);
        self
    }

    /// Column names from the header line, once it has been read.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    fn next_record(&mut self) -> Result<bool, RecordError> {
        if self.context.options().has_header && self.headers.is_none() {
            if !self.inner.read_record(&mut self.record)? {
                return Ok(false);
            }
            self.headers = Some(self.record.iter().map(String::from).collect());
        }
        if !self.inner.read_record(&mut self.record)? {
            self.current.clear();
            return Ok(false);
        }
        self.current = self.record.iter().map(String::from).collect();
        Ok(true)
    }
}

impl<R: io::Read> RecordReader for DelimitedReader<R> {
    fn read(&mut self) -> Result<bool, RecordError> {
        let found = self.next_record()?;
        if found {
            self.context.advance(true);
        }
        Ok(found)
    }

    fn skip(&mut self) -> Result<bool, RecordError> {
        let found = self.next_record()?;
        if found {
            self.context.advance(false);
        }
        Ok(found)
    }

    fn raw_values(&self) -> &[String] {
        &self.current
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

/// Writer producing delimited text, one record per line.
pub struct DelimitedWriter<W: io::Write> {
    inner: csv::Writer<W>,
    context: RecordContext,
}

impl<W: io::Write> DelimitedWriter<W> {
    pub fn new(writer: W, options: CodecOptions) -> Self {
        let inner = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(csv::Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(writer);
        Self {
            inner,
            context: RecordContext::new(Arc::new(options)),
        }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, RecordError> {
        self.inner
            .into_inner()
            .map_err(|e| RecordError::Io(e.into_error()))
    }
}

impl<W: io::Write> RecordWriter for DelimitedWriter<W> {
    fn write(&mut self, tokens: &[String]) -> Result<(), RecordError> {
        self.inner.write_record(tokens)?;
        self.context.advance(true);
        Ok(())
    }

    fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError> {
        self.inner.write_record(names)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        self.inner.flush()?;
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
    fn test_reads_quoted_fields_and_header() {
        let input = "id|name\n1|\"Smith| John\"\n2|Ann\n";
        let options = CodecOptions::default().with_delimiter(b'|').with_header(true);
        let mut reader = DelimitedReader::new(input.as_bytes(), options);

        assert!(reader.read().unwrap());
        assert_eq!(reader.headers().unwrap(), ["id", "name"]);
        assert_eq!(reader.raw_values(), ["1", "Smith| John"]);
        assert!(reader.skip().unwrap());
        assert!(!reader.read().unwrap());
        assert_eq!(reader.metadata().physical_record_number(), 2);
        assert_eq!(reader.metadata().logical_record_number(), 1);
    }

    #[test]
    fn test_writer_round_trip() {
        let mut writer = DelimitedWriter::new(Vec::new(), CodecOptions::default());
        writer
            .write_schema(&["id".to_string(), "note".to_string()])
            .unwrap();
        writer
            .write(&["1".to_string(), "a, b".to_string()])
            .unwrap();
        let bytes = writer.into_inner().unwrap();

        assert_eq!(String::from_utf8(bytes).unwrap(), "id,note\n1,\"a, b\"\n");
    }
}
