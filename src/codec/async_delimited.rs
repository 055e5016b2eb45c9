//! Suspendable delimited text codec over tokio I/O.
//!
//! Lines are read with `AsyncBufReadExt::lines` and tokenized with the same
//! `csv` settings as the blocking codec, so quoted fields may not span lines.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use super::{AsyncRecordReader, AsyncRecordWriter, CodecOptions, RecordContext};
use crate::error::RecordError;

fn tokenize(line: &str, options: &CodecOptions) -> Result<Vec<String>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(record.iter().map(String::from).collect())
    } else {
        Ok(Vec::new())
    }
}

fn format_line(tokens: &[String], options: &CodecOptions) -> Result<Vec<u8>, RecordError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(tokens)?;
    writer
        .into_inner()
        .map_err(|e| RecordError::Io(e.into_error()))
}

/// Async reader over delimited lines.
pub struct AsyncDelimitedReader<R> {
    lines: Lines<R>,
    current: Vec<String>,
    headers: Option<Vec<String>>,
    context: RecordContext,
}

impl<R: AsyncBufRead + Unpin> AsyncDelimitedReader<R> {
    pub fn new(reader: R, options: CodecOptions) -> Self {
        Self {
            lines: reader.lines(),
            current: Vec::new(),
            headers: None,
            context: RecordContext::new(Arc::new(options)),
        }
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    async fn next_tokens(&mut self) -> Result<Option<Vec<String>>, RecordError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            return tokenize(&line, self.context.options()).map(Some);
        }
        Ok(None)
    }

    async fn next_record(&mut self) -> Result<bool, RecordError> {
        if self.context.options().has_header && self.headers.is_none() {
            match self.next_tokens().await? {
                Some(headers) => self.headers = Some(headers),
                None => return Ok(false),
            }
        }
        match self.next_tokens().await? {
            Some(tokens) => {
                self.current = tokens;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }
}

impl<R: AsyncBufRead + Unpin> AsyncRecordReader for AsyncDelimitedReader<R> {
    async fn read(&mut self) -> Result<bool, RecordError> {
        let found = self.next_record().await?;
        if found {
            self.context.advance(true);
        }
        Ok(found)
    }

    async fn skip(&mut self) -> Result<bool, RecordError> {
        let found = self.next_record().await?;
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

/// Async writer producing delimited lines.
pub struct AsyncDelimitedWriter<W> {
    inner: W,
    context: RecordContext,
}

impl<W: AsyncWrite + Unpin> AsyncDelimitedWriter<W> {
    pub fn new(writer: W, options: CodecOptions) -> Self {
        Self {
            inner: writer,
            context: RecordContext::new(Arc::new(options)),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncRecordWriter for AsyncDelimitedWriter<W> {
    async fn write(&mut self, tokens: &[String]) -> Result<(), RecordError> {
        let line = format_line(tokens, self.context.options())?;
        self.inner.write_all(&line).await?;
        self.context.advance(true);
        Ok(())
    }

    async fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError> {
        let line = format_line(names, self.context.options())?;
        self.inner.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RecordError> {
        self.inner.flush().await?;
        Ok(())
    }

    fn metadata(&self) -> &RecordContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_async_reader_skips_blank_lines() {
        let input = "name,age\nAnn,31\n\n\"Lee, Jo\",40\n";
        let options = CodecOptions::default().with_header(true);
        let mut reader = AsyncDelimitedReader::new(input.as_bytes(), options);

        assert!(reader.read().await.unwrap());
        assert_eq!(reader.raw_values(), ["Ann", "31"]);
        assert!(reader.read().await.unwrap());
        assert_eq!(reader.raw_values(), ["Lee, Jo", "40"]);
        assert!(!reader.read().await.unwrap());
        assert_eq!(reader.headers().unwrap(), ["name", "age"]);
    }

    #[tokio::test]
    async fn test_async_writer() {
        let options = CodecOptions::default().with_delimiter(b';');
        let mut writer = AsyncDelimitedWriter::new(Vec::new(), options);
        writer.write_schema(&["a".to_string(), "b".to_string()]).await.unwrap();
        writer.write(&["1".to_string(), "x;y".to_string()]).await.unwrap();
        writer.flush().await.unwrap();

        let bytes = writer.into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a;b\n1;\"x;y\"\n");
    }
}
