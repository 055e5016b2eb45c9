//! Multiplexed readers and writers over record streams.

use crate::codec::{AsyncRecordReader, AsyncRecordWriter, RecordContext, RecordReader, RecordWriter};
use crate::error::BindError;

use super::Dispatcher;

/// Reads values of `E` from a blocking stream holding several record types.
pub struct MultiplexedReader<R, E> {
    reader: R,
    dispatcher: Dispatcher<E>,
    current: Option<E>,
}

impl<R: RecordReader, E: 'static> MultiplexedReader<R, E> {
    pub fn new(reader: R, dispatcher: Dispatcher<E>) -> Self {
        Self {
            reader,
            dispatcher,
            current: None,
        }
    }

    pub fn read(&mut self) -> Result<bool, BindError> {
        self.current = None;
        if !self.reader.read()? {
            return Ok(false);
        }
        let value = self
            .dispatcher
            .decode(self.reader.metadata(), self.reader.raw_values())?;
        self.current = Some(value);
        Ok(true)
    }

    pub fn skip(&mut self) -> Result<bool, BindError> {
        self.current = None;
        Ok(self.reader.skip()?)
    }

    pub fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<E> {
        self.current.take()
    }

    pub fn metadata(&self) -> &RecordContext {
        self.reader.metadata()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: RecordReader, E: 'static> Iterator for MultiplexedReader<R, E> {
    type Item = Result<E, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Ok(true) => self.take_current().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Writes values of `E` to a blocking sink, each with its own layout.
pub struct MultiplexedWriter<W, E> {
    writer: W,
    dispatcher: Dispatcher<E>,
}

impl<W: RecordWriter, E: 'static> MultiplexedWriter<W, E> {
    pub fn new(writer: W, dispatcher: Dispatcher<E>) -> Self {
        Self { writer, dispatcher }
    }

    /// Write the header of the layout that `value` would be written with.
    pub fn write_schema_for(&mut self, value: &E) -> Result<(), BindError> {
        let names = self.dispatcher.header_for(value)?;
        self.writer.write_schema(&names)?;
        Ok(())
    }

    pub fn write(&mut self, value: &E) -> Result<(), BindError> {
        let tokens = self.dispatcher.encode(self.writer.metadata(), value)?;
        self.writer.write(&tokens)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), BindError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn metadata(&self) -> &RecordContext {
        self.writer.metadata()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Suspendable twin of [`MultiplexedReader`].
pub struct AsyncMultiplexedReader<R, E> {
    reader: R,
    dispatcher: Dispatcher<E>,
    current: Option<E>,
}

impl<R: AsyncRecordReader, E: 'static> AsyncMultiplexedReader<R, E> {
    pub fn new(reader: R, dispatcher: Dispatcher<E>) -> Self {
        Self {
            reader,
            dispatcher,
            current: None,
        }
    }

    pub async fn read(&mut self) -> Result<bool, BindError> {
        self.current = None;
        if !self.reader.read().await? {
            return Ok(false);
        }
        let value = self
            .dispatcher
            .decode(self.reader.metadata(), self.reader.raw_values())?;
        self.current = Some(value);
        Ok(true)
    }

    pub async fn skip(&mut self) -> Result<bool, BindError> {
        self.current = None;
        Ok(self.reader.skip().await?)
    }

    pub fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<E> {
        self.current.take()
    }

    pub async fn next_value(&mut self) -> Option<Result<E, BindError>> {
        match self.read().await {
            Ok(true) => self.take_current().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }

    pub fn metadata(&self) -> &RecordContext {
        self.reader.metadata()
    }
}

/// Suspendable twin of [`MultiplexedWriter`].
pub struct AsyncMultiplexedWriter<W, E> {
    writer: W,
    dispatcher: Dispatcher<E>,
}

impl<W: AsyncRecordWriter, E: 'static> AsyncMultiplexedWriter<W, E> {
    pub fn new(writer: W, dispatcher: Dispatcher<E>) -> Self {
        Self { writer, dispatcher }
    }

    pub async fn write_schema_for(&mut self, value: &E) -> Result<(), BindError> {
        let names = self.dispatcher.header_for(value)?;
        self.writer.write_schema(&names).await?;
        Ok(())
    }

    pub async fn write(&mut self, value: &E) -> Result<(), BindError> {
        let tokens = self.dispatcher.encode(self.writer.metadata(), value)?;
        self.writer.write(&tokens).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), BindError> {
        self.writer.flush().await?;
        Ok(())
    }

    pub fn metadata(&self) -> &RecordContext {
        self.writer.metadata()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
