//! Line codecs: producers and consumers of raw record tokens.
//!
//! The binding runtime only needs a record stream to hand out the raw tokens
//! of the current record along with its [`RecordContext`]. Blocking streams
//! implement [`RecordReader`]/[`RecordWriter`]; suspendable streams implement
//! the async twins.

pub mod async_delimited;
pub mod context;
pub mod delimited;
pub mod memory;

pub use async_delimited::{AsyncDelimitedReader, AsyncDelimitedWriter};
pub use context::{CodecOptions, ColumnContext, RecordContext};
pub use delimited::{DelimitedReader, DelimitedWriter};
pub use memory::{MemoryReader, MemoryWriter};

use crate::error::RecordError;

/// Blocking source of raw records.
pub trait RecordReader {
    /// Advance to the next record. Returns `false` at end of stream.
    fn read(&mut self) -> Result<bool, RecordError>;

    /// Advance past the next record without handing it out.
    fn skip(&mut self) -> Result<bool, RecordError>;

    /// Tokens of the current record.
    fn raw_values(&self) -> &[String];

    fn metadata(&self) -> &RecordContext;
}

/// Blocking sink of raw records.
pub trait RecordWriter {
    fn write(&mut self, tokens: &[String]) -> Result<(), RecordError>;

    /// Write a header line of column names.
    fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError>;

    fn flush(&mut self) -> Result<(), RecordError> {
        Ok(())
    }

    fn metadata(&self) -> &RecordContext;
}

/// Suspendable source of raw records.
#[allow(async_fn_in_trait)]
pub trait AsyncRecordReader {
    async fn read(&mut self) -> Result<bool, RecordError>;

    async fn skip(&mut self) -> Result<bool, RecordError>;

    fn raw_values(&self) -> &[String];

    fn metadata(&self) -> &RecordContext;
}

/// Suspendable sink of raw records.
#[allow(async_fn_in_trait)]
pub trait AsyncRecordWriter {
    async fn write(&mut self, tokens: &[String]) -> Result<(), RecordError>;

    async fn write_schema(&mut self, names: &[String]) -> Result<(), RecordError>;

    async fn flush(&mut self) -> Result<(), RecordError>;

    fn metadata(&self) -> &RecordContext;
}
