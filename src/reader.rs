//! Typed readers: a record stream, a schema and an entity mapper combined.

use std::any::Any;
use std::sync::Arc;

use crate::codec::{AsyncRecordReader, RecordContext, RecordReader};
use crate::config::MapperOptions;
use crate::error::BindError;
use crate::mapper::EntityMapper;
use crate::mapping::Mapping;
use crate::schema::Schema;

/// Reads entities of type `T` from a blocking record stream.
///
/// A failed `read` leaves the stream positioned after the offending record,
/// so the caller may log the error and keep reading.
pub struct TypedReader<R, T> {
    reader: R,
    schema: Arc<Schema>,
    mapper: EntityMapper<T>,
    current: Option<T>,
}

impl<R: RecordReader, T: Any> TypedReader<R, T> {
    /// Compiles the mapping eagerly; configuration errors surface here.
    pub fn new(reader: R, mapping: &Mapping<T>) -> Result<Self, BindError> {
        Self::with_options(reader, mapping, &MapperOptions::default())
    }

    pub fn with_options(reader: R, mapping: &Mapping<T>, options: &MapperOptions) -> Result<Self, BindError> {
        let mapper = EntityMapper::from_mapping(mapping, options)?;
        mapper.prepare_reader()?;
        Ok(Self {
            reader,
            schema: Arc::clone(mapping.schema()),
            mapper,
            current: None,
        })
    }

    /// Advance to the next record and map it. Returns `false` at end of
    /// stream.
    pub fn read(&mut self) -> Result<bool, BindError> {
        self.current = None;
        if !self.reader.read()? {
            return Ok(false);
        }
        let ctx = self.reader.metadata();
        let values = self.schema.parse_record(ctx, self.reader.raw_values())?;
        self.current = Some(self.mapper.read(ctx, &values)?);
        Ok(true)
    }

    /// Advance past the next record without parsing it.
    pub fn skip(&mut self) -> Result<bool, BindError> {
        self.current = None;
        Ok(self.reader.skip()?)
    }

    /// Entity of the last successful `read`.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<T> {
        self.current.take()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn metadata(&self) -> &RecordContext {
        self.reader.metadata()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: RecordReader, T: Any> Iterator for TypedReader<R, T> {
    type Item = Result<T, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Ok(true) => self.take_current().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Reads entities of type `T` from a suspendable record stream.
pub struct AsyncTypedReader<R, T> {
    reader: R,
    schema: Arc<Schema>,
    mapper: EntityMapper<T>,
    current: Option<T>,
}

impl<R: AsyncRecordReader, T: Any> AsyncTypedReader<R, T> {
    pub fn new(reader: R, mapping: &Mapping<T>) -> Result<Self, BindError> {
        Self::with_options(reader, mapping, &MapperOptions::default())
    }

    pub fn with_options(reader: R, mapping: &Mapping<T>, options: &MapperOptions) -> Result<Self, BindError> {
        let mapper = EntityMapper::from_mapping(mapping, options)?;
        mapper.prepare_reader()?;
        Ok(Self {
            reader,
            schema: Arc::clone(mapping.schema()),
            mapper,
            current: None,
        })
    }

    pub async fn read(&mut self) -> Result<bool, BindError> {
        self.current = None;
        if !self.reader.read().await? {
            return Ok(false);
        }
        let ctx = self.reader.metadata();
        let values = self.schema.parse_record(ctx, self.reader.raw_values())?;
        self.current = Some(self.mapper.read(ctx, &values)?);
        Ok(true)
    }

    pub async fn skip(&mut self) -> Result<bool, BindError> {
        self.current = None;
        Ok(self.reader.skip().await?)
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<T> {
        self.current.take()
    }

    /// Next entity, or `None` at end of stream.
    pub async fn next_entity(&mut self) -> Option<Result<T, BindError>> {
        match self.read().await {
            Ok(true) => self.take_current().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }

    pub fn metadata(&self) -> &RecordContext {
        self.reader.metadata()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MemoryReader;
    use crate::column::Column;
    use crate::field;
    use crate::mapping::TypeMapping;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Sale {
        sku: String,
        qty: u32,
    }

    fn mapping() -> Mapping<Sale> {
        let mut mapping = TypeMapping::<Sale>::new();
        mapping.member(field!(Sale, sku).unwrap(), Column::string("sku")).unwrap();
        mapping.member(field!(Sale, qty).unwrap(), Column::int("qty")).unwrap();
        mapping.finish()
    }

    #[test]
    fn test_read_then_recover_after_bad_record() {
        let source = MemoryReader::from_rows(&[&["A1", "2"], &["B2", "lots"], &["C3", "5"]]);
        let mut reader = TypedReader::new(source, &mapping()).unwrap();

        assert!(reader.read().unwrap());
        assert_eq!(reader.current().unwrap().sku, "A1");

        let err = reader.read().unwrap_err();
        assert!(err.is_record_error());
        assert!(reader.current().is_none());

        assert!(reader.read().unwrap());
        assert_eq!(reader.current().unwrap().qty, 5);
        assert!(!reader.read().unwrap());
    }

    #[test]
    fn test_iterator_and_skip() {
        let source = MemoryReader::from_rows(&[&["A1", "2"], &["B2", "3"], &["C3", "4"]]);
        let mut reader = TypedReader::new(source, &mapping()).unwrap();
        assert!(TypedReader::skip(&mut reader).unwrap());

        let sales: Vec<Sale> = reader.by_ref().collect::<Result<_, _>>().unwrap();

        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].sku, "B2");
        assert_eq!(reader.metadata().physical_record_number(), 3);
        assert_eq!(reader.metadata().logical_record_number(), 2);
    }

    #[test]
    fn test_text_round_trips_verbatim() {
        let sales = vec![
            Sale {
                sku: String::new(),
                qty: 1,
            },
            Sale {
                sku: " padded ".to_string(),
                qty: 2,
            },
        ];
        let mut writer = crate::TypedWriter::new(crate::codec::MemoryWriter::new(), &mapping()).unwrap();
        writer.write_all(&sales).unwrap();
        let records = writer.into_inner().into_records();
        assert_eq!(records[0], ["", "1"]);
        assert_eq!(records[1], [" padded ", "2"]);

        let read: Vec<Sale> = TypedReader::new(MemoryReader::new(records), &mapping())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(read, sales);
    }

    #[tokio::test]
    async fn test_async_reader() {
        let source = MemoryReader::from_rows(&[&["A1", "2"]]);
        let mut reader = AsyncTypedReader::new(source, &mapping()).unwrap();

        let sale = reader.next_entity().await.unwrap().unwrap();
        assert_eq!(
            sale,
            Sale {
                sku: "A1".to_string(),
                qty: 2
            }
        );
        assert!(reader.next_entity().await.is_none());
    }
}
