//! Typed writers: an entity mapper, a schema and a record sink combined.

use std::any::Any;
use std::sync::Arc;

use crate::codec::{AsyncRecordWriter, RecordContext, RecordWriter};
use crate::config::MapperOptions;
use crate::error::BindError;
use crate::mapper::EntityMapper;
use crate::mapping::Mapping;
use crate::schema::Schema;
use crate::value::Value;

/// Writes entities of type `T` to a blocking record sink.
pub struct TypedWriter<W, T> {
    writer: W,
    schema: Arc<Schema>,
    mapper: EntityMapper<T>,
}

impl<W: RecordWriter, T: Any> TypedWriter<W, T> {
    /// Compiles the mapping eagerly; configuration errors surface here.
    pub fn new(writer: W, mapping: &Mapping<T>) -> Result<Self, BindError> {
        Self::with_options(writer, mapping, &MapperOptions::default())
    }

    pub fn with_options(writer: W, mapping: &Mapping<T>, options: &MapperOptions) -> Result<Self, BindError> {
        let mapper = EntityMapper::from_mapping(mapping, options)?;
        mapper.prepare_writer()?;
        Ok(Self {
            writer,
            schema: Arc::clone(mapping.schema()),
            mapper,
        })
    }

    /// Write a header line with the schema's column names.
    pub fn write_schema(&mut self) -> Result<(), BindError> {
        self.writer.write_schema(&self.schema.column_names())?;
        Ok(())
    }

    pub fn write(&mut self, entity: &T) -> Result<(), BindError> {
        let ctx = self.writer.metadata();
        let mut values = vec![Value::Null; self.mapper.logical_count()];
        self.mapper.write(ctx, entity, &mut values)?;
        let tokens = self.schema.format_record(ctx, &values)?;
        self.writer.write(&tokens)?;
        Ok(())
    }

    pub fn write_all<'a, I>(&mut self, entities: I) -> Result<(), BindError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        for entity in entities {
            self.write(entity)?;
        }
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

/// Writes entities of type `T` to a suspendable record sink.
pub struct AsyncTypedWriter<W, T> {
    writer: W,
    schema: Arc<Schema>,
    mapper: EntityMapper<T>,
}

impl<W: AsyncRecordWriter, T: Any> AsyncTypedWriter<W, T> {
    pub fn new(writer: W, mapping: &Mapping<T>) -> Result<Self, BindError> {
        Self::with_options(writer, mapping, &MapperOptions::default())
    }

    pub fn with_options(writer: W, mapping: &Mapping<T>, options: &MapperOptions) -> Result<Self, BindError> {
        let mapper = EntityMapper::from_mapping(mapping, options)?;
        mapper.prepare_writer()?;
        Ok(Self {
            writer,
            schema: Arc::clone(mapping.schema()),
            mapper,
        })
    }

    pub async fn write_schema(&mut self) -> Result<(), BindError> {
        let names = self.schema.column_names();
        self.writer.write_schema(&names).await?;
        Ok(())
    }

    pub async fn write(&mut self, entity: &T) -> Result<(), BindError> {
        let ctx = self.writer.metadata();
        let mut values = vec![Value::Null; self.mapper.logical_count()];
        self.mapper.write(ctx, entity, &mut values)?;
        let tokens = self.schema.format_record(ctx, &values)?;
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
