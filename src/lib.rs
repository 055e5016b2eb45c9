//! # flatbind: entity/column binding for flat-file records
//!
//! flatbind maps between strongly typed entities and the ordered column
//! values of delimited records. A mapping binds each column to a member of
//! the entity (possibly nested, `address.city`), to a custom delegate, or
//! marks it ignored. The [`EntityMapper`] compiles the bindings once per
//! type into a bulk reader and writer and then copies values in both
//! directions.
//!
//! ## Example
//!
//! ```
//! use flatbind::{field, Column, CodecOptions, MemoryReader, TypeMapping, TypedReader};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     id: i64,
//!     name: Option<String>,
//! }
//!
//! # fn main() -> Result<(), flatbind::BindError> {
//! let mut mapping = TypeMapping::<Person>::new();
//! mapping.member(field!(Person, id)?, Column::int("id").not_null())?;
//! mapping.member(field!(Person, name)?, Column::string("name").with_null_token(""))?;
//!
//! let source = MemoryReader::from_rows(&[&["1", "Ada"], &["2", ""]]);
//! let people: Vec<Person> = TypedReader::new(source, &mapping.finish())?
//!     .collect::<Result<_, _>>()?;
//!
//! assert_eq!(people[1], Person { id: 2, name: None });
//! # let _ = CodecOptions::default();
//! # Ok(())
//! # }
//! ```
//!
//! ## Strategies
//!
//! - **generated**: per-type compiled accessors, the default
//! - **reflection**: resolves members by name on every record; required for
//!   [`DynamicRecord`] entities described by YAML mapping files
//!
//! ## Multiplexed streams
//!
//! A [`Dispatcher`] routes records of several layouts in one stream to
//! per-type mappers; see [`multiplex`].

#[macro_use]
mod macros;

// Core binding model
pub mod accessor;
pub mod binding;
pub mod entity;
pub mod error;
pub mod path;
pub mod registry;
pub mod value;

// Columns and record layouts
pub mod column;
pub mod schema;

// Mapping and compilation
pub mod generator;
pub mod mapper;
pub mod mapping;

// Record streams
pub mod codec;
pub mod multiplex;
pub mod reader;
pub mod writer;

// YAML mapping files and JSON conversion
pub mod config;
pub mod serialization;

// Re-export key types
pub use accessor::MemberAccessor;
pub use binding::{Binding, CustomDelegates};
pub use entity::{DynamicRecord, EntityType, TypeInfo};
pub use error::{BindError, ColumnError, ConfigError, RecordError, ValueError};
pub use path::MemberPath;
pub use registry::BindingRegistry;
pub use value::{ColumnValue, Value};

pub use column::{Column, ColumnDefinition, ColumnType};
pub use schema::Schema;

pub use generator::{AccessorCodeGenerator, Strategy};
pub use mapper::EntityMapper;
pub use mapping::{Mapping, TypeMapping};

pub use codec::{
    AsyncDelimitedReader, AsyncDelimitedWriter, AsyncRecordReader, AsyncRecordWriter, CodecOptions,
    ColumnContext, DelimitedReader, DelimitedWriter, MemoryReader, MemoryWriter, RecordContext,
    RecordReader, RecordWriter,
};
pub use multiplex::{
    AsyncMultiplexedReader, AsyncMultiplexedWriter, Dispatcher, MultiplexedReader,
    MultiplexedWriter, Variant,
};
pub use reader::{AsyncTypedReader, TypedReader};
pub use writer::{AsyncTypedWriter, TypedWriter};

pub use config::{MapperOptions, MappingFile};
pub use serialization::{JsonArrayWriter, NdjsonReader, NdjsonWriter, SerializationError};
