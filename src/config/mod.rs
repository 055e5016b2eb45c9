//! Configuration: mapper options and YAML mapping files.

pub mod mapping_file;
pub mod options;

pub use mapping_file::{BuiltMapping, BuiltSchema, ColumnDef, MappingFile, SchemaDef, WhenDef};
pub use options::MapperOptions;
