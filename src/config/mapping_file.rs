//! YAML mapping files.
//!
//! A mapping file describes one or more record layouts for
//! [`DynamicRecord`] entities, so a flat file can be read without writing
//! Rust types for it.
//!
//! ```yaml
//! codec:
//!   delimiter: '|'
//! schemas:
//!   - name: header
//!     when: { column: 0, matches: "^H$" }
//!     columns:
//!       - { name: RecordType }
//!       - { name: BatchId, type: int, nullable: false }
//!   - name: detail
//!     columns:
//!       - { name: RecordType }
//!       - { name: Amount, type: float, member: payment.amount }
//!       - { name: Filler, ignored: true }
//! ```
//!
//! Columns bind to the member named by `member`, or to the snake_case form
//! of the column name. At most one schema may omit `when`; it becomes the
//! default schema.

use convert_case::{Case, Casing};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::MapperOptions;
use crate::accessor::MemberAccessor;
use crate::codec::{CodecOptions, ColumnContext, RecordContext};
use crate::column::{Column, ColumnDefinition, ColumnType};
use crate::entity::{DynamicRecord, EntityType};
use crate::error::ConfigError;
use crate::generator::Strategy;
use crate::mapping::{Mapping, TypeMapping};
use crate::multiplex::{Dispatcher, Variant};
use crate::path::MemberPath;
use crate::value::Value;

/// Root of a mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingFile {
    #[serde(default = "default_options")]
    pub options: MapperOptions,

    #[serde(default)]
    pub codec: CodecOptions,

    pub schemas: Vec<SchemaDef>,
}

fn default_options() -> MapperOptions {
    MapperOptions::reflection()
}

/// One record layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,

    /// Selects the records this layout applies to.
    #[serde(default)]
    pub when: Option<WhenDef>,

    pub columns: Vec<ColumnDef>,
}

/// Matches a regular expression against one raw column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhenDef {
    pub column: usize,
    pub matches: String,
}

/// One column of a layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,

    #[serde(rename = "type", default)]
    pub column_type: ColumnType,

    /// Dot-qualified member path.
    #[serde(default)]
    pub member: Option<String>,

    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Token read as null. Text columns have none unless one is given.
    #[serde(default)]
    pub null_token: Option<String>,

    /// Raw token substituted for null tokens.
    #[serde(default)]
    pub default: Option<String>,

    /// chrono format for date and datetime columns.
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub trim: Option<bool>,

    #[serde(default)]
    pub ignored: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    /// Member path this column binds to.
    pub fn member_path(&self) -> String {
        self.member
            .clone()
            .unwrap_or_else(|| self.name.to_case(Case::Snake))
    }

    fn to_column(&self) -> Result<Column, ConfigError> {
        if self.ignored {
            return Ok(Column::ignored(&self.name));
        }
        let mut column = Column::new(&self.name, self.column_type);
        if !self.nullable {
            column = column.not_null();
        }
        if let Some(token) = &self.null_token {
            column = column.with_null_token(token);
        }
        if let Some(format) = &self.format {
            column = column.with_format(format);
        }
        if let Some(trim) = self.trim {
            column = column.with_trim(trim);
        }
        if let Some(raw) = &self.default {
            let record = RecordContext::default();
            let value = column
                .parse(&ColumnContext::new(&record, &self.name, 0, 0), raw)
                .map_err(|e| ConfigError::Invalid(format!("default of column '{}': {}", self.name, e)))?;
            column = column.with_default(value);
        }
        Ok(column)
    }
}

impl MappingFile {
    /// Load and validate a mapping file.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// describes an inconsistent mapping.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file = Self::from_yaml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            schemas = file.schemas.len(),
            "loaded mapping file"
        );
        Ok(file)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: Self = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schemas.is_empty() {
            return Err(ConfigError::Invalid("no schemas defined".to_string()));
        }
        if self.options.strategy == Strategy::Generated && !self.options.fallback_to_reflection {
            return Err(ConfigError::Invalid(
                "mapping files bind dynamic records; use the reflection strategy or enable fallback_to_reflection"
                    .to_string(),
            ));
        }

        let defaults: Vec<&str> = self
            .schemas
            .iter()
            .filter(|s| s.when.is_none())
            .map(|s| s.name.as_str())
            .collect();
        if defaults.len() > 1 {
            return Err(ConfigError::Invalid(format!(
                "only one schema may omit 'when', found {}",
                defaults.join(", ")
            )));
        }

        let mut names = HashSet::new();
        for schema in &self.schemas {
            if !names.insert(schema.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate schema '{}'", schema.name)));
            }
            if schema.columns.is_empty() {
                return Err(ConfigError::Invalid(format!("schema '{}' has no columns", schema.name)));
            }
            if let Some(when) = &schema.when {
                if when.column >= schema.columns.len() {
                    return Err(ConfigError::Invalid(format!(
                        "schema '{}' selects on column {} but has {} columns",
                        schema.name,
                        when.column,
                        schema.columns.len()
                    )));
                }
                Regex::new(&when.matches).map_err(|source| ConfigError::Pattern {
                    schema: schema.name.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Build the mappings of every schema.
    pub fn build(&self) -> Result<BuiltMapping, ConfigError> {
        let mut schemas = Vec::with_capacity(self.schemas.len());
        for def in &self.schemas {
            schemas.push(build_schema(def)?);
        }
        Ok(BuiltMapping {
            schemas,
            options: self.options.clone(),
            codec: self.codec.clone(),
        })
    }
}

fn build_schema(def: &SchemaDef) -> Result<BuiltSchema, ConfigError> {
    let mut mapping = TypeMapping::<DynamicRecord>::for_type(EntityType::self_nesting::<DynamicRecord>());
    for column_def in &def.columns {
        let column = column_def.to_column()?;
        if column.is_ignored() {
            mapping.ignored(column);
            continue;
        }
        let path = MemberPath::parse(&column_def.member_path())?;
        if mapping.registry().member(&path.to_string()).is_some() {
            return Err(ConfigError::Invalid(format!(
                "schema '{}' binds member '{}' twice",
                def.name, path
            )));
        }
        let accessor = DynamicRecord::accessor(&path, column.is_nullable())?;
        mapping.member(accessor, column)?;
    }
    let mapping = mapping.finish();

    let when = match &def.when {
        Some(when) => {
            let pattern = Regex::new(&when.matches).map_err(|source| ConfigError::Pattern {
                schema: def.name.clone(),
                source,
            })?;
            let member = mapping.registry().bindings()[when.column]
                .as_member()
                .map(|m| Arc::clone(m.accessor()));
            Some(Selector {
                column: when.column,
                pattern,
                member,
            })
        }
        None => None,
    };

    tracing::debug!(
        schema = %def.name,
        columns = def.columns.len(),
        "built schema mapping"
    );
    Ok(BuiltSchema {
        name: def.name.clone(),
        mapping,
        when,
    })
}

struct Selector {
    column: usize,
    pattern: Regex,
    member: Option<Arc<MemberAccessor>>,
}

/// A built layout.
pub struct BuiltSchema {
    pub name: String,
    pub mapping: Mapping<DynamicRecord>,
    when: Option<Selector>,
}

impl BuiltSchema {
    pub fn is_default(&self) -> bool {
        self.when.is_none()
    }
}

/// All layouts of a mapping file, ready to read and write.
pub struct BuiltMapping {
    pub schemas: Vec<BuiltSchema>,
    pub options: MapperOptions,
    pub codec: CodecOptions,
}

fn project_record(record: &DynamicRecord) -> Option<&DynamicRecord> {
    Some(record)
}

fn selector_token(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl BuiltMapping {
    pub fn schema(&self, name: &str) -> Option<&BuiltSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Dispatcher over every layout, in file order with the default last.
    ///
    /// On write, a record selects a layout when the member bound to the
    /// selector column matches the pattern. Layouts whose selector column is
    /// ignored never match on write.
    pub fn dispatcher(&self) -> Dispatcher<DynamicRecord> {
        let mut dispatcher = Dispatcher::with_options(self.options.clone());
        for schema in &self.schemas {
            let variant = Variant::new(schema.mapping.clone(), std::convert::identity, project_record)
                .named(schema.name.clone());
            match &schema.when {
                Some(selector) => {
                    let column = selector.column;
                    let read_pattern = selector.pattern.clone();
                    let write_pattern = selector.pattern.clone();
                    let member = selector.member.clone();
                    dispatcher = dispatcher.when(
                        variant
                            .reading_when(move |raw| {
                                raw.get(column).is_some_and(|token| read_pattern.is_match(token))
                            })
                            .writing_when(move |record| {
                                member
                                    .as_ref()
                                    .and_then(|m| m.get(record).ok())
                                    .is_some_and(|value| write_pattern.is_match(&selector_token(&value)))
                            }),
                    );
                }
                None => dispatcher = dispatcher.otherwise(variant),
            }
        }
        dispatcher
    }
}
