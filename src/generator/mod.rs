//! Accessor code generation.
//!
//! A code generator turns the bindings of one entity node into three
//! delegates: a factory, a bulk reader that assigns values into an instance,
//! and a bulk writer that extracts values from it. Two strategies exist:
//!
//! - [`Strategy::Generated`] compiles each binding into a typed step once, so
//!   a record costs a single downcast of the entity.
//! - [`Strategy::Reflection`] walks the bindings on every call through the
//!   type-erased accessor operations.
//!
//! Both produce identical results for the same bindings.

pub(crate) mod generated;
pub mod reflection;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::binding::Binding;
use crate::codec::RecordContext;
use crate::config::MapperOptions;
use crate::entity::EntityType;
use crate::error::BindError;
use crate::registry::{BindingRegistry, Factory};
use crate::value::Value;

pub use generated::GeneratedCodeGenerator;
pub use reflection::ReflectionCodeGenerator;

/// Assigns the node's values into an instance of the node's entity type.
pub type BulkReader =
    Arc<dyn Fn(&RecordContext, &mut dyn Any, &[Value]) -> Result<(), BindError> + Send + Sync>;

/// Extracts the node's values from an instance into the value array.
pub type BulkWriter =
    Arc<dyn Fn(&RecordContext, &dyn Any, &mut [Value]) -> Result<(), BindError> + Send + Sync>;

/// Accessor strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Generated,
    Reflection,
}

/// Produces the factory, reader and writer delegates of an entity node.
pub trait AccessorCodeGenerator: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Factory for `entity`: a factory registered in `registry` wins over
    /// the type's default constructor.
    fn factory(&self, registry: &BindingRegistry, entity: &EntityType) -> Result<Factory, BindError> {
        if let Some(factory) = registry.factory(entity.id()) {
            return Ok(Arc::clone(factory));
        }
        let construct = entity
            .default_constructor()
            .ok_or(BindError::NoDefaultConstructor {
                type_name: entity.name(),
            })?;
        Ok(Arc::new(construct))
    }

    fn reader(&self, entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkReader, BindError>;

    fn writer(&self, entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkWriter, BindError>;
}

/// Code generator for the configured strategy.
pub fn code_generator(options: &MapperOptions) -> Arc<dyn AccessorCodeGenerator> {
    match options.strategy {
        Strategy::Generated => Arc::new(GeneratedCodeGenerator::new(options.fallback_to_reflection)),
        Strategy::Reflection => Arc::new(ReflectionCodeGenerator),
    }
}

/// Value at `index`, failing when the array is too short.
pub(crate) fn value_at(values: &[Value], index: usize) -> Result<&Value, BindError> {
    values.get(index).ok_or(BindError::ValueCountMismatch {
        expected: index + 1,
        actual: values.len(),
    })
}

pub(crate) fn slot_at(values: &mut [Value], index: usize) -> Result<&mut Value, BindError> {
    let actual = values.len();
    values.get_mut(index).ok_or(BindError::ValueCountMismatch {
        expected: index + 1,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::MemberAccessor;
    use crate::column::{Column, ColumnDefinition};
    use crate::entity::{DynamicRecord, TypeInfo};
    use crate::path::MemberPath;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Reading {
        sensor: String,
        celsius: f64,
        note: Option<String>,
    }

    fn bindings() -> Vec<Arc<Binding>> {
        let sensor = MemberAccessor::field(
            "sensor",
            |r: &Reading| r.sensor.clone(),
            |r: &mut Reading, v: String| r.sensor = v,
        )
        .unwrap();
        let celsius = MemberAccessor::field(
            "celsius",
            |r: &Reading| r.celsius,
            |r: &mut Reading, v: f64| r.celsius = v,
        )
        .unwrap();
        let note = MemberAccessor::field(
            "note",
            |r: &Reading| r.note.clone(),
            |r: &mut Reading, v: Option<String>| r.note = v,
        )
        .unwrap();

        let columns: Vec<Arc<dyn ColumnDefinition>> = vec![
            Arc::new(Column::string("sensor")),
            Arc::new(Column::float("celsius")),
            Arc::new(Column::string("note")),
        ];
        [sensor, celsius, note]
            .into_iter()
            .zip(columns)
            .enumerate()
            .map(|(i, (accessor, column))| Arc::new(Binding::member(Arc::new(accessor), column, i, i)))
            .collect()
    }

    fn values() -> Vec<Value> {
        vec![
            Value::String("north".to_string()),
            Value::Float(21.5),
            Value::Null,
        ]
    }

    fn round_trip(strategy: Strategy) -> (Reading, Vec<Value>) {
        let generator = code_generator(&MapperOptions {
            strategy,
            ..MapperOptions::default()
        });
        let entity = EntityType::constructible::<Reading>();
        let bindings = bindings();
        let ctx = RecordContext::default();

        let reader = generator.reader(&entity, &bindings).unwrap();
        let mut reading = Reading::default();
        reader(&ctx, &mut reading, &values()).unwrap();

        let writer = generator.writer(&entity, &bindings).unwrap();
        let mut out = vec![Value::Null; 3];
        writer(&ctx, &reading, &mut out).unwrap();
        (reading, out)
    }

    #[test]
    fn test_strategies_agree() {
        let generated = round_trip(Strategy::Generated);
        let reflection = round_trip(Strategy::Reflection);

        assert_eq!(generated, reflection);
        assert_eq!(generated.0.sensor, "north");
        assert_eq!(generated.0.note, None);
        assert_eq!(generated.1, values());
    }

    #[test]
    fn test_conversion_errors_carry_record_and_column() {
        let entity = EntityType::constructible::<Reading>();
        let bindings = bindings();
        let mut ctx = RecordContext::default();
        ctx.advance(true);
        ctx.advance(true);
        let bad = vec![
            Value::String("north".to_string()),
            Value::Bool(true),
            Value::Null,
        ];

        for strategy in [Strategy::Generated, Strategy::Reflection] {
            let generator = code_generator(&MapperOptions {
                strategy,
                ..MapperOptions::default()
            });
            let reader = generator.reader(&entity, &bindings).unwrap();
            let err = reader(&ctx, &mut Reading::default(), &bad).unwrap_err();
            assert!(
                matches!(
                    err,
                    BindError::Conversion {
                        ref member,
                        record: Some(2),
                        logical_index: Some(1),
                        ..
                    } if member == "celsius"
                ),
                "{strategy:?}: {err}"
            );
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        hits: u64,
    }

    #[test]
    fn test_u64_beyond_i64_fails_to_write() {
        let hits = MemberAccessor::field("hits", |c: &Counter| c.hits, |c: &mut Counter, v: u64| c.hits = v).unwrap();
        let bindings = vec![Arc::new(Binding::member(
            Arc::new(hits),
            Arc::new(Column::int("hits")),
            0,
            0,
        ))];
        let entity = EntityType::constructible::<Counter>();
        let ctx = RecordContext::default();

        for strategy in [Strategy::Generated, Strategy::Reflection] {
            let generator = code_generator(&MapperOptions {
                strategy,
                ..MapperOptions::default()
            });
            let writer = generator.writer(&entity, &bindings).unwrap();

            let mut out = vec![Value::Null];
            writer(&ctx, &Counter { hits: i64::MAX as u64 }, &mut out).unwrap();
            assert_eq!(out, vec![Value::Int(i64::MAX)]);

            let err = writer(&ctx, &Counter { hits: u64::MAX }, &mut out).unwrap_err();
            assert!(matches!(
                err,
                BindError::Conversion {
                    source: crate::error::ValueError::OutOfRange { .. },
                    logical_index: Some(0),
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_default_factory() {
        let generator = code_generator(&MapperOptions::default());
        let registry = BindingRegistry::new(EntityType::constructible::<Reading>());

        let factory = generator
            .factory(&registry, &EntityType::constructible::<Reading>())
            .unwrap();
        assert!(factory().downcast::<Reading>().is_ok());

        assert!(matches!(
            generator.factory(&registry, &EntityType::opaque::<Reading>()),
            Err(BindError::NoDefaultConstructor { .. })
        ));
    }

    #[test]
    fn test_generated_rejects_reflective_members_without_fallback() {
        let accessor = DynamicRecord::accessor(&MemberPath::parse("id").unwrap(), true).unwrap();
        let bindings = vec![Arc::new(Binding::member(
            accessor,
            Arc::new(Column::int("id")),
            0,
            0,
        ))];
        let entity = EntityType::self_nesting::<DynamicRecord>();

        let strict = GeneratedCodeGenerator::new(false);
        assert!(matches!(
            strict.reader(&entity, &bindings),
            Err(BindError::UnsupportedRuntime { .. })
        ));

        let lenient = GeneratedCodeGenerator::new(true);
        let reader = lenient.reader(&entity, &bindings).unwrap();
        let mut record = DynamicRecord::new();
        reader(&RecordContext::default(), &mut record, &[Value::Int(3)]).unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(3)));
        assert_eq!(TypeInfo::of::<DynamicRecord>(), entity.info());
    }

    #[test]
    fn test_read_only_member_rejected_for_reading() {
        let accessor = MemberAccessor::read_only("sensor", |r: &Reading| r.sensor.clone()).unwrap();
        let bindings = vec![Arc::new(Binding::member(
            Arc::new(accessor),
            Arc::new(Column::string("sensor")),
            0,
            0,
        ))];
        let entity = EntityType::constructible::<Reading>();

        for strategy in [Strategy::Generated, Strategy::Reflection] {
            let generator = code_generator(&MapperOptions {
                strategy,
                ..MapperOptions::default()
            });
            assert!(matches!(
                generator.reader(&entity, &bindings),
                Err(BindError::ReadOnlyMember(_))
            ));
            assert!(generator.writer(&entity, &bindings).is_ok());
        }
    }
}
