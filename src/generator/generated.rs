//! Generated accessor strategy.
//!
//! Every binding of a node is compiled into a typed step over the node's
//! entity type `T`. The compiled delegate downcasts the entity once and then
//! runs the steps in order.

use std::any::Any;
use std::sync::Arc;

use super::reflection::ReflectionCodeGenerator;
use super::{slot_at, value_at, AccessorCodeGenerator, BulkReader, BulkWriter, Strategy};
use crate::accessor::{MemberAccessor, TypedGet, TypedSet};
use crate::binding::{Binding, CustomReader, CustomWriter};
use crate::codec::{ColumnContext, RecordContext};
use crate::entity::EntityType;
use crate::error::BindError;
use crate::value::Value;

/// Code generator compiling typed steps, optionally falling back to
/// reflection for entities whose members carry no typed accessors.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratedCodeGenerator {
    fallback_to_reflection: bool,
}

impl GeneratedCodeGenerator {
    pub fn new(fallback_to_reflection: bool) -> Self {
        Self {
            fallback_to_reflection,
        }
    }

    fn fallback<D>(
        &self,
        compiled: Result<D, BindError>,
        reflect: impl FnOnce() -> Result<D, BindError>,
    ) -> Result<D, BindError> {
        match compiled {
            Err(BindError::UnsupportedRuntime { type_name, reason }) if self.fallback_to_reflection => {
                tracing::warn!(
                    entity = type_name,
                    reason = %reason,
                    "generated accessors unavailable, falling back to reflection"
                );
                reflect()
            }
            other => other,
        }
    }
}

impl AccessorCodeGenerator for GeneratedCodeGenerator {
    fn strategy(&self) -> Strategy {
        Strategy::Generated
    }

    fn reader(&self, entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkReader, BindError> {
        let compiled = entity.compile_reader(bindings);
        self.fallback(compiled, || ReflectionCodeGenerator.reader(entity, bindings))
    }

    fn writer(&self, entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkWriter, BindError> {
        let compiled = entity.compile_writer(bindings);
        self.fallback(compiled, || ReflectionCodeGenerator.writer(entity, bindings))
    }
}

enum ReadStep<T> {
    Member {
        logical: usize,
        set: TypedSet<T>,
        member: String,
    },
    Custom {
        column: CustomColumn,
        reader: CustomReader,
    },
}

enum WriteStep<T> {
    Member {
        logical: usize,
        get: TypedGet<T>,
        member: String,
    },
    Custom {
        column: CustomColumn,
        writer: CustomWriter,
    },
}

struct CustomColumn {
    name: String,
    physical: usize,
    logical: usize,
}

impl CustomColumn {
    fn of(binding: &Binding, logical: usize) -> Self {
        Self {
            name: binding.column().name().to_string(),
            physical: binding.physical_index(),
            logical,
        }
    }

    fn context<'a>(&'a self, record: &'a RecordContext) -> ColumnContext<'a> {
        ColumnContext::new(record, &self.name, self.physical, self.logical)
    }
}

fn unsupported(entity: &EntityType, accessor: &MemberAccessor) -> BindError {
    BindError::UnsupportedRuntime {
        type_name: entity.name(),
        reason: format!("member '{}' has no typed accessor", accessor.name()),
    }
}

fn target_mismatch(entity: &EntityType) -> BindError {
    BindError::InvalidTarget {
        member: String::from("<entity>"),
        expected: entity.name(),
    }
}

/// Compile the reader steps of a node whose entity type is `T`.
pub(crate) fn compile_reader<T: Any>(
    entity: &EntityType,
    bindings: &[Arc<Binding>],
) -> Result<BulkReader, BindError> {
    let mut steps: Vec<ReadStep<T>> = Vec::with_capacity(bindings.len());
    for binding in bindings {
        match binding.as_ref() {
            Binding::Member(mapping) => {
                let accessor = mapping.accessor();
                let typed = accessor
                    .typed::<T>()
                    .ok_or_else(|| unsupported(entity, accessor))?;
                let set = typed
                    .set
                    .clone()
                    .ok_or_else(|| BindError::ReadOnlyMember(accessor.name().to_string()))?;
                steps.push(ReadStep::Member {
                    logical: mapping.logical_index(),
                    set,
                    member: accessor.name().to_string(),
                });
            }
            Binding::Custom(custom) => {
                if let Some(reader) = custom.reader() {
                    steps.push(ReadStep::Custom {
                        column: CustomColumn::of(binding, custom.logical_index()),
                        reader: Arc::clone(reader),
                    });
                }
            }
            Binding::Ignored(_) => {}
        }
    }

    let entity = *entity;
    Ok(Arc::new(
        move |ctx: &RecordContext, target: &mut dyn Any, values: &[Value]| {
            let instance = target
                .downcast_mut::<T>()
                .ok_or_else(|| target_mismatch(&entity))?;
            for step in &steps {
                match step {
                    ReadStep::Member {
                        logical,
                        set,
                        member,
                    } => {
                        let value = value_at(values, *logical)?;
                        set(&mut *instance, value).map_err(|source| BindError::Conversion {
                            member: member.clone(),
                            record: Some(ctx.physical_record_number()),
                            logical_index: Some(*logical),
                            source,
                        })?;
                    }
                    ReadStep::Custom { column, reader } => {
                        let value = value_at(values, column.logical)?;
                        reader(&column.context(ctx), &mut *instance, value)?;
                    }
                }
            }
            Ok(())
        },
    ))
}

/// Compile the writer steps of a node whose entity type is `T`.
pub(crate) fn compile_writer<T: Any>(
    entity: &EntityType,
    bindings: &[Arc<Binding>],
) -> Result<BulkWriter, BindError> {
    let mut steps: Vec<WriteStep<T>> = Vec::with_capacity(bindings.len());
    for binding in bindings {
        match binding.as_ref() {
            Binding::Member(mapping) => {
                let accessor = mapping.accessor();
                let typed = accessor
                    .typed::<T>()
                    .ok_or_else(|| unsupported(entity, accessor))?;
                let get = typed
                    .get
                    .clone()
                    .ok_or_else(|| BindError::WriteOnlyMember(accessor.name().to_string()))?;
                steps.push(WriteStep::Member {
                    logical: mapping.logical_index(),
                    get,
                    member: accessor.name().to_string(),
                });
            }
            Binding::Custom(custom) => {
                if let Some(writer) = custom.writer() {
                    steps.push(WriteStep::Custom {
                        column: CustomColumn::of(binding, custom.logical_index()),
                        writer: Arc::clone(writer),
                    });
                }
            }
            Binding::Ignored(_) => {}
        }
    }

    let entity = *entity;
    Ok(Arc::new(
        move |ctx: &RecordContext, source: &dyn Any, values: &mut [Value]| {
            let instance = source
                .downcast_ref::<T>()
                .ok_or_else(|| target_mismatch(&entity))?;
            for step in &steps {
                match step {
                    WriteStep::Member {
                        logical,
                        get,
                        member,
                    } => {
                        *slot_at(values, *logical)? = get(instance).map_err(|source| BindError::Conversion {
                            member: member.clone(),
                            record: Some(ctx.logical_record_number()),
                            logical_index: Some(*logical),
                            source,
                        })?;
                    }
                    WriteStep::Custom { column, writer } => {
                        let value = writer(&column.context(ctx), instance)?;
                        *slot_at(values, column.logical)? = value;
                    }
                }
            }
            Ok(())
        },
    ))
}
