//! Reflection accessor strategy: resolves every binding through the
//! type-erased accessor operations on each call.

use std::any::Any;
use std::sync::Arc;

use super::{slot_at, value_at, AccessorCodeGenerator, BulkReader, BulkWriter, Strategy};
use crate::binding::Binding;
use crate::codec::RecordContext;
use crate::entity::EntityType;
use crate::error::BindError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectionCodeGenerator;

impl AccessorCodeGenerator for ReflectionCodeGenerator {
    fn strategy(&self) -> Strategy {
        Strategy::Reflection
    }

    fn reader(&self, _entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkReader, BindError> {
        for binding in bindings {
            if let Binding::Member(mapping) = binding.as_ref() {
                if !mapping.accessor().can_write() {
                    return Err(BindError::ReadOnlyMember(mapping.accessor().name().to_string()));
                }
            }
        }

        let bindings = bindings.to_vec();
        Ok(Arc::new(
            move |ctx: &RecordContext, target: &mut dyn Any, values: &[Value]| {
                for binding in &bindings {
                    match binding.as_ref() {
                        Binding::Member(mapping) => {
                            let logical = mapping.logical_index();
                            let value = value_at(values, logical)?;
                            mapping
                                .accessor()
                                .write_local(target, value)
                                .map_err(|e| e.at_column(ctx.physical_record_number(), logical))?;
                        }
                        Binding::Custom(custom) => {
                            if let Some(reader) = custom.reader() {
                                let value = value_at(values, custom.logical_index())?;
                                reader(&custom.context(ctx), &mut *target, value)?;
                            }
                        }
                        Binding::Ignored(_) => {}
                    }
                }
                Ok(())
            },
        ))
    }

    fn writer(&self, _entity: &EntityType, bindings: &[Arc<Binding>]) -> Result<BulkWriter, BindError> {
        for binding in bindings {
            if let Binding::Member(mapping) = binding.as_ref() {
                if !mapping.accessor().can_read() {
                    return Err(BindError::WriteOnlyMember(mapping.accessor().name().to_string()));
                }
            }
        }

        let bindings = bindings.to_vec();
        Ok(Arc::new(
            move |ctx: &RecordContext, source: &dyn Any, values: &mut [Value]| {
                for binding in &bindings {
                    match binding.as_ref() {
                        Binding::Member(mapping) => {
                            let logical = mapping.logical_index();
                            let value = mapping
                                .accessor()
                                .read_local(source)
                                .map_err(|e| e.at_column(ctx.logical_record_number(), logical))?;
                            *slot_at(values, logical)? = value;
                        }
                        Binding::Custom(custom) => {
                            if let Some(writer) = custom.writer() {
                                let value = writer(&custom.context(ctx), source)?;
                                *slot_at(values, custom.logical_index())? = value;
                            }
                        }
                        Binding::Ignored(_) => {}
                    }
                }
                Ok(())
            },
        ))
    }
}
