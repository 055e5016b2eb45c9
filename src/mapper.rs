//! Recursive entity mapper.
//!
//! The registry's bindings are arranged into a tree of nodes, one per entity
//! type: the root entity and each composite member that has bound columns
//! below it. Member bindings are grouped by member path segment, so
//! `address.city` belongs to the `address` node and `address2.city` to the
//! `address2` node.
//!
//! Reading a record:
//!
//! 1. Check the value count and reject nulls for non-nullable members.
//! 2. Construct the root, assign its own bindings, then recursively
//!    construct, populate and assign each child node.
//!
//! Writing walks the same tree, extracting each child instance through its
//! composite member's getter. A child that is absent (a nested dynamic
//! record that was never set) leaves its slots null.
//!
//! [`EntityMapper::read_into`] updates an existing entity instead: nested
//! instances already present are updated in place, so members without a
//! binding keep their values.

use std::any::{Any, TypeId};
use std::cell::OnceCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::accessor::MemberAccessor;
use crate::binding::Binding;
use crate::codec::RecordContext;
use crate::config::MapperOptions;
use crate::entity::EntityType;
use crate::error::BindError;
use crate::generator::{code_generator, AccessorCodeGenerator, BulkReader, BulkWriter, Strategy};
use crate::mapping::Mapping;
use crate::path::MemberPath;
use crate::registry::{BindingRegistry, Factory};
use crate::value::Value;

struct MapperNode {
    entity: EntityType,
    own: Vec<Arc<Binding>>,
    children: Vec<ChildNode>,
}

struct ChildNode {
    member: Arc<MemberAccessor>,
    node: MapperNode,
}

struct NullCheck {
    logical: usize,
    member: String,
}

struct CompiledReader {
    factory: Factory,
    bulk: BulkReader,
    children: Vec<(Arc<MemberAccessor>, CompiledReader)>,
}

impl CompiledReader {
    fn materialize(&self, ctx: &RecordContext, values: &[Value]) -> Result<Box<dyn Any>, BindError> {
        let mut instance = (self.factory)();
        self.populate(ctx, instance.as_mut(), values)?;
        Ok(instance)
    }

    fn populate(&self, ctx: &RecordContext, target: &mut dyn Any, values: &[Value]) -> Result<(), BindError> {
        (self.bulk)(ctx, &mut *target, values)?;
        for (member, child) in &self.children {
            let instance = child.materialize(ctx, values)?;
            member.assign_local(&mut *target, instance)?;
        }
        Ok(())
    }

    fn update(&self, ctx: &RecordContext, target: &mut dyn Any, values: &[Value]) -> Result<(), BindError> {
        (self.bulk)(ctx, &mut *target, values)?;
        for (member, child) in &self.children {
            match member.object_local_mut(&mut *target) {
                Ok(existing) => child.update(ctx, existing, values)?,
                Err(_) => {
                    let instance = child.materialize(ctx, values)?;
                    member.assign_local(&mut *target, instance)?;
                }
            }
        }
        Ok(())
    }
}

struct CompiledWriter {
    bulk: BulkWriter,
    children: Vec<(Arc<MemberAccessor>, CompiledWriter)>,
}

impl CompiledWriter {
    fn extract(&self, ctx: &RecordContext, source: &dyn Any, values: &mut [Value]) -> Result<(), BindError> {
        (self.bulk)(ctx, source, &mut *values)?;
        for (member, child) in &self.children {
            if let Some(instance) = member.object_present(source)? {
                child.extract(ctx, instance, &mut *values)?;
            }
        }
        Ok(())
    }
}

/// Maps value arrays to entities of type `T` and back.
///
/// The reader and writer trees are compiled on first use and cached for the
/// mapper's lifetime.
pub struct EntityMapper<T> {
    registry: Arc<BindingRegistry>,
    generator: Arc<dyn AccessorCodeGenerator>,
    root: MapperNode,
    null_checks: Vec<NullCheck>,
    reader: OnceCell<CompiledReader>,
    writer: OnceCell<CompiledWriter>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Any> EntityMapper<T> {
    /// Build the node tree for `registry` with the configured strategy.
    pub fn new(registry: Arc<BindingRegistry>, options: &MapperOptions) -> Result<Self, BindError> {
        Self::with_generator(registry, code_generator(options))
    }

    pub fn from_mapping(mapping: &Mapping<T>, options: &MapperOptions) -> Result<Self, BindError> {
        Self::new(Arc::clone(mapping.registry()), options)
    }

    /// Build the node tree with an explicit code generator.
    pub fn with_generator(
        registry: Arc<BindingRegistry>,
        generator: Arc<dyn AccessorCodeGenerator>,
    ) -> Result<Self, BindError> {
        let root_type = *registry.root();
        if root_type.id() != TypeId::of::<T>() {
            return Err(BindError::InvalidTarget {
                member: String::from("<root>"),
                expected: root_type.name(),
            });
        }

        let mut null_checks = Vec::new();
        for binding in registry.bindings() {
            if let Binding::Member(mapping) = binding.as_ref() {
                let accessor = mapping.accessor();
                if accessor.root_owner().id() != root_type.id() {
                    return Err(BindError::bad_path(
                        accessor.name(),
                        format!("member is not rooted at {}", root_type.name()),
                    ));
                }
                if !accessor.is_nullable() {
                    null_checks.push(NullCheck {
                        logical: mapping.logical_index(),
                        member: accessor.name().to_string(),
                    });
                }
            }
        }

        let mut enclosing = vec![root_type.id()];
        let root = build_node(&registry, root_type, &MemberPath::root(), &mut enclosing)?;
        tracing::debug!(
            entity = root_type.name(),
            strategy = ?generator.strategy(),
            columns = registry.physical_count(),
            "built entity mapper"
        );

        Ok(Self {
            registry,
            generator,
            root,
            null_checks,
            reader: OnceCell::new(),
            writer: OnceCell::new(),
            _entity: PhantomData,
        })
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> Strategy {
        self.generator.strategy()
    }

    /// Number of values in a record.
    pub fn logical_count(&self) -> usize {
        self.registry.logical_count()
    }

    /// Compile the reader tree now, surfacing configuration errors early.
    pub fn prepare_reader(&self) -> Result<(), BindError> {
        self.compiled_reader().map(|_| ())
    }

    /// Compile the writer tree now, surfacing configuration errors early.
    pub fn prepare_writer(&self) -> Result<(), BindError> {
        self.compiled_writer().map(|_| ())
    }

    fn compiled_reader(&self) -> Result<&CompiledReader, BindError> {
        if let Some(reader) = self.reader.get() {
            return Ok(reader);
        }
        let compiled = self.compile_reader(&self.root)?;
        Ok(self.reader.get_or_init(|| compiled))
    }

    fn compiled_writer(&self) -> Result<&CompiledWriter, BindError> {
        if let Some(writer) = self.writer.get() {
            return Ok(writer);
        }
        let compiled = self.compile_writer(&self.root)?;
        Ok(self.writer.get_or_init(|| compiled))
    }

    fn compile_reader(&self, node: &MapperNode) -> Result<CompiledReader, BindError> {
        let factory = self.generator.factory(&self.registry, &node.entity)?;
        let bulk = self.generator.reader(&node.entity, &node.own)?;
        let children = node
            .children
            .iter()
            .map(|child| Ok((Arc::clone(&child.member), self.compile_reader(&child.node)?)))
            .collect::<Result<Vec<_>, BindError>>()?;
        Ok(CompiledReader {
            factory,
            bulk,
            children,
        })
    }

    fn compile_writer(&self, node: &MapperNode) -> Result<CompiledWriter, BindError> {
        let bulk = self.generator.writer(&node.entity, &node.own)?;
        let children = node
            .children
            .iter()
            .map(|child| Ok((Arc::clone(&child.member), self.compile_writer(&child.node)?)))
            .collect::<Result<Vec<_>, BindError>>()?;
        Ok(CompiledWriter { bulk, children })
    }

    fn check_values(&self, ctx: &RecordContext, values: &[Value]) -> Result<(), BindError> {
        let expected = self.logical_count();
        if values.len() != expected {
            return Err(BindError::ValueCountMismatch {
                expected,
                actual: values.len(),
            });
        }
        for check in &self.null_checks {
            if values[check.logical].is_null() {
                return Err(BindError::NullAssignedToNonNullable {
                    member: check.member.clone(),
                    record: ctx.physical_record_number(),
                    logical_index: check.logical,
                });
            }
        }
        Ok(())
    }

    /// Construct and populate a new entity from one record's values.
    pub fn read(&self, ctx: &RecordContext, values: &[Value]) -> Result<T, BindError> {
        self.check_values(ctx, values)?;
        let reader = self.compiled_reader()?;
        let instance = reader.materialize(ctx, values)?;
        instance
            .downcast::<T>()
            .map(|entity| *entity)
            .map_err(|_| BindError::InvalidTarget {
                member: String::from("<factory>"),
                expected: self.registry.root().name(),
            })
    }

    /// Populate an existing entity from one record's values. Members
    /// without a binding keep their values.
    ///
    /// The value count and null checks run before anything is assigned, so
    /// a record rejected by them leaves `target` untouched. A conversion
    /// failure stops at the failing member.
    pub fn read_into(&self, ctx: &RecordContext, values: &[Value], target: &mut T) -> Result<(), BindError> {
        self.check_values(ctx, values)?;
        let reader = self.compiled_reader()?;
        reader.update(ctx, target, values)
    }

    /// Extract one record's values from `entity` into `values`.
    pub fn write(&self, ctx: &RecordContext, entity: &T, values: &mut [Value]) -> Result<(), BindError> {
        let expected = self.logical_count();
        if values.len() != expected {
            return Err(BindError::ValueCountMismatch {
                expected,
                actual: values.len(),
            });
        }
        let writer = self.compiled_writer()?;
        writer.extract(ctx, entity, values)
    }

    /// Extract one record's values into a fresh array.
    pub fn write_values(&self, ctx: &RecordContext, entity: &T) -> Result<Vec<Value>, BindError> {
        let mut values = vec![Value::Null; self.logical_count()];
        self.write(ctx, entity, &mut values)?;
        Ok(values)
    }
}

fn build_node(
    registry: &BindingRegistry,
    entity: EntityType,
    path: &MemberPath,
    enclosing: &mut Vec<TypeId>,
) -> Result<MapperNode, BindError> {
    let depth = path.len();
    let mut own = Vec::new();
    let mut groups: Vec<Arc<MemberAccessor>> = Vec::new();

    for binding in registry.bindings() {
        match binding.as_ref() {
            Binding::Member(mapping) => {
                let accessor = mapping.accessor();
                if accessor.path().len() <= depth || !accessor.path().starts_with(path) {
                    continue;
                }
                if accessor.path().len() == depth + 1 {
                    own.push(Arc::clone(binding));
                    continue;
                }
                let ancestor = accessor.ancestor_at(depth + 1).ok_or_else(|| {
                    BindError::bad_path(accessor.name(), "member path does not match its parent chain")
                })?;
                if !groups.iter().any(|g| g.path() == ancestor.path()) {
                    groups.push(ancestor);
                }
            }
            Binding::Custom(_) if depth == 0 => own.push(Arc::clone(binding)),
            _ => {}
        }
    }

    let mut children = Vec::with_capacity(groups.len());
    for member in groups {
        let member_type = *member.member_type().ok_or_else(|| {
            BindError::bad_path(member.name(), "member has nested members but is not composite")
        })?;
        if enclosing.contains(&member_type.id()) && !member_type.allows_self_nesting() {
            return Err(BindError::CyclicMappingNotSupported(member.name().to_string()));
        }

        enclosing.push(member_type.id());
        let node = build_node(registry, member_type, member.path(), enclosing)?;
        enclosing.pop();
        children.push(ChildNode { member, node });
    }

    Ok(MapperNode {
        entity,
        own,
        children,
    })
}
