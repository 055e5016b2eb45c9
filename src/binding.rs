//! The binding model: how one physical column relates to an entity.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::accessor::MemberAccessor;
use crate::codec::{ColumnContext, RecordContext};
use crate::column::ColumnDefinition;
use crate::error::BindError;
use crate::value::Value;

/// Populates a root entity from a custom column value.
pub type CustomReader =
    Arc<dyn Fn(&ColumnContext<'_>, &mut dyn Any, &Value) -> Result<(), BindError> + Send + Sync>;

/// Produces a custom column value from a root entity.
pub type CustomWriter =
    Arc<dyn Fn(&ColumnContext<'_>, &dyn Any) -> Result<Value, BindError> + Send + Sync>;

/// Reader and writer delegates of a custom mapping. Either may be absent: a
/// column without a reader is skipped on read, one without a writer is
/// written as null.
#[derive(Clone, Default)]
pub struct CustomDelegates {
    reader: Option<CustomReader>,
    writer: Option<CustomWriter>,
}

impl CustomDelegates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed reader over the root entity `T`.
    pub fn reading<T, F>(mut self, read: F) -> Self
    where
        T: Any,
        F: Fn(&ColumnContext<'_>, &mut T, &Value) -> Result<(), BindError> + Send + Sync + 'static,
    {
        self.reader = Some(Arc::new(
            move |ctx: &ColumnContext<'_>, entity: &mut dyn Any, value: &Value| {
                let entity = entity
                    .downcast_mut::<T>()
                    .ok_or_else(|| custom_target::<T>(ctx))?;
                read(ctx, entity, value)
            },
        ));
        self
    }

    /// Typed writer over the root entity `T`.
    pub fn writing<T, F>(mut self, write: F) -> Self
    where
        T: Any,
        F: Fn(&ColumnContext<'_>, &T) -> Result<Value, BindError> + Send + Sync + 'static,
    {
        self.writer = Some(Arc::new(move |ctx: &ColumnContext<'_>, entity: &dyn Any| {
            let entity = entity
                .downcast_ref::<T>()
                .ok_or_else(|| custom_target::<T>(ctx))?;
            write(ctx, entity)
        }));
        self
    }
}

fn custom_target<T: Any>(ctx: &ColumnContext<'_>) -> BindError {
    BindError::InvalidTarget {
        member: ctx.column.to_string(),
        expected: std::any::type_name::<T>(),
    }
}

/// A column bound to a scalar member.
pub struct MemberMapping {
    accessor: Arc<MemberAccessor>,
    column: Arc<dyn ColumnDefinition>,
    physical_index: usize,
    logical_index: usize,
}

impl MemberMapping {
    pub fn accessor(&self) -> &Arc<MemberAccessor> {
        &self.accessor
    }

    pub fn logical_index(&self) -> usize {
        self.logical_index
    }
}

/// A column read and written through user delegates.
pub struct CustomMapping {
    column: Arc<dyn ColumnDefinition>,
    delegates: CustomDelegates,
    physical_index: usize,
    logical_index: usize,
}

impl CustomMapping {
    pub fn reader(&self) -> Option<&CustomReader> {
        self.delegates.reader.as_ref()
    }

    pub fn writer(&self) -> Option<&CustomWriter> {
        self.delegates.writer.as_ref()
    }

    pub fn logical_index(&self) -> usize {
        self.logical_index
    }

    /// Column context for this mapping within `record`.
    pub fn context<'a>(&'a self, record: &'a RecordContext) -> ColumnContext<'a> {
        ColumnContext::new(record, self.column.name(), self.physical_index, self.logical_index)
    }
}

/// A column that occupies a physical position only.
pub struct IgnoredMapping {
    column: Arc<dyn ColumnDefinition>,
    physical_index: usize,
}

/// Relationship between one physical column and the entity.
pub enum Binding {
    Member(MemberMapping),
    Custom(CustomMapping),
    Ignored(IgnoredMapping),
}

impl Binding {
    pub fn member(
        accessor: Arc<MemberAccessor>,
        column: Arc<dyn ColumnDefinition>,
        physical_index: usize,
        logical_index: usize,
    ) -> Self {
        Binding::Member(MemberMapping {
            accessor,
            column,
            physical_index,
            logical_index,
        })
    }

    pub fn custom(
        column: Arc<dyn ColumnDefinition>,
        delegates: CustomDelegates,
        physical_index: usize,
        logical_index: usize,
    ) -> Self {
        Binding::Custom(CustomMapping {
            column,
            delegates,
            physical_index,
            logical_index,
        })
    }

    pub fn ignored(column: Arc<dyn ColumnDefinition>, physical_index: usize) -> Self {
        Binding::Ignored(IgnoredMapping {
            column,
            physical_index,
        })
    }

    pub fn physical_index(&self) -> usize {
        match self {
            Binding::Member(m) => m.physical_index,
            Binding::Custom(c) => c.physical_index,
            Binding::Ignored(i) => i.physical_index,
        }
    }

    /// Position in the value array; `None` for ignored columns.
    pub fn logical_index(&self) -> Option<usize> {
        match self {
            Binding::Member(m) => Some(m.logical_index),
            Binding::Custom(c) => Some(c.logical_index),
            Binding::Ignored(_) => None,
        }
    }

    pub fn column(&self) -> &Arc<dyn ColumnDefinition> {
        match self {
            Binding::Member(m) => &m.column,
            Binding::Custom(c) => &c.column,
            Binding::Ignored(i) => &i.column,
        }
    }

    pub fn as_member(&self) -> Option<&MemberMapping> {
        match self {
            Binding::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Binding::Ignored(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Binding::Member(m) => format!("member {}", m.accessor.name()),
            Binding::Custom(_) => "custom".to_string(),
            Binding::Ignored(_) => "ignored".to_string(),
        };
        f.debug_struct("Binding")
            .field("column", &self.column().name())
            .field("kind", &kind)
            .field("physical", &self.physical_index())
            .field("logical", &self.logical_index())
            .finish()
    }
}
