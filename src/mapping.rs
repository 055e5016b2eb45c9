//! Fluent configuration of the columns of one entity type.
//!
//! A [`TypeMapping`] records column bindings in physical order. Once
//! finished it becomes an immutable [`Mapping`] that readers, writers and
//! dispatchers share.
//!
//! # Example
//!
//! ```
//! use flatbind::{field, BindError, Column, TypeMapping};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i32,
//!     name: String,
//! }
//!
//! # fn main() -> Result<(), BindError> {
//! let mut mapping = TypeMapping::<Person>::new();
//! mapping.member(field!(Person, id)?, Column::int("id"))?;
//! mapping.ignored(Column::ignored("filler"));
//! mapping.member(field!(Person, name)?, Column::string("name"))?;
//!
//! let mapping = mapping.finish();
//! assert_eq!(mapping.schema().physical_count(), 3);
//! assert_eq!(mapping.schema().logical_count(), 2);
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::accessor::MemberAccessor;
use crate::binding::{Binding, CustomDelegates};
use crate::column::ColumnDefinition;
use crate::entity::EntityType;
use crate::error::BindError;
use crate::registry::BindingRegistry;
use crate::schema::Schema;

/// Builder for the bindings of entity type `T`.
pub struct TypeMapping<T> {
    registry: BindingRegistry,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Any + Default> TypeMapping<T> {
    pub fn new() -> Self {
        Self::for_type(EntityType::constructible::<T>())
    }
}

impl<T: Any + Default> Default for TypeMapping<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> TypeMapping<T> {
    /// Mapping for a type without `Default`. Register a factory before
    /// reading.
    pub fn opaque() -> Self {
        Self::for_type(EntityType::opaque::<T>())
    }

    /// Mapping for an explicit root descriptor.
    pub fn for_type(root: EntityType) -> Self {
        Self {
            registry: BindingRegistry::new(root),
            _entity: PhantomData,
        }
    }

    /// Bind the next column to a scalar member. Binding the same member
    /// twice returns the first binding.
    pub fn member(
        &mut self,
        accessor: impl Into<Arc<MemberAccessor>>,
        column: impl ColumnDefinition + 'static,
    ) -> Result<Arc<Binding>, BindError> {
        let accessor: Arc<MemberAccessor> = accessor.into();
        if accessor.root_owner().id() != self.registry.root().id() {
            return Err(BindError::bad_path(
                accessor.name(),
                format!(
                    "member belongs to {}, not {}",
                    accessor.root_owner().name(),
                    self.registry.root().name()
                ),
            ));
        }
        if accessor.is_composite() {
            return Err(BindError::bad_path(
                accessor.name(),
                "composite members are bound through their nested members",
            ));
        }

        let column: Arc<dyn ColumnDefinition> = Arc::new(column);
        Ok(self
            .registry
            .get_or_add_member(&accessor, |physical, logical| {
                Binding::member(Arc::clone(&accessor), column, physical, logical)
            }))
    }

    /// Append a column that is skipped on read and left empty on write.
    pub fn ignored(&mut self, column: impl ColumnDefinition + 'static) -> Arc<Binding> {
        let column: Arc<dyn ColumnDefinition> = Arc::new(column);
        self.registry
            .add_ignored(|physical| Binding::ignored(column, physical))
    }

    /// Bind the next column to user delegates over the root entity.
    pub fn custom(
        &mut self,
        column: impl ColumnDefinition + 'static,
        delegates: CustomDelegates,
    ) -> Result<Arc<Binding>, BindError> {
        if self.registry.has_custom(column.name()) {
            return Err(BindError::DuplicateCustomKey(column.name().to_string()));
        }
        let name = column.name().to_string();
        let column: Arc<dyn ColumnDefinition> = Arc::new(column);
        Ok(self.registry.get_or_add_custom(&name, |physical, logical| {
            Binding::custom(column, delegates, physical, logical)
        }))
    }

    /// Construct instances of `U` (the root or a composite member type)
    /// through `factory`.
    pub fn factory<U, F>(&mut self, factory: F) -> &mut Self
    where
        U: Any,
        F: Fn() -> U + Send + Sync + 'static,
    {
        self.registry.set_factory(factory);
        self
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn finish(self) -> Mapping<T> {
        let schema = Arc::new(self.registry.schema());
        Mapping {
            registry: Arc::new(self.registry),
            schema,
            _entity: PhantomData,
        }
    }
}

/// Finished, shareable bindings of entity type `T`.
pub struct Mapping<T> {
    registry: Arc<BindingRegistry>,
    schema: Arc<Schema>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Mapping<T> {
    /// Wrap a registry built directly.
    pub fn from_registry(registry: BindingRegistry) -> Self {
        let schema = Arc::new(registry.schema());
        Self {
            registry: Arc::new(registry),
            schema,
            _entity: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl<T> Clone for Mapping<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            schema: Arc::clone(&self.schema),
            _entity: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        balance: f64,
    }

    #[derive(Debug, Default)]
    struct Other {
        id: i64,
    }

    fn id() -> MemberAccessor {
        MemberAccessor::field("id", |a: &Account| a.id, |a: &mut Account, v: i64| a.id = v).unwrap()
    }

    #[test]
    fn test_member_dedup_returns_same_binding() {
        let mut mapping = TypeMapping::<Account>::new();
        let accessor = Arc::new(id());

        let first = mapping.member(Arc::clone(&accessor), Column::int("id")).unwrap();
        let second = mapping.member(accessor, Column::int("id")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mapping.registry().physical_count(), 1);
    }

    #[test]
    fn test_foreign_member_rejected() {
        let mut mapping = TypeMapping::<Account>::new();
        let other =
            MemberAccessor::field("id", |o: &Other| o.id, |o: &mut Other, v: i64| o.id = v).unwrap();

        assert!(matches!(
            mapping.member(other, Column::int("id")),
            Err(BindError::BadMemberPath { .. })
        ));
    }

    #[test]
    fn test_duplicate_custom_key() {
        let mut mapping = TypeMapping::<Account>::new();
        let delegates = CustomDelegates::new().reading(|_ctx, a: &mut Account, v: &Value| {
            if let Value::Float(f) = v {
                a.balance = *f;
            }
            Ok(())
        });

        mapping
            .custom(Column::float("balance"), delegates.clone())
            .unwrap();
        assert!(matches!(
            mapping.custom(Column::float("balance"), delegates),
            Err(BindError::DuplicateCustomKey(key)) if key == "balance"
        ));
    }

    #[test]
    fn test_finish_builds_schema() {
        let mut mapping = TypeMapping::<Account>::new();
        mapping.member(id(), Column::int("id")).unwrap();
        mapping.ignored(Column::ignored("pad"));
        let mapping = mapping.finish();

        assert_eq!(mapping.schema().column_names(), vec!["id", "pad"]);
        assert_eq!(mapping.registry().logical_count(), 1);
        assert_eq!(mapping.clone().schema().physical_count(), 2);
    }
}
