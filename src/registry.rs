//! Binding registry: the ordered list of column bindings for one root entity.
//!
//! Physical indices follow registration order. Logical indices are dense over
//! the non-ignored bindings, so a record of N columns with K ignored produces
//! exactly N - K values.

use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::accessor::MemberAccessor;
use crate::binding::Binding;
use crate::entity::EntityType;
use crate::schema::Schema;

/// Constructs a fresh instance of an entity or composite member type.
pub type Factory = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// Registry of column bindings for a root entity type.
pub struct BindingRegistry {
    root: EntityType,
    bindings: Vec<Arc<Binding>>,
    by_key: IndexMap<String, usize>,
    ignored_count: usize,
    factories: HashMap<TypeId, Factory>,
}

fn custom_key(column_name: &str) -> String {
    format!("#custom:{}", column_name)
}

impl BindingRegistry {
    /// Create an empty registry for entities of type `root`.
    pub fn new(root: EntityType) -> Self {
        Self {
            root,
            bindings: Vec::new(),
            by_key: IndexMap::new(),
            ignored_count: 0,
            factories: HashMap::new(),
        }
    }

    pub fn root(&self) -> &EntityType {
        &self.root
    }

    fn next_indices(&self) -> (usize, usize) {
        let physical = self.bindings.len();
        (physical, physical - self.ignored_count)
    }

    fn insert_keyed(&mut self, key: String, binding: Binding) -> Arc<Binding> {
        let binding = Arc::new(binding);
        self.by_key.insert(key, self.bindings.len());
        self.bindings.push(Arc::clone(&binding));
        binding
    }

    /// Return the binding for `accessor`, creating it on first use.
    ///
    /// # Arguments
    ///
    /// * `accessor` - Member the column binds to; keyed by its full name
    /// * `make` - Builds the binding from the assigned `(physical, logical)`
    ///   indices; only called when no binding exists yet
    ///
    /// # Returns
    ///
    /// The existing binding when the member was registered before, so the
    /// same handle is returned for repeated calls.
    pub fn get_or_add_member<F>(&mut self, accessor: &MemberAccessor, make: F) -> Arc<Binding>
    where
        F: FnOnce(usize, usize) -> Binding,
    {
        if let Some(&index) = self.by_key.get(accessor.name()) {
            return Arc::clone(&self.bindings[index]);
        }
        let (physical, logical) = self.next_indices();
        let binding = make(physical, logical);
        tracing::debug!(
            member = accessor.name(),
            physical,
            logical,
            "registered member binding"
        );
        self.insert_keyed(accessor.name().to_string(), binding)
    }

    /// Return the custom binding for `column_name`, creating it on first use.
    pub fn get_or_add_custom<F>(&mut self, column_name: &str, make: F) -> Arc<Binding>
    where
        F: FnOnce(usize, usize) -> Binding,
    {
        let key = custom_key(column_name);
        if let Some(&index) = self.by_key.get(&key) {
            return Arc::clone(&self.bindings[index]);
        }
        let (physical, logical) = self.next_indices();
        let binding = make(physical, logical);
        tracing::debug!(column = column_name, physical, logical, "registered custom binding");
        self.insert_keyed(key, binding)
    }

    /// Append an ignored column. Ignored columns are never deduplicated.
    pub fn add_ignored<F>(&mut self, make: F) -> Arc<Binding>
    where
        F: FnOnce(usize) -> Binding,
    {
        let binding = Arc::new(make(self.bindings.len()));
        self.ignored_count += 1;
        self.bindings.push(Arc::clone(&binding));
        binding
    }

    /// Check if a custom binding exists for `column_name`
    pub fn has_custom(&self, column_name: &str) -> bool {
        self.by_key.contains_key(&custom_key(column_name))
    }

    /// Look up the binding of a member by its dot-qualified name.
    pub fn member(&self, name: &str) -> Option<&Arc<Binding>> {
        self.by_key.get(name).map(|&index| &self.bindings[index])
    }

    /// All bindings in physical order.
    pub fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    pub fn physical_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn logical_count(&self) -> usize {
        self.bindings.len() - self.ignored_count
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored_count
    }

    /// Register a factory for instances of `T`, overriding its default
    /// constructor.
    pub fn set_factory<T, F>(&mut self, factory: F)
    where
        T: Any,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories
            .insert(TypeId::of::<T>(), Arc::new(move || Box::new(factory()) as Box<dyn Any>));
    }

    pub fn factory(&self, type_id: TypeId) -> Option<&Factory> {
        self.factories.get(&type_id)
    }

    /// Schema with one column per binding, in physical order.
    pub fn schema(&self) -> Schema {
        Schema::from_columns(self.bindings.iter().map(|b| Arc::clone(b.column())).collect())
    }
}
