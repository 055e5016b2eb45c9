//! Entity type descriptors and the schema-driven [`DynamicRecord`] entity.
//!
//! An [`EntityType`] is captured once per Rust type while the mapping is
//! configured. It carries the monomorphized entry points the generated
//! accessor strategy needs later, when only `dyn Any` values are at hand.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::accessor::{AccessFault, MemberAccessor};
use crate::binding::Binding;
use crate::error::{BindError, ValueError};
use crate::generator::{generated, BulkReader, BulkWriter};
use crate::path::MemberPath;
use crate::value::Value;

/// Identity of a Rust type, kept next to its name for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub(crate) type Construct = fn() -> Box<dyn Any>;
pub(crate) type CompileReader = fn(&EntityType, &[Arc<Binding>]) -> Result<BulkReader, BindError>;
pub(crate) type CompileWriter = fn(&EntityType, &[Arc<Binding>]) -> Result<BulkWriter, BindError>;

fn construct_default<T: Any + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Descriptor of an entity (root or composite member) type.
#[derive(Clone, Copy)]
pub struct EntityType {
    info: TypeInfo,
    construct: Option<Construct>,
    compile_reader: CompileReader,
    compile_writer: CompileWriter,
    self_nesting: bool,
}

impl EntityType {
    /// Descriptor for a type constructed through its `Default` impl.
    pub fn constructible<T: Any + Default>() -> Self {
        Self {
            construct: Some(construct_default::<T>),
            ..Self::opaque::<T>()
        }
    }

    /// Descriptor for a type without a default constructor. A factory must be
    /// registered for it before records can be read.
    pub fn opaque<T: Any>() -> Self {
        Self {
            info: TypeInfo::of::<T>(),
            construct: None,
            compile_reader: generated::compile_reader::<T>,
            compile_writer: generated::compile_writer::<T>,
            self_nesting: false,
        }
    }

    /// Descriptor for a type whose shape comes from member paths rather than
    /// from its own fields, so it may nest instances of itself.
    pub fn self_nesting<T: Any + Default>() -> Self {
        Self {
            self_nesting: true,
            ..Self::constructible::<T>()
        }
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn id(&self) -> TypeId {
        self.info.id
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Whether nesting this type inside itself is allowed.
    pub fn allows_self_nesting(&self) -> bool {
        self.self_nesting
    }

    pub fn has_default_constructor(&self) -> bool {
        self.construct.is_some()
    }

    pub(crate) fn default_constructor(&self) -> Option<Construct> {
        self.construct
    }

    pub(crate) fn compile_reader(&self, bindings: &[Arc<Binding>]) -> Result<BulkReader, BindError> {
        (self.compile_reader)(self, bindings)
    }

    pub(crate) fn compile_writer(&self, bindings: &[Arc<Binding>]) -> Result<BulkWriter, BindError> {
        (self.compile_writer)(self, bindings)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.info.name)
            .field("default_constructor", &self.construct.is_some())
            .finish()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

/// A record whose shape is only known at runtime, such as one described by a
/// YAML mapping file.
///
/// Scalar members live in `fields`; dotted member paths create nested
/// records in `children`. Members are resolved by name on every access, so
/// only the reflection strategy can bind them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicRecord {
    fields: IndexMap<String, Value>,
    children: IndexMap<String, DynamicRecord>,
}

impl DynamicRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, key: impl Into<String>, child: DynamicRecord) -> Self {
        self.children.insert(key.into(), child);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn child(&self, key: &str) -> Option<&DynamicRecord> {
        self.children.get(key)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut DynamicRecord> {
        self.children.get_mut(key)
    }

    pub fn set_child(&mut self, key: impl Into<String>, child: DynamicRecord) {
        self.children.insert(key.into(), child);
    }

    /// Look up a value by dot-qualified path.
    pub fn lookup(&self, path: &MemberPath) -> Option<&Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut record = self;
        for segment in parents {
            record = record.children.get(segment)?;
        }
        record.fields.get(last)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.children.is_empty()
    }

    /// Build a record from a JSON object. Nested objects become child
    /// records; any other JSON value becomes a field.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let object = json.as_object()?;
        let mut record = Self::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Object(_) => {
                    record.set_child(key.clone(), Self::from_json(value)?);
                }
                other => record.set(key.clone(), Value::from(other.clone())),
            }
        }
        Some(record)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Reflective accessor for `path` on a [`DynamicRecord`] root.
    ///
    /// Every segment but the last becomes a composite accessor over a child
    /// record; the last segment is a scalar field.
    pub fn accessor(path: &MemberPath, nullable: bool) -> Result<Arc<MemberAccessor>, BindError> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| BindError::bad_path(path.to_string(), "path is empty"))?;

        let mut parent: Option<Arc<MemberAccessor>> = None;
        for segment in parents {
            let composite = dynamic_child_accessor(segment)?;
            parent = Some(match parent {
                Some(p) => MemberAccessor::nested(&p, composite)?,
                None => Arc::new(composite),
            });
        }

        let field = dynamic_field_accessor(last, nullable)?;
        match parent {
            Some(p) => MemberAccessor::nested(&p, field),
            None => Ok(Arc::new(field)),
        }
    }
}

fn dynamic_field_accessor(name: &str, nullable: bool) -> Result<MemberAccessor, BindError> {
    let get_key = name.to_string();
    let set_key = name.to_string();
    MemberAccessor::reflective(
        name,
        TypeInfo::of::<DynamicRecord>(),
        "Value",
        nullable,
        Some(Arc::new(move |owner: &dyn Any| {
            let record = owner
                .downcast_ref::<DynamicRecord>()
                .ok_or(AccessFault::WrongTarget)?;
            Ok(record.get(&get_key).cloned().unwrap_or(Value::Null))
        })),
        Some(Arc::new(move |owner: &mut dyn Any, value: &Value| {
            let record = owner
                .downcast_mut::<DynamicRecord>()
                .ok_or(AccessFault::WrongTarget)?;
            record.set(set_key.clone(), value.clone());
            Ok(())
        })),
    )
}

fn dynamic_child_accessor(name: &str) -> Result<MemberAccessor, BindError> {
    let ref_key = name.to_string();
    let mut_key = name.to_string();
    let assign_key = name.to_string();
    MemberAccessor::reflective_composite(
        name,
        TypeInfo::of::<DynamicRecord>(),
        EntityType::self_nesting::<DynamicRecord>(),
        Arc::new(crate::accessor::object_ref(move |owner: &dyn Any| {
            owner
                .downcast_ref::<DynamicRecord>()
                .and_then(|record| record.child(&ref_key))
                .map(|child| child as &dyn Any)
        })),
        Arc::new(crate::accessor::object_mut(move |owner: &mut dyn Any| {
            let record = owner.downcast_mut::<DynamicRecord>()?;
            let child = record.children.entry(mut_key.clone()).or_default();
            Some(child as &mut dyn Any)
        })),
        Arc::new(move |owner: &mut dyn Any, child: Box<dyn Any>| {
            let record = owner
                .downcast_mut::<DynamicRecord>()
                .ok_or(AccessFault::WrongTarget)?;
            let child = child.downcast::<DynamicRecord>().map_err(|_| {
                AccessFault::Value(ValueError::TypeMismatch {
                    expected: "DynamicRecord",
                    found: "entity",
                })
            })?;
            record.set_child(assign_key.clone(), *child);
            Ok(())
        }),
    )
}

impl Serialize for DynamicRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.children.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        for (key, child) in &self.children {
            map.serialize_entry(key, child)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct WithDefault;

    struct WithoutDefault;

    #[test]
    fn test_entity_type_constructors() {
        let constructible = EntityType::constructible::<WithDefault>();
        let opaque = EntityType::opaque::<WithoutDefault>();

        assert!(constructible.has_default_constructor());
        assert!(!opaque.has_default_constructor());
        assert!(constructible.name().ends_with("WithDefault"));
        assert_ne!(constructible, EntityType::opaque::<WithoutDefault>());
        assert_eq!(constructible, EntityType::opaque::<WithDefault>());
    }

    #[test]
    fn test_dynamic_record_json_round_trip() {
        let json = json!({"id": 7, "name": "Bob", "address": {"city": "Wellington"}});
        let record = DynamicRecord::from_json(&json).unwrap();

        assert_eq!(record.get("id"), Some(&Value::Int(7)));
        assert_eq!(
            record.lookup(&MemberPath::parse("address.city").unwrap()),
            Some(&Value::String("Wellington".to_string()))
        );
        assert_eq!(record.to_json(), json);
    }

    #[test]
    fn test_dynamic_accessor_get_and_set() {
        let path = MemberPath::parse("address.city").unwrap();
        let accessor = DynamicRecord::accessor(&path, true).unwrap();

        let mut record = DynamicRecord::new();
        accessor
            .set(&mut record, &Value::String("Auckland".to_string()))
            .unwrap();

        assert_eq!(accessor.name(), "address.city");
        assert_eq!(
            accessor.get(&record).unwrap(),
            Value::String("Auckland".to_string())
        );
        assert!(accessor.parent().unwrap().is_composite());
    }
}
