//! Path-qualified handles to entity members.
//!
//! A [`MemberAccessor`] names one member of an entity, possibly nested
//! (`start.x`), and knows how to read and write it. Accessors built from typed
//! closures ([`MemberAccessor::field`], [`MemberAccessor::composite`]) also
//! carry a typed slot that the generated strategy compiles into straight-line
//! assignments. Reflective accessors carry only the type-erased operations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::entity::{EntityType, TypeInfo};
use crate::error::{BindError, ValueError};
use crate::path::MemberPath;
use crate::value::{ColumnValue, Value};

/// Why a type-erased member operation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessFault {
    /// The instance is not of the accessor's owner type.
    WrongTarget,
    /// The value could not be converted to the member type.
    Value(ValueError),
}

impl From<ValueError> for AccessFault {
    fn from(err: ValueError) -> Self {
        AccessFault::Value(err)
    }
}

pub type ReflectGet = Arc<dyn Fn(&dyn Any) -> Result<Value, AccessFault> + Send + Sync>;
pub type ReflectSet = Arc<dyn Fn(&mut dyn Any, &Value) -> Result<(), AccessFault> + Send + Sync>;
pub type ReflectRef = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
pub type ReflectMut = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;
pub type ReflectAssign =
    Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), AccessFault> + Send + Sync>;

/// Pins a closure to the higher-ranked signature of [`ReflectRef`].
pub fn object_ref<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    f
}

/// Pins a closure to the higher-ranked signature of [`ReflectMut`].
pub fn object_mut<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    f
}

pub(crate) type TypedGet<O> = Arc<dyn Fn(&O) -> Result<Value, ValueError> + Send + Sync>;
pub(crate) type TypedSet<O> = Arc<dyn Fn(&mut O, &Value) -> Result<(), ValueError> + Send + Sync>;

/// Typed operations of a scalar member owned by `O`.
pub(crate) struct TypedField<O> {
    pub(crate) get: Option<TypedGet<O>>,
    pub(crate) set: Option<TypedSet<O>>,
}

pub(crate) struct ScalarOps {
    type_name: &'static str,
    nullable: bool,
    get: Option<ReflectGet>,
    set: Option<ReflectSet>,
    typed: Option<Arc<dyn Any + Send + Sync>>,
}

pub(crate) struct CompositeOps {
    member: EntityType,
    get: ReflectRef,
    get_mut: ReflectMut,
    assign: ReflectAssign,
}

pub(crate) enum MemberKind {
    Scalar(ScalarOps),
    Composite(CompositeOps),
}

/// Handle to a (possibly nested) member of an entity.
pub struct MemberAccessor {
    path: MemberPath,
    name: String,
    owner: TypeInfo,
    root: TypeInfo,
    parent: Option<Arc<MemberAccessor>>,
    kind: MemberKind,
}

impl MemberAccessor {
    fn local(name: &str, owner: TypeInfo, kind: MemberKind) -> Result<Self, BindError> {
        let path = MemberPath::root().child(name)?;
        Ok(Self {
            name: path.to_string(),
            path,
            owner,
            root: owner,
            parent: None,
            kind,
        })
    }

    fn typed_scalar<O: Any, V: ColumnValue>(
        name: &str,
        get: Option<TypedGet<O>>,
        set: Option<TypedSet<O>>,
    ) -> Result<Self, BindError> {
        let erased_get: Option<ReflectGet> = get.clone().map(|get| {
            Arc::new(move |owner: &dyn Any| {
                let owner = owner.downcast_ref::<O>().ok_or(AccessFault::WrongTarget)?;
                get(owner).map_err(AccessFault::Value)
            }) as ReflectGet
        });
        let erased_set: Option<ReflectSet> = set.clone().map(|set| {
            Arc::new(move |owner: &mut dyn Any, value: &Value| {
                let owner = owner.downcast_mut::<O>().ok_or(AccessFault::WrongTarget)?;
                set(owner, value).map_err(AccessFault::Value)
            }) as ReflectSet
        });
        let typed: Arc<dyn Any + Send + Sync> = Arc::new(TypedField::<O> { get, set });

        Self::local(
            name,
            TypeInfo::of::<O>(),
            MemberKind::Scalar(ScalarOps {
                type_name: V::TYPE_NAME,
                nullable: V::NULLABLE,
                get: erased_get,
                set: erased_set,
                typed: Some(typed),
            }),
        )
    }

    /// Scalar member with both a getter and a setter.
    ///
    /// # Example
    ///
    /// ```
    /// use flatbind::MemberAccessor;
    ///
    /// #[derive(Default)]
    /// struct Point { x: i32 }
    ///
    /// let x = MemberAccessor::field("x", |p: &Point| p.x, |p: &mut Point, v: i32| p.x = v).unwrap();
    /// assert_eq!(x.name(), "x");
    /// ```
    pub fn field<O, V, G, S>(name: &str, get: G, set: S) -> Result<Self, BindError>
    where
        O: Any,
        V: ColumnValue,
        G: Fn(&O) -> V + Send + Sync + 'static,
        S: Fn(&mut O, V) + Send + Sync + 'static,
    {
        Self::typed_scalar::<O, V>(name, Some(typed_get(get)), Some(typed_set(set)))
    }

    /// Scalar member that can only be written to a record.
    pub fn read_only<O, V, G>(name: &str, get: G) -> Result<Self, BindError>
    where
        O: Any,
        V: ColumnValue,
        G: Fn(&O) -> V + Send + Sync + 'static,
    {
        Self::typed_scalar::<O, V>(name, Some(typed_get(get)), None)
    }

    /// Scalar member that can only be populated from a record.
    pub fn write_only<O, V, S>(name: &str, set: S) -> Result<Self, BindError>
    where
        O: Any,
        V: ColumnValue,
        S: Fn(&mut O, V) + Send + Sync + 'static,
    {
        Self::typed_scalar::<O, V>(name, None, Some(typed_set(set)))
    }

    /// Composite member whose type is constructed through `Default`.
    pub fn composite<O, M, S>(
        name: &str,
        get: fn(&O) -> &M,
        get_mut: fn(&mut O) -> &mut M,
        set: S,
    ) -> Result<Self, BindError>
    where
        O: Any,
        M: Any + Default,
        S: Fn(&mut O, M) + Send + Sync + 'static,
    {
        Self::composite_of(name, EntityType::constructible::<M>(), get, get_mut, set)
    }

    /// Composite member whose type has no `Default`; reading requires a
    /// factory registered for `M`.
    pub fn composite_opaque<O, M, S>(
        name: &str,
        get: fn(&O) -> &M,
        get_mut: fn(&mut O) -> &mut M,
        set: S,
    ) -> Result<Self, BindError>
    where
        O: Any,
        M: Any,
        S: Fn(&mut O, M) + Send + Sync + 'static,
    {
        Self::composite_of(name, EntityType::opaque::<M>(), get, get_mut, set)
    }

    fn composite_of<O, M, S>(
        name: &str,
        member: EntityType,
        get: fn(&O) -> &M,
        get_mut: fn(&mut O) -> &mut M,
        set: S,
    ) -> Result<Self, BindError>
    where
        O: Any,
        M: Any,
        S: Fn(&mut O, M) + Send + Sync + 'static,
    {
        let erased_get = object_ref(move |owner: &dyn Any| {
            owner.downcast_ref::<O>().map(|owner| get(owner) as &dyn Any)
        });
        let erased_mut = object_mut(move |owner: &mut dyn Any| {
            owner
                .downcast_mut::<O>()
                .map(|owner| get_mut(owner) as &mut dyn Any)
        });
        let assign = move |owner: &mut dyn Any, child: Box<dyn Any>| {
            let owner = owner.downcast_mut::<O>().ok_or(AccessFault::WrongTarget)?;
            let child = child.downcast::<M>().map_err(|_| {
                AccessFault::Value(ValueError::TypeMismatch {
                    expected: std::any::type_name::<M>(),
                    found: "entity",
                })
            })?;
            set(owner, *child);
            Ok(())
        };

        Self::local(
            name,
            TypeInfo::of::<O>(),
            MemberKind::Composite(CompositeOps {
                member,
                get: Arc::new(erased_get),
                get_mut: Arc::new(erased_mut),
                assign: Arc::new(assign),
            }),
        )
    }

    /// Scalar member resolved through type-erased operations only. Such
    /// members cannot be compiled by the generated strategy.
    pub fn reflective(
        name: &str,
        owner: TypeInfo,
        type_name: &'static str,
        nullable: bool,
        get: Option<ReflectGet>,
        set: Option<ReflectSet>,
    ) -> Result<Self, BindError> {
        Self::local(
            name,
            owner,
            MemberKind::Scalar(ScalarOps {
                type_name,
                nullable,
                get,
                set,
                typed: None,
            }),
        )
    }

    /// Composite member resolved through type-erased operations.
    pub fn reflective_composite(
        name: &str,
        owner: TypeInfo,
        member: EntityType,
        get: ReflectRef,
        get_mut: ReflectMut,
        assign: ReflectAssign,
    ) -> Result<Self, BindError> {
        Self::local(
            name,
            owner,
            MemberKind::Composite(CompositeOps {
                member,
                get,
                get_mut,
                assign,
            }),
        )
    }

    /// Re-root a local accessor under a composite parent.
    ///
    /// Fails with `BadMemberPath` when `child` is already nested, when
    /// `parent` is not composite, or when `child` does not belong to the
    /// parent's member type.
    pub fn nested(
        parent: &Arc<MemberAccessor>,
        child: MemberAccessor,
    ) -> Result<Arc<MemberAccessor>, BindError> {
        if child.parent.is_some() || child.path.len() != 1 {
            return Err(BindError::bad_path(
                child.name,
                "only a local member can be nested",
            ));
        }
        let member = parent.member_type().ok_or_else(|| {
            BindError::bad_path(
                format!("{}.{}", parent.name, child.name),
                format!("'{}' is not a composite member", parent.name),
            )
        })?;
        if member.id() != child.owner.id() {
            return Err(BindError::bad_path(
                format!("{}.{}", parent.name, child.name),
                format!(
                    "'{}' belongs to {}, not {}",
                    child.name,
                    child.owner.name(),
                    member.name()
                ),
            ));
        }

        let path = parent.path.child(&child.name)?;
        Ok(Arc::new(MemberAccessor {
            name: path.to_string(),
            path,
            owner: child.owner,
            root: parent.root,
            parent: Some(Arc::clone(parent)),
            kind: child.kind,
        }))
    }

    /// Dot-qualified name from the root entity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &MemberPath {
        &self.path
    }

    pub fn local_name(&self) -> &str {
        self.path.local_name().unwrap_or_default()
    }

    /// Type that directly declares this member.
    pub fn owner(&self) -> TypeInfo {
        self.owner
    }

    /// Root entity type of the parent chain.
    pub fn root_owner(&self) -> TypeInfo {
        self.root
    }

    pub fn parent(&self) -> Option<&Arc<MemberAccessor>> {
        self.parent.as_ref()
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, MemberKind::Composite(_))
    }

    /// Entity type of a composite member.
    pub fn member_type(&self) -> Option<&EntityType> {
        match &self.kind {
            MemberKind::Composite(ops) => Some(&ops.member),
            MemberKind::Scalar(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.type_name,
            MemberKind::Composite(ops) => ops.member.name(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.nullable,
            MemberKind::Composite(_) => true,
        }
    }

    pub fn can_read(&self) -> bool {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.get.is_some(),
            MemberKind::Composite(_) => true,
        }
    }

    pub fn can_write(&self) -> bool {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.set.is_some(),
            MemberKind::Composite(_) => true,
        }
    }

    /// Whether the generated strategy can compile this member.
    pub fn has_typed_slot(&self) -> bool {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.typed.is_some(),
            MemberKind::Composite(_) => true,
        }
    }

    /// The ancestor (or self) whose path has `depth` segments.
    pub fn ancestor_at(self: &Arc<Self>, depth: usize) -> Option<Arc<MemberAccessor>> {
        let mut current = Arc::clone(self);
        while current.path.len() > depth {
            current = Arc::clone(current.parent.as_ref()?);
        }
        (current.path.len() == depth).then_some(current)
    }

    fn invalid_target(&self, expected: TypeInfo) -> BindError {
        BindError::InvalidTarget {
            member: self.name.clone(),
            expected: expected.name(),
        }
    }

    fn resolve_owner<'a>(&self, root: &'a dyn Any) -> Result<&'a dyn Any, BindError> {
        match &self.parent {
            Some(parent) => {
                let grand = parent.resolve_owner(root)?;
                parent.object_local(grand)
            }
            None => Ok(root),
        }
    }

    fn resolve_owner_mut<'a>(&self, root: &'a mut dyn Any) -> Result<&'a mut dyn Any, BindError> {
        match &self.parent {
            Some(parent) => {
                let grand = parent.resolve_owner_mut(root)?;
                parent.object_local_mut(grand)
            }
            None => Ok(root),
        }
    }

    /// Read the member from a root entity, walking the parent chain.
    pub fn get(&self, instance: &dyn Any) -> Result<Value, BindError> {
        if (*instance).type_id() != self.root.id() {
            return Err(self.invalid_target(self.root));
        }
        let owner = self.resolve_owner(instance)?;
        self.read_local(owner)
    }

    /// Write the member on a root entity, walking the parent chain.
    pub fn set(&self, instance: &mut dyn Any, value: &Value) -> Result<(), BindError> {
        if (*instance).type_id() != self.root.id() {
            return Err(self.invalid_target(self.root));
        }
        let owner = self.resolve_owner_mut(instance)?;
        self.write_local(owner, value)
    }

    /// Read the member from its direct owner.
    pub(crate) fn read_local(&self, owner: &dyn Any) -> Result<Value, BindError> {
        match &self.kind {
            MemberKind::Scalar(ops) => {
                let get = ops
                    .get
                    .as_ref()
                    .ok_or_else(|| BindError::WriteOnlyMember(self.name.clone()))?;
                get(owner).map_err(|fault| self.fault(fault))
            }
            MemberKind::Composite(_) => Err(BindError::bad_path(
                self.name.clone(),
                "composite members have no column value",
            )),
        }
    }

    /// Write the member on its direct owner.
    pub(crate) fn write_local(&self, owner: &mut dyn Any, value: &Value) -> Result<(), BindError> {
        match &self.kind {
            MemberKind::Scalar(ops) => {
                let set = ops
                    .set
                    .as_ref()
                    .ok_or_else(|| BindError::ReadOnlyMember(self.name.clone()))?;
                set(owner, value).map_err(|fault| self.fault(fault))
            }
            MemberKind::Composite(_) => Err(BindError::bad_path(
                self.name.clone(),
                "composite members have no column value",
            )),
        }
    }

    pub(crate) fn object_local<'a>(&self, owner: &'a dyn Any) -> Result<&'a dyn Any, BindError> {
        match &self.kind {
            MemberKind::Composite(ops) => {
                (ops.get)(owner).ok_or_else(|| self.invalid_target(self.owner))
            }
            MemberKind::Scalar(_) => Err(BindError::bad_path(
                self.name.clone(),
                "scalar members cannot hold nested members",
            )),
        }
    }

    /// The nested object on its direct owner, or `None` when the owner
    /// holds none (an unset child of a dynamic record).
    pub(crate) fn object_present<'a>(&self, owner: &'a dyn Any) -> Result<Option<&'a dyn Any>, BindError> {
        match &self.kind {
            MemberKind::Composite(ops) => Ok((ops.get)(owner)),
            MemberKind::Scalar(_) => Err(BindError::bad_path(
                self.name.clone(),
                "scalar members cannot hold nested members",
            )),
        }
    }

    pub(crate) fn object_local_mut<'a>(
        &self,
        owner: &'a mut dyn Any,
    ) -> Result<&'a mut dyn Any, BindError> {
        match &self.kind {
            MemberKind::Composite(ops) => {
                (ops.get_mut)(owner).ok_or_else(|| self.invalid_target(self.owner))
            }
            MemberKind::Scalar(_) => Err(BindError::bad_path(
                self.name.clone(),
                "scalar members cannot hold nested members",
            )),
        }
    }

    pub(crate) fn assign_local(&self, owner: &mut dyn Any, child: Box<dyn Any>) -> Result<(), BindError> {
        match &self.kind {
            MemberKind::Composite(ops) => (ops.assign)(owner, child).map_err(|fault| self.fault(fault)),
            MemberKind::Scalar(_) => Err(BindError::bad_path(
                self.name.clone(),
                "scalar members cannot hold nested members",
            )),
        }
    }

    /// Typed slot for owner type `O`, if this accessor was built from typed
    /// closures over `O`.
    pub(crate) fn typed<O: Any>(&self) -> Option<&TypedField<O>> {
        match &self.kind {
            MemberKind::Scalar(ops) => ops.typed.as_ref()?.downcast_ref::<TypedField<O>>(),
            MemberKind::Composite(_) => None,
        }
    }

    fn fault(&self, fault: AccessFault) -> BindError {
        match fault {
            AccessFault::WrongTarget => self.invalid_target(self.owner),
            AccessFault::Value(source) => BindError::Conversion {
                member: self.name.clone(),
                record: None,
                logical_index: None,
                source,
            },
        }
    }
}

fn typed_get<O, V, G>(get: G) -> TypedGet<O>
where
    O: Any,
    V: ColumnValue,
    G: Fn(&O) -> V + Send + Sync + 'static,
{
    Arc::new(move |owner: &O| get(owner).to_value())
}

fn typed_set<O, V, S>(set: S) -> TypedSet<O>
where
    O: Any,
    V: ColumnValue,
    S: Fn(&mut O, V) + Send + Sync + 'static,
{
    Arc::new(move |owner: &mut O, value: &Value| {
        set(owner, V::from_value(value)?);
        Ok(())
    })
}

impl fmt::Debug for MemberAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberAccessor")
            .field("name", &self.name)
            .field("owner", &self.owner.name())
            .field("type", &self.type_name())
            .field("composite", &self.is_composite())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Line {
        start: Point,
        end: Point,
    }

    fn start() -> Arc<MemberAccessor> {
        Arc::new(
            MemberAccessor::composite::<Line, Point, _>(
                "start",
                |l: &Line| &l.start,
                |l: &mut Line| &mut l.start,
                |l: &mut Line, p: Point| l.start = p,
            )
            .unwrap(),
        )
    }

    fn x() -> MemberAccessor {
        MemberAccessor::field("x", |p: &Point| p.x, |p: &mut Point, v: i32| p.x = v).unwrap()
    }

    #[test]
    fn test_nested_name_and_chain() {
        let start = start();
        let start_x = MemberAccessor::nested(&start, x()).unwrap();

        assert_eq!(start_x.name(), "start.x");
        assert_eq!(start_x.local_name(), "x");
        assert_eq!(start_x.owner(), TypeInfo::of::<Point>());
        assert_eq!(start_x.root_owner(), TypeInfo::of::<Line>());
        assert_eq!(start_x.parent().unwrap().name(), "start");
        assert_eq!(start_x.ancestor_at(1).unwrap().name(), "start");
    }

    #[test]
    fn test_nested_get_set_walks_parent_chain() {
        let start_x = MemberAccessor::nested(&start(), x()).unwrap();
        let mut line = Line::default();

        start_x.set(&mut line, &Value::Int(5)).unwrap();

        assert_eq!(line.start.x, 5);
        assert_eq!(start_x.get(&line).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_invalid_target() {
        let x = x();
        let line = Line::default();

        assert!(matches!(x.get(&line), Err(BindError::InvalidTarget { .. })));
    }

    #[test]
    fn test_nested_rejects_foreign_member() {
        let y_on_line =
            MemberAccessor::field("y", |l: &Line| l.end.y, |l: &mut Line, v: i32| l.end.y = v)
                .unwrap();

        assert!(matches!(
            MemberAccessor::nested(&start(), y_on_line),
            Err(BindError::BadMemberPath { .. })
        ));

        let scalar = Arc::new(x());
        assert!(MemberAccessor::nested(&scalar, x()).is_err());
    }

    #[test]
    fn test_read_only_and_write_only() {
        let ro = MemberAccessor::read_only("x", |p: &Point| p.x).unwrap();
        let wo = MemberAccessor::write_only("y", |p: &mut Point, v: i32| p.y = v).unwrap();
        let mut point = Point::default();

        assert!(ro.can_read() && !ro.can_write());
        assert!(matches!(
            ro.set(&mut point, &Value::Int(1)),
            Err(BindError::ReadOnlyMember(_))
        ));
        assert!(matches!(wo.get(&point), Err(BindError::WriteOnlyMember(_))));
    }

    #[test]
    fn test_conversion_error_names_member() {
        let x = x();
        let mut point = Point::default();

        let err = x
            .set(&mut point, &Value::String("five".to_string()))
            .unwrap_err();
        match err {
            BindError::Conversion { member, .. } => assert_eq!(member, "x"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_typed_slot() {
        let x = x();
        assert!(x.typed::<Point>().is_some());
        assert!(x.typed::<Line>().is_none());
        assert!(x.has_typed_slot());
        assert!(!x.is_nullable());
    }
}
