//! Domain objects and the field-access capability the engine talks to.
//!
//! The engine never inspects a domain type directly. Every read and write
//! goes through [`DomainObject`], addressed by the field names the type's
//! [`EntityDeclaration`] lists. Objects are shared through [`EntityRef`]
//! so that a cyclic object graph can point back at the same instance.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::model::{GraphElement, Value};
use super::declaration::EntityDeclaration;

// ============================================================================
// Access capability
// ============================================================================

/// Failure of a single field access. The engine attaches the owning type
/// and property name before surfacing it as [`crate::Error::PropertyAccess`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    #[error("no field named '{0}'")]
    UnknownField(String),

    #[error("expected {expected}, got {got}")]
    WrongShape { expected: &'static str, got: String },
}

impl AccessError {
    fn shape(expected: &'static str, got: &FieldValue) -> Self {
        AccessError::WrongShape { expected, got: got.shape_name().to_string() }
    }
}

/// Field-level access to a mapped domain object.
///
/// `get_field`/`set_field` touch storage directly. `get_property`/
/// `set_property` are the accessor path (getters/setters with side
/// effects, derived values) and fall back to direct access unless
/// overridden. A [`MappingPolicy`](super::MappingPolicy) with
/// `access_field` selects the direct path.
pub trait DomainObject: Any + Send + Sync {
    /// Name of the declaration this object is mapped by.
    fn entity_name(&self) -> &str;

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError>;

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError>;

    fn get_property(&self, field: &str) -> Result<FieldValue, AccessError> {
        self.get_field(field)
    }

    fn set_property(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        self.set_field(field, value)
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A domain type that declares its own mapping.
///
/// `MetamodelRegistry::register::<T>()` takes the declaration and wires
/// `T::default()` in as the instantiator.
pub trait Entity: DomainObject + Default {
    fn declaration() -> EntityDeclaration;
}

// ============================================================================
// EntityRef
// ============================================================================

/// Shared handle to a domain object.
///
/// Clones share the instance; [`EntityRef::ptr_eq`] is reference identity.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<dyn DomainObject>>);

impl EntityRef {
    pub fn new<T: DomainObject>(object: T) -> Self {
        EntityRef(Arc::new(RwLock::new(object)))
    }

    pub fn ptr_eq(a: &EntityRef, b: &EntityRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn entity_name(&self) -> String {
        self.0.read().entity_name().to_string()
    }

    /// Read through the direct or the accessor path.
    pub fn get(&self, field: &str, access_field: bool) -> Result<FieldValue, AccessError> {
        let object = self.0.read();
        if access_field { object.get_field(field) } else { object.get_property(field) }
    }

    /// Write through the direct or the accessor path.
    pub fn set(&self, field: &str, value: FieldValue, access_field: bool) -> Result<(), AccessError> {
        let mut object = self.0.write();
        if access_field { object.set_field(field, value) } else { object.set_property(field, value) }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn DomainObject> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn DomainObject> {
        self.0.write()
    }

    /// Borrow the object as its concrete type.
    pub fn downcast<T: DomainObject>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.0.read(), |object| object.as_any().downcast_ref::<T>()).ok()
    }

    pub fn downcast_mut<T: DomainObject>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.0.write(), |object| object.as_any_mut().downcast_mut::<T>())
            .ok()
    }

    pub fn is<T: DomainObject>(&self) -> bool {
        self.0.read().as_any().is::<T>()
    }
}

// Cyclic graphs make a structural Debug recurse forever; print identity only.
impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

// ============================================================================
// Field values
// ============================================================================

/// State of an association field.
#[derive(Debug, Clone, Default)]
pub enum Association {
    /// Never fetched. Left untouched when the owner is written.
    #[default]
    Unloaded,
    /// Connected graph elements, not yet converted.
    Raw(Vec<GraphElement>),
    /// Converted domain objects.
    Loaded(Vec<EntityRef>),
}

impl Association {
    pub fn one(target: EntityRef) -> Self {
        Association::Loaded(vec![target])
    }

    pub fn many(targets: impl IntoIterator<Item = EntityRef>) -> Self {
        Association::Loaded(targets.into_iter().collect())
    }

    /// Loaded and empty: writing it removes every existing relationship.
    pub fn empty() -> Self {
        Association::Loaded(Vec::new())
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self, Association::Unloaded)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Association::Loaded(_))
    }

    /// Converted targets; empty unless loaded.
    pub fn entities(&self) -> &[EntityRef] {
        match self {
            Association::Loaded(targets) => targets,
            _ => &[],
        }
    }

    /// Unconverted targets; empty unless raw.
    pub fn raw(&self) -> &[GraphElement] {
        match self {
            Association::Raw(elements) => elements,
            _ => &[],
        }
    }

    pub fn single(&self) -> Option<&EntityRef> {
        self.entities().first()
    }

    pub fn len(&self) -> usize {
        match self {
            Association::Unloaded => 0,
            Association::Raw(elements) => elements.len(),
            Association::Loaded(targets) => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The currency of [`DomainObject`] access.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(Value),
    Association(Association),
}

impl FieldValue {
    pub const NULL: FieldValue = FieldValue::Scalar(Value::Null);

    pub fn shape_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar(v) => v.type_name(),
            FieldValue::Association(Association::Unloaded) => "UNLOADED_ASSOCIATION",
            FieldValue::Association(Association::Raw(_)) => "RAW_ASSOCIATION",
            FieldValue::Association(Association::Loaded(_)) => "ASSOCIATION",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Association(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }
}

impl From<Value> for FieldValue { fn from(v: Value) -> Self { FieldValue::Scalar(v) } }
impl From<bool> for FieldValue { fn from(v: bool) -> Self { FieldValue::Scalar(v.into()) } }
impl From<i64> for FieldValue { fn from(v: i64) -> Self { FieldValue::Scalar(v.into()) } }
impl From<f64> for FieldValue { fn from(v: f64) -> Self { FieldValue::Scalar(v.into()) } }
impl From<String> for FieldValue { fn from(v: String) -> Self { FieldValue::Scalar(v.into()) } }
impl From<&str> for FieldValue { fn from(v: &str) -> Self { FieldValue::Scalar(v.into()) } }
impl From<Association> for FieldValue { fn from(v: Association) -> Self { FieldValue::Association(v) } }
impl<T: Into<Value>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self { FieldValue::Scalar(v.into()) }
}

impl TryFrom<FieldValue> for Value {
    type Error = AccessError;
    fn try_from(v: FieldValue) -> Result<Self, AccessError> {
        match v {
            FieldValue::Scalar(value) => Ok(value),
            other => Err(AccessError::shape("SCALAR", &other)),
        }
    }
}

impl TryFrom<FieldValue> for Association {
    type Error = AccessError;
    fn try_from(v: FieldValue) -> Result<Self, AccessError> {
        match v {
            FieldValue::Association(assoc) => Ok(assoc),
            // A null scalar is how an unset to-one arrives from generic callers.
            FieldValue::Scalar(Value::Null) => Ok(Association::empty()),
            other => Err(AccessError::shape("ASSOCIATION", &other)),
        }
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $expected:literal, $extract:expr;)*) => {$(
        impl TryFrom<FieldValue> for $ty {
            type Error = AccessError;
            fn try_from(v: FieldValue) -> Result<Self, AccessError> {
                let extract: fn(&Value) -> Option<$ty> = $extract;
                match &v {
                    FieldValue::Scalar(value) => extract(value).ok_or_else(|| AccessError::shape($expected, &v)),
                    _ => Err(AccessError::shape($expected, &v)),
                }
            }
        }

        impl TryFrom<FieldValue> for Option<$ty> {
            type Error = AccessError;
            fn try_from(v: FieldValue) -> Result<Self, AccessError> {
                if v.is_null() { Ok(None) } else { <$ty>::try_from(v).map(Some) }
            }
        }
    )*};
}

scalar_conversions! {
    i64 => "INTEGER", |v| v.as_int();
    f64 => "FLOAT", |v| v.as_float();
    bool => "BOOLEAN", |v| v.as_bool();
    String => "STRING", |v| v.as_str().map(str::to_string);
}
