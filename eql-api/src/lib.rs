use serde::ser::{SerializeMap, SerializeSeq};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Declared description of an entity type.
///
/// Types are declared as `static` items; identity is the address of the
/// static, so two descriptors with the same name are still distinct types.
///
/// ```ignore
/// static CONNECTION: EntityType = EntityType::new("Connection", &[], &[
///     AttributeDef::scalar("parent"),
///     AttributeDef::scalar("child"),
/// ]);
/// static FIXED_CONNECTION: EntityType = EntityType::new("FixedConnection", &[&CONNECTION], &[]);
/// ```
pub struct EntityType {
    pub name: &'static str,
    pub supertypes: &'static [&'static EntityType],
    pub attributes: &'static [AttributeDef],
}

impl EntityType {
    pub const fn new(
        name: &'static str,
        supertypes: &'static [&'static EntityType],
        attributes: &'static [AttributeDef],
    ) -> Self {
        Self {
            name,
            supertypes,
            attributes,
        }
    }

    /// Returns `true` when `self` is `other` or transitively declares it as a supertype.
    pub fn is_subtype_of(&self, other: &EntityType) -> bool {
        std::ptr::eq(self, other) || self.supertypes.iter().any(|s| s.is_subtype_of(other))
    }

    /// Looks up a declared attribute, including the ones inherited from supertypes.
    ///
    /// Own attributes shadow inherited ones with the same name.
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeDef> {
        self.attributes
            .iter()
            .find(|def| def.name == name)
            .or_else(|| self.supertypes.iter().find_map(|s| s.attribute(name)))
    }

    /// Returns `true` if instances of this type expose `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// All attributes visible on this type: own declarations first, then
    /// inherited ones in supertype order. Shadowed names appear once.
    pub fn all_attributes(&self) -> Vec<&'static AttributeDef> {
        let mut out: Vec<&'static AttributeDef> = self.attributes.iter().collect();
        for sup in self.supertypes {
            for def in sup.all_attributes() {
                if !out.iter().any(|d| d.name == def.name) {
                    out.push(def);
                }
            }
        }
        out
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A declared attribute of an [`EntityType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: &'static str,
    /// Whether the attribute holds a collection ([`Value::List`]).
    pub collection: bool,
}

impl AttributeDef {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            collection: false,
        }
    }

    pub const fn collection(name: &'static str) -> Self {
        Self {
            name,
            collection: true,
        }
    }
}

/// Reflective access to a queryable object.
///
/// Every object that can appear in a [`Domain`] implements this trait. The
/// engine never mutates entities; it only reads attributes and the type tag.
pub trait Entity: fmt::Debug + Send + Sync {
    /// The runtime type of this object.
    fn entity_type(&self) -> &'static EntityType;

    /// Get the current value of an attribute.
    ///
    /// Returns `None` when the object does not carry the attribute. For an
    /// attribute declared on the type, `None` is read as [`Value::Null`].
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Enumerate declared attributes together with their current values.
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        self.entity_type()
            .all_attributes()
            .into_iter()
            .map(|def| (def.name, self.attribute(def.name).unwrap_or(Value::Null)))
            .collect()
    }
}

/// Shared handle to an entity. Equality between handles is reference identity.
pub type EntityRef = Arc<dyn Entity>;

/// Returns `true` if both handles point at the same object.
pub fn same_entity(a: &EntityRef, b: &EntityRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Concrete values flowing through queries.
///
/// - Null: absent attribute values
/// - Bool / Int / Float / String: scalar attributes and literals
/// - Entity: a reference to a live object (compared by identity)
/// - List: collection-valued attributes
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Entity(EntityRef),
    List(Vec<Value>),
}

impl Value {
    /// Wraps a concrete entity handle.
    pub fn entity<E: Entity + 'static>(entity: Arc<E>) -> Value {
        Value::Entity(entity)
    }

    /// Builds a list from entity handles, keeping their identity.
    pub fn entities<E, I>(items: I) -> Value
    where
        E: Entity + 'static,
        I: IntoIterator<Item = Arc<E>>,
    {
        Value::List(items.into_iter().map(Value::entity).collect())
    }

    /// Human readable kind, the type name for entities.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Entity(e) => e.entity_type().name,
            Value::List(_) => "List",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The runtime type when this value is an entity.
    pub fn entity_type(&self) -> Option<&'static EntityType> {
        self.as_entity().map(|e| e.entity_type())
    }

    /// Exact-or-subtype test against a declared type. Non-entities never match.
    pub fn is_instance_of(&self, ty: &EntityType) -> bool {
        self.entity_type().is_some_and(|t| t.is_subtype_of(ty))
    }

    /// Reads an attribute of an entity value.
    ///
    /// Returns `None` for non-entities and for attributes the runtime type
    /// does not declare.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let entity = self.as_entity()?;
        if !entity.entity_type().declares(name) {
            return None;
        }
        Some(entity.attribute(name).unwrap_or(Value::Null))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Int(l), Value::Float(r)) | (Value::Float(r), Value::Int(l)) => {
                (*l as f64) == *r
            }
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Entity(l), Value::Entity(r)) => same_entity(l, r),
            (Value::List(l), Value::List(r)) => l == r,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Entity(e) => write!(f, "<{}>", e.entity_type().name),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<E: Entity + 'static> From<Arc<E>> for Value {
    fn from(v: Arc<E>) -> Self {
        Value::Entity(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Entity(e) => {
                // Entity graphs may be cyclic: nested entities are written as their type only.
                let attrs = e.attributes();
                let mut map = serializer.serialize_map(Some(attrs.len() + 1))?;
                map.serialize_entry("type", e.entity_type().name)?;
                for (name, value) in &attrs {
                    map.serialize_entry(name, &Shallow(value))?;
                }
                map.end()
            }
        }
    }
}

struct Shallow<'a>(&'a Value);

impl serde::Serialize for Shallow<'_> {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Entity(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", e.entity_type().name)?;
                map.end()
            }
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(&Shallow(item))?;
                }
                seq.end()
            }
            other => other.serialize(serializer),
        }
    }
}

/// A finite, read-only collection that variables draw candidates from.
///
/// Implementors must yield members in a stable native order; the order of
/// query results is a function of it.
pub trait DomainSource: Send + Sync {
    /// Iterate over the current members.
    fn members(&self) -> Box<dyn Iterator<Item = Value> + '_>;

    /// Current number of members, used to order the search.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DomainSource for Vec<Value> {
    fn members(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        Box::new(self.iter().cloned())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl DomainSource for Vec<EntityRef> {
    fn members(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        Box::new(self.iter().cloned().map(Value::Entity))
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// A domain the caller may keep mutating between evaluations.
///
/// Each enumeration takes a snapshot under the read lock.
impl DomainSource for RwLock<Vec<EntityRef>> {
    fn members(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot: Vec<Value> = guard.iter().cloned().map(Value::Entity).collect();
        Box::new(snapshot.into_iter())
    }

    fn len(&self) -> usize {
        self.read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Cheaply cloneable handle to a [`DomainSource`].
#[derive(Clone)]
pub struct Domain {
    source: Arc<dyn DomainSource>,
}

impl Domain {
    pub fn new(source: impl DomainSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Shares a source the caller keeps a handle to (e.g. a `RwLock`ed vector).
    pub fn shared<S: DomainSource + 'static>(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Builds a domain from concrete entity handles, preserving their identity.
    pub fn from_entities<E, I>(items: I) -> Self
    where
        E: Entity + 'static,
        I: IntoIterator<Item = Arc<E>>,
    {
        let refs: Vec<EntityRef> = items.into_iter().map(|e| e as EntityRef).collect();
        Self::new(refs)
    }

    pub fn members(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        self.source.members()
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Returns `true` if both handles share the same source.
    pub fn same_source(&self, other: &Domain) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.source), Arc::as_ptr(&other.source))
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain(len={})", self.len())
    }
}

impl From<Vec<Value>> for Domain {
    fn from(values: Vec<Value>) -> Self {
        Domain::new(values)
    }
}

impl From<Vec<EntityRef>> for Domain {
    fn from(entities: Vec<EntityRef>) -> Self {
        Domain::new(entities)
    }
}
