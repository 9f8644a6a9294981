//! Type and field descriptors: statically declared metadata that replaces
//! runtime reflection.
//!
//! A type opts in by implementing [`Describe`], returning a [`TypeSpec`] that
//! lists its fields in constructor order together with a constructor. The
//! [`TypeCache`](crate::cache::TypeCache) resolves a `TypeSpec` into an immutable
//! [`TypeDescriptor`] once, on first use.
//!
//! ```
//! use jkid_core::{json_object, Describe, TypeSpec};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Describe for Point {
//!     fn describe() -> TypeSpec<Self> {
//!         TypeSpec::<Self>::new("Point")
//!             .field("x", |p| &p.x)
//!             .field("y", |p| &p.y)
//!             .constructor(|args| {
//!                 Ok(Point {
//!                     x: args.take("x")?,
//!                     y: args.take("y")?,
//!                 })
//!             })
//!     }
//! }
//! json_object!(Point);
//!
//! let json = jkid_core::serialize(&Point { x: 10, y: 20 }).unwrap();
//! assert_eq!(json, r#"{"x": 10, "y": 20}"#);
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::ConverterPool;
use crate::convert::{Converter, ConverterRef, ErasedConverter};
use crate::error::{JkidError, Result};
use crate::kinds::{Dynamic, JsonType, Spawned};
use crate::value::JsonValue;

/// Implemented by every object type the engine can build and render.
pub trait Describe: Sized + Send + Sync + 'static {
    fn describe() -> TypeSpec<Self>;
}

/// Identity of a described type plus the recipe for building its descriptor.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    build: fn(&ConverterPool) -> Result<TypeDescriptor>,
}

impl TypeKey {
    pub fn of<T: Describe>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            build: build_descriptor::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn build(&self, pool: &ConverterPool) -> Result<TypeDescriptor> {
        (self.build)(pool)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

fn build_descriptor<T: Describe>(pool: &ConverterPool) -> Result<TypeDescriptor> {
    T::describe().resolve(pool)
}

/// Declared shape of a field, list element or map value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Bool,
    Integer,
    Float,
    String,
    /// A described object type.
    Object(TypeKey),
    /// An abstract type (`Box<dyn Trait>`); deserializing it needs a concrete target.
    Interface(&'static str),
    List(Box<TypeRef>),
    /// String-keyed map.
    Map(Box<TypeRef>),
    /// Nullable wrapper (`Option<T>`).
    Optional(Box<TypeRef>),
    /// A type only a custom converter knows how to handle.
    Opaque(&'static str),
}

impl TypeRef {
    pub fn object<T: Describe>() -> Self {
        TypeRef::Object(TypeKey::of::<T>())
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Optional(_))
    }

    /// The type with any `Optional` layers removed.
    pub fn without_optional(&self) -> &TypeRef {
        match self {
            TypeRef::Optional(inner) => inner.without_optional(),
            other => other,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.without_optional(),
            TypeRef::Bool | TypeRef::Integer | TypeRef::Float | TypeRef::String | TypeRef::Opaque(_)
        )
    }

    /// Human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TypeRef::Bool => "boolean".to_string(),
            TypeRef::Integer => "integer".to_string(),
            TypeRef::Float => "number".to_string(),
            TypeRef::String => "string".to_string(),
            TypeRef::Object(key) => format!("object `{}`", short_name(key.name())),
            TypeRef::Interface(name) => format!("interface `{name}`"),
            TypeRef::List(element) => format!("array of {}", element.describe()),
            TypeRef::Map(value) => format!("map of {}", value.describe()),
            TypeRef::Optional(inner) => format!("optional {}", inner.describe()),
            TypeRef::Opaque(name) => format!("`{}`", short_name(name)),
        }
    }

    /// Check that a scalar JSON value fits this declared type.
    /// Only kinds are compared; values are never coerced.
    pub fn accepts_scalar(&self, value: &JsonValue) -> Result<()> {
        match (self, value) {
            (TypeRef::Optional(_), JsonValue::Null) => Ok(()),
            (TypeRef::Optional(inner), value) => inner.accepts_scalar(value),
            (TypeRef::Opaque(_), _) => Ok(()),
            (expected, JsonValue::Null) => Err(JkidError::schema(format!(
                "received null for non-null {}",
                expected.describe()
            ))),
            (TypeRef::Bool, JsonValue::Bool(_))
            | (TypeRef::Float, JsonValue::Number(_))
            | (TypeRef::String, JsonValue::String(_)) => Ok(()),
            (TypeRef::Integer, JsonValue::Number(n)) if n.fract() == 0.0 => Ok(()),
            (expected, found) if expected.is_scalar() => Err(JkidError::schema(format!(
                "expected {}, found {}",
                expected.describe(),
                describe_scalar(found)
            ))),
            (expected, found) => Err(JkidError::schema(format!(
                "expected {}, found scalar {}",
                expected.describe(),
                describe_scalar(found)
            ))),
        }
    }
}

fn describe_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::Number(n) => format!("number {n}"),
        other => other.kind().to_string(),
    }
}

/// Strip the module path from a Rust type name (`a::b::Point` → `Point`).
pub(crate) fn short_name(name: &str) -> &str {
    match name.find('<') {
        Some(generic) => {
            let head = &name[..generic];
            let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
            &name[start..]
        }
        None => name.rsplit("::").next().unwrap_or(name),
    }
}

/// Declarative description of one object type: its fields in constructor
/// order and the constructor that consumes them.
pub struct TypeSpec<T> {
    name: String,
    fields: Vec<FieldDescriptor>,
    constructor: Option<fn(&mut Arguments<'_>) -> Result<T>>,
}

impl<T: Describe> TypeSpec<T> {
    pub fn new(name: impl Into<String>) -> Self {
        TypeSpec {
            name: name.into(),
            fields: Vec::new(),
            constructor: None,
        }
    }

    /// Add a plain field read through `get`.
    pub fn field<F: JsonType>(self, name: &str, get: fn(&T) -> &F) -> Self {
        self.add(Field::new(name, get))
    }

    /// Add a field and adjust its options (`rename`, `exclude`, defaults, concrete target).
    pub fn field_with<F: JsonType>(
        self,
        name: &str,
        get: fn(&T) -> &F,
        configure: impl FnOnce(Field<T, F>) -> Field<T, F>,
    ) -> Self {
        self.add(configure(Field::new(name, get)))
    }

    /// Add a field whose JSON form is produced and consumed by converter `C`.
    pub fn converted<C: Converter>(self, name: &str, get: fn(&T) -> &C::Value) -> Self {
        self.add(Field::converted::<C>(name, get))
    }

    pub fn converted_with<C: Converter>(
        self,
        name: &str,
        get: fn(&T) -> &C::Value,
        configure: impl FnOnce(Field<T, C::Value>) -> Field<T, C::Value>,
    ) -> Self {
        self.add(configure(Field::converted::<C>(name, get)))
    }

    pub fn add<F: Send + Sync + 'static>(mut self, field: Field<T, F>) -> Self {
        self.fields.push(field.into_descriptor());
        self
    }

    pub fn constructor(mut self, constructor: fn(&mut Arguments<'_>) -> Result<T>) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Check the declared fields and resolve converter instances into a descriptor.
    fn resolve(self, pool: &ConverterPool) -> Result<TypeDescriptor> {
        let TypeSpec {
            name,
            mut fields,
            constructor,
        } = self;

        let constructor = constructor.ok_or_else(|| {
            JkidError::reflection(&name, "type does not declare a constructor")
        })?;

        let mut by_json_name = HashMap::new();
        for (index, field) in fields.iter_mut().enumerate() {
            if let TypeRef::Interface(interface) = field.declared_type.without_optional() {
                if field.concrete.is_none() {
                    return Err(JkidError::reflection(
                        &name,
                        format!(
                            "field `{}` has interface type `{interface}` but no concrete target",
                            field.source_name
                        ),
                    ));
                }
            }
            if let Some(converter) = field.converter_ref {
                field.converter = Some(pool.resolve(converter)?);
            }
            if field.excluded {
                continue;
            }
            if by_json_name.insert(field.json_name.clone(), index).is_some() {
                return Err(JkidError::reflection(
                    &name,
                    format!("JSON name `{}` is used by more than one field", field.json_name),
                ));
            }
        }

        Ok(TypeDescriptor {
            type_id: TypeId::of::<T>(),
            name,
            fields,
            by_json_name,
            constructor: Box::new(TypedConstructor(constructor)),
        })
    }
}

/// Typed builder for one field of `T` holding a value of type `F`.
pub struct Field<T, F> {
    source_name: String,
    json_name: Option<String>,
    excluded: bool,
    declared_type: TypeRef,
    converter: Option<ConverterRef>,
    concrete: Option<TypeRef>,
    access: FieldAccess<T, F>,
}

impl<T: 'static, F: JsonType> Field<T, F> {
    pub fn new(name: &str, get: fn(&T) -> &F) -> Self {
        Field {
            source_name: name.to_string(),
            json_name: None,
            excluded: false,
            declared_type: F::type_ref(),
            converter: None,
            concrete: None,
            access: FieldAccess {
                get,
                render: Some(F::render as fn(&F) -> Dynamic<'_>),
                lift: Lift::Typed(F::from_spawned),
                default: None,
            },
        }
    }

    /// Deserialize this interface-typed field as `C`, converting the built
    /// value with `upcast` (typically `|c| Box::new(c) as Box<dyn Trait>`).
    pub fn concrete<C: Describe>(mut self, upcast: fn(C) -> F) -> Self {
        self.concrete = Some(TypeRef::object::<C>());
        self.access.lift = Lift::Concrete(Arc::new(move |value| lift_concrete(value, upcast)));
        self
    }
}

impl<T: 'static, F: Default + Send + Sync + 'static> Field<T, F> {
    /// Use `F::default()` when the JSON has no value for this field.
    pub fn or_default(self) -> Self {
        self.default_with(F::default)
    }
}

impl<T: 'static, F: Send + Sync + 'static> Field<T, F> {
    /// A field handled entirely by converter `C`.
    pub fn converted<C: Converter<Value = F>>(name: &str, get: fn(&T) -> &F) -> Self {
        Field {
            source_name: name.to_string(),
            json_name: None,
            excluded: false,
            declared_type: TypeRef::Opaque(type_name::<F>()),
            converter: Some(ConverterRef::of::<C>()),
            concrete: None,
            access: FieldAccess {
                get,
                render: None,
                lift: Lift::Converted,
                default: None,
            },
        }
    }

    /// Use `json_name` as the JSON key instead of the field name.
    pub fn rename(mut self, json_name: &str) -> Self {
        self.json_name = Some(json_name.to_string());
        self
    }

    /// Leave the field out of both serialized output and key matching.
    pub fn exclude(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn default_with(mut self, default: fn() -> F) -> Self {
        self.access.default = Some(default);
        self
    }

    fn into_descriptor(self) -> FieldDescriptor {
        let json_name = self
            .json_name
            .unwrap_or_else(|| self.source_name.clone());
        FieldDescriptor {
            nullable: self.declared_type.is_nullable(),
            has_default: self.access.default.is_some(),
            source_name: self.source_name,
            json_name,
            excluded: self.excluded,
            declared_type: self.declared_type,
            converter_ref: self.converter,
            converter: None,
            concrete: self.concrete,
            access: Box::new(self.access),
        }
    }
}

fn lift_concrete<C: Describe, F: JsonType>(value: Spawned, upcast: fn(C) -> F) -> Result<F> {
    match value {
        Spawned::Instance(instance) => instance
            .downcast::<C>()
            .map(|concrete| upcast(*concrete))
            .map_err(|_| {
                JkidError::reflection(type_name::<C>(), "built instance has an unexpected type")
            }),
        other => F::from_spawned(other),
    }
}

enum Lift<F> {
    Typed(fn(Spawned) -> Result<F>),
    Concrete(Arc<dyn Fn(Spawned) -> Result<F> + Send + Sync>),
    /// The converter already produced an `F` when the scalar arrived.
    Converted,
}

struct FieldAccess<T, F> {
    get: fn(&T) -> &F,
    render: Option<fn(&F) -> Dynamic<'_>>,
    lift: Lift<F>,
    default: Option<fn() -> F>,
}

/// Type-erased view of a [`FieldAccess`], so descriptors of different
/// types can share one representation.
trait ErasedAccess: Send + Sync {
    fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any>;
    fn render<'a>(&self, instance: &'a dyn Any) -> Option<Dynamic<'a>>;
    fn lift(&self, value: Spawned) -> Result<Box<dyn Any>>;
    fn default_value(&self) -> Option<Box<dyn Any>>;
}

impl<T: 'static, F: Send + Sync + 'static> ErasedAccess for FieldAccess<T, F> {
    fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        let instance = instance.downcast_ref::<T>()?;
        Some((self.get)(instance) as &dyn Any)
    }

    fn render<'a>(&self, instance: &'a dyn Any) -> Option<Dynamic<'a>> {
        let render = self.render?;
        let instance = instance.downcast_ref::<T>()?;
        Some(render((self.get)(instance)))
    }

    fn lift(&self, value: Spawned) -> Result<Box<dyn Any>> {
        let lifted = match &self.lift {
            Lift::Typed(lift) => lift(value)?,
            Lift::Concrete(lift) => lift(value)?,
            Lift::Converted => match value {
                Spawned::Instance(instance) if instance.is::<F>() => return Ok(instance),
                other => {
                    return Err(JkidError::schema(format!(
                        "converter field cannot take {}",
                        other.kind()
                    )))
                }
            },
        };
        Ok(Box::new(lifted))
    }

    fn default_value(&self) -> Option<Box<dyn Any>> {
        self.default.map(|default| Box::new(default()) as Box<dyn Any>)
    }
}

/// Resolved, immutable metadata for one field.
pub struct FieldDescriptor {
    source_name: String,
    json_name: String,
    declared_type: TypeRef,
    nullable: bool,
    has_default: bool,
    excluded: bool,
    converter_ref: Option<ConverterRef>,
    converter: Option<Arc<dyn ErasedConverter>>,
    concrete: Option<TypeRef>,
    access: Box<dyn ErasedAccess>,
}

impl FieldDescriptor {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    /// The type seeds are built for: the concrete target if one is configured.
    pub fn target_type(&self) -> &TypeRef {
        self.concrete.as_ref().unwrap_or(&self.declared_type)
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// A value must arrive in the JSON for this field.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default
    }

    pub(crate) fn converter(&self) -> Option<&Arc<dyn ErasedConverter>> {
        self.converter.as_ref()
    }

    pub(crate) fn get<'a>(&self, instance: &'a dyn Any) -> Option<&'a dyn Any> {
        self.access.get(instance)
    }

    pub(crate) fn render<'a>(&self, instance: &'a dyn Any) -> Option<Dynamic<'a>> {
        self.access.render(instance)
    }

    pub(crate) fn lift(&self, value: Spawned) -> Result<Box<dyn Any>> {
        self.access.lift(value)
    }

    /// Value used when the JSON had nothing for this field: the default if
    /// configured, otherwise `None` for nullable fields.
    pub(crate) fn fill_missing(&self) -> Result<Option<Box<dyn Any>>> {
        if let Some(default) = self.access.default_value() {
            return Ok(Some(default));
        }
        if self.nullable {
            return self.access.lift(Spawned::Null).map(Some);
        }
        Ok(None)
    }

    /// Run the converter on an incoming scalar.
    pub(crate) fn convert_from_json(&self, value: JsonValue) -> Result<Option<Box<dyn Any>>> {
        match &self.converter {
            Some(converter) => converter.from_json(value).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("source_name", &self.source_name)
            .field("json_name", &self.json_name)
            .field("declared_type", &self.declared_type)
            .field("nullable", &self.nullable)
            .field("has_default", &self.has_default)
            .field("excluded", &self.excluded)
            .field("converter", &self.converter.as_ref().map(|c| c.name()))
            .field("concrete", &self.concrete)
            .finish()
    }
}

trait ErasedConstructor: Send + Sync {
    fn construct(&self, args: &mut Arguments<'_>) -> Result<Box<dyn Any>>;
}

struct TypedConstructor<T>(fn(&mut Arguments<'_>) -> Result<T>);

impl<T: 'static> ErasedConstructor for TypedConstructor<T> {
    fn construct(&self, args: &mut Arguments<'_>) -> Result<Box<dyn Any>> {
        (self.0)(args).map(|value| Box::new(value) as Box<dyn Any>)
    }
}

/// Cached, immutable metadata describing how to build and render one type.
pub struct TypeDescriptor {
    type_id: TypeId,
    name: String,
    fields: Vec<FieldDescriptor>,
    by_json_name: HashMap<String, usize>,
    constructor: Box<dyn ErasedConstructor>,
}

impl TypeDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in constructor order, including excluded ones.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Index of the non-excluded field read from JSON key `json_name`.
    pub fn field_by_json_name(&self, json_name: &str) -> Option<usize> {
        self.by_json_name.get(json_name).copied()
    }

    fn field_by_source_name(&self, source_name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.source_name == source_name)
    }

    /// Check that every required field has a value, then invoke the constructor.
    pub(crate) fn construct(&self, values: Vec<Option<Box<dyn Any>>>) -> Result<Box<dyn Any>> {
        for (field, value) in self.fields.iter().zip(&values) {
            if value.is_none() {
                return Err(JkidError::schema(format!(
                    "missing value for field `{}`",
                    field.json_name
                ))
                .at_field(&self.name, &field.json_name));
            }
        }
        let mut args = Arguments {
            descriptor: self,
            values,
        };
        self.constructor.construct(&mut args)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Field values handed to a constructor, looked up by source name.
pub struct Arguments<'d> {
    descriptor: &'d TypeDescriptor,
    values: Vec<Option<Box<dyn Any>>>,
}

impl Arguments<'_> {
    /// Take the value bound to field `name`. Each value can be taken once.
    pub fn take<F: 'static>(&mut self, name: &str) -> Result<F> {
        let owner = self.descriptor.name();
        let index = self.descriptor.field_by_source_name(name).ok_or_else(|| {
            JkidError::reflection(
                owner,
                format!("constructor takes undeclared field `{name}`"),
            )
        })?;
        let value = self.values[index].take().ok_or_else(|| {
            JkidError::reflection(
                owner,
                format!("constructor takes field `{name}` more than once"),
            )
        })?;
        value.downcast::<F>().map(|value| *value).map_err(|_| {
            JkidError::reflection(
                owner,
                format!("field `{name}` is not of type `{}`", type_name::<F>()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_strips_paths() {
        assert_eq!(short_name("crate::shapes::Point"), "Point");
        assert_eq!(short_name("Point"), "Point");
        assert_eq!(
            short_name("chrono::naive::date::NaiveDate"),
            "NaiveDate"
        );
        assert_eq!(short_name("alloc::vec::Vec<i32>"), "Vec<i32>");
    }

    #[test]
    fn optional_accepts_null_but_plain_does_not() {
        let optional = TypeRef::Optional(Box::new(TypeRef::Integer));
        assert!(optional.accepts_scalar(&JsonValue::Null).is_ok());
        assert!(TypeRef::Integer.accepts_scalar(&JsonValue::Null).is_err());
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(TypeRef::Integer.accepts_scalar(&JsonValue::Number(3.0)).is_ok());
        assert!(TypeRef::Integer.accepts_scalar(&JsonValue::Number(3.5)).is_err());
    }

    #[test]
    fn composite_rejects_scalar() {
        let list = TypeRef::List(Box::new(TypeRef::Integer));
        let err = list.accepts_scalar(&JsonValue::Number(1.0)).unwrap_err();
        assert!(err.to_string().contains("expected array of integer"));
    }
}
