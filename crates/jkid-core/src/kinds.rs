//! The [`JsonType`] capability: how a Rust type declares its JSON shape,
//! exposes itself to the serializer and is rebuilt from spawned seed output.
//!
//! Scalars, `Option`, `Vec` and string-keyed maps are covered here. Object
//! types get their impl from [`json_object!`](crate::json_object) and trait
//! objects from [`json_interface!`](crate::json_interface).

use std::any::{type_name, Any};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::descriptor::{Describe, TypeKey, TypeRef};
use crate::error::{JkidError, Result};
use crate::value::JsonValue;

/// A type the engine can serialize and deserialize.
pub trait JsonType: Sized + Send + Sync + 'static {
    /// Declared shape, used to pick seeds and validate incoming events.
    fn type_ref() -> TypeRef;

    /// Borrowed view of the value for the serializer.
    fn render(&self) -> Dynamic<'_>;

    /// Rebuild a value from what the seeds produced.
    fn from_spawned(value: Spawned) -> Result<Self>;
}

/// Object-safe view of a described instance. Serializing through this trait
/// dispatches on the value's runtime type, which is how interface fields
/// (`Box<dyn Trait>` with `Trait: JsonObject`) find their descriptor.
pub trait JsonObject: Any + Send + Sync {
    fn type_key(&self) -> TypeKey;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Describe> JsonObject for T {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Borrowed render tree handed to the serializer.
pub enum Dynamic<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(Cow<'a, str>),
    List(Vec<Dynamic<'a>>),
    /// Entries in output order.
    Map(Vec<(&'a str, Dynamic<'a>)>),
    Object(&'a dyn JsonObject),
}

/// Output of a spawned seed: scalars as parsed, collections as spawned
/// children, objects as type-erased instances.
pub enum Spawned {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Spawned>),
    Map(Vec<(String, Spawned)>),
    Instance(Box<dyn Any>),
}

impl Spawned {
    pub fn kind(&self) -> &'static str {
        match self {
            Spawned::Null => "null",
            Spawned::Bool(_) => "boolean",
            Spawned::Number(_) => "number",
            Spawned::String(_) => "string",
            Spawned::List(_) => "array",
            Spawned::Map(_) => "object",
            Spawned::Instance(_) => "object",
        }
    }

    /// Unwrap a constructed object of type `T`.
    pub fn into_instance<T: 'static>(self) -> Result<T> {
        match self {
            Spawned::Instance(instance) => instance.downcast::<T>().map(|v| *v).map_err(|_| {
                JkidError::reflection(type_name::<T>(), "built instance has an unexpected type")
            }),
            other => Err(mismatch(&format!("object `{}`", short(type_name::<T>())), &other)),
        }
    }
}

impl From<JsonValue> for Spawned {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Spawned::Null,
            JsonValue::Bool(b) => Spawned::Bool(b),
            JsonValue::Number(n) => Spawned::Number(n),
            JsonValue::String(s) => Spawned::String(s),
            JsonValue::Array(items) => Spawned::List(items.into_iter().map(Spawned::from).collect()),
            JsonValue::Object(members) => Spawned::Map(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Spawned::from(v)))
                    .collect(),
            ),
        }
    }
}

fn short(name: &str) -> &str {
    crate::descriptor::short_name(name)
}

fn mismatch(expected: &str, found: &Spawned) -> JkidError {
    match found {
        Spawned::Number(n) => JkidError::schema(format!("expected {expected}, found number {n}")),
        other => JkidError::schema(format!("expected {expected}, found {}", other.kind())),
    }
}

impl JsonType for bool {
    fn type_ref() -> TypeRef {
        TypeRef::Bool
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::Bool(*self)
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

/// Integers accept only integral numbers inside the target's range.
macro_rules! impl_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl JsonType for $ty {
            fn type_ref() -> TypeRef {
                TypeRef::Integer
            }

            fn render(&self) -> Dynamic<'_> {
                Dynamic::Number(*self as f64)
            }

            fn from_spawned(value: Spawned) -> Result<Self> {
                // `MAX as f64` rounds up to 2^BITS for the 64-bit types, so the
                // upper bound has to be exclusive.
                let upper = <$ty>::MAX as f64 + 1.0;
                match value {
                    Spawned::Number(n)
                        if n.fract() == 0.0 && n >= <$ty>::MIN as f64 && n < upper =>
                    {
                        Ok(n as $ty)
                    }
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl JsonType for f64 {
    fn type_ref() -> TypeRef {
        TypeRef::Float
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::Number(*self)
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Number(n) => Ok(n),
            other => Err(mismatch("number", &other)),
        }
    }
}

impl JsonType for f32 {
    fn type_ref() -> TypeRef {
        TypeRef::Float
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::Number(f64::from(*self))
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Number(n) => {
                let narrowed = n as f32;
                if n.is_finite() && !narrowed.is_finite() {
                    return Err(JkidError::schema(format!("number {n} is out of range for f32")));
                }
                Ok(narrowed)
            }
            other => Err(mismatch("number", &other)),
        }
    }
}

impl JsonType for String {
    fn type_ref() -> TypeRef {
        TypeRef::String
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::String(Cow::Borrowed(self))
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl JsonType for char {
    fn type_ref() -> TypeRef {
        TypeRef::String
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::String(Cow::Owned(self.to_string()))
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(JkidError::schema(format!(
                        "expected a single character, found string {s:?}"
                    ))),
                }
            }
            other => Err(mismatch("character", &other)),
        }
    }
}

impl<T: JsonType> JsonType for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::Optional(Box::new(T::type_ref()))
    }

    fn render(&self) -> Dynamic<'_> {
        match self {
            Some(value) => value.render(),
            None => Dynamic::Null,
        }
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Null => Ok(None),
            other => T::from_spawned(other).map(Some),
        }
    }
}

impl<T: JsonType> JsonType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::List(Box::new(T::type_ref()))
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::List(self.iter().map(JsonType::render).collect())
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::List(items) => items.into_iter().map(T::from_spawned).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl<V: JsonType> JsonType for BTreeMap<String, V> {
    fn type_ref() -> TypeRef {
        TypeRef::Map(Box::new(V::type_ref()))
    }

    fn render(&self) -> Dynamic<'_> {
        Dynamic::Map(self.iter().map(|(k, v)| (k.as_str(), v.render())).collect())
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, V::from_spawned(v)?)))
                .collect(),
            other => Err(mismatch("object", &other)),
        }
    }
}

/// Rendered with keys sorted so output does not depend on hash order.
impl<V, S> JsonType for HashMap<String, V, S>
where
    V: JsonType,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    fn type_ref() -> TypeRef {
        TypeRef::Map(Box::new(V::type_ref()))
    }

    fn render(&self) -> Dynamic<'_> {
        let mut entries: Vec<(&str, Dynamic<'_>)> =
            self.iter().map(|(k, v)| (k.as_str(), v.render())).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Dynamic::Map(entries)
    }

    fn from_spawned(value: Spawned) -> Result<Self> {
        match value {
            Spawned::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, V::from_spawned(v)?)))
                .collect(),
            other => Err(mismatch("object", &other)),
        }
    }
}

/// Implement [`JsonType`] for types that implement [`Describe`].
///
/// ```ignore
/// json_object!(Point, Line);
/// ```
#[macro_export]
macro_rules! json_object {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::JsonType for $ty {
            fn type_ref() -> $crate::TypeRef {
                $crate::TypeRef::object::<Self>()
            }

            fn render(&self) -> $crate::Dynamic<'_> {
                $crate::Dynamic::Object(self)
            }

            fn from_spawned(value: $crate::Spawned) -> $crate::Result<Self> {
                value.into_instance::<Self>()
            }
        }
    )+};
}

/// Implement [`JsonType`] for `Box<dyn Trait>` where `Trait: JsonObject`.
///
/// Serialization uses the boxed value's own descriptor. Deserialization is
/// only possible through a field configured with
/// [`Field::concrete`](crate::Field::concrete).
#[macro_export]
macro_rules! json_interface {
    ($($tr:ident),+ $(,)?) => {$(
        impl $crate::JsonType for ::std::boxed::Box<dyn $tr> {
            fn type_ref() -> $crate::TypeRef {
                $crate::TypeRef::Interface(stringify!($tr))
            }

            fn render(&self) -> $crate::Dynamic<'_> {
                $crate::Dynamic::Object(&**self)
            }

            fn from_spawned(_value: $crate::Spawned) -> $crate::Result<Self> {
                Err($crate::JkidError::unresolved_interface(stringify!($tr)))
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_reject_fractions_and_out_of_range() {
        assert_eq!(i32::from_spawned(Spawned::Number(7.0)).unwrap(), 7);
        assert!(i32::from_spawned(Spawned::Number(7.5)).is_err());
        assert!(u8::from_spawned(Spawned::Number(256.0)).is_err());
        assert!(u8::from_spawned(Spawned::Number(-1.0)).is_err());
    }

    #[test]
    fn strings_are_not_coerced_to_numbers() {
        let err = i64::from_spawned(Spawned::String("42".into())).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn option_maps_null_to_none() {
        assert_eq!(Option::<i32>::from_spawned(Spawned::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_spawned(Spawned::Number(3.0)).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn char_needs_exactly_one_character() {
        assert_eq!(char::from_spawned(Spawned::String("x".into())).unwrap(), 'x');
        assert!(char::from_spawned(Spawned::String("xy".into())).is_err());
    }
}
