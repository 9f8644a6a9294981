//! Custom converters: pluggable bidirectional transforms for single fields.
//!
//! A converter owns both directions of a field's JSON form, so serialize and
//! deserialize always agree (e.g. one date pattern used for formatting and
//! parsing). The [`TypeCache`](crate::cache::TypeCache) creates at most one
//! instance per converter type and shares it between every field that names it.

use std::any::{type_name, Any, TypeId};
use std::fmt::Write as _;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{JkidError, Result};
use crate::value::JsonValue;

/// A custom conversion between a field value and its JSON form.
pub trait Converter: Sized + Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    /// Build the shared instance. Failing here surfaces as a reflection error
    /// the first time a type using this converter is described.
    fn create() -> Result<Self>;

    fn to_json(&self, value: &Self::Value) -> Result<JsonValue>;

    fn from_json(&self, value: JsonValue) -> Result<Self::Value>;
}

/// Type-erased converter as stored in field descriptors.
pub(crate) trait ErasedConverter: Send + Sync {
    fn name(&self) -> &'static str;
    fn to_json(&self, value: &dyn Any) -> Result<JsonValue>;
    fn from_json(&self, value: JsonValue) -> Result<Box<dyn Any>>;
}

impl<C: Converter> ErasedConverter for C {
    fn name(&self) -> &'static str {
        type_name::<C>()
    }

    fn to_json(&self, value: &dyn Any) -> Result<JsonValue> {
        let value = value.downcast_ref::<C::Value>().ok_or_else(|| {
            JkidError::reflection(
                type_name::<C>(),
                format!("converter expects values of type `{}`", type_name::<C::Value>()),
            )
        })?;
        Converter::to_json(self, value)
    }

    fn from_json(&self, value: JsonValue) -> Result<Box<dyn Any>> {
        Converter::from_json(self, value).map(|v| Box::new(v) as Box<dyn Any>)
    }
}

/// Declared reference to a converter type, resolved to a shared instance by the cache.
#[derive(Clone, Copy)]
pub(crate) struct ConverterRef {
    id: TypeId,
    name: &'static str,
    create: fn() -> Result<Arc<dyn ErasedConverter>>,
}

impl ConverterRef {
    pub(crate) fn of<C: Converter>() -> Self {
        ConverterRef {
            id: TypeId::of::<C>(),
            name: type_name::<C>(),
            create: create_erased::<C>,
        }
    }

    pub(crate) fn id(&self) -> TypeId {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn create(&self) -> Result<Arc<dyn ErasedConverter>> {
        (self.create)()
    }
}

fn create_erased<C: Converter>() -> Result<Arc<dyn ErasedConverter>> {
    Ok(Arc::new(C::create()?))
}

/// A chrono format pattern, fixed at the type level so that a converter
/// type names exactly one pattern.
pub trait DatePattern: Send + Sync + 'static {
    const PATTERN: &'static str;
}

/// `2024-03-15`
pub struct IsoDate;

impl DatePattern for IsoDate {
    const PATTERN: &'static str = "%Y-%m-%d";
}

/// `2024-03-15T09:30:00`
pub struct IsoDateTime;

impl DatePattern for IsoDateTime {
    const PATTERN: &'static str = "%Y-%m-%dT%H:%M:%S";
}

fn check_pattern<P: DatePattern>(converter: &'static str) -> Result<()> {
    if StrftimeItems::new(P::PATTERN).any(|item| matches!(item, Item::Error)) {
        return Err(JkidError::reflection(
            converter,
            format!("invalid date pattern `{}`", P::PATTERN),
        ));
    }
    Ok(())
}

fn expect_string(value: JsonValue, pattern: &str) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s),
        other => Err(JkidError::schema(format!(
            "expected a date string in format `{pattern}`, found {}",
            other.kind()
        ))),
    }
}

/// Converts `NaiveDate` to and from a string in pattern `P`.
pub struct DateConverter<P> {
    _pattern: PhantomData<fn() -> P>,
}

impl<P: DatePattern> Converter for DateConverter<P> {
    type Value = NaiveDate;

    fn create() -> Result<Self> {
        check_pattern::<P>(type_name::<Self>())?;
        log::debug!("date converter ready for pattern {:?}", P::PATTERN);
        Ok(DateConverter {
            _pattern: PhantomData,
        })
    }

    fn to_json(&self, value: &NaiveDate) -> Result<JsonValue> {
        let mut out = String::new();
        write!(out, "{}", value.format(P::PATTERN)).map_err(|_| {
            JkidError::reflection(
                type_name::<Self>(),
                format!("pattern `{}` cannot format a date", P::PATTERN),
            )
        })?;
        Ok(JsonValue::String(out))
    }

    fn from_json(&self, value: JsonValue) -> Result<NaiveDate> {
        let text = expect_string(value, P::PATTERN)?;
        NaiveDate::parse_from_str(&text, P::PATTERN).map_err(|e| {
            JkidError::schema(format!(
                "{text:?} does not match date format `{}`: {e}",
                P::PATTERN
            ))
        })
    }
}

/// Converts `NaiveDateTime` to and from a string in pattern `P`.
pub struct DateTimeConverter<P> {
    _pattern: PhantomData<fn() -> P>,
}

impl<P: DatePattern> Converter for DateTimeConverter<P> {
    type Value = NaiveDateTime;

    fn create() -> Result<Self> {
        check_pattern::<P>(type_name::<Self>())?;
        log::debug!("date-time converter ready for pattern {:?}", P::PATTERN);
        Ok(DateTimeConverter {
            _pattern: PhantomData,
        })
    }

    fn to_json(&self, value: &NaiveDateTime) -> Result<JsonValue> {
        let mut out = String::new();
        write!(out, "{}", value.format(P::PATTERN)).map_err(|_| {
            JkidError::reflection(
                type_name::<Self>(),
                format!("pattern `{}` cannot format a date-time", P::PATTERN),
            )
        })?;
        Ok(JsonValue::String(out))
    }

    fn from_json(&self, value: JsonValue) -> Result<NaiveDateTime> {
        let text = expect_string(value, P::PATTERN)?;
        NaiveDateTime::parse_from_str(&text, P::PATTERN).map_err(|e| {
            JkidError::schema(format!(
                "{text:?} does not match date-time format `{}`: {e}",
                P::PATTERN
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DayMonthYear;

    impl DatePattern for DayMonthYear {
        const PATTERN: &'static str = "%d-%m-%Y";
    }

    struct Broken;

    impl DatePattern for Broken {
        const PATTERN: &'static str = "%Y-%Q";
    }

    #[test]
    fn date_converter_uses_one_pattern_both_ways() {
        let converter = DateConverter::<DayMonthYear>::create().unwrap();
        let date = NaiveDate::from_ymd_opt(1987, 2, 13).unwrap();
        let json = Converter::to_json(&converter, &date).unwrap();
        assert_eq!(json, JsonValue::String("13-02-1987".to_string()));
        assert_eq!(Converter::from_json(&converter, json).unwrap(), date);
    }

    #[test]
    fn invalid_pattern_fails_creation() {
        let err = DateConverter::<Broken>::create().err().unwrap();
        assert!(err.is_reflection());
    }

    #[test]
    fn non_string_input_is_a_schema_error() {
        let converter = DateConverter::<IsoDate>::create().unwrap();
        let err = Converter::from_json(&converter, JsonValue::Number(1.0)).unwrap_err();
        assert!(err.is_schema());
    }
}
