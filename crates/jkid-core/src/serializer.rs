//! Serializer: renders instances to JSON text through their cached descriptors.
//!
//! Output is compact with a space after `,` and `:`:
//!
//! ```text
//! {"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}, "tags": ["a", "b"]}
//! ```
//!
//! # Key design decisions
//!
//! - **Descriptor driven**: objects are written field by field in declared
//!   order. Excluded fields are skipped and renamed fields use their JSON name.
//! - **Runtime dispatch**: an object's descriptor is looked up from the value's
//!   own type, so interface fields render the concrete value they hold.
//! - **Number normalization**: integral values within ±2^53 print without a
//!   fraction (`10`, not `10.0`); NaN and infinities print `null`.

use std::fmt::Write as _;

use crate::cache::TypeCache;
use crate::error::{JkidError, Result};
use crate::kinds::{Dynamic, JsonObject, JsonType};
use crate::value::JsonValue;

/// 2^53, the largest magnitude below which every integer is exact in `f64`.
pub(crate) const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

pub(crate) fn serialize_with<T: JsonType>(value: &T, cache: &TypeCache) -> Result<String> {
    let mut out = String::new();
    write_dynamic(&value.render(), cache, &mut out)?;
    Ok(out)
}

fn write_dynamic(value: &Dynamic<'_>, cache: &TypeCache, out: &mut String) -> Result<()> {
    match value {
        Dynamic::Null => out.push_str("null"),
        Dynamic::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Dynamic::Number(n) => write_number(*n, out),
        Dynamic::String(s) => write_string(s, out),
        Dynamic::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_dynamic(item, cache, out)?;
            }
            out.push(']');
        }
        Dynamic::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_dynamic(item, cache, out).map_err(|e| e.at_field("", key))?;
            }
            out.push('}');
        }
        Dynamic::Object(object) => write_object(*object, cache, out)?,
    }
    Ok(())
}

fn write_object(object: &dyn JsonObject, cache: &TypeCache, out: &mut String) -> Result<()> {
    let descriptor = cache.get_key(object.type_key())?;
    let instance = object.as_any();
    let foreign = || {
        JkidError::reflection(
            descriptor.name(),
            "descriptor does not match the instance being serialized",
        )
    };

    out.push('{');
    let mut first = true;
    for field in descriptor.fields().iter().filter(|f| !f.is_excluded()) {
        if !first {
            out.push_str(", ");
        }
        first = false;
        write_string(field.json_name(), out);
        out.push_str(": ");

        let at_field = |e: JkidError| e.at_field(descriptor.name(), field.json_name());
        match field.converter() {
            Some(converter) => {
                let value = field.get(instance).ok_or_else(foreign)?;
                let json = converter.to_json(value).map_err(at_field)?;
                write_json_value(&json, out);
            }
            None => {
                let rendered = field.render(instance).ok_or_else(foreign)?;
                write_dynamic(&rendered, cache, out).map_err(at_field)?;
            }
        }
    }
    out.push('}');
    Ok(())
}

/// Render a converter's output with the same rules as rendered values.
fn write_json_value(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => write_number(*n, out),
        JsonValue::String(s) => write_string(s, out),
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_json_value(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(members) => {
            out.push('{');
            for (i, (key, item)) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_json_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: f64, out: &mut String) {
    if !n.is_finite() {
        out.push_str("null");
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        let _ = write!(out, "{}", n as i64);
    } else {
        let _ = write!(out, "{n}");
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
