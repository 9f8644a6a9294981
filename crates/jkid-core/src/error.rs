//! Error types for serialization and deserialization.

use thiserror::Error;

/// Errors that can occur while parsing, binding or rendering JSON.
#[derive(Error, Debug)]
pub enum JkidError {
    /// The input text was not well-formed JSON.
    /// `offset` is the byte offset where the problem was detected.
    #[error("JSON syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Well-formed JSON that does not match the target type's shape.
    /// `type_name` and `field` are empty when the failure happened outside
    /// any described object (e.g. at the root of a list).
    #[error("schema error{}: {message}", location(.type_name, .field))]
    Schema {
        type_name: String,
        field: String,
        message: String,
    },

    /// A type's declared metadata is unusable (no constructor, unresolved
    /// interface, converter that cannot be created, ...).
    #[error("reflection error for `{type_name}`: {message}")]
    Reflection { type_name: String, message: String },

    /// Conversion through `serde_json` failed (interop path only).
    #[error("serde_json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn location(type_name: &str, field: &str) -> String {
    match (type_name.is_empty(), field.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!(" in `{type_name}`"),
        (true, false) => format!(" at `{field}`"),
        (false, false) => format!(" in `{type_name}.{field}`"),
    }
}

impl JkidError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        JkidError::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// A schema error with no location yet; callers attach it via [`JkidError::at_field`].
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        JkidError::Schema {
            type_name: String::new(),
            field: String::new(),
            message: message.into(),
        }
    }

    pub(crate) fn reflection(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        JkidError::Reflection {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Attach the owning type and field to a schema error that has no location yet.
    /// The innermost location is kept, so errors point at the field that failed.
    pub(crate) fn at_field(self, owner: &str, name: &str) -> Self {
        match self {
            JkidError::Schema {
                type_name,
                field,
                message,
            } if type_name.is_empty() && field.is_empty() => JkidError::Schema {
                type_name: owner.to_string(),
                field: name.to_string(),
                message,
            },
            other => other,
        }
    }

    #[doc(hidden)]
    pub fn unresolved_interface(name: &str) -> Self {
        JkidError::schema(format!(
            "cannot deserialize interface `{name}` without a concrete target"
        ))
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, JkidError::Syntax { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, JkidError::Schema { .. })
    }

    pub fn is_reflection(&self) -> bool {
        matches!(self, JkidError::Reflection { .. })
    }

    /// Byte offset of a syntax error.
    pub fn offset(&self) -> Option<usize> {
        match self {
            JkidError::Syntax { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Field named by a schema error, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            JkidError::Schema { field, .. } if !field.is_empty() => Some(field),
            _ => None,
        }
    }
}

/// Convenience alias used throughout jkid-core.
pub type Result<T> = std::result::Result<T, JkidError>;
