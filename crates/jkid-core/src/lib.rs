//! # jkid-core
//!
//! JSON serialization and deserialization driven by **declarative per-field
//! metadata** instead of runtime reflection.
//!
//! A type lists its fields once, in constructor order, through [`Describe`].
//! Each field can be renamed, excluded, given a default, routed through a
//! custom [`Converter`] or pointed at a concrete type when it holds a trait
//! object. The resulting [`TypeDescriptor`] is built on first use and cached.
//!
//! ## Quick start
//!
//! ```rust
//! use jkid_core::{deserialize, json_object, serialize, Describe, TypeSpec};
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
//!             .constructor(|args| Ok(Point { x: args.take("x")?, y: args.take("y")? }))
//!     }
//! }
//! json_object!(Point);
//!
//! let json = serialize(&Point { x: 10, y: 20 }).unwrap();
//! assert_eq!(json, r#"{"x": 10, "y": 20}"#);
//!
//! let back: Point = deserialize(&json).unwrap();
//! assert_eq!(back, Point { x: 10, y: 20 });
//! ```
//!
//! ## Modules
//!
//! - [`parser`]: JSON text → structural events (or a [`JsonValue`] tree)
//! - [`descriptor`]: `Describe`, `TypeSpec`, `Field` and the resolved descriptors
//! - [`cache`]: `TypeCache`, memoized descriptors and converter instances
//! - [`kinds`]: the `JsonType` capability for scalars, collections and objects
//! - [`convert`]: custom converters, including chrono date converters
//! - [`config`]: `Config`, unknown-property policy and the `Jkid` engine
//! - [`value`]: `JsonValue`, the parser's scalar/interop tree
//! - [`error`]: Error types for syntax, schema and reflection failures

pub mod cache;
pub mod config;
pub mod convert;
pub mod descriptor;
mod deserializer;
pub mod error;
pub mod kinds;
pub mod parser;
mod seed;
mod serializer;
pub mod value;

pub use cache::TypeCache;
pub use config::{default_engine, Config, Jkid, UnknownProperties};
pub use convert::{Converter, DateConverter, DatePattern, DateTimeConverter, IsoDate, IsoDateTime};
pub use descriptor::{
    Arguments, Describe, Field, FieldDescriptor, TypeDescriptor, TypeKey, TypeRef, TypeSpec,
};
pub use error::{JkidError, Result};
pub use kinds::{Dynamic, JsonObject, JsonType, Spawned};
pub use parser::{events, parse, parse_value, EventSink, JsonEvent};
pub use value::JsonValue;

/// Serialize `value` to JSON text with the default engine.
pub fn serialize<T: JsonType>(value: &T) -> Result<String> {
    default_engine().serialize(value)
}

/// Deserialize JSON text into a `T` with the default engine.
///
/// Unknown properties are rejected; use a [`Jkid`] engine built from a
/// [`Config`] to ignore them instead.
pub fn deserialize<T: JsonType>(text: &str) -> Result<T> {
    default_engine().deserialize(text)
}
