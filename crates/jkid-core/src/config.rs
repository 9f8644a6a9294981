//! Engine configuration and the [`Jkid`] engine that carries it.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::cache::TypeCache;
use crate::deserializer;
use crate::error::Result;
use crate::kinds::JsonType;
use crate::parser::DEFAULT_MAX_DEPTH;
use crate::serializer;

/// What to do with a JSON property that matches no field of the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownProperties {
    /// Fail with a schema error naming the property.
    #[default]
    Reject,
    /// Skip the property, including any nested object or array under it.
    Ignore,
}

/// Deserialization settings. Loadable from JSON through serde:
///
/// ```
/// use jkid_core::{Config, UnknownProperties};
///
/// let config: Config = serde_json::from_str(r#"{"unknown_properties": "ignore"}"#).unwrap();
/// assert_eq!(config.unknown_properties, UnknownProperties::Ignore);
/// assert_eq!(config.max_depth, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub unknown_properties: UnknownProperties,
    /// Maximum nesting of objects and arrays accepted by the parser.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unknown_properties: UnknownProperties::Reject,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unknown_properties(mut self, policy: UnknownProperties) -> Self {
        self.unknown_properties = policy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// A configured engine with its own descriptor cache.
///
/// Clones share the cache, so descriptors built through one clone are
/// reused by all of them.
#[derive(Clone, Default)]
pub struct Jkid {
    config: Config,
    cache: Arc<TypeCache>,
}

impl Jkid {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: Arc::new(TypeCache::new()),
        }
    }

    /// An engine that shares an existing cache.
    pub fn with_cache(config: Config, cache: Arc<TypeCache>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TypeCache> {
        &self.cache
    }

    pub fn serialize<T: JsonType>(&self, value: &T) -> Result<String> {
        serializer::serialize_with(value, &self.cache)
    }

    pub fn deserialize<T: JsonType>(&self, text: &str) -> Result<T> {
        deserializer::deserialize_with(text, &self.cache, &self.config)
    }
}

static DEFAULT_ENGINE: LazyLock<Jkid> = LazyLock::new(Jkid::default);

/// The process-wide engine used by [`serialize`](crate::serialize) and
/// [`deserialize`](crate::deserialize).
pub fn default_engine() -> &'static Jkid {
    &DEFAULT_ENGINE
}
