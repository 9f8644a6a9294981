//! Type descriptor cache.
//!
//! Describing a type (walking its field list, resolving converters, checking
//! interface targets) happens once per type; afterwards every serialize and
//! deserialize call reads the shared `Arc<TypeDescriptor>`.
//!
//! Lookups take a read lock. A miss takes the write lock, checks again and
//! builds the descriptor while holding it, so concurrent first uses of the
//! same type still build exactly one descriptor. Building never consults the
//! descriptor map (nested types are resolved lazily when a seed needs them),
//! so holding the lock cannot deadlock.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::convert::{ConverterRef, ErasedConverter};
use crate::descriptor::{Describe, TypeDescriptor, TypeKey};
use crate::error::Result;

/// Memoized [`TypeDescriptor`]s, keyed by type.
#[derive(Default)]
pub struct TypeCache {
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    converters: ConverterPool,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `T`, built on first use.
    pub fn get<T: Describe>(&self) -> Result<Arc<TypeDescriptor>> {
        self.get_key(TypeKey::of::<T>())
    }

    pub fn get_key(&self, key: TypeKey) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.descriptors.read().get(&key.id()) {
            return Ok(Arc::clone(descriptor));
        }

        let mut descriptors = self.descriptors.write();
        if let Some(descriptor) = descriptors.get(&key.id()) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(key.build(&self.converters)?);
        log::debug!(
            "described `{}` with {} field(s)",
            descriptor.name(),
            descriptor.fields().len()
        );
        descriptors.insert(key.id(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Whether `T` has already been described.
    pub fn contains<T: Describe>(&self) -> bool {
        self.descriptors.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of converter instances created so far.
    pub fn converter_count(&self) -> usize {
        self.converters.instances.lock().len()
    }
}

/// Shared converter instances, one per converter type.
#[derive(Default)]
pub(crate) struct ConverterPool {
    instances: Mutex<HashMap<TypeId, Arc<dyn ErasedConverter>>>,
}

impl ConverterPool {
    pub(crate) fn resolve(&self, converter: ConverterRef) -> Result<Arc<dyn ErasedConverter>> {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(&converter.id()) {
            return Ok(Arc::clone(instance));
        }
        let instance = converter.create()?;
        log::debug!("created converter `{}`", converter.name());
        instances.insert(converter.id(), Arc::clone(&instance));
        Ok(instance)
    }
}
