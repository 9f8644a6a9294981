//! Seeds: in-progress builders for JSON objects and arrays.
//!
//! Every open `{` or `[` gets a seed node. Nodes live in an arena
//! ([`SeedTree`]) and refer to their children by index, so the tree can be
//! driven by any event source without relying on the call stack.
//!
//! | variant        | built for                          | accepts                        |
//! |----------------|------------------------------------|--------------------------------|
//! | `Object`       | a described type                   | named scalars and composites   |
//! | `ObjectList`   | `Vec<T>` of composite elements     | composite elements only        |
//! | `ValueList`    | `Vec<T>` of scalar elements        | scalar elements only           |
//! | `Map`          | string-keyed maps                  | named scalars and composites   |
//! | `Ignored`      | unknown properties being skipped   | anything                       |
//!
//! A node moves `Open` → `Closing` (its closing token was seen) → `Spawned`
//! (materialized exactly once). Spawning is depth-first: an object seed spawns
//! its children, lifts every slot into its field's Rust type and only then
//! calls the constructor.

use std::any::Any;
use std::mem;
use std::sync::Arc;

use crate::cache::TypeCache;
use crate::config::{Config, UnknownProperties};
use crate::descriptor::{TypeDescriptor, TypeRef};
use crate::error::{JkidError, Result};
use crate::kinds::Spawned;
use crate::value::JsonValue;

pub(crate) type SeedId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeedState {
    Open,
    Closing,
    Spawned,
}

/// A value collected by a seed: either a scalar that already arrived or a child seed.
enum Slot {
    Value(Spawned),
    Child(SeedId),
}

struct ObjectSeed {
    descriptor: Arc<TypeDescriptor>,
    /// One slot per field, in constructor order.
    slots: Vec<Option<Slot>>,
}

struct ObjectListSeed {
    element: TypeRef,
    elements: Vec<Slot>,
}

struct ValueListSeed {
    element: TypeRef,
    values: Vec<Spawned>,
}

struct MapSeed {
    value: TypeRef,
    entries: Vec<(String, Slot)>,
}

enum Seed {
    Object(ObjectSeed),
    ObjectList(ObjectListSeed),
    ValueList(ValueListSeed),
    Map(MapSeed),
    Ignored,
}

impl Seed {
    fn label(&self) -> &'static str {
        match self {
            Seed::Object(_) => "object",
            Seed::ObjectList(_) => "object list",
            Seed::ValueList(_) => "value list",
            Seed::Map(_) => "map",
            Seed::Ignored => "ignored",
        }
    }
}

struct SeedNode {
    seed: Seed,
    state: SeedState,
    /// Owning type and JSON key this seed was opened under, for error locations.
    origin: Option<(String, String)>,
}

/// Where a nested composite goes inside its parent.
enum Target {
    Field { index: usize, ty: TypeRef },
    Element(TypeRef),
    Entry(TypeRef),
    Skip,
}

/// Arena of seed nodes for one deserialization call.
pub(crate) struct SeedTree<'c> {
    nodes: Vec<SeedNode>,
    cache: &'c TypeCache,
    config: &'c Config,
}

impl<'c> SeedTree<'c> {
    pub(crate) fn new(cache: &'c TypeCache, config: &'c Config) -> Self {
        Self {
            nodes: Vec::new(),
            cache,
            config,
        }
    }

    pub(crate) fn state(&self, id: SeedId) -> SeedState {
        self.nodes[id].state
    }

    /// Create a detached seed for a value of declared type `ty`.
    /// `is_list` says whether the JSON opened an array or an object.
    pub(crate) fn create_seed(&mut self, ty: &TypeRef, is_list: bool) -> Result<SeedId> {
        let seed = match ty.without_optional() {
            TypeRef::List(element) => {
                if !is_list {
                    return Err(JkidError::schema(format!(
                        "expected {}, found object",
                        ty.describe()
                    )));
                }
                if element.is_scalar() {
                    Seed::ValueList(ValueListSeed {
                        element: (**element).clone(),
                        values: Vec::new(),
                    })
                } else {
                    Seed::ObjectList(ObjectListSeed {
                        element: (**element).clone(),
                        elements: Vec::new(),
                    })
                }
            }
            other if is_list => {
                return Err(JkidError::schema(format!(
                    "expected {}, found array",
                    other.describe()
                )))
            }
            TypeRef::Map(value) => Seed::Map(MapSeed {
                value: (**value).clone(),
                entries: Vec::new(),
            }),
            TypeRef::Object(key) => {
                let descriptor = self.cache.get_key(*key)?;
                let slots = descriptor.fields().iter().map(|_| None).collect();
                Seed::Object(ObjectSeed { descriptor, slots })
            }
            TypeRef::Interface(name) => {
                return Err(JkidError::schema(format!(
                    "cannot build interface `{name}` without a concrete target"
                )))
            }
            other => {
                return Err(JkidError::schema(format!(
                    "expected {}, found object",
                    other.describe()
                )))
            }
        };
        Ok(self.push(seed))
    }

    fn push(&mut self, seed: Seed) -> SeedId {
        log::trace!("seed #{} opened as {}", self.nodes.len(), seed.label());
        self.nodes.push(SeedNode {
            seed,
            state: SeedState::Open,
            origin: None,
        });
        self.nodes.len() - 1
    }

    fn open_node(&mut self, id: SeedId) -> Result<&mut SeedNode> {
        let node = &mut self.nodes[id];
        if node.state != SeedState::Open {
            return Err(JkidError::schema(format!(
                "{} seed received data after its closing token",
                node.seed.label()
            )));
        }
        Ok(node)
    }

    /// Schema error for an unknown property, or `Ok(())` if the policy ignores it.
    fn unknown_property(&self, descriptor: &TypeDescriptor, name: &str) -> Result<()> {
        match self.config.unknown_properties {
            UnknownProperties::Ignore => {
                log::trace!("ignoring unknown property `{name}` of `{}`", descriptor.name());
                Ok(())
            }
            UnknownProperties::Reject => Err(JkidError::schema(format!(
                "unknown property `{name}`"
            ))
            .at_field(descriptor.name(), name)),
        }
    }

    /// Record a scalar for `name` (or the next element, for lists).
    pub(crate) fn set_simple_property(
        &mut self,
        id: SeedId,
        name: Option<&str>,
        value: JsonValue,
    ) -> Result<()> {
        self.store_scalar(id, name, value)
            .map_err(|e| self.locate(id, e))
    }

    fn store_scalar(&mut self, id: SeedId, name: Option<&str>, value: JsonValue) -> Result<()> {
        let node = self.open_node(id)?;
        match &mut node.seed {
            Seed::Object(seed) => {
                let name = property(name)?;
                let Some(index) = seed.descriptor.field_by_json_name(name) else {
                    let descriptor = Arc::clone(&seed.descriptor);
                    return self.unknown_property(&descriptor, name);
                };
                let field = &seed.descriptor.fields()[index];
                let owner = seed.descriptor.name();
                let stored = match field
                    .convert_from_json(value.clone())
                    .map_err(|e| e.at_field(owner, name))?
                {
                    Some(converted) => Spawned::Instance(converted),
                    None => {
                        field
                            .declared_type()
                            .accepts_scalar(&value)
                            .map_err(|e| e.at_field(owner, name))?;
                        Spawned::from(value)
                    }
                };
                seed.slots[index] = Some(Slot::Value(stored));
            }
            Seed::ObjectList(seed) => {
                if !(value.is_null() && seed.element.is_nullable()) {
                    return Err(JkidError::schema(format!(
                        "found {} in a collection of {}",
                        value.kind(),
                        seed.element.describe()
                    )));
                }
                seed.elements.push(Slot::Value(Spawned::Null));
            }
            Seed::ValueList(seed) => {
                seed.element.accepts_scalar(&value)?;
                seed.values.push(Spawned::from(value));
            }
            Seed::Map(seed) => {
                let name = property(name)?;
                seed.value
                    .accepts_scalar(&value)
                    .map_err(|e| e.at_field("", name))?;
                seed.entries
                    .push((name.to_string(), Slot::Value(Spawned::from(value))));
            }
            Seed::Ignored => {}
        }
        Ok(())
    }

    /// Create and register the child seed for a nested object.
    pub(crate) fn open_object(&mut self, id: SeedId, name: Option<&str>) -> Result<SeedId> {
        self.open_composite(id, name, false)
    }

    /// Create and register the child seed for a nested array.
    pub(crate) fn open_array(&mut self, id: SeedId, name: Option<&str>) -> Result<SeedId> {
        self.open_composite(id, name, true)
    }

    fn open_composite(&mut self, id: SeedId, name: Option<&str>, is_list: bool) -> Result<SeedId> {
        self.register_child(id, name, is_list)
            .map_err(|e| self.locate(id, e))
    }

    fn register_child(&mut self, id: SeedId, name: Option<&str>, is_list: bool) -> Result<SeedId> {
        let node = self.open_node(id)?;
        let target = match &node.seed {
            Seed::Object(seed) => {
                let name = property(name)?;
                match seed.descriptor.field_by_json_name(name) {
                    Some(index) => {
                        let field = &seed.descriptor.fields()[index];
                        if field.has_converter() {
                            return Err(JkidError::schema(format!(
                                "expected a scalar for converted field, found {}",
                                if is_list { "array" } else { "object" }
                            ))
                            .at_field(seed.descriptor.name(), name));
                        }
                        Target::Field {
                            index,
                            ty: field.target_type().clone(),
                        }
                    }
                    None => {
                        let descriptor = Arc::clone(&seed.descriptor);
                        self.unknown_property(&descriptor, name)?;
                        Target::Skip
                    }
                }
            }
            Seed::ObjectList(seed) => Target::Element(seed.element.clone()),
            Seed::ValueList(seed) => {
                return Err(JkidError::schema(format!(
                    "found {} in a collection of {}",
                    if is_list { "array" } else { "object" },
                    seed.element.describe()
                )))
            }
            Seed::Map(seed) => Target::Entry(seed.value.clone()),
            Seed::Ignored => Target::Skip,
        };

        match target {
            Target::Skip => Ok(self.push(Seed::Ignored)),
            Target::Field { index, ty } => {
                let origin = self.field_names(id, index);
                let child = self
                    .create_seed(&ty, is_list)
                    .map_err(|e| e.at_field(&origin.0, &origin.1))?;
                self.nodes[child].origin = Some(origin);
                if let Seed::Object(seed) = &mut self.nodes[id].seed {
                    seed.slots[index] = Some(Slot::Child(child));
                }
                Ok(child)
            }
            Target::Element(ty) => {
                let child = self.create_seed(&ty, is_list)?;
                if let Seed::ObjectList(seed) = &mut self.nodes[id].seed {
                    seed.elements.push(Slot::Child(child));
                }
                Ok(child)
            }
            Target::Entry(ty) => {
                let name = property(name)?;
                let child = self
                    .create_seed(&ty, is_list)
                    .map_err(|e| e.at_field("", name))?;
                self.nodes[child].origin = Some((String::new(), name.to_string()));
                if let Seed::Map(seed) = &mut self.nodes[id].seed {
                    seed.entries.push((name.to_string(), Slot::Child(child)));
                }
                Ok(child)
            }
        }
    }

    /// Attach the location this seed was opened under, if the error has none yet.
    fn locate(&self, id: SeedId, err: JkidError) -> JkidError {
        match &self.nodes[id].origin {
            Some((owner, field)) => err.at_field(owner, field),
            None => err,
        }
    }

    fn field_names(&self, id: SeedId, index: usize) -> (String, String) {
        match &self.nodes[id].seed {
            Seed::Object(seed) => (
                seed.descriptor.name().to_string(),
                seed.descriptor.fields()[index].json_name().to_string(),
            ),
            _ => (String::new(), String::new()),
        }
    }

    /// Mark that the closing token of seed `id` was observed.
    pub(crate) fn close(&mut self, id: SeedId) -> Result<()> {
        let node = self.open_node(id)?;
        node.state = SeedState::Closing;
        Ok(())
    }

    /// Materialize seed `id` and, depth-first, everything below it.
    pub(crate) fn spawn(&mut self, id: SeedId) -> Result<Spawned> {
        let node = &mut self.nodes[id];
        if node.state != SeedState::Closing {
            return Err(JkidError::schema(format!(
                "{} seed spawned while {:?}",
                node.seed.label(),
                node.state
            )));
        }
        node.state = SeedState::Spawned;
        let seed = mem::replace(&mut node.seed, Seed::Ignored);
        log::trace!("seed #{id} spawning as {}", seed.label());

        match seed {
            Seed::Object(seed) => self.spawn_object(seed),
            Seed::ObjectList(seed) => {
                let items = seed
                    .elements
                    .into_iter()
                    .map(|slot| self.spawn_slot(slot))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Spawned::List(items))
            }
            Seed::ValueList(seed) => Ok(Spawned::List(seed.values)),
            Seed::Map(seed) => {
                let entries = seed
                    .entries
                    .into_iter()
                    .map(|(key, slot)| {
                        let value = self.spawn_slot(slot).map_err(|e| e.at_field("", &key))?;
                        Ok((key, value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Spawned::Map(entries))
            }
            Seed::Ignored => Ok(Spawned::Null),
        }
    }

    fn spawn_slot(&mut self, slot: Slot) -> Result<Spawned> {
        match slot {
            Slot::Value(value) => Ok(value),
            Slot::Child(child) => self.spawn(child),
        }
    }

    fn spawn_object(&mut self, seed: ObjectSeed) -> Result<Spawned> {
        let descriptor = seed.descriptor;
        let mut values: Vec<Option<Box<dyn Any>>> = Vec::with_capacity(seed.slots.len());
        for (field, slot) in descriptor.fields().iter().zip(seed.slots) {
            let at_field = |e: JkidError| e.at_field(descriptor.name(), field.json_name());
            let value = match slot {
                Some(slot) => {
                    let spawned = self.spawn_slot(slot).map_err(at_field)?;
                    Some(field.lift(spawned).map_err(at_field)?)
                }
                None => field.fill_missing().map_err(at_field)?,
            };
            values.push(value);
        }
        descriptor.construct(values).map(Spawned::Instance)
    }
}

fn property(name: Option<&str>) -> Result<&str> {
    name.ok_or_else(|| JkidError::schema("object member arrived without a property name"))
}
