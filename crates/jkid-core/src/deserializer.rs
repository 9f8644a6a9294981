//! Deserialization driver: wires parser events into a seed tree rooted at
//! the requested target type and returns the spawned value.
//!
//! The driver keeps a stack of open seeds mirroring the parser's nesting.
//! Property names are buffered until the value that follows them arrives.
//! Nothing is materialized until the root closes; any error from the parser
//! or a seed aborts the call with no partial result.

use crate::cache::TypeCache;
use crate::config::Config;
use crate::descriptor::TypeRef;
use crate::error::{JkidError, Result};
use crate::kinds::{JsonType, Spawned};
use crate::parser::{EventSink, Parser};
use crate::seed::{SeedId, SeedState, SeedTree};
use crate::value::JsonValue;

pub(crate) fn deserialize_with<T: JsonType>(
    text: &str,
    cache: &TypeCache,
    config: &Config,
) -> Result<T> {
    let mut driver = Driver::new(T::type_ref(), cache, config);
    Parser::new(text, config.max_depth).parse(&mut driver)?;
    let spawned = driver.finish()?;
    T::from_spawned(spawned)
}

enum Root {
    Scalar(JsonValue),
    Seed(SeedId),
}

struct Driver<'c> {
    tree: SeedTree<'c>,
    root_type: TypeRef,
    stack: Vec<SeedId>,
    root: Option<Root>,
    pending: Option<String>,
}

impl<'c> Driver<'c> {
    fn new(root_type: TypeRef, cache: &'c TypeCache, config: &'c Config) -> Self {
        Self {
            tree: SeedTree::new(cache, config),
            root_type,
            stack: Vec::new(),
            root: None,
            pending: None,
        }
    }

    fn open(&mut self, is_list: bool) -> Result<()> {
        let id = match self.stack.last() {
            None => self.tree.create_seed(&self.root_type, is_list)?,
            Some(&parent) => {
                let name = self.pending.take();
                if is_list {
                    self.tree.open_array(parent, name.as_deref())?
                } else {
                    self.tree.open_object(parent, name.as_deref())?
                }
            }
        };
        self.stack.push(id);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let id = self
            .stack
            .pop()
            .ok_or_else(|| JkidError::schema("closing token without an open seed"))?;
        self.tree.close(id)?;
        if self.stack.is_empty() {
            self.root = Some(Root::Seed(id));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Spawned> {
        match self.root.take() {
            Some(Root::Scalar(value)) => {
                self.root_type.accepts_scalar(&value)?;
                Ok(Spawned::from(value))
            }
            Some(Root::Seed(id)) if self.tree.state(id) == SeedState::Closing => self.tree.spawn(id),
            _ => Err(JkidError::schema("input ended before the root value was complete")),
        }
    }
}

impl EventSink for Driver<'_> {
    fn begin_object(&mut self) -> Result<()> {
        self.open(false)
    }

    fn property_name(&mut self, name: String) -> Result<()> {
        self.pending = Some(name);
        Ok(())
    }

    fn begin_array(&mut self) -> Result<()> {
        self.open(true)
    }

    fn scalar_value(&mut self, value: JsonValue) -> Result<()> {
        match self.stack.last() {
            None => {
                self.root = Some(Root::Scalar(value));
                Ok(())
            }
            Some(&id) => {
                let name = self.pending.take();
                self.tree.set_simple_property(id, name.as_deref(), value)
            }
        }
    }

    fn end_array(&mut self) -> Result<()> {
        self.close()
    }

    fn end_object(&mut self) -> Result<()> {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<T: JsonType>(text: &str) -> Result<T> {
        deserialize_with(text, &TypeCache::new(), &Config::default())
    }

    #[test]
    fn root_scalars_are_type_checked() {
        assert_eq!(run::<i32>("42").unwrap(), 42);
        assert_eq!(run::<Option<String>>("null").unwrap(), None);
        assert!(run::<String>("42").unwrap_err().is_schema());
    }

    #[test]
    fn nested_lists_use_list_seeds() {
        let nested: Vec<Vec<i32>> = run("[[1, 2], [], [3]]").unwrap();
        assert_eq!(nested, vec![vec![1, 2], vec![], vec![3]]);
    }

    #[test]
    fn object_for_list_is_rejected() {
        assert!(run::<Vec<i32>>("{}").unwrap_err().is_schema());
    }

    #[test]
    fn syntax_errors_win_over_partial_results() {
        let err = run::<Vec<i32>>("[1, 2").unwrap_err();
        assert!(err.is_syntax());
    }
}
