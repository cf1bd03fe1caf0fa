//! # Factory: a named recipe with declared requirements.
//!
//! A factory is registered once per id. Its `requires` list is fixed at
//! construction (dependencies never change between invocations of the
//! same factory); duplicate keys are permitted and yield tuples where the
//! same item may legally appear more than once.

use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::items::Key;

use super::start::Start;

/// Unique factory identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(Arc<str>);

impl FactoryId {
    /// The id's text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FactoryId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for FactoryId {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// # Registration bundle for one kind of worker.
///
/// Bundles together:
/// - the unique id
/// - the ordered `requires` list of item keys
/// - the optional `provides` list (keys the worker is expected to push)
/// - the [`Start`] recipe
///
/// ## Example
/// ```
/// use depvisor::{Factory, StartFn};
///
/// # async fn start(host: depvisor::Host, deps: depvisor::Deps)
/// #     -> Result<depvisor::WorkerHandle, depvisor::SpawnError> { unimplemented!() }
/// let factory = Factory::new("probe", ["port", "speed"], StartFn::arc(start))
///     .provides(["link"]);
/// assert_eq!(factory.requires().len(), 2);
/// ```
#[derive(Clone)]
pub struct Factory {
    id: FactoryId,
    requires: Vec<Key>,
    provides: Vec<Key>,
    start: Arc<dyn Start>,
}

impl Factory {
    /// Creates a factory with the given id, required keys, and recipe.
    pub fn new<I, K>(id: impl Into<FactoryId>, requires: I, start: Arc<dyn Start>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Self {
            id: id.into(),
            requires: requires.into_iter().map(Into::into).collect(),
            provides: Vec::new(),
            start,
        }
    }

    /// Declares the keys workers of this factory are expected to push.
    pub fn provides<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.provides = keys.into_iter().map(Into::into).collect();
        self
    }

    /// The factory id.
    pub fn id(&self) -> &FactoryId {
        &self.id
    }

    /// The ordered required keys (duplicates permitted).
    pub fn requires(&self) -> &[Key] {
        &self.requires
    }

    /// The declared provided keys.
    pub fn provided(&self) -> &[Key] {
        &self.provides
    }

    pub(crate) fn start(&self) -> &Arc<dyn Start> {
        &self.start
    }

    /// Registration-time validation.
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.id.as_str().is_empty() {
            return Err(EngineError::InvalidFactory {
                id: self.id.clone(),
                reason: "blank id".into(),
            });
        }
        if let Some(k) = self.requires.iter().find(|k| k.as_str().is_empty()) {
            return Err(EngineError::InvalidFactory {
                id: self.id.clone(),
                reason: format!("blank required key at position {}", {
                    self.requires.iter().position(|x| x == k).unwrap_or(0)
                }),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .field("provides", &self.provides)
            .finish()
    }
}
