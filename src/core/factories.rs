//! # Factory registry.
//!
//! Vec-backed and insertion-ordered: when a push re-matches every factory
//! depending on a key, registration order decides which factory's tuples
//! spawn first, and that order must be reproducible.

use crate::error::EngineError;
use crate::factories::{Factory, FactoryId};
use crate::items::Key;

/// Insertion-ordered registry of factories, unique by id.
pub(crate) struct FactoryRegistry {
    factories: Vec<Factory>,
}

impl FactoryRegistry {
    pub(crate) fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Inserts a factory, rejecting duplicate ids.
    pub(crate) fn add(&mut self, factory: Factory) -> Result<(), EngineError> {
        if self.factories.iter().any(|f| f.id() == factory.id()) {
            return Err(EngineError::AlreadyAdded {
                id: factory.id().clone(),
            });
        }
        self.factories.push(factory);
        Ok(())
    }

    /// Removes a factory by id.
    pub(crate) fn remove(&mut self, id: &FactoryId) -> Result<Factory, EngineError> {
        match self.factories.iter().position(|f| f.id() == id) {
            Some(pos) => Ok(self.factories.remove(pos)),
            None => Err(EngineError::NotFound { id: id.clone() }),
        }
    }

    /// Looks up a factory by id.
    pub(crate) fn get(&self, id: &FactoryId) -> Option<&Factory> {
        self.factories.iter().find(|f| f.id() == id)
    }

    /// Factories whose `requires` contains the key, in registration order.
    pub(crate) fn depending_on(&self, key: &Key) -> Vec<Factory> {
        self.factories
            .iter()
            .filter(|f| f.requires().contains(key))
            .cloned()
            .collect()
    }

    /// Registered ids in registration order.
    pub(crate) fn ids(&self) -> Vec<FactoryId> {
        self.factories.iter().map(|f| f.id().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpawnError;
    use crate::factories::{Deps, StartFn};
    use crate::host::{Host, WorkerHandle};

    fn factory(id: &str, requires: &[&str]) -> Factory {
        Factory::new(
            id,
            requires.iter().copied(),
            StartFn::arc(|_host: Host, _deps: Deps| async move {
                Err::<WorkerHandle, SpawnError>(SpawnError::InitFailed {
                    reason: "unused".into(),
                })
            }),
        )
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut reg = FactoryRegistry::new();
        reg.add(factory("a", &["x"])).unwrap();
        let err = reg.add(factory("a", &["y"])).unwrap_err();
        assert_eq!(err.as_label(), "already_added");
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let mut reg = FactoryRegistry::new();
        let err = reg.remove(&FactoryId::from("ghost")).unwrap_err();
        assert_eq!(err.as_label(), "not_found");
    }

    #[test]
    fn add_remove_round_trips() {
        let mut reg = FactoryRegistry::new();
        reg.add(factory("a", &["x"])).unwrap();
        reg.remove(&FactoryId::from("a")).unwrap();
        assert!(reg.ids().is_empty());
        reg.add(factory("a", &["x"])).unwrap();
        assert_eq!(reg.ids(), vec![FactoryId::from("a")]);
    }

    #[test]
    fn depending_on_respects_registration_order() {
        let mut reg = FactoryRegistry::new();
        reg.add(factory("b", &["x", "y"])).unwrap();
        reg.add(factory("a", &["x"])).unwrap();
        reg.add(factory("c", &["z"])).unwrap();

        let deps: Vec<_> = reg
            .depending_on(&Key::from("x"))
            .into_iter()
            .map(|f| f.id().clone())
            .collect();
        assert_eq!(deps, vec![FactoryId::from("b"), FactoryId::from("a")]);
    }
}
