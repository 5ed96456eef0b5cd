// Per-module provider storage and the singleton instance cache

use crate::{Error, Instance, ProviderDef, Scope, Token};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Write-once cell holding one singleton instance.
///
/// The mutex doubles as the construction guard: the first resolver to take
/// it runs the factory; concurrent resolvers of the same token block until
/// the instance is published and then observe the same one. Unrelated
/// tokens have unrelated cells, so no global lock serializes them. Nested
/// cell locks follow provider dependency edges, which are validated acyclic
/// at scan, so they cannot deadlock.
struct SingletonCell {
    slot: Mutex<Option<Instance>>,
}

/// Provider declarations and singleton instances owned by a single module.
///
/// The declaration table is populated during the single-threaded scan and
/// read-only afterwards; the cells are the only state written at request
/// time, once per token.
pub struct ProviderRegistry {
    module: String,
    defs: HashMap<Token, ProviderDef>,
    cells: HashMap<Token, SingletonCell>,
}

impl ProviderRegistry {
    pub(crate) fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            defs: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    /// Name of the owning module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Whether `token` is declared in this registry.
    pub fn contains(&self, token: &Token) -> bool {
        self.defs.contains_key(token)
    }

    pub(crate) fn register(&mut self, def: ProviderDef) -> Result<(), Error> {
        let token = def.token().clone();
        if self.defs.contains_key(&token) {
            return Err(Error::DuplicateProvider {
                token: token.name().to_string(),
                module: self.module.clone(),
            });
        }
        if def.scope() == Scope::Singleton {
            self.cells.insert(
                token.clone(),
                SingletonCell {
                    slot: Mutex::new(None),
                },
            );
        }
        tracing::trace!(module = %self.module, provider = %token, scope = ?def.scope(), "provider registered");
        self.defs.insert(token, def);
        Ok(())
    }

    pub(crate) fn def(&self, token: &Token) -> Option<&ProviderDef> {
        self.defs.get(token)
    }

    pub(crate) fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.defs.keys()
    }

    /// Return the cached singleton for `token`, constructing it via `init`
    /// on first access. Exactly one concurrent caller runs `init`; the rest
    /// block on the token's cell and observe its instance.
    pub(crate) fn get_or_init(
        &self,
        token: &Token,
        init: impl FnOnce() -> Result<Instance, Error>,
    ) -> Result<Instance, Error> {
        let cell = self.cells.get(token).ok_or_else(|| Error::UnknownProvider {
            token: token.name().to_string(),
            module: self.module.clone(),
        })?;

        let mut slot = cell.slot.lock();
        if let Some(instance) = slot.as_ref() {
            return Ok(instance.clone());
        }
        let instance = init()?;
        *slot = Some(instance.clone());
        tracing::debug!(module = %self.module, provider = %token, "singleton constructed");
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Service;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ProviderRegistry::new("Test");
        registry.register(ProviderDef::value(Service)).unwrap();
        let err = registry.register(ProviderDef::value(Service)).unwrap_err();
        assert!(matches!(err, Error::DuplicateProvider { module, .. } if module == "Test"));
    }

    #[test]
    fn test_get_or_init_runs_once() {
        let mut registry = ProviderRegistry::new("Test");
        registry.register(ProviderDef::value(Service)).unwrap();

        let calls = AtomicUsize::new(0);
        let token = Token::of::<Service>();
        let first = registry
            .get_or_init(&token, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Service) as Instance)
            })
            .unwrap();
        let second = registry
            .get_or_init(&token, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Service) as Instance)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_init_leaves_cell_empty() {
        let mut registry = ProviderRegistry::new("Test");
        registry.register(ProviderDef::value(Service)).unwrap();

        let token = Token::of::<Service>();
        let err = registry.get_or_init(&token, || {
            Err(Error::Construction {
                token: "Service".into(),
                message: "boom".into(),
            })
        });
        assert!(err.is_err());

        // A later resolution may still succeed.
        let ok = registry.get_or_init(&token, || Ok(Arc::new(Service) as Instance));
        assert!(ok.is_ok());
    }
}
