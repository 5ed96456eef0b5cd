// Provider declarations, lifetime scopes, and factories

use crate::{Error, Guard, Interceptor, Pipe, Token};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A constructed provider instance, type-erased for storage in a registry.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory invoked with the positionally resolved dependencies. Absent
/// optional dependencies arrive as `None`.
pub type ProviderFactory =
    Arc<dyn Fn(&[Option<Instance>]) -> Result<Instance, Error> + Send + Sync>;

/// Lifetime of a provider's instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// One instance per owning module's registry, living for the process.
    #[default]
    Singleton,
    /// A fresh instance on every resolution, owned by the resolving call
    /// site and never cached.
    Transient,
}

/// What shape of instance a provider constructs. Pipeline stages referenced
/// by token must resolve to a provider of the matching kind; this is
/// checked at scan time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Plain,
    Guard,
    Interceptor,
    Pipe,
}

/// A single constructor dependency.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub token: Token,
    pub optional: bool,
}

impl Dependency {
    pub fn required(token: Token) -> Self {
        Self {
            token,
            optional: false,
        }
    }

    pub fn optional(token: Token) -> Self {
        Self {
            token,
            optional: true,
        }
    }
}

/// Positionally resolved constructor arguments handed to a factory.
pub struct ResolvedDeps<'a> {
    args: &'a [Option<Instance>],
}

impl<'a> ResolvedDeps<'a> {
    pub(crate) fn new(args: &'a [Option<Instance>]) -> Self {
        Self { args }
    }

    /// Required dependency at position `index`, downcast to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, Error> {
        let instance = self
            .args
            .get(index)
            .and_then(|slot| slot.clone())
            .ok_or_else(|| Error::Construction {
                token: std::any::type_name::<T>().to_string(),
                message: format!("missing required dependency at position {index}"),
            })?;
        instance.downcast::<T>().map_err(|_| Error::Construction {
            token: std::any::type_name::<T>().to_string(),
            message: format!("dependency at position {index} has an unexpected type"),
        })
    }

    /// Optional dependency at position `index`; `None` when absent or of an
    /// unexpected type.
    pub fn opt<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.args
            .get(index)
            .and_then(|slot| slot.clone())
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Declaration of a constructible unit: identity, lifetime, ordered
/// dependencies, and the factory that builds it.
#[derive(Clone)]
pub struct ProviderDef {
    token: Token,
    kind: ProviderKind,
    scope: Scope,
    dependencies: Vec<Dependency>,
    factory: ProviderFactory,
}

impl ProviderDef {
    /// Provider backed by a pre-built value. Always a singleton.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let instance: Instance = Arc::new(value);
        Self {
            token: Token::of::<T>(),
            kind: ProviderKind::Plain,
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |_| Ok(instance.clone())),
        }
    }

    /// Provider constructed by a factory over its resolved dependencies.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(ResolvedDeps<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            token: Token::of::<T>(),
            kind: ProviderKind::Plain,
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |args| {
                let value = factory(ResolvedDeps::new(args))?;
                Ok(Arc::new(value) as Instance)
            }),
        }
    }

    /// Guard provider. The instance is stored as `Arc<dyn Guard>` so routes
    /// can reference it by token.
    pub fn guard<T, F>(factory: F) -> Self
    where
        T: Guard + 'static,
        F: Fn(ResolvedDeps<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            token: Token::of::<T>(),
            kind: ProviderKind::Guard,
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |args| {
                let guard: Arc<dyn Guard> = Arc::new(factory(ResolvedDeps::new(args))?);
                Ok(Arc::new(guard) as Instance)
            }),
        }
    }

    /// Interceptor provider, stored as `Arc<dyn Interceptor>`.
    pub fn interceptor<T, F>(factory: F) -> Self
    where
        T: Interceptor + 'static,
        F: Fn(ResolvedDeps<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            token: Token::of::<T>(),
            kind: ProviderKind::Interceptor,
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |args| {
                let interceptor: Arc<dyn Interceptor> =
                    Arc::new(factory(ResolvedDeps::new(args))?);
                Ok(Arc::new(interceptor) as Instance)
            }),
        }
    }

    /// Pipe provider, stored as `Arc<dyn Pipe>`.
    pub fn pipe<T, F>(factory: F) -> Self
    where
        T: Pipe + 'static,
        F: Fn(ResolvedDeps<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            token: Token::of::<T>(),
            kind: ProviderKind::Pipe,
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |args| {
                let pipe: Arc<dyn Pipe> = Arc::new(factory(ResolvedDeps::new(args))?);
                Ok(Arc::new(pipe) as Instance)
            }),
        }
    }

    /// Register under an explicit token instead of the type token.
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Declare a required constructor dependency. Order matters: positions
    /// match the factory's argument slice.
    pub fn depends_on(mut self, token: Token) -> Self {
        self.dependencies.push(Dependency::required(token));
        self
    }

    /// Declare an optional constructor dependency; unresolvable tokens
    /// yield `None` instead of failing.
    pub fn depends_on_optional(mut self, token: Token) -> Self {
        self.dependencies.push(Dependency::optional(token));
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub(crate) fn construct(&self, args: &[Option<Instance>]) -> Result<Instance, Error> {
        (self.factory)(args)
    }
}

impl fmt::Debug for ProviderDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDef")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Recover a guard stored by [`ProviderDef::guard`] from its erased payload.
pub(crate) fn as_guard(instance: &Instance) -> Option<Arc<dyn Guard>> {
    instance.downcast_ref::<Arc<dyn Guard>>().cloned()
}

pub(crate) fn as_interceptor(instance: &Instance) -> Option<Arc<dyn Interceptor>> {
    instance.downcast_ref::<Arc<dyn Interceptor>>().cloned()
}

pub(crate) fn as_pipe(instance: &Instance) -> Option<Arc<dyn Pipe>> {
    instance.downcast_ref::<Arc<dyn Pipe>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config {
        url: String,
    }

    struct Pool {
        url: String,
    }

    #[test]
    fn test_value_provider_constructs() {
        let def = ProviderDef::value(Config {
            url: "postgres://localhost".into(),
        });
        assert_eq!(def.kind(), ProviderKind::Plain);
        assert_eq!(def.scope(), Scope::Singleton);

        let instance = def.construct(&[]).unwrap();
        let config = instance.downcast::<Config>().unwrap();
        assert_eq!(config.url, "postgres://localhost");
    }

    #[test]
    fn test_factory_receives_positional_deps() {
        let def = ProviderDef::factory(|deps: ResolvedDeps<'_>| {
            let config = deps.get::<Config>(0)?;
            Ok(Pool {
                url: config.url.clone(),
            })
        })
        .depends_on(Token::of::<Config>());

        assert_eq!(def.dependencies().len(), 1);

        let config: Instance = Arc::new(Config { url: "db".into() });
        let instance = def.construct(&[Some(config)]).unwrap();
        assert_eq!(instance.downcast::<Pool>().unwrap().url, "db");
    }

    #[test]
    fn test_missing_required_dep_is_construction_error() {
        let def = ProviderDef::factory(|deps: ResolvedDeps<'_>| {
            let config = deps.get::<Config>(0)?;
            Ok(Pool {
                url: config.url.clone(),
            })
        });
        let err = def.construct(&[None]).unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));
    }

    #[test]
    fn test_optional_dep_absent() {
        let def = ProviderDef::factory(|deps: ResolvedDeps<'_>| {
            let url = deps
                .opt::<Config>(0)
                .map(|c| c.url.clone())
                .unwrap_or_else(|| "memory".into());
            Ok(Pool { url })
        })
        .depends_on_optional(Token::of::<Config>());

        let instance = def.construct(&[None]).unwrap();
        assert_eq!(instance.downcast::<Pool>().unwrap().url, "memory");
    }

    #[test]
    fn test_explicit_token_and_scope() {
        let def = ProviderDef::value(42u32)
            .with_token(Token::named("ANSWER"))
            .in_scope(Scope::Transient);
        assert_eq!(def.token(), &Token::named("ANSWER"));
        assert_eq!(def.scope(), Scope::Transient);
    }
}
