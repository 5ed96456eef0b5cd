// Recursive constructor-dependency resolution

use crate::container::ModuleContainer;
use crate::graph::ModuleNode;
use crate::{Error, Instance, ProviderDef, Scope, Token};

/// Tokens currently under construction by one resolution call, qualified by
/// their owning module so equally named tokens in different registries do
/// not collide.
pub(crate) struct ResolutionStack {
    frames: Vec<(String, Token)>,
}

impl ResolutionStack {
    pub(crate) fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Push a frame, failing with the full cycle path when the same
    /// provider is already being constructed.
    pub(crate) fn enter(&mut self, module: &str, token: &Token) -> Result<(), Error> {
        if self
            .frames
            .iter()
            .any(|(m, t)| m == module && t == token)
        {
            let mut path: Vec<String> = self
                .frames
                .iter()
                .skip_while(|(m, t)| !(m == module && t == token))
                .map(|(_, t)| t.name().to_string())
                .collect();
            path.push(token.name().to_string());
            return Err(Error::CircularDependency { path });
        }
        self.frames.push((module.to_string(), token.clone()));
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.frames.pop();
    }
}

/// One resolution call against a container.
///
/// Each public `resolve` on the container creates a fresh resolver, so the
/// resolution stack is strictly per-call. Scope decisions stay with the
/// owning module's registry: the resolver asks it to cache singletons and
/// constructs transients inline.
pub struct DependencyResolver<'c> {
    container: &'c ModuleContainer,
    stack: ResolutionStack,
}

impl<'c> DependencyResolver<'c> {
    pub fn new(container: &'c ModuleContainer) -> Self {
        Self {
            container,
            stack: ResolutionStack::new(),
        }
    }

    /// Resolve `token` as visible from module `from`.
    pub fn resolve(&mut self, token: &Token, from: &str) -> Result<Instance, Error> {
        let container = self.container;
        let (owner, def) = container.lookup(token, from)?;
        self.resolve_def(owner, def)
    }

    fn resolve_def(
        &mut self,
        owner: &'c ModuleNode,
        def: &'c ProviderDef,
    ) -> Result<Instance, Error> {
        match def.scope() {
            Scope::Singleton => {
                owner
                    .registry
                    .get_or_init(def.token(), || self.construct(owner, def))
            }
            Scope::Transient => self.construct(owner, def),
        }
    }

    fn construct(
        &mut self,
        owner: &'c ModuleNode,
        def: &'c ProviderDef,
    ) -> Result<Instance, Error> {
        self.stack.enter(owner.name(), def.token())?;
        let result = self
            .construct_args(owner, def)
            .and_then(|args| def.construct(&args));
        self.stack.leave();

        if let Err(err) = &result {
            tracing::debug!(
                module = %owner.name(),
                provider = %def.token(),
                error = %err,
                "provider construction failed"
            );
        }
        result
    }

    fn construct_args(
        &mut self,
        owner: &'c ModuleNode,
        def: &'c ProviderDef,
    ) -> Result<Vec<Option<Instance>>, Error> {
        let container = self.container;
        let mut args = Vec::with_capacity(def.dependencies().len());
        for dep in def.dependencies() {
            // Dependencies resolve in the declaring module's own context.
            match container.lookup(&dep.token, owner.name()) {
                Ok((dep_owner, dep_def)) => {
                    args.push(Some(self.resolve_def(dep_owner, dep_def)?));
                }
                Err(Error::UnknownProvider { .. }) if dep.optional => args.push(None),
                Err(err) => return Err(err),
            }
        }
        Ok(args)
    }
}
