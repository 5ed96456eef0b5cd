// Cross-module dependency injection container

use crate::graph::{ModuleGraph, ModuleNode};
use crate::metadata::{
    ControllerDef, GuardRef, InterceptorRef, PipeRef, RouteMetadataIndex,
};
use crate::resolver::DependencyResolver;
use crate::{Error, Instance, ModuleDef, ProviderDef, ProviderKind, Token};
use std::collections::HashSet;
use std::sync::Arc;

/// The wired application: module graph, one provider registry per module,
/// and the route metadata index.
///
/// Built once by [`ModuleContainer::scan`] on a single thread, then shared
/// read-mostly across requests. Provider metadata, visibility sets, and
/// pipeline descriptors are never mutated after scan; the only post-scan
/// writes are the write-once singleton cells inside each registry, so
/// callers need no external synchronization.
pub struct ModuleContainer {
    graph: ModuleGraph,
    index: RouteMetadataIndex,
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("modules", &self.graph.order)
            .finish_non_exhaustive()
    }
}

impl ModuleContainer {
    /// Scan the module tree rooted at `root`, build every module's registry
    /// and export surface, index all routes, and validate the provider
    /// graph. Every error here is fatal: no partially wired application is
    /// allowed to serve traffic.
    pub fn scan(root: impl Into<Arc<ModuleDef>>) -> Result<Self, Error> {
        let graph = ModuleGraph::scan(root.into())?;

        let index = {
            let pairs = graph.order.iter().filter_map(|name| graph.nodes.get(name)).flat_map(
                |node| {
                    node.def
                        .controllers()
                        .iter()
                        .map(move |controller| (node.name(), controller))
                },
            );
            RouteMetadataIndex::build(pairs)?
        };

        let container = Self { graph, index };
        container.validate()?;
        container.run_init_hooks()?;

        tracing::debug!(
            modules = container.graph.len(),
            routes = container.index.len(),
            "container scan complete"
        );
        Ok(container)
    }

    /// Resolve the provider registered for type `T`, as visible from module
    /// `from`.
    pub fn resolve<T: Send + Sync + 'static>(&self, from: &str) -> Result<Arc<T>, Error> {
        let token = Token::of::<T>();
        let instance = self.resolve_token(&token, from)?;
        instance.downcast::<T>().map_err(|_| Error::Construction {
            token: token.name().to_string(),
            message: "resolved instance has a different type".to_string(),
        })
    }

    /// Resolve `token` as visible from module `from`.
    ///
    /// Lookup order is deterministic: the module's own providers win, then
    /// its imports' exported surfaces are searched depth-first in import
    /// declaration order (first match wins, including when two imports
    /// export the same token), then global modules. The instance is
    /// constructed and cached in its declaring module's registry, so a
    /// singleton reached through different import paths is one object.
    pub fn resolve_token(&self, token: &Token, from: &str) -> Result<Instance, Error> {
        DependencyResolver::new(self).resolve(token, from)
    }

    /// Whether `token` is visible from module `from`.
    pub fn has(&self, token: &Token, from: &str) -> bool {
        self.graph
            .node(from)
            .ok()
            .and_then(|node| self.graph.owner_of(token, node))
            .is_some()
    }

    /// All controllers across the graph: module registration order,
    /// declaration order within a module.
    pub fn controllers(&self) -> Vec<(&str, &ControllerDef)> {
        self.graph
            .order
            .iter()
            .filter_map(|name| self.graph.nodes.get(name))
            .flat_map(|node| {
                node.def
                    .controllers()
                    .iter()
                    .map(move |controller| (node.name(), controller))
            })
            .collect()
    }

    /// The per-handler pipeline descriptors built at scan.
    pub fn route_index(&self) -> &RouteMetadataIndex {
        &self.index
    }

    /// Number of modules in the graph.
    pub fn module_count(&self) -> usize {
        self.graph.len()
    }

    /// The underlying module graph.
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Run `on_destroy` hooks, importers before imports.
    pub fn shutdown(&self) -> Result<(), Error> {
        for name in self.graph.order.iter().rev() {
            if let Some(node) = self.graph.nodes.get(name) {
                if let Some(hook) = node.def.destroy_hook() {
                    hook(self)?;
                    tracing::debug!(module = %name, "module destroyed");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn lookup(
        &self,
        token: &Token,
        from: &str,
    ) -> Result<(&ModuleNode, &ProviderDef), Error> {
        let node = self.graph.node(from)?;
        let owner = self
            .graph
            .owner_of(token, node)
            .ok_or_else(|| Error::UnknownProvider {
                token: token.name().to_string(),
                module: from.to_string(),
            })?;
        let def = owner
            .registry
            .def(token)
            .ok_or_else(|| Error::UnknownProvider {
                token: token.name().to_string(),
                module: owner.name().to_string(),
            })?;
        Ok((owner, def))
    }

    /// Validate the whole container: every provider's dependency closure
    /// resolves (or is optional) without cycles, and every token-referenced
    /// pipeline stage names a provider of the matching kind.
    fn validate(&self) -> Result<(), Error> {
        let mut done = HashSet::new();
        for name in &self.graph.order {
            let node = self.graph.node(name)?;
            for token in node.registry.tokens() {
                if let Some(def) = node.registry.def(token) {
                    let mut stack = Vec::new();
                    self.check_provider(node, def, &mut stack, &mut done)?;
                }
            }
        }

        for descriptor in self.index.entries() {
            for guard in &descriptor.guards {
                if let GuardRef::Token(token) = guard {
                    self.check_stage_token(token, &descriptor.module, ProviderKind::Guard)?;
                }
            }
            for interceptor in &descriptor.interceptors {
                if let InterceptorRef::Token(token) = interceptor {
                    self.check_stage_token(token, &descriptor.module, ProviderKind::Interceptor)?;
                }
            }
            let binding_pipes = descriptor.params.iter().flat_map(|p| p.pipes.iter());
            for pipe in descriptor.pipes.iter().chain(binding_pipes) {
                if let PipeRef::Token(token) = pipe {
                    self.check_stage_token(token, &descriptor.module, ProviderKind::Pipe)?;
                }
            }
        }
        Ok(())
    }

    fn check_provider(
        &self,
        owner: &ModuleNode,
        def: &ProviderDef,
        stack: &mut Vec<(String, Token)>,
        done: &mut HashSet<(String, Token)>,
    ) -> Result<(), Error> {
        let key = (owner.name().to_string(), def.token().clone());
        if done.contains(&key) {
            return Ok(());
        }
        if stack.contains(&key) {
            let mut path: Vec<String> = stack
                .iter()
                .skip_while(|frame| **frame != key)
                .map(|(_, token)| token.name().to_string())
                .collect();
            path.push(def.token().name().to_string());
            return Err(Error::CircularDependency { path });
        }

        stack.push(key.clone());
        for dep in def.dependencies() {
            match self.lookup(&dep.token, owner.name()) {
                Ok((dep_owner, dep_def)) => {
                    self.check_provider(dep_owner, dep_def, stack, done)?;
                }
                Err(Error::UnknownProvider { .. }) if dep.optional => {}
                Err(err) => return Err(err),
            }
        }
        stack.pop();
        done.insert(key);
        Ok(())
    }

    fn check_stage_token(
        &self,
        token: &Token,
        module: &str,
        expected: ProviderKind,
    ) -> Result<(), Error> {
        let (_, def) = self.lookup(token, module)?;
        if def.kind() != expected {
            return Err(Error::Construction {
                token: token.name().to_string(),
                message: format!(
                    "provider is registered as {:?} but the route references it as {:?}",
                    def.kind(),
                    expected
                ),
            });
        }
        Ok(())
    }

    fn run_init_hooks(&self) -> Result<(), Error> {
        for name in &self.graph.order {
            if let Some(node) = self.graph.nodes.get(name) {
                if let Some(hook) = node.def.init_hook() {
                    hook(self)?;
                    tracing::debug!(module = %name, "module initialized");
                }
            }
        }
        Ok(())
    }
}
