// Module graph construction and export visibility

use crate::module::{Export, ModuleDef};
use crate::registry::ProviderRegistry;
use crate::{Error, Token};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One scanned module: its definition, provider registry, resolved import
/// order, and the token surface it exposes to importers.
pub(crate) struct ModuleNode {
    pub(crate) def: Arc<ModuleDef>,
    pub(crate) registry: ProviderRegistry,
    /// Imported module names in declaration order.
    pub(crate) import_names: Vec<String>,
    /// Modules this node re-exports, in declaration order.
    pub(crate) re_exports: Vec<String>,
    /// Exported surface: own exported tokens plus the surfaces of
    /// re-exported imports.
    pub(crate) exported: HashSet<Token>,
}

impl ModuleNode {
    pub(crate) fn name(&self) -> &str {
        self.def.name()
    }
}

/// Directed graph of modules, acyclic with respect to imports.
///
/// Built once by a depth-first scan from the root module; each module is
/// visited at most once even when imported from several places, so diamond
/// imports share a single node and a single registry.
pub struct ModuleGraph {
    pub(crate) nodes: HashMap<String, ModuleNode>,
    /// Registration order: imports before importers, declaration order
    /// among siblings.
    pub(crate) order: Vec<String>,
    /// Global modules in registration order.
    pub(crate) globals: Vec<String>,
    root: String,
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("order", &self.order)
            .field("globals", &self.globals)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ModuleGraph {
    pub(crate) fn scan(root: Arc<ModuleDef>) -> Result<Self, Error> {
        let mut graph = Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            globals: Vec::new(),
            root: root.name().to_string(),
        };
        let mut stack = Vec::new();
        graph.visit(root, &mut stack)?;
        tracing::debug!(modules = graph.order.len(), root = %graph.root, "module graph scanned");
        Ok(graph)
    }

    fn visit(&mut self, def: Arc<ModuleDef>, stack: &mut Vec<String>) -> Result<(), Error> {
        let name = def.name().to_string();

        if stack.contains(&name) {
            let mut path: Vec<String> = stack
                .iter()
                .skip_while(|n| **n != name)
                .cloned()
                .collect();
            path.push(name);
            return Err(Error::ModuleCycle { path });
        }
        if self.nodes.contains_key(&name) {
            // Already scanned through another importer; share the node.
            return Ok(());
        }

        tracing::debug!(module = %name, "scanning module");

        stack.push(name.clone());
        let mut import_names = Vec::with_capacity(def.imports().len());
        for import in def.imports() {
            let imported = import.resolve();
            import_names.push(imported.name().to_string());
            self.visit(imported, stack)?;
        }
        stack.pop();

        let mut registry = ProviderRegistry::new(&name);
        for provider in def.providers() {
            registry.register(provider.clone())?;
        }

        let mut exported = HashSet::new();
        let mut re_exports = Vec::new();
        for export in def.exports() {
            match export {
                Export::Provider(token) => {
                    if !registry.contains(&token) {
                        return Err(Error::InvalidExport {
                            module: name.clone(),
                            reason: format!("provider `{token}` is not declared locally"),
                        });
                    }
                    exported.insert(token);
                }
                Export::Module(import_name) => {
                    if !import_names.iter().any(|n| *n == import_name) {
                        return Err(Error::InvalidExport {
                            module: name.clone(),
                            reason: format!("module `{import_name}` is not imported"),
                        });
                    }
                    if let Some(node) = self.nodes.get(&import_name) {
                        exported.extend(node.exported.iter().cloned());
                    }
                    re_exports.push(import_name);
                }
            }
        }

        if def.is_global() {
            self.globals.push(name.clone());
        }
        self.order.push(name.clone());
        self.nodes.insert(
            name,
            ModuleNode {
                def,
                registry,
                import_names,
                re_exports,
                exported,
            },
        );
        Ok(())
    }

    pub(crate) fn node(&self, name: &str) -> Result<&ModuleNode, Error> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Find the module whose registry owns `token` as seen from `from`:
    /// own providers first, then imports' exported surfaces depth-first in
    /// declaration order, then global modules. First match wins.
    pub(crate) fn owner_of<'a>(
        &'a self,
        token: &Token,
        from: &'a ModuleNode,
    ) -> Option<&'a ModuleNode> {
        if from.registry.contains(token) {
            return Some(from);
        }
        for import_name in &from.import_names {
            if let Some(node) = self.nodes.get(import_name) {
                if node.exported.contains(token) {
                    if let Some(owner) = self.exported_owner(node, token) {
                        return Some(owner);
                    }
                }
            }
        }
        for global_name in &self.globals {
            if global_name == from.name() {
                continue;
            }
            if let Some(node) = self.nodes.get(global_name) {
                if node.exported.contains(token) {
                    if let Some(owner) = self.exported_owner(node, token) {
                        return Some(owner);
                    }
                }
            }
        }
        None
    }

    /// Within a module whose exported surface contains `token`, locate the
    /// declaring module, descending through re-exported imports in order.
    fn exported_owner<'a>(
        &'a self,
        node: &'a ModuleNode,
        token: &Token,
    ) -> Option<&'a ModuleNode> {
        if node.registry.contains(token) {
            return Some(node);
        }
        for re_export in &node.re_exports {
            if let Some(inner) = self.nodes.get(re_export) {
                if inner.exported.contains(token) {
                    if let Some(owner) = self.exported_owner(inner, token) {
                        return Some(owner);
                    }
                }
            }
        }
        None
    }

    /// Name of the root module.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Number of modules in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a module with `name` was scanned into the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Module names in registration order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderDef;

    struct Db;

    #[test]
    fn test_scan_registers_imports_first() {
        let core = ModuleDef::new("Core").provider(ProviderDef::value(Db));
        let app = ModuleDef::new("App").import(core);

        let graph = ModuleGraph::scan(Arc::new(app)).unwrap();
        assert_eq!(graph.module_names().collect::<Vec<_>>(), vec!["Core", "App"]);
        assert_eq!(graph.root(), "App");
    }

    #[test]
    fn test_diamond_imports_share_one_node() {
        let shared = Arc::new(
            ModuleDef::new("Shared")
                .provider(ProviderDef::value(Db))
                .export::<Db>(),
        );
        let left = ModuleDef::new("Left").import(shared.clone());
        let right = ModuleDef::new("Right").import(shared);
        let app = ModuleDef::new("App").import(left).import(right);

        let graph = ModuleGraph::scan(Arc::new(app)).unwrap();
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        fn module_one() -> Arc<ModuleDef> {
            Arc::new(ModuleDef::new("One").import_deferred(module_two))
        }
        fn module_two() -> Arc<ModuleDef> {
            Arc::new(ModuleDef::new("Two").import_deferred(module_one))
        }

        let err = ModuleGraph::scan(module_one()).unwrap_err();
        match err {
            Error::ModuleCycle { path } => {
                assert!(path.contains(&"One".to_string()));
                assert!(path.contains(&"Two".to_string()));
            }
            other => panic!("expected module cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_export_of_foreign_token_rejected() {
        let app = ModuleDef::new("App").export::<Db>();
        let err = ModuleGraph::scan(Arc::new(app)).unwrap_err();
        assert!(matches!(err, Error::InvalidExport { module, .. } if module == "App"));
    }

    #[test]
    fn test_re_export_of_unimported_module_rejected() {
        let app = ModuleDef::new("App").export_module("Ghost");
        let err = ModuleGraph::scan(Arc::new(app)).unwrap_err();
        assert!(matches!(err, Error::InvalidExport { .. }));
    }
}
