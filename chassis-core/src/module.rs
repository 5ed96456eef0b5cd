// Module declarations and composition
//
// Modules group providers and controllers and compose through imports and
// exports. A provider is visible to another module only when its declaring
// module exports it and every module along the import chain re-exports it;
// nothing leaks through an importer by accident.

use crate::metadata::ControllerDef;
use crate::{Error, ModuleContainer, ProviderDef, Token};
use std::fmt;
use std::sync::Arc;

/// Hook run when the container finishes wiring a module, or tears it down.
pub type ModuleHook = Arc<dyn Fn(&ModuleContainer) -> Result<(), Error> + Send + Sync>;

/// What a module exposes to its importers.
#[derive(Clone, Debug)]
pub enum Export {
    /// A locally declared provider token.
    Provider(Token),
    /// Re-export of an imported module: its whole exported surface
    /// propagates to this module's importers.
    Module(String),
}

/// An import edge. The deferred form exists so mutually importing module
/// trees can be written down at all - the scanner still rejects the cycle.
#[derive(Clone)]
pub enum ModuleImport {
    Module(Arc<ModuleDef>),
    Deferred(Arc<dyn Fn() -> Arc<ModuleDef> + Send + Sync>),
}

impl ModuleImport {
    pub(crate) fn resolve(&self) -> Arc<ModuleDef> {
        match self {
            ModuleImport::Module(module) => module.clone(),
            ModuleImport::Deferred(thunk) => thunk(),
        }
    }
}

/// A named grouping of providers and controllers with import/export
/// visibility rules.
///
/// Build with the fluent methods and share between importers via `Arc`;
/// diamond imports of the same module resolve to a single node with a
/// single registry.
#[derive(Clone)]
pub struct ModuleDef {
    name: String,
    providers: Vec<ProviderDef>,
    controllers: Vec<ControllerDef>,
    imports: Vec<ModuleImport>,
    exports: Vec<Export>,
    export_all: bool,
    global: bool,
    on_init: Option<ModuleHook>,
    on_destroy: Option<ModuleHook>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
            controllers: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            export_all: false,
            global: false,
            on_init: None,
            on_destroy: None,
        }
    }

    /// Declare a local provider.
    pub fn provider(mut self, def: ProviderDef) -> Self {
        self.providers.push(def);
        self
    }

    /// Declare a controller whose routes this module contributes.
    pub fn controller(mut self, def: ControllerDef) -> Self {
        self.controllers.push(def);
        self
    }

    /// Import another module. Order matters: resolution searches imports
    /// depth-first in declaration order.
    pub fn import(mut self, module: impl Into<Arc<ModuleDef>>) -> Self {
        self.imports.push(ModuleImport::Module(module.into()));
        self
    }

    /// Import a module produced lazily. Needed to even express mutual
    /// imports, which the scanner then rejects as a module cycle.
    pub fn import_deferred(
        mut self,
        thunk: impl Fn() -> Arc<ModuleDef> + Send + Sync + 'static,
    ) -> Self {
        self.imports.push(ModuleImport::Deferred(Arc::new(thunk)));
        self
    }

    /// Export the locally declared provider registered for type `T`.
    pub fn export<T: 'static>(self) -> Self {
        let token = Token::of::<T>();
        self.export_token(token)
    }

    /// Export a locally declared provider by token.
    pub fn export_token(mut self, token: Token) -> Self {
        self.exports.push(Export::Provider(token));
        self
    }

    /// Re-export an imported module by name, forwarding its exports.
    pub fn export_module(mut self, name: impl Into<String>) -> Self {
        self.exports.push(Export::Module(name.into()));
        self
    }

    /// Export every locally declared provider.
    pub fn export_all(mut self) -> Self {
        self.export_all = true;
        self
    }

    /// Make this module's exports visible everywhere without imports. Use
    /// sparingly, for truly cross-cutting concerns.
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Run after the whole graph is wired, imports before importers.
    pub fn on_init(
        mut self,
        hook: impl Fn(&ModuleContainer) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_init = Some(Arc::new(hook));
        self
    }

    /// Run at container shutdown, importers before imports.
    pub fn on_destroy(
        mut self,
        hook: impl Fn(&ModuleContainer) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_destroy = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn providers(&self) -> &[ProviderDef] {
        &self.providers
    }

    pub fn controllers(&self) -> &[ControllerDef] {
        &self.controllers
    }

    pub fn imports(&self) -> &[ModuleImport] {
        &self.imports
    }

    /// The declared export list, with `export_all` expanded to every local
    /// provider token.
    pub fn exports(&self) -> Vec<Export> {
        if self.export_all {
            self.providers
                .iter()
                .map(|p| Export::Provider(p.token().clone()))
                .chain(self.exports.iter().filter_map(|e| match e {
                    Export::Module(_) => Some(e.clone()),
                    Export::Provider(_) => None,
                }))
                .collect()
        } else {
            self.exports.clone()
        }
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub(crate) fn init_hook(&self) -> Option<&ModuleHook> {
        self.on_init.as_ref()
    }

    pub(crate) fn destroy_hook(&self) -> Option<&ModuleHook> {
        self.on_destroy.as_ref()
    }
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("name", &self.name)
            .field("providers", &self.providers.len())
            .field("controllers", &self.controllers.len())
            .field("imports", &self.imports.len())
            .field("global", &self.global)
            .finish()
    }
}
