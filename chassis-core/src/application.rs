// Application bootstrap facade

use crate::metadata::RouteMetadataIndex;
use crate::{
    Error, ExecutionContext, ModuleContainer, ModuleDef, PipelineError, PipelineExecutor,
    RequestContext,
};
use serde_json::Value;
use std::sync::Arc;

/// A fully wired application instance: container plus pipeline executor.
///
/// Everything is explicit - no ambient globals - so any number of isolated
/// applications can coexist in one process, which is how the test suite
/// uses them.
pub struct Application {
    container: Arc<ModuleContainer>,
    executor: PipelineExecutor,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Bootstrap from the root module. Any construction-time error aborts
    /// here, before the application can accept work.
    pub fn create(root: impl Into<Arc<ModuleDef>>) -> Result<Self, Error> {
        let container = Arc::new(ModuleContainer::scan(root)?);
        let executor = PipelineExecutor::new(container.clone());
        tracing::info!(
            modules = container.module_count(),
            routes = container.route_index().len(),
            "application bootstrap complete"
        );
        Ok(Self {
            container,
            executor,
        })
    }

    pub fn container(&self) -> &Arc<ModuleContainer> {
        &self.container
    }

    pub fn route_index(&self) -> &RouteMetadataIndex {
        self.container.route_index()
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    /// Execute the named handler's pipeline against `request`. External
    /// routers resolve the handler themselves and call the executor
    /// directly; this is the short path for tests and embedders.
    pub async fn dispatch(
        &self,
        controller: &str,
        handler: &str,
        request: RequestContext,
    ) -> Result<Value, PipelineError> {
        let descriptor = self
            .container
            .route_index()
            .get(controller, handler)
            .ok_or_else(|| {
                PipelineError::handler_threw(handler, "no such route handler").with_status_hint(404)
            })?;
        self.executor
            .execute(descriptor, ExecutionContext::new(request))
            .await
    }

    /// Run module `on_destroy` hooks, importers before imports.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.container.shutdown()
    }
}
