// Core kernel for the Chassis framework: module graph, dependency
// injection container, and the per-request execution pipeline

pub mod application;
pub mod container;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod guard;
pub mod handler;
pub mod interceptor;
pub mod metadata;
pub mod module;
pub mod pipe;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod token;

// Re-export commonly used types
pub use application::Application;
pub use container::ModuleContainer;
pub use context::{ExecutionContext, RequestContext};
pub use error::{Error, PipelineError, PipelineErrorKind};
pub use executor::PipelineExecutor;
pub use graph::ModuleGraph;
pub use guard::{Guard, GuardFn};
pub use handler::{handler_fn, FnHandler, Handler};
pub use interceptor::{Interceptor, Next, TimingInterceptor};
pub use metadata::{
    bind, BoundValue, ControllerDef, GuardRef, HttpMethod, InterceptorRef, ParamBinding,
    ParamSource, PipeRef, PipelineDescriptor, RouteDef, RouteMetadataIndex,
};
pub use module::{Export, ModuleDef, ModuleHook, ModuleImport};
pub use pipe::{DefaultValuePipe, ParseIntPipe, Pipe};
pub use provider::{
    Dependency, Instance, ProviderDef, ProviderFactory, ProviderKind, ResolvedDeps, Scope,
};
pub use registry::ProviderRegistry;
pub use resolver::DependencyResolver;
pub use token::Token;
