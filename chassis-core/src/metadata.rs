// Route metadata: parameter bindings, stage references, and the
// per-handler descriptor index consumed by the pipeline executor

use crate::{Error, Guard, Handler, Interceptor, Pipe, RequestContext, Token};
use serde_json::Value;
use smallvec::SmallVec;
use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// HTTP verbs as declared by the metadata producer. The kernel never parses
/// wire methods; routers map onto this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

/// Where a bound parameter value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Body,
}

/// One declared handler parameter.
#[derive(Clone)]
pub struct ParamBinding {
    pub name: String,
    pub source: ParamSource,
    pub required: bool,
    /// Pipes applied to this binding only, after route-level pipes.
    pub pipes: Vec<PipeRef>,
}

impl ParamBinding {
    fn new(name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            source,
            required: true,
            pipes: Vec::new(),
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Path)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Header)
    }

    pub fn body() -> Self {
        Self::new("body", ParamSource::Body)
    }

    /// Missing values bind as [`BoundValue::Missing`] instead of rejecting.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attach a pipe to this binding only.
    pub fn pipe(mut self, pipe: PipeRef) -> Self {
        self.pipes.push(pipe);
        self
    }
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("required", &self.required)
            .finish()
    }
}

/// Result of extracting one parameter from the request, before pipes run.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundValue {
    Present(Value),
    Missing,
}

impl BoundValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, BoundValue::Missing)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            BoundValue::Present(value) => Some(value),
            BoundValue::Missing => None,
        }
    }
}

/// Extract a binding's raw value from the request.
///
/// Path, query, and header values bind as strings; the body binds as parsed
/// JSON. An empty or unparseable body binds as [`BoundValue::Missing`].
pub fn bind(request: &RequestContext, binding: &ParamBinding) -> BoundValue {
    let value = match binding.source {
        ParamSource::Path => request.param(&binding.name).map(|v| Value::String(v.clone())),
        ParamSource::Query => request.query(&binding.name).map(|v| Value::String(v.clone())),
        ParamSource::Header => request.header(&binding.name).map(|v| Value::String(v.clone())),
        ParamSource::Body => {
            if request.body.is_empty() {
                None
            } else {
                serde_json::from_slice(&request.body).ok()
            }
        }
    };
    value.map_or(BoundValue::Missing, BoundValue::Present)
}

/// Guard reference on a route: a provider token resolved through the
/// declaring module, or an inline instance.
#[derive(Clone)]
pub enum GuardRef {
    Token(Token),
    Instance {
        name: String,
        guard: Arc<dyn Guard>,
    },
}

impl GuardRef {
    /// Reference the guard provider registered for type `T`.
    pub fn of<T: Guard + 'static>() -> Self {
        GuardRef::Token(Token::of::<T>())
    }

    pub fn token(token: Token) -> Self {
        GuardRef::Token(token)
    }

    pub fn inline<G: Guard + 'static>(guard: G) -> Self {
        GuardRef::Instance {
            name: type_name::<G>().to_string(),
            guard: Arc::new(guard),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GuardRef::Token(token) => token.name(),
            GuardRef::Instance { name, .. } => name,
        }
    }
}

/// Interceptor reference on a route.
#[derive(Clone)]
pub enum InterceptorRef {
    Token(Token),
    Instance {
        name: String,
        interceptor: Arc<dyn Interceptor>,
    },
}

impl InterceptorRef {
    pub fn of<T: Interceptor + 'static>() -> Self {
        InterceptorRef::Token(Token::of::<T>())
    }

    pub fn token(token: Token) -> Self {
        InterceptorRef::Token(token)
    }

    pub fn inline<I: Interceptor + 'static>(interceptor: I) -> Self {
        InterceptorRef::Instance {
            name: type_name::<I>().to_string(),
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            InterceptorRef::Token(token) => token.name(),
            InterceptorRef::Instance { name, .. } => name,
        }
    }
}

/// Pipe reference on a route or binding.
#[derive(Clone)]
pub enum PipeRef {
    Token(Token),
    Instance {
        name: String,
        pipe: Arc<dyn Pipe>,
    },
}

impl PipeRef {
    pub fn of<T: Pipe + 'static>() -> Self {
        PipeRef::Token(Token::of::<T>())
    }

    pub fn token(token: Token) -> Self {
        PipeRef::Token(token)
    }

    pub fn inline<P: Pipe + 'static>(pipe: P) -> Self {
        PipeRef::Instance {
            name: type_name::<P>().to_string(),
            pipe: Arc::new(pipe),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PipeRef::Token(token) => token.name(),
            PipeRef::Instance { name, .. } => name,
        }
    }
}

/// One route on a controller: method-level metadata plus the handler.
#[derive(Clone)]
pub struct RouteDef {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    /// `None` inherits class guards unchanged. `Some([])` suppresses class
    /// guards for this one route - the documented public-route exception,
    /// which exists for guards only. `Some([g, ..])` appends after class
    /// guards; method-level guards never replace class-level ones.
    pub guards: Option<Vec<GuardRef>>,
    pub interceptors: Vec<InterceptorRef>,
    pub pipes: Vec<PipeRef>,
    pub params: Vec<ParamBinding>,
    pub handler: Arc<dyn Handler>,
}

impl RouteDef {
    pub fn new(
        name: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            guards: None,
            interceptors: Vec::new(),
            pipes: Vec::new(),
            params: Vec::new(),
            handler,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self::new(name, HttpMethod::Get, path, handler)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self::new(name, HttpMethod::Post, path, handler)
    }

    pub fn put(name: impl Into<String>, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self::new(name, HttpMethod::Put, path, handler)
    }

    pub fn delete(name: impl Into<String>, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self::new(name, HttpMethod::Delete, path, handler)
    }

    /// Append a method-level guard after the class guards.
    pub fn guard(mut self, guard: GuardRef) -> Self {
        self.guards.get_or_insert_with(Vec::new).push(guard);
        self
    }

    /// Mark the route public: class guards are suppressed and no guard runs.
    /// Clears any method-level guards declared so far.
    pub fn public(mut self) -> Self {
        self.guards = Some(Vec::new());
        self
    }

    pub fn interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn pipe(mut self, pipe: PipeRef) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn param(mut self, binding: ParamBinding) -> Self {
        self.params.push(binding);
        self
    }
}

/// A route-handler-bearing class: base path plus class-level stages shared
/// by every route it declares.
#[derive(Clone)]
pub struct ControllerDef {
    pub name: String,
    pub base_path: String,
    pub guards: Vec<GuardRef>,
    pub interceptors: Vec<InterceptorRef>,
    pub pipes: Vec<PipeRef>,
    pub routes: Vec<RouteDef>,
}

impl ControllerDef {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            guards: Vec::new(),
            interceptors: Vec::new(),
            pipes: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn guard(mut self, guard: GuardRef) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn pipe(mut self, pipe: PipeRef) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn route(mut self, route: RouteDef) -> Self {
        self.routes.push(route);
        self
    }
}

/// Fully merged, immutable execution plan for one handler.
///
/// Computed once during module scan and shared read-only across all
/// concurrent requests that match the route.
pub struct PipelineDescriptor {
    /// Module that declared the controller; stage tokens resolve here.
    pub module: String,
    pub controller: String,
    pub handler_name: String,
    pub method: HttpMethod,
    pub path: String,
    pub guards: SmallVec<[GuardRef; 4]>,
    pub interceptors: SmallVec<[InterceptorRef; 4]>,
    pub pipes: SmallVec<[PipeRef; 4]>,
    pub params: Vec<ParamBinding>,
    pub handler: Arc<dyn Handler>,
}

impl PipelineDescriptor {
    fn merge(module: &str, controller: &ControllerDef, route: &RouteDef) -> Self {
        let guards: SmallVec<[GuardRef; 4]> = match &route.guards {
            None => controller.guards.iter().cloned().collect(),
            Some(route_guards) if route_guards.is_empty() => SmallVec::new(),
            Some(route_guards) => controller
                .guards
                .iter()
                .chain(route_guards.iter())
                .cloned()
                .collect(),
        };

        Self {
            module: module.to_string(),
            controller: controller.name.clone(),
            handler_name: route.name.clone(),
            method: route.method,
            path: join_paths(&controller.base_path, &route.path),
            guards,
            interceptors: controller
                .interceptors
                .iter()
                .chain(route.interceptors.iter())
                .cloned()
                .collect(),
            pipes: controller
                .pipes
                .iter()
                .chain(route.pipes.iter())
                .cloned()
                .collect(),
            params: route.params.clone(),
            handler: route.handler.clone(),
        }
    }
}

impl fmt::Debug for PipelineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineDescriptor")
            .field("module", &self.module)
            .field("controller", &self.controller)
            .field("handler", &self.handler_name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("guards", &self.guards.len())
            .field("interceptors", &self.interceptors.len())
            .field("pipes", &self.pipes.len())
            .field("params", &self.params)
            .finish()
    }
}

/// Join a controller base path and a route path into one normalized path.
fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_matches('/');
    let path = path.trim_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{base}"),
        (false, false) => format!("/{base}/{path}"),
    }
}

/// Per-handler descriptor lookup for the executor and external routers.
///
/// Built once at scan; entries are shared and never mutated afterwards.
pub struct RouteMetadataIndex {
    entries: Vec<Arc<PipelineDescriptor>>,
    by_handler: HashMap<(String, String), usize>,
}

impl std::fmt::Debug for RouteMetadataIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMetadataIndex")
            .field("routes", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl RouteMetadataIndex {
    pub(crate) fn build<'a>(
        controllers: impl Iterator<Item = (&'a str, &'a ControllerDef)>,
    ) -> Result<Self, Error> {
        let mut entries = Vec::new();
        let mut by_handler = HashMap::new();

        for (module, controller) in controllers {
            for route in &controller.routes {
                let key = (controller.name.clone(), route.name.clone());
                if by_handler.contains_key(&key) {
                    return Err(Error::DuplicateRoute {
                        controller: controller.name.clone(),
                        handler: route.name.clone(),
                    });
                }
                let descriptor = Arc::new(PipelineDescriptor::merge(module, controller, route));
                tracing::trace!(
                    module = %module,
                    controller = %controller.name,
                    handler = %route.name,
                    method = descriptor.method.as_str(),
                    path = %descriptor.path,
                    "route descriptor built"
                );
                by_handler.insert(key, entries.len());
                entries.push(descriptor);
            }
        }

        Ok(Self {
            entries,
            by_handler,
        })
    }

    /// Descriptor for a handler, by controller and handler name.
    pub fn get(&self, controller: &str, handler: &str) -> Option<&Arc<PipelineDescriptor>> {
        self.by_handler
            .get(&(controller.to_string(), handler.to_string()))
            .map(|&i| &self.entries[i])
    }

    /// Exact-path lookup convenience for routers and tests.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&Arc<PipelineDescriptor>> {
        self.entries
            .iter()
            .find(|d| d.method == method && d.path == path)
    }

    /// All descriptors in controller declaration order.
    pub fn entries(&self) -> &[Arc<PipelineDescriptor>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use crate::GuardFn;
    use serde_json::json;

    fn noop_handler() -> Arc<dyn Handler> {
        handler_fn(|_args| async move { Ok(json!(null)) })
    }

    fn allow_guard() -> GuardRef {
        GuardRef::inline(GuardFn::new(|_ctx: &crate::ExecutionContext| true))
    }

    fn controller_with_route(route: RouteDef) -> ControllerDef {
        ControllerDef::new("Users", "/users")
            .guard(allow_guard())
            .route(route)
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/users", "/:id"), "/users/:id");
        assert_eq!(join_paths("/users", ""), "/users");
        assert_eq!(join_paths("", "/health"), "/health");
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("users/", "/:id/"), "/users/:id");
    }

    #[test]
    fn test_bind_sources() {
        let request = RequestContext::new("GET", "/users/9")
            .with_param("id", "9")
            .with_query("page", "2")
            .with_header("x-tenant", "acme")
            .with_json_body(&json!({ "name": "ada" }));

        assert_eq!(
            bind(&request, &ParamBinding::path("id")),
            BoundValue::Present(json!("9"))
        );
        assert_eq!(
            bind(&request, &ParamBinding::query("page")),
            BoundValue::Present(json!("2"))
        );
        assert_eq!(
            bind(&request, &ParamBinding::header("x-tenant")),
            BoundValue::Present(json!("acme"))
        );
        assert_eq!(
            bind(&request, &ParamBinding::body()),
            BoundValue::Present(json!({ "name": "ada" }))
        );
        assert!(bind(&request, &ParamBinding::query("missing")).is_missing());
    }

    #[test]
    fn test_bind_empty_body_is_missing() {
        let request = RequestContext::new("POST", "/users");
        assert!(bind(&request, &ParamBinding::body()).is_missing());
    }

    #[test]
    fn test_merge_inherits_class_guards() {
        let controller =
            controller_with_route(RouteDef::get("list", "/", noop_handler()));
        let descriptor = PipelineDescriptor::merge("Users", &controller, &controller.routes[0]);
        assert_eq!(descriptor.guards.len(), 1);
        assert_eq!(descriptor.path, "/users");
    }

    #[test]
    fn test_merge_appends_method_guards() {
        let controller = controller_with_route(
            RouteDef::get("find_one", "/:id", noop_handler()).guard(allow_guard()),
        );
        let descriptor = PipelineDescriptor::merge("Users", &controller, &controller.routes[0]);
        assert_eq!(descriptor.guards.len(), 2);
    }

    #[test]
    fn test_merge_public_route_suppresses_class_guards() {
        let controller =
            controller_with_route(RouteDef::get("health", "/health", noop_handler()).public());
        let descriptor = PipelineDescriptor::merge("Users", &controller, &controller.routes[0]);
        assert!(descriptor.guards.is_empty());
    }

    #[test]
    fn test_merge_interceptors_class_then_method() {
        use crate::interceptor::TimingInterceptor;
        let controller = ControllerDef::new("Users", "/users")
            .interceptor(InterceptorRef::inline(TimingInterceptor))
            .route(
                RouteDef::get("list", "/", noop_handler())
                    .interceptor(InterceptorRef::inline(TimingInterceptor)),
            );
        let descriptor = PipelineDescriptor::merge("Users", &controller, &controller.routes[0]);
        assert_eq!(descriptor.interceptors.len(), 2);
    }

    #[test]
    fn test_index_rejects_duplicate_handler_names() {
        let controller = ControllerDef::new("Users", "/users")
            .route(RouteDef::get("list", "/", noop_handler()))
            .route(RouteDef::post("list", "/", noop_handler()));
        let err = RouteMetadataIndex::build(std::iter::once(("Users", &controller))).unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute { .. }));
    }

    #[test]
    fn test_index_lookup() {
        let controller = ControllerDef::new("Users", "/users")
            .route(RouteDef::get("list", "/", noop_handler()))
            .route(RouteDef::get("find_one", "/:id", noop_handler()));
        let index = RouteMetadataIndex::build(std::iter::once(("Users", &controller))).unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.get("Users", "list").is_some());
        assert!(index.get("Users", "nope").is_none());
        let found = index.find(HttpMethod::Get, "/users/:id").unwrap();
        assert_eq!(found.handler_name, "find_one");
    }
}
