// Request and execution contexts passed through the pipeline

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Transport-produced request data.
///
/// The kernel never parses wire bytes; the transport adapter fills this in
/// before handing the request to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(name)
    }

    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_json_body<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).unwrap_or_default();
        self
    }
}

/// Per-request execution context handed to every pipeline stage.
///
/// The executor treats it as opaque beyond binding the matched route and
/// consulting the deadline; guards, pipes, interceptors, and handlers are
/// free to read the request it wraps.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request: RequestContext,
    request_id: String,
    controller: String,
    handler: String,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            request_id: Uuid::new_v4().to_string(),
            controller: String::new(),
            handler: String::new(),
            deadline: None,
        }
    }

    /// Absolute deadline after which remaining stages are skipped.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub(crate) fn bind_route(&mut self, controller: &str, handler: &str) {
        self.controller = controller.to_string();
        self.handler = handler.to_string();
    }

    /// Unique id assigned to this request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Name of the matched controller; empty until the executor binds it.
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Name of the matched handler; empty until the executor binds it.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Cooperative cancellation check. The executor consults this between
    /// stages; long-running stages should consult it themselves. A started
    /// stage is never preempted.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accessors() {
        let request = RequestContext::new("GET", "/users/7")
            .with_header("authorization", "Bearer t")
            .with_param("id", "7")
            .with_query("expand", "orders");

        assert_eq!(request.header("authorization").unwrap(), "Bearer t");
        assert_eq!(request.param("id").unwrap(), "7");
        assert_eq!(request.query("expand").unwrap(), "orders");
        assert!(request.param("missing").is_none());
    }

    #[test]
    fn test_json_body_round_trip() {
        let request =
            RequestContext::new("POST", "/users").with_json_body(&json!({ "name": "ada" }));
        let body: serde_json::Value = request.json().unwrap();
        assert_eq!(body["name"], "ada");
    }

    #[test]
    fn test_deadline_check() {
        let ctx = ExecutionContext::new(RequestContext::new("GET", "/"));
        assert!(!ctx.deadline_exceeded());

        let expired = ExecutionContext::new(RequestContext::new("GET", "/"))
            .with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(expired.deadline_exceeded());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = ExecutionContext::new(RequestContext::new("GET", "/"));
        let b = ExecutionContext::new(RequestContext::new("GET", "/"));
        assert_ne!(a.request_id(), b.request_id());
    }
}
