// Handler invocation

use crate::{ExecutionContext, PipelineError};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// The innermost pipeline stage.
///
/// Receives the bound, pipe-validated arguments in declaration order and
/// produces the request's value; its result (or error) becomes the
/// innermost continuation the interceptors unwind through.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &ExecutionContext, args: Vec<Value>) -> Result<Value, PipelineError>;
}

/// Handler built from an async closure over the bound arguments.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, PipelineError>> + Send,
{
    async fn call(
        &self,
        _ctx: &ExecutionContext,
        args: Vec<Value>,
    ) -> Result<Value, PipelineError> {
        (self.f)(args).await
    }
}

/// Erase an async closure into the handler object route metadata stores.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, PipelineError>> + Send + 'static,
{
    Arc::new(FnHandler::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestContext;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_handler_receives_args() {
        let handler = handler_fn(|args| async move { Ok(json!({ "echo": args })) });
        let ctx = ExecutionContext::new(RequestContext::new("GET", "/"));

        let value = handler.call(&ctx, vec![json!(1), json!("two")]).await.unwrap();
        assert_eq!(value["echo"], json!([1, "two"]));
    }

    #[tokio::test]
    async fn test_fn_handler_propagates_errors() {
        let handler = handler_fn(|_args| async move {
            Err(PipelineError::handler_threw("find_one", "not found").with_status_hint(404))
        });
        let ctx = ExecutionContext::new(RequestContext::new("GET", "/"));

        let err = handler.call(&ctx, Vec::new()).await.unwrap_err();
        assert_eq!(err.status_hint, 404);
    }
}
