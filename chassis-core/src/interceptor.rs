// Interceptors wrap handler invocation in onion order

use crate::{ExecutionContext, PipelineError};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

/// Continuation invoking the stages declared after this interceptor.
///
/// Call it zero or one times: skipping it short-circuits the inner chain
/// with the interceptor's own result.
pub type Next = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, PipelineError>> + Send>;

/// Wraps everything declared after it - later interceptors and the handler.
///
/// Composition is strict onion order: the first-declared interceptor's
/// logic before `next()` runs first, and its logic after `next()` returns
/// runs last. An interceptor that has called `next()` observes errors from
/// inner stages on the way back up and may transform them or propagate
/// them unchanged.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: &ExecutionContext,
        next: Next,
    ) -> Result<Value, PipelineError>;
}

/// Interceptor that logs timing around the inner chain.
pub struct TimingInterceptor;

#[async_trait]
impl Interceptor for TimingInterceptor {
    async fn intercept(
        &self,
        ctx: &ExecutionContext,
        next: Next,
    ) -> Result<Value, PipelineError> {
        let start = std::time::Instant::now();
        let result = next().await;
        let elapsed = start.elapsed();
        match &result {
            Ok(_) => tracing::debug!(
                request_id = %ctx.request_id(),
                handler = %ctx.handler(),
                elapsed_ms = elapsed.as_millis() as u64,
                "request completed"
            ),
            Err(err) => tracing::debug!(
                request_id = %ctx.request_id(),
                handler = %ctx.handler(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "request failed"
            ),
        }
        result
    }
}
