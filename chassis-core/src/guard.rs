// Guards decide whether a request may proceed

use crate::{ExecutionContext, PipelineError};
use async_trait::async_trait;

/// Decides whether a request may proceed into the rest of the pipeline.
///
/// Guards run first, class-level then method-level, in declaration order.
/// The first denial short-circuits the whole chain: no pipe, interceptor,
/// or handler work happens afterwards.
#[async_trait]
pub trait Guard: Send + Sync {
    /// `Ok(true)` allows the request, `Ok(false)` denies it with the
    /// default denial outcome. Returning an error denies with the guard's
    /// own typed outcome instead.
    async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, PipelineError>;
}

/// Guard built from a synchronous predicate.
pub struct GuardFn<F> {
    predicate: F,
}

impl<F> GuardFn<F>
where
    F: Fn(&ExecutionContext) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> Guard for GuardFn<F>
where
    F: Fn(&ExecutionContext) -> bool + Send + Sync,
{
    async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, PipelineError> {
        Ok((self.predicate)(ctx))
    }
}
