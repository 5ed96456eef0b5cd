// Per-request pipeline execution

use crate::container::ModuleContainer;
use crate::metadata::{bind, GuardRef, InterceptorRef, PipeRef, PipelineDescriptor};
use crate::metadata::BoundValue;
use crate::provider::{as_guard, as_interceptor, as_pipe};
use crate::{
    Error, ExecutionContext, Guard, Interceptor, Next, Pipe, PipelineError, PipelineErrorKind,
    Token,
};
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Executes one request's guard -> pipe -> interceptor -> handler chain.
///
/// Holds only shared read-only state, so a single executor serves any
/// number of concurrent requests; each `execute` call is an independent
/// unit of work with no cross-request ordering constraints. Within one
/// call, stages run strictly in declaration order with onion-model
/// interceptor composition.
#[derive(Clone)]
pub struct PipelineExecutor {
    container: Arc<ModuleContainer>,
}

impl PipelineExecutor {
    pub fn new(container: Arc<ModuleContainer>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<ModuleContainer> {
        &self.container
    }

    /// Run the full chain for one request.
    ///
    /// Stage order: guards (first denial wins, nothing else runs), then
    /// parameter binding and pipes (rejection wins before any interceptor),
    /// then interceptors wrapping the handler in strict onion order. The
    /// deadline on `ctx` is checked between stages; a started stage is
    /// never preempted.
    pub async fn execute(
        &self,
        descriptor: &Arc<PipelineDescriptor>,
        mut ctx: ExecutionContext,
    ) -> Result<Value, PipelineError> {
        ctx.bind_route(&descriptor.controller, &descriptor.handler_name);
        let span = tracing::debug_span!(
            "pipeline",
            request_id = %ctx.request_id(),
            controller = %descriptor.controller,
            handler = %descriptor.handler_name,
        );
        self.run(descriptor.clone(), Arc::new(ctx))
            .instrument(span)
            .await
    }

    /// Run the chain with a relative deadline applied to `ctx`.
    pub async fn execute_with_timeout(
        &self,
        descriptor: &Arc<PipelineDescriptor>,
        ctx: ExecutionContext,
        timeout: Duration,
    ) -> Result<Value, PipelineError> {
        self.execute(descriptor, ctx.with_timeout(timeout)).await
    }

    async fn run(
        &self,
        descriptor: Arc<PipelineDescriptor>,
        ctx: Arc<ExecutionContext>,
    ) -> Result<Value, PipelineError> {
        // Guards: class-level then method-level, sequential; the first
        // denial short-circuits before any interceptor or handler work.
        for guard_ref in &descriptor.guards {
            if ctx.deadline_exceeded() {
                return Err(PipelineError::timed_out(guard_ref.name()));
            }
            let guard = self.guard_instance(guard_ref, &descriptor.module)?;
            if !guard.can_activate(&ctx).await? {
                tracing::debug!(guard = guard_ref.name(), "guard denied request");
                return Err(PipelineError::guard_denied(
                    guard_ref.name(),
                    "request denied",
                ));
            }
        }

        // Bind parameters and run pipes in binding order; a rejection
        // short-circuits before any interceptor runs.
        let mut args = Vec::with_capacity(descriptor.params.len());
        for binding in &descriptor.params {
            if ctx.deadline_exceeded() {
                return Err(PipelineError::timed_out(&binding.name));
            }
            let mut value = bind(&ctx.request, binding);
            if binding.required && value.is_missing() {
                return Err(PipelineError::pipe_rejected(
                    &binding.name,
                    format!(
                        "required {:?} parameter `{}` is missing",
                        binding.source, binding.name
                    ),
                ));
            }
            for pipe_ref in descriptor.pipes.iter().chain(binding.pipes.iter()) {
                let pipe = self.pipe_instance(pipe_ref, &descriptor.module)?;
                value = BoundValue::Present(pipe.transform(binding, value).await?);
            }
            args.push(value.into_value().unwrap_or(Value::Null));
        }

        self.clone().run_interceptors(descriptor, ctx, args, 0).await
    }

    /// Recursive onion composition: interceptor `index` wraps everything
    /// after it. The `next` continuation owns the argument list, so each
    /// layer can invoke the rest of the chain at most once.
    fn run_interceptors(
        self,
        descriptor: Arc<PipelineDescriptor>,
        ctx: Arc<ExecutionContext>,
        args: Vec<Value>,
        index: usize,
    ) -> BoxFuture<'static, Result<Value, PipelineError>> {
        Box::pin(async move {
            match descriptor.interceptors.get(index) {
                None => {
                    if ctx.deadline_exceeded() {
                        return Err(PipelineError::timed_out(&descriptor.handler_name));
                    }
                    descriptor.handler.call(&ctx, args).await
                }
                Some(interceptor_ref) => {
                    if ctx.deadline_exceeded() {
                        return Err(PipelineError::timed_out(interceptor_ref.name()));
                    }
                    let interceptor =
                        self.interceptor_instance(interceptor_ref, &descriptor.module)?;
                    let next_executor = self.clone();
                    let next_descriptor = descriptor.clone();
                    let next_ctx = ctx.clone();
                    let next: Next = Box::new(move || {
                        next_executor.run_interceptors(next_descriptor, next_ctx, args, index + 1)
                    });
                    interceptor.intercept(&ctx, next).await
                }
            }
        })
    }

    /// Resolve a guard reference through the declaring controller's module.
    /// Token-referenced stages obey normal provider scopes: a singleton
    /// guard is shared across requests, a transient one is constructed for
    /// this execution only.
    fn guard_instance(
        &self,
        guard_ref: &GuardRef,
        module: &str,
    ) -> Result<Arc<dyn Guard>, PipelineError> {
        match guard_ref {
            GuardRef::Instance { guard, .. } => Ok(guard.clone()),
            GuardRef::Token(token) => {
                let instance = self
                    .container
                    .resolve_token(token, module)
                    .map_err(|err| stage_failure(PipelineErrorKind::GuardDenied, token, &err))?;
                as_guard(&instance).ok_or_else(|| {
                    stage_misconfigured(PipelineErrorKind::GuardDenied, token, "guard")
                })
            }
        }
    }

    fn interceptor_instance(
        &self,
        interceptor_ref: &InterceptorRef,
        module: &str,
    ) -> Result<Arc<dyn Interceptor>, PipelineError> {
        match interceptor_ref {
            InterceptorRef::Instance { interceptor, .. } => Ok(interceptor.clone()),
            InterceptorRef::Token(token) => {
                let instance = self.container.resolve_token(token, module).map_err(|err| {
                    stage_failure(PipelineErrorKind::InterceptorThrew, token, &err)
                })?;
                as_interceptor(&instance).ok_or_else(|| {
                    stage_misconfigured(PipelineErrorKind::InterceptorThrew, token, "interceptor")
                })
            }
        }
    }

    fn pipe_instance(
        &self,
        pipe_ref: &PipeRef,
        module: &str,
    ) -> Result<Arc<dyn Pipe>, PipelineError> {
        match pipe_ref {
            PipeRef::Instance { pipe, .. } => Ok(pipe.clone()),
            PipeRef::Token(token) => {
                let instance = self
                    .container
                    .resolve_token(token, module)
                    .map_err(|err| stage_failure(PipelineErrorKind::PipeRejected, token, &err))?;
                as_pipe(&instance).ok_or_else(|| {
                    stage_misconfigured(PipelineErrorKind::PipeRejected, token, "pipe")
                })
            }
        }
    }
}

// Stage tokens are validated at scan, so these paths only fire when a
// provider factory itself fails at first resolution.
fn stage_failure(kind: PipelineErrorKind, token: &Token, err: &Error) -> PipelineError {
    PipelineError::new(
        kind,
        500,
        json!({ "stage": token.name(), "message": err.to_string() }),
    )
}

fn stage_misconfigured(kind: PipelineErrorKind, token: &Token, expected: &str) -> PipelineError {
    PipelineError::new(
        kind,
        500,
        json!({
            "stage": token.name(),
            "message": format!("provider does not supply a {expected}"),
        }),
    )
}
