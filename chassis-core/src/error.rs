// Error types for the Chassis kernel

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Construction-time errors raised while scanning and validating the module
/// graph. All of these are fatal: a partially wired application must not
/// serve traffic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("duplicate provider `{token}` in module `{module}`")]
    DuplicateProvider { token: String, module: String },

    #[error("no provider for `{token}` is visible from module `{module}`")]
    UnknownProvider { token: String, module: String },

    #[error("circular provider dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("circular module import: {}", .path.join(" -> "))]
    ModuleCycle { path: Vec<String> },

    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("invalid export from module `{module}`: {reason}")]
    InvalidExport { module: String, reason: String },

    #[error("duplicate route handler `{handler}` on controller `{controller}`")]
    DuplicateRoute { controller: String, handler: String },

    #[error("provider `{token}` failed to construct: {message}")]
    Construction { token: String, message: String },
}

/// Which pipeline stage produced a request-time failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineErrorKind {
    GuardDenied,
    PipeRejected,
    HandlerThrew,
    InterceptorThrew,
    TimedOut,
}

impl PipelineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineErrorKind::GuardDenied => "guard denied",
            PipelineErrorKind::PipeRejected => "pipe rejected",
            PipelineErrorKind::HandlerThrew => "handler threw",
            PipelineErrorKind::InterceptorThrew => "interceptor threw",
            PipelineErrorKind::TimedOut => "timed out",
        }
    }

    /// Advisory transport status for this kind; the translation layer owns
    /// the final mapping.
    pub fn default_status_hint(&self) -> u16 {
        match self {
            PipelineErrorKind::GuardDenied => 403,
            PipelineErrorKind::PipeRejected => 400,
            PipelineErrorKind::HandlerThrew => 500,
            PipelineErrorKind::InterceptorThrew => 500,
            PipelineErrorKind::TimedOut => 408,
        }
    }
}

impl fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-request pipeline failure.
///
/// Terminates a single request's chain and never touches shared container
/// state. The payload names the offending stage and carries its message so
/// the external translation layer can produce a response without leaking
/// internals; `status_hint` is advisory.
#[derive(Error, Debug, Clone)]
#[error("{kind} (status {status_hint}): {payload}")]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub status_hint: u16,
    pub payload: Value,
}

impl PipelineError {
    pub fn new(kind: PipelineErrorKind, status_hint: u16, payload: Value) -> Self {
        Self {
            kind,
            status_hint,
            payload,
        }
    }

    pub fn guard_denied(guard: &str, message: impl Into<String>) -> Self {
        Self::new(
            PipelineErrorKind::GuardDenied,
            403,
            json!({ "guard": guard, "message": message.into() }),
        )
    }

    pub fn pipe_rejected(source: &str, message: impl Into<String>) -> Self {
        Self::new(
            PipelineErrorKind::PipeRejected,
            400,
            json!({ "pipe": source, "message": message.into() }),
        )
    }

    pub fn handler_threw(handler: &str, message: impl Into<String>) -> Self {
        Self::new(
            PipelineErrorKind::HandlerThrew,
            500,
            json!({ "handler": handler, "message": message.into() }),
        )
    }

    pub fn interceptor_threw(interceptor: &str, message: impl Into<String>) -> Self {
        Self::new(
            PipelineErrorKind::InterceptorThrew,
            500,
            json!({ "interceptor": interceptor, "message": message.into() }),
        )
    }

    pub fn timed_out(stage: &str) -> Self {
        Self::new(
            PipelineErrorKind::TimedOut,
            408,
            json!({ "stage": stage, "message": "deadline exceeded" }),
        )
    }

    /// Override the advisory status.
    pub fn with_status_hint(mut self, status_hint: u16) -> Self {
        self.status_hint = status_hint;
        self
    }
}
