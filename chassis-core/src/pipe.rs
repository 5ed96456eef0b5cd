// Pipes validate and transform bound parameters

use crate::metadata::{BoundValue, ParamBinding};
use crate::PipelineError;
use async_trait::async_trait;
use serde_json::Value;

/// Transforms one bound parameter before the handler sees it.
///
/// Pipes run in declaration order per binding; a rejection short-circuits
/// the request before any interceptor or handler executes.
#[async_trait]
pub trait Pipe: Send + Sync {
    async fn transform(
        &self,
        binding: &ParamBinding,
        value: BoundValue,
    ) -> Result<Value, PipelineError>;
}

/// Parses string values into integers, rejecting anything else.
pub struct ParseIntPipe;

#[async_trait]
impl Pipe for ParseIntPipe {
    async fn transform(
        &self,
        binding: &ParamBinding,
        value: BoundValue,
    ) -> Result<Value, PipelineError> {
        match value {
            BoundValue::Present(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| {
                    PipelineError::pipe_rejected(
                        "ParseIntPipe",
                        format!("parameter `{}` is not an integer", binding.name),
                    )
                }),
            BoundValue::Present(value @ Value::Number(_)) => Ok(value),
            BoundValue::Present(_) => Err(PipelineError::pipe_rejected(
                "ParseIntPipe",
                format!("parameter `{}` is not an integer", binding.name),
            )),
            BoundValue::Missing => Err(PipelineError::pipe_rejected(
                "ParseIntPipe",
                format!("parameter `{}` is missing", binding.name),
            )),
        }
    }
}

/// Substitutes a default when the bound value is absent.
///
/// Only meaningful on optional bindings: required bindings reject missing
/// values before any pipe runs.
pub struct DefaultValuePipe {
    default: Value,
}

impl DefaultValuePipe {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            default: default.into(),
        }
    }
}

#[async_trait]
impl Pipe for DefaultValuePipe {
    async fn transform(
        &self,
        _binding: &ParamBinding,
        value: BoundValue,
    ) -> Result<Value, PipelineError> {
        match value {
            BoundValue::Present(value) => Ok(value),
            BoundValue::Missing => Ok(self.default.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParamBinding;
    use serde_json::json;

    #[tokio::test]
    async fn test_parse_int_accepts_digits() {
        let binding = ParamBinding::path("id");
        let value = ParseIntPipe
            .transform(&binding, BoundValue::Present(json!("42")))
            .await
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[tokio::test]
    async fn test_parse_int_passes_numbers_through() {
        let binding = ParamBinding::path("id");
        let value = ParseIntPipe
            .transform(&binding, BoundValue::Present(json!(7)))
            .await
            .unwrap();
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn test_parse_int_rejects_garbage() {
        let binding = ParamBinding::path("id");
        let err = ParseIntPipe
            .transform(&binding, BoundValue::Present(json!("abc")))
            .await
            .unwrap_err();
        assert_eq!(err.status_hint, 400);
        assert_eq!(err.payload["pipe"], "ParseIntPipe");
    }

    #[tokio::test]
    async fn test_default_value_fills_missing() {
        let binding = ParamBinding::query("page").optional();
        let value = DefaultValuePipe::new(1)
            .transform(&binding, BoundValue::Missing)
            .await
            .unwrap();
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn test_default_value_keeps_present() {
        let binding = ParamBinding::query("page").optional();
        let value = DefaultValuePipe::new(1)
            .transform(&binding, BoundValue::Present(json!("3")))
            .await
            .unwrap();
        assert_eq!(value, json!("3"));
    }
}
