use std::future::ready;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_model::FunctionToolSpec;

use super::{Error, IsEnabled, Tool, ToolResult};
use crate::items::RunItem;
use crate::RunContext;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        &self,
        ctx: RunContext,
        arguments: &str,
    ) -> BoxFuture<'static, ToolResult>;
}

struct AnyTool<T: Tool>(T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        &self,
        ctx: RunContext,
        arguments: &str,
    ) -> BoxFuture<'static, ToolResult> {
        // Models may omit the arguments of a parameterless call.
        let arguments = match arguments.trim() {
            "" => "{}",
            arguments => arguments,
        };
        let input: T::Input = match serde_json::from_str(arguments) {
            Ok(input) => input,
            Err(err) => return ready(ToolResult::Err(err.into())).boxed(),
        };
        self.0.execute(ctx, input).boxed()
    }
}

struct FnTool<I, F> {
    name: String,
    description: String,
    parameter_schema: Value,
    func: F,
    _input: PhantomData<fn() -> I>,
}

impl<I, F, Fut> Tool for FnTool<I, F>
where
    I: DeserializeOwned + 'static,
    F: Fn(RunContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    type Input = I;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        ctx: RunContext,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.func)(ctx, input)
    }
}

type FailureFn = Arc<dyn Fn(&RunContext, &Error) -> String + Send + Sync>;

/// What to do when a function tool fails.
#[derive(Clone, Default)]
pub enum FailureHandler {
    /// Tell the model that the tool failed, with the error message.
    #[default]
    Default,
    /// Send the returned message to the model.
    Custom(FailureFn),
    /// Abort the run with [`crate::Error::Tool`].
    Propagate,
}

impl FailureHandler {
    /// Creates a handler that formats the error with `f`.
    #[inline]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RunContext, &Error) -> String + Send + Sync + 'static,
    {
        FailureHandler::Custom(Arc::new(f))
    }
}

/// A function tool, executed locally when the model calls it.
#[derive(Clone)]
pub struct FunctionTool {
    object: Arc<dyn ToolObject>,
    strict: bool,
    failure_handler: FailureHandler,
    is_enabled: IsEnabled,
}

impl FunctionTool {
    /// Creates a function tool from a [`Tool`] implementation.
    #[inline]
    pub fn new<T: Tool>(tool: T) -> Self {
        Self::from_object(Arc::new(AnyTool(tool)))
    }

    /// Creates a function tool from a closure, deriving the parameter
    /// schema from `I`.
    pub fn from_fn<I, F, Fut, S1, S2>(
        name: S1,
        description: S2,
        func: F,
    ) -> Self
    where
        I: JsonSchema + DeserializeOwned + 'static,
        F: Fn(RunContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::new(FnTool {
            name: name.into(),
            description: description.into(),
            parameter_schema: schema_for!(I).to_value(),
            func,
            _input: PhantomData,
        })
    }

    pub(crate) fn from_object(object: Arc<dyn ToolObject>) -> Self {
        Self {
            object,
            strict: true,
            failure_handler: Default::default(),
            is_enabled: Default::default(),
        }
    }

    /// Sets whether the provider should enforce the schema strictly.
    #[inline]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the failure handler.
    #[inline]
    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.failure_handler = handler;
        self
    }

    /// Sets whether the tool is offered to the model.
    #[inline]
    pub fn with_enabled<E: Into<IsEnabled>>(mut self, enabled: E) -> Self {
        self.is_enabled = enabled.into();
        self
    }

    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Returns the description of the tool.
    #[inline]
    pub fn description(&self) -> &str {
        self.object.description()
    }

    /// Returns the parameter schema of the tool.
    #[inline]
    pub fn parameter_schema(&self) -> &Value {
        self.object.parameter_schema()
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> &IsEnabled {
        &self.is_enabled
    }

    /// Describes this tool for the model.
    pub fn spec(&self) -> FunctionToolSpec {
        FunctionToolSpec {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameter_schema().clone(),
            strict: self.strict,
        }
    }

    /// Invokes the tool with the JSON arguments produced by the model.
    ///
    /// Failures are turned into a message for the model by the failure
    /// handler, unless it is [`FailureHandler::Propagate`].
    pub async fn invoke(
        &self,
        ctx: RunContext,
        arguments: &str,
    ) -> crate::Result<String> {
        let fut = self.object.execute(ctx.clone(), arguments);
        let err = match fut.await {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };

        match &self.failure_handler {
            FailureHandler::Default => {
                warn!("tool `{}` failed: {err}", self.name());
                Ok(format!(
                    "An error occurred while running the tool. Please try \
                     again. Error: {err}"
                ))
            }
            FailureHandler::Custom(f) => {
                warn!("tool `{}` failed: {err}", self.name());
                Ok(f(&ctx, &err))
            }
            FailureHandler::Propagate => {
                error!("tool `{}` failed: {err}", self.name());
                Err(crate::Error::Tool {
                    tool_name: self.name().to_owned(),
                    source: err,
                })
            }
        }
    }
}

/// The result of a function tool call within a turn.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionToolResult {
    /// Name of the tool.
    pub tool_name: String,
    /// The output of the tool.
    pub output: String,
    /// The output item recorded for the call.
    pub run_item: RunItem,
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::tool::ErrorKind;

    #[derive(Deserialize, JsonSchema)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    fn add_tool() -> FunctionTool {
        FunctionTool::from_fn(
            "add",
            "Adds two numbers",
            |_ctx, input: AddInput| async move {
                if input.a < 0 {
                    return Err(Error::execution_error()
                        .with_reason("negative numbers are not supported"));
                }
                Ok((input.a + input.b).to_string())
            },
        )
    }

    #[tokio::test]
    async fn test_invoke() {
        let tool = add_tool();
        let spec = tool.spec();
        assert_eq!(spec.name, "add");
        assert!(spec.parameters["properties"]["a"].is_object());

        let output = tool
            .invoke(RunContext::new(), r#"{"a": 1, "b": 2}"#)
            .await
            .unwrap();
        assert_eq!(output, "3");
    }

    #[tokio::test]
    async fn test_failure_handlers() {
        let tool = add_tool();
        let output = tool
            .invoke(RunContext::new(), r#"{"a": -1, "b": 2}"#)
            .await
            .unwrap();
        assert!(output.starts_with("An error occurred while running the tool"));
        assert!(output.contains("negative numbers are not supported"));

        let tool = add_tool().with_failure_handler(FailureHandler::custom(
            |_, err| format!("custom: {}", err.kind()),
        ));
        let output = tool.invoke(RunContext::new(), "not json").await.unwrap();
        assert_eq!(output, "custom: invalid input");

        let tool = add_tool().with_failure_handler(FailureHandler::Propagate);
        let err = tool.invoke(RunContext::new(), "{").await.unwrap_err();
        let crate::Error::Tool { tool_name, source } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(tool_name, "add");
        assert_eq!(source.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_empty_arguments() {
        #[derive(Deserialize, JsonSchema)]
        struct NoInput {}

        let tool = FunctionTool::from_fn(
            "ping",
            "Pings",
            |_ctx, _input: NoInput| async { Ok("pong".to_owned()) },
        );
        let output = tool.invoke(RunContext::new(), "").await.unwrap();
        assert_eq!(output, "pong");
    }
}
