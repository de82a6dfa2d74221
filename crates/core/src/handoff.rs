//! Handoffs: delegating the conversation to another agent.
//!
//! A handoff is offered to the model as a function tool. When the model
//! calls it, the run continues with the target agent, optionally after an
//! input filter rewrote the history the target sees.

pub mod filters;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tandem_model::{FunctionToolSpec, Item};

use crate::agent::{AgentGraph, AgentId};
use crate::items::RunItem;
use crate::tool::IsEnabled;
use crate::{Error, Result, RunContext};

/// The conversation handed to the next agent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandoffInputData {
    /// The input of the run.
    pub input_history: Vec<Item>,
    /// Items generated before the turn that requested the handoff.
    pub pre_handoff_items: Vec<RunItem>,
    /// Items generated in that turn, including the handoff call and its
    /// output.
    pub new_items: Vec<RunItem>,
}

/// Rewrites the conversation before the next agent sees it.
pub type HandoffInputFilter =
    Arc<dyn Fn(HandoffInputData) -> HandoffInputData + Send + Sync>;

#[rustfmt::skip]
type InvokeFn = Arc<
    dyn Fn(RunContext, String) -> BoxFuture<'static, Result<()>> + Send + Sync
>;

/// The target of a handoff declared on an agent.
#[derive(Clone)]
pub enum HandoffTarget {
    /// Another agent, with the default handoff settings.
    Agent(AgentId),
    /// A customized handoff.
    Custom(Handoff),
}

impl From<AgentId> for HandoffTarget {
    #[inline]
    fn from(id: AgentId) -> Self {
        HandoffTarget::Agent(id)
    }
}

impl From<Handoff> for HandoffTarget {
    #[inline]
    fn from(handoff: Handoff) -> Self {
        HandoffTarget::Custom(handoff)
    }
}

/// Returns the default tool name of a handoff to `agent_name`.
pub fn default_tool_name(agent_name: &str) -> String {
    format!("transfer_to_{agent_name}")
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn default_tool_description(
    agent_name: &str,
    handoff_description: Option<&str>,
) -> String {
    let description = format!(
        "Handoff to the {agent_name} agent to handle the request. {}",
        handoff_description.unwrap_or_default()
    );
    description.trim_end().to_owned()
}

/// A handoff to an agent of the graph.
#[derive(Clone)]
pub struct Handoff {
    tool_name: String,
    tool_description: String,
    input_schema: Value,
    strict: bool,
    target: AgentId,
    target_name: String,
    on_invoke: Option<InvokeFn>,
    input_filter: Option<HandoffInputFilter>,
    is_enabled: IsEnabled,
}

impl Handoff {
    /// Creates a handoff to `target` with the default settings.
    #[inline]
    pub fn to_agent(graph: &AgentGraph, target: AgentId) -> Result<Self> {
        Self::builder(graph, target).map(HandoffBuilder::build)
    }

    /// Creates a builder of a handoff to `target`.
    pub fn builder(
        graph: &AgentGraph,
        target: AgentId,
    ) -> Result<HandoffBuilder> {
        let agent = graph.resolve(target)?;
        Ok(HandoffBuilder {
            handoff: Handoff {
                tool_name: default_tool_name(agent.name()),
                tool_description: default_tool_description(
                    agent.name(),
                    agent.handoff_description(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                    "additionalProperties": false,
                }),
                strict: true,
                target,
                target_name: agent.name().to_owned(),
                on_invoke: None,
                input_filter: None,
                is_enabled: IsEnabled::Always,
            },
        })
    }

    /// Returns the name of the tool offered to the model.
    #[inline]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the description of the tool offered to the model.
    #[inline]
    pub fn tool_description(&self) -> &str {
        &self.tool_description
    }

    /// Returns the agent taking over.
    #[inline]
    pub fn target(&self) -> AgentId {
        self.target
    }

    /// Returns the name of the agent taking over.
    #[inline]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Returns the input filter of this handoff.
    #[inline]
    pub fn input_filter(&self) -> Option<&HandoffInputFilter> {
        self.input_filter.as_ref()
    }

    /// Returns whether this handoff is offered to the model.
    #[inline]
    pub fn is_enabled(&self) -> &IsEnabled {
        &self.is_enabled
    }

    /// Describes this handoff for the model.
    pub fn spec(&self) -> FunctionToolSpec {
        FunctionToolSpec {
            name: self.tool_name.clone(),
            description: self.tool_description.clone(),
            parameters: self.input_schema.clone(),
            strict: self.strict,
        }
    }

    /// Runs the handoff callback with the arguments of the model's call
    /// and returns the agent taking over.
    pub async fn invoke(
        &self,
        ctx: RunContext,
        arguments: &str,
    ) -> Result<AgentId> {
        if let Some(on_invoke) = &self.on_invoke {
            on_invoke(ctx, arguments.to_owned()).await?;
        }
        Ok(self.target)
    }

    /// Returns the tool output acknowledging the transfer.
    pub fn transfer_output(&self) -> String {
        json!({ "assistant": self.target_name }).to_string()
    }
}

/// [`Handoff`] builder.
pub struct HandoffBuilder {
    handoff: Handoff,
}

impl HandoffBuilder {
    /// Overrides the tool name.
    #[inline]
    pub fn with_tool_name<S: Into<String>>(mut self, name: S) -> Self {
        self.handoff.tool_name = name.into();
        self
    }

    /// Overrides the tool description.
    #[inline]
    pub fn with_tool_description<S: Into<String>>(
        mut self,
        description: S,
    ) -> Self {
        self.handoff.tool_description = description.into();
        self
    }

    /// Runs `f` when the handoff is invoked.
    pub fn on_handoff<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handoff.on_invoke =
            Some(Arc::new(move |ctx: RunContext, _arguments: String| {
                f(ctx).map(Ok).boxed()
            }));
        self
    }

    /// Makes the model pass a `T` when handing off, then runs `f` with it.
    ///
    /// Arguments that do not parse as `T` fail the run with a model
    /// behavior error.
    pub fn on_handoff_with_input<T, F, Fut>(mut self, f: F) -> Self
    where
        T: JsonSchema + DeserializeOwned + 'static,
        F: Fn(RunContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handoff.input_schema = schema_for!(T).to_value();
        self.handoff.on_invoke =
            Some(Arc::new(move |ctx: RunContext, arguments: String| {
                match serde_json::from_str::<T>(&arguments) {
                    Ok(input) => f(ctx, input).map(Ok).boxed(),
                    Err(err) => {
                        let err = Error::model_behavior(format!(
                            "invalid JSON input for handoff: {err}"
                        ));
                        async move { Err(err) }.boxed()
                    }
                }
            }));
        self
    }

    /// Sets the input filter, taking precedence over the run-level one.
    #[inline]
    pub fn with_input_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(HandoffInputData) -> HandoffInputData + Send + Sync + 'static,
    {
        self.handoff.input_filter = Some(Arc::new(filter));
        self
    }

    /// Sets whether the handoff is offered to the model.
    #[inline]
    pub fn with_enabled<E: Into<IsEnabled>>(mut self, enabled: E) -> Self {
        self.handoff.is_enabled = enabled.into();
        self
    }

    /// Builds the handoff.
    #[inline]
    pub fn build(self) -> Handoff {
        self.handoff
    }
}
