//! Guardrails: checks running alongside or after an agent that may halt
//! the run.
//!
//! Input guardrails see the run input and only run for the first agent of
//! a run. Output guardrails see the final output of the agent that
//! produced it. A guardrail whose tripwire triggers aborts the run with
//! [`Error::InputGuardrailTripwireTriggered`] or
//! [`Error::OutputGuardrailTripwireTriggered`].

use std::error::Error as StdError;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tandem_model::Item;
use tracing::{Instrument, Span};

use crate::agent::{Agent, AgentId};
use crate::{Error, Result, RunContext};

/// The error type returned by guardrail functions.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// What a guardrail function decided.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GuardrailFunctionOutput {
    /// Anything the guardrail wants to report, e.g. its reasoning.
    pub output_info: Value,
    /// Whether the run must halt.
    pub tripwire_triggered: bool,
}

impl GuardrailFunctionOutput {
    /// Lets the run continue.
    #[inline]
    pub fn pass() -> Self {
        Self::default()
    }

    /// Halts the run.
    #[inline]
    pub fn tripwire(output_info: Value) -> Self {
        Self {
            output_info,
            tripwire_triggered: true,
        }
    }
}

#[rustfmt::skip]
type GuardrailFn<T> = Arc<
    dyn Fn(RunContext, Arc<Agent>, T)
        -> BoxFuture<'static, Result<GuardrailFunctionOutput, BoxError>>
        + Send + Sync
>;

/// A check of the run input.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    func: GuardrailFn<Vec<Item>>,
}

impl InputGuardrail {
    /// Creates a guardrail from an asynchronous function of the context,
    /// the starting agent and the run input.
    pub fn new<S, F, Fut>(name: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(RunContext, Arc<Agent>, Vec<Item>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardrailFunctionOutput, BoxError>>
            + Send
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(
                move |ctx: RunContext, agent: Arc<Agent>, input: Vec<Item>| {
                    f(ctx, agent, input).boxed()
                },
            ),
        }
    }

    /// Returns the name of the guardrail.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the guardrail.
    pub async fn run(
        &self,
        ctx: RunContext,
        agent: Arc<Agent>,
        input: Vec<Item>,
    ) -> Result<InputGuardrailResult> {
        let output = (self.func)(ctx, agent, input).await.map_err(|err| {
            Error::Guardrail {
                name: self.name.clone(),
                message: err.to_string(),
            }
        })?;
        Ok(InputGuardrailResult {
            guardrail: self.name.clone(),
            output,
        })
    }
}

/// A check of an agent's final output.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    func: GuardrailFn<Value>,
}

impl OutputGuardrail {
    /// Creates a guardrail from an asynchronous function of the context,
    /// the agent and its final output.
    pub fn new<S, F, Fut>(name: S, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(RunContext, Arc<Agent>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardrailFunctionOutput, BoxError>>
            + Send
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(
                move |ctx: RunContext, agent: Arc<Agent>, output: Value| {
                    f(ctx, agent, output).boxed()
                },
            ),
        }
    }

    /// Returns the name of the guardrail.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the guardrail against the output of `agent_id`.
    pub async fn run(
        &self,
        ctx: RunContext,
        agent: Arc<Agent>,
        agent_id: AgentId,
        agent_output: Value,
    ) -> Result<OutputGuardrailResult> {
        let output = (self.func)(ctx, agent, agent_output.clone())
            .await
            .map_err(|err| Error::Guardrail {
                name: self.name.clone(),
                message: err.to_string(),
            })?;
        Ok(OutputGuardrailResult {
            guardrail: self.name.clone(),
            agent: agent_id,
            agent_output,
            output,
        })
    }
}

/// The result of an input guardrail.
#[derive(Clone, Debug, PartialEq)]
pub struct InputGuardrailResult {
    /// Name of the guardrail.
    pub guardrail: String,
    /// What the guardrail decided.
    pub output: GuardrailFunctionOutput,
}

/// The result of an output guardrail.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputGuardrailResult {
    /// Name of the guardrail.
    pub guardrail: String,
    /// The agent whose output was checked.
    pub agent: AgentId,
    /// The checked output.
    pub agent_output: Value,
    /// What the guardrail decided.
    pub output: GuardrailFunctionOutput,
}

/// Returns the span of one guardrail check, or a disabled span when
/// tracing is off.
pub fn guardrail_span(name: &str, tracing_disabled: bool) -> Span {
    if tracing_disabled {
        Span::none()
    } else {
        info_span!("guardrail", name = name)
    }
}

/// Runs the input guardrails concurrently.
///
/// Returns every result in completion order. The first tripwire aborts the
/// others and fails with [`Error::InputGuardrailTripwireTriggered`].
pub async fn run_input_guardrails(
    guardrails: &[InputGuardrail],
    ctx: &RunContext,
    agent: &Arc<Agent>,
    input: &[Item],
    tracing_disabled: bool,
) -> Result<Vec<InputGuardrailResult>> {
    let mut pending: FuturesUnordered<_> = guardrails
        .iter()
        .map(|guardrail| {
            let span = guardrail_span(guardrail.name(), tracing_disabled);
            guardrail
                .run(ctx.clone(), Arc::clone(agent), input.to_vec())
                .instrument(span)
        })
        .collect();

    let mut results = Vec::with_capacity(guardrails.len());
    while let Some(result) = pending.next().await {
        let result = result?;
        if result.output.tripwire_triggered {
            warn!("input guardrail `{}` triggered", result.guardrail);
            // Dropping `pending` cancels the unfinished guardrails.
            return Err(Error::InputGuardrailTripwireTriggered(Box::new(
                result,
            )));
        }
        results.push(result);
    }
    Ok(results)
}

/// Runs the output guardrails concurrently.
///
/// Behaves like [`run_input_guardrails`], failing with
/// [`Error::OutputGuardrailTripwireTriggered`].
pub async fn run_output_guardrails(
    guardrails: &[OutputGuardrail],
    ctx: &RunContext,
    agent: &Arc<Agent>,
    agent_id: AgentId,
    output: &Value,
    tracing_disabled: bool,
) -> Result<Vec<OutputGuardrailResult>> {
    let mut pending: FuturesUnordered<_> = guardrails
        .iter()
        .map(|guardrail| {
            let span = guardrail_span(guardrail.name(), tracing_disabled);
            guardrail
                .run(ctx.clone(), Arc::clone(agent), agent_id, output.clone())
                .instrument(span)
        })
        .collect();

    let mut results = Vec::with_capacity(guardrails.len());
    while let Some(result) = pending.next().await {
        let result = result?;
        if result.output.tripwire_triggered {
            warn!("output guardrail `{}` triggered", result.guardrail);
            return Err(Error::OutputGuardrailTripwireTriggered(Box::new(
                result,
            )));
        }
        results.push(result);
    }
    Ok(results)
}
