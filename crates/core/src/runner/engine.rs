use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tandem_model::{
    ComputerCallOutputItem, FunctionCallOutputItem, Item, ModelRequest,
    ModelResponse, ToolChoice,
};
use tracing::{Instrument, Span};

use super::streaming::{StreamEvent, StreamSink};
use super::turn::{
    NextStep, ProcessedResponse, SingleStepResult, ToolRunComputerAction,
    ToolRunFunction, ToolRunHandoff, process_model_response,
};
use super::RunResult;
use crate::agent::{Agent, AgentGraph, AgentId, AgentModel};
use crate::config::RunConfig;
use crate::guardrail::{
    InputGuardrail, InputGuardrailResult, OutputGuardrail,
    run_input_guardrails, run_output_guardrails,
};
use crate::handoff::{Handoff, HandoffInputData};
use crate::hooks::HookSet;
use crate::items::RunItem;
use crate::model_client::ModelClient;
use crate::output::OutputSchema;
use crate::tool::{FunctionToolResult, ToolSet};
use crate::{Error, Result, RunContext, RunErrorDetails, ToolUseBehavior};

const COMPUTER_TOOL_NAME: &str = "computer_use_preview";
const MULTIPLE_HANDOFFS_OUTPUT: &str =
    "Multiple handoffs detected, ignoring this one.";

/// The state of one run, driven turn by turn until an agent produces the
/// final output.
///
/// The turn counter is shared by every agent of the run. Items generated
/// by a turn are published to the stream sink, if any, as soon as they
/// exist.
pub(crate) struct RunEngine {
    graph: Arc<AgentGraph>,
    config: RunConfig,
    hooks: HookSet,
    ctx: RunContext,
    original_input: Vec<Item>,
    generated_items: Vec<RunItem>,
    raw_responses: Vec<ModelResponse>,
    input_guardrail_results: Vec<InputGuardrailResult>,
    current_agent: AgentId,
    current_turn: usize,
    agents_used_tools: HashSet<AgentId>,
    sink: Option<StreamSink>,
}

impl RunEngine {
    pub fn new(
        graph: Arc<AgentGraph>,
        config: RunConfig,
        starting_agent: AgentId,
        input: Vec<Item>,
        ctx: RunContext,
        sink: Option<StreamSink>,
    ) -> Self {
        Self {
            graph,
            hooks: HookSet::new(config.hooks.clone()),
            config,
            ctx,
            original_input: input,
            generated_items: vec![],
            raw_responses: vec![],
            input_guardrail_results: vec![],
            current_agent: starting_agent,
            current_turn: 0,
            agents_used_tools: HashSet::new(),
            sink,
        }
    }

    pub async fn run(mut self) -> Result<RunResult> {
        let span = self.span(|| {
            info_span!("run", workflow = %self.config.workflow_name)
        });
        async move {
            loop {
                let agent_id = self.current_agent;
                let agent = Arc::clone(self.graph.resolve(agent_id)?);
                self.emit(StreamEvent::AgentUpdated {
                    new_agent: agent_id,
                });

                let span =
                    self.span(|| info_span!("agent", name = agent.name()));
                let next_step =
                    self.run_agent(agent_id, &agent).instrument(span).await?;
                match next_step {
                    NextStep::Handoff(target) => {
                        self.current_agent = target;
                        self.report_progress();
                    }
                    NextStep::FinalOutput(output) => {
                        return self.finish(agent_id, &agent, output).await;
                    }
                    NextStep::RunAgain => {}
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs turns of `agent` until it produces the final output or hands
    /// off.
    async fn run_agent(
        &mut self,
        agent_id: AgentId,
        agent: &Arc<Agent>,
    ) -> Result<NextStep> {
        let mut should_run_agent_start_hooks = true;
        loop {
            self.current_turn += 1;
            if self.current_turn > self.config.max_turns {
                error!("max turns ({}) exceeded", self.config.max_turns);
                return Err(Error::MaxTurnsExceeded {
                    max_turns: self.config.max_turns,
                    details: Box::new(self.error_details()),
                });
            }
            self.report_progress();

            debug!("turn {} of `{}`", self.current_turn, agent.name());
            let turn = self.current_turn;
            let span = self.span(|| info_span!("turn", turn));
            let step = self
                .run_turn(agent_id, agent, should_run_agent_start_hooks)
                .instrument(span)
                .await?;
            should_run_agent_start_hooks = false;

            self.original_input = step.original_input;
            self.raw_responses.push(step.model_response);
            self.generated_items = step.pre_step_items;
            self.generated_items.extend(step.new_step_items);

            match step.next_step {
                NextStep::RunAgain => trace!("running again"),
                next_step => return Ok(next_step),
            }
        }
    }

    async fn run_turn(
        &mut self,
        agent_id: AgentId,
        agent: &Arc<Agent>,
        run_start_hooks: bool,
    ) -> Result<SingleStepResult> {
        if run_start_hooks {
            self.hooks.agent_start(&self.ctx, agent).await;
        }

        let tools = agent.all_tools(&self.ctx).await?;
        let handoffs = agent.enabled_handoffs(&self.graph, &self.ctx).await?;
        let model = self.resolve_model(agent)?;
        let req =
            self.build_request(agent_id, agent, &tools, &handoffs).await;

        let response = if self.current_turn == 1 {
            // Input guardrails only check the run input, alongside the
            // first model call.
            let guardrails: Vec<InputGuardrail> = agent
                .input_guardrails()
                .iter()
                .chain(&self.config.input_guardrails)
                .cloned()
                .collect();
            let (results, response) = tokio::try_join!(
                run_input_guardrails(
                    &guardrails,
                    &self.ctx,
                    agent,
                    &self.original_input,
                    self.config.tracing_disabled,
                ),
                self.call_model(&model, req),
            )?;
            self.input_guardrail_results = results;
            response
        } else {
            self.call_model(&model, req).await?
        };

        let processed = process_model_response(
            agent_id,
            agent,
            &response.output,
            &tools,
            &handoffs,
        )?;
        if !processed.tools_used.is_empty() {
            self.agents_used_tools.insert(agent_id);
        }
        self.resolve_step(agent_id, agent, response, processed).await
    }

    async fn resolve_step(
        &self,
        agent_id: AgentId,
        agent: &Arc<Agent>,
        model_response: ModelResponse,
        processed: ProcessedResponse,
    ) -> Result<SingleStepResult> {
        let pre_step_items = self.generated_items.clone();
        let mut new_step_items = vec![];
        for item in &processed.new_items {
            self.record(&mut new_step_items, item.clone());
        }

        let function_results = self
            .execute_function_tools(agent_id, agent, &processed.functions)
            .await?;
        for result in &function_results {
            self.record(&mut new_step_items, result.run_item.clone());
        }
        let computer_items = self
            .execute_computer_actions(
                agent_id,
                agent,
                &processed.computer_actions,
            )
            .await?;
        for item in computer_items {
            self.record(&mut new_step_items, item);
        }

        // A handoff wins over any final output of the same turn.
        if let Some((run, ignored)) = processed.handoffs.split_first() {
            return self
                .execute_handoffs(
                    agent_id,
                    agent,
                    run,
                    ignored,
                    model_response,
                    pre_step_items,
                    new_step_items,
                )
                .await;
        }

        let next_step = if let Some(output) =
            self.check_tool_final_output(agent, &function_results).await
        {
            NextStep::FinalOutput(output)
        } else if processed.has_tools_to_run() {
            NextStep::RunAgain
        } else if let Some(text) = processed.last_message_text() {
            let output = match agent.output_schema() {
                Some(schema) => schema.validate_json(&text)?,
                None => Value::String(text),
            };
            NextStep::FinalOutput(output)
        } else {
            NextStep::RunAgain
        };

        if let NextStep::FinalOutput(output) = &next_step {
            self.hooks.agent_end(&self.ctx, agent, output).await;
        }

        Ok(SingleStepResult {
            original_input: self.original_input.clone(),
            model_response,
            pre_step_items,
            new_step_items,
            next_step,
        })
    }

    async fn execute_function_tools(
        &self,
        agent_id: AgentId,
        agent: &Agent,
        runs: &[ToolRunFunction],
    ) -> Result<Vec<FunctionToolResult>> {
        // Tools run concurrently, results keep the order of the calls.
        try_join_all(runs.iter().map(|run| {
            let span =
                self.span(|| info_span!("tool", name = run.tool.name()));
            self.run_function_tool(agent_id, agent, run).instrument(span)
        }))
        .await
    }

    async fn run_function_tool(
        &self,
        agent_id: AgentId,
        agent: &Agent,
        run: &ToolRunFunction,
    ) -> Result<FunctionToolResult> {
        let name = run.tool.name();
        if self.config.trace_include_sensitive_data {
            trace!("calling `{name}` with {}", run.call.arguments);
        } else {
            trace!("calling `{name}`");
        }

        self.hooks.tool_start(&self.ctx, agent, name).await;
        let output =
            run.tool.invoke(self.ctx.clone(), &run.call.arguments).await?;
        self.hooks.tool_end(&self.ctx, agent, name, &output).await;

        if self.config.trace_include_sensitive_data {
            trace!("`{name}` returned {output}");
        }
        let call_id = run.call.call_id.clone();
        let raw = Item::function_call_output(call_id, output.clone());
        Ok(FunctionToolResult {
            tool_name: name.to_owned(),
            output: output.clone(),
            run_item: RunItem::ToolCallOutput {
                agent: agent_id,
                raw,
                output,
            },
        })
    }

    async fn execute_computer_actions(
        &self,
        agent_id: AgentId,
        agent: &Agent,
        runs: &[ToolRunComputerAction],
    ) -> Result<Vec<RunItem>> {
        let mut items = Vec::with_capacity(runs.len());
        // Actions run one by one, they share the same screen.
        for run in runs {
            self.hooks
                .tool_start(&self.ctx, agent, COMPUTER_TOOL_NAME)
                .await;
            let image_url =
                run.tool.perform(&run.call.action).await.map_err(|err| {
                    error!("computer action failed: {err}");
                    Error::Tool {
                        tool_name: COMPUTER_TOOL_NAME.to_owned(),
                        source: err,
                    }
                })?;
            self.hooks
                .tool_end(&self.ctx, agent, COMPUTER_TOOL_NAME, &image_url)
                .await;

            let raw = Item::ComputerCallOutput(ComputerCallOutputItem {
                call_id: run.call.call_id.clone(),
                image_url: image_url.clone(),
            });
            items.push(RunItem::ToolCallOutput {
                agent: agent_id,
                raw,
                output: image_url,
            });
        }
        Ok(items)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_handoffs(
        &self,
        agent_id: AgentId,
        agent: &Arc<Agent>,
        run: &ToolRunHandoff,
        ignored: &[ToolRunHandoff],
        model_response: ModelResponse,
        pre_step_items: Vec<RunItem>,
        mut new_step_items: Vec<RunItem>,
    ) -> Result<SingleStepResult> {
        for extra in ignored {
            warn!(
                "multiple handoffs detected, ignoring `{}`",
                extra.handoff.tool_name()
            );
            let raw = Item::function_call_output(
                extra.call.call_id.clone(),
                MULTIPLE_HANDOFFS_OUTPUT,
            );
            self.record(
                &mut new_step_items,
                RunItem::ToolCallOutput {
                    agent: agent_id,
                    raw,
                    output: MULTIPLE_HANDOFFS_OUTPUT.to_owned(),
                },
            );
        }

        let span = self.span(|| {
            info_span!(
                "handoff",
                from = agent.name(),
                to = run.handoff.target_name()
            )
        });
        let target = run
            .handoff
            .invoke(self.ctx.clone(), &run.call.arguments)
            .instrument(span)
            .await?;
        let target_agent = self.graph.resolve(target)?;
        debug!("`{}` hands off to `{}`", agent.name(), target_agent.name());

        self.record(
            &mut new_step_items,
            RunItem::HandoffOutput {
                agent: agent_id,
                raw: FunctionCallOutputItem {
                    call_id: run.call.call_id.clone(),
                    output: run.handoff.transfer_output(),
                },
                source: agent_id,
                target,
            },
        );
        self.hooks.handoff(&self.ctx, agent, target_agent).await;

        let filter = run
            .handoff
            .input_filter()
            .or(self.config.handoff_input_filter.as_ref());
        let data = HandoffInputData {
            input_history: self.original_input.clone(),
            pre_handoff_items: pre_step_items,
            new_items: new_step_items,
        };
        let data = match filter {
            Some(filter) => {
                trace!("filtering the input of `{}`", target_agent.name());
                filter(data)
            }
            None => data,
        };

        Ok(SingleStepResult {
            original_input: data.input_history,
            model_response,
            pre_step_items: data.pre_handoff_items,
            new_step_items: data.new_items,
            next_step: NextStep::Handoff(target),
        })
    }

    async fn check_tool_final_output(
        &self,
        agent: &Agent,
        results: &[FunctionToolResult],
    ) -> Option<Value> {
        let first = results.first()?;
        match agent.tool_use_behavior() {
            ToolUseBehavior::RunLlmAgain => None,
            ToolUseBehavior::StopOnFirstTool => {
                Some(Value::String(first.output.clone()))
            }
            ToolUseBehavior::StopAtTools(names) => results
                .iter()
                .find(|result| names.contains(&result.tool_name))
                .map(|result| Value::String(result.output.clone())),
            ToolUseBehavior::Custom(f) => {
                let decision = f(self.ctx.clone(), results.to_vec()).await;
                if !decision.is_final_output {
                    return None;
                }
                Some(decision.final_output.unwrap_or(Value::Null))
            }
        }
    }

    async fn finish(
        self,
        agent_id: AgentId,
        agent: &Arc<Agent>,
        output: Value,
    ) -> Result<RunResult> {
        let guardrails: Vec<OutputGuardrail> = agent
            .output_guardrails()
            .iter()
            .chain(&self.config.output_guardrails)
            .cloned()
            .collect();
        let output_guardrail_results = run_output_guardrails(
            &guardrails,
            &self.ctx,
            agent,
            agent_id,
            &output,
            self.config.tracing_disabled,
        )
        .await?;

        debug!("run finished with `{}`", agent.name());
        Ok(RunResult {
            input: self.original_input,
            new_items: self.generated_items,
            raw_responses: self.raw_responses,
            final_output: output,
            input_guardrail_results: self.input_guardrail_results,
            output_guardrail_results,
            last_agent_id: agent_id,
            context: self.ctx,
            graph: self.graph,
        })
    }

    async fn build_request(
        &self,
        agent_id: AgentId,
        agent: &Agent,
        tools: &ToolSet,
        handoffs: &[Handoff],
    ) -> ModelRequest {
        let mut settings =
            agent.model_settings().resolve(self.config.model_settings.as_ref());
        let forced = matches!(
            settings.tool_choice,
            Some(ToolChoice::Required | ToolChoice::Function(_))
        );
        if forced
            && agent.reset_tool_choice()
            && self.agents_used_tools.contains(&agent_id)
        {
            debug!("resetting the tool choice of `{}`", agent.name());
            settings.tool_choice = None;
        }

        let input = self
            .original_input
            .iter()
            .cloned()
            .chain(self.generated_items.iter().map(RunItem::to_input_item))
            .collect();

        ModelRequest {
            instructions: agent.system_prompt(&self.ctx).await,
            input,
            settings,
            tools: tools.specs(),
            output_schema: agent.output_schema().map(OutputSchema::spec),
            handoffs: handoffs.iter().map(Handoff::spec).collect(),
            tracing: self.config.model_tracing(),
        }
    }

    fn resolve_model(&self, agent: &Agent) -> Result<ModelClient> {
        let selector = self.config.model.as_ref().unwrap_or(agent.model());
        let name = match selector {
            AgentModel::Instance(client) => return Ok(client.clone()),
            AgentModel::Named(name) => Some(name.as_str()),
            AgentModel::Default => None,
        };
        let provider = self.config.model_provider.as_ref().ok_or_else(|| {
            Error::user(format!(
                "agent `{}` needs a model provider to resolve its model",
                agent.name()
            ))
        })?;
        provider.get_model(name)
    }

    async fn call_model(
        &self,
        model: &ModelClient,
        req: ModelRequest,
    ) -> Result<ModelResponse> {
        let response = match &self.sink {
            Some(sink) => {
                let sink = sink.clone();
                model
                    .stream_response(req, move |event| {
                        sink.emit(StreamEvent::RawResponse(event));
                    })
                    .await?
            }
            None => model.get_response(req).await?,
        };
        self.ctx.add_usage(&response.usage);
        Ok(response)
    }

    fn record(&self, items: &mut Vec<RunItem>, item: RunItem) {
        if let Some(sink) = &self.sink {
            sink.emit(StreamEvent::run_item(item.clone()));
        }
        items.push(item);
    }

    #[inline]
    fn emit(&self, event: StreamEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    #[inline]
    fn report_progress(&self) {
        if let Some(sink) = &self.sink {
            sink.set_progress(self.current_agent, self.current_turn);
        }
    }

    #[inline]
    fn span(&self, make_span: impl FnOnce() -> Span) -> Span {
        if self.config.tracing_disabled {
            Span::none()
        } else {
            make_span()
        }
    }

    fn error_details(&self) -> RunErrorDetails {
        RunErrorDetails {
            input: self.original_input.clone(),
            new_items: self.generated_items.clone(),
            raw_responses: self.raw_responses.clone(),
            last_agent: self.current_agent,
            input_guardrail_results: self.input_guardrail_results.clone(),
        }
    }
}
