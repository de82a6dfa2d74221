use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tandem_core::guardrail::{
    OutputGuardrail, OutputGuardrailResult, guardrail_span,
};
use tandem_core::handoff::Handoff;
use tandem_core::tool::AgentTool;
use tandem_core::{Agent, AgentGraph, AgentId, RunContext};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use crate::config::{RealtimeRunConfig, RealtimeSessionSettings};
use crate::events::RealtimeSessionEvent;
use crate::history::History;
use crate::transport::{
    RealtimeModel, RealtimeModelEvent, RealtimeModelListener,
    RealtimeModelSendEvent, RealtimeToolCall,
};
use crate::{Error, Result};

type GuardrailResults = Vec<tandem_core::Result<OutputGuardrailResult>>;

pub(crate) enum Message {
    Model(RealtimeModelEvent),
    GuardrailsEvaluated {
        transcript: String,
        results: GuardrailResults,
    },
    TaskEnded(u64),
}

pub(crate) enum SessionMessage {
    Event(RealtimeSessionEvent),
    Failed(Error),
}

/// State read by the session handle.
pub(crate) struct Shared {
    pub history: History,
    pub current_agent: AgentId,
}

/// Forwards transport events to the session loop.
pub(crate) struct Listener {
    pub tx: mpsc::UnboundedSender<Message>,
}

impl RealtimeModelListener for Listener {
    fn on_event(&self, event: RealtimeModelEvent) {
        // The loop is gone once the session closed.
        self.tx.send(Message::Model(event)).ok();
    }
}

pub(crate) fn resolve_agent(
    graph: &AgentGraph,
    id: AgentId,
) -> Result<&Arc<Agent>> {
    graph.get(id).ok_or_else(|| {
        let message = format!("agent {id:?} is not in the graph");
        Error::Core(tandem_core::Error::User(message))
    })
}

/// Computes the session settings presenting `agent_id` to the model.
pub(crate) async fn session_settings(
    graph: &AgentGraph,
    agent_id: AgentId,
    ctx: &RunContext,
    config: &RealtimeRunConfig,
) -> Result<RealtimeSessionSettings> {
    let agent = resolve_agent(graph, agent_id)?;
    let tools = agent.all_tools(ctx).await?;
    let handoffs = agent.enabled_handoffs(graph, ctx).await?;
    let tools = tools
        .tools()
        .iter()
        .filter_map(|tool| match tool {
            AgentTool::Function(tool) => Some(tool.spec()),
            _ => None,
        })
        .collect();

    let agent_settings = RealtimeSessionSettings {
        instructions: agent.system_prompt(ctx).await,
        tools: Some(tools),
        handoffs: Some(handoffs.iter().map(Handoff::spec).collect()),
        ..Default::default()
    };
    let base = config.model_settings.clone().unwrap_or_default();
    Ok(base.resolve(Some(&agent_settings)))
}

/// The session loop. Owns every piece of mutable session state, events
/// and the results of background tasks are applied one at a time.
pub(crate) struct SessionState {
    pub graph: Arc<AgentGraph>,
    pub config: RealtimeRunConfig,
    pub ctx: RunContext,
    pub model: Arc<dyn RealtimeModel>,
    pub listener: Arc<dyn RealtimeModelListener>,
    pub shared: Arc<Mutex<Shared>>,
    pub current_agent: AgentId,
    pub item_transcripts: HashMap<String, String>,
    pub guardrail_run_counts: HashMap<String, usize>,
    pub interrupted_by_guardrail: bool,
    pub next_task_id: u64,
    pub running_tasks: HashMap<u64, JoinHandle<()>>,
    pub msg_tx: mpsc::UnboundedSender<Message>,
    pub events_tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionState {
    pub async fn run(
        mut self,
        mut msg_rx: mpsc::UnboundedReceiver<Message>,
        mut kill_rx: watch::Receiver<bool>,
    ) {
        debug!("start receiving events");
        let mut failure = None;
        loop {
            // Closing or dropping the handle stops the loop.
            let msg = tokio::select! {
                biased;
                _ = kill_rx.changed() => break,
                msg = msg_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            let result = tokio::select! {
                biased;
                _ = kill_rx.changed() => break,
                result = self.handle_message(msg) => result,
            };
            if let Err(err) = result {
                error!("got an error: {err:?}");
                failure = Some(err);
                break;
            }
        }

        self.cleanup().await;
        if let Some(err) = failure {
            self.events_tx.send(SessionMessage::Failed(err)).ok();
        }
    }

    async fn handle_message(&mut self, msg: Message) -> Result<()> {
        match msg {
            Message::Model(event) => self.on_model_event(event).await,
            Message::GuardrailsEvaluated {
                transcript,
                results,
            } => self.on_guardrails_evaluated(transcript, results).await,
            Message::TaskEnded(task_id) => {
                if self.running_tasks.remove(&task_id).is_none() {
                    warn!("task {task_id} ended twice");
                }
                Ok(())
            }
        }
    }

    async fn on_model_event(
        &mut self,
        event: RealtimeModelEvent,
    ) -> Result<()> {
        self.emit(RealtimeSessionEvent::RawModelEvent(event.clone()));
        match event {
            RealtimeModelEvent::Audio {
                item_id,
                content_index,
                data,
            } => self.emit(RealtimeSessionEvent::Audio {
                item_id,
                content_index,
                audio: data,
            }),
            RealtimeModelEvent::AudioDone {
                item_id,
                content_index,
            } => self.emit(RealtimeSessionEvent::AudioEnd {
                item_id,
                content_index,
            }),
            RealtimeModelEvent::AudioInterrupted {
                item_id,
                content_index,
            } => self.emit(RealtimeSessionEvent::AudioInterrupted {
                item_id,
                content_index,
            }),
            RealtimeModelEvent::Error { error } => {
                warn!("transport reported an error: {error}");
                self.emit(RealtimeSessionEvent::Error { error });
            }
            RealtimeModelEvent::ItemUpdated(item) => {
                let is_new = self.shared.lock().history.upsert(item.clone());
                if is_new {
                    self.emit(RealtimeSessionEvent::HistoryAdded { item });
                } else {
                    self.emit_history();
                }
            }
            RealtimeModelEvent::ItemDeleted { item_id } => {
                self.shared.lock().history.remove(&item_id);
                self.emit_history();
            }
            RealtimeModelEvent::InputAudioTranscriptionCompleted {
                item_id,
                transcript,
            } => {
                let mut shared = self.shared.lock();
                if !shared.history.merge_transcript(&item_id, &transcript) {
                    debug!("no user message {item_id} to transcribe");
                }
                drop(shared);
                self.emit_history();
            }
            RealtimeModelEvent::TranscriptDelta { item_id, delta, .. } => {
                self.on_transcript_delta(item_id, &delta);
            }
            RealtimeModelEvent::ToolCall(call) => {
                self.on_tool_call(call).await?;
            }
            RealtimeModelEvent::TurnStarted => {
                let agent = self.current_agent;
                self.emit(RealtimeSessionEvent::AgentStart { agent });
            }
            RealtimeModelEvent::TurnEnded => {
                self.item_transcripts.clear();
                self.guardrail_run_counts.clear();
                self.interrupted_by_guardrail = false;
                let agent = self.current_agent;
                self.emit(RealtimeSessionEvent::AgentEnd { agent });
            }
            RealtimeModelEvent::ConnectionStatus(status) => {
                debug!("connection status: {status:?}");
            }
            RealtimeModelEvent::Other(_) => {}
        }
        Ok(())
    }

    fn on_transcript_delta(&mut self, item_id: String, delta: &str) {
        let transcript =
            self.item_transcripts.entry(item_id.clone()).or_default();
        transcript.push_str(delta);
        let run_count = self.guardrail_run_counts.entry(item_id).or_default();

        let threshold = (*run_count + 1) * self.config.debounce_text_length;
        if transcript.chars().count() >= threshold {
            *run_count += 1;
            let transcript = transcript.clone();
            self.spawn_guardrails(transcript);
        }
    }

    fn spawn_guardrails(&mut self, transcript: String) {
        let agent_id = self.current_agent;
        let Some(agent) = self.graph.get(agent_id).cloned() else {
            return;
        };
        let guardrails: Vec<OutputGuardrail> = agent
            .output_guardrails()
            .iter()
            .chain(&self.config.output_guardrails)
            .cloned()
            .collect();
        if guardrails.is_empty() {
            return;
        }

        trace!("checking {} chars of transcript", transcript.len());
        let ctx = self.ctx.clone();
        let tx = self.msg_tx.clone();
        let tracing_disabled = self.config.tracing_disabled;
        self.spawn_task(async move {
            let output = Value::String(transcript.clone());
            let results = join_all(guardrails.iter().map(|guardrail| {
                let span = guardrail_span(guardrail.name(), tracing_disabled);
                let agent = Arc::clone(&agent);
                guardrail
                    .run(ctx.clone(), agent, agent_id, output.clone())
                    .instrument(span)
            }))
            .await;
            tx.send(Message::GuardrailsEvaluated {
                transcript,
                results,
            })
            .ok();
        });
    }

    async fn on_guardrails_evaluated(
        &mut self,
        transcript: String,
        results: GuardrailResults,
    ) -> Result<()> {
        let mut tripped = vec![];
        for result in results {
            match result {
                Ok(result) if result.output.tripwire_triggered => {
                    tripped.push(result);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("got an error: {err:?}");
                    let error = json!({ "message": err.to_string() });
                    self.emit(RealtimeSessionEvent::Error { error });
                }
            }
        }
        // One interruption per turn.
        if tripped.is_empty() || self.interrupted_by_guardrail {
            return Ok(());
        }
        self.interrupted_by_guardrail = true;

        let names = tripped
            .iter()
            .map(|result| result.guardrail.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        warn!("output guardrails triggered: {names}");
        self.emit(RealtimeSessionEvent::GuardrailTripped {
            results: tripped,
            message: transcript,
        });
        self.model.interrupt().await.map_err(Error::transport)?;
        self.model
            .send_message(&format!("guardrail triggered: {names}"))
            .await
            .map_err(Error::transport)
    }

    async fn on_tool_call(&mut self, call: RealtimeToolCall) -> Result<()> {
        let agent_id = self.current_agent;
        let agent = Arc::clone(resolve_agent(&self.graph, agent_id)?);
        let tools = agent.all_tools(&self.ctx).await?;

        if let Some(tool) = tools.function(&call.name) {
            self.emit(RealtimeSessionEvent::ToolStart {
                agent: agent_id,
                tool_name: call.name.clone(),
            });
            let span = self.span(|| info_span!("tool", name = %call.name));
            let output = tool
                .invoke(self.ctx.clone(), &call.arguments)
                .instrument(span)
                .await?;
            let tool_name = call.name.clone();
            self.model
                .send_tool_output(call, output.clone(), true)
                .await
                .map_err(Error::transport)?;
            self.emit(RealtimeSessionEvent::ToolEnd {
                agent: agent_id,
                tool_name,
                output,
            });
            return Ok(());
        }

        let handoffs = agent.enabled_handoffs(&self.graph, &self.ctx).await?;
        let Some(handoff) = handoffs
            .iter()
            .find(|handoff| handoff.tool_name() == call.name)
        else {
            let message = format!("Tool {} not found", call.name);
            return Err(tandem_core::Error::ModelBehavior(message).into());
        };

        let span =
            self.span(|| info_span!("handoff", to = handoff.target_name()));
        let next_agent = handoff
            .invoke(self.ctx.clone(), &call.arguments)
            .instrument(span)
            .await?;
        let settings =
            session_settings(&self.graph, next_agent, &self.ctx, &self.config)
                .await?;
        debug!("handing off to {}", handoff.target_name());
        self.current_agent = next_agent;
        self.shared.lock().current_agent = next_agent;

        self.model
            .send_event(RealtimeModelSendEvent::SessionUpdate(Box::new(
                settings,
            )))
            .await
            .map_err(Error::transport)?;
        self.emit(RealtimeSessionEvent::Handoff {
            from: agent_id,
            to: next_agent,
        });
        self.model
            .send_tool_output(call, handoff.transfer_output(), true)
            .await
            .map_err(Error::transport)
    }

    fn spawn_task<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let tx = self.msg_tx.clone();
        let task = tokio::spawn(
            async move {
                fut.await;
                tx.send(Message::TaskEnded(task_id)).ok();
            }
            .in_current_span(),
        );
        self.running_tasks.insert(task_id, task);
    }

    async fn cleanup(&mut self) {
        for (_, task) in self.running_tasks.drain() {
            task.abort();
        }
        self.model.remove_listener(&self.listener);
        self.model.close().await;
        debug!("realtime session closed");
    }

    #[inline]
    #[inline]
    fn span(&self, make_span: impl FnOnce() -> Span) -> Span {
        if self.config.tracing_disabled {
            Span::none()
        } else {
            make_span()
        }
    }

    fn emit(&self, event: RealtimeSessionEvent) {
        // The handle may be gone, the loop stops on its own.
        self.events_tx.send(SessionMessage::Event(event)).ok();
    }

    fn emit_history(&self) {
        let history = self.shared.lock().history.items().to_vec();
        self.emit(RealtimeSessionEvent::HistoryUpdated { history });
    }
}
