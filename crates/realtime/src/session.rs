mod state;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tandem_core::{AgentGraph, AgentId, RunContext};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use self::state::{
    Listener, SessionMessage, SessionState, Shared, resolve_agent,
    session_settings,
};
use crate::config::{RealtimeModelConfig, RealtimeRunConfig};
use crate::events::RealtimeSessionEvent;
use crate::history::History;
use crate::items::RealtimeItem;
use crate::transport::{
    RealtimeModel, RealtimeModelListener, RealtimeModelSendEvent,
};
use crate::{Error, Result};

/// A connected realtime session.
///
/// Transport events are processed in the background: tool calls are
/// executed, handoffs switch the current agent, and the model's transcript
/// is checked against the output guardrails every
/// [`debounce_text_length`](RealtimeRunConfig::debounce_text_length)
/// characters. What happens is reported by [`Self::next_event`].
///
/// Dropping the session closes it.
pub struct RealtimeSession {
    model: Arc<dyn RealtimeModel>,
    events_rx: mpsc::UnboundedReceiver<SessionMessage>,
    kill_tx: watch::Sender<bool>,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl RealtimeSession {
    pub(crate) async fn connect(
        graph: Arc<AgentGraph>,
        starting_agent: AgentId,
        model: Arc<dyn RealtimeModel>,
        config: RealtimeRunConfig,
        ctx: RunContext,
    ) -> Result<Self> {
        let span = if config.tracing_disabled {
            Span::none()
        } else {
            let agent = resolve_agent(&graph, starting_agent)?;
            info_span!("realtime session", agent = agent.name())
        };
        let initial_settings =
            session_settings(&graph, starting_agent, &ctx, &config).await?;

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn RealtimeModelListener> = Arc::new(Listener {
            tx: msg_tx.clone(),
        });
        model.add_listener(Arc::clone(&listener));
        let model_config = RealtimeModelConfig {
            api_key: config.api_key.clone(),
            url: config.url.clone(),
            initial_settings,
        };
        if let Err(err) = model.connect(model_config).await {
            model.remove_listener(&listener);
            return Err(Error::transport(err));
        }
        debug!("realtime session connected");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let shared = Arc::new(Mutex::new(Shared {
            history: History::new(),
            current_agent: starting_agent,
        }));
        let state = SessionState {
            graph,
            config,
            ctx,
            model: Arc::clone(&model),
            listener,
            shared: Arc::clone(&shared),
            current_agent: starting_agent,
            item_transcripts: HashMap::new(),
            guardrail_run_counts: HashMap::new(),
            interrupted_by_guardrail: false,
            next_task_id: 0,
            running_tasks: HashMap::new(),
            msg_tx,
            events_tx,
        };
        let task = tokio::spawn(state.run(msg_rx, kill_rx).instrument(span));

        Ok(Self {
            model,
            events_rx,
            kill_tx,
            shared,
            task: Some(task),
            closed: false,
        })
    }

    /// Sends a text message of the user.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.model.send_message(text).await.map_err(Error::transport)
    }

    /// Sends a chunk of the user's audio. `commit` ends the user's turn.
    pub async fn send_audio(&self, audio: Bytes, commit: bool) -> Result<()> {
        self.ensure_open()?;
        self.model
            .send_audio(audio, commit)
            .await
            .map_err(Error::transport)
    }

    /// Stops the model's current response.
    pub async fn interrupt(&self) -> Result<()> {
        self.ensure_open()?;
        self.model.interrupt().await.map_err(Error::transport)
    }

    /// Sends an event in the transport's own format.
    pub async fn send_raw(&self, event: Value) -> Result<()> {
        self.ensure_open()?;
        self.model
            .send_event(RealtimeModelSendEvent::Raw(event))
            .await
            .map_err(Error::transport)
    }

    /// Returns a snapshot of the conversation history.
    pub fn history(&self) -> Vec<RealtimeItem> {
        self.shared.lock().history.items().to_vec()
    }

    /// Returns the agent the model currently speaks as.
    #[inline]
    pub fn current_agent(&self) -> AgentId {
        self.shared.lock().current_agent
    }

    /// Returns `true` once the session stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed || self.kill_tx.is_closed()
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the session is closed. An error that ended
    /// the session is returned once, after the events that preceded it,
    /// and after the transport was closed.
    pub async fn next_event(&mut self) -> Result<Option<RealtimeSessionEvent>> {
        if self.closed {
            return Ok(None);
        }
        match self.events_rx.recv().await {
            Some(SessionMessage::Event(event)) => Ok(Some(event)),
            Some(SessionMessage::Failed(err)) => {
                self.closed = true;
                Err(err)
            }
            None => {
                self.closed = true;
                Ok(None)
            }
        }
    }

    /// Closes the session: running guardrail checks are cancelled and the
    /// transport is closed. Pending events are discarded.
    ///
    /// Closing an already closed session does nothing.
    pub async fn close(&mut self) {
        self.closed = true;
        let Some(task) = self.task.take() else {
            return;
        };
        self.kill_tx.send(true).ok();
        if let Err(err) = task.await {
            warn!("got an error: {err:?}");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }
}
