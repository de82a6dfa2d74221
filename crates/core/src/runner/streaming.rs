use std::sync::Arc;

use parking_lot::Mutex;
use tandem_model::ResponseStreamEvent;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use super::RunResult;
use super::engine::RunEngine;
use crate::agent::AgentId;
use crate::items::RunItem;
use crate::{Error, Result};

/// An event of a streamed run.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// An event from the model, passed through untouched.
    RawResponse(ResponseStreamEvent),
    /// An item was generated.
    RunItem {
        /// The event name, e.g. `tool_called`, see [`RunItem::event_name`].
        name: &'static str,
        /// The item.
        item: RunItem,
    },
    /// An agent started running.
    AgentUpdated {
        /// The running agent.
        new_agent: AgentId,
    },
}

impl StreamEvent {
    #[inline]
    pub(crate) fn run_item(item: RunItem) -> Self {
        StreamEvent::RunItem {
            name: item.event_name(),
            item,
        }
    }
}

pub(crate) enum StreamMessage {
    Event(StreamEvent),
    Done(Box<Result<RunResult>>),
    Cancelled,
}

#[derive(Clone, Copy)]
struct Progress {
    current_agent: AgentId,
    current_turn: usize,
    complete: bool,
}

/// The producer side of a streamed run.
#[derive(Clone)]
pub(crate) struct StreamSink {
    tx: mpsc::UnboundedSender<StreamMessage>,
    progress: Arc<Mutex<Progress>>,
}

impl StreamSink {
    #[inline]
    pub fn emit(&self, event: StreamEvent) {
        // The consumer may be gone, the run winds down on its own.
        self.tx.send(StreamMessage::Event(event)).ok();
    }

    #[inline]
    pub fn set_progress(&self, current_agent: AgentId, current_turn: usize) {
        let mut progress = self.progress.lock();
        progress.current_agent = current_agent;
        progress.current_turn = current_turn;
    }
}

async fn cancelled(kill_rx: &mut watch::Receiver<bool>) {
    // Dropping the handle cancels the run as well.
    let _ = kill_rx.wait_for(|killed| *killed).await;
}

/// A run executing in the background, publishing its events as they
/// happen.
///
/// Events are delivered in emission order. When the run fails, the error
/// is returned by [`Self::next_event`] after every event produced before
/// the failure.
pub struct RunResultStreaming {
    rx: mpsc::UnboundedReceiver<StreamMessage>,
    kill_tx: watch::Sender<bool>,
    progress: Arc<Mutex<Progress>>,
    result: Option<RunResult>,
    finished: bool,
}

impl RunResultStreaming {
    pub(crate) fn start<F>(starting_agent: AgentId, make_engine: F) -> Self
    where
        F: FnOnce(StreamSink) -> RunEngine,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (kill_tx, mut kill_rx) = watch::channel(false);
        let progress = Arc::new(Mutex::new(Progress {
            current_agent: starting_agent,
            current_turn: 0,
            complete: false,
        }));

        let engine = make_engine(StreamSink {
            tx: tx.clone(),
            progress: Arc::clone(&progress),
        });
        let task_progress = Arc::clone(&progress);
        tokio::spawn(
            async move {
                let msg = tokio::select! {
                    biased;
                    _ = cancelled(&mut kill_rx) => {
                        debug!("streamed run cancelled");
                        StreamMessage::Cancelled
                    }
                    result = engine.run() => {
                        StreamMessage::Done(Box::new(result))
                    }
                };
                task_progress.lock().complete = true;
                tx.send(msg).ok();
            }
            .in_current_span(),
        );

        Self {
            rx,
            kill_tx,
            progress,
            result: None,
            finished: false,
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the run completed or was cancelled, and the
    /// run's error once, after the events that preceded it.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(StreamMessage::Event(event)) => Ok(Some(event)),
            Some(StreamMessage::Done(result)) => {
                self.finished = true;
                self.result = Some((*result)?);
                Ok(None)
            }
            Some(StreamMessage::Cancelled) | None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Stops the run. Pending events are discarded.
    pub fn cancel(&mut self) {
        self.kill_tx.send(true).ok();
        self.finished = true;
    }

    /// Returns `true` once the run stopped.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.finished || self.progress.lock().complete
    }

    /// Returns the agent currently running.
    #[inline]
    pub fn current_agent(&self) -> AgentId {
        self.progress.lock().current_agent
    }

    /// Returns the number of turns started so far.
    #[inline]
    pub fn current_turn(&self) -> usize {
        self.progress.lock().current_turn
    }

    /// Returns the result once the run completed successfully and every
    /// event was consumed.
    #[inline]
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Drains the remaining events and returns the result.
    ///
    /// A cancelled run fails with [`Error::Cancelled`].
    pub async fn into_result(mut self) -> Result<RunResult> {
        while self.next_event().await?.is_some() {}
        self.result.ok_or(Error::Cancelled)
    }
}
