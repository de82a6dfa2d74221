use bytes::Bytes;
use serde_json::Value;
use tandem_core::AgentId;
use tandem_core::guardrail::OutputGuardrailResult;

use crate::items::RealtimeItem;
use crate::transport::RealtimeModelEvent;

/// An event of a realtime session.
#[derive(Clone, Debug)]
pub enum RealtimeSessionEvent {
    /// The model started responding as `agent`.
    AgentStart {
        /// The responding agent.
        agent: AgentId,
    },
    /// The model finished responding as `agent`.
    AgentEnd {
        /// The responding agent.
        agent: AgentId,
    },
    /// Control moved to another agent.
    Handoff {
        /// The agent handing off.
        from: AgentId,
        /// The agent taking over.
        to: AgentId,
    },
    /// A tool started running.
    ToolStart {
        /// The agent owning the tool.
        agent: AgentId,
        /// Name of the tool.
        tool_name: String,
    },
    /// A tool finished running.
    ToolEnd {
        /// The agent owning the tool.
        agent: AgentId,
        /// Name of the tool.
        tool_name: String,
        /// What the tool returned.
        output: String,
    },
    /// A chunk of audio produced by the model.
    Audio {
        /// The item the audio belongs to.
        item_id: String,
        /// The content part the audio belongs to.
        content_index: usize,
        /// Raw audio.
        audio: Bytes,
    },
    /// The model finished producing the audio of a content part.
    AudioEnd {
        /// The item the audio belongs to.
        item_id: String,
        /// The content part the audio belongs to.
        content_index: usize,
    },
    /// The audio of the model was cut short.
    AudioInterrupted {
        /// The item the audio belongs to.
        item_id: String,
        /// The content part the audio belongs to.
        content_index: usize,
    },
    /// An error that did not end the session.
    Error {
        /// The error, as reported by the transport or a guardrail.
        error: Value,
    },
    /// An item was added to the history.
    HistoryAdded {
        /// The new item.
        item: RealtimeItem,
    },
    /// The history changed.
    HistoryUpdated {
        /// The whole history.
        history: Vec<RealtimeItem>,
    },
    /// Output guardrails tripped on what the model was saying. The
    /// response was interrupted.
    GuardrailTripped {
        /// The tripped guardrails.
        results: Vec<OutputGuardrailResult>,
        /// The transcript that tripped them.
        message: String,
    },
    /// An event of the transport, passed through untouched.
    RawModelEvent(RealtimeModelEvent),
}
