//! The contract between a session and the connection to a realtime model.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::config::{RealtimeModelConfig, RealtimeSessionSettings};
use crate::items::RealtimeItem;

/// An error reported by a transport.
pub type TransportError = Box<dyn StdError + Send + Sync>;

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct RealtimeToolCall {
    /// ID of the call, echoed by its output.
    pub call_id: String,
    /// Name of the called tool.
    pub name: String,
    /// JSON encoded arguments.
    pub arguments: String,
    /// ID of the history item of the call.
    pub item_id: Option<String>,
    /// The item the call follows.
    pub previous_item_id: Option<String>,
}

/// State of the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The connection is being established.
    Connecting,
    /// The connection is up.
    Connected,
    /// The connection is down.
    Disconnected,
}

/// An event received from the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeModelEvent {
    /// A chunk of audio produced by the model.
    Audio {
        /// The item the audio belongs to.
        item_id: String,
        /// The content part the audio belongs to.
        content_index: usize,
        /// Raw audio in the output format of the session.
        data: Bytes,
    },
    /// The model finished producing the audio of a content part.
    AudioDone {
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
    /// The transport reported an error.
    Error {
        /// The error, as reported.
        error: Value,
    },
    /// An item was created or changed.
    ItemUpdated(RealtimeItem),
    /// An item was removed.
    ItemDeleted {
        /// ID of the removed item.
        item_id: String,
    },
    /// The user's audio of an item was transcribed.
    InputAudioTranscriptionCompleted {
        /// The transcribed item.
        item_id: String,
        /// The transcript.
        transcript: String,
    },
    /// A piece of transcript of what the model is saying.
    TranscriptDelta {
        /// The item being spoken.
        item_id: String,
        /// The new piece of transcript.
        delta: String,
        /// The response the item belongs to.
        response_id: String,
    },
    /// The model called a tool.
    ToolCall(RealtimeToolCall),
    /// The model started responding.
    TurnStarted,
    /// The model finished responding.
    TurnEnded,
    /// The connection changed state.
    ConnectionStatus(ConnectionStatus),
    /// Any other event, passed through untouched.
    Other(Value),
}

/// An event sent to the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeModelSendEvent {
    /// A raw event in the transport's own format.
    Raw(Value),
    /// A text message of the user.
    UserInput {
        /// The message.
        text: String,
    },
    /// A chunk of the user's audio.
    Audio {
        /// Raw audio in the input format of the session.
        audio: Bytes,
        /// Ends the user's turn after this chunk.
        commit: bool,
    },
    /// The output of a tool call.
    ToolOutput {
        /// The answered call.
        call: RealtimeToolCall,
        /// The output.
        output: String,
        /// Asks the model to respond right away.
        start_response: bool,
    },
    /// Stops the model's current response.
    Interrupt,
    /// Replaces the settings of the session.
    SessionUpdate(Box<RealtimeSessionSettings>),
}

/// Receives the events of a transport.
///
/// Called from the transport's receiving side, implementations must not
/// block.
pub trait RealtimeModelListener: Send + Sync {
    /// Handles an event.
    fn on_event(&self, event: RealtimeModelEvent);
}

/// A connection to a realtime model.
#[async_trait]
pub trait RealtimeModel: Send + Sync {
    /// Establishes the connection.
    async fn connect(
        &self,
        config: RealtimeModelConfig,
    ) -> Result<(), TransportError>;

    /// Registers a listener of the events of this transport.
    fn add_listener(&self, listener: Arc<dyn RealtimeModelListener>);

    /// Unregisters a listener, comparing by pointer.
    fn remove_listener(&self, listener: &Arc<dyn RealtimeModelListener>);

    /// Sends an event.
    async fn send_event(
        &self,
        event: RealtimeModelSendEvent,
    ) -> Result<(), TransportError>;

    /// Closes the connection.
    async fn close(&self);

    /// Sends a text message of the user.
    async fn send_message(&self, text: &str) -> Result<(), TransportError> {
        let text = text.to_owned();
        self.send_event(RealtimeModelSendEvent::UserInput { text })
            .await
    }

    /// Sends a chunk of the user's audio.
    async fn send_audio(
        &self,
        audio: Bytes,
        commit: bool,
    ) -> Result<(), TransportError> {
        self.send_event(RealtimeModelSendEvent::Audio { audio, commit })
            .await
    }

    /// Sends the output of a tool call.
    async fn send_tool_output(
        &self,
        call: RealtimeToolCall,
        output: String,
        start_response: bool,
    ) -> Result<(), TransportError> {
        self.send_event(RealtimeModelSendEvent::ToolOutput {
            call,
            output,
            start_response,
        })
        .await
    }

    /// Stops the model's current response.
    async fn interrupt(&self) -> Result<(), TransportError> {
        self.send_event(RealtimeModelSendEvent::Interrupt).await
    }
}
