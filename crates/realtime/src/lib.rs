//! Realtime sessions: a long-lived connection to a streaming speech model,
//! driving the agents of a graph through live audio and text turns.
//!
//! A [`RealtimeRunner`] connects a [`RealtimeModel`] transport and returns
//! a [`RealtimeSession`]. The session turns transport events into
//! [`RealtimeSessionEvent`]s, keeps the conversation history, executes
//! tool calls and handoffs, and checks the model's transcript against the
//! output guardrails while it is being spoken.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod events;
mod history;
mod items;
mod runner;
mod session;
mod transport;

pub use config::{
    DEFAULT_DEBOUNCE_TEXT_LENGTH, RealtimeModelConfig, RealtimeRunConfig,
    RealtimeSessionSettings,
};
pub use error::{Error, Result};
pub use events::RealtimeSessionEvent;
pub use history::History;
pub use items::{
    ItemStatus, RealtimeContent, RealtimeItem, RealtimeMessageItem,
    RealtimeToolCallItem, Role,
};
pub use runner::RealtimeRunner;
pub use session::RealtimeSession;
pub use transport::{
    ConnectionStatus, RealtimeModel, RealtimeModelEvent,
    RealtimeModelListener, RealtimeModelSendEvent, RealtimeToolCall,
    TransportError,
};
