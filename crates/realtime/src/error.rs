/// Errors of a realtime session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An agent, tool, handoff or guardrail failed.
    #[error(transparent)]
    Core(#[from] tandem_core::Error),
    /// The transport failed to connect or to deliver an event.
    #[error("transport error: {0}")]
    Transport(String),
    /// The session was closed.
    #[error("the session is closed")]
    SessionClosed,
}

impl Error {
    #[inline]
    pub(crate) fn transport<E: std::fmt::Display>(err: E) -> Self {
        Error::Transport(err.to_string())
    }
}

/// A specialized [`Result`](std::result::Result) for realtime sessions.
pub type Result<T> = std::result::Result<T, Error>;
