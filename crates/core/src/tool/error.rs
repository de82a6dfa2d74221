use std::fmt::{self, Display};

/// What went wrong in a tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments of the call were invalid, e.g. malformed JSON.
    InvalidInput,
    /// The tool ran and failed.
    ExecutionError,
    /// The tool refused to run.
    PermissionDenied,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ExecutionError => "execution error",
            ErrorKind::PermissionDenied => "permission denied",
        }
    }
}

impl Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call.
///
/// Unless the tool's [`FailureHandler`](super::FailureHandler) propagates
/// it, the error is reported to the model as text and the run goes on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates an [`ErrorKind::InvalidInput`] error.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates an [`ErrorKind::ExecutionError`] error.
    #[inline]
    pub fn execution_error() -> Self {
        Self::new(ErrorKind::ExecutionError)
    }

    /// Creates an [`ErrorKind::PermissionDenied`] error.
    #[inline]
    pub fn permission_denied() -> Self {
        Self::new(ErrorKind::PermissionDenied)
    }

    /// Explains the error, for the model or for the logs.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the explanation, if any.
    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::invalid_input()
            .with_reason(format!("invalid JSON input for tool: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::permission_denied().to_string(), "permission denied");
        let err = Error::execution_error().with_reason("disk full");
        assert_eq!(err.to_string(), "execution error: disk full");
        assert_eq!(err.reason(), Some("disk full"));

        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = Error::from(err);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().starts_with("invalid input: invalid JSON"));
    }
}
