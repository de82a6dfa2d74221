use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::{ModelResponse, ResponseStream};

/// The error type for a model.
pub trait ModelError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// Whether and how much a model call should be traced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModelTracing {
    /// Tracing is disabled.
    Disabled,
    /// Tracing is enabled, including inputs and outputs.
    #[default]
    Enabled,
    /// Tracing is enabled, but inputs and outputs are not recorded.
    EnabledWithoutData,
}

impl ModelTracing {
    /// Returns `true` if tracing is disabled.
    #[inline]
    pub fn is_disabled(self) -> bool {
        self == ModelTracing::Disabled
    }

    /// Returns `true` if inputs and outputs may be recorded.
    #[inline]
    pub fn include_data(self) -> bool {
        self == ModelTracing::Enabled
    }
}

/// A type that represents a language model, which answers requests either in
/// one shot or as an ordered stream of events.
///
/// Once the model is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the model should be prepared for being dropped anytime.
pub trait Model: Send + Sync {
    /// The error type that may be returned by the model.
    type Error: ModelError;

    /// The streamed response type for this model.
    type Stream: ResponseStream<Error = Self::Error>;

    /// Sends a request and waits for the complete response.
    ///
    /// Malformed provider output must be reported as an error, never
    /// silently dropped.
    fn get_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static;

    /// Sends a request and returns a stream of response events.
    ///
    /// The stream must follow the ordering described in
    /// [`ResponseStreamEvent`](crate::ResponseStreamEvent) and end with a
    /// `Completed` event carrying the aggregated response.
    fn stream_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static;
}
