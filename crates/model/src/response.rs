use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::items::{ContentPart, Item};
use crate::model::ModelError;
use crate::usage::Usage;

/// A complete response from the model. Immutable once produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Items produced in this turn.
    pub output: Vec<Item>,
    /// Usage counters of this call.
    pub usage: Usage,
    /// Provider-assigned response identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// The event from a streamed model response.
///
/// Events arrive strictly ordered: `Created` first, then for every output
/// item `OutputItemAdded`, its content parts (`ContentPartAdded`, deltas,
/// `ContentPartDone`) or argument deltas, and `OutputItemDone`, and finally
/// `Completed` with the aggregated response. Usage is only known at
/// `Completed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseStreamEvent {
    /// The response has been created.
    Created {
        /// Provider-assigned response identifier.
        response_id: Option<String>,
    },
    /// A new output item started.
    OutputItemAdded {
        /// Position of the item in the output.
        output_index: usize,
        /// The item as known so far.
        item: Item,
    },
    /// A new content part of a message started.
    ContentPartAdded {
        /// Position of the item in the output.
        output_index: usize,
        /// Position of the part in the message content.
        content_index: usize,
    },
    /// Received a text delta.
    OutputTextDelta {
        /// Position of the item in the output.
        output_index: usize,
        /// Position of the part in the message content.
        content_index: usize,
        /// The text delta.
        delta: String,
    },
    /// Received a delta of function call arguments.
    FunctionCallArgumentsDelta {
        /// Position of the item in the output.
        output_index: usize,
        /// The arguments delta.
        delta: String,
    },
    /// A content part is complete.
    ContentPartDone {
        /// Position of the item in the output.
        output_index: usize,
        /// Position of the part in the message content.
        content_index: usize,
        /// The complete part.
        part: ContentPart,
    },
    /// An output item is complete.
    OutputItemDone {
        /// Position of the item in the output.
        output_index: usize,
        /// The complete item.
        item: Item,
    },
    /// The response has been completed.
    Completed(ModelResponse),
}

/// A streamed response from the model.
pub trait ResponseStream: Sized + Send + 'static {
    /// The error type that may be returned by the model.
    type Error: ModelError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ResponseStreamEvent>, Self::Error>>;
}
