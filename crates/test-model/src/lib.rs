//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tandem_model::{
    ContentPart, ErrorKind, Item, MessageItem, Model, ModelError, ModelRequest,
    ModelResponse, ResponseStream, ResponseStreamEvent, Usage,
};
use tokio::time::{Instant, Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Clone, Debug)]
enum Turn {
    Response(PresetResponse),
    Failure(ErrorKind),
}

#[derive(Default)]
struct Script {
    turns: VecDeque<Turn>,
    always: Option<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to queue the turns, which is how the
/// model should respond to each request. Every request consumes the next
/// queued turn; once the queue is drained, the fallback set with
/// [`Self::set_always`] is used. If neither exists, an error is returned.
///
/// Every request is recorded and can be inspected with [`Self::requests`].
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModel {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModel {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response of the next turn.
    #[inline]
    pub fn add_turn(&self, preset: PresetResponse) {
        self.script.lock().turns.push_back(Turn::Response(preset));
    }

    #[inline]
    pub fn add_turns(&self, presets: impl IntoIterator<Item = PresetResponse>) {
        let mut script = self.script.lock();
        script.turns.extend(presets.into_iter().map(Turn::Response));
    }

    /// Queues a turn that fails with the given error kind.
    #[inline]
    pub fn add_error_turn(&self, kind: ErrorKind) {
        self.script.lock().turns.push_back(Turn::Failure(kind));
    }

    /// Sets the response used once every queued turn is consumed.
    #[inline]
    pub fn set_always(&self, preset: PresetResponse) {
        self.script.lock().always = Some(preset);
    }

    /// Sets the delay before each streamed event, and before a one-shot
    /// response.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script.lock().requests.clone()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.script.lock().requests.len()
    }

    fn next_turn(&self, req: &ModelRequest) -> Result<PresetResponse, Error> {
        let mut script = self.script.lock();
        script.requests.push(req.clone());
        match script.turns.pop_front() {
            Some(Turn::Response(preset)) => Ok(preset),
            Some(Turn::Failure(kind)) => Err(Error {
                message: "preset failure",
                kind,
            }),
            None => script.always.clone().ok_or(Error {
                message: "no more turns",
                kind: ErrorKind::Other,
            }),
        }
    }
}

fn make_response(preset: &PresetResponse) -> ModelResponse {
    ModelResponse {
        output: preset.output(),
        usage: preset.usage.unwrap_or(Usage {
            requests: 1,
            ..Default::default()
        }),
        response_id: None,
    }
}

fn split_in_half(text: &str) -> Vec<String> {
    let mut mid = text.len() / 2;
    while !text.is_char_boundary(mid) {
        mid += 1;
    }
    let (head, tail) = text.split_at(mid);
    [head, tail]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn make_events(preset: &PresetResponse) -> VecDeque<ResponseStreamEvent> {
    let response = make_response(preset);
    let mut events = VecDeque::new();
    events.push_back(ResponseStreamEvent::Created {
        response_id: response.response_id.clone(),
    });

    for (output_index, item) in response.output.iter().enumerate() {
        match item {
            Item::Message(msg) => {
                events.push_back(ResponseStreamEvent::OutputItemAdded {
                    output_index,
                    item: Item::Message(MessageItem {
                        content: vec![],
                        ..msg.clone()
                    }),
                });
                let text = msg.text();
                events.push_back(ResponseStreamEvent::ContentPartAdded {
                    output_index,
                    content_index: 0,
                });
                for delta in text.split_inclusive(' ') {
                    events.push_back(ResponseStreamEvent::OutputTextDelta {
                        output_index,
                        content_index: 0,
                        delta: delta.to_owned(),
                    });
                }
                events.push_back(ResponseStreamEvent::ContentPartDone {
                    output_index,
                    content_index: 0,
                    part: ContentPart::OutputText { text },
                });
            }
            Item::FunctionCall(call) => {
                let mut added = call.clone();
                added.arguments.clear();
                events.push_back(ResponseStreamEvent::OutputItemAdded {
                    output_index,
                    item: Item::FunctionCall(added),
                });
                for delta in split_in_half(&call.arguments) {
                    events.push_back(
                        ResponseStreamEvent::FunctionCallArgumentsDelta {
                            output_index,
                            delta,
                        },
                    );
                }
            }
            _ => {
                events.push_back(ResponseStreamEvent::OutputItemAdded {
                    output_index,
                    item: item.clone(),
                });
            }
        }
        events.push_back(ResponseStreamEvent::OutputItemDone {
            output_index,
            item: item.clone(),
        });
    }

    events.push_back(ResponseStreamEvent::Completed(response));
    events
}

pin_project! {
    /// The streamed response of [`TestModel`].
    pub struct TestResponseStream {
        pending: VecDeque<ResponseStreamEvent>,
        failure: Option<ErrorKind>,
        delay: Duration,
        armed: bool,
        #[pin]
        sleep: Sleep,
    }
}

impl TestResponseStream {
    fn new(preset: &PresetResponse, delay: Duration) -> Self {
        Self {
            pending: make_events(preset),
            failure: preset.stream_failure,
            delay,
            armed: true,
            sleep: sleep(delay),
        }
    }
}

impl ResponseStream for TestResponseStream {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseStreamEvent>, Self::Error>> {
        let mut this = self.project();
        if !*this.armed {
            this.sleep.as_mut().reset(Instant::now() + *this.delay);
            *this.armed = true;
        }
        ready!(this.sleep.as_mut().poll(cx));
        *this.armed = false;

        let completing = matches!(
            this.pending.front(),
            Some(ResponseStreamEvent::Completed(_))
        );
        if completing {
            if let Some(kind) = this.failure.take() {
                this.pending.clear();
                return Poll::Ready(Err(Error {
                    message: "preset stream failure",
                    kind,
                }));
            }
        }

        // Returns `None` when called after completion.
        Poll::Ready(Ok(this.pending.pop_front()))
    }
}

impl Model for TestModel {
    type Error = crate::Error;
    type Stream = TestResponseStream;

    fn get_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let turn = self.next_turn(req);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            turn.map(|preset| make_response(&preset))
        }
    }

    fn stream_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let turn = self.next_turn(req);
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move { turn.map(|preset| TestResponseStream::new(&preset, delay)) }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use tandem_model::ResponseAggregator;

    use super::*;

    async fn collect_stream(
        stream: TestResponseStream,
    ) -> Result<(String, ModelResponse), Error> {
        let mut stream = pin!(stream);
        let mut aggregator = ResponseAggregator::new();
        let mut text = String::new();
        while let Some(event) =
            poll_fn(|cx| stream.as_mut().poll_next_event(cx)).await?
        {
            if let ResponseStreamEvent::OutputTextDelta { delta, .. } = &event {
                text.push_str(delta);
            }
            aggregator.apply(&event).unwrap();
        }
        Ok((text, aggregator.finish().unwrap()))
    }

    #[tokio::test]
    async fn test_queued_turns() {
        let model = TestModel::new();
        model.add_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a look.".to_owned()),
            PresetEvent::function_call(
                "call_1",
                "read_file",
                json!({ "filename": "todo.txt" }),
            ),
        ]));
        model.add_turn(PresetResponse::text("Hello, world!"));

        let req = ModelRequest {
            input: vec![Item::user_message("Check my todo")],
            ..Default::default()
        };
        let resp = model.get_response(&req).await.unwrap();
        assert_eq!(resp.output.len(), 2);
        let Item::FunctionCall(call) = &resp.output[1] else {
            panic!("unexpected item: {:?}", resp.output[1]);
        };
        assert_eq!(call.name, "read_file");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&call.arguments).unwrap(),
            json!({ "filename": "todo.txt" })
        );

        let stream = model.stream_response(&req).await.unwrap();
        let (text, resp) = collect_stream(stream).await.unwrap();
        assert_eq!(text, "Hello, world!");
        assert_eq!(resp.usage.requests, 1);

        let err = model.get_response(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(model.request_count(), 3);
        assert_eq!(model.requests()[0], req);
    }

    #[tokio::test]
    async fn test_streamed_arguments() {
        let model = TestModel::new();
        let args = json!({ "city": "Paris", "unit": "celsius" });
        model.add_turn(PresetResponse::with_events([
            PresetEvent::function_call("call_1", "weather", args.clone()),
        ]));

        let stream = model
            .stream_response(&ModelRequest::default())
            .await
            .unwrap();
        let (_, resp) = collect_stream(stream).await.unwrap();
        assert_eq!(
            resp.output,
            vec![Item::function_call("call_1", "weather", args.to_string())]
        );
    }

    #[tokio::test]
    async fn test_failures() {
        let model = TestModel::new();
        model.add_error_turn(ErrorKind::RateLimitExceeded);
        model.add_turn(
            PresetResponse::text("partial")
                .with_stream_failure(ErrorKind::Moderated),
        );
        model.set_always(PresetResponse::text("again"));

        let req = ModelRequest::default();
        let err = model.get_response(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let stream = model.stream_response(&req).await.unwrap();
        let err = collect_stream(stream).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Moderated);

        for _ in 0..2 {
            let resp = model.get_response(&req).await.unwrap();
            assert_eq!(
                Item::last_text_output(&resp.output).as_deref(),
                Some("again")
            );
        }
    }
}
