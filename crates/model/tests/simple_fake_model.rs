use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use tandem_model::{
    ContentPart, ErrorKind, Item, MessageItem, Model, ModelError,
    ModelRequest, ModelResponse, ResponseAggregator, ResponseStream,
    ResponseStreamEvent, Role, Usage,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct EchoModelError(ErrorKind);

impl Display for EchoModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoModelError {}

impl ModelError for EchoModelError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

fn echo_text(req: &ModelRequest) -> Result<String, EchoModelError> {
    let Some(Item::Message(msg)) = req.input.first() else {
        return Err(EchoModelError(ErrorKind::Other));
    };
    assert_eq!(msg.role, Role::User);
    Ok(format!("You said {}", msg.text()))
}

#[derive(Debug)]
struct EchoStream {
    pending: VecDeque<ResponseStreamEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EchoStream {
    fn new(text: &str) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(ResponseStreamEvent::Created { response_id: None });
        pending.push_back(ResponseStreamEvent::OutputItemAdded {
            output_index: 0,
            item: Item::Message(MessageItem {
                id: None,
                role: Role::Assistant,
                content: vec![],
            }),
        });
        pending.push_back(ResponseStreamEvent::ContentPartAdded {
            output_index: 0,
            content_index: 0,
        });

        let words: Vec<_> = text.split(' ').collect();
        for (idx, word) in words.iter().enumerate() {
            let mut delta = word.to_string();
            if idx + 1 < words.len() {
                delta.push(' ');
            }
            pending.push_back(ResponseStreamEvent::OutputTextDelta {
                output_index: 0,
                content_index: 0,
                delta,
            });
        }

        let item = Item::assistant_message(text);
        pending.push_back(ResponseStreamEvent::ContentPartDone {
            output_index: 0,
            content_index: 0,
            part: ContentPart::OutputText {
                text: text.to_owned(),
            },
        });
        pending.push_back(ResponseStreamEvent::OutputItemDone {
            output_index: 0,
            item: item.clone(),
        });
        pending.push_back(ResponseStreamEvent::Completed(ModelResponse {
            output: vec![item],
            usage: Usage {
                requests: 1,
                ..Default::default()
            },
            response_id: None,
        }));

        Self {
            pending,
            sleep: None,
        }
    }
}

impl ResponseStream for EchoStream {
    type Error = EchoModelError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ResponseStreamEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.pending.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct EchoModel;

impl Model for EchoModel {
    type Error = EchoModelError;
    type Stream = EchoStream;

    fn get_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let result = echo_text(req).map(|text| ModelResponse {
            output: vec![Item::assistant_message(text)],
            usage: Usage {
                requests: 1,
                ..Default::default()
            },
            response_id: None,
        });
        ready(result)
    }

    fn stream_response(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        ready(echo_text(req).map(|text| EchoStream::new(&text)))
    }
}

mod tests {
    use super::*;

    fn request(input: Vec<Item>) -> ModelRequest {
        ModelRequest {
            input,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_response() {
        let req = request(vec![Item::user_message("Good morning")]);
        let resp = EchoModel.get_response(&req).await.unwrap();
        assert_eq!(
            Item::last_text_output(&resp.output).as_deref(),
            Some("You said Good morning")
        );
        assert_eq!(resp.usage.requests, 1);
    }

    #[tokio::test]
    async fn test_streamed_response() {
        let req = request(vec![Item::user_message("Good morning")]);
        let mut stream = EchoModel.stream_response(&req).await.unwrap();

        let mut aggregator = ResponseAggregator::new();
        let mut text = String::new();
        loop {
            let next = poll_fn(|cx| Pin::new(&mut stream).poll_next_event(cx));
            match next.await {
                Ok(Some(event)) => {
                    if let ResponseStreamEvent::OutputTextDelta {
                        delta, ..
                    } = &event
                    {
                        text.push_str(delta);
                    }
                    aggregator.apply(&event).unwrap();
                }
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        assert_eq!(text, "You said Good morning");
        let resp = aggregator.finish().unwrap();
        assert_eq!(
            Item::last_text_output(&resp.output).as_deref(),
            Some("You said Good morning")
        );
    }

    #[tokio::test]
    async fn test_error() {
        let result = EchoModel.get_response(&request(vec![])).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
