use std::collections::HashMap;
use std::future::poll_fn;
use std::pin::pin;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tandem_model::{
    Model, ModelRequest, ModelResponse, ResponseAggregator, ResponseStream,
    ResponseStreamEvent,
};
use tracing::Instrument;

use crate::{Error, Result};

type EventSink = Box<dyn FnMut(ResponseStreamEvent) + Send + 'static>;
type ResponseFuture = BoxFuture<'static, Result<ModelResponse>>;
type GetResponseFn = Arc<dyn Fn(ModelRequest) -> ResponseFuture + Send + Sync>;
#[rustfmt::skip]
type StreamResponseFn = Arc<
    dyn Fn(ModelRequest, EventSink) -> ResponseFuture + Send + Sync
>;

/// A wrapper around a model that provides a type-erased interface for the
/// other modules.
#[derive(Clone)]
pub struct ModelClient {
    get_fn: GetResponseFn,
    stream_fn: StreamResponseFn,
}

impl ModelClient {
    /// Wraps a model.
    pub fn new<M: Model + 'static>(model: M) -> Self {
        // We have to erase the type `M`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let model = Arc::new(model);

        let get_fn: GetResponseFn = {
            let model = Arc::clone(&model);
            Arc::new(move |req: ModelRequest| {
                let fut = model.get_response(&req);
                async move {
                    log_request(&req);
                    let resp = fut.await.map_err(|err| {
                        error!("got an error: {err:?}");
                        Error::Model(Box::new(err))
                    })?;
                    trace!("got a response: {resp:?}");
                    Ok(resp)
                }
                .instrument(trace_span!("model client req"))
                .boxed()
            })
        };

        let stream_fn: StreamResponseFn =
            Arc::new(move |req: ModelRequest, on_event: EventSink| {
                let fut = model.stream_response(&req);
                async move {
                    log_request(&req);
                    handle_stream::<M>(fut.await, on_event).await
                }
                .instrument(trace_span!("model client stream"))
                .boxed()
            });

        Self { get_fn, stream_fn }
    }

    /// Sends a request and returns the complete response.
    #[inline]
    pub async fn get_response(
        &self,
        req: ModelRequest,
    ) -> Result<ModelResponse> {
        (self.get_fn)(req).await
    }

    /// Sends a request, forwarding every stream event to `on_event`, and
    /// returns the aggregated response.
    ///
    /// A stream that breaks the event ordering fails with
    /// [`Error::ModelBehavior`].
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn stream_response(
        &self,
        req: ModelRequest,
        on_event: impl FnMut(ResponseStreamEvent) + Send + 'static,
    ) -> Result<ModelResponse> {
        (self.stream_fn)(req, Box::new(on_event)).await
    }
}

fn log_request(req: &ModelRequest) {
    if req.tracing.include_data() {
        trace!("got a request: {req:?}");
    } else if !req.tracing.is_disabled() {
        trace!(
            "got a request with {} input items and {} tools",
            req.input.len(),
            req.tools.len()
        );
    }
}

async fn handle_stream<M: Model + 'static>(
    stream_or_err: Result<M::Stream, M::Error>,
    mut on_event: EventSink,
) -> Result<ModelResponse> {
    let stream = stream_or_err.map_err(|err| {
        error!("got an error: {err:?}");
        Error::Model(Box::new(err))
    })?;

    trace!("start receiving events");

    let mut aggregator = ResponseAggregator::new();
    let mut pinned_stream = pin!(stream);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_stream.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Error::Model(Box::new(err)));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        aggregator
            .apply(&event)
            .map_err(|err| Error::model_behavior(err.to_string()))?;
        on_event(event);
    }

    trace!("finished a request");

    aggregator
        .finish()
        .map_err(|err| Error::model_behavior(err.to_string()))
}

/// Resolves model names into clients.
pub trait ModelProvider: Send + Sync {
    /// Returns the model with the given name, or the default model when
    /// `name` is `None`.
    fn get_model(&self, name: Option<&str>) -> Result<ModelClient>;
}

impl ModelProvider for ModelClient {
    /// Answers every name with this client.
    #[inline]
    fn get_model(&self, _name: Option<&str>) -> Result<ModelClient> {
        Ok(self.clone())
    }
}

/// A [`ModelProvider`] backed by a table of named clients.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    default: Option<ModelClient>,
    models: HashMap<String, ModelClient>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default model.
    #[inline]
    pub fn with_default<M: Model + 'static>(mut self, model: M) -> Self {
        self.default = Some(ModelClient::new(model));
        self
    }

    /// Registers a model under `name`.
    #[inline]
    pub fn with_model<S, M>(mut self, name: S, model: M) -> Self
    where
        S: Into<String>,
        M: Model + 'static,
    {
        self.models.insert(name.into(), ModelClient::new(model));
        self
    }
}

impl ModelProvider for ModelRegistry {
    fn get_model(&self, name: Option<&str>) -> Result<ModelClient> {
        match name {
            None => self
                .default
                .clone()
                .ok_or_else(|| Error::user("no default model configured")),
            Some(name) => self
                .models
                .get(name)
                .cloned()
                .ok_or_else(|| Error::user(format!("unknown model: {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tandem_model::{ErrorKind, Item};
    use tandem_test_model::{PresetResponse, TestModel};

    use super::*;

    fn hello_request() -> ModelRequest {
        ModelRequest {
            input: vec![Item::user_message("Hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stream_response() {
        let model = TestModel::new();
        model.set_always(PresetResponse::text("How are you?"));
        let model_client = ModelClient::new(model);

        for _ in 0..3 {
            let deltas = Arc::new(AtomicUsize::new(0));
            let resp = model_client
                .stream_response(hello_request(), {
                    let deltas = Arc::clone(&deltas);
                    move |event| {
                        if let ResponseStreamEvent::OutputTextDelta { .. } =
                            event
                        {
                            deltas.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
                .await
                .unwrap();
            assert_eq!(
                Item::last_text_output(&resp.output).as_deref(),
                Some("How are you?")
            );
            assert_eq!(deltas.load(Ordering::Relaxed), 3);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModel::new());
        let resp_or_err = model_client.get_response(hello_request()).await;
        assert!(matches!(resp_or_err, Err(Error::Model(_))));

        let model = TestModel::new();
        model.add_turn(
            PresetResponse::text("cut short")
                .with_stream_failure(ErrorKind::RateLimitExceeded),
        );
        let model_client = ModelClient::new(model);
        let err = model_client
            .stream_response(hello_request(), |_| {})
            .await
            .unwrap_err();
        let Error::Model(err) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn test_registry() {
        let fast = TestModel::new();
        fast.set_always(PresetResponse::text("fast"));
        let slow = TestModel::new();
        slow.set_always(PresetResponse::text("slow"));
        let registry = ModelRegistry::new()
            .with_default(fast.clone())
            .with_model("slow", slow.clone());

        let resp = registry
            .get_model(Some("slow"))
            .unwrap()
            .get_response(hello_request())
            .await
            .unwrap();
        assert_eq!(Item::last_text_output(&resp.output).unwrap(), "slow");
        registry
            .get_model(None)
            .unwrap()
            .get_response(hello_request())
            .await
            .unwrap();
        assert_eq!(fast.request_count(), 1);
        assert_eq!(slow.request_count(), 1);

        assert!(matches!(
            registry.get_model(Some("missing")),
            Err(Error::User(_))
        ));
        assert!(matches!(
            ModelRegistry::new().get_model(None),
            Err(Error::User(_))
        ));
    }
}
