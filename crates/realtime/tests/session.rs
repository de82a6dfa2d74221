use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tandem_core::guardrail::{
    BoxError, GuardrailFunctionOutput, OutputGuardrail,
};
use tandem_core::tool::{FunctionTool, ToolResult};
use tandem_core::{Agent, AgentGraph, AgentId, Error as CoreError, RunContext};
use tandem_realtime::{
    Error, RealtimeItem, RealtimeModel, RealtimeModelConfig,
    RealtimeModelEvent, RealtimeModelListener, RealtimeModelSendEvent,
    RealtimeRunConfig, RealtimeRunner, RealtimeSession, RealtimeSessionEvent,
    RealtimeSessionSettings, RealtimeToolCall, TransportError,
};
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeTransport {
    listeners: Mutex<Vec<Arc<dyn RealtimeModelListener>>>,
    sent: Mutex<Vec<RealtimeModelSendEvent>>,
    config: Mutex<Option<RealtimeModelConfig>>,
    closes: AtomicUsize,
}

impl FakeTransport {
    fn inject(&self, event: RealtimeModelEvent) {
        for listener in self.listeners.lock().iter() {
            listener.on_event(event.clone());
        }
    }

    fn sent(&self) -> Vec<RealtimeModelSendEvent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl RealtimeModel for FakeTransport {
    async fn connect(
        &self,
        config: RealtimeModelConfig,
    ) -> Result<(), TransportError> {
        *self.config.lock() = Some(config);
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn RealtimeModelListener>) {
        self.listeners.lock().push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn RealtimeModelListener>) {
        self.listeners
            .lock()
            .retain(|other| !Arc::ptr_eq(other, listener));
    }

    async fn send_event(
        &self,
        event: RealtimeModelSendEvent,
    ) -> Result<(), TransportError> {
        self.sent.lock().push(event);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Skips the raw events passed through by the session.
async fn next(session: &mut RealtimeSession) -> RealtimeSessionEvent {
    loop {
        match session.next_event().await.unwrap() {
            Some(RealtimeSessionEvent::RawModelEvent(_)) => {}
            Some(event) => return event,
            None => panic!("the session ended"),
        }
    }
}

fn delta(item_id: &str, delta: &str) -> RealtimeModelEvent {
    RealtimeModelEvent::TranscriptDelta {
        item_id: item_id.to_owned(),
        delta: delta.to_owned(),
        response_id: "r1".to_owned(),
    }
}

fn tool_call(name: &str) -> RealtimeToolCall {
    RealtimeToolCall {
        call_id: "c1".to_owned(),
        name: name.to_owned(),
        arguments: "{}".to_owned(),
        item_id: None,
        previous_item_id: None,
    }
}

async fn start(
    graph: AgentGraph,
    agent: AgentId,
    config: RealtimeRunConfig,
) -> (Arc<FakeTransport>, RealtimeSession) {
    let transport = Arc::new(FakeTransport::default());
    let session = RealtimeRunner::new(graph, agent, transport.clone())
        .with_config(config)
        .run(RunContext::new())
        .await
        .unwrap();
    (transport, session)
}

fn ids(items: &[RealtimeItem]) -> Vec<&str> {
    items.iter().map(RealtimeItem::item_id).collect()
}

#[tokio::test]
async fn test_history_events() {
    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").build());
    let (transport, mut session) =
        start(graph, a, RealtimeRunConfig::new()).await;

    let b = RealtimeItem::user_text("b", "2").with_previous_item_id("a");
    for item in [
        RealtimeItem::user_text("a", "1"),
        RealtimeItem::user_text("c", "3"),
        b,
        RealtimeItem::user_text("a", "one"),
    ] {
        transport.inject(RealtimeModelEvent::ItemUpdated(item));
    }
    transport.inject(RealtimeModelEvent::ItemDeleted {
        item_id: "c".to_owned(),
    });

    for id in ["a", "c", "b"] {
        let event = next(&mut session).await;
        let RealtimeSessionEvent::HistoryAdded { item } = event else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(item.item_id(), id);
    }
    let event = next(&mut session).await;
    let RealtimeSessionEvent::HistoryUpdated { history } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(ids(&history), ["a", "b", "c"]);
    assert_eq!(history[0], RealtimeItem::user_text("a", "one"));

    let event = next(&mut session).await;
    let RealtimeSessionEvent::HistoryUpdated { history } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(ids(&history), ["a", "b"]);
    assert_eq!(ids(&session.history()), ["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_guardrails() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let guardrail =
        OutputGuardrail::new("count", move |_ctx, _agent, output: Value| {
            tx.send(output).ok();
            async move { Ok::<_, BoxError>(GuardrailFunctionOutput::pass()) }
        });

    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").build());
    let config = RealtimeRunConfig::new()
        .with_output_guardrail(guardrail)
        .with_debounce_text_length(5);
    let (transport, _session) = start(graph, a, config).await;

    transport.inject(delta("i1", "12345"));
    transport.inject(delta("i1", "67890"));

    let wait = Duration::from_secs(1);
    let mut checked = vec![];
    for _ in 0..2 {
        let output = tokio::time::timeout(wait, rx.recv()).await.unwrap();
        checked.push(output.unwrap());
    }
    checked.sort_by_key(|output| output.to_string());
    assert_eq!(checked, [Value::from("12345"), Value::from("1234567890")]);
    // No third check before the transcript reaches 15 chars.
    assert!(tokio::time::timeout(wait, rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_guardrail_trip_interrupts_once_per_turn() {
    let guardrail = OutputGuardrail::new(
        "no_secrets",
        |_ctx, _agent, output: Value| async move {
            let leaked = output.as_str().is_some_and(|s| s.contains("secret"));
            Ok::<_, BoxError>(GuardrailFunctionOutput {
                output_info: Value::Null,
                tripwire_triggered: leaked,
            })
        },
    );

    let mut graph = AgentGraph::new();
    let a = graph.insert(
        Agent::builder("a").with_output_guardrail(guardrail).build(),
    );
    let config = RealtimeRunConfig::new().with_debounce_text_length(5);
    let (transport, mut session) = start(graph, a, config).await;

    transport.inject(RealtimeModelEvent::TurnStarted);
    transport.inject(delta("i1", "a secret plan"));
    let event = next(&mut session).await;
    assert!(matches!(
        event,
        RealtimeSessionEvent::AgentStart { agent } if agent == a
    ));

    let event = next(&mut session).await;
    let RealtimeSessionEvent::GuardrailTripped { results, message } = event
    else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].guardrail, "no_secrets");
    assert_eq!(message, "a secret plan");
    let trip_events = [
        RealtimeModelSendEvent::Interrupt,
        RealtimeModelSendEvent::UserInput {
            text: "guardrail triggered: no_secrets".to_owned(),
        },
    ];
    assert_eq!(transport.sent(), trip_events);

    // Tripping again within the turn changes nothing.
    transport.inject(delta("i1", " and another secret"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    transport.inject(RealtimeModelEvent::TurnEnded);
    let event = next(&mut session).await;
    assert!(matches!(event, RealtimeSessionEvent::AgentEnd { .. }));
    assert_eq!(transport.sent().len(), 2);

    transport.inject(delta("i2", "secret again"));
    let event = next(&mut session).await;
    assert!(matches!(event, RealtimeSessionEvent::GuardrailTripped { .. }));
    assert_eq!(transport.sent().len(), 4);
}

#[tokio::test]
async fn test_guardrail_failure_is_reported() {
    let guardrail =
        OutputGuardrail::new("broken", |_ctx, _agent, _output: Value| {
            async move {
                Err::<GuardrailFunctionOutput, _>(BoxError::from("boom"))
            }
        });

    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").build());
    let config = RealtimeRunConfig::new()
        .with_output_guardrail(guardrail)
        .with_debounce_text_length(1);
    let (transport, mut session) = start(graph, a, config).await;

    transport.inject(delta("i1", "hello"));
    let event = next(&mut session).await;
    let RealtimeSessionEvent::Error { error } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert!(error["message"].as_str().unwrap().contains("boom"));

    // The session keeps going.
    transport.inject(RealtimeModelEvent::TurnStarted);
    let event = next(&mut session).await;
    assert!(matches!(event, RealtimeSessionEvent::AgentStart { .. }));
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_tool_call() {
    let tool = FunctionTool::from_fn(
        "lookup",
        "Looks up a fact",
        |_ctx, _input: Value| async move { ToolResult::Ok("42".to_owned()) },
    );
    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").with_tool(tool).build());
    let (transport, mut session) =
        start(graph, a, RealtimeRunConfig::new()).await;

    let initial = transport.config.lock().clone().unwrap().initial_settings;
    let tools = initial.tools.unwrap();
    assert_eq!(tools[0].name, "lookup");

    transport.inject(RealtimeModelEvent::ToolCall(tool_call("lookup")));
    let event = next(&mut session).await;
    let RealtimeSessionEvent::ToolStart { agent, tool_name } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!((agent, tool_name.as_str()), (a, "lookup"));
    let event = next(&mut session).await;
    let RealtimeSessionEvent::ToolEnd { output, .. } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(output, "42");

    assert_eq!(
        transport.sent(),
        [RealtimeModelSendEvent::ToolOutput {
            call: tool_call("lookup"),
            output: "42".to_owned(),
            start_response: true,
        }]
    );
}

#[tokio::test]
async fn test_handoff_updates_session() {
    let mut graph = AgentGraph::new();
    let b = graph
        .insert(Agent::builder("b").with_instructions("You are b.").build());
    let a = graph.insert(
        Agent::builder("a")
            .with_instructions("You are a.")
            .with_handoff(b)
            .build(),
    );
    let config = RealtimeRunConfig::new().with_model_settings(
        RealtimeSessionSettings::default().with_voice("alloy"),
    );
    let (transport, mut session) = start(graph, a, config).await;

    let initial = transport.config.lock().clone().unwrap().initial_settings;
    assert_eq!(initial.instructions.as_deref(), Some("You are a."));
    assert_eq!(initial.voice.as_deref(), Some("alloy"));
    assert_eq!(initial.handoffs.unwrap()[0].name, "transfer_to_b");

    transport.inject(RealtimeModelEvent::ToolCall(tool_call("transfer_to_b")));
    let event = next(&mut session).await;
    let RealtimeSessionEvent::Handoff { from, to } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!((from, to), (a, b));
    // Wait for the tool output that follows the event.
    transport.inject(RealtimeModelEvent::TurnStarted);
    next(&mut session).await;
    assert_eq!(session.current_agent(), b);

    let sent = transport.sent();
    let RealtimeModelSendEvent::SessionUpdate(settings) = &sent[0] else {
        panic!("unexpected event: {:?}", sent[0]);
    };
    assert_eq!(settings.instructions.as_deref(), Some("You are b."));
    assert_eq!(settings.voice.as_deref(), Some("alloy"));
    assert_eq!(settings.handoffs, Some(vec![]));
    assert_eq!(
        sent[1],
        RealtimeModelSendEvent::ToolOutput {
            call: tool_call("transfer_to_b"),
            output: r#"{"assistant":"b"}"#.to_owned(),
            start_response: true,
        }
    );
}

#[tokio::test]
async fn test_unknown_tool_ends_session() {
    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").build());
    let (transport, mut session) =
        start(graph, a, RealtimeRunConfig::new()).await;

    transport.inject(RealtimeModelEvent::ToolCall(tool_call("missing")));
    let err = loop {
        match session.next_event().await {
            Ok(Some(_)) => {}
            Ok(None) => panic!("the session should fail"),
            Err(err) => break err,
        }
    };
    let Error::Core(CoreError::ModelBehavior(message)) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(message, "Tool missing not found");

    // The transport was released before the error was reported.
    assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    assert!(transport.listeners.lock().is_empty());
    assert!(session.next_event().await.unwrap().is_none());
    assert!(matches!(
        session.send_message("hi").await,
        Err(Error::SessionClosed)
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut graph = AgentGraph::new();
    let a = graph.insert(Agent::builder("a").build());
    let (transport, mut session) =
        start(graph, a, RealtimeRunConfig::new()).await;

    session.send_message("hello").await.unwrap();
    session.interrupt().await.unwrap();
    assert_eq!(transport.sent().len(), 2);

    session.close().await;
    session.close().await;
    assert!(session.is_closed());
    assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    assert!(transport.listeners.lock().is_empty());
    assert!(session.next_event().await.unwrap().is_none());
    assert!(matches!(
        session.send_audio(vec![0u8; 4].into(), true).await,
        Err(Error::SessionClosed)
    ));
    assert_eq!(transport.sent().len(), 2);
}
