use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::Value;

use super::*;
use crate::mcp::tests::FakeMcpServer;
use crate::tool::{FunctionTool, IsEnabled, ToolResult, WebSearchTool};
use crate::Error;

fn echo_tool(name: &'static str) -> FunctionTool {
    FunctionTool::from_fn(name, "Echoes", move |_ctx, _: Value| async move {
        ToolResult::Ok(name.to_owned())
    })
}

fn tool_names(tools: &ToolSet) -> Vec<String> {
    tools
        .tools()
        .iter()
        .map(|tool| tool.name().to_owned())
        .collect()
}

#[tokio::test]
async fn test_all_tools_order() {
    let server = Arc::new(FakeMcpServer::new("fs", &["read", "write"]));
    let agent = Agent::builder("a")
        .with_tool(echo_tool("local"))
        .with_tool(WebSearchTool::default())
        .with_mcp_server(server.clone())
        .build();

    let tools = agent.all_tools(&RunContext::new()).await.unwrap();
    assert_eq!(tool_names(&tools), ["read", "write", "local", "web_search"]);
    assert_eq!(server.list_calls.load(Ordering::SeqCst), 1);

    let output = tools
        .function("write")
        .unwrap()
        .invoke(RunContext::new(), r#"{"path":"a.txt"}"#)
        .await
        .unwrap();
    let output: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(output["type"], "text");
    assert_eq!(output["text"], r#"{"path":"a.txt"}"#);
    assert_eq!(*server.tool_calls.lock(), ["write"]);
}

#[tokio::test]
async fn test_duplicate_mcp_tools() {
    let agent = Agent::builder("a")
        .with_mcp_server(Arc::new(FakeMcpServer::new("one", &["read"])))
        .with_mcp_server(Arc::new(FakeMcpServer::new("two", &["read"])))
        .build();

    let err = agent.all_tools(&RunContext::new()).await.err().unwrap();
    let Error::User(message) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(message.contains("read"));
}

#[tokio::test]
async fn test_enablement() {
    let ctx = RunContext::with_value(String::from("admin"));
    let agent = Agent::builder("a")
        .with_tool(echo_tool("always"))
        .with_tool(echo_tool("never").with_enabled(false))
        .with_tool(echo_tool("admin_only").with_enabled(IsEnabled::from_fn(
            |ctx, _agent| ctx.get::<String>().is_some_and(|r| r == "admin"),
        )))
        .build();

    let tools = agent.all_tools(&ctx).await.unwrap();
    assert_eq!(tool_names(&tools), ["always", "admin_only"]);
    let tools = agent.all_tools(&RunContext::new()).await.unwrap();
    assert_eq!(tool_names(&tools), ["always"]);
}

#[tokio::test]
async fn test_enabled_handoffs() {
    let mut graph = AgentGraph::new();
    let billing = graph.insert(Agent::builder("Billing").build());
    let refunds = graph.insert(Agent::builder("Refunds").build());
    let hidden = Handoff::builder(&graph, refunds)
        .unwrap()
        .with_enabled(false)
        .build();
    let triage = graph.insert(
        Agent::builder("Triage")
            .with_handoff(billing)
            .with_handoff(hidden)
            .build(),
    );

    let handoffs = graph[triage]
        .enabled_handoffs(&graph, &RunContext::new())
        .await
        .unwrap();
    assert_eq!(handoffs.len(), 1);
    assert_eq!(handoffs[0].tool_name(), "transfer_to_billing");
    assert_eq!(handoffs[0].target(), billing);
}

#[tokio::test]
async fn test_instructions() {
    let ctx = RunContext::with_value(String::from("Ada"));
    let agent = Agent::builder("a").build();
    assert_eq!(agent.system_prompt(&ctx).await, None);

    let agent = agent
        .to_builder()
        .with_instructions("Be helpful.")
        .build();
    assert_eq!(
        agent.system_prompt(&ctx).await.as_deref(),
        Some("Be helpful.")
    );

    let agent = agent
        .to_builder()
        .with_name("greeter")
        .with_instructions(Instructions::from_fn(|ctx, agent| {
            let user = ctx.get::<String>().cloned().unwrap_or_default();
            format!("You are {}, greet {user}.", agent.name())
        }))
        .build();
    assert_eq!(
        agent.system_prompt(&ctx).await.as_deref(),
        Some("You are greeter, greet Ada.")
    );
}

#[test]
fn test_graph() {
    let mut graph = AgentGraph::new();
    assert!(graph.is_empty());
    let a = graph.insert(Agent::builder("a").build());
    let b = graph.insert(Agent::builder("b").build());

    // Agents may hand off to each other, and to themselves.
    graph.add_handoff(a, b).unwrap();
    graph.add_handoff(b, a).unwrap();
    graph.add_handoff(b, b).unwrap();
    assert_eq!(graph[a].handoffs().len(), 1);
    assert_eq!(graph[b].handoffs().len(), 2);

    assert_eq!(graph.find("b"), Some(b));
    assert_eq!(graph.find("c"), None);
    assert_eq!(graph.len(), 2);

    let mut other = AgentGraph::new();
    for name in ["c", "d"] {
        other.insert(Agent::builder(name).build());
    }
    let unknown = other.insert(Agent::builder("e").build());
    assert!(graph.add_handoff(a, unknown).is_err());
    assert!(graph.add_handoff(unknown, a).is_err());
}
