//! Tools served by MCP (Model Context Protocol) servers.
//!
//! The protocol client itself lives outside this crate: implement
//! [`McpServer`] on top of it and attach the server to an agent. Its tools
//! are listed every time the agent's tool set is resolved, wrap the server
//! in a [`CachedMcpServer`] to list them only once.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tool::{self, FunctionTool, ToolObject, ToolResult};
use crate::{Agent, Error, Result, RunContext};

/// The error type of MCP servers.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The server is used before [`McpServer::connect`].
    #[error("server `{0}` is not connected")]
    NotConnected(String),
    /// Any other server or transport failure.
    #[error("{0}")]
    Server(String),
}

/// A tool exposed by an MCP server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A content part of a tool call result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource.
        resource: Value,
    },
}

/// The result of an MCP tool call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content parts of the result.
    pub content: Vec<McpContent>,
    /// Whether the tool reported a failure.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Normalizes the result to a single string: the JSON of the only
    /// content part, or a JSON array when there are several (or none).
    pub fn normalize(&self) -> String {
        let encoded = match self.content.as_slice() {
            [part] => serde_json::to_string(part),
            parts => serde_json::to_string(parts),
        };
        encoded.unwrap_or_default()
    }
}

/// A server speaking the Model Context Protocol.
///
/// Callers must [`connect`](McpServer::connect) before use and
/// [`cleanup`](McpServer::cleanup) when done.
#[async_trait]
pub trait McpServer: Send + Sync {
    /// Returns a readable name of the server.
    fn name(&self) -> &str;

    /// Connects to the server.
    async fn connect(&self) -> Result<(), McpError>;

    /// Releases the connection.
    async fn cleanup(&self) -> Result<(), McpError>;

    /// Lists the tools available to `agent`.
    async fn list_tools(
        &self,
        ctx: &RunContext,
        agent: &Agent,
    ) -> Result<Vec<McpTool>, McpError>;

    /// Calls a tool.
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpError>;
}

/// Caches the tool list of an [`McpServer`] until it is invalidated.
pub struct CachedMcpServer<S> {
    inner: S,
    cache: Mutex<Option<Vec<McpTool>>>,
}

impl<S: McpServer> CachedMcpServer<S> {
    /// Wraps the server.
    #[inline]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(None),
        }
    }

    /// Makes the next `list_tools` call hit the server again.
    #[inline]
    pub fn invalidate_tools_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Returns the wrapped server.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: McpServer> McpServer for CachedMcpServer<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn connect(&self) -> Result<(), McpError> {
        self.inner.connect().await
    }

    async fn cleanup(&self) -> Result<(), McpError> {
        self.inner.cleanup().await
    }

    async fn list_tools(
        &self,
        ctx: &RunContext,
        agent: &Agent,
    ) -> Result<Vec<McpTool>, McpError> {
        if let Some(tools) = self.cache.lock().clone() {
            return Ok(tools);
        }
        let tools = self.inner.list_tools(ctx, agent).await?;
        *self.cache.lock() = Some(tools.clone());
        Ok(tools)
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        self.inner.call_tool(tool_name, arguments).await
    }
}

struct McpToolObject {
    server: Arc<dyn McpServer>,
    tool: McpTool,
}

impl ToolObject for McpToolObject {
    fn name(&self) -> &str {
        &self.tool.name
    }

    fn description(&self) -> &str {
        self.tool.description.as_deref().unwrap_or_default()
    }

    fn parameter_schema(&self) -> &Value {
        &self.tool.input_schema
    }

    fn execute(
        &self,
        _ctx: RunContext,
        arguments: &str,
    ) -> BoxFuture<'static, ToolResult> {
        let arguments = match arguments.trim() {
            "" => Ok(None),
            arguments => serde_json::from_str(arguments).map(Some),
        };
        let server = Arc::clone(&self.server);
        let name = self.tool.name.clone();
        async move {
            let arguments = arguments.map_err(tool::Error::from)?;
            trace!("invoking MCP tool `{name}` on `{}`", server.name());
            let result =
                server.call_tool(&name, arguments).await.map_err(|err| {
                    tool::Error::execution_error()
                        .with_reason(format!("error invoking MCP tool: {err}"))
                })?;
            let output = result.normalize();
            if result.is_error {
                return Err(tool::Error::execution_error().with_reason(output));
            }
            Ok(output)
        }
        .boxed()
    }
}

/// Lists the tools of every server as function tools, in server order.
///
/// Two servers exposing the same tool name is a user error, raised before
/// any tool runs.
pub(crate) async fn all_mcp_tools(
    servers: &[Arc<dyn McpServer>],
    ctx: &RunContext,
    agent: &Agent,
) -> Result<Vec<FunctionTool>> {
    let mut names = HashSet::new();
    let mut tools = Vec::new();
    for server in servers {
        let server_tools =
            server.list_tools(ctx, agent).await.map_err(|source| {
                Error::Mcp {
                    server: server.name().to_owned(),
                    source,
                }
            })?;

        let duplicates: Vec<_> = server_tools
            .iter()
            .filter(|tool| names.contains(&tool.name))
            .map(|tool| tool.name.as_str())
            .collect();
        if !duplicates.is_empty() {
            return Err(Error::user(format!(
                "duplicate tool names found across MCP servers: {}",
                duplicates.join(", ")
            )));
        }

        for tool in server_tools {
            names.insert(tool.name.clone());
            let object = McpToolObject {
                server: Arc::clone(server),
                tool,
            };
            let tool = FunctionTool::from_object(Arc::new(object));
            tools.push(tool.with_strict(false));
        }
    }
    Ok(tools)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// An in-process server whose tools echo their arguments.
    pub struct FakeMcpServer {
        pub name: String,
        pub tools: Vec<String>,
        pub list_calls: AtomicUsize,
        pub tool_calls: Arc<Mutex<Vec<String>>>,
        pub offline: bool,
    }

    impl FakeMcpServer {
        pub fn new(name: &str, tools: &[&str]) -> Self {
            Self {
                name: name.to_owned(),
                tools: tools.iter().map(ToString::to_string).collect(),
                list_calls: AtomicUsize::new(0),
                tool_calls: Default::default(),
                offline: false,
            }
        }

        pub fn offline(name: &str) -> Self {
            Self {
                offline: true,
                ..Self::new(name, &[])
            }
        }
    }

    #[async_trait]
    impl McpServer for FakeMcpServer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&self) -> Result<(), McpError> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<(), McpError> {
            Ok(())
        }

        async fn list_tools(
            &self,
            _ctx: &RunContext,
            _agent: &Agent,
        ) -> Result<Vec<McpTool>, McpError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.offline {
                return Err(McpError::Server("connection reset".to_owned()));
            }
            Ok(self
                .tools
                .iter()
                .map(|name| McpTool {
                    name: name.clone(),
                    description: None,
                    input_schema: json!({ "type": "object" }),
                })
                .collect())
        }

        async fn call_tool(
            &self,
            tool_name: &str,
            arguments: Option<Map<String, Value>>,
        ) -> Result<CallToolResult, McpError> {
            self.tool_calls.lock().push(tool_name.to_owned());
            let text = Value::Object(arguments.unwrap_or_default()).to_string();
            Ok(CallToolResult {
                content: vec![McpContent::Text { text }],
                is_error: false,
            })
        }
    }

    #[test]
    fn test_normalize() {
        let text = |text: &str| McpContent::Text {
            text: text.to_owned(),
        };
        let result = CallToolResult::default();
        assert_eq!(result.normalize(), "[]");

        let result = CallToolResult {
            content: vec![text("a")],
            is_error: false,
        };
        assert_eq!(result.normalize(), r#"{"type":"text","text":"a"}"#);

        let result = CallToolResult {
            content: vec![text("a"), text("b")],
            is_error: false,
        };
        let value: Value = serde_json::from_str(&result.normalize()).unwrap();
        assert_eq!(
            value,
            json!([
                { "type": "text", "text": "a" },
                { "type": "text", "text": "b" },
            ])
        );
    }

    #[tokio::test]
    async fn test_all_tools() {
        let agent = Agent::builder("agent").build();
        let ctx = RunContext::new();
        let server = Arc::new(FakeMcpServer::new("fs", &["read", "write"]));
        let servers: Vec<Arc<dyn McpServer>> = vec![server.clone()];

        let tools = all_mcp_tools(&servers, &ctx, &agent).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert!(!tools[0].spec().strict);

        let output = tools[0].invoke(ctx.clone(), r#"{"path":"a"}"#).await;
        let output: Value = serde_json::from_str(&output.unwrap()).unwrap();
        assert_eq!(output["text"], r#"{"path":"a"}"#);
        assert_eq!(*server.tool_calls.lock(), ["read"]);
    }

    #[tokio::test]
    async fn test_duplicated_names() {
        let agent = Agent::builder("agent").build();
        let servers: Vec<Arc<dyn McpServer>> = vec![
            Arc::new(FakeMcpServer::new("a", &["read", "search"])),
            Arc::new(FakeMcpServer::new("b", &["search"])),
        ];
        let Err(err) =
            all_mcp_tools(&servers, &RunContext::new(), &agent).await
        else {
            panic!("duplicate tool names should be rejected");
        };
        let Error::User(message) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("search"));
    }

    #[tokio::test]
    async fn test_list_failure() {
        let agent = Agent::builder("agent").build();
        let servers: Vec<Arc<dyn McpServer>> = vec![
            Arc::new(FakeMcpServer::new("a", &["read"])),
            Arc::new(FakeMcpServer::offline("b")),
        ];
        let Err(err) =
            all_mcp_tools(&servers, &RunContext::new(), &agent).await
        else {
            panic!("listing an offline server should fail");
        };
        let Error::Mcp { server, source } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(server, "b");
        assert!(matches!(source, McpError::Server(_)));
    }

    #[tokio::test]
    async fn test_cache() {
        let agent = Agent::builder("agent").build();
        let ctx = RunContext::new();
        let server = CachedMcpServer::new(FakeMcpServer::new("a", &["read"]));

        for _ in 0..3 {
            server.list_tools(&ctx, &agent).await.unwrap();
        }
        assert_eq!(server.inner().list_calls.load(Ordering::SeqCst), 1);

        server.invalidate_tools_cache();
        server.list_tools(&ctx, &agent).await.unwrap();
        assert_eq!(server.inner().list_calls.load(Ordering::SeqCst), 2);
    }
}
