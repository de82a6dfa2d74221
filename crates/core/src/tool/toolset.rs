use std::collections::HashMap;

use tandem_model::ModelTool;

use super::{AgentTool, ComputerTool, FunctionTool};

/// The resolved tools of an agent for one turn, indexed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<AgentTool>,
    functions: HashMap<String, usize>,
    computer: Option<usize>,
}

impl ToolSet {
    /// Indexes the tools. When two function tools share a name, the first
    /// one is kept for dispatch.
    pub fn new(tools: Vec<AgentTool>) -> Self {
        let mut functions = HashMap::with_capacity(tools.len());
        let mut computer = None;
        for (idx, tool) in tools.iter().enumerate() {
            match tool {
                AgentTool::Function(tool) => {
                    if functions.contains_key(tool.name()) {
                        warn!("duplicated function tool: {}", tool.name());
                        continue;
                    }
                    functions.insert(tool.name().to_owned(), idx);
                }
                AgentTool::Computer(_) => {
                    computer.get_or_insert(idx);
                }
                AgentTool::FileSearch(_) | AgentTool::WebSearch(_) => {}
            }
        }
        Self {
            tools,
            functions,
            computer,
        }
    }

    /// Returns the function tool with the given name.
    pub fn function(&self, name: &str) -> Option<&FunctionTool> {
        let idx = *self.functions.get(name)?;
        match &self.tools[idx] {
            AgentTool::Function(tool) => Some(tool),
            _ => None,
        }
    }

    /// Returns the computer tool, if any.
    pub fn computer(&self) -> Option<&ComputerTool> {
        match &self.tools[self.computer?] {
            AgentTool::Computer(tool) => Some(tool),
            _ => None,
        }
    }

    /// Describes every tool for the model, in declaration order.
    #[inline]
    pub fn specs(&self) -> Vec<ModelTool> {
        self.tools.iter().map(AgentTool::spec).collect()
    }

    /// Returns the tools in declaration order.
    #[inline]
    pub fn tools(&self) -> &[AgentTool] {
        &self.tools
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if there are no tools.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{FileSearchTool, Tool, ToolResult};
    use crate::RunContext;

    struct TestTool(&'static str, Value);

    impl Tool for TestTool {
        type Input = Value;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "A test tool"
        }

        fn parameter_schema(&self) -> &Value {
            &self.1
        }

        fn execute(
            &self,
            _ctx: RunContext,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(self.0.to_owned()))
        }
    }

    #[tokio::test]
    async fn test_lookup() {
        let toolset = ToolSet::new(vec![
            FileSearchTool::default().into(),
            FunctionTool::new(TestTool("test_tool", json!({}))).into(),
            FunctionTool::new(TestTool("test_tool", json!({ "dup": true })))
                .into(),
        ]);

        assert_eq!(toolset.len(), 3);
        assert!(toolset.computer().is_none());
        assert!(toolset.function("read_tool").is_none());

        let tool = toolset.function("test_tool").unwrap();
        assert_eq!(tool.parameter_schema(), &json!({}));
        let output = tool.invoke(RunContext::new(), "{}").await.unwrap();
        assert_eq!(output, "test_tool");

        let names: Vec<_> = toolset
            .specs()
            .iter()
            .map(|spec| spec.name().to_owned())
            .collect();
        assert_eq!(names, ["file_search", "test_tool", "test_tool"]);
    }
}
