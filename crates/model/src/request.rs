use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::items::Item;
use crate::model::ModelTracing;
use crate::settings::ModelSettings;

/// A request to be sent to the model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The system instructions.
    pub instructions: Option<String>,
    /// The ordered input items.
    pub input: Vec<Item>,
    /// Tuning settings.
    pub settings: ModelSettings,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// The schema the final output must follow, `None` for plain text.
    pub output_schema: Option<OutputSchemaSpec>,
    /// Handoffs, exposed to the model as function tools.
    pub handoffs: Vec<FunctionToolSpec>,
    /// Tracing mode for this call.
    pub tracing: ModelTracing,
}

/// Describes a function tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionToolSpec {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
    /// Whether the provider should enforce the schema strictly.
    pub strict: bool,
}

/// The execution environment of a computer tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputerEnvironment {
    /// macOS.
    Mac,
    /// Windows.
    Windows,
    /// Ubuntu.
    Ubuntu,
    /// A web browser.
    Browser,
}

/// Describes a tool the model can call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelTool {
    /// A function executed locally by the runtime.
    Function(FunctionToolSpec),
    /// File search executed by the provider.
    FileSearch {
        /// Vector stores to search.
        vector_store_ids: Vec<String>,
        /// Maximum number of results.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_num_results: Option<u32>,
        /// Whether results should be included in the output.
        #[serde(default)]
        include_search_results: bool,
    },
    /// Web search executed by the provider.
    WebSearch {
        /// Approximate location of the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_location: Option<Value>,
        /// How much context to retrieve: `low`, `medium` or `high`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_context_size: Option<String>,
    },
    /// A computer controlled by the runtime on the model's behalf.
    Computer {
        /// The environment of the computer.
        environment: ComputerEnvironment,
        /// Screen width and height in pixels.
        dimensions: (u32, u32),
    },
}

impl ModelTool {
    /// Returns the name the model uses to call this tool.
    pub fn name(&self) -> &str {
        match self {
            ModelTool::Function(spec) => &spec.name,
            ModelTool::FileSearch { .. } => "file_search",
            ModelTool::WebSearch { .. } => "web_search",
            ModelTool::Computer { .. } => "computer_use_preview",
        }
    }
}

/// The JSON schema the final output must follow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchemaSpec {
    /// Name of the output type.
    pub name: String,
    /// The JSON schema.
    pub schema: Value,
    /// Whether the provider should enforce the schema strictly.
    pub strict: bool,
}
