use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the model should pick tools.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
    /// The model must call the named function.
    Function(String),
}

/// Truncation strategy for inputs exceeding the context window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// Let the provider drop items from the middle of the conversation.
    Auto,
    /// Fail the request instead.
    Disabled,
}

/// How much effort a reasoning model should spend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    /// Minimal effort.
    Minimal,
    /// Low effort.
    Low,
    /// Medium effort.
    Medium,
    /// High effort.
    High,
}

/// Reasoning configuration for reasoning models.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReasoningSettings {
    /// Reasoning effort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
    /// Summary mode requested from the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Tuning settings for a model call.
///
/// Every field is optional, `None` means "use the provider default".
/// Settings are layered agent → run → call through [`ModelSettings::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Tool choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may call several tools in one turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Truncation strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    /// Maximum number of output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningSettings>,
    /// Metadata attached to the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    /// Whether the provider should store the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    /// Whether streamed responses should report usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_usage: Option<bool>,
    /// Provider-specific arguments passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Map<String, Value>>,
}

impl ModelSettings {
    /// Overlays `overrides` on top of `self`.
    ///
    /// Every `Some` field of `overrides` replaces the field of `self`.
    /// `extra_args` is merged key-wise instead, keys of `overrides` winning.
    pub fn resolve(&self, overrides: Option<&ModelSettings>) -> ModelSettings {
        let Some(o) = overrides else {
            return self.clone();
        };

        let extra_args = match (&self.extra_args, &o.extra_args) {
            (Some(base), Some(over)) => {
                let mut merged = base.clone();
                for (key, value) in over {
                    merged.insert(key.clone(), value.clone());
                }
                Some(merged)
            }
            (base, over) => over.clone().or_else(|| base.clone()),
        };

        ModelSettings {
            temperature: o.temperature.or(self.temperature),
            top_p: o.top_p.or(self.top_p),
            frequency_penalty: o.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: o.presence_penalty.or(self.presence_penalty),
            tool_choice: o
                .tool_choice
                .clone()
                .or_else(|| self.tool_choice.clone()),
            parallel_tool_calls: o
                .parallel_tool_calls
                .or(self.parallel_tool_calls),
            truncation: o.truncation.or(self.truncation),
            max_tokens: o.max_tokens.or(self.max_tokens),
            reasoning: o.reasoning.clone().or_else(|| self.reasoning.clone()),
            metadata: o.metadata.clone().or_else(|| self.metadata.clone()),
            store: o.store.or(self.store),
            include_usage: o.include_usage.or(self.include_usage),
            extra_args,
        }
    }

    /// Sets the temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the tool choice.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Sets the maximum number of output tokens.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Adds a provider-specific argument.
    #[inline]
    pub fn with_extra_arg<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.extra_args
            .get_or_insert_default()
            .insert(key.into(), value);
        self
    }
}
