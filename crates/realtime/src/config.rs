use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tandem_core::guardrail::OutputGuardrail;
use tandem_model::{FunctionToolSpec, ToolChoice};

/// The default transcript length between two guardrail checks.
pub const DEFAULT_DEBOUNCE_TEXT_LENGTH: usize = 100;

/// Settings of a realtime model session.
///
/// Every field is optional, `None` means "use the transport default".
/// Settings are layered run → agent through [`Self::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSessionSettings {
    /// Name of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// System instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Output modalities, e.g. `text` and `audio`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Format of the audio sent by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    /// Format of the audio produced by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
    /// Transcription of the user's audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Value>,
    /// Turn detection of the user's audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<Value>,
    /// Tool choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Function tools of the current agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<FunctionToolSpec>>,
    /// Handoffs of the current agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoffs: Option<Vec<FunctionToolSpec>>,
    /// Transport-specific arguments passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Map<String, Value>>,
}

impl RealtimeSessionSettings {
    /// Overlays `overrides` on top of `self`.
    ///
    /// Every `Some` field of `overrides` replaces the field of `self`.
    /// `extra_args` is merged key-wise, keys of `overrides` winning.
    pub fn resolve(
        &self,
        overrides: Option<&RealtimeSessionSettings>,
    ) -> RealtimeSessionSettings {
        let Some(o) = overrides else {
            return self.clone();
        };

        let extra_args = match (&self.extra_args, &o.extra_args) {
            (Some(base), Some(over)) => {
                let mut merged = base.clone();
                merged.extend(over.clone());
                Some(merged)
            }
            (base, over) => over.clone().or_else(|| base.clone()),
        };

        fn pick<T: Clone>(over: &Option<T>, base: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }

        RealtimeSessionSettings {
            model_name: pick(&o.model_name, &self.model_name),
            instructions: pick(&o.instructions, &self.instructions),
            voice: pick(&o.voice, &self.voice),
            modalities: pick(&o.modalities, &self.modalities),
            input_audio_format: pick(
                &o.input_audio_format,
                &self.input_audio_format,
            ),
            output_audio_format: pick(
                &o.output_audio_format,
                &self.output_audio_format,
            ),
            input_audio_transcription: pick(
                &o.input_audio_transcription,
                &self.input_audio_transcription,
            ),
            turn_detection: pick(&o.turn_detection, &self.turn_detection),
            tool_choice: pick(&o.tool_choice, &self.tool_choice),
            tools: pick(&o.tools, &self.tools),
            handoffs: pick(&o.handoffs, &self.handoffs),
            extra_args,
        }
    }

    /// Sets the model name.
    #[inline]
    pub fn with_model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Sets the voice.
    #[inline]
    pub fn with_voice<S: Into<String>>(mut self, voice: S) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Sets the tool choice.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Adds a transport-specific argument.
    #[inline]
    pub fn with_extra_arg<S: Into<String>>(
        mut self,
        key: S,
        value: Value,
    ) -> Self {
        self.extra_args
            .get_or_insert_default()
            .insert(key.into(), value);
        self
    }
}

/// Options of a transport connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RealtimeModelConfig {
    /// API key, when the transport needs one.
    pub api_key: Option<String>,
    /// Endpoint, when it differs from the transport default.
    pub url: Option<String>,
    /// Settings of the session, derived from the starting agent.
    pub initial_settings: RealtimeSessionSettings,
}

/// Session-wide settings of a [`RealtimeRunner`](crate::RealtimeRunner).
#[derive(Clone)]
pub struct RealtimeRunConfig {
    /// Settings the agents' settings are overlaid on.
    pub model_settings: Option<RealtimeSessionSettings>,
    /// Output guardrails run in addition to the current agent's ones.
    pub output_guardrails: Vec<OutputGuardrail>,
    /// Length of transcript between two guardrail checks.
    pub debounce_text_length: usize,
    /// Disables the span of the session.
    pub tracing_disabled: bool,
    /// API key passed to the transport.
    pub api_key: Option<String>,
    /// Endpoint passed to the transport.
    pub url: Option<String>,
}

impl Default for RealtimeRunConfig {
    fn default() -> Self {
        Self {
            model_settings: None,
            output_guardrails: vec![],
            debounce_text_length: DEFAULT_DEBOUNCE_TEXT_LENGTH,
            tracing_disabled: false,
            api_key: None,
            url: None,
        }
    }
}

impl RealtimeRunConfig {
    /// Creates the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base session settings.
    #[inline]
    pub fn with_model_settings(
        mut self,
        settings: RealtimeSessionSettings,
    ) -> Self {
        self.model_settings = Some(settings);
        self
    }

    /// Adds a session-wide output guardrail.
    #[inline]
    pub fn with_output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Sets the transcript length between two guardrail checks.
    #[inline]
    pub fn with_debounce_text_length(mut self, len: usize) -> Self {
        self.debounce_text_length = len;
        self
    }

    /// Disables the span of the session.
    #[inline]
    pub fn with_tracing_disabled(mut self, disabled: bool) -> Self {
        self.tracing_disabled = disabled;
        self
    }

    /// Sets the API key passed to the transport.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
