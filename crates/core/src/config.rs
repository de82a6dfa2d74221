use std::sync::Arc;

use tandem_model::{ModelSettings, ModelTracing};

use crate::agent::AgentModel;
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::{HandoffInputData, HandoffInputFilter};
use crate::hooks::RunHooks;
use crate::model_client::ModelProvider;

/// The default turn budget of a run.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Run-wide settings, applied on top of each agent's own configuration.
#[derive(Clone)]
pub struct RunConfig {
    /// Overrides the model of every agent.
    pub model: Option<AgentModel>,
    /// Resolves named models. Required unless every agent carries a model
    /// instance.
    pub model_provider: Option<Arc<dyn ModelProvider>>,
    /// Settings overlaid on each agent's settings.
    pub model_settings: Option<ModelSettings>,
    /// Filter applied to handoffs without their own filter.
    pub handoff_input_filter: Option<HandoffInputFilter>,
    /// Input guardrails run in addition to the starting agent's ones.
    pub input_guardrails: Vec<InputGuardrail>,
    /// Output guardrails run in addition to the final agent's ones.
    pub output_guardrails: Vec<OutputGuardrail>,
    /// Maximum number of model calls of a run.
    pub max_turns: usize,
    /// Disables the spans of the run.
    pub tracing_disabled: bool,
    /// Whether model inputs and outputs are recorded in traces.
    pub trace_include_sensitive_data: bool,
    /// Name of the workflow, recorded on the run span.
    pub workflow_name: String,
    /// Hooks observing the run.
    pub hooks: Option<Arc<dyn RunHooks>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: None,
            model_provider: None,
            model_settings: None,
            handoff_input_filter: None,
            input_guardrails: vec![],
            output_guardrails: vec![],
            max_turns: DEFAULT_MAX_TURNS,
            tracing_disabled: false,
            trace_include_sensitive_data: true,
            workflow_name: "Agent workflow".to_owned(),
            hooks: None,
        }
    }
}

impl RunConfig {
    /// Creates the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the model of every agent.
    #[inline]
    pub fn with_model<M: Into<AgentModel>>(mut self, model: M) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        mut self,
        provider: P,
    ) -> Self {
        self.model_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the run-level model settings.
    #[inline]
    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = Some(settings);
        self
    }

    /// Sets the default handoff input filter.
    #[inline]
    pub fn with_handoff_input_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(HandoffInputData) -> HandoffInputData + Send + Sync + 'static,
    {
        self.handoff_input_filter = Some(Arc::new(filter));
        self
    }

    /// Adds a run-level input guardrail.
    #[inline]
    pub fn with_input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Adds a run-level output guardrail.
    #[inline]
    pub fn with_output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Sets the turn budget.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Disables the spans of the run.
    #[inline]
    pub fn with_tracing_disabled(mut self, disabled: bool) -> Self {
        self.tracing_disabled = disabled;
        self
    }

    /// Sets whether model inputs and outputs are recorded in traces.
    #[inline]
    pub fn with_sensitive_data(mut self, include: bool) -> Self {
        self.trace_include_sensitive_data = include;
        self
    }

    /// Sets the workflow name.
    #[inline]
    pub fn with_workflow_name<S: Into<String>>(mut self, name: S) -> Self {
        self.workflow_name = name.into();
        self
    }

    /// Attaches run hooks.
    #[inline]
    pub fn with_hooks<H: RunHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Returns the tracing mode of model calls.
    pub(crate) fn model_tracing(&self) -> ModelTracing {
        if self.tracing_disabled {
            ModelTracing::Disabled
        } else if self.trace_include_sensitive_data {
            ModelTracing::Enabled
        } else {
            ModelTracing::EnabledWithoutData
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.workflow_name, "Agent workflow");
        assert!(config.trace_include_sensitive_data);
        assert_eq!(config.model_tracing(), ModelTracing::Enabled);

        let config = config.with_sensitive_data(false);
        assert_eq!(config.model_tracing(), ModelTracing::EnabledWithoutData);
        let config = config.with_tracing_disabled(true);
        assert_eq!(config.model_tracing(), ModelTracing::Disabled);
    }
}
