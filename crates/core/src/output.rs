use std::sync::Arc;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tandem_model::OutputSchemaSpec;

use crate::{Error, Result};

type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// The type of an agent's final output, described as a JSON schema.
///
/// Schemas that are not objects are wrapped into `{"response": ...}`, since
/// providers only accept object schemas. [`Self::validate_json`] unwraps
/// them again.
#[derive(Clone)]
pub struct OutputSchema {
    name: String,
    schema: Value,
    wrapped: bool,
    strict: bool,
    validate: ValidateFn,
}

impl OutputSchema {
    /// Derives the schema from `T`.
    pub fn of<T>() -> Self
    where
        T: JsonSchema + DeserializeOwned + 'static,
    {
        let inner = schema_for!(T).to_value();
        let is_object =
            inner.get("type").and_then(Value::as_str) == Some("object");
        let (schema, wrapped) = if is_object {
            (inner, false)
        } else {
            let wrapper = json!({
                "type": "object",
                "properties": { "response": inner },
                "required": ["response"],
                "additionalProperties": false,
            });
            (wrapper, true)
        };

        Self {
            name: T::schema_name().into_owned(),
            schema,
            wrapped,
            strict: true,
            validate: Arc::new(|value: &Value| {
                T::deserialize(value).map(drop).map_err(|err| err.to_string())
            }),
        }
    }

    /// Sets whether the provider should enforce the schema strictly.
    #[inline]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns the name of the output type.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema sent to the provider.
    #[inline]
    pub fn json_schema(&self) -> &Value {
        &self.schema
    }

    /// Returns `true` if the output type was wrapped into an object.
    #[inline]
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Describes this schema for the model.
    pub fn spec(&self) -> OutputSchemaSpec {
        OutputSchemaSpec {
            name: self.name.clone(),
            schema: self.schema.clone(),
            strict: self.strict,
        }
    }

    /// Parses the model's text output and checks it against the type.
    ///
    /// Returns the value of the output type, unwrapped if needed. Invalid
    /// JSON and type mismatches are model behavior errors.
    pub fn validate_json(&self, text: &str) -> Result<Value> {
        let value: Value = serde_json::from_str(text).map_err(|err| {
            Error::model_behavior(format!(
                "invalid JSON when parsing {} output: {err}",
                self.name
            ))
        })?;

        let value = if self.wrapped {
            let Value::Object(mut object) = value else {
                return Err(Error::model_behavior(format!(
                    "expected an object wrapping the {} output",
                    self.name
                )));
            };
            object.remove("response").ok_or_else(|| {
                Error::model_behavior(format!(
                    "missing `response` key in {} output",
                    self.name
                ))
            })?
        } else {
            value
        };

        (self.validate)(&value).map_err(|err| {
            Error::model_behavior(format!(
                "output does not match {}: {err}",
                self.name
            ))
        })?;
        Ok(value)
    }
}

impl std::fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSchema")
            .field("name", &self.name)
            .field("wrapped", &self.wrapped)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}
