//! Typed calls into the language model.
//!
//! Every structured call names a schema type; the raw JSON completion is deserialized into it and
//! checked with [`OracleSchema::validate`]. Callers decide what to do with an [`OracleError`], it is
//! never turned into a request failure.

use serde::de::DeserializeOwned;
use serde_json::Value;

use pagerag_config::LlmProviderConfig;

use crate::{LlmProvider, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
	#[error("Oracle output did not match {schema}: {message}")]
	Parse { schema: &'static str, message: String },
	#[error("Oracle unavailable: {message}")]
	Unavailable { message: String },
}

pub trait OracleSchema
where
	Self: DeserializeOwned,
{
	/// Task label carried in the prompt.
	const NAME: &'static str;

	/// JSON shape the model is asked to produce.
	fn shape() -> &'static str;

	fn validate(&self) -> Result<(), String> {
		Ok(())
	}
}

pub async fn invoke<T>(
	llm: &dyn LlmProvider,
	cfg: &LlmProviderConfig,
	messages: &[Value],
) -> Result<T, OracleError>
where
	T: OracleSchema,
{
	let raw = llm.complete_json(cfg, messages).await.map_err(|err| match err {
		ProviderError::InvalidResponse { message } => OracleError::Parse { schema: T::NAME, message },
		ProviderError::SerdeJson(inner) =>
			OracleError::Parse { schema: T::NAME, message: inner.to_string() },
		other => OracleError::Unavailable { message: other.to_string() },
	})?;
	let parsed: T = serde_json::from_value(raw)
		.map_err(|err| OracleError::Parse { schema: T::NAME, message: err.to_string() })?;

	parsed.validate().map_err(|message| OracleError::Parse { schema: T::NAME, message })?;

	Ok(parsed)
}

/// Builds a system + user chat transcript for a schema-typed call.
pub fn schema_messages<T>(instructions: &str, user: &str) -> Vec<Value>
where
	T: OracleSchema,
{
	let system = format!(
		"Task: {}\n\n{}\n\nRespond ONLY with JSON matching this schema:\n{}",
		T::NAME,
		instructions.trim(),
		T::shape()
	);

	chat_messages(&system, user)
}

pub fn chat_messages(system: &str, user: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}
