//! LanguageModel trait — the abstraction over LLM backends.
//!
//! Two call shapes, matching the two ways the loop uses a model:
//! a schema-constrained structured call (policy decisions, type
//! determination, content generation/refinement) and a free-text streaming
//! call (conversational answers).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ModelError;
use crate::message::Message;

/// Configuration for a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A structured request: a completion constrained to a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRequest {
    /// The underlying completion parameters.
    pub completion: CompletionRequest,

    /// Name for the schema (some backends require one).
    pub schema_name: String,

    /// JSON Schema the output must conform to.
    pub schema: serde_json::Value,
}

/// The core LanguageModel trait.
///
/// The loop calls `structured()` or `stream_text()` without knowing which
/// backend is in play. Collaborators are injected, never global.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this backend (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Request a value conforming to the supplied schema.
    ///
    /// Returns the raw JSON value; the caller deserializes into its typed
    /// shape and treats a mismatch as a generation failure.
    async fn structured(
        &self,
        request: SchemaRequest,
    ) -> std::result::Result<serde_json::Value, ModelError>;

    /// Request a free-text answer as a stream of chunks.
    ///
    /// The receiver is the caller's handle on the answer; errors mid-stream
    /// arrive in-band.
    async fn stream_text(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<mpsc::Receiver<std::result::Result<String, ModelError>>, ModelError>;
}
