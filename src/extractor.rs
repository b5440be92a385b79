//! Extraction router: dispatches normalized page text plus a runtime schema
//! to one of the supported LLM backends and normalizes their heterogeneous
//! request/response contracts into a single `(result, usage)` shape.

use crate::schema::ExtractionSchema;
use crate::tokens;
use crate::ScrapeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Instruction prepended identically for every backend to bias output toward
/// clean JSON.
pub const SYSTEM_MESSAGE: &str = "You are an intelligent text extraction and conversion assistant. \
Your task is to extract structured information from the given text and convert it into a pure JSON format. \
The JSON should contain only the structured data extracted from the text, \
with no additional commentary, explanations, or extraneous information. \
You could encounter cases where you can't find the data of the fields you have to extract or the data will be in a foreign language. \
Please process the following text and provide the output in pure JSON format with no words before or after the JSON:";

pub const USER_MESSAGE: &str =
    "Extract the following information from the provided text:\nPage content:\n\n";

/// The fixed set of supported extraction backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Gpt4oMini,
    Gpt4o,
    Gemini15Flash,
    LocalLlama8b,
    GroqLlama70b,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Gpt4oMini,
        Backend::Gpt4o,
        Backend::Gemini15Flash,
        Backend::LocalLlama8b,
        Backend::GroqLlama70b,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gpt4oMini => "gpt-4o-mini",
            Backend::Gpt4o => "gpt-4o-2024-08-06",
            Backend::Gemini15Flash => "gemini-1.5-flash",
            Backend::LocalLlama8b => "Llama3.1 8B",
            Backend::GroqLlama70b => "Groq Llama3.1 70b",
        }
    }

    pub fn parse(id: &str) -> Result<Backend, ScrapeError> {
        Backend::ALL
            .into_iter()
            .find(|backend| backend.as_str() == id)
            .ok_or_else(|| ScrapeError::UnsupportedBackendError(id.to_string()))
    }

    /// Whether the backend accepts the JSON schema as a binding constraint.
    /// Backends without native schema support receive a textual description
    /// of the expected shape instead.
    pub fn has_native_schema(&self) -> bool {
        matches!(
            self,
            Backend::Gpt4oMini | Backend::Gpt4o | Backend::Gemini15Flash
        )
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counts for one extraction call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

/// Raw backend answer before usage normalization. `usage` is present when the
/// backend reports its own prompt/completion counts.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub raw: Value,
    pub usage: Option<TokenUsage>,
}

/// Capability contract every backend adapter implements. Adapters absorb the
/// backend-specific request/response shape and never leak it past this
/// boundary.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn id(&self) -> Backend;

    async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: &ExtractionSchema,
    ) -> Result<BackendResponse, ScrapeError>;
}

/// Routes extraction requests to registered backend adapters.
#[derive(Default)]
pub struct ExtractionRouter {
    backends: HashMap<Backend, Arc<dyn ExtractionBackend>>,
}

impl std::fmt::Debug for ExtractionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRouter")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExtractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ExtractionBackend>) {
        self.backends.insert(adapter.id(), adapter);
    }

    pub fn with_backend(mut self, adapter: Arc<dyn ExtractionBackend>) -> Self {
        self.register(adapter);
        self
    }

    pub fn supported(&self) -> Vec<Backend> {
        self.backends.keys().copied().collect()
    }

    /// Runs one extraction call. Extraction failures are not retried here;
    /// they surface immediately to the caller.
    #[instrument(level = "debug", skip(self, text, schema), err)]
    pub async fn extract(
        &self,
        text: &str,
        schema: &ExtractionSchema,
        backend_id: &str,
    ) -> Result<(Value, TokenUsage), ScrapeError> {
        let backend = Backend::parse(backend_id)?;
        let adapter = self.backends.get(&backend).ok_or_else(|| {
            ScrapeError::UnsupportedBackendError(format!(
                "{backend_id} is not registered (missing credentials?)"
            ))
        })?;

        let system = if backend.has_native_schema() {
            SYSTEM_MESSAGE.to_string()
        } else {
            format!(
                "{SYSTEM_MESSAGE}\nPlease ensure the output strictly follows this schema:\n\n{}",
                schema.shape_description()
            )
        };
        let user = format!("{USER_MESSAGE}{text}");

        debug!(backend = %backend, fields = ?schema.field_names(), "Dispatching extraction call");
        let response = adapter.complete(&system, &user, schema).await?;

        let usage = match response.usage {
            Some(usage) => usage,
            None => {
                // Backend did not report counts; derive them from the actual
                // prompt and serialized response text.
                let prompt = format!("{system}\n{user}");
                TokenUsage {
                    input_tokens: tokens::count_tokens(&prompt, backend),
                    output_tokens: tokens::count_tokens(&response.raw.to_string(), backend),
                }
            }
        };

        Ok((response.raw, usage))
    }
}
