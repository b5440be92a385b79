//! Backend adapter implementations.
//!
//! One adapter per supported extraction service, each absorbing that
//! service's request/response contract behind the `ExtractionBackend` trait:
//! OpenAI (native schema constraint via tool parameters), Gemini (native
//! `response_schema`), and OpenAI-compatible free-form endpoints (Groq,
//! local LM Studio) whose JSON text output is parsed but not schema-validated.

use crate::extractor::{Backend, BackendResponse, ExtractionBackend, TokenUsage};
use crate::schema::ExtractionSchema;
use crate::ScrapeError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Parses backend text that is expected to be pure JSON. Falls back to
/// extracting the outermost object or array when the model wrapped the JSON
/// in prose, and fails with `ExtractionParseError` otherwise.
pub(crate) fn parse_json_response(text: &str) -> Result<Value, ScrapeError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(ScrapeError::ExtractionParseError(format!(
        "backend returned non-JSON content: {}",
        crate::utils::truncate_str(text, 120)
    )))
}

fn external_error(service: &str, message: impl ToString) -> ScrapeError {
    ScrapeError::ExternalServiceError {
        service: service.to_string(),
        message: message.to_string(),
    }
}

/// Mock backend for tests: returns a canned response, optionally with canned
/// usage counts, and records the prompts it was given.
pub struct MockBackend {
    backend: Backend,
    response: Value,
    usage: Option<TokenUsage>,
    calls: AtomicUsize,
    last_system: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new(backend: Backend, response: Value) -> Self {
        Self {
            backend,
            response,
            usage: None,
            calls: AtomicUsize::new(0),
            last_system: Mutex::new(None),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_system_message(&self) -> Option<String> {
        self.last_system.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    fn id(&self) -> Backend {
        self.backend
    }

    async fn complete(
        &self,
        system: &str,
        _user: &str,
        _schema: &ExtractionSchema,
    ) -> Result<BackendResponse, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_system.lock() {
            *guard = Some(system.to_string());
        }
        Ok(BackendResponse {
            raw: self.response.clone(),
            usage: self.usage,
        })
    }
}

pub mod openai {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionObjectArgs,
    };
    use async_openai::Client;

    /// OpenAI chat-completions adapter. The container schema is passed as
    /// tool parameters, so the model's answer is constrained to the schema;
    /// the parsed tool-call arguments are the extraction result.
    pub struct OpenAiBackend {
        client: Client<OpenAIConfig>,
        backend: Backend,
    }

    impl OpenAiBackend {
        pub fn new(api_key: String, backend: Backend) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            Self::from_config(config, backend)
        }

        pub fn from_config(config: OpenAIConfig, backend: Backend) -> Self {
            Self {
                client: Client::with_config(config),
                backend,
            }
        }
    }

    #[async_trait]
    impl ExtractionBackend for OpenAiBackend {
        fn id(&self) -> Backend {
            self.backend
        }

        async fn complete(
            &self,
            system: &str,
            user: &str,
            schema: &ExtractionSchema,
        ) -> Result<BackendResponse, ScrapeError> {
            let function = FunctionObjectArgs::default()
                .name("record_listings")
                .description("Record the listings extracted from the page content")
                .parameters(schema.container_schema().clone())
                .build()
                .map_err(|e| external_error("OpenAI", e))?;

            let tool = ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()
                .map_err(|e| external_error("OpenAI", e))?;

            let system_message = ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| external_error("OpenAI", e))?;

            let user_message = ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| external_error("OpenAI", e))?;

            let request = CreateChatCompletionRequestArgs::default()
                .model(self.backend.as_str())
                .messages(vec![
                    ChatCompletionRequestMessage::System(system_message),
                    ChatCompletionRequestMessage::User(user_message),
                ])
                .tools(vec![tool])
                .tool_choice("required")
                .build()
                .map_err(|e| external_error("OpenAI", e))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| external_error("OpenAI", e))?;

            let usage = response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens as u64,
                output_tokens: u.completion_tokens as u64,
            });

            let choice = response
                .choices
                .first()
                .ok_or_else(|| external_error("OpenAI", "empty response"))?;

            if let Some(tool_calls) = &choice.message.tool_calls {
                if let Some(call) = tool_calls.first() {
                    let raw: Value =
                        serde_json::from_str(&call.function.arguments).map_err(|e| {
                            ScrapeError::ExtractionParseError(format!(
                                "OpenAI tool arguments were not valid JSON: {e}"
                            ))
                        })?;
                    return Ok(BackendResponse { raw, usage });
                }
            }

            // Some gateways answer with plain content instead of a tool call.
            if let Some(content) = &choice.message.content {
                let raw = parse_json_response(content)?;
                return Ok(BackendResponse { raw, usage });
            }

            Err(external_error(
                "OpenAI",
                "no tool call or content in response",
            ))
        }
    }
}

pub mod gemini {
    use super::*;
    use serde_json::json;

    const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

    /// Gemini adapter. Uses the JSON response mode with a native
    /// `response_schema`; usage comes from the response's `usageMetadata`.
    pub struct GeminiBackend {
        client: reqwest::Client,
        api_key: String,
    }

    impl GeminiBackend {
        pub fn new(api_key: String) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key,
            }
        }
    }

    /// Converts a JSON schema value into Gemini's schema dialect:
    /// uppercase type names, no `additionalProperties`.
    pub(crate) fn to_gemini_schema(schema: &Value) -> Value {
        match schema {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, value) in map {
                    match key.as_str() {
                        "type" => {
                            if let Some(ty) = value.as_str() {
                                out.insert("type".to_string(), Value::String(ty.to_uppercase()));
                            }
                        }
                        "properties" => {
                            if let Some(props) = value.as_object() {
                                let converted: serde_json::Map<String, Value> = props
                                    .iter()
                                    .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                                    .collect();
                                out.insert("properties".to_string(), Value::Object(converted));
                            }
                        }
                        "items" => {
                            out.insert("items".to_string(), to_gemini_schema(value));
                        }
                        "required" => {
                            out.insert("required".to_string(), value.clone());
                        }
                        _ => {}
                    }
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    #[async_trait]
    impl ExtractionBackend for GeminiBackend {
        fn id(&self) -> Backend {
            Backend::Gemini15Flash
        }

        async fn complete(
            &self,
            system: &str,
            user: &str,
            schema: &ExtractionSchema,
        ) -> Result<BackendResponse, ScrapeError> {
            let url = format!(
                "{API_BASE}/{}:generateContent?key={}",
                Backend::Gemini15Flash.as_str(),
                self.api_key
            );

            let request_body = json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": format!("{system}\n{user}") }],
                }],
                "generationConfig": {
                    "response_mime_type": "application/json",
                    "response_schema": to_gemini_schema(schema.container_schema()),
                },
            });

            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .await
                .map_err(|e| ScrapeError::FetchError(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(external_error(
                    "Gemini",
                    format!("API returned {status}: {body}"),
                ));
            }

            let response_json: Value = response
                .json()
                .await
                .map_err(|e| ScrapeError::ExtractionParseError(e.to_string()))?;

            let content = response_json["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .ok_or_else(|| external_error("Gemini", "no content in response"))?;

            let raw = parse_json_response(content)?;

            let usage = response_json.get("usageMetadata").map(|metadata| TokenUsage {
                input_tokens: metadata["promptTokenCount"].as_u64().unwrap_or(0),
                output_tokens: metadata["candidatesTokenCount"].as_u64().unwrap_or(0),
            });

            Ok(BackendResponse { raw, usage })
        }
    }
}

pub mod openai_compat {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    };
    use async_openai::Client;

    pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
    pub const GROQ_LLAMA_MODEL: &str = "llama-3.1-70b-versatile";
    pub const LMSTUDIO_DEFAULT_BASE: &str = "http://localhost:1234/v1";
    pub const LMSTUDIO_LLAMA_MODEL: &str =
        "lmstudio-community/Meta-Llama-3.1-8B-Instruct-GGUF";

    /// Adapter for OpenAI-compatible chat endpoints without native schema
    /// support (Groq, local LM Studio). The schema reaches the model only as
    /// a textual description inside the system message, so the JSON text
    /// answer is parsed but not validated against the schema.
    pub struct OpenAiCompatBackend {
        client: Client<OpenAIConfig>,
        backend: Backend,
        model: String,
        service: &'static str,
    }

    impl OpenAiCompatBackend {
        pub fn groq(api_key: String) -> Self {
            let config = OpenAIConfig::new()
                .with_api_base(GROQ_API_BASE)
                .with_api_key(api_key);
            Self {
                client: Client::with_config(config),
                backend: Backend::GroqLlama70b,
                model: GROQ_LLAMA_MODEL.to_string(),
                service: "Groq",
            }
        }

        pub fn lm_studio(base_url: Option<String>) -> Self {
            let config = OpenAIConfig::new()
                .with_api_base(base_url.unwrap_or_else(|| LMSTUDIO_DEFAULT_BASE.to_string()))
                .with_api_key("lm-studio");
            Self {
                client: Client::with_config(config),
                backend: Backend::LocalLlama8b,
                model: LMSTUDIO_LLAMA_MODEL.to_string(),
                service: "LM Studio",
            }
        }
    }

    #[async_trait]
    impl ExtractionBackend for OpenAiCompatBackend {
        fn id(&self) -> Backend {
            self.backend
        }

        async fn complete(
            &self,
            system: &str,
            user: &str,
            _schema: &ExtractionSchema,
        ) -> Result<BackendResponse, ScrapeError> {
            let system_message = ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| external_error(self.service, e))?;

            let user_message = ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| external_error(self.service, e))?;

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(vec![
                    ChatCompletionRequestMessage::System(system_message),
                    ChatCompletionRequestMessage::User(user_message),
                ])
                .temperature(0.7)
                .build()
                .map_err(|e| external_error(self.service, e))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| external_error(self.service, e))?;

            let usage = response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens as u64,
                output_tokens: u.completion_tokens as u64,
            });

            let content = response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .ok_or_else(|| external_error(self.service, "no content in response"))?;

            let raw = parse_json_response(&content)?;
            Ok(BackendResponse { raw, usage })
        }
    }
}
