//! Configuration surface: pipeline knobs and backend credentials. Everything
//! here is externally supplied and read-only to the core once constructed.

use crate::retry::RetryPolicy;
use crate::ScrapeError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimit {
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Hard per-attempt cap; a hung fetch is abandoned at this boundary and
    /// counted as a failed attempt eligible for retry.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_workers: usize,
    pub cache_capacity: usize,
    pub rate_limit: RateLimit,
    /// Prefix-truncation ceiling applied to normalized text before it is
    /// sent to a backend. `None` disables truncation.
    pub max_input_tokens: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_workers: 3,
            cache_capacity: 100,
            rate_limit: RateLimit::default(),
            max_input_tokens: Some(120_000),
            output_dir: "output".into(),
        }
    }
}

impl ScraperConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_max_input_tokens(mut self, max_input_tokens: Option<usize>) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

/// Backend API credentials, read from the environment at startup. A missing
/// key simply leaves that backend unregistered.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub lmstudio_base_url: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl Credentials {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            openai_api_key: env_var("OPENAI_API_KEY"),
            google_api_key: env_var("GOOGLE_API_KEY"),
            groq_api_key: env_var("GROQ_API_KEY"),
            lmstudio_base_url: env_var("LMSTUDIO_BASE_URL"),
        }
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        if let Some(key) = &self.openai_api_key {
            ApiKeyValidator::validate_openai_key(key)?;
        }
        if let Some(key) = &self.groq_api_key {
            ApiKeyValidator::validate_groq_key(key)?;
        }
        if let Some(key) = &self.google_api_key {
            ApiKeyValidator::validate_google_key(key)?;
        }
        Ok(())
    }
}

/// API key format validation utilities
pub struct ApiKeyValidator;

impl ApiKeyValidator {
    pub fn validate_openai_key(api_key: &str) -> Result<(), ScrapeError> {
        if api_key.is_empty() {
            return Err(ScrapeError::InvalidConfiguration(
                "OpenAI API key cannot be empty".to_string(),
            ));
        }

        if !api_key.starts_with("sk-") {
            return Err(ScrapeError::InvalidConfiguration(
                "OpenAI API key must start with 'sk-'".to_string(),
            ));
        }

        if api_key.len() < 20 {
            return Err(ScrapeError::InvalidConfiguration(
                "OpenAI API key appears to be too short".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_groq_key(api_key: &str) -> Result<(), ScrapeError> {
        if api_key.is_empty() {
            return Err(ScrapeError::InvalidConfiguration(
                "Groq API key cannot be empty".to_string(),
            ));
        }

        if !api_key.starts_with("gsk_") {
            return Err(ScrapeError::InvalidConfiguration(
                "Groq API key must start with 'gsk_'".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_google_key(api_key: &str) -> Result<(), ScrapeError> {
        if api_key.len() < 20 {
            return Err(ScrapeError::InvalidConfiguration(
                "Google API key appears to be too short".to_string(),
            ));
        }

        Ok(())
    }
}
