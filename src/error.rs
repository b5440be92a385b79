use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Invalid field specification: {0}")]
    SchemaError(String),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackendError(String),

    #[error("Failed to parse extraction output: {0}")]
    ExtractionParseError(String),

    #[error("No pricing entry for model: {0}")]
    UnknownModelError(String),

    #[error("Failed to materialize result: {0}")]
    SerializationError(String),

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Too many concurrent requests")]
    ConcurrencyLimitError,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn log(&self) {
        match self {
            ScrapeError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            ScrapeError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            ScrapeError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            ScrapeError::SchemaError(e) => {
                warn!(error = %e, "Invalid field specification");
            }
            ScrapeError::UnsupportedBackendError(e) => {
                warn!(error = %e, "Unsupported extraction backend");
            }
            ScrapeError::ExtractionParseError(e) => {
                error!(error = %e, "Extraction output could not be parsed");
            }
            ScrapeError::UnknownModelError(e) => {
                warn!(error = %e, "Pricing lookup failed");
            }
            ScrapeError::SerializationError(e) => {
                error!(error = %e, "Result materialization failed");
            }
            ScrapeError::ExternalServiceError { service, message } => {
                error!(
                    service = %service,
                    error = %message,
                    "External service error occurred"
                );
            }
            ScrapeError::InvalidConfiguration(e) => {
                warn!(error = %e, "Invalid configuration");
            }
            ScrapeError::ConcurrencyLimitError => {
                warn!("Concurrency limit reached");
            }
            ScrapeError::IoError(e) => {
                error!(error = %e, "I/O operation failed");
            }
        }
    }
}
