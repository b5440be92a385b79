//! Schema-driven structured data extraction from web pages.
//!
//! Pipeline: a URL is fetched (with retries, rate limiting and memoization),
//! its HTML normalized to markdown and truncated to a token budget, then an
//! LLM backend extracts the caller's requested fields into a runtime-built
//! listings schema. Token usage is normalized across backends and priced
//! from a static table; results land as timestamped JSON/CSV artifacts.

mod cache;
mod config;
mod error;
mod extractor;
mod fetcher;
mod logging;
mod normalizer;
mod output;
mod pricing;
mod providers;
mod retry;
mod schema;
mod service;
mod tokens;
mod utils;

pub use cache::FetchCache;
pub use config::{ApiKeyValidator, Credentials, RateLimit, ScraperConfig};
pub use error::ScrapeError;
pub use extractor::{
    Backend, BackendResponse, ExtractionBackend, ExtractionRouter, TokenUsage, SYSTEM_MESSAGE,
    USER_MESSAGE,
};
pub use fetcher::{Fetcher, USER_AGENTS};
pub use logging::{log_error_card, log_report_card, setup_logging, LogConfig, LogLevelGuard};
pub use normalizer::{page_title, Normalizer};
pub use output::{save_raw_data, save_structured_data, timestamp_now, to_rows, Table};
pub use pricing::{lookup_pricing, price, pricing_for, CostBreakdown, ModelPricing};
pub use providers::gemini::GeminiBackend;
pub use providers::openai::OpenAiBackend;
pub use providers::openai_compat::OpenAiCompatBackend;
pub use providers::MockBackend;
pub use retry::{retry_with_policy, RetryPolicy};
pub use schema::{ExtractionSchema, CONTAINER_KEY};
pub use service::{
    router_from_credentials, ArtifactPaths, ScrapeReport, ScrapeRequest, Scraper,
};
pub use tokens::{count_tokens, encoding_for, truncate_to_token_limit};
