//! End-to-end scraping pipeline: fetch → normalize → persist raw text →
//! build schema → extract → price → persist structured output.

use crate::config::{Credentials, ScraperConfig};
use crate::extractor::{Backend, ExtractionRouter, TokenUsage};
use crate::fetcher::Fetcher;
use crate::normalizer::{page_title, Normalizer};
use crate::pricing::{price, CostBreakdown};
use crate::providers::gemini::GeminiBackend;
use crate::providers::openai::OpenAiBackend;
use crate::providers::openai_compat::OpenAiCompatBackend;
use crate::schema::ExtractionSchema;
use crate::{output, ScrapeError};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

/// One extraction request: which page, which fields, which backend.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub fields: Vec<String>,
    pub backend: String,
}

impl ScrapeRequest {
    pub fn new(
        url: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            backend: backend.into(),
        }
    }
}

/// Files written for one request. The raw artifact is written before the
/// extraction call, so it is retained for diagnosis even when later stages
/// fail.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPaths {
    pub raw_text: PathBuf,
    pub json: PathBuf,
    pub table: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub url: String,
    pub page_title: Option<String>,
    pub data: Value,
    pub usage: TokenUsage,
    pub cost: CostBreakdown,
    pub artifacts: ArtifactPaths,
}

/// Pipeline owner. Holds the shared fetch cache, rate limiter and worker
/// pool; everything else is per-request.
pub struct Scraper {
    fetcher: Fetcher,
    normalizer: Normalizer,
    router: Arc<ExtractionRouter>,
    config: ScraperConfig,
    semaphore: Arc<Semaphore>,
}

impl Scraper {
    pub fn new(config: ScraperConfig, router: ExtractionRouter) -> Self {
        let fetcher = Fetcher::with_config(&config);
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            router: Arc::new(router),
            config,
            semaphore,
        }
    }

    /// Builds a scraper with every backend the environment has credentials
    /// for; the local LM Studio backend is always registered.
    pub fn from_env(config: ScraperConfig) -> Result<Self, ScrapeError> {
        let credentials = Credentials::from_env();
        let router = router_from_credentials(&credentials)?;
        Ok(Self::new(config, router))
    }

    pub fn supported_backends(&self) -> Vec<Backend> {
        self.router.supported()
    }

    /// Runs the full pipeline for one request. Fetch-level transient errors
    /// are retried inside the fetcher; every other failure surfaces
    /// immediately, identifying the stage that failed.
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url, backend = %request.backend), err)]
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeReport, ScrapeError> {
        // Validate the cheap parts before touching the network.
        let backend = Backend::parse(&request.backend)?;
        let schema = ExtractionSchema::build(request.fields.clone())?;
        let timestamp = output::timestamp_now();

        let html = self.fetcher.fetch_page(&request.url).await?;
        let title = page_title(&html);

        let text =
            self.normalizer
                .normalize_for_backend(&html, backend, self.config.max_input_tokens);
        let raw_text = output::save_raw_data(&text, &timestamp, &self.config.output_dir)?;

        let (data, usage) = self.router.extract(&text, &schema, &request.backend).await?;
        let cost = price(&usage, &request.backend)?;

        let (json, table) =
            output::save_structured_data(&data, &timestamp, &self.config.output_dir)?;

        info!(
            url = %request.url,
            backend = %backend,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_cost = cost.total_cost,
            "Scrape completed"
        );

        Ok(ScrapeReport {
            url: request.url.clone(),
            page_title: title,
            data,
            usage,
            cost,
            artifacts: ArtifactPaths {
                raw_text,
                json,
                table,
            },
        })
    }

    /// Scrapes several URLs with the same field set and backend. A bounded
    /// worker pool caps concurrency; each result is paired with its
    /// originating URL, and completion order carries no meaning.
    pub async fn scrape_batch(
        &self,
        urls: &[String],
        fields: &[String],
        backend: &str,
    ) -> Vec<(String, Result<ScrapeReport, ScrapeError>)> {
        debug!(count = urls.len(), backend = %backend, "Starting batch scrape");

        let tasks = urls.iter().map(|url| {
            let request = ScrapeRequest::new(url.clone(), fields.to_vec(), backend);
            async move {
                let result = match self.semaphore.acquire().await {
                    Ok(_permit) => self.scrape(&request).await,
                    Err(_) => Err(ScrapeError::ConcurrencyLimitError),
                };
                if let Err(e) = &result {
                    e.log();
                }
                (request.url, result)
            }
        });

        join_all(tasks).await
    }
}

/// Registers an adapter for every backend the credentials cover. The local
/// LM Studio endpoint needs no key and is always available.
pub fn router_from_credentials(
    credentials: &Credentials,
) -> Result<ExtractionRouter, ScrapeError> {
    credentials.validate()?;

    let mut router = ExtractionRouter::new();

    if let Some(key) = &credentials.openai_api_key {
        router.register(Arc::new(OpenAiBackend::new(key.clone(), Backend::Gpt4oMini)));
        router.register(Arc::new(OpenAiBackend::new(key.clone(), Backend::Gpt4o)));
    }
    if let Some(key) = &credentials.google_api_key {
        router.register(Arc::new(GeminiBackend::new(key.clone())));
    }
    if let Some(key) = &credentials.groq_api_key {
        router.register(Arc::new(OpenAiCompatBackend::groq(key.clone())));
    }
    router.register(Arc::new(OpenAiCompatBackend::lm_studio(
        credentials.lmstudio_base_url.clone(),
    )));

    Ok(router)
}
