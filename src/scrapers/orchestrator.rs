//! Per-source scrape runs and multi-source sequencing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::mirror::CardImageMirror;
use crate::http_client::{FetchError, PageSource};
use crate::llm::{CardExtractor, ExtractionContext, LlmError};
use crate::models::{ExtractedCard, JobStatus, ScrapeJob, Source, SourceKind};
use crate::rate_limit::RateLimiter;
use crate::repository::{
    AsyncSqlitePool, DieselCatalogRepository, DieselError, DieselScrapeJobRepository,
    DieselSourceRepository, UpsertOutcome,
};

/// Default pause between sources in a full run.
pub const DEFAULT_INTER_SOURCE_DELAY: Duration = Duration::from_millis(5000);

/// How many per-card save errors are quoted in the job note.
const MAX_QUOTED_FAILURES: usize = 3;

/// Stages of a single source run. Runs only move forward and end in
/// `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running,
    Extracting,
    Imaging,
    Persisting,
    Success,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Extracting => "extracting",
            Self::Imaging => "imaging",
            Self::Persisting => "persisting",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Errors that fail a source run.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] LlmError),

    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

/// Outcome of one source run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub source_id: String,
    pub source_name: String,
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub items_found: u32,
    pub items_created: u32,
    pub items_updated: u32,
    pub cards: Vec<ExtractedCard>,
    /// Failure reason, or a note about cards that could not be saved.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    fn failed(
        source: &Source,
        job: Option<&ScrapeJob>,
        started_at: DateTime<Utc>,
        error: String,
    ) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            job_id: job.map(|j| j.id.clone()),
            status: JobStatus::Failed,
            items_found: 0,
            items_created: 0,
            items_updated: 0,
            cards: Vec::new(),
            error: Some(error),
            started_at,
            finished_at: Utc::now().max(started_at),
        }
    }
}

struct RunOutput {
    cards: Vec<ExtractedCard>,
    upsert: UpsertOutcome,
}

impl RunOutput {
    /// Summary of per-card save failures, if any.
    fn failure_note(&self) -> Option<String> {
        if self.upsert.failed.is_empty() {
            return None;
        }
        let quoted: Vec<String> = self
            .upsert
            .failed
            .iter()
            .take(MAX_QUOTED_FAILURES)
            .map(|(name, err)| format!("{}: {}", name, err))
            .collect();
        Some(format!(
            "{} of {} cards failed to save ({})",
            self.upsert.failed.len(),
            self.cards.len(),
            quoted.join("; ")
        ))
    }
}

/// Runs scrapes against configured sources.
pub struct CatalogScraper {
    sources: DieselSourceRepository,
    jobs: DieselScrapeJobRepository,
    catalog: DieselCatalogRepository,
    pages: Arc<dyn PageSource>,
    extractor: CardExtractor,
    mirror: Arc<dyn CardImageMirror>,
    image_limiter: RateLimiter,
    inter_source_delay: Duration,
}

impl CatalogScraper {
    pub fn new(
        pool: AsyncSqlitePool,
        pages: Arc<dyn PageSource>,
        extractor: CardExtractor,
        mirror: Arc<dyn CardImageMirror>,
        image_limiter: RateLimiter,
    ) -> Self {
        Self {
            sources: DieselSourceRepository::new(pool.clone()),
            jobs: DieselScrapeJobRepository::new(pool.clone()),
            catalog: DieselCatalogRepository::new(pool),
            pages,
            extractor,
            mirror,
            image_limiter,
            inter_source_delay: DEFAULT_INTER_SOURCE_DELAY,
        }
    }

    pub fn with_inter_source_delay(mut self, delay: Duration) -> Self {
        self.inter_source_delay = delay;
        self
    }

    /// Scrape every active source, one after another.
    pub async fn scrape_all_sources(&self) -> Result<Vec<ScrapeResult>, ScrapeError> {
        let sources = self.sources.get_active().await?;
        info!("Scraping {} active sources", sources.len());
        Ok(self.scrape_sources(&sources).await)
    }

    /// Scrape the given sources in order, pausing between them.
    pub async fn scrape_sources(&self, sources: &[Source]) -> Vec<ScrapeResult> {
        let mut results = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            if i > 0 && !self.inter_source_delay.is_zero() {
                debug!("Waiting {:?} before next source", self.inter_source_delay);
                tokio::time::sleep(self.inter_source_delay).await;
            }
            results.push(self.scrape_source(source).await);
        }
        results
    }

    /// Run one source end to end. Never fails: errors are recorded in the
    /// job log and returned as a failed result.
    pub async fn scrape_source(&self, source: &Source) -> ScrapeResult {
        let started_at = Utc::now();
        let job = match self.jobs.start(&source.id).await {
            Ok(job) => job,
            Err(e) => {
                error!("Could not open job log for {}: {}", source.name, e);
                return ScrapeResult::failed(source, None, started_at, e.to_string());
            }
        };
        self.enter(source, RunPhase::Running);

        match self.run(source).await {
            Ok(output) => self.finish_success(source, &job, output).await,
            Err(e) => {
                self.enter(source, RunPhase::Failed);
                error!("Scrape of {} failed: {}", source.name, e);
                let message = e.to_string();
                if let Err(log_err) = self.jobs.finish_failed(&job, &message).await {
                    error!("Could not record failure for {}: {}", source.name, log_err);
                }
                ScrapeResult::failed(source, Some(&job), job.started_at, message)
            }
        }
    }

    fn enter(&self, source: &Source, phase: RunPhase) {
        debug!("{}: {}", source.id, phase.as_str());
    }

    async fn run(&self, source: &Source) -> Result<RunOutput, ScrapeError> {
        self.enter(source, RunPhase::Extracting);
        let mut cards = self.extract(source).await?;
        info!("{}: found {} cards", source.name, cards.len());

        self.enter(source, RunPhase::Imaging);
        self.mirror_images(&mut cards).await;

        self.enter(source, RunPhase::Persisting);
        let upsert = self.catalog.upsert_cards(&cards).await;

        Ok(RunOutput { cards, upsert })
    }

    async fn extract(&self, source: &Source) -> Result<Vec<ExtractedCard>, ScrapeError> {
        match &source.kind {
            SourceKind::Llm(_) => {
                let html = self.pages.fetch_page(&source.base_url).await?;
                let cards = self
                    .extractor
                    .extract_cards(&html, &source.base_url, ExtractionContext::for_source(source))
                    .await?;
                Ok(cards)
            }
            SourceKind::Selector(_) => {
                warn!(
                    "Selector scraping is not implemented yet; {} yields no cards",
                    source.name
                );
                Ok(Vec::new())
            }
            SourceKind::Api(_) => {
                warn!(
                    "API scraping is not implemented yet; {} yields no cards",
                    source.name
                );
                Ok(Vec::new())
            }
        }
    }

    /// Mirror each card's image in turn. A card whose image cannot be
    /// mirrored keeps its original URL.
    async fn mirror_images(&self, cards: &mut [ExtractedCard]) {
        for card in cards.iter_mut() {
            if card.image_url.trim().is_empty() {
                continue;
            }
            let original = card.image_url.clone();
            let mirrored = self
                .image_limiter
                .execute(|| self.mirror.mirror_image(&original))
                .await;
            match mirrored {
                Ok(url) => card.image_url = url,
                Err(e) => warn!(
                    "Keeping original image for '{}' ({}): {}",
                    card.name, original, e
                ),
            }
        }
    }

    async fn finish_success(
        &self,
        source: &Source,
        job: &ScrapeJob,
        output: RunOutput,
    ) -> ScrapeResult {
        let found = u32::try_from(output.cards.len()).unwrap_or(u32::MAX);
        let note = output.failure_note();

        if let Err(e) = self
            .jobs
            .finish_success(
                job,
                found,
                output.upsert.created,
                output.upsert.updated,
                note.as_deref(),
            )
            .await
        {
            error!("Could not finalize job for {}: {}", source.name, e);
            let message = format!("failed to record job result: {}", e);
            if let Err(log_err) = self.jobs.finish_failed(job, &message).await {
                error!("Could not record failure for {}: {}", source.name, log_err);
            }
            return ScrapeResult::failed(source, Some(job), job.started_at, message);
        }
        self.enter(source, RunPhase::Success);

        let finished_at = job.completion_time(Utc::now());
        if let Err(e) = self.sources.update_last_scraped(&source.id, finished_at).await {
            warn!("Could not stamp last scrape time for {}: {}", source.name, e);
        }

        info!(
            "{}: {} found, {} created, {} updated",
            source.name, found, output.upsert.created, output.upsert.updated
        );

        ScrapeResult {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            job_id: Some(job.id.clone()),
            status: JobStatus::Success,
            items_found: found,
            items_created: output.upsert.created,
            items_updated: output.upsert.updated,
            cards: output.cards,
            error: note,
            started_at: job.started_at,
            finished_at,
        }
    }
}
