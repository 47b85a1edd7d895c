// src/driver.rs
//
// Run driver: tag sync -> list -> batch -> (fetch, upload) per batch.
//
// Batches run strictly one after another; only the fetch phase inside a
// batch is concurrent. The first batch the service rejects ends the run.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use object_store::ObjectStore;
use tracing::{debug, error, info, warn};

use crate::batcher::make_batches;
use crate::blob_store::{open_store, BlobLister};
use crate::config::UploaderConfig;
use crate::constants::UPLOAD_REJECTED_EXIT_CODE;
use crate::error::Result;
use crate::fetcher::ConcurrentFetcher;
use crate::progress::ProgressReporter;
use crate::tags::sync_tags;
use crate::training::{CustomVisionClient, TrainingApi};
use crate::upload::{UploadClient, UploadResult};

/// Where the driver is in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Listing,
    Fetching { batch: usize },
    Uploading { batch: usize },
    Done,
    /// A batch upload was rejected by the service.
    Aborted { batch: usize },
    /// The run stopped on an error before finishing.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_batches: usize,
    pub batches_processed: usize,
    pub images_uploaded: usize,
    pub fetch_failures: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum RunOutcome {
    Done(RunSummary),
    Aborted {
        batch: usize,
        result: UploadResult,
        summary: RunSummary,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Done(summary) => summary,
            RunOutcome::Aborted { summary, .. } => summary,
        }
    }

    /// Process exit status for this outcome.
    pub fn exit_status(&self) -> u8 {
        match self {
            RunOutcome::Done(_) => 0,
            RunOutcome::Aborted { .. } => UPLOAD_REJECTED_EXIT_CODE,
        }
    }
}

/// Configuration plus the shared clients for one run.
pub struct RunContext {
    pub config: UploaderConfig,
    pub store: Arc<dyn ObjectStore>,
    pub api: Arc<dyn TrainingApi>,
}

impl RunContext {
    pub fn new(config: UploaderConfig, store: Arc<dyn ObjectStore>, api: Arc<dyn TrainingApi>) -> Self {
        Self { config, store, api }
    }

    /// Validate `config` and build the storage and training clients it names.
    pub fn connect(config: UploaderConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.source)?;
        let api = Arc::new(CustomVisionClient::new(&config.endpoint, config.training_key.clone())?);
        info!("Training endpoint {}", api.endpoint());
        Ok(Self::new(config, store, api))
    }
}

pub struct Driver {
    ctx: RunContext,
    state: RunState,
}

impl Driver {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx, state: RunState::Idle }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!("driver state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Execute the whole run, writing progress lines to `out`.
    pub async fn run<W: Write>(&mut self, out: W) -> Result<RunOutcome> {
        let result = self.run_batches(out).await;
        if result.is_err() {
            self.transition(RunState::Failed);
        }
        result
    }

    async fn run_batches<W: Write>(&mut self, out: W) -> Result<RunOutcome> {
        let cfg = self.ctx.config.clone();
        let store = Arc::clone(&self.ctx.store);
        let api = Arc::clone(&self.ctx.api);
        cfg.validate()?;

        self.transition(RunState::Listing);
        let project = api.get_project(&cfg.project_id).await?;
        info!("Using project {} ({})", project.name, project.id);

        let tags = sync_tags(api.as_ref(), &cfg.project_id, &cfg.tags).await?;
        info!("Tags ready: {}", cfg.tags.join(","));

        let blobs = BlobLister::new(Arc::clone(&store), cfg.prefix.as_str()).list_all().await?;
        let batches = make_batches(blobs, cfg.batch_size)?;
        info!("{} batches of up to {} blobs", batches.len(), cfg.batch_size);

        let fetcher = ConcurrentFetcher::new(store, cfg.workers).with_timeout(cfg.fetch_timeout);
        let uploader = UploadClient::new(api, cfg.project_id.as_str());
        let mut summary = RunSummary { total_batches: batches.len(), ..Default::default() };

        let mut reporter = ProgressReporter::new(out, Instant::now());
        for batch in &batches {
            reporter.batch_banner(batch.number);

            self.transition(RunState::Fetching { batch: batch.number });
            reporter.file_header();
            let fetched = fetcher
                .fetch_batch(batch, &tags, &cfg.tags, |blob| reporter.file_done(&blob.name))
                .await?;

            let failed = fetched.failure_count();
            if failed > 0 {
                warn!("batch {}: {} of {} fetches failed", batch.number, failed, batch.len());
                reporter.fetch_failures(batch.number, failed, batch.len());
                summary.fetch_failures += failed;
            }

            if fetched.images.is_empty() {
                warn!("batch {}: nothing to upload", batch.number);
                reporter.batch_skipped(batch.number);
                summary.batches_processed += 1;
                continue;
            }

            self.transition(RunState::Uploading { batch: batch.number });
            reporter.uploading(batch.number);
            let result = uploader.upload(&fetched.images).await?;

            if !result.batch_successful {
                error!("batch {} rejected by the training service", batch.number);
                for (name, status) in &result.per_image_status {
                    error!("  {}: {}", name, status);
                }
                reporter.batch_failed(&result);
                summary.elapsed = reporter.elapsed();
                self.transition(RunState::Aborted { batch: batch.number });
                return Ok(RunOutcome::Aborted { batch: batch.number, result, summary });
            }

            summary.images_uploaded += fetched.images.len();
            summary.batches_processed += 1;
            reporter.batch_succeeded(batch.number);
        }

        summary.elapsed = reporter.elapsed();
        self.transition(RunState::Done);
        info!(
            "Uploaded {} images in {} batches ({} fetch failures) in {:.2}s",
            summary.images_uploaded,
            summary.batches_processed,
            summary.fetch_failures,
            summary.elapsed.as_secs_f64()
        );
        Ok(RunOutcome::Done(summary))
    }
}
