// src/fetcher.rs
//
// Concurrent fetch of one batch.
//
// One task per blob, bounded by a semaphore of `workers` permits. The call
// returns only when every task has finished (a full barrier per batch).
// Results arrive in completion order. Failed items are left out of the
// returned images and reported separately.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream::FuturesUnordered, StreamExt};
use object_store::ObjectStore;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::batcher::Batch;
use crate::blob_store::BlobRef;
use crate::constants::DEFAULT_FETCH_TIMEOUT;
use crate::error::{ConfigError, FetchError};
use crate::tags::TagMap;
use crate::training::{ImageFileCreateEntry, TagId};

/// A blob's bytes, ready for upload.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub blob: BlobRef,
    pub filename: String,
    pub contents: Bytes,
    pub tag_ids: Vec<TagId>,
}

impl FetchedImage {
    pub fn to_entry(&self) -> ImageFileCreateEntry {
        ImageFileCreateEntry {
            name: self.filename.clone(),
            contents: self.contents.clone(),
            tag_ids: self.tag_ids.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FetchFailure {
    pub blob: BlobRef,
    pub error: FetchError,
}

/// Everything one batch fetch produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub images: Vec<FetchedImage>,
    pub failures: Vec<FetchFailure>,
}

impl FetchOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

pub struct ConcurrentFetcher {
    store: Arc<dyn ObjectStore>,
    workers: usize,
    timeout: Duration,
}

impl ConcurrentFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize) -> Self {
        Self {
            store,
            workers: workers.clamp(1, Semaphore::MAX_PERMITS),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every blob in `batch` and tag it with `tag_names`.
    ///
    /// Tags are resolved before any request is made; an unknown name fails the
    /// whole call. `on_fetched` runs on the calling task once per successful
    /// blob, in completion order.
    pub async fn fetch_batch<F>(
        &self,
        batch: &Batch,
        tags: &TagMap,
        tag_names: &[String],
        mut on_fetched: F,
    ) -> Result<FetchOutcome, ConfigError>
    where
        F: FnMut(&BlobRef),
    {
        let tag_ids = tags.resolve(tag_names)?;

        let sem = Arc::new(Semaphore::new(self.workers));
        let mut futs = FuturesUnordered::new();

        for blob in batch.blobs.iter().cloned() {
            let sem = Arc::clone(&sem);
            let store = Arc::clone(&self.store);
            let timeout = self.timeout;
            let task_blob = blob.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so this always holds a permit.
                let _permit = sem.acquire_owned().await;
                fetch_one(store.as_ref(), &task_blob, timeout).await
            });
            futs.push(async move {
                let result = match handle.await {
                    Ok(r) => r,
                    Err(e) => Err(FetchError::from(e)),
                };
                (blob, result)
            });
        }

        let mut outcome = FetchOutcome {
            images: Vec::with_capacity(batch.len()),
            failures: Vec::new(),
        };
        while let Some((blob, result)) = futs.next().await {
            match result {
                Ok(contents) => {
                    on_fetched(&blob);
                    debug!("fetched {} ({} bytes)", blob.name, contents.len());
                    outcome.images.push(FetchedImage {
                        filename: blob.filename().to_string(),
                        contents,
                        tag_ids: tag_ids.clone(),
                        blob,
                    });
                }
                Err(error) => {
                    warn!("FAILURE::{}: {}", blob.name, error);
                    outcome.failures.push(FetchFailure { blob, error });
                }
            }
        }
        Ok(outcome)
    }
}

async fn fetch_one(store: &dyn ObjectStore, blob: &BlobRef, limit: Duration) -> Result<Bytes, FetchError> {
    let location = blob.location()?;
    let fetch = async { Ok::<_, FetchError>(store.get(&location).await?.bytes().await?) };
    tokio::time::timeout(limit, fetch)
        .await
        .map_err(|_| FetchError::Timeout(limit))?
}
