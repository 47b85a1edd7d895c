// src/lib.rs
//
// Crate root: batch blobs out of object storage, fetch them concurrently and
// upload them as tagged images to a vision-training project.

pub mod constants;
pub mod config;
pub mod error;

pub mod blob_store;
pub mod batcher;
pub mod fetcher;

pub mod training;
pub mod tags;
pub mod upload;

pub mod progress;
pub mod driver;

pub use batcher::{make_batches, Batch};
pub use blob_store::{open_store, BlobLister, BlobRef};
pub use config::{Keys, StorageSource, UploaderConfig};
pub use driver::{Driver, RunContext, RunOutcome, RunState, RunSummary};
pub use error::{ApiError, ConfigError, CvBlobError, FetchError, ListingError, UploadError};
pub use fetcher::{ConcurrentFetcher, FetchOutcome, FetchedImage};
pub use tags::{sync_tags, TagMap};
pub use training::{CustomVisionClient, Tag, TagId, TrainingApi};
pub use upload::{UploadClient, UploadResult};
