// src/error.rs
//
// Error taxonomy for the upload pipeline.
//
// Configuration, listing and upload errors are fatal for the run. Fetch errors
// are per item: the fetcher records them and the item is left out of its batch.

use thiserror::Error;

/// Problems detected before (or instead of) any useful network work.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential `{field}` (set it in the keys file or ${env})")]
    MissingCredential { field: &'static str, env: &'static str },

    #[error("cannot read credentials file {path}: {source}")]
    KeysFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {path} is not valid JSON: {source}")]
    KeysFileInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch size must be positive")]
    ZeroBatchSize,

    #[error("batch size {requested} exceeds the service limit of {limit} images per upload")]
    BatchSizeAboveLimit { requested: usize, limit: usize },

    #[error("worker pool size must be positive")]
    ZeroWorkers,

    #[error("worker pool size {requested} exceeds the maximum of {limit}")]
    TooManyWorkers { requested: usize, limit: usize },

    #[error("no tags requested")]
    NoTags,

    #[error("tag `{0}` is not present in the project after tag sync")]
    UnresolvedTag(String),

    #[error("invalid storage configuration: {0}")]
    Storage(#[source] object_store::Error),
}

/// Enumerating the container failed.
#[derive(Error, Debug)]
#[error("listing `{prefix}` failed: {source}")]
pub struct ListingError {
    pub prefix: String,
    #[source]
    pub source: object_store::Error,
}

/// A single blob could not be fetched. Never fatal for the run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid blob name: {0}")]
    InvalidName(#[from] object_store::path::Error),

    #[error(transparent)]
    Storage(#[from] object_store::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failures talking to the training service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("service returned {status}: {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to parse response: {0}, body: {1}")]
    InvalidResponse(#[source] serde_json::Error, String),
}

/// The batch could not be submitted at all.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("batch of {count} images exceeds the service limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("image `{name}` is {size} bytes, above the service limit of {limit}")]
    ImageTooLarge { name: String, size: usize, limit: usize },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Anything that ends a run early.
#[derive(Error, Debug)]
pub enum CvBlobError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("training service error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T, E = CvBlobError> = std::result::Result<T, E>;
