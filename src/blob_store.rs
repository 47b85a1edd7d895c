// src/blob_store.rs
//
// Storage backends and the blob lister.
//
// Blobs are read through the `object_store` crate so the same lister/fetcher
// code runs against a cloud container, a local directory, or an in-memory
// store in tests.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{future, stream::BoxStream, StreamExt, TryStreamExt};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use tracing::{debug, info};

use crate::config::StorageSource;
use crate::error::{ConfigError, ListingError};

/// Identifies one object in the container by its full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef {
    pub name: String,
}

impl BlobRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Last `/`-separated segment, used as the uploaded image name.
    pub fn filename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub(crate) fn location(&self) -> Result<Path, object_store::path::Error> {
        Path::parse(&self.name)
    }
}

/// Build the store for the configured source.
///
/// Client-side retries are switched off: a listing failure aborts the run
/// and a fetch failure drops the item, so retrying inside the client only
/// hides the failure for longer.
pub fn open_store(source: &StorageSource) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    match source {
        StorageSource::Azure { account, container, access_key, endpoint } => {
            let mut builder = MicrosoftAzureBuilder::new()
                .with_account(account.clone())
                .with_container_name(container.clone())
                .with_access_key(access_key.clone())
                .with_retry(RetryConfig { max_retries: 0, ..Default::default() });

            if let Some(endpoint) = endpoint {
                builder = builder.with_endpoint(endpoint.clone());
                if endpoint.starts_with("http://") {
                    builder = builder.with_allow_http(true);
                }
            }

            info!("Using blob container {}/{}", account, container);
            let store = builder.build().map_err(ConfigError::Storage)?;
            Ok(Arc::new(store))
        }
        StorageSource::Local { root } => {
            info!("Using local directory {} as blob source", root.display());
            let store = LocalFileSystem::new_with_prefix(root).map_err(ConfigError::Storage)?;
            Ok(Arc::new(store))
        }
    }
}

/// Enumerates blob names under a string prefix.
///
/// `train/cat` matches `train/cat/1.jpg` as well as `train/cats.jpg`: the
/// listing is taken from the enclosing directory and filtered by name.
pub struct BlobLister {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl BlobLister {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Lazily stream matching blobs in backend order. Every call starts a new listing.
    pub fn stream(&self) -> BoxStream<'_, Result<BlobRef, ListingError>> {
        let (parent, needle) = split_prefix(&self.prefix);
        let parent = parent.map(Path::from);
        let needle = needle.to_string();
        let prefix = self.prefix.clone();
        let mut seen = HashSet::new();

        debug!("listing under {:?} matching {:?}", parent, needle);
        self.store
            .list(parent.as_ref())
            .map_err(move |source| ListingError { prefix: prefix.clone(), source })
            .try_filter_map(move |meta| {
                let name = meta.location.to_string();
                let keep = name.starts_with(&needle) && seen.insert(name.clone());
                future::ready(Ok::<_, ListingError>(keep.then(|| BlobRef::new(name))))
            })
            .boxed()
    }

    /// Drain the whole listing.
    pub async fn list_all(&self) -> Result<Vec<BlobRef>, ListingError> {
        let blobs: Vec<BlobRef> = self.stream().try_collect().await?;
        info!("Listed {} blobs under `{}`", blobs.len(), self.prefix);
        Ok(blobs)
    }
}

/// `(directory to list, name filter)` for a string prefix.
fn split_prefix(prefix: &str) -> (Option<&str>, &str) {
    let prefix = prefix.trim_start_matches('/');
    match prefix.rfind('/') {
        Some(i) if i > 0 => (Some(&prefix[..i]), prefix),
        _ => (None, prefix),
    }
}
