// tests/common/mod.rs
//
// Shared fixtures: an in-memory blob container and a scripted training service.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
#[allow(deprecated)]
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOpts,
    PutOptions, PutPayload, PutResult,
};

use cvblob::error::ApiError;
use cvblob::training::{ImageCreateResult, ImageCreateSummary, ImageFileCreateEntry, Project};
use cvblob::{StorageSource, Tag, TagId, TrainingApi, UploaderConfig};

pub const PROJECT_ID: &str = "project-1";

/// Put `names` into a fresh in-memory store; each blob's bytes are its own name.
pub async fn seeded_store(names: &[String]) -> Arc<dyn ObjectStore> {
    let store = InMemory::new();
    for name in names {
        store
            .put(&Path::from(name.as_str()), PutPayload::from(Bytes::from(name.clone())))
            .await
            .expect("seed blob");
    }
    Arc::new(store)
}

/// In-memory store whose reads fail for a chosen set of blob names.
///
/// Listing still reports the failing blobs, so they reach the fetcher.
#[derive(Debug)]
pub struct FailingStore {
    inner: InMemory,
    failing: HashSet<String>,
}

impl FailingStore {
    pub async fn seeded(names: &[String], failing: &[String]) -> Arc<dyn ObjectStore> {
        let inner = InMemory::new();
        for name in names {
            inner
                .put(&Path::from(name.as_str()), PutPayload::from(Bytes::from(name.clone())))
                .await
                .expect("seed blob");
        }
        Arc::new(Self {
            inner,
            failing: failing.iter().cloned().collect(),
        })
    }
}

impl fmt::Display for FailingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailingStore({})", self.inner)
    }
}

#[allow(deprecated)]
#[async_trait]
impl ObjectStore for FailingStore {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> object_store::Result<GetResult> {
        if self.failing.contains(&location.to_string()) {
            return Err(object_store::Error::Generic {
                store: "FailingStore",
                source: format!("read of {location} refused").into(),
            });
        }
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// `train/cat/000.jpg`, `train/cat/001.jpg`, ... (zero padded so listing order is numeric).
pub fn cat_listing(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("train/cat/{i:03}.jpg")).collect()
}

pub fn test_config(prefix: &str, tags: &[&str]) -> UploaderConfig {
    UploaderConfig::new(
        StorageSource::Local { root: PathBuf::from("/unused") },
        prefix,
        tags.iter().map(|t| t.to_string()).collect(),
        "http://localhost:9",
        PROJECT_ID,
        "training-key",
    )
    .with_workers(4)
}

/// Scripted stand-in for the training service.
#[derive(Default)]
pub struct MockTrainingApi {
    tags: Mutex<Vec<Tag>>,
    next_id: AtomicUsize,
    /// 1-based upload call that the service rejects.
    reject_upload: Option<usize>,
    pub project_calls: AtomicUsize,
    pub created_tags: Mutex<Vec<String>>,
    /// Image names per upload call, in call order.
    pub uploads: Mutex<Vec<Vec<String>>>,
    /// Image bytes per upload call, keyed like `uploads`.
    pub upload_bytes: Mutex<Vec<Vec<Bytes>>>,
}

impl MockTrainingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(names: &[&str]) -> Self {
        let api = Self::new();
        {
            let mut tags = api.tags.lock().unwrap();
            for name in names {
                tags.push(api.make_tag(name));
            }
        }
        api
    }

    pub fn rejecting_upload(mut self, call: usize) -> Self {
        self.reject_upload = Some(call);
        self
    }

    fn make_tag(&self, name: &str) -> Tag {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Tag {
            id: TagId(format!("tag-{id}")),
            name: name.to_string(),
            description: Some(name.to_string()),
            kind: Some("Regular".to_string()),
        }
    }

    pub fn upload_sizes(&self) -> Vec<usize> {
        self.uploads.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl TrainingApi for MockTrainingApi {
    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        if project_id != PROJECT_ID {
            return Err(ApiError::Status {
                status: 404,
                code: "BadRequestProjectUnknown".to_string(),
                message: format!("project {project_id} not found"),
            });
        }
        Ok(Project { id: project_id.to_string(), name: "animals".to_string() })
    }

    async fn list_tags(&self, _project_id: &str) -> Result<Vec<Tag>, ApiError> {
        Ok(self.tags.lock().unwrap().clone())
    }

    async fn create_tag(
        &self,
        _project_id: &str,
        name: &str,
        _description: &str,
        _kind: &str,
    ) -> Result<Tag, ApiError> {
        let tag = self.make_tag(name);
        self.tags.lock().unwrap().push(tag.clone());
        self.created_tags.lock().unwrap().push(name.to_string());
        Ok(tag)
    }

    async fn create_images_from_files(
        &self,
        _project_id: &str,
        images: &[ImageFileCreateEntry],
    ) -> Result<ImageCreateSummary, ApiError> {
        let call = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(images.iter().map(|i| i.name.clone()).collect());
            uploads.len()
        };
        self.upload_bytes
            .lock()
            .unwrap()
            .push(images.iter().map(|i| i.contents.clone()).collect());

        let ok = self.reject_upload != Some(call);
        Ok(ImageCreateSummary {
            is_batch_successful: ok,
            images: images
                .iter()
                .map(|i| ImageCreateResult {
                    source_url: Some(i.name.clone()),
                    status: if ok { "OK".to_string() } else { "ErrorTagLimitExceed".to_string() },
                })
                .collect(),
        })
    }
}
