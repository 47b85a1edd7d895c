// src/upload.rs
//
// Submit one fetched batch to the training service and summarise the answer.

use std::sync::Arc;

use tracing::{debug, info};

use crate::constants::{MAX_IMAGES_PER_UPLOAD, MAX_IMAGE_BYTES};
use crate::error::UploadError;
use crate::fetcher::FetchedImage;
use crate::training::{ImageCreateSummary, TrainingApi};

/// Service verdict for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub batch_successful: bool,
    /// `(image name, status)` in the order the service reported them.
    pub per_image_status: Vec<(String, String)>,
}

impl UploadResult {
    fn from_summary(summary: ImageCreateSummary, submitted: &[FetchedImage]) -> Self {
        let per_image_status = summary
            .images
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let name = r
                    .source_url
                    .or_else(|| submitted.get(i).map(|img| img.filename.clone()))
                    .unwrap_or_default();
                (name, r.status)
            })
            .collect();
        Self {
            batch_successful: summary.is_batch_successful,
            per_image_status,
        }
    }
}

pub struct UploadClient {
    api: Arc<dyn TrainingApi>,
    project_id: String,
}

impl UploadClient {
    pub fn new(api: Arc<dyn TrainingApi>, project_id: impl Into<String>) -> Self {
        Self { api, project_id: project_id.into() }
    }

    /// One `images/files` call for the whole batch.
    ///
    /// Oversized batches or images are rejected here rather than truncated.
    pub async fn upload(&self, images: &[FetchedImage]) -> Result<UploadResult, UploadError> {
        check_limits(images)?;

        let entries: Vec<_> = images.iter().map(FetchedImage::to_entry).collect();
        let bytes: usize = images.iter().map(|i| i.contents.len()).sum();
        info!("Uploading {} images ({} bytes) to project {}", entries.len(), bytes, self.project_id);

        let summary = self
            .api
            .create_images_from_files(&self.project_id, &entries)
            .await?;
        debug!("batch successful: {}", summary.is_batch_successful);
        Ok(UploadResult::from_summary(summary, images))
    }
}

fn check_limits(images: &[FetchedImage]) -> Result<(), UploadError> {
    if images.len() > MAX_IMAGES_PER_UPLOAD {
        return Err(UploadError::BatchTooLarge {
            count: images.len(),
            limit: MAX_IMAGES_PER_UPLOAD,
        });
    }
    if let Some(big) = images.iter().find(|i| i.contents.len() > MAX_IMAGE_BYTES) {
        return Err(UploadError::ImageTooLarge {
            name: big.blob.name.clone(),
            size: big.contents.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::BlobRef;
    use crate::error::ApiError;
    use crate::training::{ImageCreateResult, ImageFileCreateEntry, Project, Tag, TagId};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Answers every upload with a fixed verdict and records batch sizes.
    struct FixedVerdict {
        successful: bool,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TrainingApi for FixedVerdict {
        async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
            Ok(Project { id: project_id.to_string(), name: String::new() })
        }

        async fn list_tags(&self, _project_id: &str) -> Result<Vec<Tag>, ApiError> {
            Ok(Vec::new())
        }

        async fn create_tag(
            &self,
            _project_id: &str,
            name: &str,
            _description: &str,
            _kind: &str,
        ) -> Result<Tag, ApiError> {
            Ok(Tag { id: TagId(name.to_string()), name: name.to_string(), description: None, kind: None })
        }

        async fn create_images_from_files(
            &self,
            _project_id: &str,
            images: &[ImageFileCreateEntry],
        ) -> Result<ImageCreateSummary, ApiError> {
            self.calls.lock().unwrap().push(images.len());
            Ok(ImageCreateSummary {
                is_batch_successful: self.successful,
                images: images
                    .iter()
                    .map(|_| ImageCreateResult {
                        source_url: None,
                        status: if self.successful { "OK".into() } else { "ErrorSource".into() },
                    })
                    .collect(),
            })
        }
    }

    fn image(name: &str, size: usize) -> FetchedImage {
        let blob = BlobRef::new(format!("train/cat/{name}"));
        FetchedImage {
            filename: blob.filename().to_string(),
            blob,
            contents: Bytes::from(vec![0u8; size]),
            tag_ids: vec![TagId("t".into())],
        }
    }

    fn client(successful: bool) -> (Arc<FixedVerdict>, UploadClient) {
        let api = Arc::new(FixedVerdict { successful, calls: Mutex::new(Vec::new()) });
        (api.clone(), UploadClient::new(api, "p1"))
    }

    #[tokio::test]
    async fn test_successful_batch() {
        let (api, client) = client(true);
        let result = client.upload(&[image("1.jpg", 10), image("2.jpg", 10)]).await.unwrap();

        assert!(result.batch_successful);
        assert_eq!(
            result.per_image_status,
            vec![("1.jpg".to_string(), "OK".to_string()), ("2.jpg".to_string(), "OK".to_string())]
        );
        assert_eq!(*api.calls.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_rejected_batch_keeps_statuses() {
        let (_, client) = client(false);
        let result = client.upload(&[image("1.jpg", 10)]).await.unwrap();
        assert!(!result.batch_successful);
        assert_eq!(result.per_image_status[0].1, "ErrorSource");
    }

    #[tokio::test]
    async fn test_too_many_images_is_not_truncated() {
        let (api, client) = client(true);
        let images: Vec<_> = (0..=MAX_IMAGES_PER_UPLOAD).map(|i| image(&format!("{i}.jpg"), 1)).collect();

        let err = client.upload(&images).await.unwrap_err();
        assert!(matches!(err, UploadError::BatchTooLarge { count, .. } if count == MAX_IMAGES_PER_UPLOAD + 1));
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_image_rejected() {
        let (api, client) = client(true);
        let err = client
            .upload(&[image("small.jpg", 1), image("huge.jpg", MAX_IMAGE_BYTES + 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ImageTooLarge { ref name, .. } if name == "train/cat/huge.jpg"));
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
