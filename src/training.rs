// src/training.rs
//
// Client for the vision-training REST API.
//
// `TrainingApi` is the seam the driver talks to; `CustomVisionClient` is the
// reqwest implementation. Wire models mirror the service's camelCase JSON.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::constants::{TRAINING_API_PATH, TRAINING_KEY_HEADER};
use crate::config::normalize_endpoint;
use crate::error::ApiError;

/// Server-assigned tag identifier (a GUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub String);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One image in an `images/files` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFileCreateEntry {
    pub name: String,
    #[serde(serialize_with = "as_base64")]
    pub contents: Bytes,
    pub tag_ids: Vec<TagId>,
}

fn as_base64<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

#[derive(Serialize)]
struct ImageFileCreateBatch<'a> {
    images: &'a [ImageFileCreateEntry],
}

/// Response of an `images/files` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCreateSummary {
    pub is_batch_successful: bool,
    #[serde(default)]
    pub images: Vec<ImageCreateResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCreateResult {
    /// For file uploads the service echoes the submitted name here.
    #[serde(default)]
    pub source_url: Option<String>,
    pub status: String,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Operations the uploader needs from the training service.
#[async_trait]
pub trait TrainingApi: Send + Sync {
    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError>;

    async fn list_tags(&self, project_id: &str) -> Result<Vec<Tag>, ApiError>;

    async fn create_tag(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
        kind: &str,
    ) -> Result<Tag, ApiError>;

    /// Submit one batch of images in a single call.
    async fn create_images_from_files(
        &self,
        project_id: &str,
        images: &[ImageFileCreateEntry],
    ) -> Result<ImageCreateSummary, ApiError>;
}

/// HTTP client for the training REST API.
pub struct CustomVisionClient {
    http: reqwest::Client,
    endpoint: String,
    training_key: String,
}

impl CustomVisionClient {
    /// `endpoint` is either a region name or a full base URL.
    pub fn new(endpoint: &str, training_key: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            endpoint: normalize_endpoint(endpoint),
            training_key: training_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn project_url(&self, project_id: &str, tail: &str) -> String {
        format!("{}/{}/projects/{}{}", self.endpoint, TRAINING_API_PATH, project_id, tail)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .header(TRAINING_KEY_HEADER, &self.training_key)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("training api responded {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &body));
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => Err(ApiError::InvalidResponse(e, body)),
        }
    }
}

impl fmt::Debug for CustomVisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomVisionClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TrainingApi for CustomVisionClient {
    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.send(self.http.get(self.project_url(project_id, ""))).await
    }

    async fn list_tags(&self, project_id: &str) -> Result<Vec<Tag>, ApiError> {
        self.send(self.http.get(self.project_url(project_id, "/tags"))).await
    }

    async fn create_tag(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
        kind: &str,
    ) -> Result<Tag, ApiError> {
        let request = self
            .http
            .post(self.project_url(project_id, "/tags"))
            .query(&[("name", name), ("description", description), ("type", kind)]);
        self.send(request).await
    }

    async fn create_images_from_files(
        &self,
        project_id: &str,
        images: &[ImageFileCreateEntry],
    ) -> Result<ImageCreateSummary, ApiError> {
        let request = self
            .http
            .post(self.project_url(project_id, "/images/files"))
            .json(&ImageFileCreateBatch { images });
        self.send(request).await
    }
}

/// Turn a non-2xx response into an error, keeping the service's code and message when present.
fn service_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(e) => ApiError::Status { status, code: e.code, message: e.message },
        Err(_) => ApiError::Status {
            status,
            code: "Unknown".to_string(),
            message: body.to_string(),
        },
    }
}
