use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tubechat_core::{
    ChatHistory, ChatRequest, ProcessingStatus, StagedFile, ThreadDetail, ThreadSummary,
    UploadedFile, VideoRecord,
};

use crate::upload::read_upload;
use crate::{ApiError, FailureKind};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    /// Whole-request limit for ordinary JSON calls.
    pub request_timeout: Duration,
    /// Longest silence tolerated between chat stream chunks.
    pub stream_read_timeout: Duration,
    pub max_upload_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            stream_read_timeout: Duration::from_secs(120),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub video_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDraft {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
struct ProjectUpdateBody<'a> {
    id: &'a str,
    name: &'a str,
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateVideoBody<'a> {
    url: &'a str,
    project_id: &'a str,
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    processing_status: ProcessingStatus,
}

#[derive(Deserialize)]
struct UploadBody {
    #[serde(alias = "file_url")]
    url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Typed access to the backend HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    stream_client: reqwest::Client,
    settings: ClientSettings,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: &str, settings: ClientSettings) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("not an http(s) base url: {base_url}"),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.stream_read_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            base,
            client,
            stream_client,
            settings,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// `POST /chat/stream`. Returns the response once a success status arrived;
    /// the body is the event stream.
    pub async fn open_chat_stream(&self, request: &ChatRequest) -> Result<Response, ApiError> {
        let url = self.endpoint(&["chat", "stream"], false)?;
        let body = serde_json::to_vec(request)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        engine_info!(
            "Opening chat stream thread={:?} project={:?} message_len={}",
            request.thread_id,
            request.project_id,
            request.message.len()
        );
        let response = self
            .stream_client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await
    }

    /// `GET /videos/{id}/processing-status`
    pub async fn processing_status(&self, video_id: &str) -> Result<ProcessingStatus, ApiError> {
        let url = self.endpoint(&["videos", video_id, "processing-status"], false)?;
        let body: StatusBody = self.get_json(url).await?;
        Ok(body.processing_status)
    }

    /// `POST /videos/`: registers the video and starts server-side processing.
    pub async fn create_video(
        &self,
        project_id: &str,
        video_url: &str,
    ) -> Result<VideoRecord, ApiError> {
        let url = self.endpoint(&["videos"], true)?;
        let body = CreateVideoBody {
            url: video_url,
            project_id,
        };
        self.send_json(self.client.post(url), &body).await
    }

    /// `GET /videos/project/{project_id}`. Null entries are skipped.
    pub async fn project_videos(&self, project_id: &str) -> Result<Vec<VideoRecord>, ApiError> {
        let url = self.endpoint(&["videos", "project", project_id], false)?;
        let videos: Vec<Option<VideoRecord>> = self.get_json(url).await?;
        Ok(videos.into_iter().flatten().collect())
    }

    /// `POST /upload/` (multipart). Type and size are checked before sending.
    pub async fn upload_file(&self, file: &StagedFile) -> Result<UploadedFile, ApiError> {
        let bytes = read_upload(file, self.settings.max_upload_bytes).await?;
        engine_info!(
            "Uploading {} ({} bytes, {})",
            file.name,
            bytes.len(),
            file.mime_type
        );
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|err| ApiError::new(FailureKind::Rejected, err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload"], true)?;
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: UploadBody = decode_json(check_status(response).await?).await?;
        Ok(UploadedFile {
            url: body.url,
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        })
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>, ApiError> {
        let url = self.endpoint(&["projects"], true)?;
        self.get_json(url).await
    }

    pub async fn get_project(&self, project_id: &str) -> Result<ProjectRecord, ApiError> {
        let url = self.endpoint(&["projects", project_id], false)?;
        self.get_json(url).await
    }

    pub async fn create_project(&self, draft: &ProjectDraft) -> Result<ProjectRecord, ApiError> {
        let url = self.endpoint(&["projects"], true)?;
        self.send_json(self.client.post(url), draft).await
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        draft: &ProjectDraft,
    ) -> Result<ProjectRecord, ApiError> {
        let url = self.endpoint(&["projects", project_id], false)?;
        let body = ProjectUpdateBody {
            id: project_id,
            name: &draft.name,
            description: draft.description.as_deref(),
        };
        self.send_json(self.client.put(url), &body).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["projects", project_id], false)?;
        self.delete(url).await
    }

    /// `GET /chat/threads`, newest first, optionally limited to one project.
    pub async fn list_threads(
        &self,
        project_id: Option<&str>,
    ) -> Result<Vec<ThreadSummary>, ApiError> {
        let mut url = self.endpoint(&["chat", "threads"], false)?;
        if let Some(project_id) = project_id {
            url.query_pairs_mut().append_pair("project_id", project_id);
        }
        self.get_json(url).await
    }

    /// `GET /chat/threads/{id}`: the thread with its stored messages.
    pub async fn get_thread(&self, thread_id: &str) -> Result<ThreadDetail, ApiError> {
        let url = self.endpoint(&["chat", "threads", thread_id], false)?;
        self.get_json(url).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["chat", "threads", thread_id], false)?;
        self.delete(url).await
    }

    /// `GET /chat/checkpoint/{id}`: the agent's own record of the conversation.
    pub async fn chat_history(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<ChatHistory, ApiError> {
        let mut url = self.endpoint(&["chat", "checkpoint", thread_id], false)?;
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        self.get_json(url).await
    }

    fn endpoint(&self, segments: &[&str], trailing_slash: bool) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::new(FailureKind::InvalidUrl, "api base url cannot take a path")
            })?;
            path.pop_if_empty();
            path.extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    async fn delete(&self, url: Url) -> Result<(), ApiError> {
        engine_debug!("DELETE {}", url);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(check_status(response).await?).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        let response = builder
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(check_status(response).await?).await
    }
}

/// Turns a non-2xx response into an error carrying the backend `detail` verbatim.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let message = error_detail(&body).unwrap_or_else(|| status.to_string());
    Err(ApiError::new(
        FailureKind::HttpStatus(status.as_u16()),
        message,
    ))
}

fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        map_reqwest_error(err)
    }
}
