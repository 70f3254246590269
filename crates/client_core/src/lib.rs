use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CampaignId, CAMPAIGN_NAME_MAX_LEN},
    error::{ErrorBody, ErrorCode},
    protocol::{
        AssistQueryRequest, AssistQueryResponse, Campaign, NarrationEntry, RetrieveResponse,
        SessionRecord, Sourcebook,
    },
};
use thiserror::Error;
use tracing::{debug, warn};

pub mod session;

pub use session::{
    AssistAnswer, AssistFailure, AssistQueryState, NarrationTimeline, RetrievalSearchState,
    SearchHit, SearchOutcome, SessionController, SessionError, SessionEvent, SessionPhase,
    SessionSnapshot,
};

/// Failure of one backend call, normalized so callers never see a raw
/// transport fault. Every HTTP interaction funnels through this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend rejected the request: {message}")]
    Backend { code: ErrorCode, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// File staged for a sourcebook upload.
#[derive(Debug, Clone)]
pub struct SourcebookUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Logical operations the external backend service offers. The HTTP
/// implementation is [`HttpBackend`]; tests substitute their own.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, BackendError>;
    async fn create_campaign(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Campaign, BackendError>;
    async fn fetch_campaign(&self, id: CampaignId) -> Result<Campaign, BackendError>;
    async fn fetch_narration_log(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<NarrationEntry>, BackendError>;
    async fn append_narration_log(
        &self,
        campaign_id: CampaignId,
        content: &str,
    ) -> Result<NarrationEntry, BackendError>;
    async fn start_session(&self, campaign_id: CampaignId) -> Result<SessionRecord, BackendError>;
    async fn list_sessions(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<SessionRecord>, BackendError>;
    async fn query_assistant(
        &self,
        prompt: &str,
        campaign_id: Option<CampaignId>,
    ) -> Result<AssistQueryResponse, BackendError>;
    async fn search_documents(&self, query: &str) -> Result<RetrieveResponse, BackendError>;
    async fn list_sourcebooks(&self) -> Result<Vec<Sourcebook>, BackendError>;
    async fn upload_sourcebook(
        &self,
        upload: SourcebookUpload,
    ) -> Result<Sourcebook, BackendError>;
    async fn delete_sourcebook(&self, filename: &str) -> Result<(), BackendError>;
}

/// Field-level validation the dashboard applies before any network
/// call is made for campaign creation.
pub fn validate_campaign_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Campaign name is required".to_string());
    }
    if name.chars().count() > CAMPAIGN_NAME_MAX_LEN {
        return Err(format!(
            "Campaign name must be at most {CAMPAIGN_NAME_MAX_LEN} characters"
        ));
    }
    Ok(())
}

/// reqwest-backed implementation of [`BackendApi`] speaking the
/// assistant service's wire contract.
pub struct HttpBackend {
    http: Client,
    server_url: String,
}

impl HttpBackend {
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            server_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

/// Converts a response into `T`, mapping non-2xx statuses into the
/// [`BackendError`] taxonomy. The backend's error body is a
/// `{"detail": ...}` object; anything unreadable falls back to the
/// status line.
async fn take_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(error_for_status(status, response).await);
    }
    Ok(response.json::<T>().await?)
}

async fn take_ok(response: Response) -> Result<(), BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(error_for_status(status, response).await);
    }
    Ok(())
}

async fn error_for_status(status: StatusCode, response: Response) -> BackendError {
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(_) => status.to_string(),
    };
    debug!(status = status.as_u16(), %message, "backend returned an error response");
    match ErrorCode::from_status(status.as_u16()) {
        ErrorCode::NotFound => BackendError::NotFound(message),
        code => BackendError::Backend { code, message },
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, BackendError> {
        let response = self.http.get(self.url("/campaigns/")).send().await?;
        take_json(response).await
    }

    async fn create_campaign(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Campaign, BackendError> {
        let mut params = vec![("name", name)];
        if let Some(description) = description {
            params.push(("description", description));
        }
        let response = self
            .http
            .post(self.url("/campaigns/"))
            .query(&params)
            .send()
            .await?;
        take_json(response).await
    }

    async fn fetch_campaign(&self, id: CampaignId) -> Result<Campaign, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/campaigns/{}", id.0)))
            .send()
            .await?;
        take_json(response).await
    }

    async fn fetch_narration_log(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<NarrationEntry>, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/campaigns/{}/narration_logs/", campaign_id.0)))
            .send()
            .await?;
        take_json(response).await
    }

    async fn append_narration_log(
        &self,
        campaign_id: CampaignId,
        content: &str,
    ) -> Result<NarrationEntry, BackendError> {
        let response = self
            .http
            .post(self.url(&format!("/campaigns/{}/narration_logs/", campaign_id.0)))
            .query(&[("content", content)])
            .send()
            .await?;
        take_json(response).await
    }

    async fn start_session(&self, campaign_id: CampaignId) -> Result<SessionRecord, BackendError> {
        let response = self
            .http
            .post(self.url(&format!("/campaigns/{}/sessions/", campaign_id.0)))
            .send()
            .await?;
        take_json(response).await
    }

    async fn list_sessions(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<SessionRecord>, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/campaigns/{}/sessions/", campaign_id.0)))
            .send()
            .await?;
        take_json(response).await
    }

    async fn query_assistant(
        &self,
        prompt: &str,
        campaign_id: Option<CampaignId>,
    ) -> Result<AssistQueryResponse, BackendError> {
        let mut request = self.http.post(self.url("/llm/query/")).json(&AssistQueryRequest {
            prompt: prompt.to_string(),
        });
        if let Some(campaign_id) = campaign_id {
            request = request.query(&[("campaign_id", campaign_id.0)]);
        }
        let response = request.send().await?;
        take_json(response).await
    }

    async fn search_documents(&self, query: &str) -> Result<RetrieveResponse, BackendError> {
        let response = self
            .http
            .get(self.url("/retrieve/"))
            .query(&[("query", query)])
            .send()
            .await?;
        take_json(response).await
    }

    async fn list_sourcebooks(&self) -> Result<Vec<Sourcebook>, BackendError> {
        let response = self.http.get(self.url("/sourcebooks/")).send().await?;
        take_json(response).await
    }

    async fn upload_sourcebook(
        &self,
        upload: SourcebookUpload,
    ) -> Result<Sourcebook, BackendError> {
        let mut part = multipart::Part::bytes(upload.bytes).file_name(upload.filename.clone());
        if let Some(mime_type) = upload.mime_type.as_deref() {
            part = part.mime_str(mime_type).map_err(|err| {
                warn!(%mime_type, "rejecting upload with unparseable mime type");
                BackendError::Decode(format!("invalid mime type {mime_type:?}: {err}"))
            })?;
        }
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/sourcebooks/upload/"))
            .multipart(form)
            .send()
            .await?;
        take_json(response).await
    }

    async fn delete_sourcebook(&self, filename: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.url(&format!(
                "/sourcebooks/{}",
                urlencoding::encode(filename)
            )))
            .send()
            .await?;
        take_ok(response).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
