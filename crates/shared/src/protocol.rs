use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{CampaignId, NarrationEntryId, SessionId};

/// One named continuity of play, owned by the backend and cached
/// read-only by the client for the duration of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

/// One persisted, ordered piece of free-text game narration.
/// Append-only from the client's perspective; the backend assigns
/// both the identity and the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationEntry {
    pub id: NarrationEntryId,
    pub campaign_id: CampaignId,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// Backend-tracked span representing one sitting of play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub campaign_id: CampaignId,
    pub start_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistQueryRequest {
    pub prompt: String,
}

/// Response body of the assistant endpoint. The backend reports model
/// failures as a 200 carrying `error` (and possibly a canned
/// `fallback_response`) rather than a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistQueryResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<String>,
}

/// Envelope of the retrieval endpoint: the query echoed back plus the
/// vector store's raw result matrix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub query: String,
    #[serde(default)]
    pub results: RetrieveMatrix,
}

/// Nested per-query result lists as the vector store returns them.
/// Row 0 corresponds to the single submitted query; the client
/// flattens it into excerpt/source pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveMatrix {
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<RetrieveMetadata>>,
    #[serde(default)]
    pub distances: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveMetadata {
    #[serde(default)]
    pub filename: Option<String>,
}

/// One uploaded reference document as the backend lists it. The
/// timestamp is an opaque backend-formatted string, displayed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourcebook {
    pub filename: String,
    pub size: u64,
    pub created_at: String,
    #[serde(default)]
    pub processed: bool,
}
