//! Session data orchestration: narration timeline, assistant query and
//! retrieval search lifecycles, composed by [`SessionController`].

use std::sync::Arc;

use shared::{
    domain::CampaignId,
    protocol::{Campaign, NarrationEntry, RetrieveResponse},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{BackendApi, BackendError};

/// A successful assistant response, held until the next query replaces
/// it or promotion clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistAnswer {
    pub prompt: String,
    pub response: String,
    pub context_note: Option<String>,
}

/// A failed assistant query, including any canned fallback text the
/// backend supplied alongside the error.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistFailure {
    pub message: String,
    pub fallback_response: Option<String>,
}

/// One assistant request at a time. The tagged representation rules
/// out impossible combinations such as an answer and an error being
/// live together.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssistQueryState {
    #[default]
    Idle,
    Pending,
    Answered(AssistAnswer),
    Failed(AssistFailure),
}

impl AssistQueryState {
    pub fn is_pending(&self) -> bool {
        matches!(self, AssistQueryState::Pending)
    }

    pub fn answer(&self) -> Option<&AssistAnswer> {
        match self {
            AssistQueryState::Answered(answer) => Some(answer),
            _ => None,
        }
    }
}

/// One document excerpt matched by a retrieval search. `excerpt` is
/// the full stored text; shortening it for display is the view's job.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub excerpt: String,
    pub source_filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchOutcome {
    /// Flattens the vector store's nested per-query lists. Row 0 holds
    /// the results for the single submitted query; a hit without
    /// filename metadata is attributed to "Unknown".
    pub fn from_retrieve(response: RetrieveResponse) -> Self {
        let documents = response.results.documents.into_iter().next().unwrap_or_default();
        let mut metadatas = response
            .results
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let hits = documents
            .into_iter()
            .map(|excerpt| SearchHit {
                excerpt,
                source_filename: metadatas
                    .next()
                    .and_then(|meta| meta.filename)
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect();
        Self {
            query: response.query,
            hits,
        }
    }
}

/// One retrieval search at a time, independent of the assist lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RetrievalSearchState {
    #[default]
    Idle,
    Pending,
    Results(SearchOutcome),
    Failed {
        message: String,
    },
}

impl RetrievalSearchState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RetrievalSearchState::Pending)
    }
}

/// Ordered narration history as last confirmed by the backend. Entries
/// only ever enter through backend responses, so every one carries a
/// backend-assigned identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrationTimeline {
    entries: Vec<NarrationEntry>,
}

impl NarrationTimeline {
    pub fn entries(&self) -> &[NarrationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn tail(&self) -> Option<&NarrationEntry> {
        self.entries.last()
    }

    fn replace(&mut self, entries: Vec<NarrationEntry>) {
        self.entries = entries;
    }

    fn push(&mut self, entry: NarrationEntry) {
        self.entries.push(entry);
    }
}

/// Overall condition of the session view.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionPhase {
    #[default]
    Loading,
    Ready,
    /// Initial load failed; the view shows a blocking error instead of
    /// a partially populated screen.
    Failed(String),
}

/// Point-in-time copy of the controller's state for rendering.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub campaign: Option<Campaign>,
    pub timeline: NarrationTimeline,
    pub narration_error: Option<String>,
    pub assist: AssistQueryState,
    pub search: RetrievalSearchState,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("invalid campaign id {0}")]
    InvalidCampaign(i64),
    #[error("{0}")]
    Validation(String),
    #[error("a request for this panel is already in flight")]
    RequestInFlight,
    #[error("session view is not initialized")]
    NotInitialized,
    #[error("no promotable assistant answer")]
    NothingToPromote,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// State transitions announced to the host view.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Initialized { campaign: Campaign },
    InitializationFailed { message: String },
    NarrationUpdated,
    NarrationLoadFailed { message: String },
    NarrationPromoted { entry: NarrationEntry },
    AssistStateChanged(AssistQueryState),
    SearchStateChanged(RetrievalSearchState),
}

struct SessionState {
    phase: SessionPhase,
    campaign: Option<Campaign>,
    timeline: NarrationTimeline,
    narration_error: Option<String>,
    assist: AssistQueryState,
    search: RetrievalSearchState,
}

impl SessionState {
    fn fresh() -> Self {
        Self {
            phase: SessionPhase::Loading,
            campaign: None,
            timeline: NarrationTimeline::default(),
            narration_error: None,
            assist: AssistQueryState::Idle,
            search: RetrievalSearchState::Idle,
        }
    }
}

/// Orchestrates one campaign session view: initial load, the two
/// request lifecycles, and promotion of assistant answers into the
/// narration timeline. The state lock is held only across transitions,
/// never across a backend call, so the lifecycles stay concurrent.
pub struct SessionController {
    backend: Arc<dyn BackendApi>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn BackendApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            inner: Mutex::new(SessionState::fresh()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            phase: state.phase.clone(),
            campaign: state.campaign.clone(),
            timeline: state.timeline.clone(),
            narration_error: state.narration_error.clone(),
            assist: state.assist.clone(),
            search: state.search.clone(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Loads campaign metadata and narration history, then signals
    /// session start to the backend. The session-start signal is
    /// fire-and-forget: its failure is logged and never surfaced,
    /// because the view must stay usable even when session bookkeeping
    /// is down. Metadata or narration failures are blocking.
    pub async fn initialize(
        self: &Arc<Self>,
        campaign_id: CampaignId,
    ) -> Result<(), SessionError> {
        if !campaign_id.is_valid() {
            let message = "Invalid campaign ID".to_string();
            let mut state = self.inner.lock().await;
            *state = SessionState::fresh();
            state.phase = SessionPhase::Failed(message.clone());
            drop(state);
            self.emit(SessionEvent::InitializationFailed { message });
            return Err(SessionError::InvalidCampaign(campaign_id.0));
        }

        {
            let mut state = self.inner.lock().await;
            *state = SessionState::fresh();
        }

        let campaign = match self.backend.fetch_campaign(campaign_id).await {
            Ok(campaign) => campaign,
            Err(err) => return Err(self.fail_initialization(err).await),
        };

        let entries = match self.backend.fetch_narration_log(campaign_id).await {
            Ok(entries) => entries,
            Err(err) => return Err(self.fail_initialization(err).await),
        };

        {
            let mut state = self.inner.lock().await;
            state.phase = SessionPhase::Ready;
            state.campaign = Some(campaign.clone());
            state.timeline.replace(entries);
        }
        self.emit(SessionEvent::Initialized { campaign });

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            match backend.start_session(campaign_id).await {
                Ok(session) => {
                    info!(campaign = campaign_id.0, session = session.id.0, "session started")
                }
                Err(err) => {
                    warn!(campaign = campaign_id.0, %err, "could not start a session; continuing")
                }
            }
        });

        Ok(())
    }

    async fn fail_initialization(&self, err: BackendError) -> SessionError {
        let message = match &err {
            BackendError::NotFound(_) => "Campaign not found".to_string(),
            other => format!("Failed to load campaign details: {other}"),
        };
        {
            let mut state = self.inner.lock().await;
            state.phase = SessionPhase::Failed(message.clone());
        }
        self.emit(SessionEvent::InitializationFailed { message });
        SessionError::Backend(err)
    }

    /// Submits one assistant query. Rejected locally when the trimmed
    /// prompt is empty or a query is already pending. A 200 response
    /// carrying the backend's `error` field lands in `Failed` with the
    /// optional fallback text, same as a transport failure.
    pub async fn submit_assist_prompt(&self, prompt: &str) -> Result<(), SessionError> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(SessionError::Validation("Prompt is required".to_string()));
        }

        let campaign_id = {
            let mut state = self.inner.lock().await;
            if state.assist.is_pending() {
                return Err(SessionError::RequestInFlight);
            }
            state.assist = AssistQueryState::Pending;
            state.campaign.as_ref().map(|campaign| campaign.id)
        };
        self.emit(SessionEvent::AssistStateChanged(AssistQueryState::Pending));

        let outcome = self.backend.query_assistant(&prompt, campaign_id).await;
        let next = match outcome {
            Ok(body) => {
                if let Some(message) = body.error {
                    AssistQueryState::Failed(AssistFailure {
                        message,
                        fallback_response: body.fallback_response,
                    })
                } else if let Some(response) = body.response {
                    AssistQueryState::Answered(AssistAnswer {
                        prompt,
                        response,
                        context_note: body.context_note,
                    })
                } else {
                    AssistQueryState::Failed(AssistFailure {
                        message: "Assistant returned an empty response".to_string(),
                        fallback_response: None,
                    })
                }
            }
            Err(err) => AssistQueryState::Failed(AssistFailure {
                message: err.to_string(),
                fallback_response: None,
            }),
        };

        {
            let mut state = self.inner.lock().await;
            state.assist = next.clone();
        }
        self.emit(SessionEvent::AssistStateChanged(next));
        Ok(())
    }

    /// Submits one retrieval search, independent of the assist
    /// lifecycle. Both may be pending at the same time.
    pub async fn submit_search_query(&self, query: &str) -> Result<(), SessionError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(SessionError::Validation(
                "Search query is required".to_string(),
            ));
        }

        {
            let mut state = self.inner.lock().await;
            if state.search.is_pending() {
                return Err(SessionError::RequestInFlight);
            }
            state.search = RetrievalSearchState::Pending;
        }
        self.emit(SessionEvent::SearchStateChanged(
            RetrievalSearchState::Pending,
        ));

        let next = match self.backend.search_documents(&query).await {
            Ok(body) => RetrievalSearchState::Results(SearchOutcome::from_retrieve(body)),
            Err(err) => RetrievalSearchState::Failed {
                message: err.to_string(),
            },
        };

        {
            let mut state = self.inner.lock().await;
            state.search = next.clone();
        }
        self.emit(SessionEvent::SearchStateChanged(next));
        Ok(())
    }

    /// Appends the current assistant answer to the narration timeline
    /// and clears the answer slot. A no-op unless an answer is live.
    /// When the append fails the answer is kept so the user can retry
    /// without losing the text.
    pub async fn promote_assist_answer(&self) -> Result<NarrationEntry, SessionError> {
        let (campaign_id, answer) = {
            let state = self.inner.lock().await;
            match (&state.campaign, &state.assist) {
                (Some(campaign), AssistQueryState::Answered(answer)) => {
                    (campaign.id, answer.clone())
                }
                _ => return Err(SessionError::NothingToPromote),
            }
        };

        let entry = self
            .backend
            .append_narration_log(campaign_id, &answer.response)
            .await?;

        // Only clear the slot if it still holds the answer we just
        // promoted. A query submitted while the append was in flight
        // owns the slot now and must not lose its Pending marker.
        let cleared = {
            let mut state = self.inner.lock().await;
            state.timeline.push(entry.clone());
            let still_current = state.assist.answer() == Some(&answer);
            if still_current {
                state.assist = AssistQueryState::Idle;
            }
            still_current
        };
        self.emit(SessionEvent::NarrationPromoted {
            entry: entry.clone(),
        });
        self.emit(SessionEvent::NarrationUpdated);
        if cleared {
            self.emit(SessionEvent::AssistStateChanged(AssistQueryState::Idle));
        }
        Ok(entry)
    }

    /// Manual reload of the narration timeline. A failed reload keeps
    /// the previously loaded entries and surfaces a scoped, retryable
    /// error; the other lifecycles are unaffected.
    pub async fn refresh_narration(&self) -> Result<(), SessionError> {
        let campaign_id = {
            let state = self.inner.lock().await;
            match &state.campaign {
                Some(campaign) => campaign.id,
                None => return Err(SessionError::NotInitialized),
            }
        };

        match self.backend.fetch_narration_log(campaign_id).await {
            Ok(entries) => {
                {
                    let mut state = self.inner.lock().await;
                    state.timeline.replace(entries);
                    state.narration_error = None;
                }
                self.emit(SessionEvent::NarrationUpdated);
                Ok(())
            }
            Err(err) => {
                let message = format!("Failed to refresh narration: {err}");
                {
                    let mut state = self.inner.lock().await;
                    state.narration_error = Some(message.clone());
                }
                self.emit(SessionEvent::NarrationLoadFailed { message });
                Err(SessionError::Backend(err))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
