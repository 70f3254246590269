//! Events flowing from the backend worker back to the UI thread.

use client_core::{BackendError, SearchOutcome, SessionError, SessionSnapshot};
use shared::protocol::{Campaign, NarrationEntry, SessionRecord, Sourcebook};

pub enum UiEvent {
    CampaignsLoaded(Vec<Campaign>),
    CampaignCreated(Campaign),
    CampaignDetailLoaded {
        campaign: Campaign,
        narration: Vec<NarrationEntry>,
        sessions: Vec<SessionRecord>,
    },
    NarrationAppended(NarrationEntry),
    SessionSnapshot(Box<SessionSnapshot>),
    SourcebooksLoaded(Vec<Sourcebook>),
    SourcebookUploaded(Sourcebook),
    SourcebookDeleted {
        filename: String,
    },
    SourcebookSearchResults(SearchOutcome),
    Info(String),
    Error(UiError),
}

/// Where in the UI an error should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorScope {
    Startup,
    Dashboard,
    CreateCampaign,
    CampaignDetail,
    AppendNarration,
    AssistPrompt,
    SessionSearch,
    LibrarySearch,
    Promotion,
    Sourcebooks,
}

#[derive(Debug, Clone)]
pub struct UiError {
    pub scope: UiErrorScope,
    pub message: String,
}

impl UiError {
    pub fn new(scope: UiErrorScope, message: impl Into<String>) -> Self {
        Self {
            scope,
            message: message.into(),
        }
    }

    /// Turns a raw backend failure into a message fit for the scope it
    /// surfaces in. Load failures get a generic retry hint, actions the
    /// user just took keep the underlying cause.
    pub fn from_backend(scope: UiErrorScope, err: &BackendError) -> Self {
        let message = match (scope, err) {
            (UiErrorScope::Dashboard, _) => {
                "Failed to load campaigns. Please try again later.".to_string()
            }
            (UiErrorScope::CampaignDetail, BackendError::NotFound(detail)) => detail.clone(),
            (UiErrorScope::CampaignDetail, _) => {
                "Failed to load campaign details. Please try again later.".to_string()
            }
            (UiErrorScope::CreateCampaign, err) => format!("Failed to create campaign: {err}"),
            (UiErrorScope::AppendNarration, err) => format!("Failed to add narration: {err}"),
            (UiErrorScope::Promotion, err) => {
                format!("Could not save the answer as narration: {err}")
            }
            (UiErrorScope::AssistPrompt, _) => {
                "The assistant did not respond. Please try again.".to_string()
            }
            (UiErrorScope::SessionSearch | UiErrorScope::LibrarySearch, err) => {
                format!("Search failed: {err}")
            }
            (UiErrorScope::Sourcebooks, err) => format!("Sourcebook operation failed: {err}"),
            (UiErrorScope::Startup, err) => format!("Backend worker failed to start: {err}"),
        };
        Self { scope, message }
    }

    pub fn from_session(scope: UiErrorScope, err: &SessionError) -> Self {
        match err {
            SessionError::Validation(message) => Self::new(scope, message.clone()),
            SessionError::RequestInFlight => {
                Self::new(scope, "A request is already running. Please wait.")
            }
            SessionError::NotInitialized => {
                Self::new(scope, "No session is open for this campaign.")
            }
            SessionError::NothingToPromote => {
                Self::new(scope, "There is no assistant answer to save yet.")
            }
            SessionError::InvalidCampaign(id) => Self::new(scope, format!("Invalid campaign: {id}")),
            SessionError::Backend(err) => Self::from_backend(scope, err),
        }
    }
}
