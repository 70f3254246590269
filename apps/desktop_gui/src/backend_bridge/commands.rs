//! Backend commands queued from UI to the backend worker.

use shared::domain::CampaignId;
use std::path::PathBuf;

pub enum BackendCommand {
    LoadCampaigns,
    CreateCampaign {
        name: String,
        description: Option<String>,
    },
    LoadCampaignDetail {
        campaign_id: CampaignId,
    },
    AppendNarration {
        campaign_id: CampaignId,
        content: String,
    },
    OpenSession {
        campaign_id: CampaignId,
    },
    SubmitAssistPrompt {
        prompt: String,
    },
    SubmitSearchQuery {
        query: String,
    },
    PromoteAssistAnswer,
    RefreshNarration,
    LoadSourcebooks,
    UploadSourcebook {
        path: PathBuf,
    },
    DeleteSourcebook {
        filename: String,
    },
    SearchSourcebooks {
        query: String,
    },
}
