//! The game-master console window.
//!
//! Four views share one window: the campaign dashboard, a campaign
//! detail page, the live session screen, and the sourcebook library.
//! All state shown here arrives as [`UiEvent`]s from the backend
//! worker; nothing in this module performs I/O.

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use client_core::{
    validate_campaign_name, AssistQueryState, RetrievalSearchState, SearchOutcome, SessionPhase,
    SessionSnapshot,
};
use shared::domain::CampaignId;
use shared::protocol::{Campaign, NarrationEntry, SessionRecord, Sourcebook};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiErrorScope, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

pub const SETTINGS_STORAGE_KEY: &str = "gm_console.settings";

const SEARCH_PREVIEW_CHARS: usize = 300;
const LIBRARY_PREVIEW_CHARS: usize = 200;

/// Settings carried across launches through eframe's storage.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub server_url: Option<String>,
}

impl PersistedSettings {
    pub fn from_json(raw: Option<String>) -> Self {
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppView {
    Dashboard,
    CampaignDetail,
    LiveSession,
    Sourcebooks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailTab {
    Narration,
    Sessions,
}

struct CampaignDetail {
    campaign: Campaign,
    narration: Vec<NarrationEntry>,
    sessions: Vec<SessionRecord>,
}

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    server_url: String,

    view: AppView,
    status: String,

    campaigns: Vec<Campaign>,
    campaigns_loading: bool,
    dashboard_error: Option<String>,
    show_create_dialog: bool,
    create_name: String,
    create_description: String,
    create_error: Option<String>,

    detail: Option<CampaignDetail>,
    detail_loading: bool,
    detail_error: Option<String>,
    detail_tab: DetailTab,
    narration_input: String,
    append_error: Option<String>,

    session: SessionSnapshot,
    assist_prompt: String,
    assist_error: Option<String>,
    search_query: String,
    search_error: Option<String>,

    sourcebooks: Vec<Sourcebook>,
    sourcebooks_loading: bool,
    sourcebook_error: Option<String>,
    library_query: String,
    library_results: Option<SearchOutcome>,
    library_search_error: Option<String>,
    library_search_pending: bool,
}

impl DesktopGuiApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        server_url: String,
    ) -> Self {
        let mut app = Self {
            cmd_tx,
            ui_rx,
            server_url,
            view: AppView::Dashboard,
            status: "Loading campaigns".to_string(),
            campaigns: Vec::new(),
            campaigns_loading: true,
            dashboard_error: None,
            show_create_dialog: false,
            create_name: String::new(),
            create_description: String::new(),
            create_error: None,
            detail: None,
            detail_loading: false,
            detail_error: None,
            detail_tab: DetailTab::Narration,
            narration_input: String::new(),
            append_error: None,
            session: SessionSnapshot::default(),
            assist_prompt: String::new(),
            assist_error: None,
            search_query: String::new(),
            search_error: None,
            sourcebooks: Vec::new(),
            sourcebooks_loading: false,
            sourcebook_error: None,
            library_query: String::new(),
            library_results: None,
            library_search_error: None,
            library_search_pending: false,
        };
        app.dispatch(BackendCommand::LoadCampaigns);
        app
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::CampaignsLoaded(campaigns) => {
                    self.campaigns = campaigns;
                    self.campaigns_loading = false;
                    self.dashboard_error = None;
                }
                UiEvent::CampaignCreated(campaign) => {
                    self.status = format!("Created campaign \"{}\"", campaign.name);
                    self.campaigns.push(campaign);
                    self.show_create_dialog = false;
                    self.create_name.clear();
                    self.create_description.clear();
                    self.create_error = None;
                }
                UiEvent::CampaignDetailLoaded {
                    campaign,
                    narration,
                    sessions,
                } => {
                    self.detail = Some(CampaignDetail {
                        campaign,
                        narration,
                        sessions,
                    });
                    self.detail_loading = false;
                    self.detail_error = None;
                }
                UiEvent::NarrationAppended(entry) => {
                    if let Some(detail) = self.detail.as_mut() {
                        if detail.campaign.id == entry.campaign_id {
                            detail.narration.push(entry);
                        }
                    }
                    self.narration_input.clear();
                    self.append_error = None;
                    self.status = "Narration entry added".to_string();
                }
                UiEvent::SessionSnapshot(snapshot) => {
                    self.session = *snapshot;
                }
                UiEvent::SourcebooksLoaded(books) => {
                    self.sourcebooks = books;
                    self.sourcebooks_loading = false;
                    self.sourcebook_error = None;
                }
                UiEvent::SourcebookUploaded(book) => {
                    self.status = format!("Uploaded {}", book.filename);
                    self.sourcebooks.retain(|b| b.filename != book.filename);
                    self.sourcebooks.push(book);
                }
                UiEvent::SourcebookDeleted { filename } => {
                    self.sourcebooks.retain(|b| b.filename != filename);
                    self.status = format!("Deleted {filename}");
                }
                UiEvent::SourcebookSearchResults(outcome) => {
                    self.library_results = Some(outcome);
                    self.library_search_pending = false;
                    self.library_search_error = None;
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::Error(err) => self.apply_error(err.scope, err.message),
            }
        }
    }

    fn apply_error(&mut self, scope: UiErrorScope, message: String) {
        match scope {
            UiErrorScope::Startup => {
                self.status = message;
            }
            UiErrorScope::Dashboard => {
                self.campaigns_loading = false;
                self.dashboard_error = Some(message);
            }
            UiErrorScope::CreateCampaign => {
                self.create_error = Some(message);
            }
            UiErrorScope::CampaignDetail => {
                self.detail_loading = false;
                self.detail_error = Some(message);
            }
            UiErrorScope::AppendNarration => {
                self.append_error = Some(message);
            }
            UiErrorScope::AssistPrompt => {
                self.assist_error = Some(message);
            }
            UiErrorScope::SessionSearch => {
                self.search_error = Some(message);
            }
            UiErrorScope::LibrarySearch => {
                self.library_search_pending = false;
                self.library_search_error = Some(message);
            }
            UiErrorScope::Promotion => {
                self.assist_error = Some(message);
            }
            UiErrorScope::Sourcebooks => {
                self.sourcebooks_loading = false;
                self.sourcebook_error = Some(message);
            }
        }
    }

    fn open_campaign(&mut self, campaign_id: CampaignId) {
        self.detail = None;
        self.detail_loading = true;
        self.detail_error = None;
        self.detail_tab = DetailTab::Narration;
        self.view = AppView::CampaignDetail;
        self.dispatch(BackendCommand::LoadCampaignDetail { campaign_id });
    }

    fn open_live_session(&mut self, campaign_id: CampaignId) {
        self.session = SessionSnapshot::default();
        self.assist_prompt.clear();
        self.assist_error = None;
        self.search_query.clear();
        self.search_error = None;
        self.view = AppView::LiveSession;
        self.dispatch(BackendCommand::OpenSession { campaign_id });
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("console_top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Game Master Console");
                ui.separator();
                if ui
                    .selectable_label(self.view == AppView::Dashboard, "Campaigns")
                    .clicked()
                    && self.view != AppView::Dashboard
                {
                    self.view = AppView::Dashboard;
                    self.campaigns_loading = true;
                    self.dispatch(BackendCommand::LoadCampaigns);
                }
                if ui
                    .selectable_label(self.view == AppView::Sourcebooks, "Sourcebooks")
                    .clicked()
                    && self.view != AppView::Sourcebooks
                {
                    self.view = AppView::Sourcebooks;
                    self.sourcebooks_loading = true;
                    self.dispatch(BackendCommand::LoadSourcebooks);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(&self.server_url);
                });
            });
        });
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("console_status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
            });
        });
    }

    fn show_dashboard(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Campaigns");
                if ui.button("New campaign").clicked() {
                    self.show_create_dialog = true;
                    self.create_error = None;
                }
                if ui.button("Refresh").clicked() {
                    self.campaigns_loading = true;
                    self.dispatch(BackendCommand::LoadCampaigns);
                }
            });
            ui.separator();

            if let Some(message) = &self.dashboard_error {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            }
            if self.campaigns_loading {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label("Loading campaigns");
                });
                return;
            }
            if self.campaigns.is_empty() && self.dashboard_error.is_none() {
                ui.label("No campaigns yet. Create one to get started.");
                return;
            }

            let mut open_id = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                for campaign in &self.campaigns {
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            ui.strong(&campaign.name);
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if ui.button("Open").clicked() {
                                        open_id = Some(campaign.id);
                                    }
                                    ui.weak(format_day(campaign.created_at));
                                },
                            );
                        });
                        if let Some(description) = &campaign.description {
                            ui.label(description);
                        }
                    });
                }
            });
            if let Some(campaign_id) = open_id {
                self.open_campaign(campaign_id);
            }
        });

        if self.show_create_dialog {
            self.show_create_dialog_window(ctx);
        }
    }

    fn show_create_dialog_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_create_dialog;
        egui::Window::new("New campaign")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Name");
                ui.text_edit_singleline(&mut self.create_name);
                ui.label("Description (optional)");
                ui.text_edit_multiline(&mut self.create_description);
                if let Some(message) = &self.create_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, message);
                }
                ui.horizontal(|ui| {
                    if ui.button("Create").clicked() {
                        match validate_campaign_name(&self.create_name) {
                            Ok(()) => {
                                let description = {
                                    let trimmed = self.create_description.trim();
                                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                                };
                                let cmd = BackendCommand::CreateCampaign {
                                    name: self.create_name.clone(),
                                    description,
                                };
                                self.create_error = None;
                                self.dispatch(cmd);
                            }
                            Err(message) => self.create_error = Some(message),
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_create_dialog = false;
                        self.create_error = None;
                    }
                });
            });
        self.show_create_dialog &= open;
    }

    fn show_campaign_detail(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if ui.button("< Back to campaigns").clicked() {
                self.view = AppView::Dashboard;
                return;
            }
            ui.separator();

            if let Some(message) = &self.detail_error {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
                return;
            }
            if self.detail_loading || self.detail.is_none() {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label("Loading campaign");
                });
                return;
            }

            let campaign_id = self
                .detail
                .as_ref()
                .map(|detail| detail.campaign.id)
                .unwrap_or(CampaignId(0));
            let mut start_session = false;
            let mut append: Option<String> = None;

            if let Some(detail) = &self.detail {
                ui.horizontal(|ui| {
                    ui.heading(&detail.campaign.name);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Start live session").clicked() {
                            start_session = true;
                        }
                    });
                });
                if let Some(description) = &detail.campaign.description {
                    ui.label(description);
                }
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.detail_tab, DetailTab::Narration, "Narration");
                    ui.selectable_value(&mut self.detail_tab, DetailTab::Sessions, "Sessions");
                });
                ui.separator();

                match self.detail_tab {
                    DetailTab::Narration => {
                        let input_height = 80.0;
                        egui::ScrollArea::vertical()
                            .max_height(ui.available_height() - input_height - 48.0)
                            .auto_shrink([false, true])
                            .show(ui, |ui| {
                                if detail.narration.is_empty() {
                                    ui.weak("No narration recorded yet.");
                                }
                                for entry in &detail.narration {
                                    show_narration_entry(ui, entry);
                                }
                            });
                        ui.separator();
                        if let Some(message) = &self.append_error {
                            ui.colored_label(egui::Color32::LIGHT_RED, message);
                        }
                        ui.add(
                            egui::TextEdit::multiline(&mut self.narration_input)
                                .hint_text("Record what just happened")
                                .desired_rows(3)
                                .desired_width(f32::INFINITY),
                        );
                        let can_append = !self.narration_input.trim().is_empty();
                        if ui
                            .add_enabled(can_append, egui::Button::new("Add entry"))
                            .clicked()
                        {
                            append = Some(self.narration_input.trim().to_string());
                        }
                    }
                    DetailTab::Sessions => {
                        egui::ScrollArea::vertical().show(ui, |ui| {
                            if detail.sessions.is_empty() {
                                ui.weak("No sessions recorded for this campaign.");
                            }
                            for record in &detail.sessions {
                                ui.horizontal(|ui| {
                                    ui.label(format_stamp(record.start_time));
                                    match record.end_time {
                                        Some(end) => ui.weak(format!("ended {}", format_stamp(end))),
                                        None => ui.weak("in progress"),
                                    };
                                });
                            }
                        });
                    }
                }
            }

            if let Some(content) = append {
                self.append_error = None;
                self.dispatch(BackendCommand::AppendNarration {
                    campaign_id,
                    content,
                });
            }
            if start_session {
                self.open_live_session(campaign_id);
            }
        });
    }

    fn show_live_session(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if ui.button("< Back to campaign").clicked() {
                self.view = AppView::CampaignDetail;
                if let Some(detail) = &self.detail {
                    let campaign_id = detail.campaign.id;
                    self.detail_loading = true;
                    self.dispatch(BackendCommand::LoadCampaignDetail { campaign_id });
                }
                return;
            }
            ui.separator();

            match self.session.phase.clone() {
                SessionPhase::Loading => {
                    ui.horizontal(|ui| {
                        ui.add(egui::Spinner::new());
                        ui.label("Opening session");
                    });
                }
                SessionPhase::Failed(message) => {
                    ui.colored_label(egui::Color32::LIGHT_RED, message);
                }
                SessionPhase::Ready => self.show_live_session_ready(ui),
            }
        });
    }

    fn show_live_session_ready(&mut self, ui: &mut egui::Ui) {
        if let Some(campaign) = &self.session.campaign {
            ui.heading(format!("Live session: {}", campaign.name));
        }
        ui.add_space(4.0);

        let pane_height = ui.available_height();
        ui.columns(2, |columns| {
            self.show_narration_pane(&mut columns[0], pane_height);
            self.show_assist_pane(&mut columns[1]);
        });
    }

    fn show_narration_pane(&mut self, ui: &mut egui::Ui, pane_height: f32) {
        ui.horizontal(|ui| {
            ui.strong("Narration");
            if ui.button("Refresh").clicked() {
                self.dispatch(BackendCommand::RefreshNarration);
            }
        });
        if let Some(message) = &self.session.narration_error {
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }
        egui::ScrollArea::vertical()
            .id_salt("session_narration")
            .max_height(pane_height - 48.0)
            .auto_shrink([false, true])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if self.session.timeline.is_empty() {
                    ui.weak("Nothing narrated yet.");
                }
                for entry in self.session.timeline.entries() {
                    show_narration_entry(ui, entry);
                }
            });
    }

    fn show_assist_pane(&mut self, ui: &mut egui::Ui) {
        ui.strong("Assistant");
        ui.add(
            egui::TextEdit::multiline(&mut self.assist_prompt)
                .hint_text("Ask for a scene, a name, a ruling")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );
        let assist_pending = self.session.assist.is_pending();
        let can_ask = !assist_pending && !self.assist_prompt.trim().is_empty();
        ui.horizontal(|ui| {
            if ui.add_enabled(can_ask, egui::Button::new("Ask")).clicked() {
                self.assist_error = None;
                let prompt = self.assist_prompt.trim().to_string();
                self.dispatch(BackendCommand::SubmitAssistPrompt { prompt });
            }
            if assist_pending {
                ui.add(egui::Spinner::new());
                ui.weak("Waiting for the assistant");
            }
        });
        if let Some(message) = &self.assist_error {
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }

        match self.session.assist.clone() {
            AssistQueryState::Idle | AssistQueryState::Pending => {}
            AssistQueryState::Answered(answer) => {
                ui.group(|ui| {
                    ui.label(&answer.response);
                    if let Some(note) = &answer.context_note {
                        ui.weak(note);
                    }
                    if ui.button("Use as narration").clicked() {
                        self.dispatch(BackendCommand::PromoteAssistAnswer);
                    }
                });
            }
            AssistQueryState::Failed(failure) => {
                ui.colored_label(egui::Color32::LIGHT_RED, &failure.message);
                if let Some(fallback) = &failure.fallback_response {
                    ui.group(|ui| {
                        ui.weak("Fallback suggestion");
                        ui.label(fallback);
                    });
                }
            }
        }

        ui.add_space(8.0);
        ui.collapsing("Reference search", |ui| {
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.search_query)
                        .hint_text("Search the sourcebooks"),
                );
                let search_pending = self.session.search.is_pending();
                let can_search = !search_pending && !self.search_query.trim().is_empty();
                if ui
                    .add_enabled(can_search, egui::Button::new("Search"))
                    .clicked()
                {
                    self.search_error = None;
                    let query = self.search_query.trim().to_string();
                    self.dispatch(BackendCommand::SubmitSearchQuery { query });
                }
                if search_pending {
                    ui.add(egui::Spinner::new());
                }
            });
            if let Some(message) = &self.search_error {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            }
            match self.session.search.clone() {
                RetrievalSearchState::Idle | RetrievalSearchState::Pending => {}
                RetrievalSearchState::Results(outcome) => {
                    if outcome.hits.is_empty() {
                        ui.weak(format!("No matches for \"{}\".", outcome.query));
                    }
                    for hit in &outcome.hits {
                        ui.group(|ui| {
                            ui.strong(&hit.source_filename);
                            ui.label(preview(&hit.excerpt, SEARCH_PREVIEW_CHARS));
                        });
                    }
                }
                RetrievalSearchState::Failed { message } => {
                    ui.colored_label(egui::Color32::LIGHT_RED, message);
                }
            }
        });
    }

    fn show_sourcebooks(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Sourcebooks");
                if ui.button("Upload").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Documents", &["pdf", "txt", "md"])
                        .pick_file()
                    {
                        self.status = format!("Uploading {}", path.display());
                        self.dispatch(BackendCommand::UploadSourcebook { path });
                    }
                }
                if ui.button("Refresh").clicked() {
                    self.sourcebooks_loading = true;
                    self.dispatch(BackendCommand::LoadSourcebooks);
                }
            });
            ui.separator();

            if let Some(message) = &self.sourcebook_error {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            }
            if self.sourcebooks_loading {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label("Loading sourcebooks");
                });
                return;
            }

            let mut delete: Option<String> = None;
            egui::ScrollArea::vertical()
                .id_salt("sourcebook_list")
                .max_height(ui.available_height() * 0.5)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    if self.sourcebooks.is_empty() && self.sourcebook_error.is_none() {
                        ui.label("No sourcebooks uploaded yet.");
                    }
                    for book in &self.sourcebooks {
                        ui.group(|ui| {
                            ui.horizontal(|ui| {
                                ui.strong(&book.filename);
                                ui.weak(human_readable_bytes(book.size));
                                if !book.processed {
                                    ui.weak("indexing");
                                }
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        if ui.button("Delete").clicked() {
                                            delete = Some(book.filename.clone());
                                        }
                                        ui.weak(&book.created_at);
                                    },
                                );
                            });
                        });
                    }
                });
            if let Some(filename) = delete {
                self.dispatch(BackendCommand::DeleteSourcebook { filename });
            }

            ui.separator();
            ui.strong("Search the library");
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.library_query)
                        .hint_text("ghouls, trap rules, the Salt Marsh lighthouse"),
                );
                let can_search =
                    !self.library_search_pending && !self.library_query.trim().is_empty();
                if ui
                    .add_enabled(can_search, egui::Button::new("Search"))
                    .clicked()
                {
                    self.library_search_pending = true;
                    self.library_search_error = None;
                    let query = self.library_query.trim().to_string();
                    self.dispatch(BackendCommand::SearchSourcebooks { query });
                }
                if self.library_search_pending {
                    ui.add(egui::Spinner::new());
                }
            });
            if let Some(message) = &self.library_search_error {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            }
            if let Some(outcome) = &self.library_results {
                egui::ScrollArea::vertical()
                    .id_salt("library_results")
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        if outcome.hits.is_empty() {
                            ui.weak(format!("No matches for \"{}\".", outcome.query));
                        }
                        for hit in &outcome.hits {
                            ui.group(|ui| {
                                ui.strong(&hit.source_filename);
                                ui.label(preview(&hit.excerpt, LIBRARY_PREVIEW_CHARS));
                            });
                        }
                    });
            }
        });
    }
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_top_bar(ctx);
        self.show_status_bar(ctx);
        match self.view {
            AppView::Dashboard => self.show_dashboard(ctx),
            AppView::CampaignDetail => self.show_campaign_detail(ctx),
            AppView::LiveSession => self.show_live_session(ctx),
            AppView::Sourcebooks => self.show_sourcebooks(ctx),
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            server_url: Some(self.server_url.clone()),
        };
        if let Ok(serialized) = serde_json::to_string(&settings) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}

fn show_narration_entry(ui: &mut egui::Ui, entry: &NarrationEntry) {
    ui.group(|ui| {
        ui.weak(format_stamp(entry.created_at));
        ui.label(&entry.content);
    });
}

fn format_stamp(stamp: NaiveDateTime) -> String {
    stamp.format("%Y-%m-%d %H:%M").to_string()
}

fn format_day(stamp: NaiveDateTime) -> String {
    stamp.format("%Y-%m-%d").to_string()
}

/// Shortens a stored excerpt for a list row, cutting on a char
/// boundary so multi-byte text never splits.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn human_readable_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text_untouched() {
        assert_eq!(preview("a quiet road", 300), "a quiet road");
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let text = "é".repeat(400);
        let shortened = preview(&text, 300);
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), 303);
    }

    #[test]
    fn byte_sizes_render_with_sensible_units() {
        assert_eq!(human_readable_bytes(512), "512 B");
        assert_eq!(human_readable_bytes(2048), "2.0 KiB");
        assert_eq!(human_readable_bytes(1_048_576), "1.0 MiB");
    }

    #[test]
    fn persisted_settings_survive_a_round_trip() {
        let settings = PersistedSettings {
            server_url: Some("http://localhost:8000".to_string()),
        };
        let raw = serde_json::to_string(&settings).unwrap();
        let restored = PersistedSettings::from_json(Some(raw));
        assert_eq!(
            restored.server_url.as_deref(),
            Some("http://localhost:8000")
        );
    }

    #[test]
    fn malformed_persisted_settings_fall_back_to_defaults() {
        let restored = PersistedSettings::from_json(Some("not json".to_string()));
        assert!(restored.server_url.is_none());
    }

    #[test]
    fn search_errors_route_to_their_own_view() {
        let (cmd_tx, _cmd_rx) = crossbeam_channel::bounded(8);
        let (_ui_tx, ui_rx) = crossbeam_channel::bounded::<UiEvent>(8);
        let mut app = DesktopGuiApp::new(cmd_tx, ui_rx, "http://localhost:8000".to_string());

        app.apply_error(UiErrorScope::SessionSearch, "session search failed".to_string());
        app.apply_error(UiErrorScope::LibrarySearch, "library search failed".to_string());

        assert_eq!(app.search_error.as_deref(), Some("session search failed"));
        assert_eq!(
            app.library_search_error.as_deref(),
            Some("library search failed")
        );
        assert!(app.sourcebook_error.is_none());
    }
}
