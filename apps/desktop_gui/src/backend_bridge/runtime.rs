//! Backend worker thread.
//!
//! The UI thread never touches the network. It pushes [`BackendCommand`]s
//! into a bounded queue; a dedicated thread running a tokio runtime owns
//! the HTTP client and the live-session controller and answers with
//! [`UiEvent`]s, waking the UI with a repaint request after each one.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use client_core::{
    BackendApi, HttpBackend, SearchOutcome, SessionController, SessionError, SessionEvent,
    SourcebookUpload,
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorScope, UiEvent};

struct Bridge {
    backend: Arc<dyn BackendApi>,
    session: Arc<SessionController>,
    ui_tx: Sender<UiEvent>,
    ctx: egui::Context,
}

impl Bridge {
    fn emit(&self, event: UiEvent) {
        if self.ui_tx.try_send(event).is_err() {
            warn!("ui event queue is full or closed, event dropped");
        }
        self.ctx.request_repaint();
    }

    fn emit_error(&self, scope: UiErrorScope, err: &client_core::BackendError) {
        self.emit(UiEvent::Error(UiError::from_backend(scope, err)));
    }
}

/// Spawns the worker thread. Returns immediately; the thread lives for
/// the rest of the process.
pub fn spawn_backend_thread(
    server_url: String,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    ctx: egui::Context,
) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::new(
                    UiErrorScope::Startup,
                    format!("Backend worker failed to start: {err}"),
                )));
                ctx.request_repaint();
                return;
            }
        };

        runtime.block_on(async move {
            let backend: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(server_url.clone()));
            let session = SessionController::new(Arc::clone(&backend));
            let bridge = Arc::new(Bridge {
                backend,
                session,
                ui_tx,
                ctx,
            });
            info!(%server_url, "backend worker ready");

            forward_session_events(Arc::clone(&bridge));

            // Blocking recv keeps this task parked between commands; each
            // command runs on its own tokio task so a slow assistant query
            // never delays a document search.
            while let Ok(cmd) = cmd_rx.recv() {
                handle_command(Arc::clone(&bridge), cmd);
            }
            debug!("command channel closed, backend worker shutting down");
        });
    });
}

/// Mirrors every controller transition into the UI queue as a fresh
/// snapshot so the view never reads controller state directly.
fn forward_session_events(bridge: Arc<Bridge>) {
    let mut events = bridge.session.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::NarrationPromoted { .. } = &event {
                bridge.emit(UiEvent::Info("Answer saved to the narration log.".to_string()));
            }
            let snapshot = bridge.session.snapshot().await;
            bridge.emit(UiEvent::SessionSnapshot(Box::new(snapshot)));
        }
    });
}

fn handle_command(bridge: Arc<Bridge>, cmd: BackendCommand) {
    match cmd {
        BackendCommand::LoadCampaigns => {
            tokio::spawn(async move {
                match bridge.backend.list_campaigns().await {
                    Ok(campaigns) => bridge.emit(UiEvent::CampaignsLoaded(campaigns)),
                    Err(err) => bridge.emit_error(UiErrorScope::Dashboard, &err),
                }
            });
        }
        BackendCommand::CreateCampaign { name, description } => {
            tokio::spawn(async move {
                match bridge
                    .backend
                    .create_campaign(name.trim(), description.as_deref())
                    .await
                {
                    Ok(campaign) => bridge.emit(UiEvent::CampaignCreated(campaign)),
                    Err(err) => bridge.emit_error(UiErrorScope::CreateCampaign, &err),
                }
            });
        }
        BackendCommand::LoadCampaignDetail { campaign_id } => {
            tokio::spawn(async move {
                let detail = async {
                    let campaign = bridge.backend.fetch_campaign(campaign_id).await?;
                    let narration = bridge.backend.fetch_narration_log(campaign_id).await?;
                    let sessions = bridge.backend.list_sessions(campaign_id).await?;
                    Ok::<_, client_core::BackendError>((campaign, narration, sessions))
                }
                .await;
                match detail {
                    Ok((campaign, narration, sessions)) => {
                        bridge.emit(UiEvent::CampaignDetailLoaded {
                            campaign,
                            narration,
                            sessions,
                        })
                    }
                    Err(err) => bridge.emit_error(UiErrorScope::CampaignDetail, &err),
                }
            });
        }
        BackendCommand::AppendNarration {
            campaign_id,
            content,
        } => {
            tokio::spawn(async move {
                match bridge
                    .backend
                    .append_narration_log(campaign_id, &content)
                    .await
                {
                    Ok(entry) => bridge.emit(UiEvent::NarrationAppended(entry)),
                    Err(err) => bridge.emit_error(UiErrorScope::AppendNarration, &err),
                }
            });
        }
        BackendCommand::OpenSession { campaign_id } => {
            tokio::spawn(async move {
                // Failures are already reflected in the snapshot the
                // controller broadcasts, nothing extra to emit here.
                if let Err(err) = bridge.session.initialize(campaign_id).await {
                    debug!(?campaign_id, %err, "session initialization failed");
                }
            });
        }
        BackendCommand::SubmitAssistPrompt { prompt } => {
            tokio::spawn(async move {
                if let Err(err) = bridge.session.submit_assist_prompt(&prompt).await {
                    bridge.emit(UiEvent::Error(UiError::from_session(
                        UiErrorScope::AssistPrompt,
                        &err,
                    )));
                }
            });
        }
        BackendCommand::SubmitSearchQuery { query } => {
            tokio::spawn(async move {
                if let Err(err) = bridge.session.submit_search_query(&query).await {
                    bridge.emit(UiEvent::Error(UiError::from_session(
                        UiErrorScope::SessionSearch,
                        &err,
                    )));
                }
            });
        }
        BackendCommand::PromoteAssistAnswer => {
            tokio::spawn(async move {
                match bridge.session.promote_assist_answer().await {
                    Ok(_) | Err(SessionError::NothingToPromote) => {}
                    Err(err) => bridge.emit(UiEvent::Error(UiError::from_session(
                        UiErrorScope::Promotion,
                        &err,
                    ))),
                }
            });
        }
        BackendCommand::RefreshNarration => {
            tokio::spawn(async move {
                // Load failures land in the snapshot, stale entries stay
                // visible either way.
                if let Err(err) = bridge.session.refresh_narration().await {
                    debug!(%err, "narration refresh failed");
                }
            });
        }
        BackendCommand::LoadSourcebooks => {
            tokio::spawn(async move {
                match bridge.backend.list_sourcebooks().await {
                    Ok(books) => bridge.emit(UiEvent::SourcebooksLoaded(books)),
                    Err(err) => bridge.emit_error(UiErrorScope::Sourcebooks, &err),
                }
            });
        }
        BackendCommand::UploadSourcebook { path } => {
            tokio::spawn(async move {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        bridge.emit(UiEvent::Error(UiError::new(
                            UiErrorScope::Sourcebooks,
                            format!("Could not read {}: {err}", path.display()),
                        )));
                        return;
                    }
                };
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload.bin".to_string());
                let mime_type = mime_guess::from_path(&path)
                    .first()
                    .map(|mime| mime.essence_str().to_string());
                let upload = SourcebookUpload {
                    filename,
                    mime_type,
                    bytes,
                };
                match bridge.backend.upload_sourcebook(upload).await {
                    Ok(book) => bridge.emit(UiEvent::SourcebookUploaded(book)),
                    Err(err) => bridge.emit_error(UiErrorScope::Sourcebooks, &err),
                }
            });
        }
        BackendCommand::DeleteSourcebook { filename } => {
            tokio::spawn(async move {
                match bridge.backend.delete_sourcebook(&filename).await {
                    Ok(()) => bridge.emit(UiEvent::SourcebookDeleted { filename }),
                    Err(err) => bridge.emit_error(UiErrorScope::Sourcebooks, &err),
                }
            });
        }
        BackendCommand::SearchSourcebooks { query } => {
            tokio::spawn(async move {
                match bridge.backend.search_documents(&query).await {
                    Ok(response) => bridge.emit(UiEvent::SourcebookSearchResults(
                        SearchOutcome::from_retrieve(response),
                    )),
                    Err(err) => bridge.emit(UiEvent::Error(UiError::from_backend(
                        UiErrorScope::LibrarySearch,
                        &err,
                    ))),
                }
            });
        }
    }
}
