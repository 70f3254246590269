//! Desktop entry point for the game-master console.

mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;

use crate::backend_bridge::commands::BackendCommand;
use crate::backend_bridge::runtime::spawn_backend_thread;
use crate::controller::events::UiEvent;
use crate::ui::app::{DesktopGuiApp, PersistedSettings, SETTINGS_STORAGE_KEY};

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Campaign prep and live-session console for tabletop game masters.
#[derive(Debug, Parser)]
#[command(name = "gm_console", version, about)]
struct StartupConfig {
    /// Base URL of the campaign backend.
    #[arg(long, env = "GM_CONSOLE_SERVER_URL")]
    server_url: Option<String>,
}

/// CLI wins over the persisted setting, which wins over the default.
fn resolve_server_url(cli: Option<String>, persisted: Option<String>) -> String {
    cli.or(persisted)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = StartupConfig::parse();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Game Master Console")
            .with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Game Master Console",
        native_options,
        Box::new(move |cc| {
            let persisted = PersistedSettings::from_json(
                cc.storage
                    .and_then(|storage| storage.get_string(SETTINGS_STORAGE_KEY)),
            );
            let server_url = resolve_server_url(config.server_url, persisted.server_url);
            spawn_backend_thread(server_url.clone(), cmd_rx, ui_tx, cc.egui_ctx.clone());
            Ok(Box::new(DesktopGuiApp::new(cmd_tx, ui_rx, server_url)))
        }),
    )
}
