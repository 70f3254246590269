//! Hand-off from the UI thread to the backend worker queue.

use crossbeam_channel::{Sender, TrySendError};
use tracing::error;

use crate::backend_bridge::commands::BackendCommand;

/// Queues a command for the backend worker without blocking the frame.
/// On failure the status line is updated in place so the user sees why
/// nothing happened.
pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    match cmd_tx.try_send(cmd) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            *status = "The backend is busy. Please try again in a moment.".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            error!("backend worker is gone, command dropped");
            *status = "Lost connection to the backend worker. Please restart.".to_string();
        }
    }
}
