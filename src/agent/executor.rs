//! Dispatches parsed actions to the OS capability interface.

use std::sync::Arc;
use std::time::Duration;

use crate::computer::{Computer, ComputerError};

use super::action::Action;

/// Ceiling for `wait` actions, whatever the model asks for.
pub const MAX_WAIT: Duration = Duration::from_millis(10_000);

/// Carries out one action at a time against a [`Computer`].
pub struct ActionExecutor {
    computer: Arc<dyn Computer>,
}

impl ActionExecutor {
    pub fn new(computer: Arc<dyn Computer>) -> Self {
        Self { computer }
    }

    /// Execute `action`.
    ///
    /// A failure is logged and handed back for bookkeeping only; the caller
    /// is expected to carry on with the next cycle so the model can react
    /// to what it sees.
    pub async fn execute(&self, action: &Action) -> Result<(), ComputerError> {
        let result = self.dispatch(action).await;
        if let Err(e) = &result {
            tracing::warn!("Action {} failed: {}", action.kind(), e);
        }
        result
    }

    async fn dispatch(&self, action: &Action) -> Result<(), ComputerError> {
        let computer = &self.computer;
        match action {
            Action::MouseMove { x, y } => computer.mouse_move(*x, *y).await,
            Action::MouseClick { x, y, button } => {
                computer.mouse_click(*x, *y, button.as_deref()).await
            }
            Action::MouseDoubleClick { x, y } => computer.mouse_double_click(*x, *y).await,
            Action::MouseScroll {
                x,
                y,
                delta_x,
                delta_y,
            } => computer.mouse_scroll(*x, *y, *delta_x, *delta_y).await,
            Action::MouseDrag {
                start_x,
                start_y,
                end_x,
                end_y,
            } => {
                computer
                    .mouse_drag(*start_x, *start_y, *end_x, *end_y)
                    .await
            }
            Action::KeyType { text } => computer.key_type(text).await,
            Action::KeyPress { key } => computer.key_press(key).await,
            Action::Hotkey { keys } => computer.hotkey(keys).await,
            Action::ClipboardSet { text } => computer.clipboard_set(text).await,
            Action::LaunchApp { app_name } => computer.launch_app(app_name).await,
            Action::RunShell { command } => {
                let output = computer.run_shell(command).await?;
                if output.exit_code != 0 {
                    tracing::warn!(
                        "Shell command exited with code {}: {} (stderr: {})",
                        output.exit_code,
                        command,
                        output.stderr.trim()
                    );
                }
                Ok(())
            }
            // The capture refreshes state on the host; the next cycle takes
            // its own screenshot.
            Action::Screenshot => computer.capture().await.map(drop),
            Action::Wait { ms } => {
                tokio::time::sleep(wait_duration(*ms)).await;
                Ok(())
            }
            Action::Done { .. } => {
                tracing::warn!("done action reached the executor; ignoring");
                Ok(())
            }
        }
    }
}

fn wait_duration(ms: u64) -> Duration {
    Duration::from_millis(ms).min(MAX_WAIT)
}
