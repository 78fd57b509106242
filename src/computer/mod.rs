//! OS capability interface consumed by the agent.
//!
//! The agent never touches the desktop directly: perception and every
//! side effect go through an implementation of [`Computer`]. The
//! [`DesktopComputer`] backend drives the local session through `enigo`,
//! `screenshots` and `arboard`.

mod desktop;

#[cfg(test)]
pub(crate) mod testing;

pub use desktop::DesktopComputer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an OS capability call.
#[derive(Debug, Error)]
pub enum ComputerError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{program} failed: {message}")]
    CommandFailed { program: String, message: String },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{operation} failed: {message}")]
    Device { operation: String, message: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A captured frame of the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Where the image can be found (file path or data URI).
    pub image_reference: String,
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
}

/// Result of a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Screen perception plus mouse, keyboard, clipboard, application and shell
/// control.
///
/// Optional arguments are passed through untouched; each implementation
/// decides its own defaults (current cursor position, left button, no
/// scroll on an axis, ...).
#[async_trait]
pub trait Computer: Send + Sync {
    /// Capture the full primary display. Must fail rather than hang when the
    /// OS refuses access.
    async fn capture(&self) -> Result<Screenshot, ComputerError>;

    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), ComputerError>;

    async fn mouse_click(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        button: Option<&str>,
    ) -> Result<(), ComputerError>;

    async fn mouse_double_click(&self, x: Option<i32>, y: Option<i32>)
        -> Result<(), ComputerError>;

    async fn mouse_scroll(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        delta_x: Option<i32>,
        delta_y: Option<i32>,
    ) -> Result<(), ComputerError>;

    async fn mouse_drag(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
    ) -> Result<(), ComputerError>;

    async fn key_type(&self, text: &str) -> Result<(), ComputerError>;

    async fn key_press(&self, key: &str) -> Result<(), ComputerError>;

    /// Press all keys down in order, then release them in reverse.
    async fn hotkey(&self, keys: &[String]) -> Result<(), ComputerError>;

    async fn clipboard_set(&self, text: &str) -> Result<(), ComputerError>;

    async fn launch_app(&self, app_name: &str) -> Result<(), ComputerError>;

    /// Run a command through the platform shell. A non-zero exit code is a
    /// successful call; only failing to run the command is an error.
    async fn run_shell(&self, command: &str) -> Result<ShellOutput, ComputerError>;
}
