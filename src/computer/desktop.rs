//! Native desktop backend: `screenshots` for capture, `enigo` for mouse and
//! keyboard, `arboard` for the clipboard.
//!
//! The input and capture libraries are blocking, so every call is moved onto
//! the blocking pool with `tokio::task::spawn_blocking`.
//!
//! # macOS permissions
//! - Mouse / keyboard control needs Accessibility access.
//! - Screen capture needs Screen Recording access.
//! Calls fail with [`ComputerError::PermissionDenied`] until they are granted.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use enigo::{
    Axis, Button, Coordinate,
    Direction::{Click, Press, Release},
    Enigo, InputError, Key, Keyboard, Mouse, Settings,
};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, RgbaImage};
use screenshots::Screen;
use tokio::process::Command;

use super::{Computer, ComputerError, Screenshot, ShellOutput};

/// Default timeout for `run_shell` commands.
const SHELL_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the platform application launcher.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Drives the local desktop session.
pub struct DesktopComputer {
    clipboard: Arc<Mutex<Option<arboard::Clipboard>>>,
    shell_timeout: Duration,
}

impl Default for DesktopComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopComputer {
    pub fn new() -> Self {
        Self {
            clipboard: Arc::new(Mutex::new(None)),
            shell_timeout: SHELL_TIMEOUT,
        }
    }

    /// Override how long `run_shell` waits before killing the command.
    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }
}

#[async_trait]
impl Computer for DesktopComputer {
    async fn capture(&self) -> Result<Screenshot, ComputerError> {
        blocking("screen capture", || {
            let screens = Screen::all().map_err(|e| device_error("screen capture", e))?;
            let screen = screens
                .into_iter()
                .next()
                .ok_or_else(|| ComputerError::Unsupported("no screens found".to_string()))?;
            let img = screen
                .capture()
                .map_err(|e| device_error("screen capture", e))?;
            encode_screenshot(img)
        })
        .await
    }

    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), ComputerError> {
        with_enigo("mouse move", move |e| e.move_mouse(x, y, Coordinate::Abs)).await
    }

    async fn mouse_click(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        button: Option<&str>,
    ) -> Result<(), ComputerError> {
        let button = parse_button(button.unwrap_or("left"));
        with_enigo("mouse click", move |e| {
            move_if_given(e, x, y)?;
            e.button(button, Click)
        })
        .await
    }

    async fn mouse_double_click(
        &self,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<(), ComputerError> {
        with_enigo("double click", move |e| {
            move_if_given(e, x, y)?;
            e.button(Button::Left, Click)?;
            e.button(Button::Left, Click)
        })
        .await
    }

    async fn mouse_scroll(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        delta_x: Option<i32>,
        delta_y: Option<i32>,
    ) -> Result<(), ComputerError> {
        with_enigo("scroll", move |e| {
            move_if_given(e, x, y)?;
            if let Some(dy) = delta_y.filter(|v| *v != 0) {
                e.scroll(dy, Axis::Vertical)?;
            }
            if let Some(dx) = delta_x.filter(|v| *v != 0) {
                e.scroll(dx, Axis::Horizontal)?;
            }
            Ok(())
        })
        .await
    }

    async fn mouse_drag(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
    ) -> Result<(), ComputerError> {
        with_enigo("drag", move |e| {
            e.move_mouse(start_x, start_y, Coordinate::Abs)?;
            e.button(Button::Left, Press)?;
            let moved = e.move_mouse(end_x, end_y, Coordinate::Abs);
            // Always release, even if the move failed.
            e.button(Button::Left, Release)?;
            moved
        })
        .await
    }

    async fn key_type(&self, text: &str) -> Result<(), ComputerError> {
        let text = text.to_string();
        with_enigo("type", move |e| e.text(&text)).await
    }

    async fn key_press(&self, key: &str) -> Result<(), ComputerError> {
        let key = parse_key(key)?;
        with_enigo("key press", move |e| e.key(key, Click)).await
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), ComputerError> {
        let keys = keys
            .iter()
            .map(|k| parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        let Some((last, modifiers)) = keys.split_last() else {
            return Err(ComputerError::Unsupported("hotkey needs at least one key".to_string()));
        };
        let (last, modifiers) = (*last, modifiers.to_vec());

        with_enigo("hotkey", move |e| {
            for k in &modifiers {
                e.key(*k, Press)?;
            }
            let tapped = e.key(last, Click);
            for k in modifiers.iter().rev() {
                e.key(*k, Release)?;
            }
            tapped
        })
        .await
    }

    async fn clipboard_set(&self, text: &str) -> Result<(), ComputerError> {
        let text = text.to_string();
        let clipboard = self.clipboard.clone();
        blocking("clipboard", move || {
            let mut guard = clipboard.lock().map_err(|_| ComputerError::Device {
                operation: "clipboard".to_string(),
                message: "clipboard lock poisoned".to_string(),
            })?;
            // Kept alive between calls: on X11 the contents are served by
            // the owning `Clipboard` and vanish when it is dropped.
            if guard.is_none() {
                *guard = Some(arboard::Clipboard::new().map_err(|e| device_error("clipboard", e))?);
            }
            match guard.as_mut() {
                Some(cb) => cb.set_text(text).map_err(|e| device_error("clipboard write", e)),
                None => Err(ComputerError::Unsupported("clipboard unavailable".to_string())),
            }
        })
        .await
    }

    async fn launch_app(&self, app_name: &str) -> Result<(), ComputerError> {
        tracing::info!("Launching application: {}", app_name);
        let (program, args) = launcher(app_name);

        let status = tokio::time::timeout(
            LAUNCH_TIMEOUT,
            Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| ComputerError::Timeout {
            program: program.to_string(),
            secs: LAUNCH_TIMEOUT.as_secs(),
        })?
        .map_err(|e| spawn_error(program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ComputerError::CommandFailed {
                program: program.to_string(),
                message: format!("launch failed with exit code: {}", status.code().unwrap_or(-1)),
            })
        }
    }

    async fn run_shell(&self, command: &str) -> Result<ShellOutput, ComputerError> {
        tracing::info!("Executing command: {}", command);

        // Determine shell based on OS
        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("/bin/sh", "-c")
        };

        let output = tokio::time::timeout(
            self.shell_timeout,
            Command::new(shell)
                .arg(shell_arg)
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ComputerError::Timeout {
            program: shell.to_string(),
            secs: self.shell_timeout.as_secs(),
        })?
        .map_err(|e| spawn_error(shell, e))?;

        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run blocking work on the blocking pool.
async fn blocking<T, F>(operation: &'static str, f: F) -> Result<T, ComputerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ComputerError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ComputerError::Device {
            operation: operation.to_string(),
            message: format!("task panicked: {e}"),
        })?
}

/// Run one input sequence against a fresh `Enigo` connection.
async fn with_enigo<F>(operation: &'static str, f: F) -> Result<(), ComputerError>
where
    F: FnOnce(&mut Enigo) -> Result<(), InputError> + Send + 'static,
{
    blocking(operation, move || {
        let mut enigo = Enigo::new(&Settings::default()).map_err(|e| device_error(operation, e))?;
        f(&mut enigo).map_err(|e| device_error(operation, e))
    })
    .await
}

fn move_if_given(e: &mut Enigo, x: Option<i32>, y: Option<i32>) -> Result<(), InputError> {
    if let (Some(x), Some(y)) = (x, y) {
        e.move_mouse(x, y, Coordinate::Abs)?;
    }
    Ok(())
}

/// Encode a frame as a base64 PNG data URI.
fn encode_screenshot(img: RgbaImage) -> Result<Screenshot, ComputerError> {
    let (width, height) = img.dimensions();
    let mut png_bytes: Vec<u8> = Vec::new();
    PngEncoder::new(&mut png_bytes)
        .write_image(img.as_raw(), width, height, ColorType::Rgba8)
        .map_err(|e| device_error("png encode", e))?;
    Ok(Screenshot {
        image_reference: format!("data:image/png;base64,{}", B64.encode(&png_bytes)),
        width,
        height,
    })
}

/// Classify a library failure. Refused OS access is a permission problem,
/// anything else a plain device failure.
fn device_error(operation: &str, err: impl std::fmt::Display) -> ComputerError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission")
        || lower.contains("not allowed")
        || lower.contains("open display")
        || lower.contains("authorization")
    {
        ComputerError::PermissionDenied(format!("{operation}: {message}"))
    } else {
        ComputerError::Device {
            operation: operation.to_string(),
            message,
        }
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> ComputerError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ComputerError::CommandFailed {
            program: program.to_string(),
            message: "not installed or not on PATH".to_string(),
        },
        std::io::ErrorKind::PermissionDenied => {
            ComputerError::PermissionDenied(format!("{program}: {err}"))
        }
        _ => ComputerError::Io(err),
    }
}

/// Platform launcher command for an application name.
fn launcher(app_name: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec!["-a".to_string(), app_name.to_string()])
    } else if cfg!(target_os = "windows") {
        (
            "cmd",
            vec!["/C".to_string(), "start".to_string(), String::new(), app_name.to_string()],
        )
    } else {
        ("xdg-open", vec![app_name.to_string()])
    }
}

fn parse_button(s: &str) -> Button {
    match s.to_ascii_lowercase().as_str() {
        "right" => Button::Right,
        "middle" => Button::Middle,
        _ => Button::Left,
    }
}

/// Map a loose key name to an enigo `Key`. Single characters pass through
/// as `Key::Unicode`.
fn parse_key(s: &str) -> Result<Key, ComputerError> {
    let key = match s.to_ascii_lowercase().as_str() {
        "return" | "enter" => Key::Return,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "shift" => Key::Shift,
        "meta" | "cmd" | "command" | "super" | "win" => Key::Meta,
        "capslock" => Key::CapsLock,
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(ComputerError::Unsupported(format!("unknown key: {s}"))),
            }
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_normalised() {
        assert_eq!(parse_key("enter").unwrap(), Key::Return);
        assert_eq!(parse_key("ESC").unwrap(), Key::Escape);
        assert_eq!(parse_key("cmd").unwrap(), Key::Meta);
        assert_eq!(parse_key("F5").unwrap(), Key::F5);
        assert_eq!(parse_key("A").unwrap(), Key::Unicode('A'));
        assert_eq!(parse_key("é").unwrap(), Key::Unicode('é'));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = parse_key("hyperdrive").unwrap_err();
        assert!(matches!(err, ComputerError::Unsupported(_)));
    }

    #[test]
    fn unknown_button_falls_back_to_left() {
        assert_eq!(parse_button("RIGHT"), Button::Right);
        assert_eq!(parse_button("middle"), Button::Middle);
        assert_eq!(parse_button("thumb"), Button::Left);
    }

    #[test]
    fn capture_is_a_png_data_uri() {
        let img = RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]));
        let shot = encode_screenshot(img).unwrap();

        assert_eq!((shot.width, shot.height), (4, 3));
        let encoded = shot
            .image_reference
            .strip_prefix("data:image/png;base64,")
            .unwrap();
        let bytes = B64.decode(encoded).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn refused_access_is_a_permission_error() {
        let err = device_error("screen capture", "Screen Recording permission not granted");
        assert!(matches!(err, ComputerError::PermissionDenied(_)));

        let err = device_error("type", "xdo failure");
        assert!(matches!(err, ComputerError::Device { .. }));
    }

    #[test]
    fn apps_go_through_the_platform_launcher() {
        let (program, args) = launcher("Notepad");
        if cfg!(target_os = "macos") {
            assert_eq!(program, "open");
            assert_eq!(args, vec!["-a", "Notepad"]);
        } else if cfg!(target_os = "windows") {
            assert_eq!(program, "cmd");
            assert_eq!(args, vec!["/C", "start", "", "Notepad"]);
        } else {
            assert_eq!(program, "xdg-open");
            assert_eq!(args, vec!["Notepad"]);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_output_and_exit_code_are_reported() {
        let computer = DesktopComputer::new();
        let out = computer.run_shell("echo hi; echo oops >&2; exit 17").await.unwrap();

        assert_eq!(out.exit_code, 17);
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_shell_command_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let computer = DesktopComputer::new().with_shell_timeout(Duration::from_millis(200));

        let err = computer
            .run_shell(&format!("sleep 1; touch {}", marker.display()))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputerError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!marker.exists(), "command kept running after its timeout");
    }
}
