//! Test doubles: a `Computer` that records calls and a decision service that
//! replays a script.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Computer, ComputerError, Screenshot, ShellOutput};
use crate::llm::{DecisionRequest, DecisionResponse, DecisionService, LlmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Capture,
    MouseMove { x: i32, y: i32 },
    MouseClick { x: Option<i32>, y: Option<i32>, button: Option<String> },
    MouseDoubleClick { x: Option<i32>, y: Option<i32> },
    MouseScroll { x: Option<i32>, y: Option<i32>, delta_x: Option<i32>, delta_y: Option<i32> },
    MouseDrag { start_x: i32, start_y: i32, end_x: i32, end_y: i32 },
    KeyType(String),
    KeyPress(String),
    Hotkey(Vec<String>),
    ClipboardSet(String),
    LaunchApp(String),
    RunShell(String),
}

type CaptureHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct RecordingComputer {
    calls: Mutex<Vec<Call>>,
    exit_code: i32,
    fail_actions: bool,
    fail_capture: bool,
    on_capture: Option<CaptureHook>,
}

impl RecordingComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit code reported by every `run_shell`.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Make every non-capture call fail.
    pub fn failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// Run `hook` while a capture is in flight.
    pub fn on_capture(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_capture = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than screen captures.
    pub fn action_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Capture)
            .collect()
    }

    fn record(&self, name: &str, call: Call) -> Result<(), ComputerError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_actions {
            return Err(ComputerError::CommandFailed {
                program: name.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Computer for RecordingComputer {
    async fn capture(&self) -> Result<Screenshot, ComputerError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Capture);
            calls.iter().filter(|c| **c == Call::Capture).count() - 1
        };
        if let Some(hook) = &self.on_capture {
            hook();
        }
        if self.fail_capture {
            return Err(ComputerError::PermissionDenied("screen recording not allowed".into()));
        }
        Ok(Screenshot {
            image_reference: format!("screen-{n}.png"),
            width: 1280,
            height: 800,
        })
    }

    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), ComputerError> {
        self.record("mouse_move", Call::MouseMove { x, y })
    }

    async fn mouse_click(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        button: Option<&str>,
    ) -> Result<(), ComputerError> {
        let button = button.map(String::from);
        self.record("mouse_click", Call::MouseClick { x, y, button })
    }

    async fn mouse_double_click(
        &self,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<(), ComputerError> {
        self.record("mouse_double_click", Call::MouseDoubleClick { x, y })
    }

    async fn mouse_scroll(
        &self,
        x: Option<i32>,
        y: Option<i32>,
        delta_x: Option<i32>,
        delta_y: Option<i32>,
    ) -> Result<(), ComputerError> {
        self.record("mouse_scroll", Call::MouseScroll { x, y, delta_x, delta_y })
    }

    async fn mouse_drag(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
    ) -> Result<(), ComputerError> {
        self.record("mouse_drag", Call::MouseDrag { start_x, start_y, end_x, end_y })
    }

    async fn key_type(&self, text: &str) -> Result<(), ComputerError> {
        self.record("key_type", Call::KeyType(text.to_string()))
    }

    async fn key_press(&self, key: &str) -> Result<(), ComputerError> {
        self.record("key_press", Call::KeyPress(key.to_string()))
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), ComputerError> {
        self.record("hotkey", Call::Hotkey(keys.to_vec()))
    }

    async fn clipboard_set(&self, text: &str) -> Result<(), ComputerError> {
        self.record("clipboard_set", Call::ClipboardSet(text.to_string()))
    }

    async fn launch_app(&self, app_name: &str) -> Result<(), ComputerError> {
        self.record("launch_app", Call::LaunchApp(app_name.to_string()))
    }

    async fn run_shell(&self, command: &str) -> Result<ShellOutput, ComputerError> {
        self.record("run_shell", Call::RunShell(command.to_string()))?;
        Ok(ShellOutput {
            exit_code: self.exit_code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Replays canned replies in order; once the script runs out every reply
/// is `fallback`.
pub struct ScriptedDecisions {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedDecisions {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: Ok(r#"{"type":"wait","ms":0}"#.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        let mut scripted = Self::new(Vec::<String>::new());
        scripted.fallback = Err(message.to_string());
        scripted
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Ok(fallback.to_string());
        self
    }

    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionService for ScriptedDecisions {
    async fn generate(&self, request: DecisionRequest) -> Result<DecisionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Ok(output) => Ok(DecisionResponse { output }),
            Err(message) => Err(LlmError::Api {
                status: 500,
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DecisionRequest {
        DecisionRequest {
            channel: "test".to_string(),
            input: "prompt".to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn failing_service_fails_every_call() {
        let llm = ScriptedDecisions::failing("boom");
        for _ in 0..3 {
            let err = llm.generate(request()).await.unwrap_err();
            assert!(err.to_string().contains("boom"));
        }
        assert_eq!(llm.requests().len(), 3);
    }

    #[tokio::test]
    async fn script_then_fallback() {
        let llm = ScriptedDecisions::new([r#"{"type":"screenshot"}"#]).with_fallback(r#"{"type":"done"}"#);
        assert_eq!(llm.generate(request()).await.unwrap().output, r#"{"type":"screenshot"}"#);
        assert_eq!(llm.generate(request()).await.unwrap().output, r#"{"type":"done"}"#);
        assert_eq!(llm.generate(request()).await.unwrap().output, r#"{"type":"done"}"#);
    }
}
