//! Core perceive/decide/execute loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::computer::Computer;
use crate::llm::{DecisionRequest, DecisionService};

use super::action::Action;
use super::executor::ActionExecutor;
use super::prompt::build_prompt;
use super::types::{AgentOptions, AgentResult, AgentStep, History};

const ALREADY_RUNNING: &str = "agent is already running";
const CANCELLED: &str = "cancelled";

/// Drives the desktop toward a goal, one action per step.
///
/// # Algorithm
/// 1. Stop if cancellation was requested
/// 2. Capture the screen
/// 3. Ask the decision service for the next action
/// 4. Parse and record it, then notify the observer
/// 5. Finish on `done`, otherwise execute the action
/// 6. Pause for the step delay and repeat, up to `max_steps` times
///
/// Failing to see the screen or to reach the decision service ends the
/// run. A failed action does not.
pub struct Agent {
    goal: String,
    llm: Arc<dyn DecisionService>,
    computer: Arc<dyn Computer>,
    executor: ActionExecutor,
    options: AgentOptions,
    cancelled: Arc<AtomicBool>,
    running: AtomicBool,
}

/// Requests a graceful stop of an [`Agent`] from anywhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Takes effect at the start of the agent's next iteration; in-flight
    /// calls are never interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Marks the agent idle again when a run ends, however it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    cancelled: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Agent {
    pub fn new(
        goal: impl Into<String>,
        llm: Arc<dyn DecisionService>,
        computer: Arc<dyn Computer>,
        options: AgentOptions,
    ) -> Self {
        Self {
            goal: goal.into(),
            llm,
            executor: ActionExecutor::new(computer.clone()),
            computer,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a graceful stop. Safe to call at any time, including before
    /// `run` starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Run until the goal is declared done, the step budget runs out, the
    /// run is cancelled, or perception/decision fails.
    pub async fn run(&self) -> AgentResult {
        self.run_with(|_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_step` with every step as soon as
    /// it is recorded and before its action is executed.
    pub async fn run_with<F>(&self, mut on_step: F) -> AgentResult
    where
        F: FnMut(&AgentStep) + Send,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Rejected overlapping run for goal: {}", self.goal);
            return AgentResult::failure(History::new(), ALREADY_RUNNING);
        }
        let _guard = RunGuard {
            running: &self.running,
            cancelled: &self.cancelled,
        };

        tracing::info!("Agent run started: {}", self.goal);
        let result = self.run_loop(&mut on_step).await;
        tracing::info!(
            "Agent run finished after {} steps (success={}): {}",
            result.steps.len(),
            result.success,
            result.result
        );
        result
    }

    async fn run_loop(&self, on_step: &mut (dyn FnMut(&AgentStep) + Send)) -> AgentResult {
        let mut history = History::new();
        let mut consecutive_failures = 0usize;

        for iteration in 0..self.options.max_steps {
            if self.cancelled.load(Ordering::SeqCst) {
                tracing::info!("Agent cancelled before iteration {}", iteration + 1);
                return AgentResult::failure(history, CANCELLED);
            }
            tracing::debug!("Agent iteration {}", iteration + 1);

            let screenshot = match self.computer.capture().await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Screenshot failed: {}", e);
                    return AgentResult::failure(history, format!("screenshot failed: {e}"));
                }
            };

            let request = DecisionRequest {
                channel: self.options.decision_channel.clone(),
                input: build_prompt(&self.goal, &screenshot.image_reference, &history),
                image: Some(screenshot.image_reference.clone()),
            };
            let raw = match self.llm.generate(request).await {
                Ok(response) => response.output,
                Err(e) => {
                    tracing::error!("Decision service failed: {}", e);
                    return AgentResult::failure(history, format!("AI error: {e}"));
                }
            };

            let action = {
                let step = history.record(screenshot.image_reference, Action::parse(&raw));
                tracing::info!("Step {}: {}", step.index, step.action.to_json());
                on_step(step);
                step.action.clone()
            };

            if let Action::Done { result } = action {
                return AgentResult::success(history, result.unwrap_or_else(|| "done".to_string()));
            }

            if self.executor.execute(&action).await.is_ok() {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                if let Some(limit) = self.options.max_consecutive_failures {
                    if consecutive_failures >= limit {
                        tracing::error!("{} consecutive action failures, aborting", consecutive_failures);
                        return AgentResult::failure(
                            history,
                            format!("aborted after {limit} consecutive action failures"),
                        );
                    }
                }
            }

            tokio::time::sleep(self.options.step_delay).await;
        }

        AgentResult::failure(
            history,
            format!(
                "max steps ({}) reached without completing the goal",
                self.options.max_steps
            ),
        )
    }
}
