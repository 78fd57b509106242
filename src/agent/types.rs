//! Run-scoped data: recorded steps, options and the final result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::action::Action;

/// One recorded perceive/decide cycle. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    /// Position in the run, starting at 0.
    pub index: usize,
    /// Reference of the screenshot the decision was made from.
    pub screenshot_reference: String,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
}

/// Append-only, ordered log of the steps taken in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    steps: Vec<AgentStep>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next step and return it. The index is assigned here so it
    /// always equals the step's position.
    pub(crate) fn record(&mut self, screenshot_reference: String, action: Action) -> &AgentStep {
        let index = self.steps.len();
        self.steps.push(AgentStep {
            index,
            screenshot_reference,
            action,
            timestamp: Utc::now(),
        });
        &self.steps[index]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AgentStep> {
        self.steps.iter()
    }

    pub fn last(&self) -> Option<&AgentStep> {
        self.steps.last()
    }

    pub fn into_steps(self) -> Vec<AgentStep> {
        self.steps
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a AgentStep;
    type IntoIter = std::slice::Iter<'a, AgentStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Per-run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Upper bound on perceive/decide cycles.
    pub max_steps: usize,
    /// Pause after each executed action.
    pub step_delay: Duration,
    /// Channel passed with every decision request.
    pub decision_channel: String,
    /// Abort after this many executions fail in a row. `None` never aborts.
    pub max_consecutive_failures: Option<usize>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: 20,
            step_delay: Duration::from_millis(600),
            decision_channel: "computer-agent".to_string(),
            max_consecutive_failures: None,
        }
    }
}

/// Outcome of a run. Every terminal state (done, cancelled, failed,
/// exhausted) is reported through this one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResult {
    pub success: bool,
    pub steps: History,
    pub result: String,
}

impl AgentResult {
    pub fn success(steps: History, result: impl Into<String>) -> Self {
        Self {
            success: true,
            steps,
            result: result.into(),
        }
    }

    pub fn failure(steps: History, result: impl Into<String>) -> Self {
        Self {
            success: false,
            steps,
            result: result.into(),
        }
    }
}
