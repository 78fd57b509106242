//! Agent module - the perceive/decide/execute controller.
//!
//! Each step of a run:
//! 1. Capture the screen
//! 2. Ask the decision service for the next action, replaying all prior actions
//! 3. Parse the reply into an [`Action`] (never fails)
//! 4. Record the step, then either finish on `done` or execute the action
//! 5. Pause and repeat until done, cancelled, failed or out of steps

mod action;
mod agent_loop;
mod executor;
mod prompt;
mod types;

pub use action::Action;
pub use agent_loop::{Agent, CancelHandle};
pub use executor::{ActionExecutor, MAX_WAIT};
pub use prompt::build_prompt;
pub use types::{AgentOptions, AgentResult, AgentStep, History};
