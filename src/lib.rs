//! # Computer Agent
//!
//! Drives a desktop toward a natural-language goal.
//!
//! This library provides:
//! - A closed [`Action`](agent::Action) schema with a total parser for model output
//! - An executor mapping actions onto an OS capability interface
//! - The agent loop that ties perception, decision and execution together
//! - A native desktop backend and an OpenRouter decision client
//!
//! ## Architecture
//!
//! The agent follows a "perceive, decide, act" loop:
//! 1. Take a screenshot through the [`Computer`](computer::Computer)
//! 2. Send goal, screenshot and action transcript to the
//!    [`DecisionService`](llm::DecisionService)
//! 3. Parse the reply into one action and execute it
//! 4. Repeat until the model says `done` or the step budget runs out
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use computer_agent::{agent::Agent, computer::DesktopComputer, config::Config, llm::OpenRouterClient};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(OpenRouterClient::new(config.api_key.clone(), config.default_model.clone()));
//! let computer = Arc::new(DesktopComputer::new());
//! let agent = Agent::new("Open a terminal and run uptime", llm, computer, config.agent_options());
//! let result = agent.run().await;
//! ```

pub mod agent;
pub mod computer;
pub mod config;
pub mod llm;

pub use config::Config;
