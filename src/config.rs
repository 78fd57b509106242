//! Configuration management for the computer agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The decision model. Defaults to `anthropic/claude-sonnet-4.5`.
//! - `MAX_STEPS` - Optional. Step budget per run. Defaults to `20`.
//! - `STEP_DELAY_MS` - Optional. Pause between steps. Defaults to `600`.
//! - `DECISION_CHANNEL` - Optional. Channel sent with each decision request. Defaults to `computer-agent`.
//! - `MAX_CONSECUTIVE_FAILURES` - Optional. Abort after this many failed actions in a row. Unset disables it.
//! - `CHANNEL_MODELS` - Optional. Per-channel model overrides, e.g. `desk=openai/gpt-5,triage=google/gemini-2.5-flash`.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::agent::AgentOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Decision model identifier (OpenRouter format)
    pub default_model: String,

    /// Maximum steps per run
    pub max_steps: usize,

    /// Delay between steps in milliseconds
    pub step_delay_ms: u64,

    /// Channel name passed to the decision service
    pub decision_channel: String,

    /// Consecutive failed actions tolerated before aborting
    pub max_consecutive_failures: Option<usize>,

    /// Model overrides keyed by decision channel
    pub channel_models: HashMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` if a numeric variable or `CHANNEL_MODELS`
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let mut config = Self::new(api_key);

        if let Some(model) = lookup("DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Some(v) = lookup("MAX_STEPS") {
            config.max_steps = parse_number("MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("STEP_DELAY_MS") {
            config.step_delay_ms = parse_number("STEP_DELAY_MS", &v)?;
        }
        if let Some(channel) = lookup("DECISION_CHANNEL") {
            config.decision_channel = channel;
        }
        config.max_consecutive_failures = lookup("MAX_CONSECUTIVE_FAILURES")
            .map(|v| parse_number("MAX_CONSECUTIVE_FAILURES", &v))
            .transpose()?;
        if let Some(v) = lookup("CHANNEL_MODELS") {
            config.channel_models = parse_channel_models(&v)?;
        }

        Ok(config)
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String) -> Self {
        let defaults = AgentOptions::default();
        Self {
            api_key,
            default_model: "anthropic/claude-sonnet-4.5".to_string(),
            max_steps: defaults.max_steps,
            step_delay_ms: defaults.step_delay.as_millis() as u64,
            decision_channel: defaults.decision_channel,
            max_consecutive_failures: defaults.max_consecutive_failures,
            channel_models: HashMap::new(),
        }
    }

    /// Per-run options derived from this config.
    pub fn agent_options(&self) -> AgentOptions {
        AgentOptions {
            max_steps: self.max_steps,
            step_delay: Duration::from_millis(self.step_delay_ms),
            decision_channel: self.decision_channel.clone(),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
}

/// Parse `channel=model` pairs separated by commas. Blank entries are skipped.
fn parse_channel_models(value: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut models = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((channel, model)) if !channel.trim().is_empty() && !model.trim().is_empty() => {
                models.insert(channel.trim().to_string(), model.trim().to_string());
            }
            _ => {
                return Err(ConfigError::InvalidValue(
                    "CHANNEL_MODELS".to_string(),
                    format!("expected channel=model, got '{}'", entry),
                ))
            }
        }
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn api_key_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "OPENROUTER_API_KEY"));
    }

    #[test]
    fn defaults_match_agent_options() {
        let config = load(&[("OPENROUTER_API_KEY", "sk")]).unwrap();
        assert_eq!(config.agent_options(), AgentOptions::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("OPENROUTER_API_KEY", "sk"),
            ("DEFAULT_MODEL", "openai/gpt-5"),
            ("MAX_STEPS", "5"),
            ("STEP_DELAY_MS", " 0 "),
            ("DECISION_CHANNEL", "desk"),
            ("MAX_CONSECUTIVE_FAILURES", "3"),
        ])
        .unwrap();

        assert_eq!(config.default_model, "openai/gpt-5");
        let options = config.agent_options();
        assert_eq!(options.max_steps, 5);
        assert_eq!(options.step_delay, Duration::ZERO);
        assert_eq!(options.decision_channel, "desk");
        assert_eq!(options.max_consecutive_failures, Some(3));
    }

    #[test]
    fn invalid_number_is_reported() {
        let err = load(&[("OPENROUTER_API_KEY", "sk"), ("MAX_STEPS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_STEPS"));
    }

    #[test]
    fn channel_models_are_parsed() {
        let config = load(&[
            ("OPENROUTER_API_KEY", "sk"),
            ("CHANNEL_MODELS", "desk=openai/gpt-5, triage = google/gemini-2.5-flash,"),
        ])
        .unwrap();

        assert_eq!(config.channel_models.len(), 2);
        assert_eq!(config.channel_models["desk"], "openai/gpt-5");
        assert_eq!(config.channel_models["triage"], "google/gemini-2.5-flash");
        assert!(load(&[("OPENROUTER_API_KEY", "sk")]).unwrap().channel_models.is_empty());
    }

    #[test]
    fn malformed_channel_models_are_rejected() {
        for bad in ["desk", "=openai/gpt-5", "desk="] {
            let err = load(&[("OPENROUTER_API_KEY", "sk"), ("CHANNEL_MODELS", bad)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "CHANNEL_MODELS"));
        }
    }
}
