//! Action schema and the parser that turns model output into an [`Action`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest slice of the raw model output quoted in a parse diagnostic.
const DIAGNOSTIC_PREFIX_CHARS: usize = 120;

/// One instruction the agent can carry out on the host.
///
/// Wire format is a JSON object with a `type` tag, e.g.
/// `{"type":"mouse_click","x":10,"y":20}`. Optional fields stay `None`
/// when absent; defaults belong to the [`Computer`](crate::computer::Computer)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MouseMove {
        #[serde(deserialize_with = "number::coord")]
        x: i32,
        #[serde(deserialize_with = "number::coord")]
        y: i32,
    },
    MouseClick {
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<String>,
    },
    MouseDoubleClick {
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
    },
    MouseScroll {
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(default, deserialize_with = "number::opt_coord", skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
        #[serde(
            rename = "deltaX",
            default,
            deserialize_with = "number::opt_coord",
            skip_serializing_if = "Option::is_none"
        )]
        delta_x: Option<i32>,
        #[serde(
            rename = "deltaY",
            default,
            deserialize_with = "number::opt_coord",
            skip_serializing_if = "Option::is_none"
        )]
        delta_y: Option<i32>,
    },
    MouseDrag {
        #[serde(rename = "startX", deserialize_with = "number::coord")]
        start_x: i32,
        #[serde(rename = "startY", deserialize_with = "number::coord")]
        start_y: i32,
        #[serde(rename = "endX", deserialize_with = "number::coord")]
        end_x: i32,
        #[serde(rename = "endY", deserialize_with = "number::coord")]
        end_y: i32,
    },
    KeyType {
        text: String,
    },
    KeyPress {
        key: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    ClipboardSet {
        text: String,
    },
    LaunchApp {
        #[serde(rename = "appName")]
        app_name: String,
    },
    RunShell {
        command: String,
    },
    Screenshot,
    Wait {
        #[serde(deserialize_with = "number::millis")]
        ms: u64,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}

impl Action {
    /// Parse untrusted model output.
    ///
    /// Never fails: anything that is not a well-formed action becomes a
    /// `done` action whose result describes what went wrong and quotes the
    /// start of the input.
    pub fn parse(raw: &str) -> Action {
        let cleaned = strip_code_fence(raw);

        let value: Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Model output is not JSON: {}", e);
                return Self::diagnostic("could not parse AI response as JSON", raw);
            }
        };

        if !value.get("type").is_some_and(Value::is_string) {
            tracing::warn!("Model output has no string `type` field");
            return Self::diagnostic("AI response has no action type", raw);
        }

        match serde_json::from_value(value) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Model output is not a valid action: {}", e);
                Self::diagnostic(&format!("invalid action ({e})"), raw)
            }
        }
    }

    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MouseMove { .. } => "mouse_move",
            Self::MouseClick { .. } => "mouse_click",
            Self::MouseDoubleClick { .. } => "mouse_double_click",
            Self::MouseScroll { .. } => "mouse_scroll",
            Self::MouseDrag { .. } => "mouse_drag",
            Self::KeyType { .. } => "key_type",
            Self::KeyPress { .. } => "key_press",
            Self::Hotkey { .. } => "hotkey",
            Self::ClipboardSet { .. } => "clipboard_set",
            Self::LaunchApp { .. } => "launch_app",
            Self::RunShell { .. } => "run_shell",
            Self::Screenshot => "screenshot",
            Self::Wait { .. } => "wait",
            Self::Done { .. } => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// Compact JSON rendering, as the model would have written it.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"type\":\"{}\"}}", self.kind()))
    }

    fn diagnostic(reason: &str, raw: &str) -> Action {
        let prefix: String = raw.chars().take(DIAGNOSTIC_PREFIX_CHARS).collect();
        Action::Done {
            result: Some(format!("{reason}: {prefix}")),
        }
    }
}

/// Numeric fields accept integers or finite floats, rounded to the nearest
/// integer. Models routinely emit `512.0` for a pixel coordinate.
mod number {
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn coord<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
        let v = f64::deserialize(d)?;
        to_i32(v).ok_or_else(|| D::Error::custom(format!("coordinate out of range: {v}")))
    }

    pub fn opt_coord<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|v| to_i32(v).ok_or_else(|| D::Error::custom(format!("coordinate out of range: {v}"))))
            .transpose()
    }

    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let v = f64::deserialize(d)?;
        let r = v.round();
        if v.is_finite() && r >= 0.0 && r <= u64::MAX as f64 {
            Ok(r as u64)
        } else {
            Err(D::Error::custom(format!("invalid duration: {v}")))
        }
    }

    fn to_i32(v: f64) -> Option<i32> {
        let r = v.round();
        (v.is_finite() && r >= i32::MIN as f64 && r <= i32::MAX as f64).then_some(r as i32)
    }
}

/// Strip surrounding whitespace and a markdown code fence (with optional
/// language tag) if the whole payload is wrapped in one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
