//! Prompt template for the decision service.

use super::types::History;

const ACTION_CATALOGUE: &str = r#"- {"type":"mouse_move","x":100,"y":200}
- {"type":"mouse_click","x":100,"y":200,"button":"left"}   (x, y and button are optional)
- {"type":"mouse_double_click","x":100,"y":200}            (x and y are optional)
- {"type":"mouse_scroll","x":100,"y":200,"deltaX":0,"deltaY":3}   (all fields optional; positive deltaY scrolls down)
- {"type":"mouse_drag","startX":10,"startY":20,"endX":300,"endY":400}
- {"type":"key_type","text":"hello"}
- {"type":"key_press","key":"enter"}
- {"type":"hotkey","keys":["ctrl","s"]}
- {"type":"clipboard_set","text":"copied text"}
- {"type":"launch_app","appName":"firefox"}
- {"type":"run_shell","command":"ls -la"}
- {"type":"screenshot"}
- {"type":"wait","ms":1000}   (capped at 10000)
- {"type":"done","result":"what was achieved"}"#;

/// Render the prompt for the next decision.
///
/// The service keeps no state between calls, so every action taken so far
/// is replayed here. Output depends only on the arguments. Inline data URIs
/// are summarised rather than pasted; the pixels travel as the request's
/// image attachment.
pub fn build_prompt(goal: &str, screenshot_reference: &str, history: &History) -> String {
    let screenshot = describe_reference(screenshot_reference);
    let transcript = if history.is_empty() {
        "(no actions taken yet)".to_string()
    } else {
        history
            .iter()
            .map(|step| format!("{}. {}", step.index + 1, step.action.to_json()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a computer-use agent operating a real desktop. You see the screen through screenshots and act by issuing ONE action at a time as JSON.

## Goal
{goal}

## Current screenshot
{screenshot}

## Actions taken so far
{transcript}

## Available actions
{ACTION_CATALOGUE}

## Rules
1. Reply with a single JSON object and nothing else. No markdown, no explanation.
2. Base your decision on the current screenshot. If the last action did not have the expected effect, try a different approach.
3. Coordinates are absolute screen pixels.
4. When the goal is achieved, or cannot be achieved, reply with "done" and a short result."#
    )
}

fn describe_reference(reference: &str) -> String {
    match reference
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
    {
        Some((meta, payload)) => {
            let mime = meta.split(';').next().unwrap_or("image");
            format!("(attached {} image, {} bytes encoded)", mime, payload.len())
        }
        None => reference.to_string(),
    }
}
