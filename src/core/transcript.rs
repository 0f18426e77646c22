use serde_json::Value;
use std::path::Path;

use crate::core::error::{Result, ToolPulseError};

/// Placeholder model name the host runtime writes for locally generated messages.
const SYNTHETIC_MODEL: &str = "<synthetic>";

fn entries(content: &str) -> impl Iterator<Item = Value> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        // Skip malformed lines
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
}

/// Model of the most recent assistant message in a JSONL transcript.
pub fn model_from_transcript(transcript_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(transcript_path).ok()?;
    let mut model = None;
    for entry in entries(&content) {
        if entry.get("type").and_then(|v| v.as_str()) != Some("assistant") {
            continue;
        }
        if let Some(m) = entry
            .get("message")
            .and_then(|m| m.get("model"))
            .and_then(|v| v.as_str())
        {
            if !m.is_empty() && m != SYNTHETIC_MODEL {
                model = Some(m.to_string());
            }
        }
    }
    model
}

/// Read a JSONL transcript into a JSON array for the `chat` field.
pub fn read_chat(transcript_path: &Path) -> Result<Vec<Value>> {
    let content =
        std::fs::read_to_string(transcript_path).map_err(ToolPulseError::io(transcript_path))?;
    Ok(entries(&content).collect())
}
