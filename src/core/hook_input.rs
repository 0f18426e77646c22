use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

use crate::core::error::{Result, ToolPulseError};

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The typed view of a hook's stdin payload that the hooks act on.
/// The raw object is kept as well, since audit logs and envelopes carry it verbatim.
#[derive(Debug, Clone)]
pub struct HookPayload {
    pub raw: Value,
    pub session_id: String,
    pub hook_event_name: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub transcript_path: Option<PathBuf>,
}

impl HookPayload {
    /// Each field is read on its own, so one mistyped field does not hide the others.
    pub fn from_value(raw: Value) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        HookPayload {
            session_id: text("session_id").unwrap_or_else(|| "unknown".to_string()),
            hook_event_name: text("hook_event_name"),
            tool_name: text("tool_name"),
            tool_input: raw
                .get("tool_input")
                .filter(|v| v.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            transcript_path: text("transcript_path").map(PathBuf::from),
            raw,
        }
    }

    /// Fails on invalid JSON and on JSON that is not an object.
    pub fn parse(input: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(input)?;
        if !raw.is_object() {
            return Err(ToolPulseError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&raw)
            )));
        }
        Ok(HookPayload::from_value(raw))
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut input = String::new();
        reader
            .read_to_string(&mut input)
            .map_err(ToolPulseError::io(std::path::Path::new("<stdin>")))?;
        HookPayload::parse(&input)
    }

    /// Tool name and input, when this event concerns a tool call with input.
    pub fn tool_call(&self) -> Option<(&str, &Value)> {
        let name = self.tool_name.as_deref()?;
        let has_input = match &self.tool_input {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            _ => true,
        };
        has_input.then_some((name, &self.tool_input))
    }
}
