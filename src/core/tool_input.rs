//! Typed view of the `tool_input` object the host runtime sends with each tool hook.
//!
//! Known tools decode into their own variant; anything else (or a known tool whose
//! input does not have the expected shape) is kept verbatim in [`ToolInput::Opaque`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub active_form: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadInput {
    pub file_path: String,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditInput {
    pub file_path: String,
    pub old_string: String,
    pub new_string: String,
    pub replace_all: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MultiEditInput {
    pub file_path: String,
    pub edits: Vec<EditInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WriteInput {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BashInput {
    pub command: String,
    pub description: String,
    pub run_in_background: bool,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrepInput {
    pub pattern: String,
    pub path: String,
    pub glob: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub output_mode: Option<String>,
    #[serde(rename = "-i")]
    pub case_insensitive: bool,
    pub multiline: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlobInput {
    pub pattern: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    pub subagent_type: String,
    pub description: String,
    pub model: String,
    pub resume: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebSearchInput {
    pub query: String,
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebFetchInput {
    pub url: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TodoWriteInput {
    pub todos: Vec<TodoItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillInput {
    pub skill: String,
}

#[derive(Debug, Clone)]
pub enum ToolInput {
    Read(ReadInput),
    Edit(EditInput),
    MultiEdit(MultiEditInput),
    Write(WriteInput),
    Bash(BashInput),
    Grep(GrepInput),
    Glob(GlobInput),
    Task(TaskInput),
    WebSearch(WebSearchInput),
    WebFetch(WebFetchInput),
    TodoWrite(TodoWriteInput),
    Skill(SkillInput),
    Opaque(Value),
}

fn decode<T: serde::de::DeserializeOwned>(raw: &Value, wrap: fn(T) -> ToolInput) -> ToolInput {
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(input) => wrap(input),
        Err(e) => {
            tracing::debug!("tool input did not match its schema: {}", e);
            ToolInput::Opaque(raw.clone())
        }
    }
}

impl ToolInput {
    pub fn parse(tool_name: &str, raw: &Value) -> ToolInput {
        match tool_name {
            "Read" => decode(raw, ToolInput::Read),
            "Edit" => decode(raw, ToolInput::Edit),
            "MultiEdit" => decode(raw, ToolInput::MultiEdit),
            "Write" => decode(raw, ToolInput::Write),
            "Bash" => decode(raw, ToolInput::Bash),
            "Grep" => decode(raw, ToolInput::Grep),
            "Glob" => decode(raw, ToolInput::Glob),
            "Task" => decode(raw, ToolInput::Task),
            "WebSearch" => decode(raw, ToolInput::WebSearch),
            "WebFetch" => decode(raw, ToolInput::WebFetch),
            "TodoWrite" => decode(raw, ToolInput::TodoWrite),
            "Skill" => decode(raw, ToolInput::Skill),
            _ => ToolInput::Opaque(raw.clone()),
        }
    }

    /// The file a tool operates on, for tools that have one.
    pub fn file_path(&self) -> Option<&str> {
        let path = match self {
            ToolInput::Read(i) => &i.file_path,
            ToolInput::Edit(i) => &i.file_path,
            ToolInput::MultiEdit(i) => &i.file_path,
            ToolInput::Write(i) => &i.file_path,
            _ => return None,
        };
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}
