//! Per-call Tier 1 metadata derived from a tool's input.

use serde::Serialize;
use std::path::Path;

use crate::core::tool_input::ToolInput;
use crate::core::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Test,
    Build,
    Git,
    Lint,
    Package,
    Read,
    Filesystem,
    Other,
}

/// Keyword sets, checked in this order; the first hit wins.
const COMMAND_KEYWORDS: &[(CommandType, &[&str])] = &[
    (
        CommandType::Test,
        &["pytest", "jest", "vitest", "npm test", "go test", "cargo test"],
    ),
    (
        CommandType::Build,
        &["npm", "pnpm", "yarn", "make", "cargo", "go build", "mvn", "gradle"],
    ),
    (CommandType::Git, &["git"]),
    (
        CommandType::Lint,
        &["eslint", "ruff", "mypy", "pylint", "clippy", "cargo clippy"],
    ),
    (
        CommandType::Package,
        &["pip", "uv", "npm install", "pnpm install", "yarn add", "cargo install"],
    ),
    (CommandType::Read, &["ls", "cat", "head", "tail", "find", "grep"]),
    (CommandType::Filesystem, &["mkdir", "touch", "rm", "mv", "cp"]),
];

/// Substring fallbacks for a first token no keyword set recognised.
const COMMAND_FRAGMENTS: &[(CommandType, &str)] = &[
    (CommandType::Test, "test"),
    (CommandType::Build, "build"),
    (CommandType::Lint, "lint"),
    (CommandType::Package, "install"),
];

/// Classify a shell command by its leading words.
///
/// Two-word forms ("npm install", "cargo test") are tried before the bare first
/// token so that `npm install react` is a package command rather than a build.
pub fn classify_command(command: &str) -> CommandType {
    let mut words = command.split_whitespace();
    let first = match words.next() {
        Some(w) => w,
        None => return CommandType::Other,
    };
    let pair = words.next().map(|second| format!("{} {}", first, second));

    if let Some(pair) = pair.as_deref() {
        if let Some(kind) = lookup(pair) {
            return kind;
        }
    }
    if let Some(kind) = lookup(first) {
        return kind;
    }
    COMMAND_FRAGMENTS
        .iter()
        .find(|(_, fragment)| first.contains(fragment))
        .map(|(kind, _)| *kind)
        .unwrap_or(CommandType::Other)
}

fn lookup(word: &str) -> Option<CommandType> {
    COMMAND_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.contains(&word))
        .map(|(kind, _)| *kind)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathInfo {
    pub file_path: String,
    pub file_path_relative: String,
    pub file_extension: String,
    pub file_basename: String,
    pub file_directory: String,
}

/// Absolute, project-relative, extension, basename and directory forms of a path.
pub fn normalize_path(file_path: &str, project_dir: &Path) -> PathInfo {
    let path = Path::new(file_path);
    let absolute = if path.is_absolute() {
        file_path.to_string()
    } else {
        project_dir.join(path).to_string_lossy().to_string()
    };
    let relative = util::make_relative(&absolute, &project_dir.to_string_lossy());
    let relative = if Path::new(&relative).is_absolute() {
        file_path.to_string()
    } else {
        relative
    };

    PathInfo {
        file_extension: path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        file_basename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_directory: Path::new(&relative)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_path: absolute,
        file_path_relative: relative,
    }
}

/// Estimated size of an edit: the larger of the old and new line counts.
pub fn edit_size(old_string: &str, new_string: &str) -> usize {
    old_string.lines().count().max(new_string.lines().count())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDetails {
    #[serde(flatten)]
    pub path: PathInfo,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDetails {
    #[serde(flatten)]
    pub path: PathInfo,
    pub lines_modified: usize,
    pub replace_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteDetails {
    #[serde(flatten)]
    pub path: PathInfo,
    pub lines_written: usize,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BashDetails {
    pub command: String,
    pub command_name: String,
    pub command_type: CommandType,
    pub description: String,
    pub run_in_background: bool,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepDetails {
    pub pattern: String,
    pub path: String,
    pub glob: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub output_mode: String,
    pub case_insensitive: bool,
    pub multiline: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobDetails {
    pub pattern: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub subagent_type: String,
    pub description: String,
    pub model: String,
    pub resume: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchDetails {
    pub query: String,
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebFetchDetails {
    pub url: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolDetails {
    Read(ReadDetails),
    Edit(EditDetails),
    Write(WriteDetails),
    Bash(BashDetails),
    Grep(GrepDetails),
    Glob(GlobDetails),
    Task(TaskDetails),
    WebSearch(WebSearchDetails),
    WebFetch(WebFetchDetails),
    Empty {},
}

pub fn tool_details(input: &ToolInput, project_dir: &Path) -> ToolDetails {
    match input {
        ToolInput::Read(r) => ToolDetails::Read(ReadDetails {
            path: normalize_path(&r.file_path, project_dir),
            offset: r.offset,
            limit: r.limit,
        }),
        ToolInput::Edit(e) => ToolDetails::Edit(EditDetails {
            path: normalize_path(&e.file_path, project_dir),
            lines_modified: edit_size(&e.old_string, &e.new_string),
            replace_all: e.replace_all,
            edit_count: None,
        }),
        ToolInput::MultiEdit(m) => ToolDetails::Edit(EditDetails {
            path: normalize_path(&m.file_path, project_dir),
            lines_modified: m
                .edits
                .iter()
                .map(|e| edit_size(&e.old_string, &e.new_string))
                .sum(),
            replace_all: m.edits.iter().any(|e| e.replace_all),
            edit_count: Some(m.edits.len()),
        }),
        ToolInput::Write(w) => ToolDetails::Write(WriteDetails {
            path: normalize_path(&w.file_path, project_dir),
            lines_written: w.content.lines().count(),
            bytes_written: w.content.len(),
        }),
        ToolInput::Bash(b) => {
            let command_name = b
                .command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            ToolDetails::Bash(BashDetails {
                command: b.command.clone(),
                command_name,
                command_type: classify_command(&b.command),
                description: b.description.clone(),
                run_in_background: b.run_in_background,
                timeout: b.timeout,
            })
        }
        ToolInput::Grep(g) => ToolDetails::Grep(GrepDetails {
            pattern: g.pattern.clone(),
            path: g.path.clone(),
            glob: g.glob.clone(),
            file_type: g.file_type.clone(),
            output_mode: g
                .output_mode
                .clone()
                .unwrap_or_else(|| "files_with_matches".to_string()),
            case_insensitive: g.case_insensitive,
            multiline: g.multiline,
        }),
        ToolInput::Glob(g) => ToolDetails::Glob(GlobDetails {
            pattern: g.pattern.clone(),
            path: g.path.clone(),
        }),
        ToolInput::Task(t) => ToolDetails::Task(TaskDetails {
            subagent_type: t.subagent_type.clone(),
            description: t.description.clone(),
            model: t.model.clone(),
            resume: t.resume.clone(),
        }),
        ToolInput::WebSearch(w) => ToolDetails::WebSearch(WebSearchDetails {
            query: w.query.clone(),
            allowed_domains: w.allowed_domains.clone(),
            blocked_domains: w.blocked_domains.clone(),
        }),
        ToolInput::WebFetch(w) => ToolDetails::WebFetch(WebFetchDetails {
            url: w.url.clone(),
            prompt: w.prompt.clone(),
        }),
        ToolInput::TodoWrite(_) | ToolInput::Skill(_) | ToolInput::Opaque(_) => {
            ToolDetails::Empty {}
        }
    }
}
