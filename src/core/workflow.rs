//! Tier 2 workflow heuristics: what phase the agent seems to be in, what kind
//! of project it is working on, and which habits show up in recent tool use.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::core::state::SessionRecord;
use crate::core::tool_input::{TodoStatus, ToolInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Planning,
    Implementation,
    Testing,
    Debugging,
    Documentation,
    Refactoring,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPhase {
    pub phase: Phase,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_type: String,
    pub primary_language: Option<String>,
    pub frameworks: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTracking {
    pub total_todos: usize,
    pub completed_todos: usize,
    pub in_progress_todos: usize,
    pub pending_todos: usize,
    pub completion_rate: f64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillUsage {
    pub active_skills: Vec<String>,
    pub skill_invocation_count: usize,
    pub last_skill_used: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPatterns {
    pub is_iterative_development: bool,
    pub test_driven_development: bool,
    pub frequent_refactoring: bool,
    pub parallel_tasking: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub workflow_phase: WorkflowPhase,
    pub project_context: ProjectContext,
    pub todo_tracking: TodoTracking,
    pub skill_usage: SkillUsage,
    pub workflow_patterns: WorkflowPatterns,
}

const DOC_EXTENSIONS: &[&str] = &[".md", ".rst", ".txt"];

fn is_doc_file(path: &str) -> bool {
    DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || path.contains("README")
}

fn count(history: &[String], tool: &str) -> usize {
    history.iter().filter(|t| *t == tool).count()
}

/// Guess the workflow phase from the current call and recent history.
/// Later rules win over earlier ones.
pub fn detect_phase(tool_name: &str, input: &ToolInput, recent_tools: &[String]) -> WorkflowPhase {
    let mut result = WorkflowPhase {
        phase: Phase::Unknown,
        confidence: 0.5,
        indicators: Vec::new(),
    };
    let mut set = |phase: Phase, confidence: f64, indicator: String| {
        result.phase = phase;
        result.confidence = confidence;
        result.indicators.push(indicator);
    };

    match input {
        ToolInput::Read(_) | ToolInput::Glob(_) | ToolInput::Grep(_) | ToolInput::Task(_) => {
            let text = input_text(input).join(" ").to_lowercase();
            if text.contains("plan") || text.contains("explore") {
                set(
                    Phase::Planning,
                    0.85,
                    format!("{} tool suggests exploration", tool_name),
                );
            }
        }
        ToolInput::Bash(bash) => {
            let command = bash.command.as_str();
            if command.contains("test") {
                set(Phase::Testing, 0.95, "Running test suite".to_string());
            } else if ["python", "node", "cargo run"]
                .iter()
                .any(|kw| command.contains(kw))
            {
                set(
                    Phase::Debugging,
                    0.75,
                    "Executing code for debugging".to_string(),
                );
            }
        }
        _ => {}
    }

    if tool_name == "BashOutput" {
        set(
            Phase::Debugging,
            0.70,
            "Monitoring command output".to_string(),
        );
    }

    let written_path = match input {
        ToolInput::Write(_) | ToolInput::Edit(_) => input.file_path(),
        _ => None,
    };
    if let Some(path) = written_path {
        if is_doc_file(path) {
            set(
                Phase::Documentation,
                0.90,
                "Writing documentation files".to_string(),
            );
        } else {
            set(
                Phase::Implementation,
                0.80,
                format!("{} tool on code files", tool_name),
            );
            if count(recent_tools, "Edit") + count(recent_tools, "Write") > 2 {
                set(
                    Phase::Implementation,
                    0.90,
                    "Multiple consecutive file modifications".to_string(),
                );
            }
        }
    }

    if let ToolInput::Edit(e) = input {
        if e.replace_all {
            set(
                Phase::Refactoring,
                0.85,
                "Global replace suggests refactoring".to_string(),
            );
        }
    }

    result
}

/// Free-text fields of exploratory tools, searched for planning keywords.
fn input_text(input: &ToolInput) -> Vec<&str> {
    match input {
        ToolInput::Read(r) => vec![r.file_path.as_str()],
        ToolInput::Glob(g) => vec![g.pattern.as_str(), g.path.as_str()],
        ToolInput::Grep(g) => vec![g.pattern.as_str(), g.path.as_str(), g.glob.as_str()],
        ToolInput::Task(t) => vec![t.description.as_str(), t.subagent_type.as_str()],
        _ => Vec::new(),
    }
}

/// Manifest files checked in order; the first present decides the language.
const LANGUAGE_MANIFESTS: &[(&str, &str)] = &[
    ("package.json", "JavaScript/TypeScript"),
    ("pyproject.toml", "Python"),
    ("Cargo.toml", "Rust"),
    ("go.mod", "Go"),
    ("pom.xml", "Java"),
];

const JS_FRAMEWORKS: &[(&str, &str)] = &[
    ("react", "React"),
    ("vue", "Vue"),
    ("next", "Next.js"),
    ("express", "Express"),
];

const PY_FRAMEWORKS: &[(&str, &str)] = &[
    ("fastapi", "FastAPI"),
    ("flask", "Flask"),
    ("django", "Django"),
];

pub fn detect_project_type(project_dir: &Path) -> ProjectContext {
    let primary_language = LANGUAGE_MANIFESTS
        .iter()
        .find(|(file, _)| project_dir.join(file).exists())
        .map(|(_, lang)| lang.to_string());

    let (project_type, confidence) =
        if project_dir.join("frontend").exists() || project_dir.join("public").exists() {
            ("web_application", 0.85)
        } else if project_dir.join("backend").exists() || project_dir.join("api").exists() {
            ("api_server", 0.80)
        } else if project_dir.join("src").join("main.py").exists()
            || project_dir.join("cli.py").exists()
            || project_dir.join("src").join("main.rs").exists()
        {
            ("cli_tool", 0.75)
        } else {
            ("unknown", 0.5)
        };

    let mut frameworks = Vec::new();
    if let Some(deps) = package_json_dependencies(project_dir) {
        for (dep, name) in JS_FRAMEWORKS {
            if deps.iter().any(|d| d.as_str() == *dep) {
                frameworks.push(name.to_string());
            }
        }
    }
    if let Ok(content) = std::fs::read_to_string(project_dir.join("pyproject.toml")) {
        let content = content.to_lowercase();
        for (needle, name) in PY_FRAMEWORKS {
            if content.contains(needle) {
                frameworks.push(name.to_string());
            }
        }
    }

    ProjectContext {
        project_type: project_type.to_string(),
        primary_language,
        frameworks,
        confidence,
    }
}

/// Names from `dependencies` and `devDependencies` of package.json.
fn package_json_dependencies(project_dir: &Path) -> Option<Vec<String>> {
    let content = std::fs::read_to_string(project_dir.join("package.json")).ok()?;
    let pkg: serde_json::Value = serde_json::from_str(&content).ok()?;
    let names = ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|key| pkg.get(key).and_then(|v| v.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect();
    Some(names)
}

pub fn todo_tracking(session: Option<&SessionRecord>) -> TodoTracking {
    let Some(session) = session.filter(|s| !s.todos.is_empty()) else {
        return TodoTracking::default();
    };
    let with_status =
        |status: TodoStatus| session.todos.iter().filter(|t| t.status == status).count();

    TodoTracking {
        total_todos: session.todos.len(),
        completed_todos: with_status(TodoStatus::Completed),
        in_progress_todos: with_status(TodoStatus::InProgress),
        pending_todos: with_status(TodoStatus::Pending),
        completion_rate: (session.completion_rate() * 100.0).round() / 100.0,
        last_update: session.last_tool_timestamp,
    }
}

pub fn skill_usage(input: &ToolInput, recent_tools: &[String]) -> SkillUsage {
    let current = match input {
        ToolInput::Skill(s) if !s.skill.is_empty() => Some(s.skill.clone()),
        _ => None,
    };
    SkillUsage {
        active_skills: current.iter().cloned().collect(),
        skill_invocation_count: count(recent_tools, "Skill"),
        last_skill_used: current,
    }
}

pub fn workflow_patterns(recent_tools: &[String]) -> WorkflowPatterns {
    let read_edit_cycles = recent_tools
        .windows(3)
        .filter(|w| w[0] == "Read" && w[1] == "Edit" && w[2] == "Read")
        .count();
    let test_then_edit = recent_tools
        .windows(2)
        .any(|w| w[0] == "Bash" && (w[1] == "Write" || w[1] == "Edit"));

    WorkflowPatterns {
        is_iterative_development: read_edit_cycles > 2,
        test_driven_development: test_then_edit,
        frequent_refactoring: count(recent_tools, "Edit") > 5,
        parallel_tasking: count(recent_tools, "Task") > 1,
    }
}

pub fn collect(
    project_dir: &Path,
    session: Option<&SessionRecord>,
    tool_name: &str,
    input: &ToolInput,
) -> WorkflowMetadata {
    let recent_tools = session.map(|s| s.tool_history.as_slice()).unwrap_or(&[]);
    WorkflowMetadata {
        workflow_phase: detect_phase(tool_name, input, recent_tools),
        project_context: detect_project_type(project_dir),
        todo_tracking: todo_tracking(session),
        skill_usage: skill_usage(input, recent_tools),
        workflow_patterns: workflow_patterns(recent_tools),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool_input::TodoItem;
    use serde_json::json;

    fn history(tools: &[&str]) -> Vec<String> {
        tools.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_bash_test_command_is_testing_phase() {
        let input = ToolInput::parse("Bash", &json!({"command": "cargo test --all"}));
        let phase = detect_phase("Bash", &input, &[]);
        assert_eq!(phase.phase, Phase::Testing);
        assert_eq!(phase.confidence, 0.95);
    }

    #[test]
    fn test_markdown_write_is_documentation() {
        let input = ToolInput::parse("Write", &json!({"file_path": "docs/guide.md", "content": "x"}));
        let phase = detect_phase("Write", &input, &[]);
        assert_eq!(phase.phase, Phase::Documentation);
    }

    #[test]
    fn test_repeated_edits_raise_implementation_confidence() {
        let input = ToolInput::parse(
            "Edit",
            &json!({"file_path": "src/lib.rs", "old_string": "a", "new_string": "b"}),
        );
        let phase = detect_phase("Edit", &input, &history(&["Edit", "Write", "Edit"]));
        assert_eq!(phase.phase, Phase::Implementation);
        assert_eq!(phase.confidence, 0.90);
    }

    #[test]
    fn test_replace_all_is_refactoring() {
        let input = ToolInput::parse(
            "Edit",
            &json!({"file_path": "src/lib.rs", "old_string": "a", "new_string": "b", "replace_all": true}),
        );
        assert_eq!(detect_phase("Edit", &input, &[]).phase, Phase::Refactoring);
    }

    #[test]
    fn test_opaque_tool_is_unknown() {
        let input = ToolInput::parse("LS", &json!({"path": "."}));
        let phase = detect_phase("LS", &input, &[]);
        assert_eq!(phase.phase, Phase::Unknown);
        assert!(phase.indicators.is_empty());
    }

    #[test]
    fn test_project_type_from_layout_and_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{"dependencies":{"react":"18"},"devDependencies":{"express":"4"}}"#,
        )
        .unwrap();
        std::fs::create_dir(tmp.path().join("public")).unwrap();

        let ctx = detect_project_type(tmp.path());
        assert_eq!(ctx.project_type, "web_application");
        assert_eq!(ctx.primary_language.as_deref(), Some("JavaScript/TypeScript"));
        assert_eq!(ctx.frameworks, vec!["React", "Express"]);
    }

    #[test]
    fn test_empty_project_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = detect_project_type(tmp.path());
        assert_eq!(ctx.project_type, "unknown");
        assert!(ctx.primary_language.is_none());
    }

    #[test]
    fn test_todo_tracking_rounds_completion_rate() {
        let mut session = SessionRecord::new(Utc::now());
        let item = |status| TodoItem {
            content: "x".to_string(),
            status,
            active_form: "x".to_string(),
        };
        session.todos = vec![
            item(TodoStatus::Completed),
            item(TodoStatus::InProgress),
            item(TodoStatus::Pending),
        ];

        let tracking = todo_tracking(Some(&session));
        assert_eq!(tracking.total_todos, 3);
        assert_eq!(tracking.completed_todos, 1);
        assert_eq!(tracking.in_progress_todos, 1);
        assert_eq!(tracking.completion_rate, 0.33);
        assert_eq!(todo_tracking(None).completion_rate, 0.0);
    }

    #[test]
    fn test_skill_usage_counts_history() {
        let input = ToolInput::parse("Skill", &json!({"skill": "pdf"}));
        let usage = skill_usage(&input, &history(&["Skill", "Read", "Skill"]));
        assert_eq!(usage.active_skills, vec!["pdf"]);
        assert_eq!(usage.skill_invocation_count, 2);
        assert_eq!(usage.last_skill_used.as_deref(), Some("pdf"));
    }

    #[test]
    fn test_workflow_patterns() {
        let tools = history(&[
            "Read", "Edit", "Read", "Edit", "Read", "Edit", "Read", "Bash", "Edit", "Task", "Task",
        ]);
        let patterns = workflow_patterns(&tools);
        assert!(patterns.is_iterative_development);
        assert!(patterns.test_driven_development);
        assert!(!patterns.frequent_refactoring);
        assert!(patterns.parallel_tasking);
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let tmp = tempfile::tempdir().unwrap();
        let input = ToolInput::parse("Read", &json!({"file_path": "src/main.rs"}));
        let json = serde_json::to_value(collect(tmp.path(), None, "Read", &input)).unwrap();
        assert_eq!(json["workflowPhase"]["phase"], "unknown");
        assert_eq!(json["todoTracking"]["completionRate"], 0.0);
        assert!(json["workflowPatterns"].get("parallelTasking").is_some());
    }
}
