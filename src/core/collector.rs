//! Point-in-time metadata snapshots attached to every outgoing event.
//!
//! Tier 0 is git/session/environment context, Tier 1 is tool performance,
//! Tier 2 is the workflow heuristics in [`crate::core::workflow`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ToolPulseError};
use crate::core::model;
use crate::core::probe::{self, EnvironmentContext};
use crate::core::state::{SessionStats, StateStore};
use crate::core::tool_input::ToolInput;
use crate::core::tool_metadata::{tool_details, ToolDetails};
use crate::core::transcript;
use crate::core::util;
use crate::core::workflow::{self, WorkflowMetadata};
use crate::git::context::{self as git_context, GitContext};

const DURATION_FILE: &str = "last_tool_duration.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub start_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub model: String,
    pub model_short: String,
    pub working_directory: String,
    pub working_directory_name: String,
    pub session_id: String,
    pub tool_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tier0 {
    pub git: GitContext,
    pub session: SessionContext,
    pub environment: EnvironmentContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub stats: SessionStats,
    pub avg_tool_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    pub name: String,
    pub duration_ms: Option<f64>,
    /// A measured duration means the end hook saw the call complete.
    pub success: bool,
    pub metadata: ToolDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier1 {
    pub session_stats: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolMetadata>,
}

/// The tool call an event is about, if any.
#[derive(Debug, Clone, Copy)]
pub struct ToolCall<'a> {
    pub name: &'a str,
    pub input: &'a Value,
}

pub struct MetadataCollector<'a> {
    project_dir: PathBuf,
    store: &'a StateStore,
}

impl<'a> MetadataCollector<'a> {
    pub fn new(project_dir: impl Into<PathBuf>, store: &'a StateStore) -> Self {
        MetadataCollector {
            project_dir: project_dir.into(),
            store,
        }
    }

    /// Creates the session record if this is the first time it is seen.
    pub fn session_context(&self, session_id: &str, model_name: &str) -> Result<SessionContext> {
        let record = self.store.ensure_session(session_id)?;
        let elapsed = (Utc::now() - record.start_time).num_milliseconds().max(0) as f64;
        let minutes = elapsed / 60_000.0;

        Ok(SessionContext {
            start_time: record.start_time,
            duration_minutes: (minutes * 10.0).round() / 10.0,
            model: model_name.to_string(),
            model_short: model::short_label(model_name),
            working_directory: self.project_dir.display().to_string(),
            working_directory_name: self
                .project_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            session_id: session_id.to_string(),
            tool_count: record.tool_count,
        })
    }

    pub fn tier0(&self, session_id: &str, model_name: &str) -> Result<Tier0> {
        Ok(Tier0 {
            git: git_context::collect(&self.project_dir),
            session: self.session_context(session_id, model_name)?,
            environment: probe::environment_context(),
        })
    }

    pub fn tier1(
        &self,
        session_id: &str,
        call: Option<ToolCall<'_>>,
        duration_ms: Option<f64>,
    ) -> Tier1 {
        let stats = self
            .store
            .session(session_id)
            .and_then(|s| s.stats)
            .unwrap_or_default();
        let avg_tool_time_ms = stats.avg_tool_time_ms();

        let tool = call.map(|call| ToolMetadata {
            name: call.name.to_string(),
            duration_ms,
            success: duration_ms.is_some(),
            metadata: tool_details(&ToolInput::parse(call.name, call.input), &self.project_dir),
        });

        Tier1 {
            session_stats: StatsSnapshot {
                stats,
                avg_tool_time_ms,
            },
            tool,
        }
    }

    /// `None` when the heuristics could not run; Tier 0/1 are unaffected.
    pub fn tier2(&self, session_id: &str, call: Option<ToolCall<'_>>) -> Option<WorkflowMetadata> {
        let session = self.store.session(session_id);
        let empty = Value::Object(Default::default());
        let (name, raw) = call.map_or(("Unknown", &empty), |c| (c.name, c.input));
        let input = ToolInput::parse(name, raw);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            workflow::collect(&self.project_dir, session.as_ref(), name, &input)
        }));
        match result {
            Ok(metadata) => Some(metadata),
            Err(_) => {
                tracing::warn!("workflow heuristics failed, omitting workflow metadata");
                None
            }
        }
    }

    /// Model identifier for the session: cached value, else the transcript
    /// (and cache it), else `$CLAUDE_MODEL`, else `"unknown"`.
    pub fn resolve_model(&self, session_id: &str, transcript_path: Option<&Path>) -> String {
        if let Some(model) = self.store.session(session_id).and_then(|s| s.model) {
            return model;
        }
        if let Some(model) = transcript_path.and_then(transcript::model_from_transcript) {
            if let Err(e) = self.store.cache_model(session_id, &model) {
                tracing::debug!("could not cache model name: {}", e);
            }
            return model;
        }
        std::env::var("CLAUDE_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DurationRecord {
    tool_name: String,
    duration_ms: f64,
    timestamp: DateTime<Utc>,
}

/// Hand the duration measured by the end hook to the delivery step.
pub fn write_duration(
    project_dir: &Path,
    session_id: &str,
    tool_name: &str,
    duration_ms: f64,
) -> Result<()> {
    let dir = util::ensure_session_log_dir(project_dir, session_id)?;
    let record = DurationRecord {
        tool_name: tool_name.to_string(),
        duration_ms,
        timestamp: Utc::now(),
    };
    util::write_atomic(&dir.join(DURATION_FILE), &serde_json::to_vec(&record)?)
}

/// Consume the handoff file. The file is removed whether or not it matches.
pub fn take_duration(project_dir: &Path, session_id: &str, tool_name: &str) -> Option<f64> {
    let path = util::session_log_dir(project_dir, session_id).join(DURATION_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    if let Err(e) = std::fs::remove_file(&path) {
        tracing::debug!("{}", ToolPulseError::io(&path)(e));
    }
    let record: DurationRecord = serde_json::from_str(&content).ok()?;
    (record.tool_name == tool_name).then_some(record.duration_ms)
}
