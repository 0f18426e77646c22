pub mod audit_log;
pub mod maintenance;
pub mod post_tool_use;
pub mod pre_tool_use;
pub mod send_event;
pub mod status;

use std::path::PathBuf;

use crate::core::config::{self, ToolPulseConfig};
use crate::core::error::Result;
use crate::core::hook_input::HookPayload;
use crate::core::state::StateStore;

/// Everything a hook invocation needs besides its stdin payload.
pub struct HookContext {
    pub project_dir: PathBuf,
    pub config: ToolPulseConfig,
    pub store: StateStore,
}

impl HookContext {
    pub fn load() -> Result<Self> {
        let project_dir = config::project_dir();
        let config = config::load_config(&project_dir);
        Ok(HookContext {
            project_dir,
            config,
            store: StateStore::open_default()?,
        })
    }
}

/// Parse the hook payload from stdin. Malformed input, including JSON that
/// is not an object, yields `None` and the hook does nothing.
pub fn read_payload() -> Option<HookPayload> {
    payload_from(std::io::stdin().lock())
}

fn payload_from(reader: impl std::io::Read) -> Option<HookPayload> {
    match HookPayload::from_reader(reader) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!("ignoring unreadable hook input: {}", e);
            None
        }
    }
}
