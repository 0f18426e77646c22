pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod hook_input;
pub mod model;
pub mod probe;
pub mod queue;
pub mod state;
pub mod tool_input;
pub mod tool_metadata;
pub mod transcript;
pub mod util;
pub mod workflow;
