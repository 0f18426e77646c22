mod commands;
mod core;
mod git;
mod integrations;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::send_event::SendEventArgs;

/// ToolPulse: observability for AI coding-agent tool calls.
/// Runs as a Claude Code hook and ships each event to a collector server.
#[derive(Parser)]
#[command(name = "toolpulse", version = env!("CARGO_PKG_VERSION"), about = "Telemetry hooks for AI coding agents")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a tool call before it runs and record its start (hook, internal)
    PreToolUse,

    /// Record a finished tool call and its duration (hook, internal)
    PostToolUse,

    /// Enrich a hook event with metadata and send it to the server (hook, internal)
    SendEvent {
        /// Source application name, shown by the server
        #[arg(long)]
        source_app: String,
        /// Hook event type (PreToolUse, PostToolUse, Stop, ...)
        #[arg(long)]
        event_type: String,
        /// Override the server URL from config
        #[arg(long)]
        server_url: Option<String>,
        /// Attach the session transcript as `chat`
        #[arg(long)]
        add_chat: bool,
        /// Generate a one-line summary with an LLM
        #[arg(long)]
        summarize: bool,
        /// Agent type
        #[arg(long, value_parser = ["claude", "codex", "gemini", "custom"])]
        agent_type: Option<String>,
        /// Agent version
        #[arg(long)]
        agent_version: Option<String>,
    },

    /// Retry delivery of queued events
    Flush {
        /// Override the server URL from config
        #[arg(long)]
        server_url: Option<String>,
    },

    /// Remove sessions older than the given age from the state file
    Cleanup {
        /// Maximum session age in hours (default: from config, 24)
        #[arg(long)]
        max_age_hours: Option<i64>,
    },

    /// Show tracked sessions and queued events
    Status,

    /// Register ToolPulse hooks in Claude Code settings
    Install {
        /// Install into ~/.claude/settings.json instead of the project
        #[arg(long)]
        global: bool,
    },

    /// Remove ToolPulse hooks from Claude Code settings
    Uninstall {
        /// Remove from ~/.claude/settings.json instead of the project
        #[arg(long)]
        global: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TOOLPULSE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Hooks must never fail the agent: a panic is logged and exits 0.
fn run_hook(name: &str, hook: impl FnOnce() -> i32 + std::panic::UnwindSafe) -> i32 {
    match std::panic::catch_unwind(hook) {
        Ok(code) => code,
        Err(_) => {
            tracing::error!("{} hook panicked", name);
            0
        }
    }
}

fn exit_on_error(result: core::error::Result<()>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::PreToolUse => {
            std::process::exit(run_hook("pre-tool-use", commands::pre_tool_use::run));
        }

        Commands::PostToolUse => {
            std::process::exit(run_hook("post-tool-use", commands::post_tool_use::run));
        }

        Commands::SendEvent {
            source_app,
            event_type,
            server_url,
            add_chat,
            summarize,
            agent_type,
            agent_version,
        } => {
            let args = SendEventArgs {
                source_app,
                event_type,
                server_url,
                add_chat,
                summarize,
                agent_type,
                agent_version,
            };
            std::process::exit(run_hook("send-event", || {
                commands::send_event::run(&args)
            }));
        }

        Commands::Flush { server_url } => {
            exit_on_error(commands::maintenance::run_flush(server_url.as_deref()));
        }

        Commands::Cleanup { max_age_hours } => {
            exit_on_error(commands::maintenance::run_cleanup(max_age_hours));
        }

        Commands::Status => {
            exit_on_error(commands::status::run());
        }

        Commands::Install { global } => {
            exit_on_error(integrations::claude_hooks::install(
                global,
                &core::config::project_dir(),
            ));
        }

        Commands::Uninstall { global } => {
            exit_on_error(integrations::claude_hooks::uninstall(
                global,
                &core::config::project_dir(),
            ));
        }
    }
}
