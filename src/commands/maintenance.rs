use crate::commands::HookContext;
use crate::core::dispatcher::{Dispatcher, FlushReport};
use crate::core::error::Result;
use crate::core::queue::EventQueue;

/// Replay the durable queue against the server once.
pub fn flush(ctx: &HookContext, server_url: Option<&str>) -> Result<FlushReport> {
    let mut server = ctx.config.server.clone();
    if let Some(url) = server_url {
        server.url = url.to_string();
    }
    let queue = EventQueue::for_project(&ctx.project_dir);
    let dispatcher = Dispatcher::from_config(&server, queue)?;
    Ok(dispatcher.flush())
}

pub fn run_flush(server_url: Option<&str>) -> Result<()> {
    let ctx = HookContext::load()?;
    let report = flush(&ctx, server_url)?;
    if report.delivered == 0 && report.remaining == 0 {
        println!("Event queue is empty.");
    } else {
        println!(
            "Delivered {} queued event(s), {} remaining.",
            report.delivered, report.remaining
        );
    }
    Ok(())
}

pub fn run_cleanup(max_age_hours: Option<i64>) -> Result<()> {
    let ctx = HookContext::load()?;
    let hours = max_age_hours.unwrap_or(ctx.config.state.max_session_age_hours);
    let removed = ctx.store.cleanup_old_sessions(hours)?;
    println!("Removed {} session(s) older than {}h.", removed, hours);
    Ok(())
}
