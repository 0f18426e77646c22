use uuid::Uuid;

use crate::commands::{read_payload, HookContext};
use crate::core::collector::{self, MetadataCollector, ToolCall};
use crate::core::dispatcher::{Dispatcher, Outcome};
use crate::core::envelope::EventEnvelope;
use crate::core::error::Result;
use crate::core::hook_input::HookPayload;
use crate::core::queue::EventQueue;
use crate::core::{transcript, util};
use crate::integrations::summarizer;

const POST_TOOL_USE: &str = "PostToolUse";

#[derive(Debug, Clone, Default)]
pub struct SendEventArgs {
    pub source_app: String,
    pub event_type: String,
    pub server_url: Option<String>,
    pub add_chat: bool,
    pub summarize: bool,
    pub agent_type: Option<String>,
    pub agent_version: Option<String>,
}

/// True roughly once every `one_in` calls; 0 disables, 1 always fires.
pub fn sample_one_in(one_in: u32) -> bool {
    match one_in {
        0 => false,
        1 => true,
        n => Uuid::new_v4().as_u128() % u128::from(n) == 0,
    }
}

/// Assemble the envelope for one hook event. Every metadata source is
/// best-effort; a failing one leaves its fields out.
pub fn build_envelope(args: &SendEventArgs, payload: &HookPayload, ctx: &HookContext) -> EventEnvelope {
    let session_id = payload.session_id.as_str();
    let collector = MetadataCollector::new(&ctx.project_dir, &ctx.store);
    let call = payload
        .tool_call()
        .map(|(name, input)| ToolCall { name, input });

    let mut envelope = EventEnvelope::new(
        &args.source_app,
        &args.event_type,
        session_id,
        payload.raw.clone(),
        util::now_millis(),
    );
    envelope.model_name = collector.resolve_model(session_id, payload.transcript_path.as_deref());
    envelope.agent_type = args
        .agent_type
        .clone()
        .unwrap_or_else(|| ctx.config.agent.agent_type.clone());
    envelope.agent_version = args
        .agent_version
        .clone()
        .or_else(|| ctx.config.agent.agent_version.clone());

    let is_post = args.event_type == POST_TOOL_USE;
    if is_post {
        if let Err(e) = ctx.store.increment_tool_count(session_id) {
            tracing::warn!("failed to bump tool count: {}", e);
        }
    }

    match collector.tier0(session_id, &envelope.model_name) {
        Ok(tier0) => envelope.tier0 = Some(tier0),
        Err(e) => tracing::warn!("failed to collect session context: {}", e),
    }

    let duration = match (is_post, payload.tool_name.as_deref()) {
        (true, Some(tool)) => collector::take_duration(&ctx.project_dir, session_id, tool),
        _ => None,
    };
    envelope.tier1 = Some(collector.tier1(session_id, call, duration));
    envelope.workflow = collector.tier2(session_id, call);

    if sample_one_in(ctx.config.state.sweep_one_in) {
        if let Err(e) = ctx
            .store
            .cleanup_old_sessions(ctx.config.state.max_session_age_hours)
        {
            tracing::warn!("session cleanup failed: {}", e);
        }
    }

    if args.add_chat || ctx.config.capture.add_chat {
        if let Some(path) = payload.transcript_path.as_deref().filter(|p| p.exists()) {
            match transcript::read_chat(path) {
                Ok(chat) => envelope.chat = Some(chat),
                Err(e) => tracing::warn!("failed to read transcript: {}", e),
            }
        }
    }

    if args.summarize || ctx.config.capture.summarize {
        envelope.summary = summarizer::summarize_event(&args.event_type, &payload.raw);
    }

    envelope
}

pub fn deliver(envelope: &EventEnvelope, ctx: &HookContext, server_url: Option<&str>) -> Result<Outcome> {
    let mut server = ctx.config.server.clone();
    if let Some(url) = server_url {
        server.url = url.to_string();
    }
    let dispatcher = Dispatcher::from_config(&server, EventQueue::for_project(&ctx.project_dir))?;
    Ok(dispatcher.send(&envelope.to_value()?))
}

pub fn run(args: &SendEventArgs) -> i32 {
    let Some(payload) = read_payload() else {
        return 0;
    };
    let result = HookContext::load().and_then(|ctx| {
        let envelope = build_envelope(args, &payload, &ctx);
        deliver(&envelope, &ctx, args.server_url.as_deref())
    });
    match result {
        Ok(outcome) => tracing::debug!("{} event: {:?}", args.event_type, outcome),
        Err(e) => tracing::warn!("send-event: {}", e),
    }
    0
}
