pub mod claude_hooks;
pub mod summarizer;
