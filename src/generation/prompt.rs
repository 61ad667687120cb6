//! Prompt Construction
//!
//! Turns a [`GenerationRequest`] into the system and user messages sent to
//! the language model.

use super::GenerationRequest;
use crate::usage::GenerationKind;

/// Character budget of a single social media post
pub const POST_CHAR_LIMIT: usize = 280;

/// System and user messages for one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the messages for a request
pub fn build_prompt(request: &GenerationRequest) -> Prompt {
    let mut system = match request.kind {
        GenerationKind::Generate => format!(
            "You write engaging social media posts. Reply with a single post of at most \
             {} characters. Do not wrap it in quotes.",
            POST_CHAR_LIMIT
        ),
        GenerationKind::Reply => format!(
            "You write thoughtful replies to social media posts. Reply with a single \
             response of at most {} characters that adds to the conversation.",
            POST_CHAR_LIMIT
        ),
        GenerationKind::Thread => format!(
            "You write social media threads. Reply with exactly {} posts, each at most \
             {} characters, numbered like \"1/{}\" and separated by a blank line.",
            request.effective_thread_length(),
            POST_CHAR_LIMIT,
            request.effective_thread_length()
        ),
    };

    if let Some(tone) = request.tone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        system.push_str(&format!(" Use a {} tone.", tone));
    }

    let user = match request.kind {
        GenerationKind::Reply => format!("Write a reply to this post:\n\n{}", request.prompt.trim()),
        _ => format!("Topic: {}", request.prompt.trim()),
    };

    Prompt { system, user }
}
