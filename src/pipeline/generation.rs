//! Short-term memory and post generation.

use super::aggregator::Context;
use super::prompts;
use super::retry::{with_retries, RetryPolicy};
use crate::error::{AttemptError, StageError};
use crate::providers::{ChatMessage, CompletionRequest, LanguageModel};
use crate::store::PostRecord;
use std::sync::Arc;
use tracing::debug;

const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '`'];

/// Strip surrounding whitespace and quote characters.
pub fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches(QUOTE_CHARS).trim()
}

/// Sampling temperatures per generation stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationTemperatures {
    pub short_term: f32,
    pub post: f32,
}

impl Default for GenerationTemperatures {
    fn default() -> Self {
        Self {
            short_term: 0.7,
            post: 0.8,
        }
    }
}

/// Ask `llm` for text, retrying blank or failed responses.
pub(crate) async fn complete_text(
    llm: &dyn LanguageModel,
    policy: RetryPolicy,
    stage: &'static str,
    messages: Vec<ChatMessage>,
    temperature: f32,
) -> Result<String, StageError> {
    let request = CompletionRequest::new(messages, temperature);
    with_retries(policy, stage, |_| {
        let request = &request;
        async move {
            let raw = llm.complete(request).await?;
            let text = strip_quotes(&raw);
            if text.is_empty() {
                return Err(AttemptError::Blank);
            }
            Ok(text.to_string())
        }
    })
    .await
}

pub struct Generator {
    llm: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    temperatures: GenerationTemperatures,
    username: String,
}

impl Generator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        policy: RetryPolicy,
        temperatures: GenerationTemperatures,
        username: String,
    ) -> Self {
        Self {
            llm,
            policy,
            temperatures,
            username,
        }
    }

    /// Narrate the current context as an internal monologue.
    pub async fn generate_short_term_memory(&self, context: &Context) -> Result<String, StageError> {
        let messages = prompts::short_term_memory(
            &self.username,
            &context.render(),
            &prompts::format_recent_posts(&context.recent_posts),
        );
        let memory = complete_text(
            self.llm.as_ref(),
            self.policy,
            "short-term memory",
            messages,
            self.temperatures.short_term,
        )
        .await?;
        debug!(chars = memory.len(), "Generated short-term memory");
        Ok(memory)
    }

    /// Write the next post from short-term memory, recalled long-term
    /// memories, recent posts and the context.
    pub async fn generate_post(
        &self,
        short_term_memory: &str,
        long_term_memories: &str,
        recent_posts: &[PostRecord],
        context: &Context,
    ) -> Result<String, StageError> {
        let messages = prompts::post(
            &self.username,
            short_term_memory,
            long_term_memories,
            &prompts::format_recent_posts(recent_posts),
            &context.render(),
        );
        let post = complete_text(
            self.llm.as_ref(),
            self.policy,
            "post",
            messages,
            self.temperatures.post,
        )
        .await?;
        debug!(chars = post.len(), "Generated post");
        Ok(post)
    }
}
