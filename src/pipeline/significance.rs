//! Significance scoring on the 1-10 scale.

use super::generation::strip_quotes;
use super::prompts;
use super::retry::{with_retries, RetryPolicy};
use crate::error::{AttemptError, StageError};
use crate::providers::{CompletionRequest, LanguageModel};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+").unwrap());

/// First (signed) integer in `response`, clamped into [1, 10].
///
/// Digit runs too long for `i64` saturate toward their sign.
pub fn extract_score(response: &str) -> Option<u8> {
    let digits = INTEGER_RE.find(response)?.as_str();
    let value = digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    });
    Some(value.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u8)
}

pub struct SignificanceEvaluator {
    llm: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    temperature: f32,
}

impl SignificanceEvaluator {
    pub fn new(llm: Arc<dyn LanguageModel>, policy: RetryPolicy, temperature: f32) -> Self {
        Self {
            llm,
            policy,
            temperature,
        }
    }

    /// Score `content`. Always within [1, 10], or an error after the retry
    /// budget is spent.
    pub async fn score(&self, content: &str) -> Result<u8, StageError> {
        let request = CompletionRequest::new(prompts::significance(content), self.temperature);
        let llm = self.llm.as_ref();
        let score = with_retries(self.policy, "significance", |_| {
            let request = &request;
            async move {
                let raw = llm.complete(request).await?;
                let text = strip_quotes(&raw);
                if text.is_empty() {
                    return Err(AttemptError::Blank);
                }
                extract_score(text)
                    .ok_or_else(|| AttemptError::Malformed(format!("no integer in {text:?}")))
            }
        })
        .await?;
        debug!(score, "Scored significance");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.0
                .lock()
                .pop_front()
                .map(str::to_string)
                .ok_or(ProviderError::EmptyResponse)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn evaluator(replies: Vec<&'static str>) -> SignificanceEvaluator {
        SignificanceEvaluator::new(
            Arc::new(Scripted(Mutex::new(replies.into()))),
            RetryPolicy::immediate(5),
            0.3,
        )
    }

    #[test]
    fn extracts_and_clamps() {
        assert_eq!(extract_score("7"), Some(7));
        assert_eq!(extract_score("Score: 8/10"), Some(8));
        assert_eq!(extract_score("0"), Some(1));
        assert_eq!(extract_score("42"), Some(10));
        assert_eq!(extract_score("99999999999999999999999"), Some(10));
        assert_eq!(extract_score("-3"), Some(1));
        assert_eq!(extract_score("Score: -3"), Some(1));
        assert_eq!(extract_score("-99999999999999999999999"), Some(1));
        assert_eq!(extract_score("seven"), None);
    }

    #[tokio::test]
    async fn tolerates_extra_text() {
        let score = evaluator(vec!["I'd say 6, honestly"]).score("gm").await.unwrap();
        assert_eq!(score, 6);
    }

    #[tokio::test]
    async fn negative_reply_scores_minimum() {
        let score = evaluator(vec!["Score: -3"]).score("gm").await.unwrap();
        assert_eq!(score, MIN_SCORE);
    }

    #[tokio::test]
    async fn retries_until_a_number_appears() {
        let score = evaluator(vec!["", "hmm, hard to say", "11"])
            .score("gm")
            .await
            .unwrap();
        assert_eq!(score, 10);
    }

    #[tokio::test]
    async fn exhaustion_is_an_error_not_a_default() {
        let err = evaluator(vec!["no", "nope", "never", "nah", "pass"])
            .score("gm")
            .await
            .unwrap_err();
        let StageError::Exhausted { stage, attempts, .. } = err;
        assert_eq!(stage, "significance");
        assert_eq!(attempts, 5);
    }
}
