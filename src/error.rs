//! Error types at pipeline component boundaries.

use crate::providers::ProviderError;
use snow_memory::MemoryError;
use thiserror::Error;

/// Why a single attempt of a retried stage failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("blank response")]
    Blank,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A generation, scoring, or decision stage gave up.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        stage: &'static str,
        attempts: u32,
        last: String,
    },
}

/// A failure that ends the current cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetching notifications failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("local store failed: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("long-term memory failed: {0}")]
    Memory(#[from] MemoryError),

    #[error("publishing failed: {0:#}")]
    Publish(anyhow::Error),
}

impl CycleError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Store(_) => "store",
            CycleError::Stage(_) => "stage",
            CycleError::Embedding(_) => "embedding",
            CycleError::Memory(_) => "memory",
            CycleError::Publish(_) => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_display_names_stage() {
        let err = StageError::Exhausted {
            stage: "post",
            attempts: 5,
            last: "blank response".into(),
        };
        assert_eq!(
            err.to_string(),
            "post failed after 5 attempt(s): blank response"
        );
    }

    #[test]
    fn cycle_error_kinds() {
        let err: CycleError = MemoryError::ZeroMagnitude.into();
        assert_eq!(err.kind(), "memory");
        let err = CycleError::Publish(anyhow::anyhow!("relay down"));
        assert_eq!(err.kind(), "publish");
        assert_eq!(err.to_string(), "publishing failed: relay down");
    }
}
