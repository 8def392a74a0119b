pub mod openai;
pub mod traits;

pub use openai::{OpenAiChat, OpenAiEmbedder};
pub use traits::{ChatMessage, CompletionRequest, Embedder, LanguageModel, ProviderError, Role};
