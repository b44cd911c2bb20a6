pub mod bedrock;
pub mod openai;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use traits::{CompletionProvider, EmbeddingProvider, GenerationParams, ProviderError};
pub use utils::{build_providers, Providers};
