//! Completion provider implementations
//!
//! Concrete [`CompletionProvider`](crate::CompletionProvider) backends. All of
//! them share the rate-limited JSON client in [`http`].

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use http::ProviderClient;
pub use openai::OpenAiProvider;
