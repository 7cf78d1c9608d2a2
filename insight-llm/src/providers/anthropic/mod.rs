//! Anthropic (Claude) provider implementation

pub mod completion;
pub mod types;

pub use completion::AnthropicProvider;
