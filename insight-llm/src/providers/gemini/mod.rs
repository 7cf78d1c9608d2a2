//! Google Gemini provider implementation

pub mod completion;
pub mod types;

pub use completion::GeminiProvider;
