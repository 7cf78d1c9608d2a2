//! OpenAI chat completions provider implementation

pub mod completion;
pub mod types;

pub use completion::OpenAiProvider;
