//! LLM refinement implementations.

mod openai;

pub use openai::OpenAiRefiner;
