//! LLM client and prompt assembly

pub mod client;
pub mod prompt;

pub use client::{strip_json_fences, AnthropicClient, LlmClient};
