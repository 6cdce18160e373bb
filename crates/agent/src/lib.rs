//! # MicroClaw Agent
//!
//! The conversation engine: one chat-completion client speaking the
//! OpenAI-compatible wire shape, and a bounded loop that lets the model
//! call device tools a configured number of times before the reply goes
//! back to the user.

mod llm;
mod loop_runner;

pub use llm::{LlmClient, REPLY_CAP};
pub use loop_runner::{Agent, AgentOutcome, SYSTEM_PROMPT};

#[cfg(test)]
pub(crate) mod tests_support;
