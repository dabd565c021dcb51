use std::time::Duration;

/// Failures of the single language-model call behind an answer.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("LLM error: {0}")]
    Llm(#[from] swallow_llm::LlmError),

    #[error("LLM call timed out after {}s", .0.as_secs())]
    LlmTimeout(Duration),
}
