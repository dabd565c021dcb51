//! Grounded answer generation: one LLM call over the retrieved chunks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use swallow_index::{DocumentMetadata, RetrievalResult};
use swallow_llm::{LlmProvider, Message};

use crate::error::AskError;

const SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    /// Metadata of every chunk shown to the model, in retrieval order.
    pub sources: Vec<DocumentMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub question: String,
    pub error: String,
}

/// Outcome of a question; serialized without a tag so clients see either shape directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AskResponse {
    Answer(Answer),
    Error(ErrorPayload),
}

impl AskResponse {
    #[must_use]
    pub fn error(question: &str, error: impl std::fmt::Display) -> Self {
        Self::Error(ErrorPayload {
            question: question.to_owned(),
            error: error.to_string(),
        })
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

pub struct AnswerGenerator<P> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: LlmProvider> AnswerGenerator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Instructions as a system message, then the context and question.
    #[must_use]
    pub fn build_prompt(question: &str, hits: &RetrievalResult) -> Vec<Message> {
        let context = hits
            .iter()
            .map(|hit| hit.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("{context}\n\nQuestion: {question}\nHelpful Answer:")),
        ]
    }

    /// Ask the model once. Never retries.
    ///
    /// # Errors
    ///
    /// Returns `AskError::LlmTimeout` when the call exceeds the configured
    /// timeout and `AskError::Llm` when the provider fails.
    pub async fn try_generate(
        &self,
        question: &str,
        hits: &RetrievalResult,
    ) -> Result<Answer, AskError> {
        let messages = Self::build_prompt(question, hits);
        let answer = tokio::time::timeout(self.timeout, self.provider.chat(&messages))
            .await
            .map_err(|_| AskError::LlmTimeout(self.timeout))??;

        Ok(Answer {
            question: question.to_owned(),
            answer,
            sources: hits.iter().map(|hit| hit.chunk.metadata.clone()).collect(),
        })
    }

    /// Like [`Self::try_generate`], with failures folded into an error payload.
    pub async fn generate(&self, question: &str, hits: &RetrievalResult) -> AskResponse {
        match self.try_generate(question, hits).await {
            Ok(answer) => AskResponse::Answer(answer),
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                AskResponse::error(question, e)
            }
        }
    }
}
