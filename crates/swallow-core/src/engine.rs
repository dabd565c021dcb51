use std::future::Future;
use std::pin::Pin;

use swallow_index::{Chunk, Retriever};
use swallow_llm::LlmProvider;

use crate::answer::{AnswerGenerator, AskResponse};

/// Object-safe question answering handle shared with request handlers.
pub trait QuestionAnswerer: Send + Sync {
    fn ask<'a>(
        &'a self,
        question: &'a str,
    ) -> Pin<Box<dyn Future<Output = AskResponse> + Send + 'a>>;

    /// Chunks derived from the current input, in document order.
    fn chunks(&self) -> &[Chunk];
}

/// Retrieval plus answer generation over one immutable index.
pub struct QaEngine<P> {
    retriever: Retriever<P>,
    generator: AnswerGenerator<P>,
    chunks: Vec<Chunk>,
}

impl<P: LlmProvider> QaEngine<P> {
    #[must_use]
    pub fn new(
        retriever: Retriever<P>,
        generator: AnswerGenerator<P>,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            retriever,
            generator,
            chunks,
        }
    }

    /// Answer a question. Retrieval and LLM failures come back as an error payload.
    pub async fn answer(&self, question: &str) -> AskResponse {
        let hits = match self.retriever.retrieve(question).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed");
                return AskResponse::error(question, e);
            }
        };
        tracing::debug!(hits = hits.len(), "context retrieved");
        self.generator.generate(question, &hits).await
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<P> {
        &self.retriever
    }
}

impl<P: LlmProvider> QuestionAnswerer for QaEngine<P> {
    fn ask<'a>(
        &'a self,
        question: &'a str,
    ) -> Pin<Box<dyn Future<Output = AskResponse> + Send + 'a>> {
        Box::pin(self.answer(question))
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}
