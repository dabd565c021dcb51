//! Configuration, grounded answer generation and startup wiring for Swallow.

pub mod answer;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;

pub use answer::{Answer, AnswerGenerator, AskResponse, ErrorPayload};
pub use engine::{QaEngine, QuestionAnswerer};
pub use error::AskError;
