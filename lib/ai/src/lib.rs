//! AI primitives used by nurture workflow steps.
//!
//! Workflows ask for one of two tasks:
//!
//! - **Sentiment**: classify the lead's message as positive, neutral or negative
//! - **Generation**: write text (a reply, a personalised intro) from a prompt
//!
//! [`AiResponder`] is the seam the engine calls; [`ChatCompletionsBackend`]
//! implements it against any OpenAI-compatible chat completions endpoint.

pub mod backend;
pub mod error;
pub mod responder;

pub use backend::{ChatCompletionsBackend, LlmBackendConfig, LlmProvider};
pub use error::AiError;
pub use responder::{AiResponder, AiResult, AiTask};
