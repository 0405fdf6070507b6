//! AI backend contract.
//!
//! The workflow only sees the [`Backend`] trait; [`HttpBackend`] speaks the
//! JSON-over-HTTP protocol, tests substitute in-memory fakes.

mod http;
#[cfg(test)]
pub(crate) mod testing;
pub(crate) mod wire;

pub use http::HttpBackend;

use crate::model::{Evaluation, SimplifyReply};
use async_trait::async_trait;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Shown when the transport failed and there is nothing better to say.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Communication with the server failed";
/// Shown when the backend rejected a request without a message.
pub const GENERIC_REJECTION_MESSAGE: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered `ok: false`.
    #[error("backend error: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Text to put in front of the user.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Transport(_) => TRANSPORT_FAILURE_MESSAGE.to_string(),
            BackendError::Rejected(msg) if msg.trim().is_empty() => {
                GENERIC_REJECTION_MESSAGE.to_string()
            }
            BackendError::Rejected(msg) => msg.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplifyRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistRequest {
    pub simplified: String,
    pub learner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateRequest {
    pub original: String,
    pub simplified: String,
    pub translation: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn simplify(&self, req: &SimplifyRequest) -> Result<SimplifyReply>;

    async fn assist_translate(&self, req: &AssistRequest) -> Result<String>;

    async fn evaluate_translation(&self, req: &EvaluateRequest) -> Result<Evaluation>;
}
