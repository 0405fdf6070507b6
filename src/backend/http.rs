use super::wire::{AssistEnvelope, EvaluateEnvelope, SimplifyEnvelope};
use super::{AssistRequest, Backend, BackendError, EvaluateRequest, Result, SimplifyRequest};
use crate::model::{Evaluation, SimplifyReply};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// JSON-over-HTTP client for the simplify / assist / evaluate endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("rewrite-tutor/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Env>(&self, path: &str, body: &Req) -> Result<Env>
    where
        Req: Serialize + ?Sized,
        Env: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "backend request");

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("POST {url}: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(format!("read body of {url}: {e}")))?;

        // A failing status with a well-formed envelope still carries a usable `error`.
        match serde_json::from_slice::<Env>(&bytes) {
            Ok(env) => {
                if !status.is_success() {
                    tracing::debug!(%url, %status, "backend returned an envelope with error status");
                }
                Ok(env)
            }
            Err(e) if status.is_success() => Err(BackendError::Transport(format!(
                "decode response of {url}: {e}"
            ))),
            Err(_) => Err(BackendError::Transport(format!("{url} returned {status}"))),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn simplify(&self, req: &SimplifyRequest) -> Result<SimplifyReply> {
        self.post::<_, SimplifyEnvelope>("/simplify", req)
            .await?
            .into_reply()
    }

    async fn assist_translate(&self, req: &AssistRequest) -> Result<String> {
        self.post::<_, AssistEnvelope>("/assist_translate", req)
            .await?
            .into_suggestion()
    }

    async fn evaluate_translation(&self, req: &EvaluateRequest) -> Result<Evaluation> {
        self.post::<_, EvaluateEnvelope>("/evaluate_translation", req)
            .await?
            .into_evaluation()
    }
}
