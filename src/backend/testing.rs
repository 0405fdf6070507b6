//! Scripted in-memory backend for unit tests.

use super::{AssistRequest, Backend, BackendError, EvaluateRequest, Result, SimplifyRequest};
use crate::model::{Evaluation, SimplifyReply};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Replies are queued per endpoint and taken in call order, even by calls that
/// are later aborted. Requests are recorded. With a gate, every call waits for
/// a permit before answering.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    simplify: Mutex<VecDeque<Result<SimplifyReply>>>,
    assist: Mutex<VecDeque<Result<String>>>,
    evaluate: Mutex<VecDeque<Result<Evaluation>>>,
    pub simplify_calls: Mutex<Vec<SimplifyRequest>>,
    pub assist_calls: Mutex<Vec<AssistRequest>>,
    pub evaluate_calls: Mutex<Vec<EvaluateRequest>>,
    gate: Option<Semaphore>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Let `n` gated calls answer.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn on_simplify(self, reply: Result<SimplifyReply>) -> Self {
        self.simplify.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_assist(self, reply: Result<String>) -> Self {
        self.assist.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_evaluate(self, reply: Result<Evaluation>) -> Self {
        self.evaluate.lock().unwrap().push_back(reply);
        self
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn exhausted() -> BackendError {
        BackendError::Transport("no scripted reply".into())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn simplify(&self, req: &SimplifyRequest) -> Result<SimplifyReply> {
        self.simplify_calls.lock().unwrap().push(req.clone());
        let next = self.simplify.lock().unwrap().pop_front();
        self.wait_gate().await;
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn assist_translate(&self, req: &AssistRequest) -> Result<String> {
        self.assist_calls.lock().unwrap().push(req.clone());
        let next = self.assist.lock().unwrap().pop_front();
        self.wait_gate().await;
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn evaluate_translation(&self, req: &EvaluateRequest) -> Result<Evaluation> {
        self.evaluate_calls.lock().unwrap().push(req.clone());
        let next = self.evaluate.lock().unwrap().pop_front();
        self.wait_gate().await;
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }
}
