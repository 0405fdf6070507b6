//! Response envelopes. Every response carries `ok`; the rest depends on it.

use super::{BackendError, Result};
use crate::model::{Candidate, Evaluation, SimplifyReply};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
pub(crate) struct SimplifyEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    simplified: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    comment: Option<String>,
}

fn rejected(error: Option<String>) -> BackendError {
    BackendError::Rejected(error.unwrap_or_default())
}

fn malformed(what: &str) -> BackendError {
    BackendError::Transport(format!("malformed response: {what}"))
}

impl SimplifyEnvelope {
    pub(crate) fn into_reply(self) -> Result<SimplifyReply> {
        if !self.ok {
            return Err(rejected(self.error));
        }
        if let Some(candidates) = self.candidates {
            let mut seen = HashSet::new();
            if let Some(dup) = candidates.iter().find(|c| !seen.insert(&c.id)) {
                return Err(malformed(&format!("duplicate candidate id {}", dup.id)));
            }
            return Ok(SimplifyReply::Candidates(candidates));
        }
        match self.simplified {
            Some(text) => Ok(SimplifyReply::Single {
                text,
                score: self.score,
            }),
            None => Err(malformed("neither `candidates` nor `simplified` present")),
        }
    }
}

impl AssistEnvelope {
    pub(crate) fn into_suggestion(self) -> Result<String> {
        if !self.ok {
            return Err(rejected(self.error));
        }
        self.suggestion.ok_or_else(|| malformed("missing `suggestion`"))
    }
}

impl EvaluateEnvelope {
    pub(crate) fn into_evaluation(self) -> Result<Evaluation> {
        if !self.ok {
            return Err(rejected(self.error));
        }
        let score = self.score.ok_or_else(|| malformed("missing `score`"))?;
        if !score.is_finite() {
            return Err(malformed("non-finite `score`"));
        }
        let clamped = score.clamp(0.0, 100.0);
        if clamped != score {
            tracing::warn!(score, "evaluation score outside 0-100, clamping");
        }
        Ok(Evaluation {
            score: clamped,
            comment: self.comment.unwrap_or_default(),
        })
    }
}
