//! Non-interactive run of the whole workflow, one backend call at a time.

use super::machine::{Completion, Workflow};
use crate::backend::{Backend, BackendError};
use crate::model::{CandidateId, FinalSummary, Session, Stage};
use anyhow::{bail, Context, Result};

/// Choices a user would otherwise make interactively.
#[derive(Debug, Clone, Default)]
pub struct HeadlessScript {
    pub source: String,
    pub temperature: Option<f64>,
    /// Candidate to accept; the top-ranked one when unset.
    pub candidate: Option<CandidateId>,
    pub translation: Option<String>,
    pub assist: bool,
}

#[derive(Debug, Clone)]
pub struct HeadlessRun {
    pub session: Session,
    pub summary: FinalSummary,
    /// Non-fatal problems (assistance or evaluation failures).
    pub notes: Vec<String>,
}

fn settled(completion: Completion) -> std::result::Result<(), BackendError> {
    match completion {
        Completion::Applied => Ok(()),
        Completion::Failed(e) => Err(e),
        // Nothing else touches the workflow while a headless call is pending.
        Completion::Stale => Err(BackendError::Transport("response arrived for a stale request".into())),
    }
}

pub async fn run_headless(
    workflow: &mut Workflow,
    backend: &dyn Backend,
    script: &HeadlessScript,
) -> Result<HeadlessRun> {
    let mut notes = Vec::new();

    if let Some(t) = script.temperature {
        workflow.set_temperature(t)?;
    }

    let pending = workflow.begin_simplification(&script.source)?;
    let reply = backend.simplify(&pending.request).await;
    if let Err(e) = settled(workflow.complete_simplification(&pending.ticket, reply)) {
        tracing::debug!(error = %e, "simplification failed");
        bail!("simplification failed: {}", e.user_message());
    }

    if workflow.stage() == Stage::Select {
        let session = workflow.session();
        let id = match &script.candidate {
            Some(id) => id.clone(),
            None => match session.candidates.first() {
                Some(c) => c.id.clone(),
                None => bail!("the backend produced no usable rewrite"),
            },
        };
        workflow
            .select_candidate(&id)
            .with_context(|| format!("choose candidate {id}"))?;
    }
    workflow.proceed()?;

    if let Some(translation) = &script.translation {
        workflow.set_learner_translation(translation)?;
    }

    if script.assist {
        let pending = workflow.begin_assistance()?;
        let reply = backend.assist_translate(&pending.request).await;
        if let Err(e) = settled(workflow.complete_assistance(&pending.ticket, reply)) {
            tracing::warn!(error = %e, "assistance failed");
            notes.push(format!("Assistance failed: {}", e.user_message()));
        }
    }

    if !workflow.session().learner_translation.trim().is_empty() {
        let pending = workflow.begin_evaluation()?;
        let reply = backend.evaluate_translation(&pending.request).await;
        if let Err(e) = settled(workflow.complete_evaluation(&pending.ticket, reply)) {
            tracing::warn!(error = %e, "evaluation failed");
            notes.push(format!("Evaluation failed: {}", e.user_message()));
        }
    }

    let summary = workflow.submit(true)?.clone();
    Ok(HeadlessRun {
        session: workflow.session().clone(),
        summary,
        notes,
    })
}
