//! Synchronous workflow state machine.
//!
//! Every user action is a method guarded by the current stage. Actions that need
//! the backend are split in two: `begin_*` validates, marks the trigger busy and
//! hands out a [`Ticket`]; `complete_*` takes the ticket back with the backend
//! result. A ticket is only honoured while the workflow is still in the stage
//! and epoch it was issued for, so late responses after a back-navigation or a
//! restart are dropped without touching the session.

use super::error::{ValidationError, WorkflowError};
use crate::backend::{AssistRequest, BackendError, EvaluateRequest, SimplifyRequest};
use crate::model::{
    Candidate, CandidateId, Evaluation, FinalSummary, Session, SimplifyPolicy, SimplifyReply,
    Stage, Trigger, NO_EVALUATION, NO_SUGGESTION, NO_TRANSLATION,
};
use std::collections::HashMap;

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Tag attached to one in-flight backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub id: u64,
    pub trigger: Trigger,
    pub epoch: u64,
    pub stage: Stage,
}

/// A request ready to be sent, plus the ticket to complete it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<R> {
    pub ticket: Ticket,
    pub request: R,
}

/// What happened to a backend result handed back to the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    Failed(BackendError),
    /// Issued for a stage or session that is gone; ignored.
    Stale,
}

pub struct Workflow {
    policy: SimplifyPolicy,
    default_temperature: f64,
    session: Session,
    epoch: u64,
    next_ticket: u64,
    in_flight: HashMap<Trigger, u64>,
    // Source text of the simplification in flight; becomes `original_text` on success.
    pending_source: Option<(u64, String)>,
}

impl Workflow {
    pub fn new(policy: SimplifyPolicy, default_temperature: f64) -> Self {
        Self {
            policy,
            default_temperature,
            session: Session::new(default_temperature),
            epoch: 0,
            next_ticket: 1,
            in_flight: HashMap::new(),
            pending_source: None,
        }
    }

    pub fn policy(&self) -> SimplifyPolicy {
        self.policy
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_busy(&self, trigger: Trigger) -> bool {
        self.in_flight.contains_key(&trigger)
    }

    pub fn busy_triggers(&self) -> Vec<Trigger> {
        let mut v: Vec<Trigger> = self.in_flight.keys().copied().collect();
        v.sort_by_key(|t| *t as u8);
        v
    }

    /// Whether a completion for `ticket` would still be applied.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch
            && ticket.stage == self.session.stage
            && self.in_flight.get(&ticket.trigger) == Some(&ticket.id)
    }

    /// Whether the forward action out of the review stage is enabled.
    pub fn can_proceed(&self) -> bool {
        match self.session.stage {
            Stage::Select => self
                .session
                .selected()
                .is_some_and(|c| !c.text.trim().is_empty()),
            Stage::Confirm => !self.session.simplified_text.trim().is_empty(),
            _ => false,
        }
    }

    fn require(&self, action: &'static str, allowed: &[Stage]) -> Result<()> {
        if allowed.contains(&self.session.stage) {
            Ok(())
        } else {
            Err(WorkflowError::NotAllowed {
                action,
                stage: self.session.stage,
            })
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = ?self.session.stage, to = ?stage, "stage transition");
        self.session.stage = stage;
        self.invalidate_requests();
    }

    fn invalidate_requests(&mut self) {
        self.epoch += 1;
        self.in_flight.clear();
        self.pending_source = None;
    }

    fn issue(&mut self, trigger: Trigger) -> Result<Ticket> {
        if self.is_busy(trigger) {
            return Err(WorkflowError::Busy(trigger));
        }
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(trigger, id);
        Ok(Ticket {
            id,
            trigger,
            epoch: self.epoch,
            stage: self.session.stage,
        })
    }

    /// Release the busy flag held by `ticket` and report whether its result may be applied.
    fn settle(&mut self, ticket: &Ticket) -> bool {
        let current = self.is_current(ticket);
        if self.in_flight.get(&ticket.trigger) == Some(&ticket.id) {
            self.in_flight.remove(&ticket.trigger);
        }
        if !current {
            tracing::debug!(trigger = %ticket.trigger, ticket = ticket.id, "discarding stale response");
        }
        current
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        self.require("set temperature", &[Stage::Input])?;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ValidationError::TemperatureOutOfRange(temperature).into());
        }
        self.session.temperature = temperature;
        Ok(())
    }

    pub fn begin_simplification(&mut self, text: &str) -> Result<Pending<SimplifyRequest>> {
        self.require("simplify", &[Stage::Input])?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptySourceText.into());
        }
        let ticket = self.issue(Trigger::Simplify)?;
        self.pending_source = Some((ticket.id, text.to_string()));
        Ok(Pending {
            ticket,
            request: SimplifyRequest {
                text: text.to_string(),
                temperature: Some(self.session.temperature),
            },
        })
    }

    pub fn complete_simplification(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<SimplifyReply, BackendError>,
    ) -> Completion {
        if !self.settle(ticket) {
            return Completion::Stale;
        }
        let source = match self.pending_source.take() {
            Some((id, text)) if id == ticket.id => text,
            _ => return Completion::Stale,
        };
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return Completion::Failed(e),
        };

        self.session.original_text = source;
        self.session.selected_candidate = None;
        match (self.policy, reply) {
            (SimplifyPolicy::CandidateBatch, SimplifyReply::Candidates(list)) => {
                self.session.candidates = list;
            }
            (SimplifyPolicy::CandidateBatch, SimplifyReply::Single { text, score }) => {
                self.session.candidates = if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![Candidate {
                        id: CandidateId::from(1),
                        text,
                        explanation: score
                            .map(|s| format!("Translatability score: {s}"))
                            .unwrap_or_default(),
                    }]
                };
            }
            (SimplifyPolicy::SingleResult, SimplifyReply::Single { text, score }) => {
                self.session.candidates.clear();
                self.session.simplified_text = text;
                self.session.simplified_score = score;
            }
            (SimplifyPolicy::SingleResult, SimplifyReply::Candidates(list)) => {
                // Backend ranks best first.
                self.session.simplified_text =
                    list.first().map(|c| c.text.clone()).unwrap_or_default();
                self.session.simplified_score = None;
                self.session.candidates = list;
            }
        }
        tracing::info!(
            candidates = self.session.candidates.len(),
            "simplification applied"
        );
        self.enter(self.policy.review_stage());
        Completion::Applied
    }

    pub fn select_candidate(&mut self, id: &CandidateId) -> Result<()> {
        self.require("select candidate", &[Stage::Select])?;
        if self.session.candidate(id).is_none() {
            return Err(ValidationError::UnknownCandidate(id.clone()).into());
        }
        self.session.selected_candidate = Some(id.clone());
        Ok(())
    }

    /// Accept the chosen candidate (or the single result) and move on to translating.
    pub fn proceed(&mut self) -> Result<()> {
        self.require("proceed", &[Stage::Select, Stage::Confirm])?;
        if self.session.stage == Stage::Select {
            let chosen = self
                .session
                .selected()
                .ok_or(ValidationError::NoCandidateSelected)?;
            if chosen.text.trim().is_empty() {
                return Err(ValidationError::EmptySimplifiedText.into());
            }
            let text = chosen.text.clone();
            self.session.simplified_text = text;
            self.session.simplified_score = None;
        } else if self.session.simplified_text.trim().is_empty() {
            return Err(ValidationError::EmptySimplifiedText.into());
        }
        self.enter(Stage::Translate);
        Ok(())
    }

    pub fn back(&mut self) -> Result<()> {
        let target = match self.session.stage {
            Stage::Select | Stage::Confirm => Stage::Input,
            Stage::Translate => self.policy.review_stage(),
            stage => {
                return Err(WorkflowError::NotAllowed {
                    action: "back",
                    stage,
                })
            }
        };
        self.enter(target);
        Ok(())
    }

    pub fn set_learner_translation(&mut self, text: &str) -> Result<()> {
        self.require("edit translation", &[Stage::Translate])?;
        self.session.learner_translation = text.to_string();
        Ok(())
    }

    /// Ask for a translation hint for the accepted sentence and the current draft.
    pub fn begin_assistance(&mut self) -> Result<Pending<AssistRequest>> {
        self.require("assist", &[Stage::Translate])?;
        let ticket = self.issue(Trigger::Assist)?;
        Ok(Pending {
            ticket,
            request: AssistRequest {
                simplified: self.session.simplified_text.clone(),
                learner: self.session.learner_translation.clone(),
            },
        })
    }

    pub fn complete_assistance(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<String, BackendError>,
    ) -> Completion {
        if !self.settle(ticket) {
            return Completion::Stale;
        }
        match result {
            Ok(suggestion) => {
                self.session.ai_suggestion = Some(suggestion);
                Completion::Applied
            }
            Err(e) => Completion::Failed(e),
        }
    }

    pub fn begin_evaluation(&mut self) -> Result<Pending<EvaluateRequest>> {
        self.require("evaluate", &[Stage::Translate])?;
        let translation = self.session.learner_translation.trim();
        if translation.is_empty() {
            return Err(ValidationError::EmptyTranslation.into());
        }
        let request = EvaluateRequest {
            original: self.session.original_text.clone(),
            simplified: self.session.simplified_text.clone(),
            translation: translation.to_string(),
        };
        let ticket = self.issue(Trigger::Evaluate)?;
        Ok(Pending { ticket, request })
    }

    pub fn complete_evaluation(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<Evaluation, BackendError>,
    ) -> Completion {
        if !self.settle(ticket) {
            return Completion::Stale;
        }
        match result {
            Ok(evaluation) => {
                self.session.evaluation = Some(evaluation);
                Completion::Applied
            }
            Err(e) => Completion::Failed(e),
        }
    }

    /// Freeze the review summary and finish. An empty translation is only
    /// accepted with `confirm_empty`.
    pub fn submit(&mut self, confirm_empty: bool) -> Result<&FinalSummary> {
        self.require("submit", &[Stage::Translate])?;
        let learner = self.session.learner_translation.trim().to_string();
        if learner.is_empty() && !confirm_empty {
            return Err(WorkflowError::ConfirmationRequired);
        }

        let summary = FinalSummary {
            completed_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            original: self.session.original_text.clone(),
            simplified: self.session.simplified_text.clone(),
            learner_translation: if learner.is_empty() {
                NO_TRANSLATION.to_string()
            } else {
                learner
            },
            evaluation: self
                .session
                .evaluation
                .as_ref()
                .map(Evaluation::to_display)
                .unwrap_or_else(|| NO_EVALUATION.to_string()),
            ai_suggestion: self
                .session
                .ai_suggestion
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_SUGGESTION.to_string()),
        };
        self.enter(Stage::Final);
        Ok(self.session.final_summary.insert(summary))
    }

    /// Throw the whole session away and start over at the input stage.
    pub fn restart(&mut self) {
        tracing::info!(from = ?self.session.stage, "restarting session");
        self.session = Session::new(self.default_temperature);
        self.invalidate_requests();
    }
}
