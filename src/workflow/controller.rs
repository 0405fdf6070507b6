//! Workflow controller.
//!
//! Owns the [`Workflow`], runs backend calls as background tasks, feeds their
//! results back into the state machine and emits events for presentation layers.

use super::error::WorkflowError;
use super::machine::{Completion, Pending, Ticket, Workflow};
use crate::backend::{self, Backend, BackendError};
use crate::model::{CandidateId, Evaluation, Session, SimplifyPolicy, SimplifyReply, Trigger};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Named user actions sent by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    SetTemperature(f64),
    Simplify(String),
    SelectCandidate(CandidateId),
    Proceed,
    Back,
    EditTranslation(String),
    Assist,
    Evaluate,
    Submit { confirm_empty: bool },
    Restart,
    Quit,
}

/// Everything a UI needs to render the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub session: Session,
    pub policy: SimplifyPolicy,
    pub busy: Vec<Trigger>,
    pub can_proceed: bool,
}

impl Snapshot {
    pub fn is_busy(&self, trigger: Trigger) -> bool {
        self.busy.contains(&trigger)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Local validation or an action not available right now.
    Invalid,
    /// The backend answered `ok: false`.
    Rejected,
    /// The request never completed.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub trigger: Option<Trigger>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Snapshot(Box<Snapshot>),
    Notice(Notice),
    /// Submission without a translation was attempted; ask the user.
    ConfirmEmptySubmission,
}

/// Backend results travelling back to the controller task.
enum Completed {
    Simplify(Ticket, backend::Result<SimplifyReply>),
    Assist(Ticket, backend::Result<String>),
    Evaluate(Ticket, backend::Result<Evaluation>),
}

struct Controller {
    workflow: Workflow,
    backend: Arc<dyn Backend>,
    event_tx: UnboundedSender<WorkflowEvent>,
    done_tx: UnboundedSender<Completed>,
    tasks: HashMap<u64, (Ticket, JoinHandle<()>)>,
}

impl Controller {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            session: self.workflow.session().clone(),
            policy: self.workflow.policy(),
            busy: self.workflow.busy_triggers(),
            can_proceed: self.workflow.can_proceed(),
        }
    }

    fn emit(&self, ev: WorkflowEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn emit_snapshot(&self) {
        self.emit(WorkflowEvent::Snapshot(Box::new(self.snapshot())));
    }

    fn spawn<F>(&mut self, ticket: Ticket, fut: F)
    where
        F: Future<Output = Completed> + Send + 'static,
    {
        tracing::info!(trigger = %ticket.trigger, ticket = ticket.id, "backend request issued");
        let done_tx = self.done_tx.clone();
        let handle = tokio::spawn(async move {
            let _ = done_tx.send(fut.await);
        });
        self.tasks.insert(ticket.id, (ticket, handle));
    }

    fn spawn_simplify(&mut self, p: Pending<backend::SimplifyRequest>) {
        let backend = self.backend.clone();
        let ticket = p.ticket;
        self.spawn(ticket, async move {
            Completed::Simplify(ticket, backend.simplify(&p.request).await)
        });
    }

    fn spawn_assist(&mut self, p: Pending<backend::AssistRequest>) {
        let backend = self.backend.clone();
        let ticket = p.ticket;
        self.spawn(ticket, async move {
            Completed::Assist(ticket, backend.assist_translate(&p.request).await)
        });
    }

    fn spawn_evaluate(&mut self, p: Pending<backend::EvaluateRequest>) {
        let backend = self.backend.clone();
        let ticket = p.ticket;
        self.spawn(ticket, async move {
            Completed::Evaluate(ticket, backend.evaluate_translation(&p.request).await)
        });
    }

    /// Abort requests whose results the workflow would no longer accept.
    fn prune_tasks(&mut self) {
        self.tasks.retain(|_, (ticket, handle)| {
            let keep = self.workflow.is_current(ticket);
            if !keep {
                tracing::debug!(trigger = %ticket.trigger, ticket = ticket.id, "aborting superseded request");
                handle.abort();
            }
            keep
        });
    }

    fn handle_command(&mut self, cmd: UiCommand) {
        let res = match cmd {
            UiCommand::SetTemperature(t) => self.workflow.set_temperature(t),
            UiCommand::Simplify(text) => self
                .workflow
                .begin_simplification(&text)
                .map(|p| self.spawn_simplify(p)),
            UiCommand::SelectCandidate(id) => self.workflow.select_candidate(&id),
            UiCommand::Proceed => self.workflow.proceed(),
            UiCommand::Back => self.workflow.back(),
            UiCommand::EditTranslation(text) => self.workflow.set_learner_translation(&text),
            UiCommand::Assist => self
                .workflow
                .begin_assistance()
                .map(|p| self.spawn_assist(p)),
            UiCommand::Evaluate => self
                .workflow
                .begin_evaluation()
                .map(|p| self.spawn_evaluate(p)),
            UiCommand::Submit { confirm_empty } => {
                self.workflow.submit(confirm_empty).map(|_| ())
            }
            UiCommand::Restart => {
                self.workflow.restart();
                Ok(())
            }
            UiCommand::Quit => Ok(()),
        };

        match res {
            Ok(()) => {}
            Err(WorkflowError::ConfirmationRequired) => {
                self.emit(WorkflowEvent::ConfirmEmptySubmission);
            }
            Err(e) => {
                let trigger = match e {
                    WorkflowError::Busy(t) => Some(t),
                    _ => None,
                };
                self.emit(WorkflowEvent::Notice(Notice {
                    kind: NoticeKind::Invalid,
                    trigger,
                    message: e.to_string(),
                }));
            }
        }
        self.prune_tasks();
        self.emit_snapshot();
    }

    fn handle_completion(&mut self, done: Completed) {
        let (ticket, completion) = match done {
            Completed::Simplify(t, r) => (t, self.workflow.complete_simplification(&t, r)),
            Completed::Assist(t, r) => (t, self.workflow.complete_assistance(&t, r)),
            Completed::Evaluate(t, r) => (t, self.workflow.complete_evaluation(&t, r)),
        };
        self.tasks.remove(&ticket.id);

        match completion {
            Completion::Applied => {}
            Completion::Stale => return,
            Completion::Failed(err) => {
                let kind = match &err {
                    BackendError::Transport(detail) => {
                        tracing::warn!(trigger = %ticket.trigger, %detail, "backend unreachable");
                        NoticeKind::Transport
                    }
                    BackendError::Rejected(msg) => {
                        tracing::info!(trigger = %ticket.trigger, error = %msg, "backend rejected request");
                        NoticeKind::Rejected
                    }
                };
                self.emit(WorkflowEvent::Notice(Notice {
                    kind,
                    trigger: Some(ticket.trigger),
                    message: err.user_message(),
                }));
            }
        }
        self.prune_tasks();
        self.emit_snapshot();
    }

    /// Abort outstanding requests and wait for their tasks to wind down.
    async fn abort_all(&mut self) {
        let handles: Vec<_> = self
            .tasks
            .drain()
            .map(|(_, (_, handle))| {
                handle.abort();
                handle
            })
            .collect();
        futures::future::join_all(handles).await;
    }
}

/// Drive `workflow` from UI commands until `Quit` or the command channel closes.
/// Returns the workflow in its final state.
pub async fn run_controller(
    workflow: Workflow,
    backend: Arc<dyn Backend>,
    event_tx: UnboundedSender<WorkflowEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Workflow {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completed>();
    let mut ctl = Controller {
        workflow,
        backend,
        event_tx,
        done_tx,
        tasks: HashMap::new(),
    };
    ctl.emit_snapshot();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => ctl.handle_command(cmd),
                }
            }
            // The controller keeps a sender alive, so this channel never closes.
            Some(done) = done_rx.recv() => ctl.handle_completion(done),
        }
    }

    ctl.abort_all().await;
    ctl.workflow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::model::{Candidate, Stage, DEFAULT_TEMPERATURE};
    use std::time::Duration;

    const SOURCE: &str = "猫が小さな箱の中で眠っている。";

    fn two_candidates() -> SimplifyReply {
        SimplifyReply::Candidates(vec![
            Candidate {
                id: CandidateId::from(1),
                text: "猫が眠っている。".into(),
                explanation: "shorter".into(),
            },
            Candidate {
                id: CandidateId::from(2),
                text: "小さな箱の中で猫が寝ている。".into(),
                explanation: "place first".into(),
            },
        ])
    }

    struct Harness {
        cmd_tx: UnboundedSender<UiCommand>,
        event_rx: UnboundedReceiver<WorkflowEvent>,
        handle: JoinHandle<Workflow>,
    }

    impl Harness {
        fn start(backend: Arc<ScriptedBackend>) -> Self {
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let workflow = Workflow::new(SimplifyPolicy::CandidateBatch, DEFAULT_TEMPERATURE);
            let handle = tokio::spawn(run_controller(workflow, backend, event_tx, cmd_rx));
            Self {
                cmd_tx,
                event_rx,
                handle,
            }
        }

        fn send(&self, cmd: UiCommand) {
            self.cmd_tx.send(cmd).unwrap();
        }

        async fn next_event(&mut self) -> WorkflowEvent {
            tokio::time::timeout(Duration::from_secs(2), self.event_rx.recv())
                .await
                .expect("timed out waiting for workflow event")
                .expect("controller stopped")
        }

        async fn snapshot_where(&mut self, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
            loop {
                if let WorkflowEvent::Snapshot(s) = self.next_event().await {
                    if pred(&s) {
                        return *s;
                    }
                }
            }
        }

        async fn notice(&mut self) -> Notice {
            loop {
                if let WorkflowEvent::Notice(n) = self.next_event().await {
                    return n;
                }
            }
        }

        async fn quit(self) -> Workflow {
            self.send(UiCommand::Quit);
            self.handle.await.unwrap()
        }
    }

    #[tokio::test]
    async fn scenario_select_second_candidate() {
        let backend = Arc::new(ScriptedBackend::new().on_simplify(Ok(two_candidates())));
        let mut h = Harness::start(backend.clone());

        h.send(UiCommand::Simplify(SOURCE.into()));
        let s = h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        assert_eq!(s.session.candidates.len(), 2);
        assert!(!s.can_proceed);

        h.send(UiCommand::SelectCandidate(CandidateId::from(2)));
        h.send(UiCommand::Proceed);
        let s = h.snapshot_where(|s| s.session.stage == Stage::Translate).await;
        assert_eq!(s.session.simplified_text, "小さな箱の中で猫が寝ている。");

        let calls = backend.simplify_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].text, SOURCE);
        assert_eq!(calls[0].temperature, Some(0.7));
        h.quit().await;
    }

    #[tokio::test]
    async fn transport_failure_stays_on_input() {
        let backend = Arc::new(
            ScriptedBackend::new().on_simplify(Err(BackendError::Transport("refused".into()))),
        );
        let mut h = Harness::start(backend);

        h.send(UiCommand::Simplify(SOURCE.into()));
        let n = h.notice().await;
        assert_eq!(n.kind, NoticeKind::Transport);
        assert_eq!(n.message, backend::TRANSPORT_FAILURE_MESSAGE);
        let s = h.snapshot_where(|s| s.busy.is_empty()).await;
        assert_eq!(s.session, Session::default());
    }

    #[tokio::test]
    async fn busy_trigger_rejects_duplicate_request() {
        let backend = Arc::new(ScriptedBackend::gated().on_simplify(Ok(two_candidates())));
        let mut h = Harness::start(backend.clone());

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.is_busy(Trigger::Simplify)).await;
        h.send(UiCommand::Simplify(SOURCE.into()));
        let n = h.notice().await;
        assert_eq!(n.kind, NoticeKind::Invalid);
        assert_eq!(n.trigger, Some(Trigger::Simplify));

        backend.release(1);
        let s = h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        assert!(s.busy.is_empty());
        assert_eq!(backend.simplify_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restart_discards_pending_simplification() {
        let backend = Arc::new(
            ScriptedBackend::gated()
                .on_simplify(Ok(two_candidates()))
                .on_simplify(Err(BackendError::Rejected("second".into()))),
        );
        let mut h = Harness::start(backend.clone());

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.is_busy(Trigger::Simplify)).await;
        while backend.simplify_calls.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        h.send(UiCommand::Restart);
        let s = h.snapshot_where(|s| s.busy.is_empty()).await;
        assert_eq!(s.session, Session::default());

        // A fresh request is accepted and only its outcome counts.
        h.send(UiCommand::Simplify("別の文。".into()));
        h.snapshot_where(|s| s.is_busy(Trigger::Simplify)).await;
        backend.release(2);
        let n = h.notice().await;
        assert_eq!(n.message, "second");

        let wf = h.quit().await;
        assert_eq!(wf.stage(), Stage::Input);
        assert_eq!(wf.session(), &Session::default());
    }

    #[tokio::test]
    async fn assist_rejection_surfaces_message_and_keeps_suggestion() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .on_simplify(Ok(two_candidates()))
                .on_assist(Err(BackendError::Rejected("rate limited".into()))),
        );
        let mut h = Harness::start(backend);

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        h.send(UiCommand::SelectCandidate(CandidateId::from(1)));
        h.send(UiCommand::Proceed);
        h.send(UiCommand::EditTranslation("The cat".into()));
        h.send(UiCommand::Assist);

        let n = h.notice().await;
        assert_eq!(n.kind, NoticeKind::Rejected);
        assert_eq!(n.trigger, Some(Trigger::Assist));
        assert_eq!(n.message, "rate limited");
        let wf = h.quit().await;
        assert_eq!(wf.session().ai_suggestion, None);
        assert_eq!(wf.session().learner_translation, "The cat");
    }

    #[tokio::test]
    async fn empty_translation_never_reaches_evaluate_endpoint() {
        let backend = Arc::new(ScriptedBackend::new().on_simplify(Ok(two_candidates())));
        let mut h = Harness::start(backend.clone());

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        h.send(UiCommand::SelectCandidate(CandidateId::from(1)));
        h.send(UiCommand::Proceed);
        h.send(UiCommand::Evaluate);

        let n = h.notice().await;
        assert_eq!(n.kind, NoticeKind::Invalid);
        h.quit().await;
        assert!(backend.evaluate_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_submission_asks_for_confirmation() {
        let backend = Arc::new(ScriptedBackend::new().on_simplify(Ok(two_candidates())));
        let mut h = Harness::start(backend);

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        h.send(UiCommand::SelectCandidate(CandidateId::from(2)));
        h.send(UiCommand::Proceed);
        h.send(UiCommand::Submit {
            confirm_empty: false,
        });
        loop {
            if h.next_event().await == WorkflowEvent::ConfirmEmptySubmission {
                break;
            }
        }
        let s = h.snapshot_where(|_| true).await;
        assert_eq!(s.session.stage, Stage::Translate);

        h.send(UiCommand::Submit {
            confirm_empty: true,
        });
        let s = h.snapshot_where(|s| s.session.stage == Stage::Final).await;
        assert!(s.session.final_summary.is_some());
        h.quit().await;
    }

    #[tokio::test]
    async fn back_navigation_drops_late_assistance() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .on_simplify(Ok(two_candidates()))
                .on_assist(Ok("The cat sleeps.".into())),
        );
        let mut h = Harness::start(backend.clone());

        h.send(UiCommand::Simplify(SOURCE.into()));
        h.snapshot_where(|s| s.session.stage == Stage::Select).await;
        h.send(UiCommand::SelectCandidate(CandidateId::from(2)));
        h.send(UiCommand::Proceed);
        // Back is queued right behind Assist, so the reply can only arrive afterwards.
        h.send(UiCommand::Assist);
        h.send(UiCommand::Back);
        h.snapshot_where(|s| s.session.stage == Stage::Select).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let wf = h.quit().await;
        assert_eq!(wf.stage(), Stage::Select);
        assert_eq!(wf.session().ai_suggestion, None);
    }
}
