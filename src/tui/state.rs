use crate::model::{CandidateId, Session, SimplifyPolicy, Stage, DEFAULT_TEMPERATURE};
use crate::workflow::{NoticeKind, Snapshot, UiCommand, WorkflowEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

const TEMPERATURE_STEP: f64 = 0.1;

/// Presentation state owned by the UI thread. Workflow data only arrives via snapshots.
pub struct UiState {
    pub snapshot: Snapshot,
    pub source_input: String,
    pub translation_input: String,
    /// Highlighted row in the candidate list.
    pub cursor: usize,
    pub confirm_empty: bool,
    pub show_help: bool,
    pub info: String,
    pub info_is_error: bool,
    pub log_path: Option<PathBuf>,
    pub tick: usize,
}

impl UiState {
    pub fn new(policy: SimplifyPolicy, temperature: f64) -> Self {
        Self {
            snapshot: Snapshot {
                session: Session::new(temperature),
                policy,
                busy: Vec::new(),
                can_proceed: false,
            },
            source_input: String::new(),
            translation_input: String::new(),
            cursor: 0,
            confirm_empty: false,
            show_help: false,
            info: String::new(),
            info_is_error: false,
            log_path: None,
            tick: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.snapshot.session.stage
    }

    pub fn set_info(&mut self, msg: impl Into<String>) {
        self.info = msg.into();
        self.info_is_error = false;
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.info = msg.into();
        self.info_is_error = true;
    }

    fn cursor_candidate(&self) -> Option<CandidateId> {
        self.snapshot
            .session
            .candidates
            .get(self.cursor)
            .map(|c| c.id.clone())
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(SimplifyPolicy::default(), DEFAULT_TEMPERATURE)
    }
}

/// What a key press means in the current context.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Quit,
    ToggleHelp,
    Type(char),
    Backspace,
    TemperatureUp,
    TemperatureDown,
    CursorUp,
    CursorDown,
    SelectAtCursor,
    Enter,
    Back,
    Assist,
    Evaluate,
    ConfirmYes,
    ConfirmNo,
    Restart,
    CopySummary,
}

pub fn map_key(state: &UiState, key: KeyEvent) -> Option<UiAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(UiAction::Quit);
    }
    if state.confirm_empty {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UiAction::ConfirmYes),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(UiAction::ConfirmNo),
            _ => None,
        };
    }
    if state.show_help {
        return match key.code {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') => Some(UiAction::ToggleHelp),
            _ => None,
        };
    }
    if key.code == KeyCode::F(1) {
        return Some(UiAction::ToggleHelp);
    }
    if ctrl && key.code == KeyCode::Char('r') {
        return Some(UiAction::Restart);
    }

    let editing = matches!(state.stage(), Stage::Input | Stage::Translate);
    match (state.stage(), key.code) {
        (Stage::Translate, KeyCode::Char('a')) if ctrl => Some(UiAction::Assist),
        (Stage::Translate, KeyCode::Char('e')) if ctrl => Some(UiAction::Evaluate),
        (_, KeyCode::Char(c)) if editing && !ctrl => Some(UiAction::Type(c)),
        (_, KeyCode::Backspace) if editing => Some(UiAction::Backspace),
        (_, KeyCode::Enter) => Some(UiAction::Enter),
        (Stage::Select | Stage::Confirm | Stage::Translate, KeyCode::Esc) => Some(UiAction::Back),
        (Stage::Input, KeyCode::Right) => Some(UiAction::TemperatureUp),
        (Stage::Input, KeyCode::Left) => Some(UiAction::TemperatureDown),
        (Stage::Select, KeyCode::Up) | (Stage::Select, KeyCode::Char('k')) => {
            Some(UiAction::CursorUp)
        }
        (Stage::Select, KeyCode::Down) | (Stage::Select, KeyCode::Char('j')) => {
            Some(UiAction::CursorDown)
        }
        (Stage::Select, KeyCode::Char(' ')) => Some(UiAction::SelectAtCursor),
        (Stage::Final, KeyCode::Char('r')) => Some(UiAction::Restart),
        (Stage::Final, KeyCode::Char('y')) => Some(UiAction::CopySummary),
        (_, KeyCode::Char('?')) => Some(UiAction::ToggleHelp),
        (_, KeyCode::Char('q')) => Some(UiAction::Quit),
        _ => None,
    }
}

/// Apply a UI action: update local state and collect the commands to send.
/// Returns `None` when the UI should exit.
pub fn apply_action(state: &mut UiState, action: UiAction) -> Option<Vec<UiCommand>> {
    let mut cmds = Vec::new();
    match action {
        UiAction::Quit => return None,
        UiAction::ToggleHelp => state.show_help = !state.show_help,
        UiAction::Type(c) => match state.stage() {
            Stage::Input => state.source_input.push(c),
            Stage::Translate => {
                state.translation_input.push(c);
                cmds.push(UiCommand::EditTranslation(state.translation_input.clone()));
            }
            _ => {}
        },
        UiAction::Backspace => match state.stage() {
            Stage::Input => {
                state.source_input.pop();
            }
            Stage::Translate => {
                state.translation_input.pop();
                cmds.push(UiCommand::EditTranslation(state.translation_input.clone()));
            }
            _ => {}
        },
        UiAction::TemperatureUp | UiAction::TemperatureDown => {
            let delta = if action == UiAction::TemperatureUp {
                TEMPERATURE_STEP
            } else {
                -TEMPERATURE_STEP
            };
            let t = ((state.snapshot.session.temperature + delta) * 10.0).round() / 10.0;
            cmds.push(UiCommand::SetTemperature(t.clamp(0.0, 1.0)));
        }
        UiAction::CursorUp => state.cursor = state.cursor.saturating_sub(1),
        UiAction::CursorDown => {
            let len = state.snapshot.session.candidates.len();
            if state.cursor + 1 < len {
                state.cursor += 1;
            }
        }
        UiAction::SelectAtCursor => {
            if let Some(id) = state.cursor_candidate() {
                cmds.push(UiCommand::SelectCandidate(id));
            }
        }
        UiAction::Enter => match state.stage() {
            Stage::Input => cmds.push(UiCommand::Simplify(state.source_input.clone())),
            Stage::Select | Stage::Confirm => cmds.push(UiCommand::Proceed),
            Stage::Translate => cmds.push(UiCommand::Submit {
                confirm_empty: false,
            }),
            Stage::Final => {}
        },
        UiAction::Back => cmds.push(UiCommand::Back),
        UiAction::Assist => cmds.push(UiCommand::Assist),
        UiAction::Evaluate => cmds.push(UiCommand::Evaluate),
        UiAction::ConfirmYes => {
            state.confirm_empty = false;
            cmds.push(UiCommand::Submit {
                confirm_empty: true,
            });
        }
        UiAction::ConfirmNo => state.confirm_empty = false,
        UiAction::Restart => {
            state.source_input.clear();
            state.translation_input.clear();
            state.cursor = 0;
            state.set_info("Starting over");
            cmds.push(UiCommand::Restart);
        }
        UiAction::CopySummary => match state.snapshot.session.final_summary.as_ref() {
            Some(summary) => {
                let text = super::export::summary_text(summary);
                match super::export::copy_to_clipboard(&text) {
                    Ok(()) => state.set_info("✓ Copied summary to clipboard"),
                    Err(e) => state.set_error(format!("Clipboard copy failed: {e:#}")),
                }
            }
            None => state.set_error("Nothing to copy yet"),
        },
    }
    Some(cmds)
}

/// Fold a controller event into the UI state.
pub fn apply_event(state: &mut UiState, ev: WorkflowEvent) {
    match ev {
        WorkflowEvent::Snapshot(s) => {
            let previous = state.stage();
            state.snapshot = *s;
            if state.stage() != previous {
                state.confirm_empty = false;
                if !state.info_is_error {
                    state.info.clear();
                }
            }
            if state.cursor >= state.snapshot.session.candidates.len() {
                state.cursor = 0;
            }
            if state.stage() == Stage::Translate
                && state.translation_input != state.snapshot.session.learner_translation
                && previous != Stage::Translate
            {
                state.translation_input = state.snapshot.session.learner_translation.clone();
            }
        }
        WorkflowEvent::Notice(n) => match n.kind {
            NoticeKind::Invalid => state.set_error(n.message),
            NoticeKind::Rejected => state.set_error(format!("Backend: {}", n.message)),
            NoticeKind::Transport => state.set_error(n.message),
        },
        WorkflowEvent::ConfirmEmptySubmission => state.confirm_empty = true,
    }
}
