//! Text summary builder for CLI output.
//!
//! Formats a finished headless run as human-readable lines for text mode.

use crate::model::{temperature_band, SimplifyPolicy};
use crate::workflow::HeadlessRun;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn push_block(lines: &mut Vec<String>, title: &str, body: &str) {
    lines.push(format!("{title}:"));
    for l in body.lines() {
        lines.push(format!("  {l}"));
    }
}

pub(crate) fn build_text_summary(run: &HeadlessRun, policy: SimplifyPolicy) -> TextSummary {
    let mut lines = Vec::new();
    let session = &run.session;
    let band = temperature_band(session.temperature);

    lines.push(format!(
        "Temperature: {:.1} ({})",
        session.temperature, band.label
    ));
    push_block(&mut lines, "Original", &run.summary.original);

    if policy == SimplifyPolicy::CandidateBatch && !session.candidates.is_empty() {
        lines.push("Candidates:".to_string());
        for c in &session.candidates {
            let marker = if session.selected_candidate.as_ref() == Some(&c.id) {
                '*'
            } else {
                ' '
            };
            lines.push(format!(" {marker}[{}] {}", c.id, c.text));
            if !c.explanation.trim().is_empty() {
                lines.push(format!("       {}", c.explanation));
            }
        }
    }

    push_block(&mut lines, "Simplified", &run.summary.simplified);
    if let Some(score) = session.simplified_score {
        lines.push(format!("Translatability: {score}/100"));
    }
    push_block(&mut lines, "Your translation", &run.summary.learner_translation);
    push_block(&mut lines, "Evaluation", &run.summary.evaluation);
    push_block(&mut lines, "AI suggestion", &run.summary.ai_suggestion);

    for note in &run.notes {
        lines.push(format!("Note: {note}"));
    }
    lines.push(format!("Completed: {}", run.summary.completed_at));

    TextSummary { lines }
}
