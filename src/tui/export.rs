use crate::model::FinalSummary;
use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Plain-text rendering of the review screen, for pasting elsewhere.
pub fn summary_text(summary: &FinalSummary) -> String {
    let sections = [
        ("Original", summary.original.as_str()),
        ("Simplified", summary.simplified.as_str()),
        ("Your translation", summary.learner_translation.as_str()),
        ("Evaluation", summary.evaluation.as_str()),
        ("AI suggestion", summary.ai_suggestion.as_str()),
    ];
    let mut out = String::new();
    for (title, body) in sections {
        out.push_str(&format!("## {title}\n{body}\n\n"));
    }
    out.push_str(&format!("Completed: {}\n", summary.completed_at));
    out
}

/// Initialize the clipboard manager thread if not already initialized.
/// Clipboard instances are kept alive briefly so clipboard managers on Linux can read them.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            std::thread::sleep(Duration::from_secs(2));
                        } else {
                            tracing::warn!("clipboard rejected text");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue text for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_text_lists_every_section_in_order() {
        let summary = FinalSummary {
            completed_at: "2026-03-01T09:30:00Z".into(),
            original: "猫が小さな箱の中で眠っている。".into(),
            simplified: "猫が箱で寝ている。".into(),
            learner_translation: "The cat sleeps in a box.".into(),
            evaluation: "Score: 85/100\nNatural".into(),
            ai_suggestion: "(no AI assistance)".into(),
        };
        let text = summary_text(&summary);
        let positions: Vec<usize> = [
            "## Original",
            "## Simplified",
            "## Your translation",
            "## Evaluation",
            "## AI suggestion",
            "Completed: 2026-03-01T09:30:00Z",
        ]
        .iter()
        .map(|h| text.find(h).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("Score: 85/100\nNatural"));
    }
}
