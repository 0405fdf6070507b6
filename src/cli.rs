use crate::backend::HttpBackend;
use crate::config::{AppConfig, FileConfig, Overrides};
use crate::model::{CandidateId, SimplifyPolicy};
use crate::workflow::{run_headless, HeadlessScript, Workflow};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rewrite-tutor",
    version,
    about = "Simplify a sentence, translate it, and get AI feedback on each step"
)]
pub struct Cli {
    /// Base URL of the tutoring backend
    #[arg(long)]
    pub base_url: Option<String>,

    /// Config file (defaults to <config dir>/rewrite-tutor/config.toml when present)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Simplification style: "candidates" (pick one of several) or "single"
    #[arg(long)]
    pub policy: Option<SimplifyPolicy>,

    /// Creativity of the rewrites, 0.0 to 1.0
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Per-request timeout
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Log level for this crate (RUST_LOG overrides)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run without the TUI and print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Run without the TUI and print the final summary as text
    #[arg(long)]
    pub text: bool,

    /// Sentence to simplify (required with --json / --text)
    #[arg(long)]
    pub source: Option<String>,

    /// Candidate id to accept (defaults to the top-ranked candidate)
    #[arg(long)]
    pub candidate: Option<String>,

    /// Your translation of the simplified sentence; it is evaluated when given
    #[arg(long)]
    pub translation: Option<String>,

    /// Also ask the backend for a translation hint
    #[arg(long)]
    pub assist: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    let cfg = build_config(&args)?;

    if args.json || args.text {
        crate::telemetry::init_stderr(&cfg.log_level);
        return run_once(args, cfg).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(cfg).await
    }
    #[cfg(not(feature = "tui"))]
    {
        Err(anyhow::anyhow!(
            "built without TUI support; use --text or --json with --source"
        ))
    }
}

/// Merge command-line flags over the config file.
pub fn build_config(args: &Cli) -> Result<AppConfig> {
    let file = FileConfig::load(args.config.as_deref()).context("load config file")?;
    let overrides = Overrides {
        base_url: args.base_url.clone(),
        policy: args.policy,
        temperature: args.temperature,
        request_timeout: args.timeout.map(Into::into),
        log_level: args.log_level.clone(),
    };
    Ok(AppConfig::resolve(file, overrides)?)
}

pub fn build_backend(cfg: &AppConfig) -> Result<HttpBackend> {
    HttpBackend::new(&cfg.base_url, cfg.request_timeout)
}

/// Run the whole workflow without interaction and print the outcome.
async fn run_once(args: Cli, cfg: AppConfig) -> Result<()> {
    let source = args
        .source
        .clone()
        .context("--source is required with --json or --text")?;
    let script = HeadlessScript {
        source,
        temperature: None,
        candidate: args.candidate.as_deref().map(CandidateId::from),
        translation: args.translation.clone(),
        assist: args.assist,
    };

    let backend = build_backend(&cfg)?;
    let mut workflow = Workflow::new(cfg.policy, cfg.temperature);
    tracing::info!(base_url = %backend.base_url(), policy = ?cfg.policy, "starting headless run");

    let (out_tx, out_handle) = spawn_output_writer();
    let outcome = run_headless(&mut workflow, &backend, &script).await;

    let res = match outcome {
        Ok(run) => {
            if args.json {
                let out = serde_json::to_string_pretty(&run.summary)?;
                let _ = out_tx.send(OutputLine::Stdout(out));
                for note in &run.notes {
                    let _ = out_tx.send(OutputLine::Stderr(note.clone()));
                }
            } else {
                let summary = crate::text_summary::build_text_summary(&run, cfg.policy);
                for line in summary.lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            Ok(())
        }
        Err(e) => Err(e),
    };

    drop(out_tx);
    let _ = out_handle.await;
    res
}
