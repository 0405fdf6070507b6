mod export;
mod help;
mod state;

use crate::config::AppConfig;
use crate::model::{temperature_band, Stage, Trigger, NO_EVALUATION, NO_SUGGESTION};
use crate::workflow::{self, UiCommand, Workflow, WorkflowEvent};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{apply_action, apply_event, map_key, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub async fn run(cfg: AppConfig) -> Result<()> {
    let log_path = crate::telemetry::init_file(&cfg.log_level)?;
    let backend = crate::cli::build_backend(&cfg)?;
    tracing::info!(base_url = %backend.base_url(), policy = ?cfg.policy, "starting tui");

    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let mut ui_state = UiState::new(cfg.policy, cfg.temperature);
    ui_state.log_path = Some(log_path);
    let ui_handle = std::thread::spawn(move || run_threaded(ui_state, event_rx, cmd_tx));

    let workflow = Workflow::new(cfg.policy, cfg.temperature);
    let finished = workflow::run_controller(workflow, Arc::new(backend), event_tx, cmd_rx).await;
    tracing::info!(stage = ?finished.stage(), "controller stopped");

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(action) = map_key(&state, k) else {
                    continue;
                };
                match apply_action(&mut state, action) {
                    Some(cmds) => {
                        for cmd in cmds {
                            let _ = cmd_tx.send(cmd);
                        }
                    }
                    None => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let stages = [Stage::Input, state.snapshot.policy.review_stage(), Stage::Translate, Stage::Final];
    let selected = stages.iter().position(|s| *s == state.stage()).unwrap_or(0);
    let tabs = Tabs::new(stages.iter().map(|s| Line::from(s.title())).collect::<Vec<_>>())
        .select(selected)
        .block(Block::default().borders(Borders::ALL).title("rewrite-tutor"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.stage() {
        Stage::Input => draw_input(chunks[1], f, state),
        Stage::Select => draw_select(chunks[1], f, state),
        Stage::Confirm => draw_confirm(chunks[1], f, state),
        Stage::Translate => draw_translate(chunks[1], f, state),
        Stage::Final => draw_final(chunks[1], f, state),
    }

    draw_status(chunks[2], f, state);

    if state.confirm_empty {
        draw_confirm_dialog(centered(area, 50, 7), f);
    }
    if state.show_help {
        help::draw_help(centered(area, 60, 30), f);
    }
}

fn bordered(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(title)
}

fn busy_marker(state: &UiState, trigger: Trigger) -> Option<String> {
    state
        .snapshot
        .is_busy(trigger)
        .then(|| format!("{} working…", SPINNER[state.tick % SPINNER.len()]))
}

fn draw_input(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3), Constraint::Length(3)])
        .split(area);

    let title = match busy_marker(state, Trigger::Simplify) {
        Some(m) => format!("Japanese sentence ({m})"),
        None => "Japanese sentence".to_string(),
    };
    let input = Paragraph::new(format!("{}_", state.source_input))
        .wrap(Wrap { trim: false })
        .block(bordered(&title));
    f.render_widget(input, chunks[0]);

    let t = state.snapshot.session.temperature;
    let band = temperature_band(t);
    let gauge = Gauge::default()
        .block(bordered("Creativity (←/→)"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(t.clamp(0.0, 1.0))
        .label(format!("{t:.1}  {}", band.label));
    f.render_widget(gauge, chunks[1]);

    let desc = Paragraph::new(band.description)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(desc, chunks[2]);
}

fn draw_select(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let session = &state.snapshot.session;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let original = Paragraph::new(session.original_text.as_str())
        .wrap(Wrap { trim: false })
        .block(bordered("Original"));
    f.render_widget(original, chunks[0]);

    if session.candidates.is_empty() {
        let p = Paragraph::new("No candidates were generated. Press Esc to try again.")
            .style(Style::default().fg(Color::Yellow))
            .block(bordered("Rewrites"));
        f.render_widget(p, chunks[1]);
        return;
    }

    let items: Vec<ListItem> = session
        .candidates
        .iter()
        .map(|c| {
            let chosen = session.selected_candidate.as_ref() == Some(&c.id);
            let marker = if chosen { "(•)" } else { "( )" };
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("{marker} {}. ", c.id),
                    Style::default().fg(Color::Magenta),
                ),
                Span::raw(c.text.clone()),
            ])];
            if !c.explanation.trim().is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("      {}", c.explanation),
                    Style::default().fg(Color::Gray),
                )));
            }
            ListItem::new(Text::from(lines))
        })
        .collect();

    let list = List::new(items)
        .block(bordered("Rewrites (Space select, Enter continue)"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut list_state = ListState::default();
    list_state.select(Some(state.cursor));
    f.render_stateful_widget(list, chunks[1], &mut list_state);
}

fn draw_confirm(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let session = &state.snapshot.session;
    let mut lines = vec![
        Line::from(Span::styled("Original", Style::default().fg(Color::Gray))),
        Line::from(session.original_text.clone()),
        Line::from(""),
        Line::from(Span::styled("Simplified", Style::default().fg(Color::Gray))),
        Line::from(Span::styled(
            session.simplified_text.clone(),
            Style::default().fg(Color::Green),
        )),
    ];
    if let Some(score) = session.simplified_score {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Translatability: {score}/100")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("Enter to continue, Esc to go back"));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(bordered("Simplified sentence"));
    f.render_widget(p, area);
}

fn draw_translate(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let session = &state.snapshot.session;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let source = Paragraph::new(session.simplified_text.as_str())
        .wrap(Wrap { trim: false })
        .block(bordered("Translate this"));
    f.render_widget(source, rows[0]);

    let editor = Paragraph::new(format!("{}_", state.translation_input))
        .wrap(Wrap { trim: false })
        .block(bordered("Your translation (Enter submit)"));
    f.render_widget(editor, rows[1]);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[2]);

    let hint = match busy_marker(state, Trigger::Assist) {
        Some(m) => m,
        None => session
            .ai_suggestion
            .clone()
            .unwrap_or_else(|| NO_SUGGESTION.to_string()),
    };
    let assist = Paragraph::new(hint)
        .wrap(Wrap { trim: false })
        .block(bordered("AI hint (Ctrl-A)"));
    f.render_widget(assist, panels[0]);

    let verdict = match busy_marker(state, Trigger::Evaluate) {
        Some(m) => m,
        None => session
            .evaluation
            .as_ref()
            .map(|e| e.to_display())
            .unwrap_or_else(|| NO_EVALUATION.to_string()),
    };
    let evaluation = Paragraph::new(verdict)
        .wrap(Wrap { trim: false })
        .block(bordered("Evaluation (Ctrl-E)"));
    f.render_widget(evaluation, panels[1]);
}

fn draw_final(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let Some(summary) = state.snapshot.session.final_summary.as_ref() else {
        let p = Paragraph::new("Nothing submitted yet.").block(bordered("Review"));
        f.render_widget(p, area);
        return;
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(40),
        ])
        .split(area);

    let blocks = [
        ("Original", summary.original.as_str()),
        ("Simplified", summary.simplified.as_str()),
        ("Your translation", summary.learner_translation.as_str()),
    ];
    for (i, (title, body)) in blocks.into_iter().enumerate() {
        let p = Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .block(bordered(title));
        f.render_widget(p, rows[i]);
    }

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[3]);
    let eval = Paragraph::new(summary.evaluation.as_str())
        .wrap(Wrap { trim: false })
        .block(bordered("Evaluation"));
    f.render_widget(eval, bottom[0]);
    let hint = Paragraph::new(summary.ai_suggestion.as_str())
        .wrap(Wrap { trim: false })
        .block(bordered("AI suggestion"));
    f.render_widget(hint, bottom[1]);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let keys = match state.stage() {
        Stage::Input => "Enter simplify · ←/→ creativity · F1 help · Ctrl-C quit",
        Stage::Select => "↑/↓ move · Space select · Enter continue · Esc back · ? help",
        Stage::Confirm => "Enter continue · Esc back · ? help",
        Stage::Translate => "Ctrl-A hint · Ctrl-E evaluate · Enter submit · Esc back",
        Stage::Final => "y copy · r restart · q quit",
    };
    let mut spans = Vec::new();
    if !state.info.is_empty() {
        let color = if state.info_is_error {
            Color::Red
        } else {
            Color::Green
        };
        spans.push(Span::styled(state.info.clone(), Style::default().fg(color)));
        spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(keys, Style::default().fg(Color::Gray)));

    let title = match &state.log_path {
        Some(p) => format!("log: {}", p.display()),
        None => String::new(),
    };
    let p = Paragraph::new(Line::from(spans)).block(bordered(&title));
    f.render_widget(p, area);
}

fn draw_confirm_dialog(area: Rect, f: &mut ratatui::Frame) {
    let p = Paragraph::new(vec![
        Line::from("Your translation is empty."),
        Line::from("Submit anyway?"),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Magenta)),
            Span::raw(" submit   "),
            Span::styled("n", Style::default().fg(Color::Magenta)),
            Span::raw(" keep editing"),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Confirm")
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}

/// Rectangle of at most `width` x `height` centred in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
