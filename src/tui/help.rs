use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

fn key_line(key: &str, pad: usize, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:width$}{what}", "", width = pad)),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Anywhere:"),
        key_line("Ctrl-C", 6, "Quit"),
        key_line("Ctrl-R", 6, "Start over"),
        key_line("F1", 10, "Toggle this help"),
        key_line("Esc", 9, "Go back a step"),
        Line::from(""),
        Line::from("Source sentence:"),
        key_line("←/→", 9, "Adjust creativity (temperature)"),
        key_line("Enter", 7, "Simplify"),
        Line::from(""),
        Line::from("Choose a rewrite:"),
        key_line("↑/↓", 9, "Move"),
        key_line("Space", 7, "Select highlighted rewrite"),
        key_line("Enter", 7, "Continue with the selection"),
        Line::from(""),
        Line::from("Translate:"),
        key_line("Ctrl-A", 6, "Ask the AI for a hint"),
        key_line("Ctrl-E", 6, "Evaluate your translation"),
        key_line("Enter", 7, "Submit"),
        Line::from(""),
        Line::from("Review:"),
        key_line("y", 11, "Copy summary to clipboard"),
        key_line("r", 11, "Start over"),
        key_line("q", 11, "Quit"),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
