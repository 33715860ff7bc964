use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget},
};

use crate::session::Phase;
use crate::timer::StudyTimer;
use crate::util::{format_time, format_totals};

const HORIZONTAL_MARGIN: u16 = 2;

/// Read-only view over the engine for one frame. Everything displayed is
/// recomputed from `now_ms`; nothing here mutates the timer.
pub struct TimerView<'a> {
    pub timer: &'a StudyTimer,
    pub presets: &'a [u64],
    pub now_ms: i64,
}

impl Widget for &TimerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(1)
            .constraints(
                [
                    Constraint::Length(3), // presets
                    Constraint::Min(5),    // countdown
                    Constraint::Length(3), // progress
                    Constraint::Length(2), // controls
                    Constraint::Length(4), // totals
                ]
                .as_ref(),
            )
            .split(area);

        render_presets(self, chunks[0], buf);
        render_countdown(self, chunks[1], buf);
        render_progress(self, chunks[2], buf);
        render_controls(self, chunks[3], buf);
        render_totals(self, chunks[4], buf);
    }
}

fn render_presets(view: &TimerView, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut spans: Vec<Span> = vec![Span::styled("Presets: ", dim)];
    for (idx, minutes) in view.presets.iter().enumerate() {
        let selected = view.timer.state.target_seconds == minutes * 60
            && view.timer.state.phase != Phase::Idle;
        let label = format!("[{}] {}m", idx + 1, minutes);
        spans.push(if selected {
            Span::styled(label, bold.fg(Color::Cyan))
        } else {
            Span::styled(label, dim)
        });
        spans.push(Span::raw("  "));
    }

    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM))
        .render(area, buf);
}

fn render_countdown(view: &TimerView, area: Rect, buf: &mut Buffer) {
    let state = &view.timer.state;
    let remaining = state.remaining_seconds(view.now_ms);
    let elapsed = state.elapsed_seconds(view.now_ms);

    let (headline, style) = match state.phase {
        Phase::Idle => (
            "select a duration".to_string(),
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        ),
        Phase::Completed => (
            "session complete".to_string(),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        _ => (
            format!("{} remaining", format_time(remaining)),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    };

    let phase_color = match state.phase {
        Phase::Running => Color::Green,
        Phase::Paused => Color::Yellow,
        Phase::Completed => Color::Green,
        _ => Color::Gray,
    };

    let lines = vec![
        Line::from(Span::styled(headline, style)),
        Line::from(""),
        Line::from(vec![
            Span::styled(state.phase.to_string(), Style::default().fg(phase_color)),
            Span::styled(
                format!("  ·  {} elapsed", format_time(elapsed)),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]),
    ];

    // Vertically center the countdown block.
    let pad = area.height.saturating_sub(lines.len() as u16) / 2;
    let inner = Rect {
        y: area.y + pad,
        height: area.height.saturating_sub(pad),
        ..area
    };

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(inner, buf);
}

fn render_progress(view: &TimerView, area: Rect, buf: &mut Buffer) {
    let state = &view.timer.state;
    if state.target_seconds == 0 {
        return;
    }

    let elapsed = state.elapsed_seconds(view.now_ms);
    let ratio = (elapsed as f64 / state.target_seconds as f64).clamp(0.0, 1.0);

    Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{:.0}%", ratio * 100.0))
        .render(area, buf);
}

fn render_controls(view: &TimerView, area: Rect, buf: &mut Buffer) {
    let action = match view.timer.state.phase {
        Phase::Idle => "select duration",
        Phase::Armed => "start",
        Phase::Running => "pause",
        Phase::Paused => "resume",
        Phase::Completed => "start new session",
    };

    Paragraph::new(format!(
        "(space) {}   (1-{}) preset   (r)eset   (q)uit",
        action,
        view.presets.len().max(1)
    ))
    .alignment(Alignment::Center)
    .style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC))
    .render(area, buf);
}

fn render_totals(view: &TimerView, area: Rect, buf: &mut Buffer) {
    let totals = &view.timer.totals;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(33),
                Constraint::Percentage(34),
                Constraint::Percentage(33),
            ]
            .as_ref(),
        )
        .split(area);

    let cell = |title: &str, value: String| {
        Paragraph::new(vec![
            Line::from(Span::styled(
                title.to_string(),
                Style::default().add_modifier(Modifier::DIM),
            )),
            Line::from(Span::styled(
                value,
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP))
    };

    cell("Today", format_totals(totals.daily_seconds)).render(chunks[0], buf);
    cell("Week", format_totals(totals.weekly_seconds)).render(chunks[1], buf);
    cell("Sessions", totals.sessions_completed.to_string()).render(chunks[2], buf);
}
