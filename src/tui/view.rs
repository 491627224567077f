use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::shared::DisplayState;

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // transport / status
            Constraint::Min(10),   // instrument grid
        ])
        .split(area);

    draw_status(frame, sections[0], state);
    draw_grid(frame, sections[1], state);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let transport = if state.playing { "▶ playing" } else { "■ stopped" };
    let pad = if state.device_available {
        Span::styled("pad connected", Style::default().fg(Color::Green))
    } else {
        Span::styled("no pad (silent)", Style::default().fg(Color::Yellow))
    };
    let preset = state.preset_name.as_deref().unwrap_or("-");

    let lines = vec![
        Line::from(vec![
            Span::styled(transport, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                "   {} bpm   {} steps   loop {}   preset: {preset}",
                state.bpm, state.total_steps, state.loop_count
            )),
        ]),
        Line::from(vec![
            Span::raw(format!(
                "intensity {:.1}/{:.1}   effects in flight: {}   ",
                state.global_intensity.0, state.global_intensity.1, state.active_effects
            )),
            pad,
        ]),
    ];

    let block = Block::default().borders(Borders::ALL).title("rumbleseq");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_grid(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut lines = Vec::with_capacity(state.rows.len());

    for (row_idx, (name, steps)) in state.rows.iter().enumerate() {
        let mut spans = vec![Span::styled(
            format!("{name:>7} "),
            Style::default().fg(Color::Cyan),
        )];
        for (step_idx, &on) in steps.iter().enumerate() {
            if step_idx > 0 && step_idx % 4 == 0 {
                spans.push(Span::raw(" ")); // beat grouping
            }
            let mut style = if on {
                Style::default().fg(Color::Magenta)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            if state.playing_step == Some(step_idx) {
                style = style.bg(Color::Blue);
            }
            if state.cursor == (row_idx, step_idx) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(if on { "██" } else { "··" }, style));
        }
        lines.push(Line::from(spans));
    }

    let block = Block::default().borders(Borders::ALL).title("pattern");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
