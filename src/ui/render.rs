use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::models::night::{MAX_QUALITY, SleepNight};
use crate::ui::adapter::{NightRow, QualityIcon};
use crate::ui::app::{App, AppState, GRID_COLUMNS};
use crate::ui::format;

const CELL_HEIGHT: u16 = 4;

pub fn draw(app: &App, f: &mut Frame) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(size);

    let status = match &app.state {
        AppState::SleepTracker { .. } => match app.tonight.borrow().as_ref() {
            Some(night) => format!(
                "Sleeping since {}",
                format::convert_long_to_date_string(night.start_time_milli, &Local)
            ),
            None => format!("Not tracking - {} nights recorded", app.adapter.item_count()),
        },
        AppState::SleepQuality { night_id } => format!("How was night #{}?", night_id),
        AppState::SleepDetail { night } => format!("Night #{}", night.night_id),
    };
    let status_widget = Paragraph::new(status)
        .block(Block::default().borders(Borders::ALL).title("🌙 Sleep Tracker"));
    f.render_widget(status_widget, chunks[0]);

    match &app.state {
        AppState::SleepTracker { selected, show_summary } => {
            if *show_summary {
                draw_summary(app, f, chunks[1]);
            } else {
                draw_grid(app.adapter.rows(), *selected, f, chunks[1]);
            }
        }
        AppState::SleepQuality { .. } => {
            draw_grid(app.adapter.rows(), usize::MAX, f, chunks[1]);
            draw_quality_popup(f, centered_rect(50, 60, chunks[1]));
        }
        AppState::SleepDetail { night } => draw_detail(night, f, chunks[1]),
    }

    f.render_widget(Paragraph::new(Line::from(key_hints(app))).block(Block::default().borders(Borders::ALL)), chunks[2]);

    if let Some((message, _)) = &app.snackbar {
        let snackbar = Paragraph::new(message.as_str()).style(Style::default().fg(Color::Black).bg(Color::Yellow));
        f.render_widget(snackbar, chunks[3]);
    }
}

fn key_hints(app: &App) -> Vec<Span<'static>> {
    let mut hints: Vec<&str> = Vec::new();
    match &app.state {
        AppState::SleepTracker { .. } => {
            if *app.start_button_visible.borrow() {
                hints.push("[s] Start");
            }
            if *app.stop_button_visible.borrow() {
                hints.push("[t] Stop");
            }
            if *app.clear_button_visible.borrow() {
                hints.push("[c] Clear");
            }
            hints.extend(["[←↑↓→] Select", "[Enter] Details", "[v] Summary", "[q] Quit"]);
        }
        AppState::SleepQuality { .. } => hints.extend(["[0-5] Rate", "[Esc] Skip"]),
        AppState::SleepDetail { .. } => hints.push("[Esc] Close"),
    }

    hints
        .into_iter()
        .enumerate()
        .flat_map(|(i, hint)| {
            let separator = if i == 0 { "" } else { "  " };
            [
                Span::raw(separator),
                Span::styled(hint, Style::default().fg(Color::Cyan)),
            ]
        })
        .collect()
}

fn draw_grid(rows: &[NightRow], selected: usize, f: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(format!("Nights ({})", rows.len()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if rows.is_empty() {
        let empty = Paragraph::new("No nights yet. Press [s] when you go to bed.")
            .style(Style::default().fg(Color::Gray));
        f.render_widget(empty, inner);
        return;
    }

    let visible_rows = ((inner.height / CELL_HEIGHT) as usize).max(1);
    let selected_row = if selected == usize::MAX { 0 } else { selected / GRID_COLUMNS };
    let first_row = selected_row.saturating_sub(visible_rows - 1);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(CELL_HEIGHT); visible_rows])
        .split(inner);

    for (line, chunk) in rows.chunks(GRID_COLUMNS).skip(first_row).take(visible_rows).enumerate() {
        let cell_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, GRID_COLUMNS as u32); GRID_COLUMNS])
            .split(row_areas[line]);

        for (column, row) in chunk.iter().enumerate() {
            let position = (first_row + line) * GRID_COLUMNS + column;
            draw_cell(row, position == selected, f, cell_areas[column]);
        }
    }
}

fn draw_cell(row: &NightRow, is_selected: bool, f: &mut Frame, area: Rect) {
    let border_style = if is_selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let lines = vec![
        Line::from(vec![
            Span::raw(format!("{} ", row.icon.glyph())),
            Span::styled(row.quality_text.clone(), Style::default().fg(row.icon.color())),
        ]),
        Line::from(row.duration_text.clone()),
    ];
    let cell = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!("#{}", row.night_id)),
    );
    f.render_widget(cell, area);
}

fn draw_summary(app: &App, f: &mut Frame, area: Rect) {
    let text = app.nights_string.borrow().clone();
    let summary = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Summary"));
    f.render_widget(summary, area);
}

fn draw_quality_popup(f: &mut Frame, area: Rect) {
    f.render_widget(Clear, area);
    let mut lines = vec![Line::from("")];
    for quality in 0..=MAX_QUALITY {
        let icon = QualityIcon::from_rating(quality);
        lines.push(Line::from(vec![
            Span::styled(format!("  [{}] ", quality), Style::default().fg(Color::Cyan)),
            Span::raw(format!("{} ", icon.glyph())),
            Span::styled(
                format::convert_numeric_quality_to_string(quality),
                Style::default().fg(icon.color()),
            ),
        ]));
    }
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("How did you sleep?")
            .style(Style::default().bg(Color::Black)),
    );
    f.render_widget(popup, area);
}

fn draw_detail(night: &SleepNight, f: &mut Frame, area: Rect) {
    let icon = QualityIcon::from_rating(night.sleep_quality_rating);
    let end = if night.is_open() {
        "still sleeping".to_string()
    } else {
        format::convert_long_to_date_string(night.end_time_milli, &Local)
    };
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw(format!("  {} ", icon.glyph())),
            Span::styled(
                if night.is_rated() {
                    format::convert_numeric_quality_to_string(night.sleep_quality_rating)
                } else {
                    "Not rated yet"
                },
                Style::default().fg(icon.color()).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(format!(
            "  {}",
            format::convert_duration_to_formatted(night.start_time_milli, night.end_time_milli, &Local)
        )),
        Line::from(format!(
            "  Start: {}",
            format::convert_long_to_date_string(night.start_time_milli, &Local)
        )),
        Line::from(format!("  End:   {}", end)),
    ];
    let detail = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Sleep details"));
    f.render_widget(detail, centered_rect(70, 60, area));
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
