//! Main UI layout and rendering.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::action::View;
use crate::app::App;
use crate::library::track::format_duration;
use crate::player::PlayState;

/// Render the entire UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let mut constraints = vec![
        Constraint::Min(8),    // Track table (+ lyrics panel)
        Constraint::Length(4), // Now playing
        Constraint::Length(1), // Status line
    ];
    if app.input.active {
        constraints.insert(0, Constraint::Length(3));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if app.input.active {
        render_input(frame, chunks[next], app);
        next += 1;
    }

    let show_lyrics = app.lyrics_visible && !app.lyrics.is_empty();
    if show_lyrics {
        let content = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[next]);
        render_tracks(frame, content[0], app);
        render_lyrics(frame, content[1], app);
    } else {
        render_tracks(frame, chunks[next], app);
    }

    render_now_playing(frame, chunks[next + 1], app);
    render_status(frame, chunks[next + 2], app);
}

/// Render the input box.
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.input.mode {
        crate::action::InputMode::LocalFilter => "Filter library",
        crate::action::InputMode::OnlineSearch => "Search online",
        crate::action::InputMode::NewPlaylist => "New playlist",
    };

    let input = Paragraph::new(format!("{}\u{2588}", app.input.query)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(input, area);
}

/// Render the track table for the current view.
fn render_tracks(frame: &mut Frame, area: Rect, app: &App) {
    let title = match &app.view {
        View::Library => "Library".to_string(),
        View::SearchResults => "Search Results".to_string(),
        View::Playlist(name) => format!("Playlist: {name}"),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Blue));

    if app.rows.is_empty() {
        let empty = Paragraph::new("  (empty)")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let playing_id = app
        .controller
        .session()
        .current()
        .map(|t| t.id.clone());

    let rows: Vec<Row> = app
        .rows
        .iter()
        .map(|track| {
            let marker = if track.is_remote() { "☁" } else { " " };
            let duration = track
                .duration
                .map(format_duration)
                .unwrap_or_else(|| "--:--".to_string());

            let title_style = if playing_id.as_ref() == Some(&track.id) {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            Row::new(vec![
                Cell::from(marker).style(Style::default().fg(Color::DarkGray)),
                Cell::from(track.title.clone()).style(title_style),
                Cell::from(track.artist.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(track.album.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(duration).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),      // Source marker
            Constraint::Percentage(45), // Title
            Constraint::Percentage(30), // Artist
            Constraint::Percentage(25), // Album
            Constraint::Length(6),      // Duration
        ],
    )
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray));

    let mut table_state = TableState::default();
    table_state.select(Some(app.selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Render the lyrics panel with the current line highlighted.
fn render_lyrics(frame: &mut Frame, area: Rect, app: &App) {
    let elapsed = app.progress.elapsed as f32;
    let current = app
        .lyrics
        .iter()
        .rposition(|(ts, _)| *ts <= elapsed)
        .unwrap_or(0);

    let inner_height = area.height.saturating_sub(2) as usize;
    let first = current.saturating_sub(inner_height / 2);

    let lines: Vec<Line> = app
        .lyrics
        .iter()
        .enumerate()
        .skip(first)
        .take(inner_height)
        .map(|(i, (_, text))| {
            let style = if i == current {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(text.clone(), style))
        })
        .collect();

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Lyrics")
            .border_style(Style::default().fg(Color::Blue)),
    );
    frame.render_widget(panel, area);
}

/// Render the now playing bar: track line and a progress gauge.
fn render_now_playing(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let state_symbol = match app.progress.state {
        PlayState::Playing => "▶",
        PlayState::Paused => "⏸",
        PlayState::Loading => "…",
        PlayState::Idle => "■",
    };
    let mode_symbol = app.controller.session().mode().symbol();

    let lyric = crate::lyrics::line_at(&app.lyrics, app.progress.elapsed as f32);

    let track_line = match app.controller.session().current() {
        Some(track) => Line::from(vec![
            Span::styled(
                format!("{state_symbol} "),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                track.title.clone(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" - {}", track.artist),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(format!("  {mode_symbol}"), Style::default().fg(Color::Yellow)),
            Span::styled(
                lyric.map(|l| format!("  ♪ {l}")).unwrap_or_default(),
                Style::default().fg(Color::Magenta),
            ),
        ]),
        None => Line::from(vec![
            Span::styled(
                format!("{state_symbol} "),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled("nothing playing", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("  {mode_symbol}"), Style::default().fg(Color::Yellow)),
        ]),
    };
    frame.render_widget(Paragraph::new(track_line), rows[0]);

    let elapsed = app.progress.elapsed;
    let label = match app.progress.duration {
        Some(duration) => format!(
            "{} / {}",
            format_duration(elapsed),
            format_duration(duration)
        ),
        None => format_duration(elapsed),
    };
    let ratio = match app.progress.duration {
        Some(duration) if duration > 0 => (elapsed as f64 / duration as f64).min(1.0),
        _ => 0.0,
    };

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, rows[1]);
}

/// Render the status line: message on the left, active downloads on the right.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let status = Paragraph::new(app.status.as_deref().unwrap_or(""))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, chunks[0]);

    if !app.downloads.is_empty() {
        let parts: Vec<String> = app
            .downloads
            .iter()
            .map(|d| {
                let total = d.progress.total();
                if total > 0 {
                    let pct = d.progress.bytes() * 100 / total;
                    format!("↓ {} {pct}%", d.title)
                } else {
                    format!("↓ {}", d.title)
                }
            })
            .collect();
        let downloads = Paragraph::new(parts.join("  "))
            .style(Style::default().fg(Color::Magenta))
            .right_aligned();
        frame.render_widget(downloads, chunks[1]);
    }
}
