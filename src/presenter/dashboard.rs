//! Terminal dashboard for the latest [`ViewModel`].

use std::io::{stdout, Stdout};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    cursor, execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table};
use ratatui::{Frame, Terminal};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::{ViewReceiver, WindowHandle};
use crate::domain::{HourlySample, ViewModel, PLACEHOLDER};

const INPUT_POLL: Duration = Duration::from_millis(100);

/// RAII helper controlling the terminal lifecycle
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        enable_raw_mode().context("enabling raw mode")?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)
            .context("entering alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, view: Option<&ViewModel>) -> Result<()> {
        self.terminal.draw(|frame| draw(frame, view))?;
        Ok(())
    }

    /// Restore terminal to canonical mode
    pub fn restore(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(stdout(), cursor::Show, LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Errors are unreportable here; restore() already ran on the normal path
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), cursor::Show, LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputAction {
    None,
    Redraw,
    Close,
}

/// Redraw whenever a new view is published until the window closes, the
/// user quits, or the publisher goes away. Leaving closes the window so the
/// refresh loop stops with it.
pub async fn run(views: ViewReceiver, window: WindowHandle) -> Result<()> {
    let mut tui = Tui::new().context("initialising terminal")?;
    let result = drive(&mut tui, views, &window).await;
    window.close_window();
    tui.restore().context("restoring terminal")?;
    result
}

async fn drive(tui: &mut Tui, mut views: ViewReceiver, window: &WindowHandle) -> Result<()> {
    let mut current: Option<Arc<ViewModel>> = views.borrow_and_update().clone();
    tui.draw(current.as_deref())?;

    let mut input = interval(INPUT_POLL);
    input.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = window.closed() => return Ok(()),
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                current = views.borrow_and_update().clone();
                tui.draw(current.as_deref())?;
            }
            _ = input.tick() => match poll_input()? {
                InputAction::Close => return Ok(()),
                InputAction::Redraw => tui.draw(current.as_deref())?,
                InputAction::None => {}
            },
        }
    }
}

/// Drain pending terminal events without blocking
fn poll_input() -> Result<InputAction> {
    let mut action = InputAction::None;
    while event::poll(Duration::ZERO)? {
        match event::read()? {
            Event::Key(key) if is_close_key(&key) => return Ok(InputAction::Close),
            Event::Resize(_, _) => action = InputAction::Redraw,
            _ => {}
        }
    }
    Ok(action)
}

/// `q`, Esc, or Ctrl+C (raw mode swallows SIGINT)
fn is_close_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Full dashboard; `None` draws the placeholder screen shown before the
/// first successful refresh.
pub fn draw(frame: &mut Frame<'_>, view: Option<&ViewModel>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Min(3),
        ])
        .split(frame.size());

    render_header(frame, chunks[0], view);
    render_stats(frame, chunks[1], view);
    match view {
        Some(view) => {
            render_trajectory(frame, chunks[2], &view.hourly_series);
            render_hourly(frame, chunks[3], &view.hourly_series);
        }
        None => render_waiting(frame, chunks[2].union(chunks[3])),
    }
}

fn render_header(frame: &mut Frame<'_>, area: Rect, view: Option<&ViewModel>) {
    let line = match view {
        Some(view) => Line::from(vec![
            Span::styled("Last Update: ", Style::default().fg(Color::Gray)),
            Span::raw(view.fetched_at_local_time.clone()),
        ]),
        None => Line::from(Span::styled(
            "Price Analytics // Connecting...",
            Style::default().fg(Color::Yellow),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_stats(frame: &mut Frame<'_>, area: Rect, view: Option<&ViewModel>) {
    let block = Block::default().title(" Current Rate ").borders(Borders::ALL);
    let placeholder = PLACEHOLDER.to_string();
    let (current_rate, current_mwh) = view
        .map(|v| (&v.current_rate_cents, &v.current_price_per_mwh))
        .unwrap_or((&placeholder, &placeholder));

    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{current_rate} c/kWh"),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  ({current_mwh} €/MWh)")),
    ])];

    if let Some(view) = view {
        lines.push(Line::default());
        for (label, rate, mwh) in [
            ("Minimum", &view.min_rate_cents, &view.min_price_per_mwh),
            ("Average", &view.avg_rate_cents, &view.avg_price_per_mwh),
            ("Maximum", &view.max_rate_cents, &view.max_price_per_mwh),
        ] {
            lines.push(Line::from(vec![
                Span::styled(format!("{label:<8}"), Style::default().fg(Color::Gray)),
                Span::raw(format!("{rate:>8} c/kWh  {mwh:>9} €/MWh")),
            ]));
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Sparkline heights in hundredths of a cent, lifted so the lowest
/// negative rate sits on the baseline
fn trajectory_points(series: &[HourlySample]) -> Vec<u64> {
    let floor = series
        .iter()
        .map(|s| s.rate_cents)
        .fold(0.0_f64, f64::min);
    series
        .iter()
        .map(|s| ((s.rate_cents - floor) * 100.0).round() as u64)
        .collect()
}

fn render_trajectory(frame: &mut Frame<'_>, area: Rect, series: &[HourlySample]) {
    let block = Block::default()
        .title(" 24h Market Trajectory (c/kWh) ")
        .borders(Borders::ALL);
    let points = trajectory_points(series);
    let sparkline = Sparkline::default()
        .block(block)
        .data(&points)
        .style(Style::default().fg(Color::LightCyan));
    frame.render_widget(sparkline, area);
}

fn render_hourly(frame: &mut Frame<'_>, area: Rect, series: &[HourlySample]) {
    let rows = series.iter().map(|s| {
        let style = if s.rate_cents < 0.0 {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(s.hour_label.clone()),
            Cell::from(format!("{:>8}", s.rate_display)),
            Cell::from(format!("{:>9} €/MWh", s.price_display)),
        ])
        .style(style)
    });
    let widths = [
        Constraint::Length(6),
        Constraint::Length(9),
        Constraint::Length(16),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["Hour", "   c/kWh", "   €/MWh"])
                .style(Style::default().fg(Color::Gray)),
        )
        .block(Block::default().title(" Hourly ").borders(Borders::ALL))
        .column_spacing(1);
    frame.render_widget(table, area);
}

fn render_waiting(frame: &mut Frame<'_>, area: Rect) {
    let placeholder = Paragraph::new("Waiting for the first price refresh")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(placeholder, area);
}
