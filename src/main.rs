use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
    Paragraph, Row, Table, TableState, Tabs,
};

use tibia_tracker::config::TrackerConfig;
use tibia_tracker::demo_feed::DemoGateway;
use tibia_tracker::format::{
    DisplayLocale, format_date, format_exp, format_exp_f64, format_gain, format_number,
    format_short_date, format_time,
};
use tibia_tracker::gateway::HttpGateway;
use tibia_tracker::nav::{self, NavAction, Tab};
use tibia_tracker::state::{AppState, Delta, ProviderCommand, apply_delta, history_summary};
use tibia_tracker::sync::{CollectionRequest, SyncHandle, SyncScheduler};

struct App {
    state: AppState,
    should_quit: bool,
    sync: SyncHandle,
}

impl App {
    fn new(sync: SyncHandle, locale: DisplayLocale) -> Self {
        Self {
            state: AppState::with_locale(locale),
            should_quit: false,
            sync,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.navigate(NavAction::SelectTab(Tab::Ranking)),
            KeyCode::Char('2') => self.navigate(NavAction::SelectTab(Tab::Gains)),
            KeyCode::Char('3') => self.navigate(NavAction::SelectTab(Tab::TopGainers)),
            KeyCode::Char('4') => self.navigate(NavAction::SelectTab(Tab::PlayerHistory)),
            KeyCode::Tab => self.navigate(NavAction::NextTab),
            KeyCode::Char('j') | KeyCode::Down => self.navigate(NavAction::CursorNext),
            KeyCode::Char('k') | KeyCode::Up => self.navigate(NavAction::CursorPrev),
            KeyCode::Enter => self.navigate(NavAction::SelectCursorPlayer),
            KeyCode::Char('b') | KeyCode::Esc => self.navigate(NavAction::Back),
            KeyCode::Char('c') | KeyCode::Char('C') => self.trigger_collection(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.refresh_now(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn navigate(&mut self, action: NavAction) {
        if action == NavAction::SelectTab(Tab::PlayerHistory)
            && !nav::can_enter(&self.state, Tab::PlayerHistory)
        {
            self.state.push_log("[INFO] Select a player first");
            return;
        }
        if let Some(cmd) = nav::navigate(&mut self.state, action) {
            self.send(cmd);
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        if !self.sync.send(cmd) {
            self.state.push_log("[WARN] Sync worker unavailable");
        }
    }

    fn refresh_now(&mut self) {
        if self.sync.refresh_now() {
            self.state.push_log("[INFO] Refresh requested");
        } else {
            self.state.push_log("[WARN] Sync worker unavailable");
        }
    }

    fn trigger_collection(&mut self) {
        let line = match self.sync.trigger_manual_collection(&mut self.state) {
            CollectionRequest::Started => "[INFO] Manual collection requested",
            CollectionRequest::AlreadyRunning => "[INFO] Collection already running",
            CollectionRequest::WorkerUnavailable => "[WARN] Sync worker unavailable",
        };
        self.state.push_log(line);
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = TrackerConfig::from_env();
    let (tx, rx) = mpsc::channel();
    let sync = if config.demo {
        SyncScheduler::start(DemoGateway::new(), config.clone(), tx)
    } else {
        SyncScheduler::start(HttpGateway::new(&config)?, config.clone(), tx)
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(sync, config.locale);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.sync.stop();
    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, &app.state))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_tabs(frame, chunks[1], state);

    if nav::show_empty_state(state) {
        render_empty_state(frame, chunks[2], state);
    } else {
        match state.tab {
            Tab::Ranking => render_ranking(frame, chunks[2], state),
            Tab::Gains => render_gains(frame, chunks[2], state),
            Tab::TopGainers => render_top_gainers(frame, chunks[2], state),
            Tab::PlayerHistory => render_history(frame, chunks[2], state),
        }
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[4]);

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let updated = state
        .last_update
        .as_ref()
        .map(|at| format!("Last update: {}", format_time(at, state.locale)))
        .unwrap_or_else(|| "Waiting for first refresh".to_string());
    let busy = if state.collecting {
        " | Collecting data..."
    } else {
        ""
    };
    format!("TIBIA TRACKER | {updated}{busy}")
}

fn footer_text(state: &AppState) -> String {
    match state.tab {
        Tab::PlayerHistory => {
            "1-4 Tabs | Tab Next | b/Esc Back | r Refresh | c Collect | ? Help | q Quit".to_string()
        }
        _ => "1-4 Tabs | Tab Next | j/k/↑/↓ Move | Enter History | r Refresh | c Collect | ? Help | q Quit"
            .to_string(),
    }
}

fn render_tabs(frame: &mut Frame, area: Rect, state: &AppState) {
    let tabs = nav::available_tabs(state);
    let titles: Vec<String> = tabs
        .iter()
        .map(|tab| match (tab, state.selected_player.as_deref()) {
            (Tab::PlayerHistory, Some(player)) => format!("{} - {player}", tab.label()),
            _ => tab.label().to_string(),
        })
        .collect();
    let selected = tabs.iter().position(|tab| *tab == state.tab).unwrap_or(0);
    let widget = Tabs::new(titles)
        .select(selected)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(widget, area);
}

fn render_empty_state(frame: &mut Frame, area: Rect, state: &AppState) {
    let action = if state.collecting {
        "Collecting data..."
    } else {
        "Press c to run the first data collection."
    };
    let text = format!("No data available\n\n{action}");
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().title(state.tab.label()).borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn bold_header(cells: &[&'static str]) -> Row<'static> {
    Row::new(cells.iter().map(|c| Cell::from(*c)))
        .style(Style::default().add_modifier(Modifier::BOLD))
}

fn cursor_table_state(state: &AppState) -> TableState {
    let mut table_state = TableState::default();
    table_state.select(Some(state.cursor));
    table_state
}

fn highlight_style() -> Style {
    Style::default().fg(Color::White).bg(Color::DarkGray)
}

fn render_ranking(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows: Vec<Row> = nav::ranking_rows(state)
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(format!("#{}", entry.rank)),
                Cell::from(entry.name.clone()),
                Cell::from(entry.level.to_string()).style(Style::default().fg(Color::Green)),
                Cell::from(format_exp(Some(entry.experience))),
                Cell::from(entry.vocation_label().to_string())
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(18),
        ],
    )
    .header(bold_header(&["Rank", "Name", "Level", "Exp", "Vocation"]))
    .block(
        Block::default()
            .title(format!("Top {} Players", state.ranking.len()))
            .borders(Borders::ALL),
    )
    .highlight_style(highlight_style())
    .highlight_symbol("> ");

    let mut table_state = cursor_table_state(state);
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn render_gains(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let rows: Vec<Row> = nav::gains_rows(state)
        .into_iter()
        .map(|gain| {
            let today_style = if gain.exp_gained_today > 0 {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new(vec![
                Cell::from(format!("#{}", gain.rank)),
                Cell::from(gain.name.clone()),
                Cell::from(gain.current_level.to_string()),
                Cell::from(format_exp(Some(gain.current_experience))),
                Cell::from(format_gain(gain.exp_gained_today)).style(today_style),
                Cell::from(format!("+{}", gain.level_gained_today)).style(today_style),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(16),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(6),
        ],
    )
    .header(bold_header(&["Rank", "Name", "Level", "Exp", "Today", "Lvls"]))
    .block(Block::default().title("Today's Gains").borders(Borders::ALL))
    .highlight_style(highlight_style())
    .highlight_symbol("> ");

    let mut table_state = cursor_table_state(state);
    frame.render_stateful_widget(table, columns[0], &mut table_state);

    let bars: Vec<Bar> = nav::gains_chart(state)
        .into_iter()
        .map(|gain| {
            Bar::default()
                .value(gain.exp_gained_today.max(0) as u64)
                .label(Line::from(gain.name.clone()))
                .text_value(format_exp(Some(gain.exp_gained_today)))
                .style(Style::default().fg(Color::Blue))
        })
        .collect();
    let chart = BarChart::default()
        .block(
            Block::default()
                .title(format!("Top {} Exp Today", nav::GAINS_CHART_LEN))
                .borders(Borders::ALL),
        )
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0);
    frame.render_widget(chart, columns[1]);
}

fn render_top_gainers(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows: Vec<Row> = nav::top_gainer_rows(state)
        .into_iter()
        .map(|row| {
            let entry = row.entry;
            Row::new(vec![
                Cell::from(format!("#{}", row.display_rank)),
                Cell::from(entry.name.clone()),
                Cell::from(format_exp(Some(entry.total_exp_gained)))
                    .style(Style::default().fg(Color::Green)),
                Cell::from(format!("+{}", entry.total_levels_gained)),
                Cell::from(format_exp_f64(entry.avg_daily_exp)),
                Cell::from(entry.days_tracked.to_string())
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(5),
        ],
    )
    .header(bold_header(&["Rank", "Player", "Exp Total", "Levels", "Avg/Day", "Days"]))
    .block(Block::default().title("Top Gainers").borders(Borders::ALL))
    .highlight_style(highlight_style())
    .highlight_symbol("> ");

    let mut table_state = cursor_table_state(state);
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn render_history(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(player) = state.selected_player.as_deref() else {
        let empty = Paragraph::new("No player selected").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };
    let block = Block::default()
        .title(format!("History - {player}"))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !state.history_is_current() {
        let waiting = Paragraph::new(format!("Waiting for history of {player}..."))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(waiting, inner);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(45),
            Constraint::Min(4),
        ])
        .split(inner);

    render_history_summary(frame, rows[0], state);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    render_history_line(frame, charts[0], state);
    render_history_bars(frame, charts[1], state);
    render_history_table(frame, rows[2], state);
}

fn render_history_summary(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(summary) = history_summary(&state.history) else {
        let empty = Paragraph::new("No history recorded yet")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };

    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);
    let values = [
        ("Level", summary.current_level.to_string(), Color::Blue),
        ("Experience", format_exp(Some(summary.current_experience)), Color::Green),
        (
            "Exp Total",
            format_exp(Some(summary.total_exp_gained)),
            Color::Magenta,
        ),
        (
            "Levels Gained",
            format!("+{}", summary.total_levels_gained),
            Color::Yellow,
        ),
    ];
    for (tile, (title, value, color)) in tiles.iter().zip(values) {
        let paragraph = Paragraph::new(value)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(paragraph, *tile);
    }
}

fn render_history_line(frame: &mut Frame, area: Rect, state: &AppState) {
    let points = nav::history_line_points(state);
    let block = Block::default()
        .title("Experience Progression")
        .borders(Borders::ALL);
    if points.is_empty() {
        frame.render_widget(block, area);
        return;
    }

    let min_y = points.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((max_y - min_y) * 0.05).max(1.0);
    let max_x = (points.len().saturating_sub(1)).max(1) as f64;

    let first = state.history.first().map(|d| format_short_date(d.date, state.locale));
    let last = state.history.last().map(|d| format_short_date(d.date, state.locale));
    let x_labels = vec![
        Span::raw(first.unwrap_or_default()),
        Span::raw(last.unwrap_or_default()),
    ];
    let y_labels = vec![
        Span::raw(format_exp(Some((min_y - pad) as i64))),
        Span::raw(format_exp(Some((max_y + pad) as i64))),
    ];

    let dataset = Dataset::default()
        .name("experience")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Blue))
        .data(&points);
    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(Axis::default().bounds([0.0, max_x]).labels(x_labels))
        .y_axis(
            Axis::default()
                .bounds([min_y - pad, max_y + pad])
                .labels(y_labels),
        );
    frame.render_widget(chart, area);
}

fn render_history_bars(frame: &mut Frame, area: Rect, state: &AppState) {
    let bars: Vec<Bar> = nav::history_gain_bars(state)
        .into_iter()
        .map(|day| {
            Bar::default()
                .value(day.exp_gained_or_zero().max(0) as u64)
                .label(Line::from(format_short_date(day.date, state.locale)))
                .text_value(format_exp(day.exp_gained))
                .style(Style::default().fg(Color::Green))
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().title("Daily Exp Gains").borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .bar_width(6)
        .bar_gap(1);
    frame.render_widget(chart, area);
}

fn render_history_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows: Vec<Row> = nav::history_table_rows(state)
        .into_iter()
        .enumerate()
        .map(|(idx, day)| {
            let style = if idx % 2 == 0 {
                Style::default()
            } else {
                Style::default().bg(Color::Black)
            };
            Row::new(vec![
                Cell::from(format_date(day.date, state.locale)),
                Cell::from(day.level.to_string()).style(Style::default().fg(Color::Blue)),
                Cell::from(format_number(Some(day.experience), state.locale)),
                Cell::from(nav::exp_gain_cell(day.exp_gained))
                    .style(Style::default().fg(Color::Green)),
                Cell::from(nav::level_gain_cell(day.level_gained))
                    .style(Style::default().fg(Color::Yellow)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Min(16),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(bold_header(&["Date", "Level", "Experience", "Exp", "Levels"]));
    frame.render_widget(table, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Tibia Tracker - Help",
        "",
        "Tabs:",
        "  1            Ranking",
        "  2            Daily gains",
        "  3            Top gainers",
        "  4            Player history (after selecting a player)",
        "  Tab          Next tab",
        "",
        "Lists:",
        "  j/k or ↑/↓   Move",
        "  Enter        Open player history",
        "  b / Esc      Back to ranking",
        "",
        "Data:",
        "  r            Refresh now",
        "  c            Run a manual collection",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
