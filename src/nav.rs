use crate::format::format_exp;
use crate::state::{AppState, GainEntry, HistoryDay, ProviderCommand, RankingEntry, TopGainerEntry};

pub const GAINS_CHART_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Ranking,
    Gains,
    TopGainers,
    PlayerHistory,
}

impl Tab {
    pub const ALL: [Tab; 4] = [
        Tab::Ranking,
        Tab::Gains,
        Tab::TopGainers,
        Tab::PlayerHistory,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Tab::Ranking => "ranking",
            Tab::Gains => "gains",
            Tab::TopGainers => "top-gainers",
            Tab::PlayerHistory => "player-history",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Ranking => "Ranking",
            Tab::Gains => "Daily Gains",
            Tab::TopGainers => "Top Gainers",
            Tab::PlayerHistory => "History",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    SelectTab(Tab),
    NextTab,
    SelectPlayer(String),
    /// Select whichever player sits under the cursor in the active list.
    SelectCursorPlayer,
    Back,
    CursorNext,
    CursorPrev,
}

/// Applies a user action. Returns the command the scheduler must run, if any.
pub fn navigate(state: &mut AppState, action: NavAction) -> Option<ProviderCommand> {
    match action {
        NavAction::SelectTab(tab) => {
            select_tab(state, tab);
            None
        }
        NavAction::NextTab => {
            next_tab(state);
            None
        }
        NavAction::SelectPlayer(name) => Some(select_player(state, &name)),
        NavAction::SelectCursorPlayer => {
            let name = cursor_player(state)?.to_string();
            Some(select_player(state, &name))
        }
        NavAction::Back => {
            back(state);
            None
        }
        NavAction::CursorNext => {
            cursor_next(state);
            None
        }
        NavAction::CursorPrev => {
            cursor_prev(state);
            None
        }
    }
}

pub fn can_enter(state: &AppState, tab: Tab) -> bool {
    tab != Tab::PlayerHistory || state.selected_player.is_some()
}

pub fn available_tabs(state: &AppState) -> Vec<Tab> {
    Tab::ALL
        .into_iter()
        .filter(|tab| can_enter(state, *tab))
        .collect()
}

pub fn select_tab(state: &mut AppState, tab: Tab) -> bool {
    if !can_enter(state, tab) {
        return false;
    }
    if state.tab != tab {
        state.tab = tab;
        state.cursor = 0;
    }
    true
}

pub fn next_tab(state: &mut AppState) {
    let tabs = available_tabs(state);
    let pos = tabs.iter().position(|tab| *tab == state.tab).unwrap_or(0);
    let next = tabs[(pos + 1) % tabs.len()];
    select_tab(state, next);
}

/// Select, request history, show history: one user action.
pub fn select_player(state: &mut AppState, name: &str) -> ProviderCommand {
    state.select_player(name);
    state.tab = Tab::PlayerHistory;
    state.cursor = 0;
    ProviderCommand::FetchHistory {
        player: name.to_string(),
    }
}

pub fn back(state: &mut AppState) {
    if state.tab == Tab::PlayerHistory {
        state.tab = Tab::Ranking;
        state.cursor = 0;
    }
}

pub fn cursor_next(state: &mut AppState) {
    let total = active_len(state);
    if total == 0 {
        state.cursor = 0;
        return;
    }
    state.cursor = (state.cursor + 1) % total;
}

pub fn cursor_prev(state: &mut AppState) {
    let total = active_len(state);
    if total == 0 {
        state.cursor = 0;
        return;
    }
    if state.cursor == 0 {
        state.cursor = total - 1;
    } else {
        state.cursor -= 1;
    }
}

/// Number of selectable rows in the active tab. History has none.
pub fn active_len(state: &AppState) -> usize {
    match state.tab {
        Tab::Ranking => state.ranking.len(),
        Tab::Gains => state.gains.len(),
        Tab::TopGainers => state.top_gainers.len(),
        Tab::PlayerHistory => 0,
    }
}

pub fn cursor_player(state: &AppState) -> Option<&str> {
    match state.tab {
        Tab::Ranking => ranking_rows(state)
            .get(state.cursor)
            .map(|entry| entry.name.as_str()),
        Tab::Gains => gains_rows(state)
            .get(state.cursor)
            .map(|entry| entry.name.as_str()),
        Tab::TopGainers => top_gainer_rows(state)
            .get(state.cursor)
            .map(|row| row.entry.name.as_str()),
        Tab::PlayerHistory => None,
    }
}

/// Empty-state prompt is tied to the active bulk tab's own list.
pub fn show_empty_state(state: &AppState) -> bool {
    match state.tab {
        Tab::Ranking => state.ranking.is_empty(),
        Tab::Gains => state.gains.is_empty(),
        Tab::TopGainers => state.top_gainers.is_empty(),
        Tab::PlayerHistory => false,
    }
}

pub fn ranking_rows(state: &AppState) -> &[RankingEntry] {
    &state.ranking
}

/// Gains ordered by experience gained today, highest first. Ties keep delivery order.
pub fn gains_rows(state: &AppState) -> Vec<&GainEntry> {
    let mut rows: Vec<&GainEntry> = state.gains.iter().collect();
    rows.sort_by(|a, b| b.exp_gained_today.cmp(&a.exp_gained_today));
    rows
}

pub fn gains_chart(state: &AppState) -> Vec<&GainEntry> {
    let mut rows = gains_rows(state);
    rows.truncate(GAINS_CHART_LEN);
    rows
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopGainerRow<'a> {
    pub display_rank: usize,
    pub entry: &'a TopGainerEntry,
}

/// Delivery order, re-ranked 1..=N regardless of the server's rank field.
pub fn top_gainer_rows(state: &AppState) -> Vec<TopGainerRow<'_>> {
    state
        .top_gainers
        .iter()
        .enumerate()
        .map(|(idx, entry)| TopGainerRow {
            display_rank: idx + 1,
            entry,
        })
        .collect()
}

/// History table, newest day first. Every day is listed.
pub fn history_table_rows(state: &AppState) -> Vec<&HistoryDay> {
    state.history.iter().rev().collect()
}

/// Days with a positive gain, chronological. Only the per-day bar chart uses this.
pub fn history_gain_bars(state: &AppState) -> Vec<&HistoryDay> {
    state
        .history
        .iter()
        .filter(|day| day.exp_gained_or_zero() > 0)
        .collect()
}

/// (day index, cumulative experience) points for the progression chart.
pub fn history_line_points(state: &AppState) -> Vec<(f64, f64)> {
    state
        .history
        .iter()
        .enumerate()
        .map(|(idx, day)| (idx as f64, day.experience as f64))
        .collect()
}

pub fn exp_gain_cell(value: Option<i64>) -> String {
    match value {
        Some(v) if v > 0 => format!("+{}", format_exp(Some(v))),
        _ => "-".to_string(),
    }
}

pub fn level_gain_cell(value: Option<i32>) -> String {
    match value {
        Some(v) if v > 0 => format!("+{v}"),
        _ => "-".to_string(),
    }
}
