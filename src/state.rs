use std::collections::VecDeque;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::format::DisplayLocale;
use crate::nav::{self, Tab};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: u32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: i64,
    #[serde(default)]
    pub vocation: Option<String>,
}

impl RankingEntry {
    pub fn vocation_label(&self) -> &str {
        self.vocation
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: u32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_experience: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exp_gained_today: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level_gained_today: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopGainerEntry {
    /// Server-side rank. Display rank is recomputed from position, see `nav::top_gainer_rows`.
    #[serde(default)]
    pub rank: Option<u32>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_exp_gained: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_levels_gained: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avg_daily_exp: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub days_tracked: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub level: u32,
    pub experience: i64,
    pub exp_gained: Option<i64>,
    pub level_gained: Option<i32>,
}

impl HistoryDay {
    pub fn exp_gained_or_zero(&self) -> i64 {
        self.exp_gained.unwrap_or(0)
    }

    pub fn level_gained_or_zero(&self) -> i32 {
        self.level_gained.unwrap_or(0)
    }
}

/// Aggregates over the loaded history window. Always recomputed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySummary {
    pub current_level: u32,
    pub current_experience: i64,
    pub total_exp_gained: i64,
    pub total_levels_gained: i64,
}

pub fn history_summary(days: &[HistoryDay]) -> Option<HistorySummary> {
    let last = days.last()?;
    Some(HistorySummary {
        current_level: last.level,
        current_experience: last.experience,
        total_exp_gained: days.iter().map(HistoryDay::exp_gained_or_zero).sum(),
        total_levels_gained: days
            .iter()
            .map(|day| i64::from(day.level_gained_or_zero()))
            .sum(),
    })
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub tab: Tab,
    pub selected_player: Option<String>,
    /// Row under the cursor in the active list.
    pub cursor: usize,
    pub ranking: Vec<RankingEntry>,
    pub gains: Vec<GainEntry>,
    pub top_gainers: Vec<TopGainerEntry>,
    pub history: Vec<HistoryDay>,
    /// Player the loaded `history` belongs to.
    pub history_player: Option<String>,
    pub collecting: bool,
    pub last_update: Option<DateTime<Local>>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub locale: DisplayLocale,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            tab: Tab::Ranking,
            selected_player: None,
            cursor: 0,
            ranking: Vec::with_capacity(32),
            gains: Vec::with_capacity(32),
            top_gainers: Vec::with_capacity(32),
            history: Vec::new(),
            history_player: None,
            collecting: false,
            last_update: None,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
            locale: DisplayLocale::PtBr,
        }
    }

    pub fn with_locale(locale: DisplayLocale) -> Self {
        Self {
            locale,
            ..Self::new()
        }
    }

    pub fn set_ranking(&mut self, entries: Vec<RankingEntry>) {
        self.ranking = entries;
        self.clamp_cursor();
    }

    pub fn set_gains(&mut self, entries: Vec<GainEntry>) {
        self.gains = entries;
        self.clamp_cursor();
    }

    pub fn set_top_gainers(&mut self, entries: Vec<TopGainerEntry>) {
        self.top_gainers = entries;
        self.clamp_cursor();
    }

    /// Stores a history payload delivered newest-first, in chronological order.
    /// Returns false when the payload belongs to a player that is no longer selected.
    pub fn set_player_history(&mut self, player: &str, mut days: Vec<HistoryDay>) -> bool {
        if self.selected_player.as_deref() != Some(player) {
            return false;
        }
        days.reverse();
        if !days.is_sorted_by_key(|day| day.date) {
            days.sort_by_key(|day| day.date);
        }
        self.history = days;
        self.history_player = Some(player.to_string());
        true
    }

    /// Selection only. Fetching the history is the caller's job.
    pub fn select_player(&mut self, name: &str) {
        self.selected_player = Some(name.to_string());
    }

    pub fn history_is_current(&self) -> bool {
        self.selected_player.is_some() && self.history_player == self.selected_player
    }

    /// Marks a manual collection as in flight. Returns false if one already is.
    pub fn begin_collection(&mut self) -> bool {
        if self.collecting {
            return false;
        }
        self.collecting = true;
        true
    }

    pub fn finish_collection(&mut self) {
        self.collecting = false;
    }

    pub fn mark_refreshed(&mut self, at: DateTime<Local>) {
        self.last_update = Some(at);
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn clamp_cursor(&mut self) {
        let total = nav::active_len(self);
        if total == 0 {
            self.cursor = 0;
        } else if self.cursor >= total {
            self.cursor = total - 1;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetRanking(Vec<RankingEntry>),
    SetGains(Vec<GainEntry>),
    SetTopGainers(Vec<TopGainerEntry>),
    SetHistory {
        player: String,
        days: Vec<HistoryDay>,
    },
    Refreshed(DateTime<Local>),
    CollectionFinished,
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    RefreshNow,
    FetchHistory { player: String },
    TriggerCollection,
    Shutdown,
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetRanking(entries) => state.set_ranking(entries),
        Delta::SetGains(entries) => state.set_gains(entries),
        Delta::SetTopGainers(entries) => state.set_top_gainers(entries),
        Delta::SetHistory { player, days } => {
            if !state.set_player_history(&player, days) {
                state.push_log(format!("[INFO] Dropped stale history for {player}"));
            }
        }
        Delta::Refreshed(at) => state.mark_refreshed(at),
        Delta::CollectionFinished => state.finish_collection(),
        Delta::Log(line) => state.push_log(line),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
