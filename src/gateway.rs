use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::TrackerConfig;
use crate::http_client::build_http_client;
use crate::state::{GainEntry, HistoryDay, RankingEntry, TopGainerEntry};

/// Remote leaderboard service. Every call is independent and may fail on its own.
pub trait Gateway: Send + Sync + 'static {
    /// Ordered by rank ascending.
    fn current_ranking(&self) -> Result<Vec<RankingEntry>>;
    fn daily_gains(&self) -> Result<Vec<GainEntry>>;
    fn top_gainers(&self, days: u32) -> Result<Vec<TopGainerEntry>>;
    /// Newest day first, exactly as the service sends it.
    fn player_history(&self, player: &str, days: u32) -> Result<Vec<HistoryDay>>;
    /// Asks the service to start a collection run. Does not wait for it.
    fn trigger_collection(&self) -> Result<()>;
}

pub struct HttpGateway {
    client: Client,
    base: Url,
}

impl HttpGateway {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = build_http_client(config.request_timeout)?;
        let base = Url::parse(config.api_base_url.trim())
            .with_context(|| format!("invalid api base url: {}", config.api_base_url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("api base url cannot be a base: {base}"));
        }
        Ok(Self { client, base })
    }

    pub fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn get_text(&self, url: Url) -> Result<String> {
        let resp = self.client.get(url).send().context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, body));
        }
        Ok(body)
    }
}

impl Gateway for HttpGateway {
    fn current_ranking(&self) -> Result<Vec<RankingEntry>> {
        let url = self.endpoint(&["players", "current"], &[])?;
        parse_ranking_json(&self.get_text(url)?)
    }

    fn daily_gains(&self) -> Result<Vec<GainEntry>> {
        let url = self.endpoint(&["players", "daily-gains"], &[])?;
        parse_gains_json(&self.get_text(url)?)
    }

    fn top_gainers(&self, days: u32) -> Result<Vec<TopGainerEntry>> {
        let url = self.endpoint(&["stats", "top-gainers"], &[("days", days.to_string())])?;
        parse_top_gainers_json(&self.get_text(url)?)
    }

    fn player_history(&self, player: &str, days: u32) -> Result<Vec<HistoryDay>> {
        let url = self.endpoint(
            &["players", player, "history"],
            &[("days", days.to_string())],
        )?;
        parse_history_json(&self.get_text(url)?)
    }

    fn trigger_collection(&self) -> Result<()> {
        let url = self.endpoint(&["scrape", "manual"], &[])?;
        let resp = self.client.post(url).send().context("request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("http {}: {}", status, body));
        }
        Ok(())
    }
}

pub fn parse_ranking_json(raw: &str) -> Result<Vec<RankingEntry>> {
    parse_list(raw).context("invalid ranking json")
}

pub fn parse_gains_json(raw: &str) -> Result<Vec<GainEntry>> {
    parse_list(raw).context("invalid daily gains json")
}

pub fn parse_top_gainers_json(raw: &str) -> Result<Vec<TopGainerEntry>> {
    parse_list(raw).context("invalid top gainers json")
}

#[derive(Debug, Deserialize)]
struct RawHistoryDay {
    date: String,
    #[serde(default)]
    level: Option<u32>,
    #[serde(default)]
    experience: Option<i64>,
    #[serde(default)]
    exp_gained: Option<i64>,
    #[serde(default)]
    level_gained: Option<i32>,
}

/// Keeps the service's newest-first order.
pub fn parse_history_json(raw: &str) -> Result<Vec<HistoryDay>> {
    let rows: Vec<RawHistoryDay> = parse_list(raw).context("invalid history json")?;
    rows.into_iter()
        .map(|row| -> Result<HistoryDay> {
            let date = parse_history_date(&row.date)
                .with_context(|| format!("invalid history date: {}", row.date))?;
            Ok(HistoryDay {
                date,
                level: row.level.unwrap_or_default(),
                experience: row.experience.unwrap_or_default(),
                exp_gained: row.exp_gained,
                level_gained: row.level_gained,
            })
        })
        .collect()
}

pub fn parse_history_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    let cleaned = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(dt.date_naive());
    }
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn parse_list<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}
