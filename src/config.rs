use std::env;
use std::time::Duration;

use crate::format::DisplayLocale;

pub const DEFAULT_API_BASE_URL: &str = "https://powergamer-backend.up.railway.app/";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_base_url: String,
    pub poll_interval: Duration,
    /// Wait between a manual collection command and the refresh that follows it.
    pub grace_delay: Duration,
    pub top_gainers_days: u32,
    pub history_days: u32,
    pub request_timeout: Duration,
    pub locale: DisplayLocale,
    pub demo: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(120),
            grace_delay: Duration::from_secs(5),
            top_gainers_days: 7,
            history_days: 14,
            request_timeout: Duration::from_secs(10),
            locale: DisplayLocale::PtBr,
            demo: false,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_base_url = opt_env("TRACKER_API_BASE_URL").unwrap_or(defaults.api_base_url);
        let poll_interval = Duration::from_secs(
            env::var("TRACKER_POLL_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(120)
                .max(10),
        );
        let grace_delay = Duration::from_secs(
            env::var("TRACKER_GRACE_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(5)
                .max(1),
        );
        let top_gainers_days = env::var("TRACKER_TOP_GAINERS_DAYS")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(7)
            .clamp(1, 90);
        let history_days = env::var("TRACKER_HISTORY_DAYS")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(14)
            .clamp(1, 365);
        let request_timeout = Duration::from_secs(
            env::var("TRACKER_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(10)
                .max(1),
        );
        let locale = opt_env("TRACKER_LOCALE")
            .and_then(|val| DisplayLocale::parse(&val))
            .unwrap_or(defaults.locale);
        let demo = opt_env("TRACKER_DEMO").is_some_and(|val| is_truthy(&val));

        Self {
            api_base_url,
            poll_interval,
            grace_delay,
            top_gainers_days,
            history_days,
            request_timeout,
            locale,
            demo,
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
