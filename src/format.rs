use chrono::{DateTime, Local, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLocale {
    PtBr,
    EnUs,
}

impl DisplayLocale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Some(Self::PtBr),
            "en-us" | "en" => Some(Self::EnUs),
            _ => None,
        }
    }

    fn group_separator(self) -> char {
        match self {
            Self::PtBr => '.',
            Self::EnUs => ',',
        }
    }
}

/// Short magnitude form used on cards, axes and summary tiles: `1.5K`, `2.3M`, `4.0B`.
/// Values below one thousand (negatives included) are printed as-is.
pub fn format_exp(value: Option<i64>) -> String {
    let Some(value) = value else {
        return "0".to_string();
    };
    magnitude(value as f64).unwrap_or_else(|| value.to_string())
}

/// Magnitude form for fractional values such as daily averages. Below one
/// thousand the value keeps its fraction: `999.6`, `142`.
pub fn format_exp_f64(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    magnitude(value).unwrap_or_else(|| format!("{value}"))
}

fn magnitude(v: f64) -> Option<String> {
    if v >= 1_000_000_000.0 {
        Some(format!("{:.1}B", one_decimal(v / 1_000_000_000.0)))
    } else if v >= 1_000_000.0 {
        Some(format!("{:.1}M", one_decimal(v / 1_000_000.0)))
    } else if v >= 1_000.0 {
        Some(format!("{:.1}K", one_decimal(v / 1_000.0)))
    } else {
        None
    }
}

/// Halves round away from zero: 1250 is `1.3K`, not `1.2K`.
fn one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Full integer with thousands separators for the given locale.
pub fn format_number(value: Option<i64>, locale: DisplayLocale) -> String {
    let Some(value) = value else {
        return "0".to_string();
    };
    let digits = value.unsigned_abs().to_string();
    let sep = locale.group_separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

pub fn format_date(date: NaiveDate, locale: DisplayLocale) -> String {
    match locale {
        DisplayLocale::PtBr => date.format("%d/%m/%Y").to_string(),
        DisplayLocale::EnUs => date.format("%m/%d/%Y").to_string(),
    }
}

/// Axis labels only have room for day and month.
pub fn format_short_date(date: NaiveDate, locale: DisplayLocale) -> String {
    match locale {
        DisplayLocale::PtBr => date.format("%d/%m").to_string(),
        DisplayLocale::EnUs => date.format("%m/%d").to_string(),
    }
}

pub fn format_time(at: &DateTime<Local>, locale: DisplayLocale) -> String {
    match locale {
        DisplayLocale::PtBr => at.format("%H:%M:%S").to_string(),
        DisplayLocale::EnUs => at.format("%I:%M:%S %p").to_string(),
    }
}

/// Signed gain shown on cards, e.g. `+1.5K`. Never prints `+-`.
pub fn format_gain(value: i64) -> String {
    if value < 0 {
        format_exp(Some(value))
    } else {
        format!("+{}", format_exp(Some(value)))
    }
}
