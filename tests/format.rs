use chrono::{Local, NaiveDate, TimeZone};
use tibia_tracker::format::{
    DisplayLocale, format_date, format_exp, format_exp_f64, format_gain, format_number, format_short_date,
    format_time,
};

#[test]
fn magnitude_suffixes() {
    assert_eq!(format_exp(Some(500)), "500");
    assert_eq!(format_exp(Some(1_500)), "1.5K");
    assert_eq!(format_exp(Some(2_300_000)), "2.3M");
    assert_eq!(format_exp(Some(4_000_000_000)), "4.0B");
    assert_eq!(format_exp(Some(999)), "999");
    assert_eq!(format_exp(Some(1_000)), "1.0K");
    assert_eq!(format_exp(Some(0)), "0");
    assert_eq!(format_exp(None), "0");
}

#[test]
fn magnitude_halves_round_up() {
    assert_eq!(format_exp(Some(1_250)), "1.3K");
    assert_eq!(format_exp(Some(2_250_000)), "2.3M");
    assert_eq!(format_exp(Some(1_050_000_000)), "1.1B");
    assert_eq!(format_exp(Some(1_249)), "1.2K");
    assert_eq!(format_gain(1_250), "+1.3K");
}

#[test]
fn fractional_values_keep_fraction_below_thousand() {
    assert_eq!(format_exp_f64(999.6), "999.6");
    assert_eq!(format_exp_f64(142.0), "142");
    assert_eq!(format_exp_f64(1_250.0), "1.3K");
    assert_eq!(format_exp_f64(42_857_142.8), "42.9M");
    assert_eq!(format_exp_f64(f64::NAN), "0");
}

#[test]
fn negative_values_are_not_suffixed() {
    assert_eq!(format_exp(Some(-25_000)), "-25000");
    assert_eq!(format_gain(-25_000), "-25000");
    assert_eq!(format_gain(1_500), "+1.5K");
    assert_eq!(format_gain(0), "+0");
}

#[test]
fn grouped_numbers_follow_locale() {
    assert_eq!(format_number(Some(28_919_456_732), DisplayLocale::PtBr), "28.919.456.732");
    assert_eq!(format_number(Some(28_919_456_732), DisplayLocale::EnUs), "28,919,456,732");
    assert_eq!(format_number(Some(999), DisplayLocale::PtBr), "999");
    assert_eq!(format_number(Some(1_000), DisplayLocale::PtBr), "1.000");
    assert_eq!(format_number(Some(-1_234_567), DisplayLocale::EnUs), "-1,234,567");
    assert_eq!(format_number(None, DisplayLocale::EnUs), "0");
}

#[test]
fn dates_follow_locale() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
    assert_eq!(format_date(date, DisplayLocale::PtBr), "05/10/2026");
    assert_eq!(format_date(date, DisplayLocale::EnUs), "10/05/2026");
    assert_eq!(format_short_date(date, DisplayLocale::PtBr), "05/10");
}

#[test]
fn times_follow_locale() {
    let at = Local
        .with_ymd_and_hms(2026, 10, 18, 14, 3, 9)
        .single()
        .expect("unambiguous local time");
    assert_eq!(format_time(&at, DisplayLocale::PtBr), "14:03:09");
    assert_eq!(format_time(&at, DisplayLocale::EnUs), "02:03:09 PM");
}

#[test]
fn locale_names_parse() {
    assert_eq!(DisplayLocale::parse("pt-BR"), Some(DisplayLocale::PtBr));
    assert_eq!(DisplayLocale::parse("en_US"), Some(DisplayLocale::EnUs));
    assert_eq!(DisplayLocale::parse("fr"), None);
}
