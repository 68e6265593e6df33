//! Argument extraction from request text.
//!
//! Small, deterministic extractors shared by the rule planner: email
//! addresses, quoted titles, dates and time windows. Anything these cannot
//! find stays unextracted and the planner decides whether that makes the
//! request unroutable.

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
    })
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"'([^']+)'|"([^"]+)""#).expect("quoted regex"))
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"))
}

fn month_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
        )
        .expect("month date regex")
    })
}

fn clock_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2}):(\d{2})\s*(?:–|—|-|to|until)\s*(\d{1,2}):(\d{2})\b")
            .expect("clock range regex")
    })
}

fn meridiem_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\.?\b").expect("meridiem regex")
    })
}

fn reference_cue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:it|this|that|them|the event|the meeting|the results?)\b")
            .expect("reference cue regex")
    })
}

fn name_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:titled|called|named|about|containing)\s+([A-Za-z0-9][A-Za-z0-9 _-]*)")
            .expect("name phrase regex")
    })
}

/// First email address in the text.
pub fn email(text: &str) -> Option<String> {
    email_re().find(text).map(|m| m.as_str().to_string())
}

/// First single- or double-quoted phrase.
pub fn quoted(text: &str) -> Option<String> {
    quoted_re().captures(text).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    })
}

/// A quoted phrase, or the words after a naming cue ("titled", "named",
/// "about"), truncated at the next prepositional clause.
pub fn name_phrase(text: &str) -> Option<String> {
    if let Some(title) = quoted(text) {
        return Some(title);
    }
    let raw = name_phrase_re()
        .captures(text)
        .and_then(|caps| caps.get(1))?
        .as_str();
    let mut phrase = raw;
    for stop in [" on ", " at ", " from ", " for ", " in "] {
        if let Some(index) = phrase.find(stop) {
            phrase = &phrase[..index];
        }
    }
    let phrase = phrase.trim();
    (!phrase.is_empty()).then(|| phrase.to_string())
}

/// Whether the text points back at an earlier step's result.
pub fn has_reference_cue(text: &str) -> bool {
    reference_cue_re().is_match(text)
}

/// First calendar date in the text, ISO or month-name form.
pub fn date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = iso_date_re().captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let caps = month_date_re().captures(text)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let months = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lower = name.to_lowercase();
    months.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

/// Times of day mentioned in the text, in order of appearance.
fn times(text: &str) -> Vec<NaiveTime> {
    if let Some(caps) = clock_range_re().captures(text) {
        let parse = |h: &str, m: &str| {
            NaiveTime::from_hms_opt(h.parse().unwrap_or(0), m.parse().unwrap_or(0), 0)
        };
        if let (Some(start), Some(end)) = (parse(&caps[1], &caps[2]), parse(&caps[3], &caps[4])) {
            return vec![start, end];
        }
    }
    meridiem_time_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps
                .get(2)
                .map(|m| m.as_str().parse().ok())
                .unwrap_or(Some(0))?;
            let hour = match (&caps[3].to_lowercase()[..], hour) {
                ("p", h) if h < 12 => h + 12,
                ("a", 12) => 0,
                (_, h) => h,
            };
            NaiveTime::from_hms_opt(hour, minute, 0)
        })
        .collect()
}

/// A concrete start/end window extracted from the text.
///
/// Needs a date plus at least one time of day; a lone time defaults to a
/// thirty-minute window.
pub fn event_window(text: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let date = date(text)?;
    let times = times(text);
    let start = date.and_time(*times.first()?);
    let end = match times.get(1) {
        Some(time) => date.and_time(*time),
        None => start + Duration::minutes(30),
    };
    (end > start).then_some((start, end))
}

/// A start/end window for range queries: an event window when times are
/// present, otherwise the whole mentioned day.
pub fn day_window(text: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    if let Some(window) = event_window(text) {
        return Some(window);
    }
    let date = date(text)?;
    let start = date.and_hms_opt(0, 0, 0)?;
    let end = date.and_hms_opt(23, 59, 59)?;
    Some((start, end))
}

/// Render a timestamp the way the calendar tools expect it.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_extraction() {
        assert_eq!(
            email("email bob@example.com that it's scheduled"),
            Some("bob@example.com".to_string())
        );
        assert_eq!(email("no address here"), None);
    }

    #[test]
    fn test_quoted_titles() {
        assert_eq!(
            quoted("Schedule a 'Project kickoff' meeting"),
            Some("Project kickoff".to_string())
        );
        assert_eq!(
            quoted(r#"find files named "rent receipts""#),
            Some("rent receipts".to_string())
        );
    }

    #[test]
    fn test_name_phrase_falls_back_to_cue() {
        assert_eq!(
            name_phrase("find the file named budget for last month"),
            Some("budget".to_string())
        );
        assert_eq!(name_phrase("find something"), None);
    }

    #[test]
    fn test_iso_window_with_dash_range() {
        let (start, end) =
            event_window("meeting for 2025-09-01 10:00\u{2013}10:30").unwrap();
        assert_eq!(format_timestamp(start), "2025-09-01T10:00:00");
        assert_eq!(format_timestamp(end), "2025-09-01T10:30:00");
    }

    #[test]
    fn test_month_name_with_meridiem_defaults_to_half_hour() {
        let (start, end) =
            event_window("a call on September 1st, 2025 at 10 AM").unwrap();
        assert_eq!(format_timestamp(start), "2025-09-01T10:00:00");
        assert_eq!(format_timestamp(end), "2025-09-01T10:30:00");
    }

    #[test]
    fn test_meridiem_pair() {
        let (start, end) =
            event_window("on 2025-09-02 from 9 AM to 5:45 PM").unwrap();
        assert_eq!(format_timestamp(start), "2025-09-02T09:00:00");
        assert_eq!(format_timestamp(end), "2025-09-02T17:45:00");
    }

    #[test]
    fn test_day_window_without_times() {
        let (start, end) = day_window("what's on my calendar on 2025-09-03").unwrap();
        assert_eq!(format_timestamp(start), "2025-09-03T00:00:00");
        assert_eq!(format_timestamp(end), "2025-09-03T23:59:59");
    }

    #[test]
    fn test_window_requires_a_date() {
        assert!(event_window("meet at 10:00-10:30").is_none());
    }

    #[test]
    fn test_reference_cues() {
        assert!(has_reference_cue("email bob that it's scheduled"));
        assert!(has_reference_cue("send them the results"));
        assert!(!has_reference_cue("email bob a greeting"));
    }
}
