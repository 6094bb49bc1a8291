//! Best-effort message date resolution
//!
//! Sender-supplied `Date` headers are routinely malformed, so resolution walks
//! three tiers: the decoded header with e-mail tolerant parsing, the store's
//! INTERNALDATE, then a strict parse of the raw header bytes. When all fail
//! the original text is kept for display instead of being dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Display marker when no date text exists at all
pub const UNKNOWN_DATE: &str = "Unknown Date";

/// IMAP INTERNALDATE layout (`17-Jul-1996 02:44:25 -0700`)
const INTERNALDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Outcome of date resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedDate {
    /// A timestamp was recovered from one of the tiers
    Timestamp(DateTime<Utc>),
    /// Nothing parsed; the raw text is shown verbatim
    Unparsed(String),
    /// No date text was present
    Unknown,
}

impl ResolvedDate {
    /// Render for display; timestamps use `format` in UTC
    pub fn display(&self, format: &str) -> String {
        match self {
            Self::Timestamp(ts) => ts.format(format).to_string(),
            Self::Unparsed(raw) => raw.clone(),
            Self::Unknown => UNKNOWN_DATE.to_owned(),
        }
    }
}

/// Resolve a message date from its candidate sources
///
/// `primary` is the decoded `Date` header, `secondary` the store's internal
/// date, `raw` the undecoded header text.
pub fn resolve_date(
    primary: Option<&str>,
    secondary: Option<&str>,
    raw: Option<&str>,
) -> ResolvedDate {
    let primary = non_blank(primary);
    let secondary = non_blank(secondary);
    let raw = non_blank(raw);

    if let Some(ts) = primary.and_then(parse_mail_date) {
        return ResolvedDate::Timestamp(ts);
    }
    if let Some(ts) = secondary.and_then(parse_mail_date) {
        return ResolvedDate::Timestamp(ts);
    }
    if let Some(ts) = raw.and_then(parse_strict) {
        return ResolvedDate::Timestamp(ts);
    }

    match raw.or(primary) {
        Some(text) => ResolvedDate::Unparsed(text.to_owned()),
        None => ResolvedDate::Unknown,
    }
}

/// Tolerant parse of e-mail and IMAP date layouts
///
/// Accepts RFC 2822 (with or without weekday, trailing comments such as
/// `(UTC)`, obsolete zone names via `mailparse`) and IMAP INTERNALDATE.
fn parse_mail_date(value: &str) -> Option<DateTime<Utc>> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let uncommented = strip_trailing_comment(value);
    if let Ok(dt) = DateTime::parse_from_rfc2822(uncommented) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(uncommented, INTERNALDATE_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    mailparse::dateparse(value)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// Strict last-resort parse: RFC 3339 and ISO-like layouts only
fn parse_strict(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn strip_trailing_comment(value: &str) -> &str {
    match value.rfind('(') {
        Some(idx) if value.trim_end().ends_with(')') => value[..idx].trim_end(),
        _ => value,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ResolvedDate, UNKNOWN_DATE, resolve_date};

    const FMT: &str = "%Y-%m-%d %H:%M";

    #[test]
    fn well_formed_primary_wins() {
        let resolved = resolve_date(
            Some("Wed, 1 Jan 2025 10:30:00 +0200"),
            Some("02-Jan-2025 00:00:00 +0000"),
            None,
        );
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 8, 30, 0).single();
        assert_eq!(Some(resolved.clone()), expected.map(ResolvedDate::Timestamp));
        assert_eq!(resolved.display(FMT), "2025-01-01 08:30");
    }

    #[test]
    fn tolerates_missing_weekday_and_zone_comment() {
        let resolved = resolve_date(Some("1 Jan 2025 00:00:00 +0000 (UTC)"), None, None);
        assert_eq!(resolved.display(FMT), "2025-01-01 00:00");
    }

    #[test]
    fn falls_back_to_secondary_internal_date() {
        let resolved = resolve_date(
            Some("sometime last week"),
            Some("17-Jul-1996 02:44:25 -0700"),
            Some("sometime last week"),
        );
        assert_eq!(resolved.display(FMT), "1996-07-17 09:44");
    }

    #[test]
    fn secondary_accepts_rfc2822_form() {
        let resolved = resolve_date(None, Some("Tue, 2 Dec 2025 18:05:00 +0000"), None);
        assert_eq!(resolved.display(FMT), "2025-12-02 18:05");
    }

    #[test]
    fn strict_tier_parses_iso_raw_value() {
        let resolved = resolve_date(
            Some("garbage"),
            Some("no date here"),
            Some("2024-03-05T06:07:08Z"),
        );
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 6, 7, 8).single();
        assert_eq!(Some(resolved.clone()), expected.map(ResolvedDate::Timestamp));
        assert_eq!(resolved.display(FMT), "2024-03-05 06:07");

        let date_only = resolve_date(Some("garbage"), None, Some("2024-03-05"));
        assert_eq!(date_only.display(FMT), "2024-03-05 00:00");
    }

    #[test]
    fn unparsed_raw_is_returned_verbatim() {
        let resolved = resolve_date(
            Some("garbage"),
            Some("also garbage"),
            Some("next tuesday-ish"),
        );
        assert_eq!(resolved, ResolvedDate::Unparsed("next tuesday-ish".to_owned()));
        assert_eq!(resolved.display(FMT), "next tuesday-ish");
    }

    #[test]
    fn all_missing_is_unknown() {
        assert_eq!(resolve_date(None, None, None), ResolvedDate::Unknown);
        let resolved = resolve_date(Some(" "), Some(""), Some("\t"));
        assert_eq!(resolved.display(FMT), UNKNOWN_DATE);
    }
}
