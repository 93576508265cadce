use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string, e.g. `2026-10-18T09:30:00Z`.
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Format a UTC instant with whole seconds and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
