use chrono::{DateTime, TimeZone, Utc};

/// Human-relative age of `then` as seen from `now`.
///
/// Buckets are `just now` (< 60s), `Nm ago`, `Nh ago` and `Nd ago`, all
/// truncated. Instants in the future read as `just now`.
pub fn relative_time_label(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// [`relative_time_label`] for a git timestamp in epoch seconds.
pub fn label_since_epoch(now: DateTime<Utc>, seconds: i64) -> String {
    relative_time_label(now, from_epoch(seconds))
}

/// Convert git epoch seconds, clamping unrepresentable values to the epoch.
pub fn from_epoch(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_default()
}

pub fn from_epoch_f64(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos)
        .single()
        .unwrap_or_default()
}

pub fn to_epoch_f64(instant: DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_nanos()) / 1e9
}
