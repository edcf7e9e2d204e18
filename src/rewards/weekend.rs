use chrono::{DateTime, Datelike, Utc, Weekday};

/// Whether the weekend bonus window is active at `now` (Saturday or Sunday,
/// UTC). Pure and deterministic.
pub fn weekend_active(now: DateTime<Utc>) -> bool {
    matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}
