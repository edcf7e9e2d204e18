use chrono::Duration;

/// Render a remaining duration for cooldown feedback, e.g.
/// `"11 hours 30 minutes"`. Sub-second remainders floor to `"1 second"` so
/// the user never reads an empty or zero wait.
pub fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.num_seconds().max(0);
    if secs == 0 {
        return "1 second".to_string();
    }

    const UNITS: [(&str, i64); 4] = [
        ("day", 86_400),
        ("hour", 3_600),
        ("minute", 60),
        ("second", 1),
    ];

    let mut parts = Vec::new();
    for (name, len) in UNITS {
        let count = secs / len;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{count} {name}{plural}"));
            secs -= count * len;
        }
    }
    parts.join(" ")
}
