//! Human-readable formatting helpers.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with binary units. Whole values drop the decimal,
/// so 1 GiB renders as "1 GB" and 2048 as "2 KB".
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if (value - value.round()).abs() < 0.05 {
        format!("{} {}", value.round() as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Render a 0-100 value as a percentage string.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Strip one layer of wrapping quotes that LLM replies sometimes carry.
pub fn strip_wrapping_quotes(text: &str) -> &str {
    let t = text.trim();
    if t.len() >= 2
        && ((t.starts_with('"') && t.ends_with('"'))
            || (t.starts_with('\'') && t.ends_with('\'')))
    {
        &t[1..t.len() - 1]
    } else {
        t
    }
}
