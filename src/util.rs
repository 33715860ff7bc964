/// Countdown display: "1h 3m 20s", dropping leading zero units but always
/// showing seconds.
pub fn format_time(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut out = String::new();
    if hrs > 0 {
        out.push_str(&format!("{}h ", hrs));
    }
    if mins > 0 || hrs > 0 {
        out.push_str(&format!("{}m ", mins));
    }
    out.push_str(&format!("{}s", secs));
    out
}

/// Totals display: minute granularity, "2h 15m" / "0m".
pub fn format_totals(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;

    if hrs > 0 {
        format!("{}h {}m", hrs, mins)
    } else {
        format!("{}m", mins)
    }
}
