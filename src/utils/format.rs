use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;

/// `mm:ss`, clamped at zero. Matches the dashboard's countdown display.
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// "in 2 hours" / "3 minutes ago".
pub fn relative(instant: DateTime<Utc>) -> String {
    HumanTime::from(instant).to_string()
}

#[cfg(test)]
mod tests {
    use super::format_clock;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(-5), "00:00");
    }
}
