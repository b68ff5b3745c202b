use std::time::Duration;

/// Formats a remaining-time estimate as `HH:MM:SS`.
pub fn format_eta(eta: Duration) -> String {
    let total = eta.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::ZERO), "00:00:00");
        assert_eq!(format_eta(Duration::from_millis(59_900)), "00:00:59");
        assert_eq!(format_eta(Duration::from_secs(3 * 3600 + 25 * 60 + 7)), "03:25:07");
        assert_eq!(format_eta(Duration::from_secs(100 * 3600)), "100:00:00");
    }
}
