//! Duration rendering for the playback display string.

/// Render a second count as `H:MM:SS`.
///
/// Hours are always shown, without zero padding, matching the server
/// clients' conventional rendering (`0:00:07`).
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sub_minute_durations() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(7), "0:00:07");
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_duration(3661), "1:01:01");
        assert_eq!(format_duration(7325), "2:02:05");
    }
}
