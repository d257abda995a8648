//! `__DATE__`/`__TIME__` values, captured once at context creation in the
//! host's local time (matching what a real compiler stamps into its
//! build-time builtins).

use chrono::{Datelike, Local, Timelike};

/// Format the current local date as `"Mmm dd yyyy"` for `__DATE__`.
pub fn format_date() -> String {
    let now = Local::now();
    let month_names = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    format!("{:3} {:2} {}", month_names[now.month0() as usize], now.day(), now.year())
}

/// Format the current local time as `"hh:mm:ss"` for `__TIME__`.
pub fn format_time() -> String {
    let now = Local::now();
    format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_date_matches_expected_shape() {
        let date = format_date();
        assert_eq!(date.len(), 11); // "Jan  1 1970" is 11 chars
        let month = &date[0..3];
        assert!(
            ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
                .contains(&month)
        );
        assert_eq!(date.chars().nth(3), Some(' '));
        assert!(date.chars().nth(4).unwrap().is_ascii_digit());
        assert!(date.chars().nth(5).unwrap().is_ascii_digit());
        assert_eq!(date.chars().nth(6), Some(' '));
        for i in 7..11 {
            assert!(date.chars().nth(i).unwrap().is_ascii_digit());
        }
    }

    #[test]
    fn format_time_matches_expected_shape() {
        let time = format_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.chars().nth(2), Some(':'));
        assert_eq!(time.chars().nth(5), Some(':'));
    }
}
