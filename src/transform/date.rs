//! Date transform - keep the year, randomize month and day.

use chrono::{DateTime, Datelike, NaiveDate};
use rand::Rng;

/// Replace month and day of `value`, keeping its year.
///
/// Days are drawn from 1..=28 so every month stays valid.
pub fn randomize<R: Rng>(value: &str, rng: &mut R) -> Result<String, String> {
    let year = parse_year(value).ok_or_else(|| format!("Unrecognized date: {}", value))?;
    let month = rng.random_range(1..=12u32);
    let day = rng.random_range(1..=28u32);
    Ok(format!("{:04}-{:02}-{:02}", year, month, day))
}

/// Accepts `YYYY-MM-DD` with any time suffix (DATETIME, TIMESTAMP), or RFC 3339
fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if let Ok((date, _)) = NaiveDate::parse_and_remainder(value, "%Y-%m-%d") {
        return Some(date.year());
    }
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parts(value: &str) -> (i32, u32, u32) {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap();
        (date.year(), date.month(), date.day())
    }

    #[test]
    fn test_date_keeps_year() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let value = randomize("1987-12-31", &mut rng).unwrap();
            let (year, month, day) = parts(&value);
            assert_eq!(year, 1987);
            assert!((1..=12).contains(&month));
            assert!((1..=28).contains(&day));
        }
    }

    #[test]
    fn test_datetime_input() {
        let mut rng = StdRng::seed_from_u64(42);
        let value = randomize("2019-06-01 13:45:00", &mut rng).unwrap();
        assert_eq!(value.len(), 10);
        assert!(value.starts_with("2019-"));
    }

    #[test]
    fn test_rfc3339_input() {
        let mut rng = StdRng::seed_from_u64(42);
        let value = randomize("2003-02-14T08:00:00+07:00", &mut rng).unwrap();
        assert!(value.starts_with("2003-"));
    }

    #[test]
    fn test_invalid_date() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(randomize("not a date", &mut rng).is_err());
    }
}
