//! Lenient parsing of date cells
//!
//! Metadata sheets mix full dates, year-month, bare years and day-first
//! dates. Partial dates resolve to the first day of the period.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex_lite::{Captures, Regex};

/// Which capture group holds each date component
#[derive(Clone, Copy)]
struct Shape {
    year: usize,
    month: Option<usize>,
    day: Option<usize>,
}

const YEAR_FIRST: Shape = Shape {
    year: 1,
    month: Some(2),
    day: Some(3),
};
const DAY_FIRST: Shape = Shape {
    year: 3,
    month: Some(2),
    day: Some(1),
};
const YEAR_MONTH: Shape = Shape {
    year: 1,
    month: Some(2),
    day: None,
};
const YEAR_ONLY: Shape = Shape {
    year: 1,
    month: None,
    day: None,
};

static PATTERNS: LazyLock<Vec<(Regex, Shape)>> = LazyLock::new(|| {
    [
        // date-time; the time part is dropped
        (r"^(\d{4})-(\d{1,2})-(\d{1,2})[T ]\S", YEAR_FIRST),
        (r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$", YEAR_FIRST),
        (r"^(\d{1,2})[-/](\d{1,2})[-/](\d{4})$", DAY_FIRST),
        (r"^(\d{4})(\d{2})(\d{2})$", YEAR_FIRST),
        (r"^(\d{4})[-/](\d{1,2})$", YEAR_MONTH),
        (r"^(\d{4})$", YEAR_ONLY),
    ]
    .into_iter()
    .map(|(pattern, shape)| (Regex::new(pattern).expect("date pattern is valid"), shape))
    .collect()
});

/// Parse a date cell. Empty cells, `nan` and unrecognised text give `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return None;
    }

    PATTERNS.iter().find_map(|(re, shape)| {
        let caps = re.captures(text)?;
        build_date(&caps, *shape)
    })
}

fn build_date(caps: &Captures<'_>, shape: Shape) -> Option<NaiveDate> {
    let number = |group: Option<usize>| -> Option<u32> {
        match group {
            Some(i) => caps.get(i)?.as_str().parse().ok(),
            None => Some(1),
        }
    };
    let year: i32 = caps.get(shape.year)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, number(shape.month)?, number(shape.day)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_full_dates() {
        assert_eq!(parse_date("2024-01-05"), ymd(2024, 1, 5));
        assert_eq!(parse_date("2024/1/5"), ymd(2024, 1, 5));
        assert_eq!(parse_date("20240105"), ymd(2024, 1, 5));
        assert_eq!(parse_date(" 2024-01-05 "), ymd(2024, 1, 5));
    }

    #[test]
    fn test_partial_dates_resolve_to_first_day() {
        assert_eq!(parse_date("2021-01"), ymd(2021, 1, 1));
        assert_eq!(parse_date("2021"), ymd(2021, 1, 1));
        assert_eq!(parse_date("2021/07"), ymd(2021, 7, 1));
    }

    #[test]
    fn test_day_first() {
        assert_eq!(parse_date("01-03-2021"), ymd(2021, 3, 1));
        assert_eq!(parse_date("31/12/2020"), ymd(2020, 12, 31));
    }

    #[test]
    fn test_date_time() {
        assert_eq!(parse_date("2023-06-30T14:22:01Z"), ymd(2023, 6, 30));
        assert_eq!(parse_date("2023-06-30 14:22"), ymd(2023, 6, 30));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("nan"), None);
        assert_eq!(parse_date("unknown"), None);
        assert_eq!(parse_date("2021-13-01"), None);
        assert_eq!(parse_date("31-02-2021"), None);
    }
}
