//! Date-range inference from free-text questions (§4.6.1).
//!
//! Check order mirrors the original service exactly: word-form quarter
//! phrase, numeric quarter (all four surface orderings), previous
//! quarter, explicit `за|в|на YYYY` year, previous year, Russian
//! month-stem match, previous month, `последние N месяцев/недель/дней`,
//! then `None`. Month stems are checked in calendar order so the short
//! May stem (`ма`) never shadows a longer stem checked earlier.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::DateRange;

const QUARTER_WORDS: &[(&str, i32)] = &[
    ("первый", 1),
    ("первого", 1),
    ("первом", 1),
    ("второй", 2),
    ("второго", 2),
    ("втором", 2),
    ("третий", 3),
    ("третьего", 3),
    ("третьем", 3),
    ("четвертый", 4),
    ("четвертого", 4),
    ("четвертом", 4),
];

const MONTHS_RU: &[(&str, u32)] = &[
    ("январ", 1),
    ("феврал", 2),
    ("март", 3),
    ("апрел", 4),
    ("ма", 5),
    ("июн", 6),
    ("июл", 7),
    ("август", 8),
    ("сентябр", 9),
    ("октябр", 10),
    ("ноябр", 11),
    ("декабр", 12),
];

static YEAR_ANYWHERE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").unwrap());
static Q_YYYY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"q([1-4])\s*(\d{4})").unwrap());
static YYYY_Q_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})\s*q([1-4])").unwrap());
static QUARTAL_YYYY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([1-4])\s*(?:й|ый|ой|ий)?\s*квартал\s*(\d{4})").unwrap());
static QUARTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([1-4])\s*(?:й|ый|ой|ий)?\s*квартал").unwrap());
static PREV_QUARTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"прошл\w*\s+квартал|предыдущ\w*\s+квартал").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:за|в|на)\s*(\d{4})\s*(?:год|г\.?)?").unwrap());
static PREV_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"прошл\w*\s+год|предыдущ\w*\s+год").unwrap());
static PREV_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"прошл\w*\s+месяц|предыдущ\w*\s+месяц").unwrap());
static LAST_N_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"последни[ех]\s+(\d+)\s*(месяц|недел|дн)").unwrap());

/// Parse `question` for a date range, using `now` as the reference
/// instant for every relative expression. Returns `None` — not an
/// error — when nothing matches (§8 Boundary behaviors); the caller
/// treats that as "no date constraint".
pub fn parse_date_range(question: &str, now: DateTime<Utc>) -> Option<DateRange> {
    let q = question.to_lowercase();
    let current_year = now.year();

    if let Some(range) = match_word_quarter(&q, current_year) {
        return Some(range);
    }
    if let Some(range) = match_numeric_quarter(&q, current_year) {
        return Some(range);
    }
    if PREV_QUARTER_RE.is_match(&q) {
        let current_quarter = now.month0() as i32 / 3 + 1;
        return Some(if current_quarter == 1 {
            quarter_to_range(4, current_year - 1)
        } else {
            quarter_to_range(current_quarter - 1, current_year)
        });
    }
    if let Some(caps) = YEAR_RE.captures(&q) {
        let year: i32 = caps[1].parse().ok()?;
        return Some(year_range(year));
    }
    if PREV_YEAR_RE.is_match(&q) {
        return Some(year_range(current_year - 1));
    }
    if let Some(range) = match_month(&q, current_year) {
        return Some(range);
    }
    if PREV_MONTH_RE.is_match(&q) {
        return Some(previous_month_range(now));
    }
    if let Some(caps) = LAST_N_RE.captures(&q) {
        let n: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_string();
        let start = if unit.contains("месяц") {
            now - Duration::days(n * 30)
        } else if unit.contains("недел") {
            now - Duration::weeks(n)
        } else {
            now - Duration::days(n)
        };
        return Some(DateRange {
            start,
            end: now,
            description: format!("последние {n} {unit}*"),
        });
    }

    None
}

fn match_word_quarter(q: &str, current_year: i32) -> Option<DateRange> {
    if !q.contains("квартал") {
        return None;
    }
    for (word, q_num) in QUARTER_WORDS {
        if q.contains(word) {
            let year = YEAR_ANYWHERE_RE
                .find(q)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(current_year);
            return Some(quarter_to_range(*q_num, year));
        }
    }
    None
}

fn match_numeric_quarter(q: &str, current_year: i32) -> Option<DateRange> {
    if let Some(caps) = Q_YYYY_RE.captures(q) {
        let quarter: i32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return Some(quarter_to_range(quarter, year));
    }
    if let Some(caps) = YYYY_Q_RE.captures(q) {
        let year: i32 = caps[1].parse().ok()?;
        let quarter: i32 = caps[2].parse().ok()?;
        return Some(quarter_to_range(quarter, year));
    }
    if let Some(caps) = QUARTAL_YYYY_RE.captures(q) {
        let quarter: i32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return Some(quarter_to_range(quarter, year));
    }
    if let Some(caps) = QUARTAL_RE.captures(q) {
        let quarter: i32 = caps[1].parse().ok()?;
        return Some(quarter_to_range(quarter, current_year));
    }
    None
}

fn match_month(q: &str, current_year: i32) -> Option<DateRange> {
    for (stem, month_num) in MONTHS_RU {
        if q.contains(stem) {
            let year = YEAR_ANYWHERE_RE
                .find(q)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(current_year);
            let start = Utc.with_ymd_and_hms(year, *month_num, 1, 0, 0, 0).single()?;
            let end = end_of_month(year, *month_num);
            return Some(DateRange {
                start,
                end,
                description: format!("{stem}* {year}"),
            });
        }
    }
    None
}

fn previous_month_range(now: DateTime<Utc>) -> DateRange {
    let first_of_this_month = Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).unwrap();
    let last_of_prev_month = first_of_this_month - Duration::days(1);
    let start = Utc
        .with_ymd_and_hms(last_of_prev_month.year(), last_of_prev_month.month(), 1, 0, 0, 0)
        .unwrap();
    let end = Utc
        .with_ymd_and_hms(
            last_of_prev_month.year(),
            last_of_prev_month.month(),
            last_of_prev_month.day(),
            23,
            59,
            59,
        )
        .unwrap();
    DateRange {
        start,
        end,
        description: "прошлый месяц".to_string(),
    }
}

fn year_range(year: i32) -> DateRange {
    DateRange {
        start: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59).unwrap(),
        description: format!("{year} год"),
    }
}

fn quarter_to_range(quarter: i32, year: i32) -> DateRange {
    let (start_month, end_month): (u32, u32) = match quarter {
        1 => (1, 3),
        2 => (4, 6),
        3 => (7, 9),
        _ => (10, 12),
    };
    let start = Utc.with_ymd_and_hms(year, start_month, 1, 0, 0, 0).unwrap();
    let end = end_of_month(year, end_month);
    DateRange {
        start,
        end,
        description: format!("Q{quarter} {year}"),
    }
}

fn end_of_month(year: i32, month: u32) -> DateTime<Utc> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).unwrap();
    let last_day = first_of_next - Duration::days(1);
    Utc.with_ymd_and_hms(last_day.year(), last_day.month(), last_day.day(), 23, 59, 59)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn q4_2025_with_latin_marker() {
        let range = parse_date_range("что обсудили в Q4 2025?", fixed_now()).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap());
        assert_eq!(range.description, "Q4 2025");
    }

    #[test]
    fn year_first_quarter_order() {
        let range = parse_date_range("2025 q2 что было", fixed_now()).unwrap();
        assert_eq!(range.description, "Q2 2025");
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn russian_numeric_quarter_with_year() {
        let range = parse_date_range("3 квартал 2024", fixed_now()).unwrap();
        assert_eq!(range.description, "Q3 2024");
    }

    #[test]
    fn russian_word_quarter_defaults_to_current_year() {
        let range = parse_date_range("что обсуждали в четвертом квартале?", fixed_now()).unwrap();
        assert_eq!(range.description, "Q4 2026");
    }

    #[test]
    fn previous_quarter_rolls_year_in_q1() {
        let now = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let range = parse_date_range("что было в прошлом квартале", now).unwrap();
        assert_eq!(range.description, "Q4 2025");
    }

    #[test]
    fn explicit_year_mention() {
        let range = parse_date_range("что произошло за 2023 год", fixed_now()).unwrap();
        assert_eq!(range.description, "2023 год");
        assert_eq!(range.end, Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn previous_year() {
        let range = parse_date_range("что было в прошлом году", fixed_now()).unwrap();
        assert_eq!(range.description, "2025 год");
    }

    #[test]
    fn month_name_with_year() {
        let range = parse_date_range("что было в марте 2024", fixed_now()).unwrap();
        assert_eq!(range.description, "март* 2024");
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn may_stem_does_not_get_shadowed_by_march() {
        let range = parse_date_range("что было в мае 2024", fixed_now()).unwrap();
        assert_eq!(range.description, "ма* 2024");
    }

    #[test]
    fn last_n_days() {
        let now = fixed_now();
        let range = parse_date_range("что обсуждали последние 7 дн", now).unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, now - Duration::days(7));
    }

    #[test]
    fn no_match_returns_none() {
        assert!(parse_date_range("расскажи про Acme", fixed_now()).is_none());
    }
}
