//! Entity extraction: phone numbers, dates, guest and night counts.

use std::{collections::BTreeMap, sync::LazyLock};

use {
    chrono::{Datelike, Days, NaiveDate},
    regex::Regex,
};

pub const PHONE: &str = "phone";
pub const DATE: &str = "date";
pub const GUESTS: &str = "guests";
pub const NIGHTS: &str = "nights";

#[allow(clippy::unwrap_used)]
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s\-]{7,16}\d").unwrap());

#[allow(clippy::unwrap_used)]
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})(?:[/\-.](\d{2,4}))?\b").unwrap()
});

#[allow(clippy::unwrap_used)]
static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(today|tonight|tomorrow|tmr|hari ini|malam ini|esok|besok)\b|今天|今晚|明天")
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static GUESTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:guests?|pax|people|persons?|adults?|orang)\b|(\d{1,2})\s*(?:位|个人)")
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static NIGHTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:nights?|malam)\b|(\d{1,2})\s*晚").unwrap()
});

/// Extract every recognised entity from `text`. Relative dates resolve
/// against `today`; dates come out as `YYYY-MM-DD`.
#[must_use]
pub fn extract(text: &str, today: NaiveDate) -> BTreeMap<String, String> {
    let mut entities = BTreeMap::new();

    if let Some(date) = extract_date(text, today) {
        entities.insert(DATE.to_string(), date.format("%Y-%m-%d").to_string());
    }

    if let Some(phone) = PHONE_RE.find_iter(text).find_map(|m| {
        let digits: String = m
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        let count = digits.chars().filter(char::is_ascii_digit).count();
        (9..=15).contains(&count).then_some(digits)
    }) {
        entities.insert(PHONE.to_string(), phone);
    }

    if let Some(n) = first_number(&GUESTS_RE, text) {
        entities.insert(GUESTS.to_string(), n.to_string());
    }
    if let Some(n) = first_number(&NIGHTS_RE, text) {
        entities.insert(NIGHTS.to_string(), n.to_string());
    }

    entities
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    let caps = re.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|n| *n > 0)
}

fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = RELATIVE_DATE_RE.captures(text) {
        let word = caps.get(0)?.as_str().to_lowercase();
        let offset = match word.as_str() {
            "tomorrow" | "tmr" | "esok" | "besok" | "明天" => 1,
            _ => 0,
        };
        return today.checked_add_days(Days::new(offset));
    }

    DATE_RE.captures_iter(text).find_map(|caps| {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year = match caps.get(3) {
            Some(y) => {
                let y: i32 = y.as_str().parse().ok()?;
                if y < 100 { 2000 + y } else { y }
            },
            None => today.year(),
        };
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[rstest]
    #[case("arriving tomorrow", "2026-03-15")]
    #[case("check in today", "2026-03-14")]
    #[case("saya sampai esok", "2026-03-15")]
    #[case("明天入住", "2026-03-15")]
    #[case("from 20/3 please", "2026-03-20")]
    #[case("on 5-4-2027", "2027-04-05")]
    fn dates(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(extract(text, today()).get(DATE).unwrap(), expected);
    }

    #[test]
    fn impossible_date_is_ignored() {
        assert!(!extract("room 31/02", today()).contains_key(DATE));
    }

    #[rstest]
    #[case("my number is 012-345 6789", "0123456789")]
    #[case("call +60 12 345 6789", "+60123456789")]
    fn phones(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(extract(text, today()).get(PHONE).unwrap(), expected);
    }

    #[test]
    fn short_numbers_are_not_phones() {
        assert!(!extract("room 1234", today()).contains_key(PHONE));
    }

    #[test]
    fn guests_and_nights() {
        let e = extract("2 pax for 3 nights", today());
        assert_eq!(e.get(GUESTS).unwrap(), "2");
        assert_eq!(e.get(NIGHTS).unwrap(), "3");
    }

    #[test]
    fn malay_counts() {
        let e = extract("4 orang, 2 malam", today());
        assert_eq!(e.get(GUESTS).unwrap(), "4");
        assert_eq!(e.get(NIGHTS).unwrap(), "2");
    }
}
