//! Rule-based extraction of task fields from free text.
//!
//! Every step works on the lowercased input for matching and strips what it
//! recognized from a working copy of the title. Pattern order matters: the
//! first time pattern that matches wins, and the first category whose keywords
//! appear wins.

use crate::category::Category;
use crate::task::{ParsedTask, Priority, DEFAULT_DURATION};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TIME_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        r"at\s+(?P<h>\d{1,2}):(?P<m>\d{2})\s*(?P<ampm>am|pm)?",
        r"at\s+(?P<h>\d{1,2})\s*(?P<ampm>am|pm)",
        r"(?P<h>\d{1,2}):(?P<m>\d{2})\s*(?P<ampm>am|pm)?",
        r"(?P<h>\d{1,2})\s*(?P<ampm>am|pm)",
    ]
    .map(|p| Regex::new(p).expect("valid time pattern"))
});

static TOMORROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btomorrow\b").expect("valid tomorrow pattern"));

static WEEKDAYS: Lazy<Vec<(Weekday, &'static str, Regex)>> = Lazy::new(|| {
    [
        (Weekday::Mon, "monday"),
        (Weekday::Tue, "tuesday"),
        (Weekday::Wed, "wednesday"),
        (Weekday::Thu, "thursday"),
        (Weekday::Fri, "friday"),
        (Weekday::Sat, "saturday"),
        (Weekday::Sun, "sunday"),
    ]
    .into_iter()
    .map(|(day, name)| {
        let strip = Regex::new(&format!(r"(?i)\b{}\b", name)).expect("valid weekday pattern");
        (day, name, strip)
    })
    .collect()
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"for\s+(?P<n>\d+)\s*(?P<unit>hours?|hrs?|minutes?|mins?)")
        .expect("valid duration pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

static LEADING_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(at|for|on)\s+").expect("valid pattern"));

/// Keyword table, checked in this order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Work,
        &["meeting", "work", "office", "email", "project", "deadline", "client", "report"],
    ),
    (
        Category::Health,
        &["gym", "workout", "exercise", "doctor", "medicine", "run", "yoga", "dentist"],
    ),
    (
        Category::Errands,
        &[
            "buy", "shop", "return", "pick up", "pickup", "drop off", "amazon", "store", "grocery",
        ],
    ),
    (
        Category::Finance,
        &["pay", "bill", "bank", "tax", "budget", "invoice", "rent", "insurance"],
    ),
    (
        Category::Social,
        &["call", "meet", "lunch", "dinner", "party", "friend", "family", "mom", "dad"],
    ),
    (
        Category::Learning,
        &["study", "learn", "read", "course", "class", "practice", "tutorial"],
    ),
    (
        Category::Home,
        &["clean", "cook", "laundry", "repair", "organize", "dishes", "vacuum"],
    ),
    (Category::Personal, &["appointment", "haircut", "spa", "self-care"]),
];

/// Parses free text into task fields relative to `reference_date`.
///
/// Never fails. Blank input yields an empty title.
pub fn parse(input: &str, reference_date: NaiveDate) -> ParsedTask {
    let text = input.to_lowercase();
    let mut title = input.trim().to_string();

    let time_slot = extract_time(&text).map(|(matched, slot)| {
        title = remove_first(&title, &matched);
        slot
    });

    let date = extract_date(&text, reference_date, &mut title);

    let duration = match extract_duration(&text) {
        Some((matched, minutes)) => {
            title = remove_first(&title, &matched);
            minutes
        }
        None => DEFAULT_DURATION,
    };

    let category = categorize(&text);

    let mut title = clean_title(&title);
    if title.is_empty() {
        title = title_case(input.trim());
    }

    ParsedTask {
        title,
        description: String::new(),
        date,
        time_slot,
        duration,
        priority: Priority::Medium,
        category,
    }
}

/// Returns the matched text and the `HH:MM` slot for the first valid time found.
fn extract_time(text: &str) -> Option<(String, String)> {
    TIME_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .find_map(|caps| Some((caps.get(0)?.as_str().to_string(), time_slot(&caps)?)))
    })
}

fn time_slot(caps: &Captures<'_>) -> Option<String> {
    let mut hour: u32 = caps.name("h")?.as_str().parse().ok()?;
    let minute: u32 = match caps.name("m") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    match caps.name("ampm").map(|m| m.as_str()) {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

fn extract_date(text: &str, reference_date: NaiveDate, title: &mut String) -> NaiveDate {
    if TOMORROW.is_match(text) {
        *title = TOMORROW.replace_all(title, "").trim().to_string();
        return reference_date + Duration::days(1);
    }

    for (day, name, strip) in WEEKDAYS.iter() {
        if text.contains(name) {
            *title = strip.replace_all(title, "").trim().to_string();
            return next_weekday(reference_date, *day);
        }
    }

    reference_date
}

/// Next occurrence of `target` strictly after `from`; the same weekday is a week out.
pub fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let ahead = match (wanted - current).rem_euclid(7) {
        0 => 7,
        n => n,
    };
    from + Duration::days(ahead)
}

fn extract_duration(text: &str) -> Option<(String, u32)> {
    let caps = DURATION.captures(text)?;
    let amount: u32 = caps.name("n")?.as_str().parse().ok()?;
    if amount == 0 {
        return None;
    }
    let minutes = if caps.name("unit")?.as_str().starts_with('h') {
        amount.checked_mul(60)?
    } else {
        amount
    };
    Some((caps.get(0)?.as_str().to_string(), minutes))
}

fn categorize(text: &str) -> Category {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Removes the first case-insensitive occurrence of `fragment`.
fn remove_first(title: &str, fragment: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(fragment))) {
        Ok(re) => re.replace(title, "").trim().to_string(),
        Err(_) => title.to_string(),
    }
}

fn clean_title(title: &str) -> String {
    let collapsed = WHITESPACE.replace_all(title, " ");
    let stripped = LEADING_FILLER.replace(collapsed.trim(), "");
    capitalize_first(stripped.trim())
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalizes every letter that follows a non-letter and lowercases the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn time_patterns_convert_to_24_hour() {
        let cases = [
            ("Standup at 9:15am", "09:15"),
            ("Standup at 9:15 pm", "21:15"),
            ("Standup at 14:30", "14:30"),
            ("Lunch at 12pm", "12:00"),
            ("Check logs at 12 am", "00:00"),
            ("Review 7:05pm", "19:05"),
            ("Review 18:45", "18:45"),
            ("Wake up 6am", "06:00"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                parse(input, monday()).time_slot.as_deref(),
                Some(expected),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn colon_pattern_with_at_beats_bare_am_pm() {
        // "at 10:30" is checked before the bare "5pm" form
        let parsed = parse("Move 5pm slot at 10:30", monday());
        assert_eq!(parsed.time_slot.as_deref(), Some("10:30"));
        assert_eq!(parsed.title, "Move 5pm slot");
    }

    #[test]
    fn bare_hour_without_marker_is_not_a_time() {
        let parsed = parse("Read chapter 3", monday());
        assert_eq!(parsed.time_slot, None);
        assert_eq!(parsed.title, "Read chapter 3");
    }

    #[test]
    fn out_of_range_time_is_skipped() {
        let parsed = parse("Deploy 25:00 build", monday());
        assert_eq!(parsed.time_slot, None);
        assert_eq!(parsed.title, "Deploy 25:00 build");
    }

    #[test]
    fn time_removed_case_insensitively() {
        let parsed = parse("Dentist AT 4PM", monday());
        assert_eq!(parsed.time_slot.as_deref(), Some("16:00"));
        assert_eq!(parsed.title, "Dentist");
        assert_eq!(parsed.category, Category::Health);
    }

    #[test]
    fn weekday_resolves_to_following_occurrence() {
        let parsed = parse("Yoga Wednesday", monday());
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(parsed.title, "Yoga");

        let parsed = parse("Groceries sunday", monday());
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
    }

    #[test]
    fn same_weekday_means_next_week() {
        let parsed = parse("Pay rent monday", monday());
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(parsed.category, Category::Finance);
    }

    #[test]
    fn first_weekday_in_fixed_order_wins() {
        // "tuesday" is checked before "friday" regardless of position
        let parsed = parse("Move friday review to tuesday", monday());
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(parsed.title, "Move friday review to");
    }

    #[test]
    fn tomorrow_beats_weekday() {
        let parsed = parse("Friday prep tomorrow", monday());
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(parsed.title, "Friday prep");
    }

    #[test]
    fn durations_in_hours_and_minutes() {
        assert_eq!(parse("Study for 2 hours", monday()).duration, 120);
        assert_eq!(parse("Study for 1hr", monday()).duration, 60);
        assert_eq!(parse("Nap for 45 minutes", monday()).duration, 45);
        assert_eq!(parse("Nap for 20 mins", monday()).duration, 20);
        assert_eq!(parse("Nap for 0 min", monday()).duration, 60);
    }

    #[test]
    fn duration_phrase_is_stripped_whole() {
        let parsed = parse("Practice piano for 30 minutes", monday());
        assert_eq!(parsed.title, "Practice piano");
        assert_eq!(parsed.category, Category::Learning);
    }

    #[test]
    fn category_order_decides_ties() {
        // "meeting" (work) and "lunch" (social) both match
        assert_eq!(parse("Lunch meeting", monday()).category, Category::Work);
        // "run" (health) sits inside "brunch"
        assert_eq!(parse("Brunch with friends", monday()).category, Category::Health);
        assert_eq!(parse("Haircut", monday()).category, Category::Personal);
    }

    #[test]
    fn leading_filler_word_is_dropped() {
        let parsed = parse("tomorrow on the beach", monday());
        assert_eq!(parsed.title, "The beach");
    }

    #[test]
    fn empty_title_falls_back_to_title_cased_input() {
        let parsed = parse("at 3pm tomorrow", monday());
        assert_eq!(parsed.title, "At 3Pm Tomorrow");
        assert_eq!(parsed.time_slot.as_deref(), Some("15:00"));
    }

    #[test]
    fn blank_input_gives_defaults() {
        let parsed = parse("   ", monday());
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.date, monday());
        assert_eq!(parsed.duration, 60);
        assert_eq!(parsed.category, Category::Other);
    }

    #[test]
    fn capitalization_only_touches_first_character() {
        let parsed = parse("email the CFO about Q3", monday());
        assert_eq!(parsed.title, "Email the CFO about Q3");
    }

    #[test]
    fn next_weekday_wraps_across_months() {
        let sat = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        assert_eq!(
            next_weekday(sat, Weekday::Mon),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
        );
        assert_eq!(
            next_weekday(sat, Weekday::Sat),
            NaiveDate::from_ymd_opt(2024, 4, 6).unwrap()
        );
    }
}
