//! Readers for the line grammars the prompt templates ask for.
//!
//! Model output is untrusted text. Nothing in here fails: a line that does
//! not fit its grammar is dropped (and logged at `debug`), a missing value
//! becomes `None`, and the caller picks the default.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::types::Importance;

static RE_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("static regex"));

static RE_ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?:[Qq]\s*)?\d+\s*[.):]|[-*•])\s*").expect("static regex")
});

static RE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*(?:because\s+of|because|see|citing)\s*:?\s*([\d,\s&and]+)\)")
        .expect("static regex")
});

static RE_PLAN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*(?:[-*•]|\d+[.)])?\s*
        (?P<hour>\d{1,2})(?::(?P<minute>\d{2}))?\s*(?P<meridiem>[ap]\.?m\.?)?
        \s*[-–—]\s*
        (?P<desc>.+?)\s*
        \(\s*duration\s*:\s*(?P<dur>\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\s*
        ,\s*priority\s*:\s*(?P<prio>-?\d+)\s*
        (?:,\s*location\s*:\s*(?P<loc>[^)]*?)\s*)?
        \)\s*\.?\s*$",
    )
    .expect("static regex")
});

static RE_BEHAVIOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*(?:[-*•]|\d+[.)])?\s*
        (?P<offset>\d+)\s*(?:min(?:ute)?s?)?
        \s*[-–—]\s*
        (?P<desc>.+?)\s*
        \(\s*duration\s*:\s*(?P<dur>\d+)\s*(?:min(?:ute)?s?|m)\s*\)\s*\.?\s*$",
    )
    .expect("static regex")
});

/// Longest activity a daily-plan line may describe.
pub const MAX_PLAN_HOURS: f64 = 24.0;

/// Questions used to fill a reflection pass when the model returns fewer.
pub const FALLBACK_QUESTIONS: [&str; 3] = [
    "What matters most to me right now?",
    "Who have I been spending my time with, and how do I feel about them?",
    "What has changed in my life recently?",
];

/// First integer in `response`, clamped to the importance scale.
#[must_use]
pub fn parse_importance(response: &str) -> Option<Importance> {
    let raw = RE_INTEGER.find(response)?.as_str();
    let value = raw.parse::<i64>().unwrap_or(if raw.starts_with('-') { i64::MIN } else { i64::MAX });
    Some(Importance::new(value))
}

/// Remove a leading `1.`, `2)`, `Q3:`, `-`, `*` or `•` marker.
#[must_use]
pub fn strip_enumeration(line: &str) -> &str {
    let stripped = match RE_ENUMERATION.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    stripped.trim()
}

/// Exactly `count` questions: lines ending in `?`, enumeration stripped,
/// truncated, then padded from [`FALLBACK_QUESTIONS`].
#[must_use]
pub fn parse_questions(response: &str, count: usize) -> Vec<String> {
    let mut questions: Vec<String> = response
        .lines()
        .map(strip_enumeration)
        .filter(|line| line.ends_with('?'))
        .map(ToString::to_string)
        .take(count)
        .collect();

    let parsed = questions.len();
    for fallback in FALLBACK_QUESTIONS.iter().cycle().take(count.saturating_sub(parsed)) {
        questions.push((*fallback).to_string());
    }
    if parsed < count {
        debug!(parsed, count, "Padded reflection questions with fallbacks");
    }
    questions
}

/// One insight line with the evidence it cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insight {
    /// Insight text, citation removed.
    pub text: String,
    /// Zero-based indices into the evidence list.
    pub citations: Vec<usize>,
}

/// Insight lines in the form `text (because of 1, 5, 3)`.
///
/// Citations are 1-based in the text; out-of-range numbers are ignored.
/// Lines without a citation are kept with no citations.
#[must_use]
pub fn parse_insights(response: &str, evidence_len: usize) -> Vec<Insight> {
    let mut insights = Vec::new();
    for line in response.lines() {
        let line = strip_enumeration(line);
        if line.is_empty() {
            continue;
        }

        let mut citations = Vec::new();
        let text = match RE_CITATION.captures(line) {
            Some(caps) => {
                if let Some(numbers) = caps.get(1) {
                    for n in RE_INTEGER.find_iter(numbers.as_str()) {
                        match n.as_str().parse::<usize>() {
                            Ok(i) if (1..=evidence_len).contains(&i) && !citations.contains(&(i - 1)) => {
                                citations.push(i - 1);
                            }
                            _ => debug!(citation = n.as_str(), "Ignored out-of-range citation"),
                        }
                    }
                }
                RE_CITATION.replace(line, "").trim().to_string()
            }
            None => line.to_string(),
        };

        let text = text.trim_end_matches(|c: char| c == ',' || c.is_whitespace()).to_string();
        if text.is_empty() {
            continue;
        }
        insights.push(Insight { text, citations });
    }
    insights
}

/// Short items, one per line: enumeration, quotes and trailing periods
/// stripped, case-insensitive duplicates removed, at most `max` kept.
#[must_use]
pub fn parse_list_lines(response: &str, max: usize) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in response.lines() {
        let item = clean_item(strip_enumeration(line));
        if item.is_empty() || items.iter().any(|i| i.eq_ignore_ascii_case(&item)) {
            continue;
        }
        items.push(item);
        if items.len() == max {
            break;
        }
    }
    items
}

/// Topic tags. Like [`parse_list_lines`], but a single comma-separated
/// line is split into tags too.
#[must_use]
pub fn parse_topics(response: &str, max: usize) -> Vec<String> {
    let non_empty: Vec<&str> = response.lines().filter(|l| !l.trim().is_empty()).collect();
    if non_empty.len() == 1 && non_empty[0].contains(',') {
        let joined = non_empty[0].split(',').collect::<Vec<_>>().join("\n");
        return parse_list_lines(&joined, max);
    }
    parse_list_lines(response, max)
}

fn clean_item(raw: &str) -> String {
    raw.trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim()
        .to_string()
}

/// A schedule line read from a daily-plan response.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanLine {
    /// Activity description.
    pub description: String,
    /// Absolute start on the planned day.
    pub start: DateTime<Utc>,
    /// Length of the activity; positive and at most [`MAX_PLAN_HOURS`].
    pub duration: Duration,
    /// `start + duration`, computed without overflow.
    pub end: DateTime<Utc>,
    /// Priority in `[1, 10]`.
    pub priority: u8,
    /// Where it happens, if given.
    pub location: Option<String>,
}

/// Parse one line of the daily-plan grammar for the calendar day `date`.
///
/// Accepts `7:00 AM`, `7 AM`, `07:00` and `19:30` start times and
/// fractional hour durations. Durations that are not positive, exceed
/// [`MAX_PLAN_HOURS`], or push the end past the representable range are
/// rejected.
#[must_use]
pub fn parse_plan_line(line: &str, date: NaiveDate) -> Option<PlanLine> {
    let caps = RE_PLAN_LINE.captures(line)?;
    let hour: u32 = caps.name("hour")?.as_str().parse().ok()?;
    let minute: u32 = caps.name("minute").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let meridiem = caps.name("meridiem").map(|m| m.as_str().to_ascii_lowercase());
    let time = clock_time(hour, minute, meridiem.as_deref())?;

    let hours: f64 = caps.name("dur")?.as_str().parse().ok()?;
    if !hours.is_finite() || hours > MAX_PLAN_HOURS {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (hours * 3_600_000.0).round() as i64;
    if millis <= 0 {
        return None;
    }
    let duration = Duration::try_milliseconds(millis)?;
    let start = date.and_time(time).and_utc();
    let end = start.checked_add_signed(duration)?;

    let priority: i64 = caps.name("prio")?.as_str().parse().ok()?;
    let location = caps
        .name("loc")
        .map(|m| clean_item(m.as_str()))
        .filter(|l| !l.is_empty());
    let description = caps.name("desc")?.as_str().trim().to_string();
    if description.is_empty() {
        return None;
    }

    Some(PlanLine {
        description,
        start,
        duration,
        end,
        priority: priority.clamp(1, 10) as u8,
        location,
    })
}

/// Every well-formed plan line in `response`; the rest are dropped.
#[must_use]
pub fn parse_plan(response: &str, date: NaiveDate) -> Vec<PlanLine> {
    response
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_plan_line(line, date);
            if parsed.is_none() {
                debug!(line, "Dropped malformed plan line");
            }
            parsed
        })
        .collect()
}

fn clock_time(hour: u32, minute: u32, meridiem: Option<&str>) -> Option<NaiveTime> {
    let hour = match meridiem {
        Some(m) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let pm = m.starts_with('p');
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// A behavior line read from a decomposition response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorLine {
    /// Minutes after the parent plan's start.
    pub offset_minutes: i64,
    /// What the character does.
    pub description: String,
    /// Length in minutes; always positive.
    pub duration_minutes: i64,
}

/// Parse one line of the behavior grammar. Numbers beyond `i64` are
/// rejected here; fitting the line into its parent's window is the
/// planner's job.
#[must_use]
pub fn parse_behavior_line(line: &str) -> Option<BehaviorLine> {
    let caps = RE_BEHAVIOR_LINE.captures(line)?;
    let offset_minutes: i64 = caps.name("offset")?.as_str().parse().ok()?;
    let duration_minutes: i64 = caps.name("dur")?.as_str().parse().ok()?;
    let description = caps.name("desc")?.as_str().trim().to_string();
    if duration_minutes <= 0 || description.is_empty() {
        return None;
    }
    Some(BehaviorLine {
        offset_minutes,
        description,
        duration_minutes,
    })
}

/// Every well-formed behavior line in `response`.
#[must_use]
pub fn parse_behaviors(response: &str) -> Vec<BehaviorLine> {
    response
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_behavior_line(line);
            if parsed.is_none() {
                debug!(line, "Dropped malformed behavior line");
            }
            parsed
        })
        .collect()
}

/// First non-empty line, cleaned of enumeration and quotes.
#[must_use]
pub fn first_line(response: &str) -> Option<String> {
    response
        .lines()
        .map(|l| clean_item(strip_enumeration(l)))
        .find(|l| !l.is_empty())
}

/// Index of the candidate named by `response`: exact case-insensitive match
/// first, then the longest candidate contained in the answer, then the
/// first candidate containing the answer.
#[must_use]
pub fn parse_location_choice(response: &str, candidates: &[&str]) -> Option<usize> {
    let answer = first_line(response)?.to_lowercase();
    let lowered: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();

    if let Some(i) = lowered.iter().position(|c| *c == answer) {
        return Some(i);
    }
    let contained = lowered
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_empty() && answer.contains(c.as_str()))
        .max_by_key(|(i, c)| (c.len(), std::cmp::Reverse(*i)))
        .map(|(i, _)| i);
    contained.or_else(|| lowered.iter().position(|c| c.contains(answer.as_str())))
}
