//! Cell-level parsers
//!
//! Every function here is total: a malformed cell yields a sentinel
//! (`None`, zero, or the trimmed input), never an error.

use std::sync::OnceLock;

use chrono::{DateTime, DurationRound, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn guest_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?s)(.*?)\s*\(([^()]*)\)\s*$").expect("valid regex"))
}

/// Trim and collapse internal whitespace runs to a single space
pub fn collapse_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s.trim(), " ").into_owned()
}

/// Case-fold and collapse whitespace (event names, order types)
pub fn fold_text(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Clean a header: trimmed, lower-cased, whitespace runs replaced by `_`
pub fn clean_column_name(name: &str) -> String {
    let name = name.trim_start_matches('\u{feff}');
    whitespace_re()
        .replace_all(name.trim(), "_")
        .to_lowercase()
}

/// Largest amount accepted in a single currency cell
pub const MAX_CURRENCY: f64 = 1_000_000_000.0;

/// Parse a currency string such as `"£1,234.50"`
///
/// Returns `None` for anything that is not a non-negative finite number no
/// larger than [`MAX_CURRENCY`] once currency symbols, thousands separators
/// and whitespace are removed. Blank cells parse as zero.
pub fn parse_currency(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Some(0.0);
    }

    let value = cleaned.parse::<f64>().ok()?;
    if value.is_finite() && (0.0..=MAX_CURRENCY).contains(&value) {
        // Normalize -0.0
        Some(value.abs())
    } else {
        None
    }
}

/// Currency value with zero as the coercion sentinel; the flag is true when coerced
pub fn coerce_currency(s: &str) -> (f64, bool) {
    match parse_currency(s) {
        Some(v) => (v, false),
        None => (0.0, true),
    }
}

/// Quantity cell; blank or malformed values are `None`
pub fn parse_quantity(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// A packed `"Name (identifier)"` field split in two
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestField {
    pub name: String,
    /// Lower-cased contents of the trailing parentheses
    pub identifier: Option<String>,
}

/// Split `"Jo Bloggs (Jo@Example.com)"` into name and lower-cased identifier
///
/// When the trailing-parentheses pattern does not match, the whole trimmed
/// string is the name and the identifier is `None`.
pub fn split_guest(s: &str) -> GuestField {
    if let Some(caps) = guest_re().captures(s.trim()) {
        let name = collapse_whitespace(&caps[1]);
        let identifier = caps[2].trim().to_lowercase();
        return GuestField {
            name,
            identifier: (!identifier.is_empty()).then_some(identifier),
        };
    }

    GuestField {
        name: collapse_whitespace(s),
        identifier: None,
    }
}

/// A location prefix rewrite applied after case-folding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPrefix {
    pub from: String,
    pub to: String,
}

/// Standardizes free-text box locations so both sources agree
#[derive(Debug, Clone, Default)]
pub struct LocationStandardizer {
    prefixes: Vec<LocationPrefix>,
}

impl LocationStandardizer {
    pub fn new(prefixes: &[LocationPrefix]) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .map(|p| LocationPrefix {
                    from: p.from.to_lowercase(),
                    to: p.to.to_lowercase(),
                })
                .collect(),
        }
    }

    /// Case-fold, collapse whitespace, then apply the first matching prefix rewrite
    pub fn standardize(&self, location: &str) -> String {
        let folded = fold_text(location);
        for prefix in &self.prefixes {
            if let Some(rest) = folded.strip_prefix(prefix.from.as_str()) {
                return format!("{}{}", prefix.to, rest);
            }
        }
        folded
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %b %Y", "%d %B %Y"];

/// Parse a timestamp or date cell and round it to the minute
///
/// Exports are day-first. Offsets in RFC 3339 values are dropped in favour
/// of the local wall-clock time, which is what the manual exports carry.
/// Date-only values become midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(round_to_minute(dt.naive_local()));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(round_to_minute(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Round to the nearest minute (half a minute rounds up)
pub fn round_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.duration_round(TimeDelta::minutes(1)).unwrap_or(dt)
}
