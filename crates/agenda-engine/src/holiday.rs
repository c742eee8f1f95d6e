//! Holiday set builder: expands holiday spec strings into concrete dates.
//!
//! A spec is either a single date (`2026-12-25`, `25/12/2026`) or an inclusive
//! range of two dates joined by `..`, ` - ` or `-`. Specs are parsed once here;
//! the scanner only ever sees the resulting [`HolidaySet`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{AgendaError, Result};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

// Tried in order. The bare hyphen is last because dates contain hyphens.
const RANGE_SEPARATORS: [&str; 3] = ["..", " - ", "-"];

/// An inclusive span of whole days parsed from one holiday spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolidaySpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl HolidaySpan {
    /// Parse a single holiday spec.
    ///
    /// Reversed ranges are normalized so `first <= last`.
    ///
    /// # Errors
    /// Returns `AgendaError::InvalidHolidaySpec` if neither a single date nor a
    /// range of two dates can be read from `spec`.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Some(day) = parse_date(spec) {
            return Ok(Self {
                first: day,
                last: day,
            });
        }

        // A separator may also occur inside a date (`2026-12-24-2026-12-26`),
        // so every occurrence is a candidate split point.
        for separator in RANGE_SEPARATORS {
            for (at, _) in spec.match_indices(separator) {
                let (a, b) = (&spec[..at], &spec[at + separator.len()..]);
                if let (Some(a), Some(b)) = (parse_date(a.trim()), parse_date(b.trim())) {
                    return Ok(Self {
                        first: a.min(b),
                        last: a.max(b),
                    });
                }
            }
        }

        Err(AgendaError::InvalidHolidaySpec {
            spec: spec.to_string(),
        })
    }

    /// Iterate every day of the span, both endpoints included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }
}

/// A concrete set of whole-day holiday dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dates in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Add every day of `span`.
    pub fn insert_span(&mut self, span: HolidaySpan) {
        self.dates.extend(span.days());
    }
}

impl FromIterator<NaiveDate> for HolidaySet {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// Result of expanding a list of specs: the grown set plus the specs that
/// could not be parsed.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub set: HolidaySet,
    pub skipped: Vec<AgendaError>,
}

/// Expand `specs` into `acc`, returning the accumulator.
///
/// Unparseable specs are skipped (logged at `warn`) and reported in
/// [`Expansion::skipped`]; an empty list returns `acc` unchanged. Expanding
/// the same specs twice yields the same set.
pub fn expand_holidays<S: AsRef<str>>(specs: &[S], acc: HolidaySet) -> Expansion {
    let mut expansion = Expansion {
        set: acc,
        skipped: Vec::new(),
    };

    for spec in specs {
        match HolidaySpan::parse(spec.as_ref()) {
            Ok(span) => expansion.set.insert_span(span),
            Err(err) => {
                warn!(spec = spec.as_ref(), "skipping unparseable holiday spec");
                expansion.skipped.push(err);
            }
        }
    }

    expansion
}

/// Convenience wrapper around [`expand_holidays`] starting from an empty set.
pub fn holiday_set<S: AsRef<str>>(specs: &[S]) -> HolidaySet {
    expand_holidays(specs, HolidaySet::new()).set
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}
