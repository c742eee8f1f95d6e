//! Schedule rule resolution: the effective attendance rule for a date.
//!
//! Layers, applied per (resource, room, date):
//!
//! 1. the weekly entry for the date's weekday;
//! 2. the holiday-override entry (day code 9), when the date is a global
//!    holiday, replacing the weekly rule even when it says "does not attend";
//! 3. a specific-date entry (day code 99) for that exact date with
//!    `attends = true`, replacing both of the above;
//! 4. the personal holiday veto, which wins over everything.
//!
//! The order is not commutative. The veto is checked first so nothing else is
//! even parsed on a personal holiday.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;

use crate::error::{AgendaError, Result};
use crate::holiday::HolidaySet;
use crate::model::{parse_time_of_day, EntryKind, Resource, ResourceId, RoomId, ScheduleEntry};

/// Which schedule layer produced an [`EffectiveRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleSource {
    Weekly,
    HolidayOverride,
    SpecificDate,
}

/// A half-open `[start, end)` break inside the working hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// The single resolved attendance rule for a resource, room and date.
///
/// Only exists when the resource attends; "does not attend" is `None` at the
/// call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveRule {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub break_window: Option<BreakWindow>,
    pub source: RuleSource,
}

impl EffectiveRule {
    /// Whether `time` lies inside `[start, end)` and outside the break.
    pub fn admits(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end && !self.in_break(time)
    }

    /// `[break_start, break_end)`: a slot starting exactly at the break end is
    /// free, one starting exactly at the break start is not.
    pub fn in_break(&self, time: NaiveTime) -> bool {
        self.break_window
            .map(|b| time >= b.start && time < b.end)
            .unwrap_or(false)
    }
}

/// The holiday sets a resolution consults.
#[derive(Debug, Clone, Copy)]
pub struct HolidayContext<'a> {
    pub global: &'a HolidaySet,
    pub personal: &'a HolidaySet,
}

/// A resource's entries for one room, indexed by layer.
///
/// Built once per scan; when the stored data violates the one-entry-per-code
/// invariant the first entry wins (see [`validate_schedule`]).
#[derive(Debug, Clone)]
pub struct RoomSchedule<'a> {
    resource_id: ResourceId,
    room_id: RoomId,
    weekly: [Option<&'a ScheduleEntry>; 7],
    holiday: Option<&'a ScheduleEntry>,
    specific: HashMap<NaiveDate, &'a ScheduleEntry>,
}

impl<'a> RoomSchedule<'a> {
    pub fn new(resource: &'a Resource, room_id: RoomId) -> Self {
        let mut schedule = Self {
            resource_id: resource.id,
            room_id,
            weekly: [None; 7],
            holiday: None,
            specific: HashMap::new(),
        };

        for entry in resource.schedule.iter().filter(|e| e.room_id == room_id) {
            match entry.kind() {
                Some(EntryKind::Weekly(day)) => {
                    let slot = &mut schedule.weekly[day.num_days_from_sunday() as usize];
                    slot.get_or_insert(entry);
                }
                Some(EntryKind::HolidayOverride) => {
                    schedule.holiday.get_or_insert(entry);
                }
                Some(EntryKind::SpecificDate(date)) => {
                    // Only positive specific-date entries ever apply.
                    if entry.attends {
                        schedule.specific.entry(date).or_insert(entry);
                    }
                }
                None => {}
            }
        }

        schedule
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether any entry at all exists for this room.
    pub fn is_empty(&self) -> bool {
        self.weekly.iter().all(Option::is_none)
            && self.holiday.is_none()
            && self.specific.is_empty()
    }

    /// Resolve the effective rule for `date`.
    ///
    /// Returns `Ok(None)` when the resource does not attend.
    ///
    /// # Errors
    /// Returns `AgendaError::InvalidScheduleEntry` when the entry that governs
    /// `date` has malformed or inconsistent hours. Callers decide whether that
    /// degrades the date or aborts.
    pub fn resolve(&self, date: NaiveDate, holidays: HolidayContext<'_>) -> Result<Option<EffectiveRule>> {
        if holidays.personal.contains(date) {
            return Ok(None);
        }

        if let Some(entry) = self.specific.get(&date) {
            return self.hours_of(entry, RuleSource::SpecificDate).map(Some);
        }

        let (entry, source) = match self.holiday {
            Some(entry) if holidays.global.contains(date) => (Some(entry), RuleSource::HolidayOverride),
            _ => (self.weekly_entry(date.weekday()), RuleSource::Weekly),
        };

        match entry {
            Some(entry) if entry.attends => self.hours_of(entry, source).map(Some),
            _ => Ok(None),
        }
    }

    fn weekly_entry(&self, day: Weekday) -> Option<&'a ScheduleEntry> {
        self.weekly[day.num_days_from_sunday() as usize]
    }

    fn hours_of(&self, entry: &ScheduleEntry, source: RuleSource) -> Result<EffectiveRule> {
        entry_hours(entry, source).map_err(|reason| AgendaError::InvalidScheduleEntry {
            resource_id: self.resource_id,
            room_id: self.room_id,
            reason,
        })
    }
}

/// Resolve the effective rule for one resource, room and date.
///
/// Convenience over [`RoomSchedule::resolve`] for one-off lookups; scans build
/// the [`RoomSchedule`] once and reuse it.
pub fn resolve_rule(
    resource: &Resource,
    room_id: RoomId,
    date: NaiveDate,
    holidays: HolidayContext<'_>,
) -> Result<Option<EffectiveRule>> {
    RoomSchedule::new(resource, room_id).resolve(date, holidays)
}

fn entry_hours(entry: &ScheduleEntry, source: RuleSource) -> std::result::Result<EffectiveRule, String> {
    let start = parse_time_of_day(&entry.start).map_err(|e| e.to_string())?;
    let end = parse_time_of_day(&entry.end).map_err(|e| e.to_string())?;
    if start >= end {
        return Err(format!("start {} is not before end {}", entry.start, entry.end));
    }

    let break_start = non_blank(entry.break_start.as_deref());
    let break_end = non_blank(entry.break_end.as_deref());
    let break_window = match (break_start, break_end) {
        (None, None) => None,
        (Some(bs), Some(be)) => {
            let bs = parse_time_of_day(bs).map_err(|e| e.to_string())?;
            let be = parse_time_of_day(be).map_err(|e| e.to_string())?;
            if bs >= be {
                return Err(format!("break start {} is not before break end {}", bs, be));
            }
            if bs < start || be > end {
                return Err(format!("break {}-{} lies outside {}-{}", bs, be, start, end));
            }
            Some(BreakWindow { start: bs, end: be })
        }
        _ => return Err("break needs both a start and an end".to_string()),
    };

    Ok(EffectiveRule {
        start,
        end,
        break_window,
        source,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    UnknownDayCode,
    MissingDate,
    Duplicate,
    InvalidHours,
}

/// A violated schedule-entry invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleIssue {
    pub resource_id: ResourceId,
    pub room_id: RoomId,
    pub day_code: u8,
    pub date: Option<NaiveDate>,
    pub kind: IssueKind,
    pub detail: String,
}

impl fmt::Display for ScheduleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "resource {} room {} day {}",
            self.resource_id, self.room_id, self.day_code
        )?;
        if let Some(date) = self.date {
            write!(f, " ({})", date)?;
        }
        write!(f, ": {:?}: {}", self.kind, self.detail)
    }
}

/// Check a resource's entries against the schedule invariants.
///
/// At most one entry per (room, day code) except specific-date entries, which
/// must have distinct dates; every attending entry needs `start < end` and a
/// break, if any, ordered and inside the working hours. Non-attending entries
/// are not required to carry hours.
pub fn validate_schedule(resource: &Resource) -> Vec<ScheduleIssue> {
    let mut issues = Vec::new();
    let mut seen: HashMap<(RoomId, EntryKind), usize> = HashMap::new();

    for entry in &resource.schedule {
        let issue = |kind: IssueKind, detail: String| ScheduleIssue {
            resource_id: resource.id,
            room_id: entry.room_id,
            day_code: entry.day_code,
            date: entry.date,
            kind,
            detail,
        };

        let Some(kind) = entry.kind() else {
            if entry.day_code == crate::model::SPECIFIC_DATE_DAY_CODE {
                issues.push(issue(IssueKind::MissingDate, "specific-date entry without a date".into()));
            } else {
                issues.push(issue(IssueKind::UnknownDayCode, format!("unknown day code {}", entry.day_code)));
            }
            continue;
        };

        let count = seen.entry((entry.room_id, kind)).or_insert(0);
        *count += 1;
        if *count == 2 {
            issues.push(issue(IssueKind::Duplicate, "more than one entry for this day".into()));
        }

        if entry.attends {
            if let Err(detail) = entry_hours(entry, RuleSource::Weekly) {
                issues.push(issue(IssueKind::InvalidHours, detail));
            }
        }
    }

    issues
}
