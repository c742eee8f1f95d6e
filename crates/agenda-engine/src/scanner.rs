//! Slot generation: a single forward scan over calendar time.
//!
//! The cursor advances by the service duration and snaps forward whenever the
//! current position cannot hold a slot: to the next midnight on a day the
//! resource does not attend or after closing, to the opening time, to the end
//! of the break, or past every booking it collides with. Each snap lands one
//! duration *before* the target so the next increment lands on it exactly.
//!
//! All arithmetic is whole-minute addition on local wall-clock time, so month
//! and year rollover need no special handling.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::conflict::{ConflictScope, Timeline};
use crate::error::{AgendaError, Result};
use crate::holiday::{holiday_set, HolidaySet};
use crate::model::{BookedInterval, Resource, ResourceId, RoomId};
use crate::schedule::{EffectiveRule, HolidayContext, RoomSchedule};

/// A free candidate interval of the requested duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub hour: u32,
    pub minute: u32,
    pub resource_id: ResourceId,
    pub room_id: RoomId,
}

impl Slot {
    pub fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

/// All free slots on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// English weekday name, e.g. "Monday".
    pub weekday: String,
    pub slots: Vec<Slot>,
}

/// Bounds of a scan in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// First instant a slot may start at.
    pub start: NaiveDateTime,
    /// Last instant a slot may start at.
    pub limit: NaiveDateTime,
    pub duration: Duration,
}

impl ScanWindow {
    /// # Errors
    /// Returns `AgendaError::InvalidDuration` unless `duration_minutes > 0`.
    pub fn new(start: NaiveDateTime, limit: NaiveDateTime, duration_minutes: i64) -> Result<Self> {
        if duration_minutes <= 0 {
            return Err(AgendaError::InvalidDuration(duration_minutes));
        }
        Ok(Self {
            start,
            limit,
            duration: Duration::minutes(duration_minutes),
        })
    }
}

/// What one resource's scan produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub resource_id: ResourceId,
    pub days: Vec<DayBucket>,
    /// Dates treated as "does not attend" because the governing schedule
    /// entry was malformed.
    pub degraded_dates: Vec<NaiveDate>,
}

impl ScanOutcome {
    pub fn slot_count(&self) -> usize {
        self.days.iter().map(|d| d.slots.len()).sum()
    }
}

/// Inputs shared by every per-resource scan of one request.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub window: ScanWindow,
    pub global_holidays: &'a HolidaySet,
    pub bookings: &'a [BookedInterval],
    pub scope: ConflictScope,
    pub timezone: Tz,
}

/// Scan every room in `rooms` the resource works in and merge the results.
pub fn scan_resource(resource: &Resource, rooms: &[RoomId], ctx: &ScanContext<'_>) -> ScanOutcome {
    let personal = holiday_set(&resource.holidays);
    let holidays = HolidayContext {
        global: ctx.global_holidays,
        personal: &personal,
    };

    let mut buckets: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    let mut degraded = BTreeSet::new();

    for &room_id in rooms {
        let schedule = RoomSchedule::new(resource, room_id);
        if schedule.is_empty() {
            continue;
        }
        let timeline = Timeline::for_room(ctx.bookings, resource.id, room_id, ctx.scope, ctx.timezone);
        scan_room(&schedule, resource.id, holidays, &timeline, &ctx.window, &mut buckets, &mut degraded);
    }

    let outcome = ScanOutcome {
        resource_id: resource.id,
        days: into_day_buckets(buckets),
        degraded_dates: degraded.into_iter().collect(),
    };

    if !outcome.degraded_dates.is_empty() {
        warn!(
            resource_id = resource.id,
            dates = outcome.degraded_dates.len(),
            "malformed schedule entries degraded dates to non-attending"
        );
    }
    debug!(
        resource_id = resource.id,
        slots = outcome.slot_count(),
        "resource scan finished"
    );

    outcome
}

/// Forward scan of one (resource, room) pair, appending free slots to
/// `buckets`.
pub fn scan_room(
    schedule: &RoomSchedule<'_>,
    resource_id: ResourceId,
    holidays: HolidayContext<'_>,
    timeline: &Timeline,
    window: &ScanWindow,
    buckets: &mut BTreeMap<NaiveDate, Vec<Slot>>,
    degraded: &mut BTreeSet<NaiveDate>,
) {
    let step = window.duration;
    let mut cursor = window.start - step;
    let mut resolved: Option<(NaiveDate, Option<EffectiveRule>)> = None;

    while cursor <= window.limit {
        cursor += step;
        if cursor > window.limit {
            break;
        }

        let date = cursor.date();
        let rule = match resolved {
            Some((day, rule)) if day == date => rule,
            _ => {
                let rule = match schedule.resolve(date, holidays) {
                    Ok(rule) => rule,
                    Err(err) => {
                        debug!(%date, error = %err, "degrading date");
                        degraded.insert(date);
                        None
                    }
                };
                resolved = Some((date, rule));
                rule
            }
        };

        let Some(rule) = rule else {
            match next_day_start(date) {
                Some(next) => cursor = next - step,
                None => break,
            }
            continue;
        };

        let time = cursor.time();
        if time < rule.start {
            cursor = date.and_time(rule.start) - step;
            continue;
        }
        if time >= rule.end {
            match next_day_start(date) {
                Some(next) => cursor = next - step,
                None => break,
            }
            continue;
        }
        if let Some(pause) = rule.break_window.filter(|_| rule.in_break(time)) {
            cursor = date.and_time(pause.end) - step;
            continue;
        }

        if let Some(free_at) = timeline.blocked_until(cursor, cursor + step) {
            cursor = free_at - step;
            continue;
        }

        buckets.entry(date).or_default().push(Slot {
            hour: time.hour(),
            minute: time.minute(),
            resource_id,
            room_id: schedule.room_id(),
        });
    }
}

/// Merge day buckets from several scans by date, slots ordered by time, then
/// resource, then room.
pub fn merge_buckets<I>(outcomes: I) -> Vec<DayBucket>
where
    I: IntoIterator<Item = ScanOutcome>,
{
    let mut merged: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    for outcome in outcomes {
        for day in outcome.days {
            merged.entry(day.date).or_default().extend(day.slots);
        }
    }
    into_day_buckets(merged)
}

fn into_day_buckets(buckets: BTreeMap<NaiveDate, Vec<Slot>>) -> Vec<DayBucket> {
    buckets
        .into_iter()
        .filter(|(_, slots)| !slots.is_empty())
        .map(|(date, mut slots)| {
            slots.sort_unstable();
            slots.dedup();
            DayBucket {
                date,
                weekday: date.format("%A").to_string(),
                slots,
            }
        })
        .collect()
}

fn next_day_start(date: NaiveDate) -> Option<NaiveDateTime> {
    date.checked_add_days(Days::new(1))
        .map(|next| next.and_time(NaiveTime::MIN))
}
