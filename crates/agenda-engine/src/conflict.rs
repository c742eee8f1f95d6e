//! Interval conflict detection.
//!
//! An existing interval `E` conflicts with a candidate `C` when
//! `E.start < C.end && E.end > C.start`. Adjacent intervals (one ends exactly
//! when the other starts) are NOT conflicts. Cancelled bookings never
//! participate.
//!
//! The same predicate backs both the availability scan and the booking gate
//! ([`check_booking`]), which the persistence layer must call inside the same
//! transaction that inserts the new booking.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::model::{BookedInterval, ResourceId, RoomId};

/// Which existing bookings can block a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictScope {
    /// Bookings of the same resource in the same room.
    #[default]
    ResourceInRoom,
    /// Any booking in the same room, whoever holds it.
    Room,
    /// Bookings in the same room, plus the resource's bookings elsewhere.
    ResourceOrRoom,
}

impl ConflictScope {
    /// Whether `booking` is relevant to a candidate in `room_id` for
    /// `resource_id`. Without a resource, only the room is compared.
    pub fn applies(self, booking: &BookedInterval, room_id: RoomId, resource_id: Option<ResourceId>) -> bool {
        let same_room = booking.room_id == room_id;
        let same_resource = resource_id.map_or(true, |id| booking.resource_id == id);
        match self {
            ConflictScope::ResourceInRoom => same_room && same_resource,
            ConflictScope::Room => same_room,
            ConflictScope::ResourceOrRoom => same_room || (resource_id.is_some() && same_resource),
        }
    }
}

/// A proposed booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub room_id: RoomId,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

/// Half-open overlap test on `(start, end)` pairs.
pub fn overlaps<T: PartialOrd>(candidate: (T, T), existing: (T, T)) -> bool {
    existing.0 < candidate.1 && existing.1 > candidate.0
}

/// The same test spelled as its three cases: the existing interval starts
/// during the candidate, ends during it, or contains it entirely.
///
/// Equivalent to [`overlaps`] for non-empty intervals.
pub fn overlaps_by_cases<T: PartialOrd>(candidate: (T, T), existing: (T, T)) -> bool {
    let (c_start, c_end) = candidate;
    let (e_start, e_end) = existing;
    let starts_during = e_start >= c_start && e_start < c_end;
    let ends_during = e_end > c_start && e_end <= c_end;
    let contains = e_start <= c_start && e_end >= c_end;
    starts_during || ends_during || contains
}

/// All active bookings within `scope` that overlap `candidate`, in input order.
pub fn find_conflicts<'a>(
    candidate: &Candidate,
    existing: &'a [BookedInterval],
    scope: ConflictScope,
) -> Vec<&'a BookedInterval> {
    existing
        .iter()
        .filter(|b| b.status.is_active())
        .filter(|b| scope.applies(b, candidate.room_id, candidate.resource_id))
        .filter(|b| overlaps((candidate.start, candidate.end), (b.start, b.end)))
        .collect()
}

/// Whether any active booking within `scope` overlaps `candidate`.
pub fn conflicts(candidate: &Candidate, existing: &[BookedInterval], scope: ConflictScope) -> bool {
    existing
        .iter()
        .filter(|b| b.status.is_active())
        .filter(|b| scope.applies(b, candidate.room_id, candidate.resource_id))
        .any(|b| overlaps((candidate.start, candidate.end), (b.start, b.end)))
}

/// Booking-creation gate.
///
/// # Errors
/// Returns `AgendaError::InvalidInterval` if the candidate is empty or
/// inverted, and `AgendaError::Conflict` if it overlaps any active booking.
pub fn check_booking(candidate: &Candidate, existing: &[BookedInterval], scope: ConflictScope) -> Result<()> {
    if candidate.end <= candidate.start {
        return Err(AgendaError::InvalidInterval);
    }
    let count = find_conflicts(candidate, existing, scope).len();
    if count > 0 {
        return Err(AgendaError::Conflict { count });
    }
    Ok(())
}

/// Occupied intervals for one (resource, room) pair in local wall-clock time,
/// sorted by start, answering overlap queries by binary search.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    intervals: Vec<(NaiveDateTime, NaiveDateTime)>,
    // running_end[i] = max end over intervals[..=i]
    running_end: Vec<NaiveDateTime>,
}

impl Timeline {
    pub fn new<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, NaiveDateTime)>,
    {
        let mut intervals: Vec<_> = intervals.into_iter().filter(|(s, e)| s < e).collect();
        intervals.sort_by_key(|&(start, end)| (start, end));

        let mut running_end: Vec<NaiveDateTime> = Vec::with_capacity(intervals.len());
        for &(_, end) in &intervals {
            let max = running_end.last().map_or(end, |prev| (*prev).max(end));
            running_end.push(max);
        }

        Self {
            intervals,
            running_end,
        }
    }

    /// Project the active bookings that `scope` selects for `(resource_id,
    /// room_id)` into local time.
    pub fn for_room(
        bookings: &[BookedInterval],
        resource_id: ResourceId,
        room_id: RoomId,
        scope: ConflictScope,
        tz: Tz,
    ) -> Self {
        Self::new(
            bookings
                .iter()
                .filter(|b| b.status.is_active())
                .filter(|b| scope.applies(b, room_id, Some(resource_id)))
                .map(|b| {
                    (
                        b.start.with_timezone(&tz).naive_local(),
                        b.end.with_timezone(&tz).naive_local(),
                    )
                }),
        )
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// If `[start, end)` overlaps anything, the latest end among the
    /// overlapping intervals. Any interval of the same length starting before
    /// that instant overlaps the interval that ends there.
    pub fn blocked_until(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<NaiveDateTime> {
        let begun = self.intervals.partition_point(|&(s, _)| s < end);
        if begun == 0 {
            return None;
        }
        let latest = self.running_end[begun - 1];
        (latest > start).then_some(latest)
    }
}
