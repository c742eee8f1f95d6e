//! Read-only input entities consumed by the engine.
//!
//! These mirror the records the persistence layer hands over: resources
//! (doctors) with their schedule entries and personal holiday specs, rooms,
//! service types, and booked intervals. The engine never mutates them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};

pub type ResourceId = u32;
pub type RoomId = u32;
pub type ServiceTypeId = u32;

/// Day code for a holiday-override schedule entry.
pub const HOLIDAY_DAY_CODE: u8 = 9;
/// Day code for a specific-date schedule entry.
pub const SPECIFIC_DATE_DAY_CODE: u8 = 99;

/// A bookable professional with their own weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    /// Personal holiday specs, same format as the global list.
    #[serde(default)]
    pub holidays: Vec<String>,
}

impl Resource {
    /// Whether the resource has any schedule entry for `room_id`.
    pub fn works_in(&self, room_id: RoomId) -> bool {
        self.schedule.iter().any(|e| e.room_id == room_id)
    }
}

/// One weekly, holiday-override, or specific-date attendance rule.
///
/// Times are kept as the raw `HH:MM` strings they were stored with; they are
/// parsed when the rule is resolved so one malformed record only degrades the
/// dates it governs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub day_code: u8,
    pub room_id: RoomId,
    pub attends: bool,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub break_start: Option<String>,
    #[serde(default, alias = "breakHasta")]
    pub break_end: Option<String>,
    /// Only meaningful when `day_code` is [`SPECIFIC_DATE_DAY_CODE`].
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// The typed meaning of a schedule entry's day code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Weekly(Weekday),
    HolidayOverride,
    SpecificDate(NaiveDate),
}

impl ScheduleEntry {
    /// Decode `day_code` (and `date` for code 99).
    ///
    /// Returns `None` for unknown codes and for a specific-date entry that
    /// carries no date.
    pub fn kind(&self) -> Option<EntryKind> {
        match self.day_code {
            0..=6 => Some(EntryKind::Weekly(weekday_from_code(self.day_code))),
            HOLIDAY_DAY_CODE => Some(EntryKind::HolidayOverride),
            SPECIFIC_DATE_DAY_CODE => self.date.map(EntryKind::SpecificDate),
            _ => None,
        }
    }
}

/// 0 = Sunday .. 6 = Saturday.
pub fn weekday_from_code(code: u8) -> Weekday {
    match code % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

/// A physical consulting room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_type_ids: Vec<ServiceTypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceType {
    pub id: ServiceTypeId,
    #[serde(default)]
    pub name: String,
    pub duration_minutes: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub room_ids: Vec<RoomId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingStatus {
    Pending,
    #[default]
    Confirmed,
    Attended,
    Absent,
    Cancelled,
}

impl BookingStatus {
    /// Everything except a cancellation keeps the interval occupied.
    pub fn is_active(self) -> bool {
        self != BookingStatus::Cancelled
    }
}

/// A committed appointment or event occupying a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resource_id: ResourceId,
    pub room_id: RoomId,
    #[serde(default)]
    pub status: BookingStatus,
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time-of-day string.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| AgendaError::InvalidTime {
            value: value.to_string(),
        })
}

fn default_true() -> bool {
    true
}


/// Everything the persistence layer pre-fetches for one availability request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Clinic {
    pub resources: Vec<Resource>,
    pub rooms: Vec<Room>,
    pub service_types: Vec<ServiceType>,
    pub bookings: Vec<BookedInterval>,
}

impl Clinic {
    pub fn service_type(&self, id: ServiceTypeId) -> Option<&ServiceType> {
        self.service_types.iter().find(|s| s.id == id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }
}
