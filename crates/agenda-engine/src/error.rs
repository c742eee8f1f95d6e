//! Error types for agenda-engine operations.

use thiserror::Error;

use crate::model::{ResourceId, RoomId, ServiceTypeId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgendaError {
    #[error("Service duration must be a positive number of minutes, got {0}")]
    InvalidDuration(i64),

    #[error("Service type not found: {0}")]
    ServiceTypeNotFound(ServiceTypeId),

    #[error("Service type is disabled: {0}")]
    ServiceTypeDisabled(ServiceTypeId),

    /// The resource selector matched nothing that can be scanned.
    #[error("No resources found for the request")]
    NoResources,

    #[error("Invalid time of day: {value:?} (expected HH:MM)")]
    InvalidTime { value: String },

    #[error("Invalid date: {value:?}")]
    InvalidDate { value: String },

    #[error("Invalid holiday spec: {spec:?}")]
    InvalidHolidaySpec { spec: String },

    #[error("Invalid schedule entry for resource {resource_id} in room {room_id}: {reason}")]
    InvalidScheduleEntry {
        resource_id: ResourceId,
        room_id: RoomId,
        reason: String,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Interval end must be after its start")]
    InvalidInterval,

    /// The booking gate rejected a candidate interval.
    #[error("Candidate interval conflicts with {count} existing booking(s)")]
    Conflict { count: usize },
}

pub type Result<T> = std::result::Result<T, AgendaError>;
