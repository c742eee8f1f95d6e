//! # agenda-engine
//!
//! Appointment availability engine for clinic scheduling.
//!
//! Given bookable resources (doctors) with weekly, holiday-override and
//! specific-date attendance rules, global and personal holiday calendars, the
//! rooms a service type may use, and the intervals already booked, the engine
//! computes the ordered free slots of the service's duration within a bounded
//! horizon, and decides whether a proposed booking conflicts with an existing
//! one. Everything here is pure, synchronous computation over pre-fetched
//! inputs.
//!
//! ## Modules
//!
//! - [`holiday`]: holiday spec strings → concrete date sets
//! - [`schedule`]: effective attendance rule per resource, room and date
//! - [`conflict`]: interval overlap test and the booking gate
//! - [`scanner`]: forward-scanning slot generator
//! - [`availability`]: request orchestration across resources
//! - [`config`]: engine configuration
//! - [`model`]: read-only input entities
//! - [`error`]: error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod error;
pub mod holiday;
pub mod model;
pub mod scanner;
pub mod schedule;

pub use availability::{compute_availability, Availability, AvailabilityRequest, PenaltyFlags, ResourceSelector};
pub use config::EngineConfig;
pub use conflict::{check_booking, conflicts, find_conflicts, Candidate, ConflictScope};
pub use error::AgendaError;
pub use holiday::{expand_holidays, holiday_set, HolidaySet};
pub use scanner::{DayBucket, Slot};
pub use schedule::{resolve_rule, validate_schedule, EffectiveRule};
