//! Availability request orchestration.
//!
//! Resolves the resource selector and the service type's rooms, shifts the
//! search start for penalty flags, fans the scan out over the selected
//! resources (chunked across at most one scoped thread per core, no shared
//! mutable state), and merges the day buckets by date.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, MisconfigurationPolicy};
use crate::error::{AgendaError, Result};
use crate::holiday::{expand_holidays, HolidaySet};
use crate::model::{Clinic, Resource, ResourceId, Room, RoomId, ServiceType, ServiceTypeId};
use crate::scanner::{self, DayBucket, ScanContext, ScanOutcome, ScanWindow, Slot};
use crate::schedule::{validate_schedule, IssueKind};

/// Which resources a request searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceSelector {
    #[default]
    Any,
    Id(ResourceId),
}

impl FromStr for ResourceSelector {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("any") {
            Ok(ResourceSelector::Any)
        } else {
            s.trim().parse().map(ResourceSelector::Id)
        }
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSelector::Any => f.write_str("any"),
            ResourceSelector::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Request modifiers that delay the earliest allowed search date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PenaltyFlags {
    pub asa: bool,
    pub ccr: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    #[serde(default)]
    pub resource: ResourceSelector,
    pub service_type_id: ServiceTypeId,
    /// The instant the search starts from, captured once by the caller.
    pub from: DateTime<Utc>,
    /// Last date (inclusive) a slot may fall on.
    #[serde(default)]
    pub limit_date: Option<NaiveDate>,
    #[serde(default)]
    pub penalties: PenaltyFlags,
}

/// The merged result of one availability request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub service_type_id: ServiceTypeId,
    pub duration_minutes: i64,
    pub search_start: NaiveDateTime,
    pub search_limit: NaiveDateTime,
    pub resources: Vec<ResourceId>,
    pub days: Vec<DayBucket>,
    /// Per resource, dates lost to malformed schedule entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<(ResourceId, Vec<NaiveDate>)>,
}

impl Availability {
    /// The earliest free slot across every scanned resource.
    pub fn first_slot(&self) -> Option<(NaiveDate, Slot)> {
        self.days
            .iter()
            .find_map(|day| day.slots.first().map(|slot| (day.date, *slot)))
    }

    pub fn slot_count(&self) -> usize {
        self.days.iter().map(|d| d.slots.len()).sum()
    }
}

/// Compute the free slots for `request`.
///
/// Pure: reads `clinic` and `config`, touches nothing else.
///
/// # Errors
/// - `ServiceTypeNotFound` / `ServiceTypeDisabled` for an unusable service type.
/// - `InvalidDuration` when the service duration is not positive.
/// - `NoResources` when the selector matches no enabled resource.
/// - `InvalidConfig` for a config without a horizon or with a penalty offset
///   past the calendar's range.
pub fn compute_availability(
    clinic: &Clinic,
    config: &EngineConfig,
    request: &AvailabilityRequest,
) -> Result<Availability> {
    config.validate()?;

    let service = clinic
        .service_type(request.service_type_id)
        .ok_or(AgendaError::ServiceTypeNotFound(request.service_type_id))?;
    if !service.enabled {
        return Err(AgendaError::ServiceTypeDisabled(service.id));
    }

    // The horizon is measured from the unpenalized start; penalties only
    // move the lower bound.
    let base = local_start(config, request.from);
    let search_start = apply_penalty(config, request.penalties, base)?;
    let limit_date = request
        .limit_date
        .or(config.horizon_end)
        .or_else(|| {
            base.date()
                .checked_add_days(Days::new(u64::from(config.horizon_days)))
        })
        .ok_or_else(|| AgendaError::InvalidDate {
            value: "search horizon".to_string(),
        })?;
    let search_limit = limit_date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| AgendaError::InvalidDate {
            value: limit_date.to_string(),
        })?;
    let window = ScanWindow::new(search_start, search_limit, service.duration_minutes)?;

    let rooms = allowed_rooms(service, &clinic.rooms);
    let resources = select_resources(clinic, config, request.resource, &rooms)?;

    info!(
        service_type_id = service.id,
        selector = %request.resource,
        resources = resources.len(),
        rooms = rooms.len(),
        %search_start,
        %search_limit,
        "computing availability"
    );

    let global_holidays = global_holidays(config);
    let ctx = ScanContext {
        window,
        global_holidays: &global_holidays,
        bookings: &clinic.bookings,
        scope: config.conflict_scope,
        timezone: config.timezone,
    };

    let outcomes = if search_start > search_limit {
        debug!("search start is past the horizon, nothing to scan");
        Vec::new()
    } else {
        scan_all(&resources, &rooms, &ctx)
    };

    let degraded = outcomes
        .iter()
        .filter(|o| !o.degraded_dates.is_empty())
        .map(|o| (o.resource_id, o.degraded_dates.clone()))
        .collect();

    Ok(Availability {
        service_type_id: service.id,
        duration_minutes: service.duration_minutes,
        search_start,
        search_limit,
        resources: resources.iter().map(|r| r.id).collect(),
        days: scanner::merge_buckets(outcomes),
        degraded,
    })
}

/// The rooms that may host `service`: its own room list, minus rooms the
/// catalog knows and that do not list the service type.
pub fn allowed_rooms(service: &ServiceType, rooms: &[Room]) -> Vec<RoomId> {
    let mut allowed: Vec<RoomId> = service
        .room_ids
        .iter()
        .copied()
        .filter(|id| {
            rooms
                .iter()
                .find(|r| r.id == *id)
                .map_or(true, |room| room.service_type_ids.contains(&service.id))
        })
        .collect();
    allowed.sort_unstable();
    allowed.dedup();
    allowed
}

/// `from` in the clinic's zone, rounded up to a whole minute.
pub fn local_start(config: &EngineConfig, from: DateTime<Utc>) -> NaiveDateTime {
    let local = from.with_timezone(&config.timezone).naive_local();
    let start = local
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);
    if start < local {
        start + Duration::minutes(1)
    } else {
        start
    }
}

/// The local search start: [`local_start`] pushed forward by the largest
/// applicable penalty offset.
///
/// # Errors
/// Returns `AgendaError::InvalidConfig` when the offset overflows the
/// calendar.
pub fn search_start(config: &EngineConfig, request: &AvailabilityRequest) -> Result<NaiveDateTime> {
    apply_penalty(config, request.penalties, local_start(config, request.from))
}

fn apply_penalty(config: &EngineConfig, flags: PenaltyFlags, start: NaiveDateTime) -> Result<NaiveDateTime> {
    let offset = penalty_days(config, flags);
    if offset == 0 {
        return Ok(start);
    }
    Duration::try_days(offset)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| AgendaError::InvalidConfig(format!("penalty offset of {} days is out of range", offset)))
}

/// The day offset the penalty flags impose; the larger one wins when both
/// are set.
pub fn penalty_days(config: &EngineConfig, flags: PenaltyFlags) -> i64 {
    let asa = if flags.asa { config.penalties.asa_days } else { 0 };
    let ccr = if flags.ccr { config.penalties.ccr_days } else { 0 };
    asa.max(ccr).max(0)
}

fn global_holidays(config: &EngineConfig) -> HolidaySet {
    let expansion = expand_holidays(&config.holidays, HolidaySet::new());
    if !expansion.skipped.is_empty() {
        warn!(skipped = expansion.skipped.len(), "global holiday specs skipped");
    }
    expansion.set
}

fn select_resources<'a>(
    clinic: &'a Clinic,
    config: &EngineConfig,
    selector: ResourceSelector,
    rooms: &[RoomId],
) -> Result<Vec<&'a Resource>> {
    let matched: Vec<&Resource> = match selector {
        ResourceSelector::Id(id) => clinic.resources.iter().filter(|r| r.id == id && r.enabled).collect(),
        ResourceSelector::Any => clinic.resources.iter().filter(|r| r.enabled).collect(),
    };
    if matched.is_empty() {
        return Err(AgendaError::NoResources);
    }

    Ok(matched
        .into_iter()
        .filter(|r| {
            let configured = rooms.iter().any(|&room| r.works_in(room));
            if !configured {
                debug!(resource_id = r.id, "no schedule for the service rooms, skipping");
            }
            configured
        })
        .filter(|r| admissible(r, config, rooms))
        .collect())
}

fn admissible(resource: &Resource, config: &EngineConfig, rooms: &[RoomId]) -> bool {
    let issues = validate_schedule(resource);
    for issue in &issues {
        warn!(%issue, "schedule issue");
    }
    if config.misconfiguration == MisconfigurationPolicy::ExcludeResource {
        let broken = issues
            .iter()
            .any(|i| i.kind == IssueKind::InvalidHours && rooms.contains(&i.room_id));
        if broken {
            warn!(resource_id = resource.id, "excluding resource with malformed schedule");
            return false;
        }
    }
    true
}

fn scan_all(resources: &[&Resource], rooms: &[RoomId], ctx: &ScanContext<'_>) -> Vec<ScanOutcome> {
    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(resources.len());
    if workers <= 1 {
        return resources
            .iter()
            .map(|r| scanner::scan_resource(r, rooms, ctx))
            .collect();
    }

    // Contiguous chunks keep the outcomes in selection order.
    let per_worker = resources.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = resources
            .chunks(per_worker)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|r| scanner::scan_resource(r, rooms, ctx))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(outcomes) => outcomes,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
