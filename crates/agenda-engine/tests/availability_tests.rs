//! Tests for availability request orchestration.

use agenda_engine::availability::{allowed_rooms, penalty_days, search_start};
use agenda_engine::config::{MisconfigurationPolicy, Penalties};
use agenda_engine::model::{BookedInterval, BookingStatus, Clinic, Resource, Room, ScheduleEntry, ServiceType};
use agenda_engine::{
    compute_availability, AgendaError, AvailabilityRequest, ConflictScope, EngineConfig, PenaltyFlags,
    ResourceSelector,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

const ROOM_A: u32 = 1;
const ROOM_B: u32 = 2;
const CONSULT: u32 = 10;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry(day_code: u8, room_id: u32, start: &str, end: &str) -> ScheduleEntry {
    ScheduleEntry {
        day_code,
        room_id,
        attends: true,
        start: start.into(),
        end: end.into(),
        break_start: Some("13:00".into()),
        break_end: Some("14:00".into()),
        date: None,
    }
}

fn doctor(id: u32, room_id: u32) -> Resource {
    Resource {
        id,
        name: format!("Doctor {}", id),
        specialty: Some("dentistry".into()),
        enabled: true,
        schedule: (1..=5).map(|d| entry(d, room_id, "09:00", "18:00")).collect(),
        holidays: Vec::new(),
    }
}

fn clinic(resources: Vec<Resource>) -> Clinic {
    Clinic {
        resources,
        rooms: vec![
            Room {
                id: ROOM_A,
                name: "Consultorio 1".into(),
                service_type_ids: vec![CONSULT],
            },
            Room {
                id: ROOM_B,
                name: "Consultorio 2".into(),
                service_type_ids: vec![CONSULT],
            },
        ],
        service_types: vec![ServiceType {
            id: CONSULT,
            name: "Consulta".into(),
            duration_minutes: 30,
            enabled: true,
            room_ids: vec![ROOM_A, ROOM_B],
        }],
        bookings: Vec::new(),
    }
}

/// Search from Monday 2026-03-16 08:00 UTC through Tuesday.
fn request(resource: ResourceSelector) -> AvailabilityRequest {
    AvailabilityRequest {
        resource,
        service_type_id: CONSULT,
        from: Utc.with_ymd_and_hms(2026, 3, 16, 8, 0, 0).unwrap(),
        limit_date: Some(day(2026, 3, 17)),
        penalties: PenaltyFlags::default(),
    }
}

fn booking(resource_id: u32, room_id: u32, hour: u32, min: u32, len: i64) -> BookedInterval {
    let start = Utc.with_ymd_and_hms(2026, 3, 16, hour, min, 0).unwrap();
    BookedInterval {
        start,
        end: start + Duration::minutes(len),
        resource_id,
        room_id,
        status: BookingStatus::Confirmed,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn single_resource_day_buckets() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let result = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Id(1))).unwrap();

    assert_eq!(result.resources, vec![1]);
    assert_eq!(result.duration_minutes, 30);
    assert_eq!(result.days.len(), 2);

    let monday = &result.days[0];
    assert_eq!(monday.date, day(2026, 3, 16));
    assert_eq!(monday.slots.len(), 16);
    let first = monday.slots.first().unwrap();
    let last = monday.slots.last().unwrap();
    assert_eq!((first.hour, first.minute), (9, 0));
    assert_eq!((last.hour, last.minute), (17, 30));
    assert!(monday.slots.iter().all(|s| s.room_id == ROOM_A && s.resource_id == 1));

    let before_break = monday.slots.iter().filter(|s| s.hour < 13).last().unwrap();
    let after_break = monday.slots.iter().find(|s| s.hour >= 13).unwrap();
    assert_eq!((before_break.hour, before_break.minute), (12, 30));
    assert_eq!((after_break.hour, after_break.minute), (14, 0));
}

#[test]
fn any_resource_merges_by_date() {
    let c = clinic(vec![doctor(1, ROOM_A), doctor(2, ROOM_B)]);
    let result = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Any)).unwrap();

    assert_eq!(result.resources, vec![1, 2]);
    assert_eq!(result.days.len(), 2);
    assert_eq!(result.days[0].slots.len(), 32);
    let (date, first) = result.first_slot().unwrap();
    assert_eq!(date, day(2026, 3, 16));
    assert_eq!((first.hour, first.minute, first.resource_id, first.room_id), (9, 0, 1, ROOM_A));
    assert_eq!(result.days[0].slots[1].resource_id, 2);
}

#[test]
fn any_resource_skips_disabled_and_unconfigured() {
    let mut disabled = doctor(2, ROOM_A);
    disabled.enabled = false;
    let mut unconfigured = doctor(3, ROOM_A);
    unconfigured.schedule.clear();
    let mut elsewhere = doctor(4, ROOM_A);
    for e in &mut elsewhere.schedule {
        e.room_id = 99;
    }
    let c = clinic(vec![doctor(1, ROOM_A), disabled, unconfigured, elsewhere]);

    let result = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Any)).unwrap();
    assert_eq!(result.resources, vec![1]);
}

#[test]
fn unknown_resource_is_not_found() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let err = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Id(42))).unwrap_err();
    assert_eq!(err, AgendaError::NoResources);
}

#[test]
fn unconfigured_resource_is_empty_not_an_error() {
    let mut d = doctor(1, ROOM_A);
    d.schedule.clear();
    let c = clinic(vec![d]);
    let result = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Id(1))).unwrap();
    assert!(result.days.is_empty());
    assert!(result.resources.is_empty());
}

#[test]
fn service_type_errors() {
    let mut c = clinic(vec![doctor(1, ROOM_A)]);
    let mut req = request(ResourceSelector::Any);
    req.service_type_id = 77;
    assert_eq!(
        compute_availability(&c, &EngineConfig::default(), &req).unwrap_err(),
        AgendaError::ServiceTypeNotFound(77)
    );

    c.service_types[0].duration_minutes = 0;
    assert_eq!(
        compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Any)).unwrap_err(),
        AgendaError::InvalidDuration(0)
    );

    c.service_types[0].enabled = false;
    assert_eq!(
        compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Any)).unwrap_err(),
        AgendaError::ServiceTypeDisabled(CONSULT)
    );
}

#[test]
fn booking_blocks_only_its_slot() {
    let mut c = clinic(vec![doctor(1, ROOM_A)]);
    c.bookings.push(booking(1, ROOM_A, 10, 0, 30));
    let result = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Id(1))).unwrap();

    let monday = &result.days[0];
    assert_eq!(monday.slots.len(), 15);
    assert!(!monday.slots.iter().any(|s| s.hour == 10 && s.minute == 0));
    assert!(monday.slots.iter().any(|s| s.hour == 10 && s.minute == 30));
}

#[test]
fn room_scope_lets_other_doctors_block() {
    let mut c = clinic(vec![doctor(1, ROOM_A)]);
    c.bookings.push(booking(2, ROOM_A, 9, 0, 60));

    let default = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Id(1))).unwrap();
    assert_eq!(default.days[0].slots.len(), 16);

    let config = EngineConfig {
        conflict_scope: ConflictScope::Room,
        ..EngineConfig::default()
    };
    let scoped = compute_availability(&c, &config, &request(ResourceSelector::Id(1))).unwrap();
    assert_eq!(scoped.days[0].slots.len(), 14);
    let first = scoped.days[0].slots[0];
    assert_eq!((first.hour, first.minute), (10, 0));
}

#[test]
fn global_holiday_with_negative_override_closes_tomorrow() {
    let mut d = doctor(1, ROOM_A);
    d.schedule.push(ScheduleEntry {
        attends: false,
        ..entry(9, ROOM_A, "", "")
    });
    let c = clinic(vec![d]);
    let config = EngineConfig {
        holidays: vec!["2026-03-16".into()],
        ..EngineConfig::default()
    };
    let result = compute_availability(&c, &config, &request(ResourceSelector::Id(1))).unwrap();
    assert_eq!(result.days.len(), 1);
    assert_eq!(result.days[0].date, day(2026, 3, 17));
}

#[test]
fn asa_penalty_shifts_start_by_configured_days() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let config = EngineConfig {
        penalties: Penalties {
            asa_days: 30,
            ccr_days: 0,
        },
        ..EngineConfig::default()
    };
    let mut plain = request(ResourceSelector::Id(1));
    plain.limit_date = Some(day(2026, 5, 31));
    let mut flagged = plain.clone();
    flagged.penalties.asa = true;

    let a = compute_availability(&c, &config, &plain).unwrap();
    let b = compute_availability(&c, &config, &flagged).unwrap();

    assert_eq!(b.search_start - a.search_start, Duration::days(30));
    assert_eq!(a.first_slot().unwrap().0, day(2026, 3, 16));
    // 2026-04-15 is a Wednesday.
    let (date, slot) = b.first_slot().unwrap();
    assert_eq!(date, day(2026, 4, 15));
    assert_eq!((slot.hour, slot.minute), (9, 0));
}

#[test]
fn penalty_does_not_move_the_derived_horizon() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let config = EngineConfig {
        penalties: Penalties {
            asa_days: 30,
            ccr_days: 0,
        },
        ..EngineConfig::default()
    };
    let mut plain = request(ResourceSelector::Id(1));
    plain.limit_date = None;
    let mut flagged = plain.clone();
    flagged.penalties.asa = true;

    let a = compute_availability(&c, &config, &plain).unwrap();
    let b = compute_availability(&c, &config, &flagged).unwrap();

    // 60 default horizon days from Monday 2026-03-16.
    assert_eq!(a.search_limit, day(2026, 5, 15).and_hms_opt(23, 59, 59).unwrap());
    assert_eq!(b.search_limit, a.search_limit);
    assert_eq!(b.search_start - a.search_start, Duration::days(30));
    assert_eq!(b.days.last().map(|d| d.date), a.days.last().map(|d| d.date));
    assert!(b.slot_count() < a.slot_count());
}

#[test]
fn oversized_penalty_is_a_config_error() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let mut req = request(ResourceSelector::Id(1));
    req.penalties.asa = true;

    for asa_days in [1_000_000_000, i64::MAX] {
        let config = EngineConfig {
            penalties: Penalties { asa_days, ccr_days: 0 },
            ..EngineConfig::default()
        };
        let err = compute_availability(&c, &config, &req).unwrap_err();
        assert!(matches!(err, AgendaError::InvalidConfig(_)), "{:?}", err);
        assert!(search_start(&config, &req).is_err());
    }
}

#[test]
fn penalty_offsets_take_the_larger_positive_value() {
    let config = EngineConfig {
        penalties: Penalties {
            asa_days: 30,
            ccr_days: 45,
        },
        ..EngineConfig::default()
    };
    let both = PenaltyFlags { asa: true, ccr: true };
    assert_eq!(penalty_days(&config, both), 45);
    assert_eq!(penalty_days(&config, PenaltyFlags { asa: true, ccr: false }), 30);
    assert_eq!(penalty_days(&config, PenaltyFlags::default()), 0);

    let negative = EngineConfig {
        penalties: Penalties {
            asa_days: -5,
            ccr_days: 0,
        },
        ..EngineConfig::default()
    };
    assert_eq!(penalty_days(&negative, both), 0);
}

#[test]
fn search_start_rounds_up_to_the_minute_in_local_time() {
    let config = EngineConfig::default()
        .with_timezone_name("America/Argentina/Buenos_Aires")
        .unwrap();
    let mut req = request(ResourceSelector::Any);
    req.from = Utc.with_ymd_and_hms(2026, 3, 16, 13, 7, 30).unwrap();
    let start = search_start(&config, &req).unwrap();
    assert_eq!(start, day(2026, 3, 16).and_hms_opt(10, 8, 0).unwrap());

    req.from = Utc.with_ymd_and_hms(2026, 3, 16, 13, 7, 0).unwrap();
    assert_eq!(
        search_start(&config, &req).unwrap(),
        day(2026, 3, 16).and_hms_opt(10, 7, 0).unwrap()
    );
}

#[test]
fn bookings_are_compared_in_local_time() {
    let mut c = clinic(vec![doctor(1, ROOM_A)]);
    // 13:00Z is 10:00 in Buenos Aires.
    c.bookings.push(booking(1, ROOM_A, 13, 0, 30));
    let config = EngineConfig::default()
        .with_timezone_name("America/Argentina/Buenos_Aires")
        .unwrap();
    let mut req = request(ResourceSelector::Id(1));
    // 11:00Z is 08:00 local.
    req.from = Utc.with_ymd_and_hms(2026, 3, 16, 11, 0, 0).unwrap();

    let result = compute_availability(&c, &config, &req).unwrap();
    let monday = &result.days[0];
    assert_eq!((monday.slots[0].hour, monday.slots[0].minute), (9, 0));
    assert!(!monday.slots.iter().any(|s| s.hour == 10 && s.minute == 0));
}

#[test]
fn unknown_timezone_is_rejected() {
    let err = EngineConfig::default().with_timezone_name("Mars/Olympus").unwrap_err();
    assert_eq!(err, AgendaError::InvalidTimezone("Mars/Olympus".into()));
}

#[test]
fn horizon_falls_back_to_configuration() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let mut req = request(ResourceSelector::Id(1));
    req.limit_date = None;

    let config = EngineConfig {
        horizon_end: Some(day(2026, 3, 18)),
        ..EngineConfig::default()
    };
    let result = compute_availability(&c, &config, &req).unwrap();
    assert_eq!(result.days.len(), 3);

    let config = EngineConfig {
        horizon_days: 7,
        ..EngineConfig::default()
    };
    let result = compute_availability(&c, &config, &req).unwrap();
    // Mon 16 .. Mon 23: six weekdays.
    assert_eq!(result.days.len(), 6);
    assert_eq!(result.search_limit.date(), day(2026, 3, 23));
}

#[test]
fn start_past_horizon_is_empty() {
    let c = clinic(vec![doctor(1, ROOM_A)]);
    let mut req = request(ResourceSelector::Id(1));
    req.limit_date = Some(day(2026, 3, 1));
    let result = compute_availability(&c, &EngineConfig::default(), &req).unwrap();
    assert!(result.days.is_empty());
}

#[test]
fn misconfiguration_policy_decides_degrade_or_exclude() {
    let mut broken = doctor(2, ROOM_B);
    broken.schedule[0].end = "six pm".into(); // Monday
    let c = clinic(vec![doctor(1, ROOM_A), broken]);

    let degraded = compute_availability(&c, &EngineConfig::default(), &request(ResourceSelector::Any)).unwrap();
    assert_eq!(degraded.resources, vec![1, 2]);
    assert_eq!(degraded.degraded, vec![(2, vec![day(2026, 3, 16)])]);
    assert!(degraded.days[0].slots.iter().all(|s| s.resource_id == 1));
    assert!(degraded.days[1].slots.iter().any(|s| s.resource_id == 2));

    let config = EngineConfig {
        misconfiguration: MisconfigurationPolicy::ExcludeResource,
        ..EngineConfig::default()
    };
    let excluded = compute_availability(&c, &config, &request(ResourceSelector::Any)).unwrap();
    assert_eq!(excluded.resources, vec![1]);
    assert!(excluded.degraded.is_empty());
}

#[test]
fn room_must_host_the_service() {
    let mut service = ServiceType {
        id: CONSULT,
        name: String::new(),
        duration_minutes: 30,
        enabled: true,
        room_ids: vec![ROOM_B, ROOM_A, 5, ROOM_A],
    };
    let rooms = vec![
        Room {
            id: ROOM_A,
            name: String::new(),
            service_type_ids: vec![CONSULT],
        },
        Room {
            id: ROOM_B,
            name: String::new(),
            service_type_ids: vec![11],
        },
    ];
    // Room 5 is unknown to the catalog and kept; room B does not host it.
    assert_eq!(allowed_rooms(&service, &rooms), vec![ROOM_A, 5]);

    service.room_ids.clear();
    assert!(allowed_rooms(&service, &rooms).is_empty());
}

#[test]
fn selector_parses_any_or_id() {
    assert_eq!("any".parse::<ResourceSelector>().unwrap(), ResourceSelector::Any);
    assert_eq!("ANY".parse::<ResourceSelector>().unwrap(), ResourceSelector::Any);
    assert_eq!("12".parse::<ResourceSelector>().unwrap(), ResourceSelector::Id(12));
    assert!("doctor".parse::<ResourceSelector>().is_err());
}

#[test]
fn many_resources_are_all_scanned() {
    let c = clinic((1..=40).map(|id| doctor(id, ROOM_A)).collect());
    let mut req = request(ResourceSelector::Any);
    req.limit_date = Some(day(2026, 3, 16));

    let result = compute_availability(&c, &EngineConfig::default(), &req).unwrap();
    assert_eq!(result.resources, (1..=40).collect::<Vec<u32>>());
    assert_eq!(result.days.len(), 1);

    let monday = &result.days[0];
    assert_eq!(monday.slots.len(), 40 * 16);
    for id in 1..=40 {
        assert_eq!(monday.slots.iter().filter(|s| s.resource_id == id).count(), 16);
    }
    assert!(monday.slots.windows(2).all(|w| w[0] < w[1]));
}
