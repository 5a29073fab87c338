use std::sync::Arc;

use super::common::*;
use crate::attendance::admission::{AdmissionConfig, BiometricError, BiometricOutcome};
use crate::attendance::domain::{
    AttendanceStatus, EventDefinition, InvalidArgument, PenaltyTier,
};
use crate::attendance::geofence::GeofenceRegistry;
use crate::attendance::penalty::EscalationConfig;
use crate::attendance::repository::{AttendanceRepository, EventRepository, RepositoryError};
use crate::attendance::service::{AttendanceService, AttendanceServiceError};
use crate::attendance::window::WindowState;

fn configured_service() -> (MemoryService, Arc<MemoryRecords>) {
    let (service, _events, records) = build_service();
    service
        .configure_event(event("orientation"))
        .expect("configure event");
    (service, records)
}

#[test]
fn configure_event_registers_its_geofence() {
    let (service, events, _records) = build_service();

    let stored = service
        .configure_event(event("orientation"))
        .expect("configure event");

    assert_eq!(stored.title, "Orientation Assembly");
    assert!(service.geofences().get(&event_id("orientation")).is_some());
    assert!(events
        .fetch(&event_id("orientation"))
        .expect("fetch event")
        .is_some());
}

#[test]
fn configure_event_rejects_invalid_geofence_without_storing() {
    let (service, events, _records) = build_service();
    let mut invalid = event("orientation");
    if let Some(spec) = invalid.geofence.as_mut() {
        spec.radius_meters = 0.0;
    }

    match service.configure_event(invalid) {
        Err(AttendanceServiceError::InvalidArgument(InvalidArgument::NonPositiveRadius(_))) => {}
        other => panic!("expected radius rejection, got {other:?}"),
    }
    assert!(events.all().expect("list events").is_empty());
    assert!(service.geofences().is_empty());
}

#[test]
fn clearing_an_event_geofence_fails_closed() {
    let (service, _records) = configured_service();
    service
        .configure_event(EventDefinition {
            geofence: None,
            ..event("orientation")
        })
        .expect("reconfigure event");

    let decision = service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(0))
        .expect("decision");

    assert!(!decision.admitted);
    assert_eq!(decision.reason, "outside geofence");
}

#[test]
fn clearing_an_event_geofence_admits_when_fail_open() {
    let (service, _events, _records) = build_service_with(AdmissionConfig {
        allow_when_unregistered: true,
        ..AdmissionConfig::default()
    });
    service
        .configure_event(EventDefinition {
            geofence: None,
            ..event("orientation")
        })
        .expect("configure event");

    let decision = service
        .check_in(
            check_in("orientation", "2021-00042", far_from_campus()),
            start_plus(0),
        )
        .expect("decision");

    assert!(decision.admitted);
}

#[test]
fn admitted_check_in_is_persisted() {
    let (service, records) = configured_service();

    let decision = service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(7))
        .expect("decision");

    assert!(decision.admitted);
    let stored = records
        .fetch(&event_id("orientation"), &student_id("2021-00042"))
        .expect("fetch record")
        .expect("record stored");
    assert_eq!(stored.status, AttendanceStatus::Late);
    assert_eq!(stored.penalty, Some(PenaltyTier::Minor));
    assert_eq!(stored.timestamp, start_plus(7));
    assert_eq!(stored.location, Some(near_campus()));
}

#[test]
fn rejected_check_in_is_not_persisted() {
    let (service, records) = configured_service();
    let mut attempt = check_in("orientation", "2021-00042", near_campus());
    attempt.biometric = BiometricOutcome::Failed(BiometricError::Cancelled);

    let decision = service.check_in(attempt, start_plus(0)).expect("decision");

    assert!(!decision.admitted);
    assert!(records
        .for_event(&event_id("orientation"))
        .expect("list records")
        .is_empty());
}

#[test]
fn duplicate_check_in_conflicts() {
    let (service, _records) = configured_service();
    service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(0))
        .expect("first check-in");

    match service.check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(1)) {
        Err(AttendanceServiceError::Repository(RepositoryError::Conflict)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn check_in_for_unknown_event_is_not_found() {
    let (service, _records) = configured_service();

    match service.check_in(check_in("unknown", "2021-00042", near_campus()), start_plus(0)) {
        Err(AttendanceServiceError::EventNotFound(id)) => assert_eq!(id, "unknown"),
        other => panic!("expected missing event, got {other:?}"),
    }
}

#[test]
fn repository_outage_surfaces_as_error() {
    let events = Arc::new(MemoryEvents::default());
    let service = AttendanceService::new(
        events,
        Arc::new(UnavailableRecords),
        AdmissionConfig::default(),
        EscalationConfig::default(),
    );
    service
        .configure_event(event("orientation"))
        .expect("configure event");

    match service.check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(0)) {
        Err(AttendanceServiceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected unavailable repository, got {other:?}"),
    }
}

#[test]
fn sign_out_stamps_existing_check_in() {
    let (service, records) = configured_service();
    service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(0))
        .expect("check-in");

    let decision = service
        .sign_out(check_in("orientation", "2021-00042", near_campus()), start_plus(115))
        .expect("sign-out");

    assert!(decision.admitted);
    let stored = records
        .fetch(&event_id("orientation"), &student_id("2021-00042"))
        .expect("fetch record")
        .expect("record stored");
    assert_eq!(stored.signed_out_at, Some(start_plus(115)));
    assert_eq!(stored.status, AttendanceStatus::Present);

    match service.sign_out(check_in("orientation", "2021-00042", near_campus()), start_plus(116)) {
        Err(AttendanceServiceError::AlreadySignedOut { .. }) => {}
        other => panic!("expected already signed out, got {other:?}"),
    }
}

#[test]
fn sign_out_outside_window_leaves_record_untouched() {
    let (service, records) = configured_service();
    service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(0))
        .expect("check-in");

    let decision = service
        .sign_out(check_in("orientation", "2021-00042", near_campus()), start_plus(30))
        .expect("decision");

    assert!(!decision.admitted);
    assert_eq!(decision.reason, "sign-in window closed");
    let stored = records
        .fetch(&event_id("orientation"), &student_id("2021-00042"))
        .expect("fetch record")
        .expect("record stored");
    assert_eq!(stored.signed_out_at, None);
}

#[test]
fn sign_out_without_check_in_is_rejected() {
    let (service, _records) = configured_service();

    match service.sign_out(check_in("orientation", "2021-00042", near_campus()), start_plus(115)) {
        Err(AttendanceServiceError::NotCheckedIn { student, event }) => {
            assert_eq!(student, "2021-00042");
            assert_eq!(event, "orientation");
        }
        other => panic!("expected missing check-in, got {other:?}"),
    }
}

#[test]
fn mark_absent_records_critical_penalty() {
    let (service, _records) = configured_service();

    let record = service
        .mark_absent(&event_id("orientation"), &student_id("2021-00042"), start_plus(140))
        .expect("mark absent");

    assert_eq!(record.status, AttendanceStatus::Absent);
    assert_eq!(record.penalty, Some(PenaltyTier::Critical));

    let view = service
        .penalty_summary(&student_id("2021-00042"))
        .expect("penalty summary");
    assert_eq!(view.info.total_absent_count, 1);
    assert!(!view.escalate);
}

#[test]
fn excuse_clears_status_and_penalty() {
    let (service, records) = configured_service();
    service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(9))
        .expect("late check-in");

    let excused = service
        .excuse(&event_id("orientation"), &student_id("2021-00042"), start_plus(60))
        .expect("excuse");

    assert_eq!(excused.status, AttendanceStatus::Excused);
    assert_eq!(excused.penalty, None);
    assert_eq!(excused.timestamp, start_plus(9));
    let stored = records
        .fetch(&event_id("orientation"), &student_id("2021-00042"))
        .expect("fetch record")
        .expect("record stored");
    assert_eq!(stored, excused);

    let absentee = service
        .excuse(&event_id("orientation"), &student_id("2021-00077"), start_plus(60))
        .expect("excuse absentee");
    assert_eq!(absentee.status, AttendanceStatus::Excused);
}

#[test]
fn repeated_absences_raise_escalation_flag() {
    let (service, _events, _records) = build_service();
    for index in 0..3 {
        let mut definition = event(&format!("assembly-{index}"));
        definition.title = format!("Assembly {index}");
        service
            .configure_event(definition)
            .expect("configure event");
        service
            .mark_absent(
                &event_id(&format!("assembly-{index}")),
                &student_id("2021-00042"),
                start_plus(index * 24 * 60),
            )
            .expect("mark absent");
    }

    let view = service
        .penalty_summary(&student_id("2021-00042"))
        .expect("penalty summary");

    assert!(view.escalate);
    assert_eq!(view.info.total_absent_count, 3);
    assert_eq!(view.info.current_penalty_level, Some(PenaltyTier::Major));
}

#[test]
fn event_report_tallies_statuses_and_penalties() {
    let (service, _records) = configured_service();
    service
        .check_in(check_in("orientation", "2021-00001", near_campus()), start_plus(-3))
        .expect("present");
    service
        .check_in(check_in("orientation", "2021-00002", near_campus()), start_plus(4))
        .expect("late warning");
    service
        .check_in(check_in("orientation", "2021-00003", near_campus()), start_plus(9))
        .expect("late minor");
    service
        .mark_absent(&event_id("orientation"), &student_id("2021-00004"), start_plus(140))
        .expect("absent");
    service
        .excuse(&event_id("orientation"), &student_id("2021-00005"), start_plus(140))
        .expect("excused");
    service
        .sign_out(check_in("orientation", "2021-00001", near_campus()), start_plus(120))
        .expect("sign-out");

    let report = service
        .event_report(&event_id("orientation"))
        .expect("event report");

    assert_eq!(report.title, "Orientation Assembly");
    assert_eq!(report.present, 1);
    assert_eq!(report.late, 2);
    assert_eq!(report.absent, 1);
    assert_eq!(report.excused, 1);
    assert_eq!(report.signed_out, 1);
    assert_eq!(report.total(), 5);
    let tiers: Vec<_> = report.penalties.iter().map(|entry| entry.tier).collect();
    assert_eq!(
        tiers,
        vec![PenaltyTier::Warning, PenaltyTier::Minor, PenaltyTier::Critical]
    );
}

#[test]
fn window_status_reports_state_and_bounds() {
    let (service, _records) = configured_service();

    let view = service
        .window_status(&event_id("orientation"), start_plus(-5))
        .expect("window status");

    assert_eq!(view.state, WindowState::SignInOpen);
    assert_eq!(view.description, "sign-in window open");
    assert_eq!(view.windows.sign_in_start, start_plus(-15));
}

#[test]
fn remove_event_unregisters_geofence() {
    let (service, _records) = configured_service();

    service
        .remove_event(&event_id("orientation"))
        .expect("remove event");

    assert!(service.geofences().is_empty());
    match service.remove_event(&event_id("orientation")) {
        Err(AttendanceServiceError::EventNotFound(_)) => {}
        other => panic!("expected missing event, got {other:?}"),
    }
}

#[test]
fn restore_geofences_rebuilds_cache_from_event_store() {
    let events = Arc::new(MemoryEvents::default());
    events
        .upsert(event("orientation"))
        .expect("seed event");
    events
        .upsert(EventDefinition {
            geofence: None,
            ..event("webinar")
        })
        .expect("seed event");

    let registry = Arc::new(GeofenceRegistry::new(false));
    let service = AttendanceService::with_registry(
        events,
        Arc::new(MemoryRecords::default()),
        registry.clone(),
        AdmissionConfig::default(),
        EscalationConfig::default(),
    );

    assert_eq!(service.restore_geofences().expect("restore"), 1);
    assert!(registry.is_within(&event_id("orientation"), near_campus()));
    assert!(!registry.is_within(&event_id("webinar"), near_campus()));
}

#[test]
fn configure_event_rejects_offsets_outside_the_calendar() {
    let (service, events, _records) = build_service();
    let mut definition = event("orientation");
    definition.schedule.sign_in_start_offset_minutes = 10_000_000_000_000;

    match service.configure_event(definition) {
        Err(AttendanceServiceError::InvalidArgument(InvalidArgument::OffsetOutOfRange {
            field,
            ..
        })) => assert_eq!(field, "sign_in_start_offset_minutes"),
        other => panic!("expected out-of-range offset, got {other:?}"),
    }
    assert!(events.all().expect("list events").is_empty());
    assert!(service.geofences().is_empty());
}

#[test]
fn history_outage_does_not_fail_a_stored_check_in() {
    let records = Arc::new(HistoryOutageRecords::default());
    let service = AttendanceService::new(
        Arc::new(MemoryEvents::default()),
        records.clone(),
        AdmissionConfig::default(),
        EscalationConfig::default(),
    );
    service
        .configure_event(event("orientation"))
        .expect("configure event");

    let decision = service
        .check_in(check_in("orientation", "2021-00042", near_campus()), start_plus(3))
        .expect("check-in succeeds despite history outage");
    assert!(decision.admitted);
    assert!(records
        .fetch(&event_id("orientation"), &student_id("2021-00042"))
        .expect("fetch record")
        .is_some());

    match service.check_in(
        check_in("orientation", "2021-00042", near_campus()),
        start_plus(4),
    ) {
        Err(AttendanceServiceError::Repository(RepositoryError::Conflict)) => {}
        other => panic!("expected duplicate conflict, got {other:?}"),
    }

    let absent = service
        .mark_absent(&event_id("orientation"), &student_id("2021-00077"), start_plus(140))
        .expect("absence succeeds despite history outage");
    assert_eq!(absent.status, AttendanceStatus::Absent);
}
