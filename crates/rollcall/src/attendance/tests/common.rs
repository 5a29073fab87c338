use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::attendance::admission::{AdmissionConfig, BiometricOutcome};
use crate::attendance::domain::{
    AttendanceRecord, AttendanceStatus, EventDefinition, EventId, EventSchedule, GeofenceSpec,
    PenaltyTier, StudentId,
};
use crate::attendance::geo::Coordinate;
use crate::attendance::geofence::GeofenceLookup;
use crate::attendance::penalty::EscalationConfig;
use crate::attendance::repository::{AttendanceRepository, EventRepository, RepositoryError};
use crate::attendance::service::{AttendanceService, CheckIn};

pub(super) const CAMPUS_LAT: f64 = 14.5995;
pub(super) const CAMPUS_LNG: f64 = 120.9842;

/// Scheduled start of the fixture event.
pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0)
        .single()
        .expect("valid start")
}

pub(super) fn start_plus(minutes: i64) -> DateTime<Utc> {
    start() + Duration::minutes(minutes)
}

/// 10:00-12:00 with a 15/10 sign-in window and a 10/15 sign-out window.
pub(super) fn schedule() -> EventSchedule {
    schedule_between(start(), start() + Duration::hours(2))
}

pub(super) fn schedule_between(start: DateTime<Utc>, end: DateTime<Utc>) -> EventSchedule {
    EventSchedule {
        start_time: start,
        end_time: end,
        sign_in_start_offset_minutes: 15,
        sign_in_end_offset_minutes: 10,
        sign_out_start_offset_minutes: 10,
        sign_out_end_offset_minutes: 15,
        is_active: true,
    }
}

pub(super) fn campus() -> Coordinate {
    Coordinate::new(CAMPUS_LAT, CAMPUS_LNG).expect("valid campus coordinate")
}

/// Roughly 33 m north of campus.
pub(super) fn near_campus() -> Coordinate {
    Coordinate::new(14.5998, CAMPUS_LNG).expect("valid coordinate")
}

/// Roughly 111 m north of campus.
pub(super) fn far_from_campus() -> Coordinate {
    Coordinate::new(14.6005, CAMPUS_LNG).expect("valid coordinate")
}

pub(super) fn event_id(raw: &str) -> EventId {
    EventId(raw.to_string())
}

pub(super) fn student_id(raw: &str) -> StudentId {
    StudentId(raw.to_string())
}

pub(super) fn event(raw_id: &str) -> EventDefinition {
    EventDefinition {
        event_id: event_id(raw_id),
        title: "Orientation Assembly".to_string(),
        schedule: schedule(),
        geofence: Some(GeofenceSpec {
            center: campus(),
            radius_meters: 50.0,
        }),
    }
}

pub(super) fn check_in(event: &str, student: &str, location: Coordinate) -> CheckIn {
    CheckIn {
        event_id: event_id(event),
        student_id: student_id(student),
        location: location.into(),
        biometric: BiometricOutcome::Succeeded,
    }
}

pub(super) fn record(
    student: &str,
    event: &str,
    timestamp: DateTime<Utc>,
    status: AttendanceStatus,
    penalty: Option<PenaltyTier>,
) -> AttendanceRecord {
    AttendanceRecord {
        student_id: student_id(student),
        event_id: event_id(event),
        timestamp,
        status,
        penalty,
        location: None,
        signed_out_at: None,
    }
}

/// Geofence lookup that counts calls and answers with a fixed result.
pub(super) struct SpyGeofences {
    pub(super) calls: AtomicUsize,
    pub(super) answer: bool,
}

impl SpyGeofences {
    pub(super) fn answering(answer: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer,
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeofenceLookup for SpyGeofences {
    fn is_within(&self, _event_id: &EventId, _point: Coordinate) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryEvents {
    pub(super) events: Arc<Mutex<HashMap<EventId, EventDefinition>>>,
}

impl EventRepository for MemoryEvents {
    fn upsert(&self, event: EventDefinition) -> Result<EventDefinition, RepositoryError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.insert(event.event_id.clone(), event.clone());
        Ok(event)
    }

    fn fetch(&self, event_id: &EventId) -> Result<Option<EventDefinition>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard.get(event_id).cloned())
    }

    fn remove(&self, event_id: &EventId) -> Result<Option<EventDefinition>, RepositoryError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard.remove(event_id))
    }

    fn all(&self) -> Result<Vec<EventDefinition>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRecords {
    pub(super) records: Arc<Mutex<HashMap<(EventId, StudentId), AttendanceRecord>>>,
}

impl AttendanceRepository for MemoryRecords {
    fn insert(&self, record: AttendanceRecord) -> Result<AttendanceRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("record mutex poisoned");
        let key = (record.event_id.clone(), record.student_id.clone());
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, record.clone());
        Ok(record)
    }

    fn update(&self, record: AttendanceRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("record mutex poisoned");
        let key = (record.event_id.clone(), record.student_id.clone());
        match guard.get_mut(&key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard.get(&(event_id.clone(), student_id.clone())).cloned())
    }

    fn for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| &record.student_id == student_id)
            .cloned()
            .collect())
    }

    fn for_event(&self, event_id: &EventId) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| &record.event_id == event_id)
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRecords;

impl AttendanceRepository for UnavailableRecords {
    fn insert(&self, _record: AttendanceRecord) -> Result<AttendanceRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: AttendanceRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        _event_id: &EventId,
        _student_id: &StudentId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_student(
        &self,
        _student_id: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_event(&self, _event_id: &EventId) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Stores records normally but cannot list a student's history.
#[derive(Default, Clone)]
pub(super) struct HistoryOutageRecords {
    pub(super) inner: MemoryRecords,
}

impl AttendanceRepository for HistoryOutageRecords {
    fn insert(&self, record: AttendanceRecord) -> Result<AttendanceRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: AttendanceRecord) -> Result<(), RepositoryError> {
        self.inner.update(record)
    }

    fn fetch(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        self.inner.fetch(event_id, student_id)
    }

    fn for_student(
        &self,
        _student_id: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("history index offline".to_string()))
    }

    fn for_event(&self, event_id: &EventId) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        self.inner.for_event(event_id)
    }
}

pub(super) type MemoryService = AttendanceService<MemoryEvents, MemoryRecords>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryEvents>, Arc<MemoryRecords>) {
    build_service_with(AdmissionConfig::default())
}

pub(super) fn build_service_with(
    admission: AdmissionConfig,
) -> (MemoryService, Arc<MemoryEvents>, Arc<MemoryRecords>) {
    let events = Arc::new(MemoryEvents::default());
    let records = Arc::new(MemoryRecords::default());
    let service = AttendanceService::new(
        events.clone(),
        records.clone(),
        admission,
        EscalationConfig::default(),
    );
    (service, events, records)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
