use chrono::{DateTime, NaiveDateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rollcall::attendance::{
    AttendanceRecord, AttendanceRepository, EventDefinition, EventId, EventRepository,
    RepositoryError, StudentId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEventRepository {
    events: Arc<Mutex<HashMap<EventId, EventDefinition>>>,
}

impl EventRepository for InMemoryEventRepository {
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

/// Keyed by (event, student) so a second admission for the same pair conflicts.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAttendanceRepository {
    records: Arc<Mutex<HashMap<(EventId, StudentId), AttendanceRecord>>>,
}

impl AttendanceRepository for InMemoryAttendanceRepository {
    fn insert(&self, record: AttendanceRecord) -> Result<AttendanceRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = (record.event_id.clone(), record.student_id.clone());
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, record.clone());
        Ok(record)
    }

    fn update(&self, record: AttendanceRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = (record.event_id.clone(), record.student_id.clone());
        if guard.contains_key(&key) {
            guard.insert(key, record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&(event_id.clone(), student_id.clone())).cloned())
    }

    fn for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| &record.student_id == student_id)
            .cloned()
            .collect())
    }

    fn for_event(&self, event_id: &EventId) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<AttendanceRecord> = guard
            .values()
            .filter(|record| &record.event_id == event_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD HH:MM` taken as UTC.
pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|err| {
            format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD HH:MM ({err})")
        })
}
