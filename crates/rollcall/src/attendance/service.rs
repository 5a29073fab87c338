use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::admission::{
    AdmissionConfig, AdmissionRequest, AttendanceAdmissionCoordinator, AttendanceDecision,
    BiometricOutcome,
};
use super::domain::{
    AttendanceRecord, AttendanceStatus, EventDefinition, EventId, InvalidArgument, StudentId,
};
use super::geo::Coordinate;
use super::geofence::{Geofence, GeofenceRegistry};
use super::penalty::{EscalationConfig, PenaltyClassifier, PenaltyEscalationEvaluator};
use super::repository::{AttendanceRepository, EventRepository, RepositoryError};
use super::views::{EventAttendanceReport, StudentPenaltyView, WindowStatusView};
use super::window::AttendanceWindowPolicy;

/// Location reading from the device. Accuracy and capture time are informational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    #[serde(default)]
    pub accuracy_meters: Option<f32>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

impl From<Coordinate> for LocationFix {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_meters: None,
            captured_at: None,
        }
    }
}

/// A student's attempt to sign in to or out of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIn {
    pub event_id: EventId,
    pub student_id: StudentId,
    pub location: LocationFix,
    pub biometric: BiometricOutcome,
}

/// Service composing the admission core with the event and attendance stores.
pub struct AttendanceService<E, R> {
    events: Arc<E>,
    records: Arc<R>,
    geofences: Arc<GeofenceRegistry>,
    coordinator: AttendanceAdmissionCoordinator<GeofenceRegistry>,
    escalation: PenaltyEscalationEvaluator,
}

impl<E, R> AttendanceService<E, R>
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    pub fn new(
        events: Arc<E>,
        records: Arc<R>,
        admission: AdmissionConfig,
        escalation: EscalationConfig,
    ) -> Self {
        let geofences = Arc::new(GeofenceRegistry::new(admission.allow_when_unregistered));
        Self::with_registry(events, records, geofences, admission, escalation)
    }

    pub fn with_registry(
        events: Arc<E>,
        records: Arc<R>,
        geofences: Arc<GeofenceRegistry>,
        admission: AdmissionConfig,
        escalation: EscalationConfig,
    ) -> Self {
        let coordinator = AttendanceAdmissionCoordinator::new(geofences.clone(), admission);

        Self {
            events,
            records,
            geofences,
            coordinator,
            escalation: PenaltyEscalationEvaluator::new(escalation),
        }
    }

    pub fn geofences(&self) -> &GeofenceRegistry {
        &self.geofences
    }

    /// Rebuilds the geofence cache from the event store.
    pub fn restore_geofences(&self) -> Result<usize, AttendanceServiceError> {
        let events = self.events.all()?;
        let count = self.geofences.sync(&events)?;
        info!(count, "geofences restored from event store");
        Ok(count)
    }

    /// Stores an event and registers (or clears) its geofence.
    pub fn configure_event(
        &self,
        event: EventDefinition,
    ) -> Result<EventDefinition, AttendanceServiceError> {
        if event.event_id.as_str().trim().is_empty() {
            return Err(InvalidArgument::EmptyIdentifier("event_id").into());
        }
        event.schedule.validate()?;
        if let Some(spec) = &event.geofence {
            Geofence::new(event.event_id.clone(), spec.center, spec.radius_meters)?;
        }

        let stored = self.events.upsert(event)?;
        self.geofences.apply_event(&stored)?;
        info!(
            event_id = stored.event_id.as_str(),
            geofenced = stored.geofence.is_some(),
            "event configured"
        );
        Ok(stored)
    }

    pub fn remove_event(&self, event_id: &EventId) -> Result<(), AttendanceServiceError> {
        let removed = self.events.remove(event_id)?;
        self.geofences.unregister(event_id);
        match removed {
            Some(_) => {
                info!(event_id = event_id.as_str(), "event removed");
                Ok(())
            }
            None => Err(AttendanceServiceError::EventNotFound(event_id.0.clone())),
        }
    }

    pub fn event(&self, event_id: &EventId) -> Result<EventDefinition, AttendanceServiceError> {
        self.events
            .fetch(event_id)?
            .ok_or_else(|| AttendanceServiceError::EventNotFound(event_id.0.clone()))
    }

    pub fn window_status(
        &self,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<WindowStatusView, AttendanceServiceError> {
        let event = self.event(event_id)?;
        let windows = AttendanceWindowPolicy::windows(&event.schedule)?;
        let state = AttendanceWindowPolicy::classify(&event.schedule, now)?;

        Ok(WindowStatusView {
            event_id: event.event_id,
            evaluated_at: now,
            state,
            description: state.description(),
            windows,
        })
    }

    /// Runs the admission gates and persists the record when admitted.
    pub fn check_in(
        &self,
        attempt: CheckIn,
        now: DateTime<Utc>,
    ) -> Result<AttendanceDecision, AttendanceServiceError> {
        let event = self.event(&attempt.event_id)?;
        let request = AdmissionRequest {
            event_id: &event.event_id,
            student_id: &attempt.student_id,
            schedule: &event.schedule,
            location: attempt.location.coordinate,
            biometric: attempt.biometric,
        };

        let decision = self.coordinator.attempt_admission(&request, now)?;
        let status = match (decision.admitted, decision.status) {
            (true, Some(status)) => status,
            _ => {
                debug!(
                    event_id = event.event_id.as_str(),
                    student_id = attempt.student_id.as_str(),
                    reason = %decision.reason,
                    "check-in rejected"
                );
                return Ok(decision);
            }
        };

        self.records.insert(AttendanceRecord {
            student_id: attempt.student_id.clone(),
            event_id: event.event_id.clone(),
            timestamp: now,
            status,
            penalty: decision.penalty,
            location: Some(attempt.location.coordinate),
            signed_out_at: None,
        })?;

        info!(
            event_id = event.event_id.as_str(),
            student_id = attempt.student_id.as_str(),
            status = status.label(),
            minutes_late = decision.minutes_late,
            "check-in admitted"
        );
        self.flag_escalation(&attempt.student_id);

        Ok(decision)
    }

    /// Stamps the sign-out time on an existing check-in.
    pub fn sign_out(
        &self,
        attempt: CheckIn,
        now: DateTime<Utc>,
    ) -> Result<AttendanceDecision, AttendanceServiceError> {
        let event = self.event(&attempt.event_id)?;
        let mut record = self
            .records
            .fetch(&event.event_id, &attempt.student_id)?
            .filter(|record| {
                matches!(
                    record.status,
                    AttendanceStatus::Present | AttendanceStatus::Late
                )
            })
            .ok_or_else(|| AttendanceServiceError::NotCheckedIn {
                student: attempt.student_id.0.clone(),
                event: event.event_id.0.clone(),
            })?;

        if record.signed_out_at.is_some() {
            return Err(AttendanceServiceError::AlreadySignedOut {
                student: attempt.student_id.0.clone(),
                event: event.event_id.0.clone(),
            });
        }

        let request = AdmissionRequest {
            event_id: &event.event_id,
            student_id: &attempt.student_id,
            schedule: &event.schedule,
            location: attempt.location.coordinate,
            biometric: attempt.biometric,
        };
        let decision = self.coordinator.attempt_sign_out(&request, now)?;
        if !decision.admitted {
            debug!(
                event_id = event.event_id.as_str(),
                student_id = attempt.student_id.as_str(),
                reason = %decision.reason,
                "sign-out rejected"
            );
            return Ok(decision);
        }

        record.signed_out_at = Some(now);
        self.records.update(record)?;
        info!(
            event_id = event.event_id.as_str(),
            student_id = attempt.student_id.as_str(),
            "sign-out recorded"
        );

        Ok(decision)
    }

    /// Records an absence, which always carries the critical penalty.
    pub fn mark_absent(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceServiceError> {
        let event = self.event(event_id)?;
        let record = self.records.insert(AttendanceRecord {
            student_id: student_id.clone(),
            event_id: event.event_id,
            timestamp: now,
            status: AttendanceStatus::Absent,
            penalty: PenaltyClassifier::for_status(AttendanceStatus::Absent, 0),
            location: None,
            signed_out_at: None,
        })?;

        info!(
            event_id = event_id.as_str(),
            student_id = student_id.as_str(),
            "absence recorded"
        );
        self.flag_escalation(student_id);
        Ok(record)
    }

    /// Administrative override: the student's record becomes excused with no penalty.
    pub fn excuse(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceServiceError> {
        let event = self.event(event_id)?;
        let record = match self.records.fetch(&event.event_id, student_id)? {
            Some(mut existing) => {
                existing.status = AttendanceStatus::Excused;
                existing.penalty = None;
                self.records.update(existing.clone())?;
                existing
            }
            None => self.records.insert(AttendanceRecord {
                student_id: student_id.clone(),
                event_id: event.event_id,
                timestamp: now,
                status: AttendanceStatus::Excused,
                penalty: None,
                location: None,
                signed_out_at: None,
            })?,
        };

        info!(
            event_id = event_id.as_str(),
            student_id = student_id.as_str(),
            "attendance excused"
        );
        Ok(record)
    }

    pub fn penalty_summary(
        &self,
        student_id: &StudentId,
    ) -> Result<StudentPenaltyView, AttendanceServiceError> {
        let history = self.records.for_student(student_id)?;
        Ok(StudentPenaltyView {
            info: self.escalation.summarize(student_id, &history),
            escalate: self.escalation.should_escalate(student_id, &history),
        })
    }

    pub fn event_report(
        &self,
        event_id: &EventId,
    ) -> Result<EventAttendanceReport, AttendanceServiceError> {
        let event = self.event(event_id)?;
        let records = self.records.for_event(&event.event_id)?;
        Ok(EventAttendanceReport::from_records(
            event.event_id,
            event.title,
            &records,
        ))
    }

    /// Advisory only: the record is already stored, so a failed history read is logged.
    fn flag_escalation(&self, student_id: &StudentId) {
        let history = match self.records.for_student(student_id) {
            Ok(history) => history,
            Err(err) => {
                warn!(
                    student_id = student_id.as_str(),
                    error = %err,
                    "escalation check skipped"
                );
                return;
            }
        };

        if self.escalation.should_escalate(student_id, &history) {
            warn!(
                student_id = student_id.as_str(),
                "recent penalties warrant administrative review"
            );
        }
    }
}

/// Error raised by the attendance service.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceServiceError {
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("event {0} not found")]
    EventNotFound(String),
    #[error("student {student} has no check-in for event {event}")]
    NotCheckedIn { student: String, event: String },
    #[error("student {student} already signed out of event {event}")]
    AlreadySignedOut { student: String, event: String },
}
