use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AttendanceStatus, EventId, EventSchedule, InvalidArgument, PenaltyTier, StudentId,
};
use super::geo::Coordinate;
use super::geofence::GeofenceLookup;
use super::penalty::PenaltyClassifier;
use super::window::{AttendanceWindowPolicy, WindowState};

/// Tunables for the admission gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Lateness (minutes) still recorded as present. Independent of penalty bands.
    pub grace_minutes: i64,
    /// Admit when the event has no registered geofence. Applied by the geofence registry.
    pub allow_when_unregistered: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            grace_minutes: 0,
            allow_when_unregistered: false,
        }
    }
}

/// Why a biometric prompt did not succeed, as reported by the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricError {
    NoHardware,
    HardwareUnavailable,
    NotEnrolled,
    Cancelled,
    LockedOut,
    NotRecognized,
}

impl BiometricError {
    pub const fn label(self) -> &'static str {
        match self {
            BiometricError::NoHardware => "no biometric hardware",
            BiometricError::HardwareUnavailable => "biometric hardware unavailable",
            BiometricError::NotEnrolled => "no biometrics enrolled",
            BiometricError::Cancelled => "authentication cancelled",
            BiometricError::LockedOut => "too many attempts",
            BiometricError::NotRecognized => "biometric not recognized",
        }
    }
}

/// Already-resolved outcome of the caller's biometric prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum BiometricOutcome {
    Succeeded,
    Failed(BiometricError),
}

impl BiometricOutcome {
    pub const fn succeeded(self) -> bool {
        matches!(self, BiometricOutcome::Succeeded)
    }
}

impl From<bool> for BiometricOutcome {
    fn from(succeeded: bool) -> Self {
        if succeeded {
            BiometricOutcome::Succeeded
        } else {
            BiometricOutcome::Failed(BiometricError::NotRecognized)
        }
    }
}

/// Inputs for one admission attempt.
#[derive(Debug, Clone)]
pub struct AdmissionRequest<'a> {
    pub event_id: &'a EventId,
    pub student_id: &'a StudentId,
    pub schedule: &'a EventSchedule,
    pub location: Coordinate,
    pub biometric: BiometricOutcome,
}

/// Gate that stopped an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    EventInactive,
    Window(WindowState),
    OutsideGeofence,
    BiometricFailed(BiometricError),
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::EventInactive => "event inactive".to_string(),
            RejectionReason::Window(state) => state.description().to_string(),
            RejectionReason::OutsideGeofence => "outside geofence".to_string(),
            RejectionReason::BiometricFailed(_) => "biometric authentication failed".to_string(),
        }
    }
}

/// Result of an admission attempt. Rejections never carry a status or penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceDecision {
    pub admitted: bool,
    pub status: Option<AttendanceStatus>,
    pub penalty: Option<PenaltyTier>,
    pub minutes_late: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionReason>,
}

impl AttendanceDecision {
    fn admit(status: AttendanceStatus, penalty: Option<PenaltyTier>, minutes_late: i64) -> Self {
        Self {
            admitted: true,
            status: Some(status),
            penalty,
            minutes_late,
            reason: "ok".to_string(),
            rejection: None,
        }
    }

    fn reject(reason: RejectionReason) -> Self {
        Self {
            admitted: false,
            status: None,
            penalty: None,
            minutes_late: 0,
            reason: reason.summary(),
            rejection: Some(reason),
        }
    }
}

/// Whole minutes elapsed since `start`, floored at zero.
pub fn lateness_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_minutes().max(0)
}

/// Pure decision function over the window, geofence, and biometric gates.
pub struct AttendanceAdmissionCoordinator<G> {
    geofences: Arc<G>,
    config: AdmissionConfig,
}

impl<G> AttendanceAdmissionCoordinator<G>
where
    G: GeofenceLookup,
{
    pub fn new(geofences: Arc<G>, config: AdmissionConfig) -> Self {
        Self { geofences, config }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Evaluates the gates in order and stops at the first failure.
    pub fn attempt_admission(
        &self,
        request: &AdmissionRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceDecision, InvalidArgument> {
        if !request.schedule.is_active {
            return Ok(AttendanceDecision::reject(RejectionReason::EventInactive));
        }

        let state = AttendanceWindowPolicy::classify(request.schedule, now)?;
        if state != WindowState::SignInOpen {
            return Ok(AttendanceDecision::reject(RejectionReason::Window(state)));
        }

        if let Some(rejection) = self.check_presence(request)? {
            return Ok(AttendanceDecision::reject(rejection));
        }

        let minutes_late = lateness_minutes(request.schedule.start_time, now);
        let penalty = PenaltyClassifier::classify(minutes_late);
        let status = if minutes_late <= self.config.grace_minutes {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        };

        Ok(AttendanceDecision::admit(status, penalty, minutes_late))
    }

    /// Same gates as admission, against the sign-out window. Admitted sign-outs
    /// carry no status or penalty of their own.
    pub fn attempt_sign_out(
        &self,
        request: &AdmissionRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceDecision, InvalidArgument> {
        if !request.schedule.is_active {
            return Ok(AttendanceDecision::reject(RejectionReason::EventInactive));
        }

        let state = AttendanceWindowPolicy::classify(request.schedule, now)?;
        if state != WindowState::SignOutOpen {
            return Ok(AttendanceDecision::reject(RejectionReason::Window(state)));
        }

        if let Some(rejection) = self.check_presence(request)? {
            return Ok(AttendanceDecision::reject(rejection));
        }

        Ok(AttendanceDecision {
            admitted: true,
            status: None,
            penalty: None,
            minutes_late: 0,
            reason: "ok".to_string(),
            rejection: None,
        })
    }

    fn check_presence(
        &self,
        request: &AdmissionRequest<'_>,
    ) -> Result<Option<RejectionReason>, InvalidArgument> {
        request.location.validate()?;

        if !self
            .geofences
            .is_within(request.event_id, request.location)
        {
            return Ok(Some(RejectionReason::OutsideGeofence));
        }

        Ok(match request.biometric {
            BiometricOutcome::Succeeded => None,
            BiometricOutcome::Failed(error) => Some(RejectionReason::BiometricFailed(error)),
        })
    }
}
