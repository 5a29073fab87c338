//! Attendance admission core: geofence membership, sign-in/sign-out windows,
//! lateness penalties, and the escalation review built on top of them.
//!
//! The geo, window, penalty, and admission modules are pure decision code. The
//! service and router modules add the stores, logging, and HTTP surface.

pub mod admission;
pub mod domain;
pub mod geo;
pub mod geofence;
pub mod penalty;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;
pub mod window;

#[cfg(test)]
mod tests;

pub use admission::{
    lateness_minutes, AdmissionConfig, AdmissionRequest, AttendanceAdmissionCoordinator,
    AttendanceDecision, BiometricError, BiometricOutcome, RejectionReason,
};
pub use domain::{
    AttendanceRecord, AttendanceStatus, EventDefinition, EventId, EventSchedule, GeofenceSpec,
    InvalidArgument, PenaltyTier, StudentId, StudentPenaltyInfo,
};
pub use geo::{distance_meters, Coordinate, EARTH_RADIUS_METERS};
pub use geofence::{Geofence, GeofenceLookup, GeofenceMatch, GeofenceRegistry};
pub use penalty::{
    EscalationConfig, HistoryCounts, PenaltyClassifier, PenaltyEscalationEvaluator, PenaltyRule,
};
pub use repository::{AttendanceRepository, EventRepository, RepositoryError};
pub use router::attendance_router;
pub use service::{AttendanceService, AttendanceServiceError, CheckIn, LocationFix};
pub use views::{EventAttendanceReport, PenaltyCount, StudentPenaltyView, WindowStatusView};
pub use window::{AttendanceWindowPolicy, AttendanceWindows, WindowState};
