use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::admission::BiometricOutcome;
use super::domain::{EventDefinition, EventId, EventSchedule, GeofenceSpec, StudentId};
use super::geo::Coordinate;
use super::geofence::GeofenceMatch;
use super::penalty::PenaltyClassifier;
use super::repository::{AttendanceRepository, EventRepository, RepositoryError};
use super::service::{AttendanceService, AttendanceServiceError, CheckIn, LocationFix};

type SharedService<E, R> = Arc<AttendanceService<E, R>>;

/// Event payload; the identifier comes from the path.
#[derive(Debug, Deserialize)]
pub struct EventPayload {
    pub title: String,
    pub schedule: EventSchedule,
    #[serde(default)]
    pub geofence: Option<GeofenceSpec>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInPayload {
    pub student_id: String,
    pub location: LocationFix,
    pub biometric: BiometricOutcome,
}

#[derive(Debug, Deserialize)]
pub struct StudentPayload {
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// Router builder exposing event administration, check-in, and reporting endpoints.
pub fn attendance_router<E, R>(service: SharedService<E, R>) -> Router
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/events/:event_id",
            put(configure_event_handler::<E, R>).delete(remove_event_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/window",
            get(window_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/geofence/contains",
            get(geofence_contains_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/check-in",
            post(check_in_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/sign-out",
            post(sign_out_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/absences",
            post(absence_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/excusals",
            post(excusal_handler::<E, R>),
        )
        .route(
            "/api/v1/events/:event_id/report",
            get(report_handler::<E, R>),
        )
        .route(
            "/api/v1/students/:student_id/penalties",
            get(penalty_handler::<E, R>),
        )
        .route("/api/v1/penalties/rules", get(rules_handler))
        .with_state(service)
}

impl IntoResponse for AttendanceServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            AttendanceServiceError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceServiceError::EventNotFound(_)
            | AttendanceServiceError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            AttendanceServiceError::Repository(RepositoryError::Conflict)
            | AttendanceServiceError::NotCheckedIn { .. }
            | AttendanceServiceError::AlreadySignedOut { .. } => StatusCode::CONFLICT,
            AttendanceServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

fn parse_ids(
    event_id: String,
    student_id: String,
) -> Result<(EventId, StudentId), AttendanceServiceError> {
    Ok((EventId::new(event_id)?, StudentId::new(student_id)?))
}

pub(crate) async fn configure_event_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Json(payload): Json<EventPayload>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let event_id = match EventId::new(event_id) {
        Ok(id) => id,
        Err(err) => return AttendanceServiceError::from(err).into_response(),
    };

    let event = EventDefinition {
        event_id,
        title: payload.title,
        schedule: payload.schedule,
        geofence: payload.geofence,
    };

    match service.configure_event(event) {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn remove_event_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    match service.remove_event(&EventId(event_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn window_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    match service.window_status(&EventId(event_id), Utc::now()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn geofence_contains_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Query(point): Query<PointQuery>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let point = match Coordinate::new(point.latitude, point.longitude) {
        Ok(point) => point,
        Err(err) => return AttendanceServiceError::from(err).into_response(),
    };

    let event_id = EventId(event_id);
    let registry = service.geofences();
    let registered = !matches!(
        registry.lookup(&event_id, point),
        GeofenceMatch::Unregistered
    );
    let within = registry.is_within(&event_id, point);
    let payload = json!({
        "event_id": event_id.0,
        "registered": registered,
        "within": within,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn check_in_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Json(payload): Json<CheckInPayload>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let (event_id, student_id) = match parse_ids(event_id, payload.student_id) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    let attempt = CheckIn {
        event_id,
        student_id,
        location: payload.location,
        biometric: payload.biometric,
    };

    match service.check_in(attempt, Utc::now()) {
        Ok(decision) if decision.admitted => {
            (StatusCode::CREATED, Json(decision)).into_response()
        }
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn sign_out_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Json(payload): Json<CheckInPayload>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let (event_id, student_id) = match parse_ids(event_id, payload.student_id) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    let attempt = CheckIn {
        event_id,
        student_id,
        location: payload.location,
        biometric: payload.biometric,
    };

    match service.sign_out(attempt, Utc::now()) {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn absence_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let (event_id, student_id) = match parse_ids(event_id, payload.student_id) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    match service.mark_absent(&event_id, &student_id, Utc::now()) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn excusal_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    let (event_id, student_id) = match parse_ids(event_id, payload.student_id) {
        Ok(ids) => ids,
        Err(err) => return err.into_response(),
    };

    match service.excuse(&event_id, &student_id, Utc::now()) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn report_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(event_id): Path<String>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    match service.event_report(&EventId(event_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn penalty_handler<E, R>(
    State(service): State<SharedService<E, R>>,
    Path(student_id): Path<String>,
) -> Response
where
    E: EventRepository + 'static,
    R: AttendanceRepository + 'static,
{
    match service.penalty_summary(&StudentId(student_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn rules_handler() -> Response {
    (StatusCode::OK, Json(PenaltyClassifier::rules())).into_response()
}
