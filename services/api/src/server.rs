use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryAttendanceRepository, InMemoryEventRepository};
use crate::routes::with_attendance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rollcall::attendance::AttendanceService;
use rollcall::config::AppConfig;
use rollcall::error::AppError;
use rollcall::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let attendance_service = Arc::new(AttendanceService::new(
        Arc::new(InMemoryEventRepository::default()),
        Arc::new(InMemoryAttendanceRepository::default()),
        config.admission.clone(),
        config.escalation.clone(),
    ));
    attendance_service.restore_geofences()?;

    let app = with_attendance_routes(attendance_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        grace_minutes = config.admission.grace_minutes,
        allow_unregistered = config.admission.allow_when_unregistered,
        "attendance service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
