use crate::infra::{parse_datetime, InMemoryAttendanceRepository, InMemoryEventRepository};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rollcall::attendance::{
    AdmissionConfig, AttendanceDecision, AttendanceService, AttendanceWindowPolicy,
    AttendanceWindows, BiometricError, BiometricOutcome, CheckIn, Coordinate, EscalationConfig,
    EventDefinition, EventId, EventSchedule, GeofenceSpec, PenaltyClassifier, StudentId,
};
use rollcall::error::AppError;
use std::sync::Arc;

const CAMPUS: (f64, f64) = (14.5995, 120.9842);

type DemoService = AttendanceService<InMemoryEventRepository, InMemoryAttendanceRepository>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Scheduled start of the sample event (RFC 3339 or YYYY-MM-DD HH:MM). Defaults to now.
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Minutes of lateness still recorded as present.
    #[arg(long, default_value_t = 0)]
    pub(crate) grace_minutes: i64,
    /// Geofence radius around the sample venue, in meters.
    #[arg(long, default_value_t = 50.0)]
    pub(crate) radius: f32,
}

#[derive(Args, Debug)]
pub(crate) struct WindowArgs {
    /// Scheduled start (RFC 3339 or YYYY-MM-DD HH:MM)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) start: DateTime<Utc>,
    /// Scheduled end (RFC 3339 or YYYY-MM-DD HH:MM)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) end: DateTime<Utc>,
    /// Instant to classify (defaults to now)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) at: Option<DateTime<Utc>>,
    /// Minutes before the start that sign-in opens
    #[arg(long, default_value_t = 15)]
    pub(crate) sign_in_start: i64,
    /// Minutes after the start that sign-in closes
    #[arg(long, default_value_t = 10)]
    pub(crate) sign_in_end: i64,
    /// Minutes before the end that sign-out opens
    #[arg(long, default_value_t = 10)]
    pub(crate) sign_out_start: i64,
    /// Minutes after the end that sign-out closes
    #[arg(long, default_value_t = 15)]
    pub(crate) sign_out_end: i64,
    /// Treat the event as deactivated
    #[arg(long)]
    pub(crate) inactive: bool,
}

pub(crate) fn run_rules() -> Result<(), AppError> {
    println!("Penalty rules");
    for rule in PenaltyClassifier::rules() {
        let threshold = rule
            .minutes_late_threshold
            .map(|minutes| format!("<= {minutes} min"))
            .unwrap_or_else(|| "unbounded".to_string());
        println!(
            "- {:<8} {:<12} {:<9} {}",
            rule.status.label(),
            threshold,
            rule.penalty_type.label(),
            rule.description
        );
    }
    Ok(())
}

pub(crate) fn run_window(args: WindowArgs) -> Result<(), AppError> {
    let schedule = EventSchedule {
        start_time: args.start,
        end_time: args.end,
        sign_in_start_offset_minutes: args.sign_in_start,
        sign_in_end_offset_minutes: args.sign_in_end,
        sign_out_start_offset_minutes: args.sign_out_start,
        sign_out_end_offset_minutes: args.sign_out_end,
        is_active: !args.inactive,
    };
    let at = args.at.unwrap_or_else(Utc::now);

    let windows = AttendanceWindowPolicy::windows(&schedule)?;
    let state = AttendanceWindowPolicy::classify(&schedule, at)?;

    render_windows(&windows);
    println!(
        "\nAt {}: {} ({})",
        at.to_rfc3339(),
        state.label(),
        state.description()
    );
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        grace_minutes,
        radius,
    } = args;
    let start = start.unwrap_or_else(Utc::now);

    let service: DemoService = AttendanceService::new(
        Arc::new(InMemoryEventRepository::default()),
        Arc::new(InMemoryAttendanceRepository::default()),
        AdmissionConfig {
            grace_minutes,
            ..AdmissionConfig::default()
        },
        EscalationConfig::default(),
    );

    println!("Attendance admission demo");
    let assembly = service.configure_event(sample_event("orientation", start, radius))?;
    println!(
        "Event: {} ({}), geofence {:.0} m around ({}, {})",
        assembly.title,
        assembly.event_id.as_str(),
        radius,
        CAMPUS.0,
        CAMPUS.1
    );
    render_windows(&AttendanceWindowPolicy::windows(&assembly.schedule)?);

    let venue = coordinate(CAMPUS.0, CAMPUS.1)?;
    let gate = coordinate(14.5998, CAMPUS.1)?;
    let parking = coordinate(14.6042, 120.9822)?;

    println!("\nCheck-in attempts");
    let attempts = [
        ("2021-00001", -5, venue, BiometricOutcome::Succeeded),
        ("2021-00002", 8, gate, BiometricOutcome::Succeeded),
        ("2021-00003", 22, venue, BiometricOutcome::Succeeded),
        ("2021-00004", 0, parking, BiometricOutcome::Succeeded),
        (
            "2021-00005",
            1,
            venue,
            BiometricOutcome::Failed(BiometricError::NotRecognized),
        ),
        ("2021-00006", -30, venue, BiometricOutcome::Succeeded),
        ("2021-00001", 2, venue, BiometricOutcome::Succeeded),
    ];
    for (student, offset, location, biometric) in attempts {
        let attempt = check_in(&assembly.event_id, student, location, biometric)?;
        match service.check_in(attempt, start + Duration::minutes(offset)) {
            Ok(decision) => render_decision(student, offset, &decision),
            Err(err) => println!("- {student} at {offset:+} min: error: {err}"),
        }
    }

    println!("\nSign-out");
    let end = assembly.schedule.end_time;
    let sign_out = check_in(
        &assembly.event_id,
        "2021-00001",
        venue,
        BiometricOutcome::Succeeded,
    )?;
    let decision = service.sign_out(sign_out, end)?;
    render_decision("2021-00001", (end - start).num_minutes(), &decision);

    println!("\nAdministrative marks");
    let absent = service.mark_absent(
        &assembly.event_id,
        &student_id("2021-00007")?,
        end + Duration::minutes(30),
    )?;
    println!(
        "- {} marked {} ({})",
        absent.student_id.as_str(),
        absent.status.label(),
        absent
            .penalty
            .map(|tier| tier.label())
            .unwrap_or("no penalty")
    );
    let excused = service.excuse(
        &assembly.event_id,
        &student_id("2021-00003")?,
        end + Duration::minutes(30),
    )?;
    println!(
        "- {} marked {} (penalty cleared)",
        excused.student_id.as_str(),
        excused.status.label()
    );

    let report = service.event_report(&assembly.event_id)?;
    println!("\nEvent report: {}", report.title);
    println!(
        "Present {} | Late {} | Absent {} | Excused {} | Signed out {}",
        report.present, report.late, report.absent, report.excused, report.signed_out
    );
    for entry in &report.penalties {
        println!("- {}: {}", entry.tier.label(), entry.count);
    }

    simulate_chronic_lateness(&service, start, radius)?;
    Ok(())
}

fn simulate_chronic_lateness(
    service: &DemoService,
    start: DateTime<Utc>,
    radius: f32,
) -> Result<(), AppError> {
    let student = student_id("2021-00002")?;
    let venue = coordinate(CAMPUS.0, CAMPUS.1)?;

    println!("\nFollow-up week for {}", student.as_str());
    for day in 1..=3 {
        let day_start = start + Duration::days(day);
        let event = service.configure_event(sample_event(
            &format!("orientation-day-{day}"),
            day_start,
            radius,
        ))?;
        let attempt = check_in(
            &event.event_id,
            student.as_str(),
            venue,
            BiometricOutcome::Succeeded,
        )?;
        let decision = service.check_in(attempt, day_start + Duration::minutes(25))?;
        render_decision(student.as_str(), 25, &decision);
    }

    let view = service.penalty_summary(&student)?;
    println!(
        "Late {} | Absent {} | Level {} | Escalate {}",
        view.info.total_late_count,
        view.info.total_absent_count,
        view.info
            .current_penalty_level
            .map(|tier| tier.label())
            .unwrap_or("none"),
        if view.escalate { "yes" } else { "no" }
    );
    if let Some(action) = view.info.recommended_action {
        println!("Recommended action: {action}");
    }
    Ok(())
}

fn sample_event(id: &str, start: DateTime<Utc>, radius: f32) -> EventDefinition {
    EventDefinition {
        event_id: EventId(id.to_string()),
        title: "Freshman Orientation".to_string(),
        schedule: EventSchedule {
            start_time: start,
            end_time: start + Duration::hours(2),
            sign_in_start_offset_minutes: 15,
            sign_in_end_offset_minutes: 30,
            sign_out_start_offset_minutes: 10,
            sign_out_end_offset_minutes: 15,
            is_active: true,
        },
        geofence: Some(GeofenceSpec {
            center: Coordinate {
                latitude: CAMPUS.0,
                longitude: CAMPUS.1,
            },
            radius_meters: radius,
        }),
    }
}

fn coordinate(latitude: f64, longitude: f64) -> Result<Coordinate, AppError> {
    Ok(Coordinate::new(latitude, longitude)?)
}

fn student_id(raw: &str) -> Result<StudentId, AppError> {
    Ok(StudentId::new(raw)?)
}

fn check_in(
    event_id: &EventId,
    student: &str,
    location: Coordinate,
    biometric: BiometricOutcome,
) -> Result<CheckIn, AppError> {
    Ok(CheckIn {
        event_id: event_id.clone(),
        student_id: student_id(student)?,
        location: location.into(),
        biometric,
    })
}

fn render_windows(windows: &AttendanceWindows) {
    println!("Sign-in:  {} to {}", windows.sign_in_start, windows.sign_in_end);
    println!("Sign-out: {} to {}", windows.sign_out_start, windows.sign_out_end);
}

fn render_decision(student: &str, offset: i64, decision: &AttendanceDecision) {
    if !decision.admitted {
        println!("- {student} at {offset:+} min: rejected, {}", decision.reason);
        return;
    }

    let status = decision
        .status
        .map(|status| status.label())
        .unwrap_or("signed out");
    let penalty = decision
        .penalty
        .map(|tier| tier.label())
        .unwrap_or("no penalty");
    println!(
        "- {student} at {offset:+} min: {status}, {} min late, {penalty}",
        decision.minutes_late
    );
}
