use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Coordinate;

/// Identifier wrapper for scheduled events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidArgument> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidArgument::EmptyIdentifier("event_id"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier wrapper for enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidArgument> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidArgument::EmptyIdentifier("student_id"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Malformed input handed to one of the pure attendance functions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidArgument {
    #[error("geofence radius must be strictly positive (found {0} m)")]
    NonPositiveRadius(f32),
    #[error("{field} must not be negative (found {minutes} minutes)")]
    NegativeOffset { field: &'static str, minutes: i64 },
    #[error("event ends at {end} before it starts at {start}")]
    InvertedSchedule {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
    #[error("{field} of {minutes} minutes moves the window outside the supported time range")]
    OffsetOutOfRange { field: &'static str, minutes: i64 },
}

/// Terminal classification of a single attendance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

impl AttendanceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
        }
    }
}

/// Disciplinary tier, ordered from mildest to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyTier {
    Warning,
    Minor,
    Major,
    Critical,
}

impl PenaltyTier {
    pub const ALL: [PenaltyTier; 4] = [
        PenaltyTier::Warning,
        PenaltyTier::Minor,
        PenaltyTier::Major,
        PenaltyTier::Critical,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PenaltyTier::Warning => "warning",
            PenaltyTier::Minor => "minor",
            PenaltyTier::Major => "major",
            PenaltyTier::Critical => "critical",
        }
    }

    pub const fn is_severe(self) -> bool {
        matches!(self, PenaltyTier::Major | PenaltyTier::Critical)
    }
}

/// Scheduled times and sign-in/sign-out offsets owned by the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchedule {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sign_in_start_offset_minutes: i64,
    pub sign_in_end_offset_minutes: i64,
    pub sign_out_start_offset_minutes: i64,
    pub sign_out_end_offset_minutes: i64,
    pub is_active: bool,
}

impl EventSchedule {
    /// Rejects negative offsets and schedules that end before they start.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        let offsets = [
            ("sign_in_start_offset_minutes", self.sign_in_start_offset_minutes),
            ("sign_in_end_offset_minutes", self.sign_in_end_offset_minutes),
            ("sign_out_start_offset_minutes", self.sign_out_start_offset_minutes),
            ("sign_out_end_offset_minutes", self.sign_out_end_offset_minutes),
        ];
        for (field, minutes) in offsets {
            if minutes < 0 {
                return Err(InvalidArgument::NegativeOffset { field, minutes });
            }
        }

        if self.end_time < self.start_time {
            return Err(InvalidArgument::InvertedSchedule {
                start: self.start_time,
                end: self.end_time,
            });
        }

        self.sign_in_start()?;
        self.sign_in_end()?;
        self.sign_out_start()?;
        self.sign_out_end()?;
        Ok(())
    }

    pub fn sign_in_start(&self) -> Result<DateTime<Utc>, InvalidArgument> {
        shift(
            self.start_time,
            -1,
            "sign_in_start_offset_minutes",
            self.sign_in_start_offset_minutes,
        )
    }

    pub fn sign_in_end(&self) -> Result<DateTime<Utc>, InvalidArgument> {
        shift(
            self.start_time,
            1,
            "sign_in_end_offset_minutes",
            self.sign_in_end_offset_minutes,
        )
    }

    pub fn sign_out_start(&self) -> Result<DateTime<Utc>, InvalidArgument> {
        shift(
            self.end_time,
            -1,
            "sign_out_start_offset_minutes",
            self.sign_out_start_offset_minutes,
        )
    }

    pub fn sign_out_end(&self) -> Result<DateTime<Utc>, InvalidArgument> {
        shift(
            self.end_time,
            1,
            "sign_out_end_offset_minutes",
            self.sign_out_end_offset_minutes,
        )
    }
}

/// Moves `base` by `minutes` in `direction` (+1 later, -1 earlier) without overflowing.
fn shift(
    base: DateTime<Utc>,
    direction: i8,
    field: &'static str,
    minutes: i64,
) -> Result<DateTime<Utc>, InvalidArgument> {
    let out_of_range = || InvalidArgument::OffsetOutOfRange { field, minutes };
    let delta = Duration::try_minutes(minutes).ok_or_else(out_of_range)?;
    let shifted = if direction < 0 {
        base.checked_sub_signed(delta)
    } else {
        base.checked_add_signed(delta)
    };
    shifted.ok_or_else(out_of_range)
}

/// Geofence fields stored alongside an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceSpec {
    pub center: Coordinate,
    pub radius_meters: f32,
}

/// Event as configured by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub event_id: EventId,
    pub title: String,
    pub schedule: EventSchedule,
    /// `None` disables geofencing for the event.
    #[serde(default)]
    pub geofence: Option<GeofenceSpec>,
}

/// Persisted outcome of an admitted or explicitly marked attendance action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub penalty: Option<PenaltyTier>,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub signed_out_at: Option<DateTime<Utc>>,
}

/// Aggregate disciplinary standing derived from a student's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPenaltyInfo {
    pub student_id: StudentId,
    pub total_late_count: usize,
    pub total_absent_count: usize,
    pub current_penalty_level: Option<PenaltyTier>,
    pub recommended_action: Option<String>,
}
