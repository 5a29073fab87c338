use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    AttendanceRecord, AttendanceStatus, EventId, PenaltyTier, StudentPenaltyInfo,
};
use super::window::{AttendanceWindows, WindowState};

/// Window classification for an event at a given instant.
#[derive(Debug, Clone, Serialize)]
pub struct WindowStatusView {
    pub event_id: EventId,
    pub evaluated_at: DateTime<Utc>,
    pub state: WindowState,
    pub description: &'static str,
    pub windows: AttendanceWindows,
}

/// Student standing plus the advisory escalation flag.
#[derive(Debug, Clone, Serialize)]
pub struct StudentPenaltyView {
    #[serde(flatten)]
    pub info: StudentPenaltyInfo,
    pub escalate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PenaltyCount {
    pub tier: PenaltyTier,
    pub count: usize,
}

/// Per-event aggregate for administrator reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAttendanceReport {
    pub event_id: EventId,
    pub title: String,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub excused: usize,
    pub signed_out: usize,
    pub penalties: Vec<PenaltyCount>,
}

impl EventAttendanceReport {
    pub fn from_records(event_id: EventId, title: String, records: &[AttendanceRecord]) -> Self {
        let count_status =
            |status: AttendanceStatus| records.iter().filter(|r| r.status == status).count();

        let penalties = PenaltyTier::ALL
            .iter()
            .map(|tier| PenaltyCount {
                tier: *tier,
                count: records
                    .iter()
                    .filter(|record| record.penalty == Some(*tier))
                    .count(),
            })
            .filter(|entry| entry.count > 0)
            .collect();

        Self {
            event_id,
            title,
            present: count_status(AttendanceStatus::Present),
            late: count_status(AttendanceStatus::Late),
            absent: count_status(AttendanceStatus::Absent),
            excused: count_status(AttendanceStatus::Excused),
            signed_out: records
                .iter()
                .filter(|record| record.signed_out_at.is_some())
                .count(),
            penalties,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.late + self.absent + self.excused
    }
}
