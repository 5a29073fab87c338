use serde::{Deserialize, Serialize};

use super::super::domain::{AttendanceStatus, PenaltyTier};

/// One row of the penalty table shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyRule {
    pub status: AttendanceStatus,
    /// Inclusive upper bound in minutes; `None` means unbounded.
    pub minutes_late_threshold: Option<i64>,
    pub penalty_type: PenaltyTier,
    pub description: String,
}

const LATENESS_BANDS: [(Option<i64>, PenaltyTier, &str); 4] = [
    (Some(5), PenaltyTier::Warning, "Late by up to 5 minutes"),
    (Some(15), PenaltyTier::Minor, "Late by 6 to 15 minutes"),
    (Some(30), PenaltyTier::Major, "Late by 16 to 30 minutes"),
    (None, PenaltyTier::Critical, "Late by more than 30 minutes"),
];

/// Maps lateness to a penalty tier using the static band table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PenaltyClassifier;

impl PenaltyClassifier {
    /// `None` for on-time arrivals (zero or negative lateness).
    pub fn classify(minutes_late: i64) -> Option<PenaltyTier> {
        if minutes_late <= 0 {
            return None;
        }

        LATENESS_BANDS
            .iter()
            .find(|(threshold, _, _)| threshold.map_or(true, |limit| minutes_late <= limit))
            .map(|(_, tier, _)| *tier)
    }

    /// A missed event is always critical, however much time has elapsed.
    pub const fn classify_absence() -> PenaltyTier {
        PenaltyTier::Critical
    }

    /// Penalty attached to a record of the given status.
    pub fn for_status(status: AttendanceStatus, minutes_late: i64) -> Option<PenaltyTier> {
        match status {
            AttendanceStatus::Absent => Some(Self::classify_absence()),
            AttendanceStatus::Excused => None,
            AttendanceStatus::Present | AttendanceStatus::Late => Self::classify(minutes_late),
        }
    }

    /// Lateness bands in ascending order followed by the absence rule.
    pub fn rules() -> Vec<PenaltyRule> {
        let mut rules: Vec<PenaltyRule> = LATENESS_BANDS
            .iter()
            .map(|(threshold, tier, description)| PenaltyRule {
                status: AttendanceStatus::Late,
                minutes_late_threshold: *threshold,
                penalty_type: *tier,
                description: (*description).to_string(),
            })
            .collect();

        rules.push(PenaltyRule {
            status: AttendanceStatus::Absent,
            minutes_late_threshold: None,
            penalty_type: Self::classify_absence(),
            description: "Absent without excuse".to_string(),
        });

        rules
    }
}
