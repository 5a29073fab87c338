use std::cmp::Reverse;

use super::super::domain::{
    AttendanceRecord, AttendanceStatus, PenaltyTier, StudentId, StudentPenaltyInfo,
};
use super::config::EscalationConfig;

const ACTION_COMMITTEE: &str = "Refer to Student Services Committee for disciplinary action";
const ACTION_ADVISOR: &str = "Schedule meeting with academic advisor";
const ACTION_WARNING_LETTER: &str = "Issue formal warning letter";
const ACTION_COUNSELING: &str = "Informal counseling session recommended";

/// Tallies gathered from a student's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCounts {
    pub late: usize,
    pub absent: usize,
    pub severe: usize,
}

impl HistoryCounts {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        records
            .into_iter()
            .fold(HistoryCounts::default(), |mut counts, record| {
                match record.status {
                    AttendanceStatus::Late => counts.late += 1,
                    AttendanceStatus::Absent => counts.absent += 1,
                    AttendanceStatus::Present | AttendanceStatus::Excused => {}
                }
                if record.penalty.is_some_and(PenaltyTier::is_severe) {
                    counts.severe += 1;
                }
                counts
            })
    }
}

/// Derives advisory disciplinary state from attendance history. Never gates admission.
#[derive(Debug, Clone, Default)]
pub struct PenaltyEscalationEvaluator {
    config: EscalationConfig,
}

impl PenaltyEscalationEvaluator {
    pub fn new(config: EscalationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    pub fn summarize(
        &self,
        student_id: &StudentId,
        history: &[AttendanceRecord],
    ) -> StudentPenaltyInfo {
        let counts = HistoryCounts::from_records(
            history
                .iter()
                .filter(|record| &record.student_id == student_id),
        );
        let (current_penalty_level, recommended_action) = match self.level_for(counts) {
            Some((tier, action)) => (Some(tier), Some(action.to_string())),
            None => (None, None),
        };

        StudentPenaltyInfo {
            student_id: student_id.clone(),
            total_late_count: counts.late,
            total_absent_count: counts.absent,
            current_penalty_level,
            recommended_action,
        }
    }

    fn level_for(&self, counts: HistoryCounts) -> Option<(PenaltyTier, &'static str)> {
        let config = &self.config;
        if counts.severe >= config.critical_severe_count {
            Some((PenaltyTier::Critical, ACTION_COMMITTEE))
        } else if counts.severe >= config.major_severe_count {
            Some((PenaltyTier::Major, ACTION_ADVISOR))
        } else if counts.late >= config.minor_late_count {
            Some((PenaltyTier::Minor, ACTION_WARNING_LETTER))
        } else if counts.late >= config.warning_late_count {
            Some((PenaltyTier::Warning, ACTION_COUNSELING))
        } else {
            None
        }
    }

    /// The student's most recent records, newest first, regardless of the order supplied.
    pub fn recent<'a>(
        &self,
        student_id: &StudentId,
        history: &'a [AttendanceRecord],
    ) -> Vec<&'a AttendanceRecord> {
        let mut ordered: Vec<&AttendanceRecord> = history
            .iter()
            .filter(|record| &record.student_id == student_id)
            .collect();
        ordered.sort_by_key(|record| Reverse(record.timestamp));
        ordered.truncate(self.config.recent_window);
        ordered
    }

    /// Whether the recent window holds enough critical or major penalties to
    /// warrant administrative review.
    pub fn should_escalate(&self, student_id: &StudentId, history: &[AttendanceRecord]) -> bool {
        let (critical, major) = self
            .recent(student_id, history)
            .into_iter()
            .fold((0usize, 0usize), |(critical, major), record| {
                match record.penalty {
                    Some(PenaltyTier::Critical) => (critical + 1, major),
                    Some(PenaltyTier::Major) => (critical, major + 1),
                    _ => (critical, major),
                }
            });

        critical >= self.config.critical_trigger || major >= self.config.major_trigger
    }
}
