use serde::{Deserialize, Serialize};

/// Thresholds for the disciplinary cascade and the recent-record trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Number of most recent records inspected by the escalation trigger.
    pub recent_window: usize,
    pub critical_trigger: usize,
    pub major_trigger: usize,
    pub critical_severe_count: usize,
    pub major_severe_count: usize,
    pub minor_late_count: usize,
    pub warning_late_count: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            recent_window: 10,
            critical_trigger: 3,
            major_trigger: 3,
            critical_severe_count: 5,
            major_severe_count: 3,
            minor_late_count: 5,
            warning_late_count: 2,
        }
    }
}
