mod config;
mod escalation;
mod rules;

pub use config::EscalationConfig;
pub use escalation::{HistoryCounts, PenaltyEscalationEvaluator};
pub use rules::{PenaltyClassifier, PenaltyRule};
