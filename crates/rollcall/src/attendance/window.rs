use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{EventSchedule, InvalidArgument};

/// Position of an instant relative to an event's sign-in/sign-out windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowState {
    Inactive,
    TooEarly,
    SignInOpen,
    SignInClosedAwaitingSignOut,
    SignOutOpen,
    Closed,
}

impl WindowState {
    pub const fn label(self) -> &'static str {
        match self {
            WindowState::Inactive => "inactive",
            WindowState::TooEarly => "too_early",
            WindowState::SignInOpen => "sign_in_open",
            WindowState::SignInClosedAwaitingSignOut => "sign_in_closed_awaiting_sign_out",
            WindowState::SignOutOpen => "sign_out_open",
            WindowState::Closed => "closed",
        }
    }

    /// Human-readable text used as a rejection reason.
    pub const fn description(self) -> &'static str {
        match self {
            WindowState::Inactive => "event inactive",
            WindowState::TooEarly => "sign-in window not yet open",
            WindowState::SignInOpen => "sign-in window open",
            WindowState::SignInClosedAwaitingSignOut => "sign-in window closed",
            WindowState::SignOutOpen => "sign-out window open",
            WindowState::Closed => "attendance window closed",
        }
    }
}

/// The four instants bounding the sign-in and sign-out windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceWindows {
    pub sign_in_start: DateTime<Utc>,
    pub sign_in_end: DateTime<Utc>,
    pub sign_out_start: DateTime<Utc>,
    pub sign_out_end: DateTime<Utc>,
}

/// Stateless policy classifying instants against an event schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceWindowPolicy;

impl AttendanceWindowPolicy {
    pub fn windows(schedule: &EventSchedule) -> Result<AttendanceWindows, InvalidArgument> {
        schedule.validate()?;

        Ok(AttendanceWindows {
            sign_in_start: schedule.sign_in_start()?,
            sign_in_end: schedule.sign_in_end()?,
            sign_out_start: schedule.sign_out_start()?,
            sign_out_end: schedule.sign_out_end()?,
        })
    }

    /// First matching rule wins, so every instant maps to exactly one state
    /// even when the sign-in and sign-out windows overlap.
    pub fn classify(
        schedule: &EventSchedule,
        now: DateTime<Utc>,
    ) -> Result<WindowState, InvalidArgument> {
        let windows = Self::windows(schedule)?;

        if !schedule.is_active {
            return Ok(WindowState::Inactive);
        }

        let state = if now < windows.sign_in_start {
            WindowState::TooEarly
        } else if now <= windows.sign_in_end {
            WindowState::SignInOpen
        } else if now < windows.sign_out_start {
            WindowState::SignInClosedAwaitingSignOut
        } else if now <= windows.sign_out_end {
            WindowState::SignOutOpen
        } else {
            WindowState::Closed
        };

        Ok(state)
    }

    pub fn can_sign_in(
        schedule: &EventSchedule,
        now: DateTime<Utc>,
    ) -> Result<bool, InvalidArgument> {
        Ok(Self::classify(schedule, now)? == WindowState::SignInOpen)
    }

    pub fn can_sign_out(
        schedule: &EventSchedule,
        now: DateTime<Utc>,
    ) -> Result<bool, InvalidArgument> {
        Ok(Self::classify(schedule, now)? == WindowState::SignOutOpen)
    }
}
