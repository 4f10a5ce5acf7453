//! Previous Close Selection
//!
//! Decides which bar of a snapshot anchors the intraday diff.
//!
//! # States
//!
//! - `NoSnapshot`: nothing to select from
//! - `UseDailyBar`: the snapshot's daily bar belongs to a completed session
//!   that has not rolled into today, so it is the last close
//! - `UsePrevDailyBar`: today's daily bar is accumulating, the last close is
//!   the separately tracked previous daily bar
//!
//! The rule is evaluated on every recomputation. There is no timer; a day
//! rollover is observed the next time the session date leaf is refreshed.

use std::str::FromStr;

use chrono::NaiveDate;

use super::market::{Bar, Snapshot, TimestampError};

/// What the daily bar's date is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviousClosePolicy {
    /// Daily bar not dated today → daily bar, else previous daily bar.
    #[default]
    WallClock,
    /// Daily bar dated the same day as the previous daily bar → daily bar,
    /// else previous daily bar.
    PrevDailyBarDate,
}

impl PreviousClosePolicy {
    /// Policy name as used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WallClock => "wall-clock",
            Self::PrevDailyBarDate => "prev-daily-bar",
        }
    }
}

impl FromStr for PreviousClosePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wall-clock" | "wallclock" | "today" => Ok(Self::WallClock),
            "prev-daily-bar" | "prevdailybar" => Ok(Self::PrevDailyBarDate),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Unrecognized policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown previous close policy: {0}")]
pub struct UnknownPolicy(pub String);

/// Selection state for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousCloseState {
    /// No snapshot present.
    NoSnapshot,
    /// The daily bar is the effective previous close.
    UseDailyBar,
    /// The previous daily bar is the effective previous close.
    UsePrevDailyBar,
}

/// Classify `snapshot` on `today` under `policy`.
///
/// A snapshot without a daily bar always falls back to the previous daily
/// bar.
///
/// # Errors
///
/// Returns [`TimestampError`] if a bar timestamp the rule needs is malformed.
pub fn classify(
    snapshot: Option<&Snapshot>,
    today: NaiveDate,
    policy: PreviousClosePolicy,
) -> Result<PreviousCloseState, TimestampError> {
    let Some(snapshot) = snapshot else {
        return Ok(PreviousCloseState::NoSnapshot);
    };

    let Some(daily_bar) = &snapshot.daily_bar else {
        return Ok(PreviousCloseState::UsePrevDailyBar);
    };

    let daily_date = daily_bar.calendar_date()?;

    let use_daily = match policy {
        PreviousClosePolicy::WallClock => daily_date != today,
        PreviousClosePolicy::PrevDailyBarDate => match &snapshot.prev_daily_bar {
            Some(prev) => prev.calendar_date()? == daily_date,
            None => false,
        },
    };

    Ok(if use_daily {
        PreviousCloseState::UseDailyBar
    } else {
        PreviousCloseState::UsePrevDailyBar
    })
}

/// Select the effective previous close bar.
///
/// Returns `Ok(None)` when there is no snapshot or the selected bar is
/// missing from it.
///
/// # Errors
///
/// Returns [`TimestampError`] if a bar timestamp the rule needs is malformed.
pub fn select<'a>(
    snapshot: Option<&'a Snapshot>,
    today: NaiveDate,
    policy: PreviousClosePolicy,
) -> Result<Option<&'a Bar>, TimestampError> {
    let bar = match classify(snapshot, today, policy)? {
        PreviousCloseState::NoSnapshot => None,
        PreviousCloseState::UseDailyBar => snapshot.and_then(|s| s.daily_bar.as_ref()),
        PreviousCloseState::UsePrevDailyBar => snapshot.and_then(|s| s.prev_daily_bar.as_ref()),
    };

    Ok(bar)
}

// =============================================================================
// Tests
// =============================================================================
