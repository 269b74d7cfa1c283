//! Single-slot dwell timer
//!
//! Each trigger owns one [`DwellScheduler`]. Timers are deadlines against the
//! engine's clock rather than spawned tasks: whoever drives the engine asks
//! for due timers with [`DwellScheduler::take_due`] and sleeps until
//! [`DwellScheduler::next_deadline`].

use crate::error::DurationError;
use crate::invocation::TriggerCause;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// An armed dwell waiting for its deadline
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// The change that armed the timer
    pub cause: TriggerCause,
    pub duration: Duration,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DwellScheduler {
    slot: Option<PendingConfirmation>,
}

impl DwellScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer expiring at `now + duration`, replacing any armed one
    pub fn arm(
        &mut self,
        cause: TriggerCause,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), DurationError> {
        let out_of_range = || DurationError::OutOfRange(format!("{duration:?}"));
        let delta = chrono::Duration::from_std(duration).map_err(|_| out_of_range())?;
        let deadline = now.checked_add_signed(delta).ok_or_else(out_of_range)?;

        self.slot = Some(PendingConfirmation {
            cause,
            duration,
            deadline,
        });
        Ok(())
    }

    /// Drop the armed timer, if any; calling it again is a no-op
    pub fn cancel(&mut self) -> Option<PendingConfirmation> {
        self.slot.take()
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.slot.as_ref()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.slot.as_ref().map(|p| p.deadline)
    }

    /// Take the armed timer if its deadline has been reached
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<PendingConfirmation> {
        if self.slot.as_ref().is_some_and(|p| p.deadline <= now) {
            self.slot.take()
        } else {
            None
        }
    }
}
