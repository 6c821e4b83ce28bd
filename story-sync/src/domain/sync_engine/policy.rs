//! Optional retry spacing for previously failed items.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::PendingStory;

/// Exponential backoff between attempts on the same pending story.
///
/// Never drops items; a story that is not yet due is only deferred to a
/// later drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
}

impl RetryBackoff {
    /// Delay owed after `attempts` failures: `initial * 2^(attempts - 1)`,
    /// capped at `max`.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let exponent = 2_u32.saturating_pow(attempts.saturating_sub(1));
        let base_ms = u64::try_from(self.initial.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }

    /// Whether `item` may be attempted at `now`.
    pub fn is_due(&self, item: &PendingStory, now: DateTime<Utc>) -> bool {
        let Some(last_attempt) = item.last_attempt_at else {
            return true;
        };
        if last_attempt > now {
            return true;
        }
        let delay = TimeDelta::from_std(self.delay_after(item.attempts)).unwrap_or(TimeDelta::MAX);
        last_attempt
            .checked_add_signed(delay)
            .is_some_and(|due_at| due_at <= now)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::{LocalId, PendingStatus};

    #[fixture]
    fn backoff() -> RetryBackoff {
        RetryBackoff {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(300),
        }
    }

    fn failed_item(attempts: u32, last: DateTime<Utc>) -> PendingStory {
        PendingStory {
            local_id: LocalId::new(1),
            description: "Tea plantation".to_owned(),
            location: None,
            photo: None,
            status: PendingStatus::Failed,
            attempts,
            created_at: last,
            last_attempt_at: Some(last),
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 30)]
    #[case(2, 60)]
    #[case(4, 240)]
    #[case(5, 300)]
    #[case(40, 300)]
    fn delays_double_until_capped(backoff: RetryBackoff, #[case] attempts: u32, #[case] secs: u64) {
        assert_eq!(backoff.delay_after(attempts), Duration::from_secs(secs));
    }

    #[rstest]
    fn items_without_attempts_are_always_due(backoff: RetryBackoff) {
        let now = Utc::now();
        let mut item = failed_item(0, now);
        item.last_attempt_at = None;
        assert!(backoff.is_due(&item, now));
    }

    #[rstest]
    #[case(29, false)]
    #[case(30, true)]
    #[case(31, true)]
    fn failed_items_wait_for_their_delay(
        backoff: RetryBackoff,
        #[case] elapsed_secs: i64,
        #[case] due: bool,
    ) {
        let last = Utc
            .with_ymd_and_hms(2026, 3, 3, 3, 0, 0)
            .single()
            .expect("valid time");
        let item = failed_item(1, last);
        let now = last + TimeDelta::seconds(elapsed_secs);
        assert_eq!(backoff.is_due(&item, now), due);
    }

    #[rstest]
    fn future_attempt_stamps_do_not_block_forever(backoff: RetryBackoff) {
        let now = Utc::now();
        let item = failed_item(3, now + TimeDelta::days(2));
        assert!(backoff.is_due(&item, now));
    }
}
