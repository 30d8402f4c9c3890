use std::time::Duration;

/// Elapsed-time bucketing for reminder notices.
///
/// Bucket `n` covers `[n * interval, (n + 1) * interval)`. A reminder is
/// due whenever the current bucket is higher than the last one reminded,
/// so at most one reminder goes out per bucket no matter how often or how
/// irregularly the caller polls.
#[derive(Debug, Clone)]
pub struct ReminderSchedule {
    interval: Duration,
    last_bucket: u128,
}

impl ReminderSchedule {
    /// A zero interval disables reminders
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_bucket: 0,
        }
    }

    fn bucket(&self, elapsed: Duration) -> u128 {
        if self.interval.is_zero() {
            return 0;
        }
        elapsed.as_millis() / self.interval.as_millis().max(1)
    }

    /// Returns the bucket index when a reminder is due at `elapsed`
    pub fn advance(&mut self, elapsed: Duration) -> Option<u128> {
        let bucket = self.bucket(elapsed);
        if bucket > self.last_bucket {
            self.last_bucket = bucket;
            Some(bucket)
        } else {
            None
        }
    }

    /// Time until the next bucket starts
    pub fn until_next(&self, elapsed: Duration) -> Option<Duration> {
        if self.interval.is_zero() {
            return None;
        }
        let next_bucket = self.bucket(elapsed) + 1;
        let boundary = Duration::from_millis((self.interval.as_millis() * next_bucket) as u64);
        Some(boundary.saturating_sub(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_reminder_per_bucket() {
        let mut schedule = ReminderSchedule::new(Duration::from_secs(120));

        assert_eq!(schedule.advance(Duration::from_secs(0)), None);
        assert_eq!(schedule.advance(Duration::from_secs(119)), None);
        assert_eq!(schedule.advance(Duration::from_secs(120)), Some(1));
        assert_eq!(schedule.advance(Duration::from_secs(121)), None);
        assert_eq!(schedule.advance(Duration::from_secs(239)), None);
        assert_eq!(schedule.advance(Duration::from_secs(240)), Some(2));
    }

    #[test]
    fn test_irregular_polling_skips_buckets_without_bursts() {
        let mut schedule = ReminderSchedule::new(Duration::from_secs(120));
        // A stalled poll jumps from bucket 0 straight to bucket 3
        assert_eq!(schedule.advance(Duration::from_secs(400)), Some(3));
        assert_eq!(schedule.advance(Duration::from_secs(401)), None);
        assert_eq!(schedule.advance(Duration::from_secs(480)), Some(4));
    }

    #[test]
    fn test_reminders_over_ten_minutes() {
        let mut schedule = ReminderSchedule::new(Duration::from_secs(120));
        let sent = (0..600)
            .step_by(7)
            .filter(|secs| schedule.advance(Duration::from_secs(*secs)).is_some())
            .count();
        assert_eq!(sent, 4);
    }

    #[test]
    fn test_until_next() {
        let schedule = ReminderSchedule::new(Duration::from_secs(120));
        assert_eq!(schedule.until_next(Duration::from_secs(100)), Some(Duration::from_secs(20)));
        assert_eq!(schedule.until_next(Duration::from_secs(120)), Some(Duration::from_secs(120)));
        assert_eq!(ReminderSchedule::new(Duration::ZERO).until_next(Duration::from_secs(5)), None);
    }

    #[test]
    fn test_zero_interval_never_reminds() {
        let mut schedule = ReminderSchedule::new(Duration::ZERO);
        assert_eq!(schedule.advance(Duration::from_secs(10_000)), None);
    }
}
