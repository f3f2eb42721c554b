//! Periodic registration with the discovery service.
//!
//! Registration is an idempotent refresh: the host re-registers every
//! `interval` for as long as it hosts an online session. There is no
//! retry path of its own; a lost registration is simply repeated on the
//! next due attempt.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RegistrationHeartbeat {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl RegistrationHeartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records `now` as the latest attempt when a
    /// registration is due. The first poll is always due.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            tracing::trace!(interval = ?self.interval, "registration due");
            self.last_attempt = Some(now);
        }
        due
    }

    /// Whether any registration has been attempted.
    pub fn attempted(&self) -> bool {
        self.last_attempt.is_some()
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_first_call_is_due() {
        let mut hb = RegistrationHeartbeat::new(Duration::from_secs(60));
        assert!(!hb.attempted());
        assert!(hb.poll(Instant::now()));
        assert!(hb.attempted());
    }

    #[test]
    fn test_poll_respects_interval() {
        let mut hb = RegistrationHeartbeat::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(hb.poll(t0));
        assert!(!hb.poll(t0 + Duration::from_millis(9_999)));
        assert!(hb.poll(t0 + Duration::from_secs(10)));
        assert_eq!(hb.last_attempt(), Some(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_poll_not_due_does_not_move_last_attempt() {
        let mut hb = RegistrationHeartbeat::new(Duration::from_secs(10));
        let t0 = Instant::now();
        hb.poll(t0);
        hb.poll(t0 + Duration::from_secs(3));
        assert_eq!(hb.last_attempt(), Some(t0));
    }
}
