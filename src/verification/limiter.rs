use dashmap::DashMap;
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use tracing::debug;

/// Per-user count of verification-start actions.
///
/// Counts are process-local and not persisted; a restart clears them, which
/// is acceptable since the registry resets too. The dashmap entry guard
/// serializes increments per user, so a burst of simultaneous activations
/// cannot push a user past the limit.
pub struct AttemptLimiter {
    counts: DashMap<UserId, u32>,
    max_attempts: u32,
}

impl AttemptLimiter {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            counts: DashMap::new(),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Increment the user's count unless they are already at the limit.
    /// Returns the current count and whether the increment was allowed; a
    /// refused call does not mutate state.
    pub fn try_increment(&self, user_id: UserId) -> (u32, bool) {
        let mut count = self.counts.entry(user_id).or_insert(0);
        if *count >= self.max_attempts {
            return (*count, false);
        }
        *count += 1;
        (*count, true)
    }

    /// Current count without mutating.
    pub fn count(&self, user_id: UserId) -> u32 {
        self.counts.get(&user_id).map(|c| *c).unwrap_or(0)
    }

    /// Clear the counter. Called after a successful verification, or by an
    /// operator unblocking a user.
    pub fn reset(&self, user_id: UserId) {
        self.counts.remove(&user_id);
        debug!("Reset attempt counter for user {}", user_id);
    }
}

/// Shared limiter type
pub type SharedLimiter = Arc<AttemptLimiter>;

pub fn create_shared_limiter(max_attempts: u32) -> SharedLimiter {
    Arc::new(AttemptLimiter::new(max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_up_to_the_limit() {
        let limiter = AttemptLimiter::new(3);
        let user = UserId::new(42);

        assert_eq!(limiter.try_increment(user), (1, true));
        assert_eq!(limiter.try_increment(user), (2, true));
        assert_eq!(limiter.try_increment(user), (3, true));
        assert_eq!(limiter.try_increment(user), (3, false));
        // Refused call did not mutate
        assert_eq!(limiter.count(user), 3);
    }

    #[test]
    fn reset_reopens_the_limit() {
        let limiter = AttemptLimiter::new(2);
        let user = UserId::new(42);

        limiter.try_increment(user);
        limiter.try_increment(user);
        assert!(!limiter.try_increment(user).1);

        limiter.reset(user);
        assert_eq!(limiter.count(user), 0);
        assert_eq!(limiter.try_increment(user), (1, true));
    }

    #[test]
    fn users_are_counted_independently() {
        let limiter = AttemptLimiter::new(1);
        assert!(limiter.try_increment(UserId::new(1)).1);
        assert!(!limiter.try_increment(UserId::new(1)).1);
        assert!(limiter.try_increment(UserId::new(2)).1);
    }

    #[test]
    fn concurrent_bursts_never_exceed_the_limit() {
        let limiter = Arc::new(AttemptLimiter::new(3));
        let user = UserId::new(7);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.try_increment(user).1)
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, 3);
        assert_eq!(limiter.count(user), 3);
    }
}
