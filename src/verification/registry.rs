use dashmap::DashMap;
use poise::serenity_prelude::{GuildId, UserId};
use rand::RngCore;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

use super::limiter::SharedLimiter;
use super::types::{current_timestamp, VerificationAttempt};
use crate::error::{GateError, Result};

/// Authoritative store of in-flight verification attempts, keyed by token.
///
/// Attempts live here from button activation until the OAuth callback
/// consumes them (or until they expire and a lookup or the sweep removes
/// them). Nothing outside this type mutates an attempt.
pub struct VerificationRegistry {
    attempts: DashMap<String, VerificationAttempt>,
    /// Secondary index so a new attempt supersedes the subject's previous
    /// one. Keeps at most one live token per user honorable at a time.
    by_subject: DashMap<UserId, String>,
    limiter: SharedLimiter,
    timeout_secs: u64,
}

impl VerificationRegistry {
    pub fn new(limiter: SharedLimiter, timeout_secs: u64) -> Self {
        Self {
            attempts: DashMap::new(),
            by_subject: DashMap::new(),
            limiter,
            timeout_secs,
        }
    }

    /// Register a new attempt for a user. Consumes one limiter slot; fails
    /// with `AttemptLimitExceeded` without side effects once the user is at
    /// the limit. Any previous attempt for the same user is cancelled.
    pub fn create(&self, subject: UserId, guild_id: GuildId) -> Result<VerificationAttempt> {
        let (count, allowed) = self.limiter.try_increment(subject);
        if !allowed {
            return Err(GateError::AttemptLimitExceeded {
                user_id: subject.get(),
                count,
                max: self.limiter.max_attempts(),
            });
        }

        let attempt = VerificationAttempt {
            token: generate_token(),
            subject_user_id: subject,
            guild_id,
            created_at: current_timestamp(),
            one_time_code: generate_display_code(),
        };

        // The attempt must be in the token map before the subject index is
        // updated: concurrent creates then always leave the index pointing at
        // a token whose loser has already been inserted, so the superseded
        // remove below cannot miss it.
        self.attempts.insert(attempt.token.clone(), attempt.clone());
        if let Some(previous) = self.by_subject.insert(subject, attempt.token.clone()) {
            if previous != attempt.token {
                debug!("Superseding previous attempt for user {}", subject);
                self.cancel(&previous);
            }
        }

        info!(
            "Created verification attempt for user {} (attempt {}/{})",
            subject,
            count,
            self.limiter.max_attempts()
        );
        Ok(attempt)
    }

    /// Atomically look up and delete the attempt for `token`.
    ///
    /// A token resolves at most once: the second of two racing consumes gets
    /// `AttemptNotFound`. An expired entry is deleted before `AttemptExpired`
    /// is returned (lazy cleanup).
    pub fn consume(&self, token: &str) -> Result<VerificationAttempt> {
        self.consume_at(token, current_timestamp())
    }

    fn consume_at(&self, token: &str, now: u64) -> Result<VerificationAttempt> {
        let (_, attempt) = self
            .attempts
            .remove(token)
            .ok_or(GateError::AttemptNotFound)?;
        self.by_subject
            .remove_if(&attempt.subject_user_id, |_, t| t == token);

        if now.saturating_sub(attempt.created_at) > self.timeout_secs {
            debug!(
                "Attempt for user {} expired before consumption",
                attempt.subject_user_id
            );
            return Err(GateError::AttemptExpired);
        }
        Ok(attempt)
    }

    /// Cancel the subject's pending attempt, if any. Used when an operator
    /// verifies a member directly and any in-flight token must stop being
    /// honorable. Returns whether an attempt existed.
    pub fn cancel_for_subject(&self, subject: UserId) -> bool {
        let Some((_, token)) = self.by_subject.remove(&subject) else {
            return false;
        };
        let removed = self.attempts.remove(&token).is_some();
        if removed {
            debug!("Cancelled pending attempt for user {}", subject);
        }
        removed
    }

    /// Delete an attempt if present. Idempotent.
    pub fn cancel(&self, token: &str) {
        if let Some((_, attempt)) = self.attempts.remove(token) {
            self.by_subject
                .remove_if(&attempt.subject_user_id, |_, t| t == token);
            debug!(
                "Cancelled verification attempt for user {}",
                attempt.subject_user_id
            );
        }
    }

    /// Drop expired attempts. Lazy expiry on consume already keeps the
    /// guarantees; this only bounds memory growth from abandoned attempts.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_at(current_timestamp())
    }

    fn sweep_at(&self, now: u64) -> usize {
        let expired: Vec<(String, UserId)> = self
            .attempts
            .iter()
            .filter(|entry| now.saturating_sub(entry.created_at) > self.timeout_secs)
            .map(|entry| (entry.key().clone(), entry.subject_user_id))
            .collect();

        let mut removed = 0;
        for (token, subject) in expired {
            if self.attempts.remove(&token).is_some() {
                self.by_subject.remove_if(&subject, |_, t| *t == token);
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Swept {} expired verification attempts", removed);
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.attempts.len()
    }
}

/// 128-bit token from the OS-seeded CSPRNG, hex encoded. Collisions are
/// negligible and the value is the sole capability binding the browser
/// session back to the attempt.
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Short uppercase code shown to the user alongside the link so they can
/// recognize their own attempt. Display only, never checked.
fn generate_display_code() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(8), |mut s, b| {
        let _ = write!(s, "{b:02X}");
        s
    })
}

/// Shared registry type
pub type SharedRegistry = Arc<VerificationRegistry>;

pub fn create_shared_registry(limiter: SharedLimiter, timeout_secs: u64) -> SharedRegistry {
    Arc::new(VerificationRegistry::new(limiter, timeout_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::limiter::AttemptLimiter;

    fn registry(max_attempts: u32, timeout_secs: u64) -> VerificationRegistry {
        VerificationRegistry::new(Arc::new(AttemptLimiter::new(max_attempts)), timeout_secs)
    }

    fn guild() -> GuildId {
        GuildId::new(99)
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let registry = registry(10, 600);
        let a = registry.create(UserId::new(1), guild()).unwrap();
        let b = registry.create(UserId::new(2), guild()).unwrap();

        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 32);
        assert!(a.token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn consume_resolves_at_most_once() {
        let registry = registry(3, 600);
        let attempt = registry.create(UserId::new(1), guild()).unwrap();

        let consumed = registry.consume(&attempt.token).unwrap();
        assert_eq!(consumed.subject_user_id, UserId::new(1));
        assert_eq!(consumed.guild_id, guild());

        assert!(matches!(
            registry.consume(&attempt.token),
            Err(GateError::AttemptNotFound)
        ));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let registry = registry(3, 600);
        assert!(matches!(
            registry.consume("no-such-token"),
            Err(GateError::AttemptNotFound)
        ));
    }

    #[test]
    fn expired_attempt_is_deleted_lazily() {
        let registry = registry(3, 600);
        let attempt = registry.create(UserId::new(1), guild()).unwrap();

        // One second past the window
        assert!(matches!(
            registry.consume_at(&attempt.token, attempt.created_at + 601),
            Err(GateError::AttemptExpired)
        ));
        // The expired lookup removed the record
        assert!(matches!(
            registry.consume(&attempt.token),
            Err(GateError::AttemptNotFound)
        ));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn consume_inside_the_window_succeeds() {
        let registry = registry(3, 600);
        let attempt = registry.create(UserId::new(1), guild()).unwrap();
        assert!(registry
            .consume_at(&attempt.token, attempt.created_at + 600)
            .is_ok());
    }

    #[test]
    fn create_fails_once_limit_reached_and_reset_reopens() {
        let limiter = Arc::new(AttemptLimiter::new(3));
        let registry = VerificationRegistry::new(limiter.clone(), 600);
        let user = UserId::new(1);

        let mut last = None;
        for _ in 0..3 {
            last = Some(registry.create(user, guild()).unwrap());
        }
        assert!(matches!(
            registry.create(user, guild()),
            Err(GateError::AttemptLimitExceeded { count: 3, max: 3, .. })
        ));

        // Successful completion consumes the attempt and resets the counter,
        // after which a fresh create succeeds.
        registry.consume(&last.unwrap().token).unwrap();
        limiter.reset(user);
        assert!(registry.create(user, guild()).is_ok());
    }

    #[test]
    fn new_attempt_supersedes_the_previous_one() {
        let registry = registry(5, 600);
        let user = UserId::new(1);

        let first = registry.create(user, guild()).unwrap();
        let second = registry.create(user, guild()).unwrap();

        assert!(matches!(
            registry.consume(&first.token),
            Err(GateError::AttemptNotFound)
        ));
        assert!(registry.consume(&second.token).is_ok());
    }

    #[test]
    fn operator_override_cancels_pending_attempt() {
        let limiter = Arc::new(AttemptLimiter::new(3));
        let registry = VerificationRegistry::new(limiter.clone(), 600);
        let user = UserId::new(1);

        for _ in 0..3 {
            registry.create(user, guild()).unwrap();
        }
        let last = registry.create(user, guild());
        assert!(last.is_err());

        // Manual verification voids the outstanding token and, together with
        // a limiter reset, reopens the flow for the user.
        assert!(registry.cancel_for_subject(user));
        assert!(!registry.cancel_for_subject(user));
        assert_eq!(registry.pending_count(), 0);

        limiter.reset(user);
        assert!(registry.create(user, guild()).is_ok());
    }

    #[test]
    fn cancel_is_idempotent() {
        let registry = registry(3, 600);
        let attempt = registry.create(UserId::new(1), guild()).unwrap();

        registry.cancel(&attempt.token);
        registry.cancel(&attempt.token);
        registry.cancel("never-existed");

        assert!(matches!(
            registry.consume(&attempt.token),
            Err(GateError::AttemptNotFound)
        ));
    }

    #[test]
    fn concurrent_double_consume_yields_one_winner() {
        let registry = Arc::new(registry(3, 600));
        let attempt = registry.create(UserId::new(1), guild()).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = registry.clone();
                let token = attempt.token.clone();
                std::thread::spawn(move || registry.consume(&token).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn sweep_removes_only_expired_attempts() {
        let registry = registry(10, 600);
        let attempt = registry.create(UserId::new(1), guild()).unwrap();

        // Still inside the window: nothing to sweep
        assert_eq!(registry.sweep_at(attempt.created_at + 600), 0);
        assert_eq!(registry.pending_count(), 1);

        assert_eq!(registry.sweep_at(attempt.created_at + 601), 1);
        assert_eq!(registry.pending_count(), 0);
        assert!(matches!(
            registry.consume_at(&attempt.token, attempt.created_at + 1),
            Err(GateError::AttemptNotFound)
        ));
    }
}
