//! Role transition engine: pure set arithmetic over role IDs plus an apply
//! step against the Discord API.

use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, Http, RoleId};
use std::collections::HashSet;
use tracing::{error, info};

use crate::config::GateConfig;

/// Which roles change when a membership outcome is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    pub remove_on_verify: Vec<RoleId>,
    pub add_on_verify: Vec<RoleId>,
    pub elevated_role: Option<RoleId>,
}

impl RolePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            remove_on_verify: vec![config.unverified_role_id],
            add_on_verify: config.verified_role_ids.clone(),
            elevated_role: config.elevated_role_id,
        }
    }
}

/// Computed role delta. Never persisted; recomputed per application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTransition {
    pub to_add: Vec<RoleId>,
    pub to_remove: Vec<RoleId>,
}

impl RoleTransition {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// One role mutation the provider rejected. The remaining roles in the
/// transition are still attempted; the member already crossed the identity
/// gate, so a partial failure must not undo the rest.
#[derive(Debug)]
pub struct RoleMutationFailure {
    pub role: RoleId,
    pub cause: serenity::Error,
}

impl std::fmt::Display for RoleMutationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "role {} could not be mutated: {}", self.role, self.cause)
    }
}

/// Decides whether a member gets the optional elevated role. Supplied as a
/// collaborator; the engine itself is plain set arithmetic.
#[async_trait]
pub trait ElevationPolicy: Send + Sync {
    async fn is_eligible(&self, member: &serenity::Member) -> bool;
}

/// Nobody is elevated.
pub struct NoElevation;

#[async_trait]
impl ElevationPolicy for NoElevation {
    async fn is_eligible(&self, _member: &serenity::Member) -> bool {
        false
    }
}

/// Server boosters get the elevated role.
pub struct BoosterElevation;

#[async_trait]
impl ElevationPolicy for BoosterElevation {
    async fn is_eligible(&self, member: &serenity::Member) -> bool {
        member.premium_since.is_some()
    }
}

/// Pure transition computation. Adding a role the member already has or
/// removing one they lack would be a wasted API call, so both are filtered
/// out here; applying the result to the resulting role set yields an empty
/// transition.
pub fn compute_transition(
    current_roles: &HashSet<RoleId>,
    policy: &RolePolicy,
    elevated: bool,
) -> RoleTransition {
    let to_remove = policy
        .remove_on_verify
        .iter()
        .filter(|role| current_roles.contains(role))
        .copied()
        .collect();

    let mut wanted: Vec<RoleId> = policy.add_on_verify.clone();
    if elevated {
        if let Some(role) = policy.elevated_role {
            wanted.push(role);
        }
    }
    let to_add = wanted
        .into_iter()
        .filter(|role| !current_roles.contains(role))
        .collect();

    RoleTransition { to_add, to_remove }
}

/// Apply a transition to a member. Each role is mutated independently and a
/// failure on one does not abort the others; failures come back to the
/// caller for prominent logging and manual remediation.
pub async fn apply_transition(
    http: &Http,
    member: &serenity::Member,
    transition: &RoleTransition,
) -> Vec<RoleMutationFailure> {
    let mut failures = Vec::new();

    for role in &transition.to_remove {
        match member.remove_role(http, *role).await {
            Ok(()) => info!("Removed role {} from user {}", role, member.user.id),
            Err(cause) => {
                error!(
                    "Failed to remove role {} from user {}: {}",
                    role, member.user.id, cause
                );
                failures.push(RoleMutationFailure { role: *role, cause });
            }
        }
    }

    for role in &transition.to_add {
        match member.add_role(http, *role).await {
            Ok(()) => info!("Added role {} to user {}", role, member.user.id),
            Err(cause) => {
                error!(
                    "Failed to add role {} to user {}: {}",
                    role, member.user.id, cause
                );
                failures.push(RoleMutationFailure { role: *role, cause });
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RolePolicy {
        RolePolicy {
            remove_on_verify: vec![RoleId::new(10)],
            add_on_verify: vec![RoleId::new(20), RoleId::new(21)],
            elevated_role: Some(RoleId::new(30)),
        }
    }

    fn roles(ids: &[u64]) -> HashSet<RoleId> {
        ids.iter().map(|id| RoleId::new(*id)).collect()
    }

    #[test]
    fn fresh_member_gets_the_full_swap() {
        let transition = compute_transition(&roles(&[10]), &policy(), false);
        assert_eq!(transition.to_remove, vec![RoleId::new(10)]);
        assert_eq!(transition.to_add, vec![RoleId::new(20), RoleId::new(21)]);
    }

    #[test]
    fn elevated_member_also_gains_the_elevated_role() {
        let transition = compute_transition(&roles(&[10]), &policy(), true);
        assert!(transition.to_add.contains(&RoleId::new(30)));
    }

    #[test]
    fn tolerates_partial_prior_state() {
        // Operator already removed the unverified role and handed out one of
        // the verified roles manually.
        let transition = compute_transition(&roles(&[20]), &policy(), false);
        assert!(transition.to_remove.is_empty());
        assert_eq!(transition.to_add, vec![RoleId::new(21)]);
    }

    #[test]
    fn transition_is_idempotent() {
        let mut current = roles(&[10]);
        let first = compute_transition(&current, &policy(), true);

        for role in &first.to_remove {
            current.remove(role);
        }
        for role in &first.to_add {
            current.insert(*role);
        }

        let second = compute_transition(&current, &policy(), true);
        assert!(second.is_empty());
    }

    #[test]
    fn no_elevated_role_configured_means_none_added() {
        let policy = RolePolicy {
            elevated_role: None,
            ..policy()
        };
        let transition = compute_transition(&roles(&[]), &policy, true);
        assert_eq!(transition.to_add, vec![RoleId::new(20), RoleId::new(21)]);
    }
}
