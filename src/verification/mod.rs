//! Verification attempt lifecycle: the token-keyed registry and the
//! per-user attempt limiter.

pub mod limiter;
pub mod registry;
pub mod types;

pub use limiter::{create_shared_limiter, AttemptLimiter, SharedLimiter};
pub use registry::{create_shared_registry, SharedRegistry, VerificationRegistry};
pub use types::{
    create_shared_invitations, current_timestamp, InvitationRecord, SharedInvitations,
    VerificationAttempt,
};
