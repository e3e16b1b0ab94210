// src/verification/types.rs
use poise::serenity_prelude as serenity;

/// One user's in-progress identity check, keyed by its token in the registry.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    /// Opaque unguessable token; doubles as the OAuth `state` parameter.
    pub token: String,
    /// Member this attempt was issued to.
    pub subject_user_id: serenity::UserId,
    /// Guild the attempt belongs to.
    pub guild_id: serenity::GuildId,
    /// Unix seconds; drives expiry.
    pub created_at: u64,
    /// Display-only code shown next to the link. Not checked on completion.
    pub one_time_code: String,
}

/// Where the invitation message for a member was posted, so it can be
/// updated and removed once they verify. Pure bookkeeping; losing an entry
/// only means the stale invitation stays behind.
#[derive(Debug, Clone)]
pub struct InvitationRecord {
    pub message_id: serenity::MessageId,
    pub channel_id: serenity::ChannelId,
    pub posted_at: u64,
}

/// Invitation bookkeeping map, keyed by the invited member.
pub type SharedInvitations = std::sync::Arc<dashmap::DashMap<serenity::UserId, InvitationRecord>>;

pub fn create_shared_invitations() -> SharedInvitations {
    std::sync::Arc::new(dashmap::DashMap::new())
}

pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
