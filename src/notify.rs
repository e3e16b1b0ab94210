//! Best-effort side effects after a successful verification: the log-channel
//! announcement, the DM, and retraction of the invitation message.
//!
//! Everything here runs detached from the callback request. The role
//! transition has already happened when these fire, so a delivery failure is
//! logged and swallowed, never surfaced to the browser.

use poise::serenity_prelude::{self as serenity, CreateMessage, EditMessage, Http};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GateConfig;
use crate::embeds;
use crate::verification::SharedInvitations;

/// How long the edited invitation stays visible before deletion.
const RETRACT_DELAY: Duration = Duration::from_secs(10);

pub fn spawn_post_verification(
    http: Arc<Http>,
    config: Arc<GateConfig>,
    invitations: SharedInvitations,
    member: serenity::Member,
    guild_name: String,
) {
    tokio::spawn(async move {
        announce(&http, &config, &member).await;
        send_dm(&http, &member, &guild_name).await;
        retract_invitation(&http, &invitations, &member).await;
    });
}

/// Side effects after an operator verifies a member directly. Same shape as
/// the OAuth path, except the invitation message is deleted outright instead
/// of showing the edited notice first.
pub fn spawn_post_manual_verification(
    http: Arc<Http>,
    config: Arc<GateConfig>,
    invitations: SharedInvitations,
    member: serenity::Member,
    actor: serenity::User,
) {
    tokio::spawn(async move {
        if let Some(channel) = config.log_channel_id {
            if let Err(e) = channel
                .send_message(
                    &http,
                    CreateMessage::new().embed(embeds::manual_verified_log_embed(&member, &actor)),
                )
                .await
            {
                warn!(
                    "Could not post manual verification log for {}: {}",
                    member.user.id, e
                );
            }
        }

        let guild_name = member
            .guild_id
            .to_partial_guild(&http)
            .await
            .map(|g| g.name)
            .unwrap_or_else(|_| "the server".to_string());
        send_dm(&http, &member, &guild_name).await;

        remove_invitation(&http, &invitations, member.user.id).await;
    });
}

async fn announce(http: &Http, config: &GateConfig, member: &serenity::Member) {
    let Some(channel) = config.log_channel_id else {
        return;
    };
    if let Err(e) = channel
        .send_message(http, CreateMessage::new().embed(embeds::verified_log_embed(member)))
        .await
    {
        warn!("Could not post verification log for {}: {}", member.user.id, e);
    }
}

async fn send_dm(http: &Http, member: &serenity::Member, guild_name: &str) {
    let dm = match member.user.create_dm_channel(http).await {
        Ok(dm) => dm,
        Err(e) => {
            warn!("Could not open DM channel for {}: {}", member.user.id, e);
            return;
        }
    };
    if let Err(e) = dm
        .send_message(http, CreateMessage::new().embed(embeds::verified_dm_embed(guild_name)))
        .await
    {
        warn!("Could not DM {}: {}", member.user.id, e);
    }
}

/// Edit the invitation to a "verified" notice, then delete it after a short
/// delay. Losing the record (or the message) only leaves a stale invitation.
async fn retract_invitation(http: &Http, invitations: &SharedInvitations, member: &serenity::Member) {
    let Some((_, record)) = invitations.remove(&member.user.id) else {
        return;
    };

    if let Err(e) = record
        .channel_id
        .edit_message(
            http,
            record.message_id,
            EditMessage::new()
                .content(format!("<@{}> verified!", member.user.id))
                .embed(embeds::invitation_done_embed(member))
                .components(vec![]),
        )
        .await
    {
        warn!(
            "Could not update invitation message for {}: {}",
            member.user.id, e
        );
        return;
    }

    tokio::time::sleep(RETRACT_DELAY).await;
    match record
        .channel_id
        .delete_message(http, record.message_id)
        .await
    {
        Ok(()) => info!("Removed invitation message for {}", member.user.id),
        Err(e) => warn!(
            "Could not delete invitation message for {}: {}",
            member.user.id, e
        ),
    }
}

/// Delete the subject's invitation message without the interim notice.
async fn remove_invitation(
    http: &Http,
    invitations: &SharedInvitations,
    user_id: serenity::UserId,
) {
    let Some((_, record)) = invitations.remove(&user_id) else {
        return;
    };
    match record
        .channel_id
        .delete_message(http, record.message_id)
        .await
    {
        Ok(()) => info!("Removed invitation message for {}", user_id),
        Err(e) => warn!(
            "Could not delete invitation message for {}: {}",
            user_id, e
        ),
    }
}
