use poise::serenity_prelude::{self as serenity, CreateMessage};
use tracing::{error, info, warn};

use crate::embeds;
use crate::verification::{current_timestamp, InvitationRecord};
use crate::{Data, Error};

/// Handle when a new member joins the guild: hand out the unverified role
/// and post the invitation that starts the verification flow.
pub async fn handle_member_add(
    ctx: &serenity::Context,
    new_member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let config = &data.config;
    if new_member.guild_id != config.guild_id {
        return Ok(());
    }

    let user_id = new_member.user.id;
    info!("New member joined: {} ({})", new_member.user.name, user_id);

    // Missing permission here must not keep the invitation from going out;
    // the role swap on completion tolerates the partial state.
    if let Err(e) = new_member.add_role(&ctx.http, config.unverified_role_id).await {
        error!(
            "Failed to assign unverified role to {}: {}. Bot requires 'Manage Roles' and a higher role than the one being assigned.",
            user_id, e
        );
    }

    let guild_name = new_member
        .guild_id
        .to_partial_guild(&ctx.http)
        .await
        .map(|g| g.name)
        .unwrap_or_else(|_| "the server".to_string());
    let timeout_mins = config.verification_timeout_secs / 60;

    let message = config
        .verify_channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .content(format!("||<@{}>||", user_id))
                .embed(embeds::invitation_embed(new_member, &guild_name, timeout_mins))
                .components(vec![embeds::invitation_buttons(user_id)]),
        )
        .await?;

    data.invitations.insert(
        user_id,
        InvitationRecord {
            message_id: message.id,
            channel_id: config.verify_channel_id,
            posted_at: current_timestamp(),
        },
    );

    if let Some(log_channel) = config.log_channel_id {
        if let Err(e) = log_channel
            .send_message(
                &ctx.http,
                CreateMessage::new().embed(embeds::member_joined_embed(new_member)),
            )
            .await
        {
            warn!("Could not post join log for {}: {}", user_id, e);
        }
    }

    info!("Posted verification invitation for {}", new_member.user.name);
    Ok(())
}
