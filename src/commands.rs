use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use tracing::{error, info};

use crate::embeds;
use crate::error::GateError;
use crate::notify;
use crate::roles::{self, RolePolicy};
use crate::{Context, Error};

/// Check if the bot is responsive
#[poise::command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Start the verification process
///
/// Second entry point to the same flow the invitation button drives; useful
/// when the invitation message is no longer around.
#[poise::command(slash_command, guild_only)]
pub async fn verify(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let user_id = ctx.author().id;

    let attempt = match data.registry.create(user_id, data.config.guild_id) {
        Ok(attempt) => attempt,
        Err(GateError::AttemptLimitExceeded { count, max, .. }) => {
            info!("User {} hit the attempt limit ({}/{})", user_id, count, max);
            ctx.send(
                poise::CreateReply::default()
                    .content(
                        "You have made too many verification attempts. \
                         Please contact an administrator.",
                    )
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let auth_url = data.config.authorize_url(&attempt.token);
    let timeout_mins = data.config.verification_timeout_secs / 60;

    ctx.send(
        poise::CreateReply::default()
            .embed(embeds::authorize_embed(timeout_mins, &attempt.one_time_code))
            .components(vec![embeds::authorize_buttons(&auth_url)])
            .ephemeral(true),
    )
    .await?;

    info!("Issued verification link to {} via /verify", ctx.author().name);
    Ok(())
}

/// Verify a member directly, bypassing OAuth
///
/// Applies the same role transition the callback would, voids any pending
/// attempt, and clears the member's attempt counter. This is also the escape
/// hatch for users locked out by the attempt limit.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
)]
pub async fn verify_member(
    ctx: Context<'_>,
    #[description = "Member to verify"] user: serenity::User,
) -> Result<(), Error> {
    let data = ctx.data();

    let member = match data.config.guild_id.member(ctx.http(), user.id).await {
        Ok(member) => member,
        Err(_) => {
            ctx.send(
                poise::CreateReply::default()
                    .content("That user is not a member of this server.")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    // An in-flight OAuth attempt is void once an operator steps in, and the
    // counter reset lets the user start over should the roles get reverted.
    data.registry.cancel_for_subject(user.id);
    data.limiter.reset(user.id);

    let policy = RolePolicy::from_config(&data.config);
    let current: HashSet<_> = member.roles.iter().copied().collect();
    let transition = roles::compute_transition(&current, &policy, false);
    let failures = roles::apply_transition(ctx.http(), &member, &transition).await;
    for failure in &failures {
        error!(
            "Partial manual role transition for user {}: {}",
            user.id, failure
        );
    }

    notify::spawn_post_manual_verification(
        ctx.serenity_context().http.clone(),
        data.config.clone(),
        data.invitations.clone(),
        member,
        ctx.author().clone(),
    );

    let reply = if failures.is_empty() {
        format!("<@{}> has been verified.", user.id)
    } else {
        format!(
            "<@{}> was verified, but {} role change(s) failed. Check the logs.",
            user.id,
            failures.len()
        )
    };
    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;

    info!("User {} manually verified by {}", user.id, ctx.author().id);
    Ok(())
}
