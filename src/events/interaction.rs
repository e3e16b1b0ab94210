use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use tracing::{error, info, warn};

use crate::embeds;
use crate::error::GateError;
use crate::{Data, Error};

/// Dispatch component interactions from invitation messages.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> Result<(), Error> {
    let serenity::Interaction::Component(component) = interaction else {
        return Ok(());
    };

    let custom_id = component.data.custom_id.as_str();
    if let Some(subject) = custom_id.strip_prefix("verify_start_") {
        handle_verify_start(ctx, component, data, subject).await
    } else if custom_id.starts_with("help_") {
        respond_ephemeral(
            ctx,
            component,
            CreateInteractionResponseMessage::new().embed(embeds::help_embed()),
        )
        .await
    } else {
        Ok(())
    }
}

/// The start button: authorize the actor, register an attempt, and hand back
/// the authorization link.
async fn handle_verify_start(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
    subject: &str,
) -> Result<(), Error> {
    let actor = component.user.id;

    // Only the member the invitation was issued to may start the attempt.
    // Anyone else is turned away before the limiter or registry is touched.
    let authorized = subject
        .parse::<u64>()
        .map(serenity::UserId::new)
        .map(|target| target == actor)
        .unwrap_or(false);
    if !authorized {
        warn!(
            "User {} tried to activate a verification issued to {}",
            actor, subject
        );
        return respond_ephemeral(
            ctx,
            component,
            CreateInteractionResponseMessage::new()
                .content("This verification is only for the member it was issued to!"),
        )
        .await;
    }

    let attempt = match data.registry.create(actor, data.config.guild_id) {
        Ok(attempt) => attempt,
        Err(GateError::AttemptLimitExceeded { count, max, .. }) => {
            info!("User {} hit the attempt limit ({}/{})", actor, count, max);
            return respond_ephemeral(
                ctx,
                component,
                CreateInteractionResponseMessage::new().content(
                    "You have made too many verification attempts. Please contact an administrator.",
                ),
            )
            .await;
        }
        Err(e) => {
            error!("Failed to create verification attempt for {}: {}", actor, e);
            return respond_ephemeral(
                ctx,
                component,
                CreateInteractionResponseMessage::new()
                    .content("Something went wrong. Please try again."),
            )
            .await;
        }
    };

    let auth_url = data.config.authorize_url(&attempt.token);
    let timeout_mins = data.config.verification_timeout_secs / 60;
    info!("Issued verification link to {}", component.user.name);

    respond_ephemeral(
        ctx,
        component,
        CreateInteractionResponseMessage::new()
            .embed(embeds::authorize_embed(timeout_mins, &attempt.one_time_code))
            .components(vec![embeds::authorize_buttons(&auth_url)]),
    )
    .await
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<(), Error> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(message.ephemeral(true)),
        )
        .await?;
    Ok(())
}
