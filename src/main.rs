use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Discord bot that gates community membership behind OAuth2 verification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,
}

mod commands;
mod config;
mod embeds;
mod error;
mod events;
mod notify;
mod roles;
mod verification;
mod web;

use commands::{ping, verify, verify_member};
use config::GateConfig;
use events::{handle_interaction, handle_member_add};
use roles::{BoosterElevation, ElevationPolicy, NoElevation, RolePolicy};
use verification::{
    create_shared_invitations, create_shared_limiter, create_shared_registry, SharedInvitations,
    SharedLimiter, SharedRegistry,
};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<GateConfig>,
    pub registry: SharedRegistry,
    pub limiter: SharedLimiter,
    pub invitations: SharedInvitations,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = handle_member_add(ctx, new_member, data).await {
                error!("Failed to handle new member: {}", e);
            }
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = handle_interaction(ctx, interaction, data).await {
                error!("Failed to handle interaction: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let token = std::env::var("DISCORD_TOKEN").expect("Missing DISCORD_TOKEN environment variable");
    let config = Arc::new(GateConfig::from_env()?);

    info!("Gate configured for guild {}", config.guild_id);
    info!(
        "Verification window {} s, max attempts {}",
        config.verification_timeout_secs, config.max_attempts
    );

    let limiter = create_shared_limiter(config.max_attempts);
    let registry = create_shared_registry(limiter.clone(), config.verification_timeout_secs);
    let invitations = create_shared_invitations();

    // Ceiling on memory from abandoned attempts; lookups already expire
    // entries lazily, so this is optional.
    if let Some(interval_secs) = config.sweep_interval_secs {
        let sweep_registry = registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                sweep_registry.sweep_expired();
            }
        });
        info!("Expired-attempt sweep running every {} s", interval_secs);
    }

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;

    let setup_config = config.clone();
    let setup_registry = registry.clone();
    let setup_limiter = limiter.clone();
    let setup_invitations = invitations.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![ping(), verify(), verify_member()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {})",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Error in command '{}': {}",
                                ctx.command().qualified_name,
                                error
                            );
                            let _ = ctx.say("An error occurred, please try again.").await;
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!(
                                "Command '{}' is guild-only, used in DM by {}",
                                ctx.command().qualified_name,
                                ctx.author().name
                            );
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let config = setup_config;
            let registry = setup_registry;
            let limiter = setup_limiter;
            let invitations = setup_invitations;

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                if guild_commands || sync_commands {
                    info!("Registering commands to guild: {}", config.guild_id);
                    if let Err(e) = poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        config.guild_id,
                    )
                    .await
                    {
                        error!(
                            "Failed to register commands for guild {}: {}",
                            config.guild_id, e
                        );
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) =
                        poise::builtins::register_globally(ctx, &framework.options().commands).await
                    {
                        error!("Failed to register commands globally: {}", e);
                    }
                }

                let elevation: Arc<dyn ElevationPolicy> = if config.elevate_boosters {
                    Arc::new(BoosterElevation)
                } else {
                    Arc::new(NoElevation)
                };

                let app_state = web::AppState {
                    config: config.clone(),
                    registry: registry.clone(),
                    limiter: limiter.clone(),
                    invitations: invitations.clone(),
                    oauth: web::OAuthClient::new(&config),
                    policy: RolePolicy::from_config(&config),
                    elevation,
                    serenity_http: ctx.http.clone(),
                };

                tokio::spawn(async move {
                    info!("Starting OAuth callback server...");
                    if let Err(e) = web::start_web_server(app_state).await {
                        error!("Web server error: {}", e);
                    }
                });

                Ok(Data {
                    config,
                    registry,
                    limiter,
                    invitations,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;
    info!("Requesting privileged intents: [\"GUILD_MEMBERS\"]");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the GUILD_MEMBERS privileged intent in the Discord Developer Portal:");
            error!("https://discord.com/developers/applications -> Your App -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable GUILD_MEMBERS in the Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
