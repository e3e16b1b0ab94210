//! Discord embed and button builders. Presentation only; nothing in here
//! carries verification state.

use poise::serenity_prelude::{
    self as serenity, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
};

const BLURPLE: u32 = 0x5865F2;
const GREEN: u32 = 0x2ecc71;
const BLUE: u32 = 0x3498db;
const PURPLE: u32 = 0x9b59b6;
const YELLOW: u32 = 0xf1c40f;
const RED: u32 = 0xe74c3c;

/// Welcome embed posted in the verify channel when a member joins.
pub fn invitation_embed(member: &serenity::Member, guild_name: &str, timeout_mins: u64) -> CreateEmbed {
    CreateEmbed::new()
        .colour(BLURPLE)
        .title("Welcome to the server!")
        .description(format!(
            "**{}**, welcome to {}!\n\nTo continue, you need to verify your Discord account.",
            member.user.name, guild_name
        ))
        .field(
            "Verification steps",
            "1. Click **Start Verification**\n\
             2. Log in with your Discord account\n\
             3. You'll be verified automatically\n\
             4. Enjoy the server!",
            false,
        )
        .field("Time limit", format!("The link is valid for **{} minutes**.", timeout_mins), true)
        .field("Security", "Never share your verification link with anyone!", true)
        .thumbnail(member.user.face())
        .footer(CreateEmbedFooter::new(format!("{} • Verification", guild_name)))
        .timestamp(serenity::Timestamp::now())
}

/// Start/help buttons under the invitation. The subject's user id is baked
/// into the custom ids so activation can be authorized.
pub fn invitation_buttons(user_id: serenity::UserId) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(format!("verify_start_{}", user_id))
            .label("Start Verification")
            .style(serenity::ButtonStyle::Primary),
        CreateButton::new(format!("help_{}", user_id))
            .label("Help")
            .style(serenity::ButtonStyle::Secondary),
    ])
}

/// Ephemeral embed with the authorization link details.
pub fn authorize_embed(timeout_mins: u64, one_time_code: &str) -> CreateEmbed {
    CreateEmbed::new()
        .colour(PURPLE)
        .title("Discord Verification")
        .description(
            "Click the button below to start verification.\n\n\
             **Important:** do not share this link with anyone!",
        )
        .field("Validity", format!("{} minutes", timeout_mins), true)
        .field("Security code", format!("||{}||", one_time_code), true)
        .footer(CreateEmbedFooter::new(
            "You can close this window after clicking the link",
        ))
        .timestamp(serenity::Timestamp::now())
}

/// Link button row for the authorization URL.
pub fn authorize_buttons(auth_url: &str) -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new_link(auth_url).label("Verification Link")])
}

pub fn help_embed() -> CreateEmbed {
    CreateEmbed::new()
        .colour(YELLOW)
        .title("Help Center")
        .description("Frequently asked questions about verification:")
        .field(
            "The link doesn't work",
            "Try copying the link and opening it in your browser.",
            false,
        )
        .field(
            "My account wasn't verified",
            "Give it a minute or two after authorizing.",
            false,
        )
        .field(
            "Support",
            "If the problem persists, contact an administrator.",
            false,
        )
        .timestamp(serenity::Timestamp::now())
}

/// Log-channel embed for a join event.
pub fn member_joined_embed(member: &serenity::Member) -> CreateEmbed {
    CreateEmbed::new()
        .colour(BLUE)
        .title("New Member Joined")
        .description(format!("**{}** joined the server", member.user.name))
        .field("User", format!("<@{}>", member.user.id), true)
        .field("ID", format!("`{}`", member.user.id), true)
        .thumbnail(member.user.face())
        .footer(CreateEmbedFooter::new("Verification Log"))
        .timestamp(serenity::Timestamp::now())
}

/// Log-channel embed for a completed verification.
pub fn verified_log_embed(member: &serenity::Member) -> CreateEmbed {
    CreateEmbed::new()
        .colour(GREEN)
        .title("Verification Successful")
        .description(format!("**{}** verified via Discord OAuth2", member.user.name))
        .field("User", format!("<@{}>", member.user.id), true)
        .field("ID", format!("`{}`", member.user.id), true)
        .thumbnail(member.user.face())
        .footer(CreateEmbedFooter::new("Verification Log"))
        .timestamp(serenity::Timestamp::now())
}

/// Log-channel embed for an operator-applied verification.
pub fn manual_verified_log_embed(
    member: &serenity::Member,
    actor: &serenity::User,
) -> CreateEmbed {
    CreateEmbed::new()
        .colour(RED)
        .title("Manual Verification")
        .description(format!(
            "**{}** was verified by an administrator",
            member.user.name
        ))
        .field("User", format!("<@{}>", member.user.id), true)
        .field("By", format!("<@{}>", actor.id), true)
        .thumbnail(member.user.face())
        .footer(CreateEmbedFooter::new("Verification Log"))
        .timestamp(serenity::Timestamp::now())
}

/// DM sent to the member after verification.
pub fn verified_dm_embed(guild_name: &str) -> CreateEmbed {
    CreateEmbed::new()
        .colour(GREEN)
        .title("Verification Complete!")
        .description(format!("You have been verified on **{}**!", guild_name))
        .field("Status", "Your account was verified successfully", true)
        .field("Access", "You can now reach all channels", true)
        .footer(CreateEmbedFooter::new(format!("{} - welcome!", guild_name)))
        .timestamp(serenity::Timestamp::now())
}

/// Replaces the invitation embed once the member has verified. The message
/// itself is deleted shortly after.
pub fn invitation_done_embed(member: &serenity::Member) -> CreateEmbed {
    CreateEmbed::new()
        .colour(GREEN)
        .title("Verification Complete")
        .description(format!("<@{}> has been verified!", member.user.id))
        .footer(CreateEmbedFooter::new(
            "Verification • This message will be removed shortly",
        ))
        .timestamp(serenity::Timestamp::now())
}
