//! Runtime configuration loaded from environment variables.

use poise::serenity_prelude::{ChannelId, GuildId, RoleId};

use crate::error::{GateError, Result};

/// Everything the gate needs beyond the bot token itself.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Guild this gate operates on. Join events from other guilds are ignored.
    pub guild_id: GuildId,
    /// Channel where invitation messages are posted.
    pub verify_channel_id: ChannelId,
    /// Optional channel for join/verification log embeds.
    pub log_channel_id: Option<ChannelId>,

    /// Role assigned on join and removed on successful verification.
    pub unverified_role_id: RoleId,
    /// Roles granted on successful verification.
    pub verified_role_ids: Vec<RoleId>,
    /// Extra role for members the elevation policy deems eligible.
    pub elevated_role_id: Option<RoleId>,
    /// Treat server boosters as eligible for the elevated role.
    pub elevate_boosters: bool,

    /// OAuth application credentials.
    pub client_id: String,
    pub client_secret: String,
    /// Must exactly match a redirect registered with Discord.
    pub redirect_uri: String,

    /// Port the callback server listens on.
    pub port: u16,
    /// Validity window of a verification attempt, in seconds.
    pub verification_timeout_secs: u64,
    /// Attempts a user may start before an operator has to step in.
    pub max_attempts: u32,
    /// Interval for the optional expired-attempt sweep. None disables it;
    /// lazy expiry on lookup is sufficient for correctness either way.
    pub sweep_interval_secs: Option<u64>,
}

impl GateConfig {
    /// Load config from environment variables. All IDs are required except
    /// the log channel and the elevated role.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            guild_id: GuildId::new(required_u64("GUILD_ID")?),
            verify_channel_id: ChannelId::new(required_u64("VERIFY_CHANNEL_ID")?),
            log_channel_id: optional_u64("LOG_CHANNEL_ID")?.map(ChannelId::new),
            unverified_role_id: RoleId::new(required_u64("UNVERIFIED_ROLE_ID")?),
            verified_role_ids: required_role_list("VERIFIED_ROLE_IDS")?,
            elevated_role_id: optional_u64("ELEVATED_ROLE_ID")?.map(RoleId::new),
            elevate_boosters: std::env::var("ELEVATE_BOOSTERS")
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            client_id: required("DISCORD_CLIENT_ID")?,
            client_secret: required("DISCORD_CLIENT_SECRET")?,
            redirect_uri: required("REDIRECT_URI")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            verification_timeout_secs: std::env::var("VERIFICATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            max_attempts: std::env::var("MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            sweep_interval_secs: optional_u64("SWEEP_INTERVAL_SECS")?,
        })
    }

    /// Authorization URL the user's browser is sent to. The `state` query
    /// parameter IS the attempt token: its unguessability is the only binding
    /// between the browser session and the issuing attempt.
    pub fn authorize_url(&self, token: &str) -> String {
        format!(
            "https://discord.com/api/oauth2/authorize\
            ?client_id={}\
            &redirect_uri={}\
            &response_type=code\
            &scope=identify\
            &state={}\
            &prompt=none",
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(token),
        )
    }
}

fn required(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| GateError::MissingEnv { name })
}

fn required_u64(name: &'static str) -> Result<u64> {
    let value = required(name)?;
    value
        .parse()
        .map_err(|_| GateError::InvalidEnv { name, value })
}

fn optional_u64(name: &'static str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| GateError::InvalidEnv { name, value }),
        Err(_) => Ok(None),
    }
}

/// Comma-separated list of role IDs.
fn required_role_list(name: &'static str) -> Result<Vec<RoleId>> {
    let value = required(name)?;
    parse_role_list(name, &value)
}

fn parse_role_list(name: &'static str, value: &str) -> Result<Vec<RoleId>> {
    let roles: Vec<RoleId> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map(RoleId::new))
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| GateError::InvalidEnv {
            name,
            value: value.to_string(),
        })?;
    if roles.is_empty() {
        return Err(GateError::InvalidEnv {
            name,
            value: value.to_string(),
        });
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_embeds_token_as_state() {
        let config = GateConfig {
            guild_id: GuildId::new(1),
            verify_channel_id: ChannelId::new(2),
            log_channel_id: None,
            unverified_role_id: RoleId::new(3),
            verified_role_ids: vec![RoleId::new(4)],
            elevated_role_id: None,
            elevate_boosters: false,
            client_id: "12345".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://gate.example.com/callback".to_string(),
            port: 8080,
            verification_timeout_secs: 600,
            max_attempts: 3,
            sweep_interval_secs: None,
        };

        let url = config.authorize_url("deadbeefcafe");
        assert!(url.contains("state=deadbeefcafe"));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fgate.example.com%2Fcallback"));
        assert!(url.contains("scope=identify"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn role_list_parses_a_single_id() {
        assert_eq!(
            parse_role_list("ROLES", "123").unwrap(),
            vec![RoleId::new(123)]
        );
    }

    #[test]
    fn role_list_trims_whitespace_and_stray_commas() {
        assert_eq!(
            parse_role_list("ROLES", " 1, 2 ,,3,").unwrap(),
            vec![RoleId::new(1), RoleId::new(2), RoleId::new(3)]
        );
    }

    #[test]
    fn role_list_rejects_non_numeric_entries() {
        assert!(matches!(
            parse_role_list("ROLES", "1,lamer,3"),
            Err(GateError::InvalidEnv { name: "ROLES", .. })
        ));
    }

    #[test]
    fn role_list_rejects_an_effectively_empty_value() {
        assert!(matches!(
            parse_role_list("ROLES", ""),
            Err(GateError::InvalidEnv { .. })
        ));
        assert!(matches!(
            parse_role_list("ROLES", " , ,"),
            Err(GateError::InvalidEnv { .. })
        ));
    }
}
