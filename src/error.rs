use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    // Configuration errors
    #[error("Missing environment variable: {name}")]
    MissingEnv { name: &'static str },

    #[error("Invalid value for environment variable {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    // Callback validation errors
    #[error("Callback request is missing the code or state parameter")]
    InvalidRequest,

    // Registry errors
    #[error("No verification attempt exists for this token")]
    AttemptNotFound,

    #[error("Verification attempt has expired")]
    AttemptExpired,

    #[error("User {user_id} has reached the attempt limit ({count}/{max})")]
    AttemptLimitExceeded { user_id: u64, count: u32, max: u32 },

    // Identity errors
    #[error("Authorized account does not match the member this attempt was issued to")]
    SubjectMismatch,

    // Provider errors
    #[error("OAuth provider error: {message}")]
    Upstream { message: String },

    #[error("Discord API error: {message}")]
    Discord { message: String },

    #[error("Member not found in guild: {user_id}")]
    MemberNotFound { user_id: u64 },
}

impl GateError {
    /// Message safe to show on the callback result page. Never includes the
    /// client secret, the authorization code, or an access token.
    pub fn user_message(&self) -> &'static str {
        match self {
            GateError::InvalidRequest => {
                "Invalid request parameters. Start verification again from Discord."
            }
            GateError::AttemptNotFound | GateError::AttemptExpired => {
                "This verification link is invalid or has expired. Please restart \
                 verification from the server."
            }
            GateError::SubjectMismatch => {
                "Verification failed: you authorized with a different Discord account \
                 than the one this link was issued to. Please restart verification."
            }
            GateError::AttemptLimitExceeded { .. } => {
                "Too many verification attempts. Please contact an administrator."
            }
            GateError::MemberNotFound { .. } => "You are no longer a member of the server.",
            _ => "Something went wrong during verification. Please try again later.",
        }
    }
}

impl From<serenity::Error> for GateError {
    fn from(err: serenity::Error) -> Self {
        GateError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors can embed the request URL; strip it so no query
        // parameter ever reaches a page or log line.
        GateError::Upstream {
            message: err.without_url().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

use poise::serenity_prelude as serenity;
