//! Web server for OAuth verification
//!
//! Runs alongside the Discord bot to receive the OAuth redirect and drive
//! the role transition for a consumed verification attempt.

mod oauth;
mod pages;
mod server;

pub use oauth::OAuthClient;
pub use server::{start_web_server, AppState};
