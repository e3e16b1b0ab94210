//! Web server for the OAuth verification callback.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use poise::serenity_prelude::{self as serenity, Http};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::oauth::OAuthClient;
use super::pages;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::notify;
use crate::roles::{self, ElevationPolicy, RolePolicy};
use crate::verification::{SharedInvitations, SharedLimiter, SharedRegistry};

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub registry: SharedRegistry,
    pub limiter: SharedLimiter,
    pub invitations: SharedInvitations,
    pub oauth: OAuthClient,
    pub policy: RolePolicy,
    pub elevation: Arc<dyn ElevationPolicy>,
    pub serenity_http: Arc<Http>,
}

/// Query parameters from the OAuth redirect. Both are required; they are
/// optional here so a missing one maps to `InvalidRequest` instead of a
/// framework rejection.
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// What the success page needs to render.
pub struct VerifiedOutcome {
    pub username: String,
    pub guild_name: String,
}

/// Start the web server for the OAuth callback.
pub async fn start_web_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;

    let app = Router::new()
        .route("/", get(health))
        .route("/callback", get(oauth_callback))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> &'static str {
    "Membership Gate Running"
}

/// GET /callback - OAuth callback handler. Exactly one response per request:
/// the success page, a 4xx error page, or a 5xx on upstream failure.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match complete_verification(&state, params).await {
        Ok(outcome) => Html(pages::success_page(&outcome.username, &outcome.guild_name))
            .into_response(),
        Err(err) => {
            warn!("Callback rejected: {}", err);
            (status_for(&err), Html(pages::error_page(err.user_message()))).into_response()
        }
    }
}

fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::InvalidRequest
        | GateError::AttemptNotFound
        | GateError::AttemptExpired
        | GateError::SubjectMismatch
        | GateError::AttemptLimitExceeded { .. }
        | GateError::MemberNotFound { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Drive one callback request through the verification state machine. Free
/// of any HTTP-framework types; `oauth_callback` translates the outcome at
/// the boundary.
async fn complete_verification(
    state: &AppState,
    params: CallbackParams,
) -> Result<VerifiedOutcome> {
    let (code, token) = match (params.code, params.state) {
        (Some(code), Some(token)) if !code.is_empty() && !token.is_empty() => (code, token),
        _ => return Err(GateError::InvalidRequest),
    };

    // Consume before any network call: a replayed or double-submitted
    // callback loses the race here and can never trigger a second code
    // exchange for the same attempt.
    let attempt = state.registry.consume(&token)?;
    info!(
        "Callback accepted for user {} in guild {}",
        attempt.subject_user_id, attempt.guild_id
    );

    let credential = state.oauth.exchange_code(&code).await?;
    let identity = state.oauth.fetch_identity(&credential).await?;

    ensure_subject_matches(&attempt, &identity)?;

    let member = attempt
        .guild_id
        .member(&state.serenity_http, attempt.subject_user_id)
        .await
        .map_err(|_| GateError::MemberNotFound {
            user_id: attempt.subject_user_id.get(),
        })?;

    let elevated = state.elevation.is_eligible(&member).await;
    let current_roles: std::collections::HashSet<_> = member.roles.iter().copied().collect();
    let transition = roles::compute_transition(&current_roles, &state.policy, elevated);
    let failures = roles::apply_transition(&state.serenity_http, &member, &transition).await;
    for failure in &failures {
        // Member is identity-verified but in an inconsistent role state.
        // Not retried automatically; an operator has to remediate.
        error!(
            "Partial role transition for user {}: {}",
            member.user.id, failure
        );
    }

    // Verification completed: clear the user's attempt counter.
    state.limiter.reset(attempt.subject_user_id);

    let guild_name = attempt
        .guild_id
        .to_partial_guild(&state.serenity_http)
        .await
        .map(|g| g.name)
        .unwrap_or_else(|_| "the server".to_string());

    info!(
        "User {} verified as '{}' via OAuth",
        member.user.id, identity.username
    );

    // Best-effort side effects run detached; their failures are logged and
    // never surfaced to the browser.
    notify::spawn_post_verification(
        state.serenity_http.clone(),
        state.config.clone(),
        state.invitations.clone(),
        member.clone(),
        guild_name.clone(),
    );

    Ok(VerifiedOutcome {
        username: display_name(&identity.username, identity.global_name.as_deref(), &member),
        guild_name,
    })
}

/// The authorized account must be the member the attempt was issued to.
/// The token is already burned when this runs; a mismatched user has to
/// restart the flow from the invitation.
fn ensure_subject_matches(
    attempt: &crate::verification::VerificationAttempt,
    identity: &super::oauth::DiscordUser,
) -> Result<()> {
    if identity.user_id()? != attempt.subject_user_id {
        warn!(
            "Subject mismatch: attempt for {} completed by a different account",
            attempt.subject_user_id
        );
        return Err(GateError::SubjectMismatch);
    }
    Ok(())
}

fn display_name(username: &str, global_name: Option<&str>, member: &serenity::Member) -> String {
    member
        .nick
        .clone()
        .or_else(|| global_name.map(str::to_string))
        .unwrap_or_else(|| username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::VerificationAttempt;
    use poise::serenity_prelude::{GuildId, UserId};

    fn attempt_for(subject: u64) -> VerificationAttempt {
        VerificationAttempt {
            token: "deadbeefdeadbeefdeadbeefdeadbeef".to_string(),
            subject_user_id: UserId::new(subject),
            guild_id: GuildId::new(99),
            created_at: 0,
            one_time_code: "A1B2C3D4".to_string(),
        }
    }

    fn identity(id: &str) -> super::super::oauth::DiscordUser {
        super::super::oauth::DiscordUser {
            id: id.to_string(),
            username: "someone".to_string(),
            global_name: None,
        }
    }

    #[test]
    fn matching_subject_passes() {
        assert!(ensure_subject_matches(&attempt_for(42), &identity("42")).is_ok());
    }

    #[test]
    fn foreign_account_is_a_mismatch() {
        // Forwarded link completed with an unrelated login: terminal failure,
        // and the consumed token cannot be replayed afterwards.
        assert!(matches!(
            ensure_subject_matches(&attempt_for(42), &identity("43")),
            Err(GateError::SubjectMismatch)
        ));
    }

    #[test]
    fn taxonomy_maps_to_exactly_one_status() {
        assert_eq!(status_for(&GateError::InvalidRequest), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&GateError::AttemptNotFound), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&GateError::AttemptExpired), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&GateError::SubjectMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&GateError::Upstream {
                message: "token endpoint returned 502".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&GateError::Discord {
                message: "rate limited".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn user_messages_never_leak_credentials() {
        let errors = [
            GateError::InvalidRequest,
            GateError::AttemptNotFound,
            GateError::AttemptExpired,
            GateError::SubjectMismatch,
            GateError::Upstream {
                message: "client_secret=hunter2".to_string(),
            },
        ];
        for err in &errors {
            assert!(!err.user_message().contains("hunter2"));
            assert!(!err.user_message().contains("client_secret"));
        }
    }
}
