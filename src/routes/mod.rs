// Route module decomposition, one domain area per file. Shared request
// guards live here; route functions in submodules.

mod achievements;
mod actions;
mod appeals;
mod events;
mod leaderboards;
mod meetings;
mod reports;
mod signal;
mod stats;
mod system;

pub use achievements::{
    create_achievement, delete_achievement, list_achievements, seed_achievements,
    set_achievement_progress, update_achievement, user_achievements,
};
pub use actions::{
    banned_users, check_banned, create_action, expire_check, list_actions, revoke_action,
    user_actions,
};
pub use appeals::{create_appeal, list_appeals, my_appeals, review_appeal};
pub use events::{
    live_session_ended, quiz_completed, quiz_created, result_saved, social_interaction,
};
pub use leaderboards::{
    category_leaderboard, category_rank, get_leaderboard, rebuild_leaderboard, reset_leaderboard,
    surrounding_users, user_rank,
};
pub use meetings::{create_meeting, get_meeting};
pub use reports::{
    bulk_update_reports, create_report, dismiss_report, list_reports, my_reports, report_stats,
    resolve_report, update_report_status,
};
pub use signal::{
    signal_connect, signal_disconnect, signal_drain, signal_event, signal_stream,
};
pub use stats::{bulk_update_stats, get_user_stats, sync_user_stats};
pub use system::{
    bad_request, forbidden, health, internal_error, not_found, too_many_requests, unauthorized,
    unprocessable,
};

use crate::auth::{Claims, Role, TokenError};
use crate::config::Config;
use crate::error::ApiError;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use std::sync::Arc;

/// Client IP, read through one layer of trusted proxy headers.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// Raw token from either transport header.
fn extract_token(req: &Request<'_>) -> Option<String> {
    if let Some(auth) = req.headers().get_one("Authorization")
        && let Some(token) = auth.strip_prefix("Bearer ")
    {
        return Some(token.to_string());
    }
    req.headers()
        .get_one("x-auth-token")
        .map(|t| t.to_string())
}

/// Stashed on the request so the 401 catcher can report which way the
/// token failed; only "expired" is refresh-eligible.
#[derive(Clone, Copy, Default)]
pub struct TokenFailure(pub Option<TokenError>);

fn verify_request(req: &Request<'_>) -> Result<Claims, TokenError> {
    let Some(config) = req.rocket().state::<Arc<Config>>() else {
        return Err(TokenError::Invalid);
    };
    let Some(token) = extract_token(req) else {
        return Err(TokenError::Missing);
    };
    crate::auth::verify(&config.token_secret, &token)
}

/// Any authenticated caller.
pub struct AuthedUser(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthedUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match verify_request(req) {
            Ok(claims) => Outcome::Success(AuthedUser(claims)),
            Err(e) => {
                req.local_cache(|| TokenFailure(Some(e)));
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Moderator or Admin.
pub struct ModeratorUser(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ModeratorUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match verify_request(req) {
            Ok(claims) if matches!(claims.role, Role::Moderator | Role::Admin) => {
                Outcome::Success(ModeratorUser(claims))
            }
            Ok(_) => Outcome::Error((Status::Forbidden, ())),
            Err(e) => {
                req.local_cache(|| TokenFailure(Some(e)));
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Exactly Admin.
pub struct AdminUser(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match verify_request(req) {
            Ok(claims) if claims.role == Role::Admin => Outcome::Success(AdminUser(claims)),
            Ok(_) => Outcome::Error((Status::Forbidden, ())),
            Err(e) => {
                req.local_cache(|| TokenFailure(Some(e)));
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Teacher or Admin.
pub struct TeacherUser(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TeacherUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match verify_request(req) {
            Ok(claims) if matches!(claims.role, Role::Teacher | Role::Admin) => {
                Outcome::Success(TeacherUser(claims))
            }
            Ok(_) => Outcome::Error((Status::Forbidden, ())),
            Err(e) => {
                req.local_cache(|| TokenFailure(Some(e)));
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Self-scope gate for `/:userId/...` paths: the caller must be the path
/// subject or an admin.
pub fn require_self_or_admin(claims: &Claims, user_id: &str) -> Result<(), ApiError> {
    if claims.role == Role::Admin || claims.sub == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You may only access your own records"))
    }
}

/// Sliding-window limiter check for one class of route, keyed by IP.
pub fn enforce_rate_limit(
    limiter: &crate::rate_limit::RateLimiter,
    class: &str,
    ip: &str,
    max: usize,
    window_secs: u64,
) -> Result<(), ApiError> {
    let info = limiter.check(&format!("{class}:{ip}"), max, window_secs);
    if info.allowed {
        Ok(())
    } else {
        Err(ApiError::new(
            crate::error::ErrorKind::RateLimited,
            format!(
                "Rate limit exceeded ({} per window); retry in {}s",
                info.limit, info.retry_after_secs
            ),
        ))
    }
}

/// Sanitize an inbound JSON body and parse it into its typed form,
/// mapping shape errors to a validation response.
pub fn parse_sanitized<T: serde::de::DeserializeOwned>(
    mut body: serde_json::Value,
) -> Result<T, ApiError> {
    crate::sanitize::sanitize_value(&mut body);
    serde_json::from_value(body).map_err(|e| ApiError::validation(vec![e.to_string()]))
}
