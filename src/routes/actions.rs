use crate::error::{ApiResult, ok, ok_with_message};
use crate::models::{CreateAction, RevokeAction};
use crate::moderation::ModerationEngine;
use rocket::serde::json::Json;
use rocket::{State, get, patch, post};

use super::{AuthedUser, ModeratorUser, parse_sanitized, require_self_or_admin};

#[post("/api/actions", format = "json", data = "<body>")]
pub fn create_action(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: CreateAction = parse_sanitized(body.into_inner())?;
    let created = moderation.create_action(&moderator.0.sub, &body)?;
    Ok(ok_with_message("Action applied", created))
}

#[get("/api/actions?<active_only>&<limit>&<offset>")]
pub fn list_actions(
    moderation: &State<ModerationEngine>,
    _moderator: ModeratorUser,
    active_only: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult {
    let actions = moderation.list_actions(
        active_only.unwrap_or(false),
        limit.unwrap_or(50).clamp(1, 200),
        offset.unwrap_or(0).max(0),
    )?;
    Ok(ok(serde_json::json!({ "actions": actions })))
}

#[get("/api/actions/user/<user_id>")]
pub fn user_actions(
    moderation: &State<ModerationEngine>,
    _moderator: ModeratorUser,
    user_id: &str,
) -> ApiResult {
    let actions = moderation.actions_for_user(user_id)?;
    Ok(ok(serde_json::json!({ "userId": user_id, "actions": actions })))
}

#[patch("/api/actions/<action_id>/revoke", format = "json", data = "<body>")]
pub fn revoke_action(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    action_id: &str,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: RevokeAction = parse_sanitized(body.into_inner())?;
    let revoked = moderation.revoke_action(action_id, &moderator.0.sub, &body.reason)?;
    Ok(ok_with_message("Action revoked", revoked))
}

/// Ban lookup, self-scoped: a user may check themselves, moderators and
/// admins may check anyone. Lapsed temporary bans expire on this read.
#[get("/api/actions/check/banned/<user_id>")]
pub fn check_banned(
    moderation: &State<ModerationEngine>,
    caller: AuthedUser,
    user_id: &str,
) -> ApiResult {
    if !matches!(caller.0.role, crate::auth::Role::Moderator | crate::auth::Role::Admin) {
        require_self_or_admin(&caller.0, user_id)?;
    }
    match moderation.is_banned(user_id)? {
        Some(details) => Ok(ok(serde_json::json!({ "isBanned": true, "ban": details }))),
        None => Ok(ok(serde_json::json!({ "isBanned": false }))),
    }
}

#[get("/api/actions/banned/users")]
pub fn banned_users(moderation: &State<ModerationEngine>, _moderator: ModeratorUser) -> ApiResult {
    let banned = moderation.banned_users()?;
    Ok(ok(serde_json::json!({ "bannedUsers": banned })))
}

/// Expiry reconciliation, fired by an external scheduler.
#[post("/api/actions/expire/check")]
pub fn expire_check(moderation: &State<ModerationEngine>, _moderator: ModeratorUser) -> ApiResult {
    let expired = moderation.expire_lapsed_actions()?;
    Ok(ok_with_message(
        "Expiry check complete",
        serde_json::json!({ "expired": expired }),
    ))
}
