use crate::error::{ApiResult, ok, ok_with_message};
use crate::models::{CreateAppeal, ReviewAppeal};
use crate::moderation::ModerationEngine;
use rocket::serde::json::Json;
use rocket::{State, get, patch, post};

use super::{AuthedUser, ModeratorUser, parse_sanitized};

#[post("/api/appeals", format = "json", data = "<body>")]
pub fn create_appeal(
    moderation: &State<ModerationEngine>,
    caller: AuthedUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: CreateAppeal = parse_sanitized(body.into_inner())?;
    let created = moderation.create_appeal(&caller.0.sub, &body)?;
    Ok(ok_with_message("Appeal submitted", created))
}

#[get("/api/appeals?<status>")]
pub fn list_appeals(
    moderation: &State<ModerationEngine>,
    _moderator: ModeratorUser,
    status: Option<&str>,
) -> ApiResult {
    let appeals = moderation.list_appeals(status)?;
    Ok(ok(serde_json::json!({ "appeals": appeals })))
}

#[get("/api/appeals/my-appeals")]
pub fn my_appeals(moderation: &State<ModerationEngine>, caller: AuthedUser) -> ApiResult {
    let appeals = moderation.appeals_for_user(&caller.0.sub)?;
    Ok(ok(serde_json::json!({ "appeals": appeals })))
}

#[patch("/api/appeals/<appeal_id>/review", format = "json", data = "<body>")]
pub fn review_appeal(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    appeal_id: &str,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: ReviewAppeal = parse_sanitized(body.into_inner())?;
    let reviewed = moderation.review_appeal(appeal_id, &moderator.0.sub, &body)?;
    Ok(ok_with_message("Appeal reviewed", reviewed))
}
