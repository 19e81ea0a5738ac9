use crate::achievements::AchievementEngine;
use crate::error::{ApiResult, ok, ok_with_message};
use crate::models::CreateAchievement;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use serde::Deserialize;

use super::{AdminUser, AuthedUser, ClientIp, enforce_rate_limit, parse_sanitized, require_self_or_admin};

#[get("/api/achievements")]
pub fn list_achievements(achievements: &State<AchievementEngine>) -> ApiResult {
    let defs = achievements.list_definitions(true)?;
    Ok(ok(serde_json::json!({ "achievements": defs })))
}

#[allow(non_snake_case)]
#[get("/api/achievements/<user_id>?<completedOnly>")]
pub fn user_achievements(
    achievements: &State<AchievementEngine>,
    caller: AuthedUser,
    user_id: &str,
    completedOnly: Option<bool>,
) -> ApiResult {
    require_self_or_admin(&caller.0, user_id)?;
    let unlocks = achievements.user_achievements(user_id, completedOnly.unwrap_or(false))?;
    Ok(ok(serde_json::json!({
        "userId": user_id,
        "achievements": unlocks,
    })))
}

#[post("/api/achievements", format = "json", data = "<body>")]
pub fn create_achievement(
    achievements: &State<AchievementEngine>,
    _admin: AdminUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: CreateAchievement = parse_sanitized(body.into_inner())?;
    let created = achievements.create_definition(&body)?;
    Ok(ok_with_message(
        "Achievement created",
        serde_json::to_value(&created).unwrap_or_default(),
    ))
}

#[post("/api/achievements/seed")]
pub fn seed_achievements(
    achievements: &State<AchievementEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    _admin: AdminUser,
) -> ApiResult {
    enforce_rate_limit(limiter, "heavy", &ip.0, rate.heavy_max, rate.window_secs)?;
    let inserted = achievements.seed_defaults()?;
    Ok(ok_with_message(
        "Default achievements seeded",
        serde_json::json!({ "inserted": inserted }),
    ))
}

#[put("/api/achievements/<id>", format = "json", data = "<body>")]
pub fn update_achievement(
    achievements: &State<AchievementEngine>,
    _admin: AdminUser,
    id: &str,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: CreateAchievement = parse_sanitized(body.into_inner())?;
    let updated = achievements.update_definition(id, &body)?;
    Ok(ok_with_message(
        "Achievement updated",
        serde_json::to_value(&updated).unwrap_or_default(),
    ))
}

#[delete("/api/achievements/<id>")]
pub fn delete_achievement(
    achievements: &State<AchievementEngine>,
    _admin: AdminUser,
    id: &str,
) -> ApiResult {
    achievements.delete_definition(id)?;
    Ok(ok_with_message("Achievement deleted", serde_json::json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub user_id: String,
    pub achievement_id: String,
    pub progress: i64,
}

/// Progressive accumulation; 100 completes through the unlock path.
#[post("/api/achievements/progress", format = "json", data = "<body>")]
pub fn set_achievement_progress(
    achievements: &State<AchievementEngine>,
    _admin: AdminUser,
    body: Json<ProgressUpdate>,
) -> ApiResult {
    let completed =
        achievements.update_progress(&body.user_id, &body.achievement_id, body.progress)?;
    Ok(ok(serde_json::json!({
        "userId": body.user_id,
        "achievementId": body.achievement_id,
        "progress": body.progress.clamp(0, 100),
        "completed": completed,
    })))
}
