use crate::error::{ApiError, ApiResult, ok, ok_with_message};
use crate::models::ResultData;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::stats::StatsEngine;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use serde::Deserialize;

use super::{AdminUser, AuthedUser, ClientIp, enforce_rate_limit, require_self_or_admin};

#[get("/api/stats/<user_id>")]
pub fn get_user_stats(
    stats: &State<StatsEngine>,
    caller: AuthedUser,
    user_id: &str,
) -> ApiResult {
    require_self_or_admin(&caller.0, user_id)?;
    let snapshot = stats.get_stats(user_id)?;
    Ok(ok(serde_json::to_value(&snapshot).unwrap_or_default()))
}

/// Force a cache → durable spill for one user.
#[post("/api/stats/<user_id>/sync")]
pub fn sync_user_stats(
    stats: &State<StatsEngine>,
    _admin: AdminUser,
    user_id: &str,
) -> ApiResult {
    stats.sync_to_db(user_id)?;
    Ok(ok_with_message(
        "Stats synced",
        serde_json::json!({ "userId": user_id }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatsUpdate {
    pub updates: Vec<BulkStatsEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatsEntry {
    pub user_id: String,
    pub result_data: ResultData,
}

/// Replay a batch of results through the standard pipeline. Heavy class:
/// one call can touch many users.
#[post("/api/stats/bulk-update", format = "json", data = "<body>")]
pub fn bulk_update_stats(
    stats: &State<StatsEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    _admin: AdminUser,
    body: Json<BulkStatsUpdate>,
) -> ApiResult {
    enforce_rate_limit(limiter, "heavy", &ip.0, rate.heavy_max, rate.window_secs)?;
    if body.updates.is_empty() {
        return Err(ApiError::validation(vec!["updates must not be empty".to_string()]));
    }

    let mut applied = 0;
    for entry in &body.updates {
        match stats.update_stats(&entry.user_id, &entry.result_data) {
            Ok(_) => applied += 1,
            Err(e) => eprintln!("⚠️ bulk-update: failed for {}: {e}", entry.user_id),
        }
    }
    Ok(ok_with_message(
        "Bulk update applied",
        serde_json::json!({ "applied": applied, "requested": body.updates.len() }),
    ))
}
