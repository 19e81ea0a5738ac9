use crate::Queues;
use crate::db::Db;
use crate::error::{ApiResult, ok_with_message};
use crate::kv::Kv;
use rocket::serde::json::Json;
use rocket::{Request, State, catch, get};
use std::sync::Arc;

use super::TokenFailure;

/// Component health. The process stays up and reports degraded rather
/// than dying when a dependency misbehaves.
#[get("/health")]
pub fn health(db: &State<Arc<Db>>, kv: &State<Kv>, queues: &State<Queues>) -> ApiResult {
    let db_ok = db
        .conn
        .lock()
        .map(|conn| conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok())
        .unwrap_or(false);
    let kv_ok = kv.set("health:ping", "1").is_ok();
    let achievement_counts = queues.achievement.counts().ok();
    let stats_sync_counts = queues.stats_sync.counts().ok();

    let status = if db_ok && kv_ok { "ok" } else { "degraded" };
    Ok(ok_with_message(
        status,
        serde_json::json!({
            "status": status,
            "components": {
                "db": if db_ok { "ok" } else { "down" },
                "kv": if kv_ok { "ok" } else { "down" },
                "queues": {
                    "achievementCheck": achievement_counts,
                    "statsSync": stats_sync_counts,
                },
            },
        }),
    ))
}

fn envelope(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": false,
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[catch(400)]
pub fn bad_request() -> Json<serde_json::Value> {
    envelope("Bad request")
}

#[catch(401)]
pub fn unauthorized(req: &Request<'_>) -> Json<serde_json::Value> {
    let failure = req.local_cache(TokenFailure::default);
    let message = failure
        .0
        .map(|e| e.message())
        .unwrap_or("No authentication token provided");
    envelope(message)
}

#[catch(403)]
pub fn forbidden() -> Json<serde_json::Value> {
    envelope("You do not have permission to perform this action")
}

#[catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    envelope("Resource not found")
}

#[catch(422)]
pub fn unprocessable() -> Json<serde_json::Value> {
    envelope("Malformed request body")
}

#[catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    envelope("Too many requests")
}

#[catch(500)]
pub fn internal_error() -> Json<serde_json::Value> {
    envelope("Internal server error")
}
