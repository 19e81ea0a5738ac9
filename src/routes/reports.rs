use crate::error::{ApiResult, ok, ok_with_message};
use crate::models::{BulkReportUpdate, CreateReport, UpdateReportStatus};
use crate::moderation::ModerationEngine;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::serde::json::Json;
use rocket::{State, get, patch, post, put};

use super::{AuthedUser, ClientIp, ModeratorUser, enforce_rate_limit, parse_sanitized};

#[post("/api/reports", format = "json", data = "<body>")]
pub fn create_report(
    moderation: &State<ModerationEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    caller: AuthedUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let body: CreateReport = parse_sanitized(body.into_inner())?;
    let created = moderation.create_report(&caller.0.sub, &body)?;
    Ok(ok_with_message("Report submitted", created))
}

#[get("/api/reports?<status>&<priority>&<limit>&<offset>")]
pub fn list_reports(
    moderation: &State<ModerationEngine>,
    _moderator: ModeratorUser,
    status: Option<&str>,
    priority: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult {
    let reports = moderation.list_reports(
        status,
        priority,
        limit.unwrap_or(50).clamp(1, 200),
        offset.unwrap_or(0).max(0),
    )?;
    Ok(ok(serde_json::json!({ "reports": reports })))
}

#[get("/api/reports/stats")]
pub fn report_stats(moderation: &State<ModerationEngine>, _moderator: ModeratorUser) -> ApiResult {
    Ok(ok(moderation.report_stats()?))
}

#[get("/api/reports/user/my-reports")]
pub fn my_reports(moderation: &State<ModerationEngine>, caller: AuthedUser) -> ApiResult {
    let reports = moderation.reports_by_reporter(&caller.0.sub)?;
    Ok(ok(serde_json::json!({ "reports": reports })))
}

#[patch("/api/reports/<report_id>/status", format = "json", data = "<body>")]
pub fn update_report_status(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    report_id: &str,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: UpdateReportStatus = parse_sanitized(body.into_inner())?;
    let updated = moderation.update_report_status(report_id, &moderator.0.sub, &body)?;
    Ok(ok_with_message("Report updated", updated))
}

#[patch("/api/reports/bulk/update", format = "json", data = "<body>")]
pub fn bulk_update_reports(
    moderation: &State<ModerationEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    moderator: ModeratorUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "heavy", &ip.0, rate.heavy_max, rate.window_secs)?;
    let body: BulkReportUpdate = parse_sanitized(body.into_inner())?;
    let updated = moderation.bulk_update_reports(
        &moderator.0.sub,
        &body.report_ids,
        &body.status,
        body.moderator_notes.as_deref(),
    )?;
    Ok(ok_with_message(
        "Reports updated",
        serde_json::json!({ "updated": updated, "requested": body.report_ids.len() }),
    ))
}

#[put("/api/reports/<report_id>/resolve", format = "json", data = "<body>")]
pub fn resolve_report(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    report_id: &str,
    body: Option<Json<serde_json::Value>>,
) -> ApiResult {
    close_report(moderation, &moderator.0.sub, report_id, "resolved", body)
}

#[put("/api/reports/<report_id>/dismiss", format = "json", data = "<body>")]
pub fn dismiss_report(
    moderation: &State<ModerationEngine>,
    moderator: ModeratorUser,
    report_id: &str,
    body: Option<Json<serde_json::Value>>,
) -> ApiResult {
    close_report(moderation, &moderator.0.sub, report_id, "dismissed", body)
}

fn close_report(
    moderation: &ModerationEngine,
    moderator_id: &str,
    report_id: &str,
    status: &str,
    body: Option<Json<serde_json::Value>>,
) -> ApiResult {
    let mut raw = body.map(|b| b.into_inner()).unwrap_or(serde_json::json!({}));
    crate::sanitize::sanitize_value(&mut raw);
    let update = UpdateReportStatus {
        status: status.to_string(),
        moderator_notes: raw["moderatorNotes"].as_str().map(String::from),
        action: raw["action"].as_str().map(String::from),
    };
    let updated = moderation.update_report_status(report_id, moderator_id, &update)?;
    Ok(ok_with_message("Report closed", updated))
}
