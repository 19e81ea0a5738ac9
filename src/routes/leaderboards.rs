use crate::error::{ApiError, ApiResult, ok, ok_with_message};
use crate::leaderboard::{GLOBAL, LeaderboardEngine, MONTHLY, WEEKLY};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use rocket::{State, get, post};

use super::{AdminUser, ClientIp, enforce_rate_limit};

fn named_board(board: &str) -> Result<&str, ApiError> {
    match board {
        GLOBAL | WEEKLY | MONTHLY => Ok(board),
        _ => Err(ApiError::not_found("Unknown leaderboard")),
    }
}

#[get("/api/leaderboards/<board>?<start>&<limit>")]
pub fn get_leaderboard(
    leaderboard: &State<LeaderboardEngine>,
    board: &str,
    start: Option<usize>,
    limit: Option<usize>,
) -> ApiResult {
    let board = named_board(board)?;
    let start = start.unwrap_or(0);
    let limit = limit.unwrap_or(10).min(100);
    let entries = leaderboard.get_page(board, start, limit)?;
    Ok(ok(serde_json::json!({
        "board": board,
        "entries": entries,
    })))
}

#[get("/api/leaderboards/category/<category>?<start>&<limit>")]
pub fn category_leaderboard(
    leaderboard: &State<LeaderboardEngine>,
    category: &str,
    start: Option<usize>,
    limit: Option<usize>,
) -> ApiResult {
    let start = start.unwrap_or(0);
    let limit = limit.unwrap_or(10).min(100);
    let entries = leaderboard.get_page(category, start, limit)?;
    Ok(ok(serde_json::json!({
        "board": format!("category:{category}"),
        "entries": entries,
    })))
}

#[get("/api/leaderboards/rank/<user_id>")]
pub fn user_rank(leaderboard: &State<LeaderboardEngine>, user_id: &str) -> ApiResult {
    rank_response(leaderboard, GLOBAL, user_id)
}

#[get("/api/leaderboards/rank/<user_id>/category/<category>")]
pub fn category_rank(
    leaderboard: &State<LeaderboardEngine>,
    user_id: &str,
    category: &str,
) -> ApiResult {
    rank_response(leaderboard, category, user_id)
}

/// The window of users ranked around one user on the global board.
#[get("/api/leaderboards/around/<user_id>?<k>")]
pub fn surrounding_users(
    leaderboard: &State<LeaderboardEngine>,
    user_id: &str,
    k: Option<usize>,
) -> ApiResult {
    let entries = leaderboard.surrounding(GLOBAL, user_id, k.unwrap_or(2).min(25))?;
    Ok(ok(serde_json::json!({ "entries": entries })))
}

#[post("/api/leaderboards/rebuild?<board>")]
pub fn rebuild_leaderboard(
    leaderboard: &State<LeaderboardEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    _admin: AdminUser,
    board: Option<&str>,
) -> ApiResult {
    enforce_rate_limit(limiter, "heavy", &ip.0, rate.heavy_max, rate.window_secs)?;
    let board = named_board(board.unwrap_or(GLOBAL))?;
    let count = leaderboard.rebuild(board)?;
    Ok(ok_with_message(
        "Leaderboard rebuilt",
        serde_json::json!({ "board": board, "entries": count }),
    ))
}

/// Window reset for the weekly/monthly boards: the key is deleted and
/// repopulates as events arrive.
#[post("/api/leaderboards/reset/<board>")]
pub fn reset_leaderboard(
    leaderboard: &State<LeaderboardEngine>,
    _admin: AdminUser,
    board: &str,
) -> ApiResult {
    if !matches!(board, WEEKLY | MONTHLY) {
        return Err(ApiError::validation(vec![
            "only the weekly and monthly boards reset".to_string(),
        ]));
    }
    leaderboard.reset(board)?;
    Ok(ok_with_message("Leaderboard reset", serde_json::json!({ "board": board })))
}

fn rank_response(leaderboard: &LeaderboardEngine, board: &str, user_id: &str) -> ApiResult {
    match leaderboard.get_rank(board, user_id)? {
        Some((rank, score)) => Ok(ok(serde_json::json!({
            "userId": user_id,
            "rank": rank,
            "score": score,
        }))),
        None => Err(ApiError::not_found("User is not ranked on this board")),
    }
}
