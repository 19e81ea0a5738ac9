use crate::db::Db;
use crate::error::ApiError;
use crate::kv::Kv;
use crate::models::LeaderboardEntry;
use rusqlite::params;
use std::sync::Arc;

/// How many users a rebuild pulls from the durable store.
const REBUILD_TOP_N: usize = 100;

pub const GLOBAL: &str = "global";
pub const WEEKLY: &str = "weekly";
pub const MONTHLY: &str = "monthly";

fn board_key(board: &str) -> String {
    match board {
        GLOBAL | WEEKLY | MONTHLY => format!("leaderboard:{board}"),
        category => format!("leaderboard:category:{category}"),
    }
}

/// Sorted-set rankings. The cache is authoritative; the durable store's
/// aggregated `total_points` is the rebuild source when a set is empty.
/// Ties rank in insertion order, stable within a rebuild.
#[derive(Clone)]
pub struct LeaderboardEngine {
    kv: Kv,
    db: Arc<Db>,
}

impl LeaderboardEngine {
    pub fn new(kv: Kv, db: Arc<Db>) -> Self {
        LeaderboardEngine { kv, db }
    }

    /// Every write to a user's total funnels through here: global,
    /// weekly, monthly, and (when known) the category set all move.
    pub fn update_user_score(&self, user_id: &str, points: f64, category: Option<&str>) {
        for board in [GLOBAL, WEEKLY, MONTHLY] {
            if let Err(e) = self.kv.zadd(&board_key(board), user_id, points) {
                eprintln!("⚠️ Leaderboard {board} update failed for {user_id}: {e}");
            }
        }
        if let Some(category) = category
            && let Err(e) = self.kv.zadd(&board_key(category), user_id, points)
        {
            eprintln!("⚠️ Category leaderboard {category} update failed for {user_id}: {e}");
        }
    }

    /// A ranked page. Rank is 1-based rev-order: `start + i + 1`.
    pub fn get_page(
        &self,
        board: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        self.rebuild_if_empty(board)?;
        let key = board_key(board);
        let rows = self
            .kv
            .zrevrange_withscores(&key, start, start + limit - 1)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (user_id, score))| LeaderboardEntry {
                rank: start + i + 1,
                user: self.user_metadata(&user_id),
                user_id,
                score,
            })
            .collect())
    }

    /// A user's 1-based rank and score, `None` when unranked.
    pub fn get_rank(&self, board: &str, user_id: &str) -> Result<Option<(usize, f64)>, ApiError> {
        self.rebuild_if_empty(board)?;
        let key = board_key(board);
        let rank = self
            .kv
            .zrevrank(&key, user_id)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let Some(rank) = rank else {
            return Ok(None);
        };
        let score = self
            .kv
            .zscore(&key, user_id)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .unwrap_or(0.0);
        Ok(Some((rank + 1, score)))
    }

    /// The window of `k` users on either side of a user, clamped at the
    /// top of the board.
    pub fn surrounding(
        &self,
        board: &str,
        user_id: &str,
        k: usize,
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let Some((rank, _)) = self.get_rank(board, user_id)? else {
            return Ok(vec![]);
        };
        let rank0 = rank - 1;
        let start = rank0.saturating_sub(k);
        let stop = rank0 + k;
        self.get_page(board, start, stop - start + 1)
    }

    /// Weekly/monthly reset is a key deletion; the next write or rebuild
    /// starts the new window.
    pub fn reset(&self, board: &str) -> Result<(), ApiError> {
        self.kv
            .del(&board_key(board))
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(())
    }

    /// Repopulate a board from the durable store's aggregated totals:
    /// top-N by `total_points`, batch-ZADDed in rank order so insertion
    /// sequence resolves ties deterministically.
    pub fn rebuild(&self, board: &str) -> Result<usize, ApiError> {
        let rows: Vec<(String, f64)> = {
            let conn = self.db.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, total_points FROM user_stats
                     ORDER BY total_points DESC, updated_at ASC, user_id ASC LIMIT ?1",
                )
                .map_err(ApiError::from)?;
            stmt.query_map(params![REBUILD_TOP_N as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect()
        };
        self.kv
            .zadd_batch(&board_key(board), &rows)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(rows.len())
    }

    fn rebuild_if_empty(&self, board: &str) -> Result<(), ApiError> {
        let key = board_key(board);
        let card = self
            .kv
            .zcard(&key)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        if card > 0 {
            return Ok(());
        }
        // Category boards have no durable aggregate to rebuild from;
        // they refill as events arrive.
        if matches!(board, GLOBAL | WEEKLY | MONTHLY) {
            self.rebuild(board)?;
        }
        Ok(())
    }

    fn user_metadata(&self, user_id: &str) -> serde_json::Value {
        match self.db.user_name(user_id) {
            Some(name) => serde_json::json!({ "name": name }),
            None => serde_json::json!({ "name": user_id }),
        }
    }
}
