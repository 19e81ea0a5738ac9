use crate::db::Db;
use crate::error::ApiError;
use crate::jobs::JobQueue;
use crate::kv::{Kv, KvResult};
use crate::leaderboard::LeaderboardEngine;
use crate::models::{ResultData, UserStats};
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const STATS_TTL: Duration = Duration::from_secs(3600);
const ACTIVITY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

fn stats_key(user_id: &str) -> String {
    format!("userstats:{user_id}")
}

fn activity_key(user_id: &str) -> String {
    format!("activity:{user_id}")
}

/// Per-user counters with a write-through cache. All mutation happens as
/// hash increments on `userstats:{user}`; the durable `user_stats` table
/// is refreshed by sync jobs and serves cold reads.
#[derive(Clone)]
pub struct StatsEngine {
    kv: Kv,
    db: Arc<Db>,
    leaderboard: LeaderboardEngine,
    sync_queue: JobQueue,
}

impl StatsEngine {
    pub fn new(kv: Kv, db: Arc<Db>, leaderboard: LeaderboardEngine, sync_queue: JobQueue) -> Self {
        StatsEngine {
            kv,
            db,
            leaderboard,
            sync_queue,
        }
    }

    /// Read path: cache, else durable store, else materialize an initial
    /// record. Whatever was found ends up cached.
    pub fn get_stats(&self, user_id: &str) -> Result<UserStats, ApiError> {
        let cached = self.kv.hgetall(&stats_key(user_id)).unwrap_or_default();
        if !cached.is_empty() {
            return Ok(stats_from_hash(user_id, &cached));
        }
        let stats = self
            .load_from_db(user_id)
            .unwrap_or_else(|| UserStats::initial(user_id));
        self.db.ensure_user(user_id);
        self.cache_stats(&stats)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(stats)
    }

    /// Apply a quiz result. Integer fields move by integer increment,
    /// points and experience by float increment; the hash TTL is
    /// refreshed on every write.
    pub fn update_stats(&self, user_id: &str, r: &ResultData) -> Result<UserStats, ApiError> {
        // Warm the cache so increments land on the authoritative values.
        self.get_stats(user_id)?;
        let key = stats_key(user_id);

        let apply = || -> KvResult<()> {
            self.kv.hincrby(&key, "totalQuizzesTaken", 1)?;
            self.kv
                .hincrby(&key, "totalTimeSpent", (r.total_time_taken / 60.0).round() as i64)?;
            self.kv
                .hincrbyfloat(&key, "totalPoints", r.points_earned + r.bonus_points)?;
            let experience = self.kv.hincrbyfloat(&key, "experience", r.experience)?;

            if r.passed {
                let streak = self.kv.hincrby(&key, "currentStreak", 1)?;
                let longest: i64 = self
                    .kv
                    .hget(&key, "longestStreak")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                if streak > longest {
                    self.kv.hset(&key, "longestStreak", &streak.to_string())?;
                }
            } else {
                self.kv.hset(&key, "currentStreak", "0")?;
            }

            if let Some(category) = &r.category {
                self.kv.hincrby(&key, &format!("cat:{category}"), 1)?;
            }

            self.kv
                .hset(&key, "lastQuizDate", &chrono::Utc::now().to_rfc3339())?;

            let level = level_for(experience);
            let stored: i64 = self
                .kv
                .hget(&key, "level")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            if level != stored {
                self.kv.hset(&key, "level", &level.to_string())?;
            }

            self.kv.expire(&key, STATS_TTL)?;
            Ok(())
        };
        apply().map_err(|e| ApiError::internal(e.to_string()))?;

        let stats = self.get_stats(user_id)?;
        self.leaderboard
            .update_user_score(user_id, stats.total_points, r.category.as_deref());
        self.enqueue_sync(user_id);
        Ok(stats)
    }

    /// Running mean over quiz percentages, rounded to an integer. `n` is
    /// the post-increment quiz count; the previous average carries weight
    /// `n − 1`.
    pub fn update_average_score(&self, user_id: &str, percentage: f64) -> Result<i64, ApiError> {
        self.get_stats(user_id)?;
        let key = stats_key(user_id);
        let read = || -> KvResult<(i64, i64)> {
            let n: i64 = self
                .kv
                .hget(&key, "totalQuizzesTaken")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let avg: i64 = self
                .kv
                .hget(&key, "averageScore")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            Ok((n, avg))
        };
        let (n, old_avg) = read().map_err(|e| ApiError::internal(e.to_string()))?;
        let n = n.max(1);
        let new_avg = (((old_avg as f64) * ((n - 1) as f64) + percentage) / n as f64).round() as i64;
        self.kv
            .hset(&key, "averageScore", &new_avg.to_string())
            .and_then(|_| self.kv.expire(&key, STATS_TTL).map(|_| ()))
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(new_avg)
    }

    /// Stamp `activity:{user}` on every completed quiz; the streak reaper
    /// keys off its age.
    pub fn record_activity(&self, user_id: &str) {
        let _ = self.kv.set_with_ttl(
            &activity_key(user_id),
            &chrono::Utc::now().to_rfc3339(),
            ACTIVITY_TTL,
        );
    }

    pub fn increment_quizzes_created(&self, user_id: &str) -> Result<UserStats, ApiError> {
        self.get_stats(user_id)?;
        let key = stats_key(user_id);
        self.kv
            .hincrby(&key, "totalQuizzesCreated", 1)
            .and_then(|_| self.kv.expire(&key, STATS_TTL).map(|_| ()))
            .map_err(|e| ApiError::internal(e.to_string()))?;
        self.enqueue_sync(user_id);
        self.get_stats(user_id)
    }

    pub fn enqueue_sync(&self, user_id: &str) {
        if let Err(e) = self
            .sync_queue
            .enqueue(serde_json::json!({ "userId": user_id }))
        {
            eprintln!("⚠️ Failed to enqueue stats sync for {user_id}: {e}");
        }
    }

    /// Spill the cache hash back to the durable store. Run by sync-queue
    /// workers and the admin sync endpoint.
    pub fn sync_to_db(&self, user_id: &str) -> Result<(), ApiError> {
        let cached = self
            .kv
            .hgetall(&stats_key(user_id))
            .map_err(|e| ApiError::internal(e.to_string()))?;
        if cached.is_empty() {
            return Ok(());
        }
        let stats = stats_from_hash(user_id, &cached);
        self.db.ensure_user(user_id);
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_stats (user_id, total_quizzes_taken, total_quizzes_created,
                total_points, current_streak, longest_streak, last_quiz_date, average_score,
                total_time_spent, level, experience, favorite_categories, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(user_id) DO UPDATE SET
                total_quizzes_taken = excluded.total_quizzes_taken,
                total_quizzes_created = excluded.total_quizzes_created,
                total_points = excluded.total_points,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_quiz_date = excluded.last_quiz_date,
                average_score = excluded.average_score,
                total_time_spent = excluded.total_time_spent,
                level = excluded.level,
                experience = excluded.experience,
                favorite_categories = excluded.favorite_categories,
                updated_at = excluded.updated_at",
            params![
                user_id,
                stats.total_quizzes_taken,
                stats.total_quizzes_created,
                stats.total_points,
                stats.current_streak,
                stats.longest_streak,
                stats.last_quiz_date,
                stats.average_score,
                stats.total_time_spent,
                stats.level,
                stats.experience,
                serde_json::to_string(&stats.favorite_categories).unwrap_or_else(|_| "[]".into()),
                now,
            ],
        )
        .map_err(ApiError::from)?;
        Ok(())
    }

    /// Streak reaper rule: no recorded activity within 24 hours resets the
    /// current streak. Applied to cache and durable store together.
    pub fn reset_streak_if_inactive(&self, user_id: &str) -> bool {
        let active = self
            .kv
            .get(&activity_key(user_id))
            .ok()
            .flatten()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(&ts).ok())
            .is_some_and(|ts| {
                chrono::Utc::now().signed_duration_since(ts) < chrono::Duration::hours(24)
            });
        if active {
            return false;
        }
        let key = stats_key(user_id);
        if self.kv.exists(&key).unwrap_or(false) {
            let _ = self.kv.hset(&key, "currentStreak", "0");
        }
        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "UPDATE user_stats SET current_streak = 0 WHERE user_id = ?1",
            params![user_id],
        )
        .ok();
        true
    }

    /// Every user known to the durable store; the reaper sweeps these.
    pub fn all_stat_user_ids(&self) -> Vec<String> {
        let conn = self.db.conn.lock().unwrap();
        let Ok(mut stmt) = conn.prepare("SELECT user_id FROM user_stats") else {
            return vec![];
        };
        stmt.query_map([], |row| row.get(0))
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    fn cache_stats(&self, stats: &UserStats) -> KvResult<()> {
        let key = stats_key(&stats.user_id);
        let fields: Vec<(&str, String)> = vec![
            ("totalQuizzesTaken", stats.total_quizzes_taken.to_string()),
            ("totalQuizzesCreated", stats.total_quizzes_created.to_string()),
            ("totalPoints", stats.total_points.to_string()),
            ("currentStreak", stats.current_streak.to_string()),
            ("longestStreak", stats.longest_streak.to_string()),
            ("averageScore", stats.average_score.to_string()),
            ("totalTimeSpent", stats.total_time_spent.to_string()),
            ("level", stats.level.to_string()),
            ("experience", stats.experience.to_string()),
        ];
        self.kv.hset_multi(&key, &fields)?;
        if let Some(date) = &stats.last_quiz_date {
            self.kv.hset(&key, "lastQuizDate", date)?;
        }
        self.kv.expire(&key, STATS_TTL)?;
        Ok(())
    }

    fn load_from_db(&self, user_id: &str) -> Option<UserStats> {
        let conn = self.db.conn.lock().unwrap();
        conn.query_row(
            "SELECT total_quizzes_taken, total_quizzes_created, total_points, current_streak,
                    longest_streak, last_quiz_date, average_score, total_time_spent, level,
                    experience, favorite_categories
             FROM user_stats WHERE user_id = ?1",
            params![user_id],
            |row| {
                let favorites: String = row.get(10)?;
                Ok(UserStats {
                    user_id: user_id.to_string(),
                    total_quizzes_taken: row.get(0)?,
                    total_quizzes_created: row.get(1)?,
                    total_points: row.get(2)?,
                    current_streak: row.get(3)?,
                    longest_streak: row.get(4)?,
                    last_quiz_date: row.get(5)?,
                    average_score: row.get(6)?,
                    total_time_spent: row.get(7)?,
                    level: row.get(8)?,
                    experience: row.get(9)?,
                    favorite_categories: serde_json::from_str(&favorites).unwrap_or_default(),
                })
            },
        )
        .ok()
    }
}

pub fn level_for(experience: f64) -> i64 {
    (experience / 100.0).floor() as i64 + 1
}

/// Rebuild a `UserStats` from its cache hash. Unknown fields are the
/// per-category counters; the top three become `favoriteCategories`.
pub fn stats_from_hash(user_id: &str, hash: &HashMap<String, String>) -> UserStats {
    let int = |field: &str| -> i64 {
        hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0)
    };
    let float = |field: &str| -> f64 {
        hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0.0)
    };

    let mut categories: Vec<(String, i64)> = hash
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix("cat:")
                .map(|c| (c.to_string(), v.parse().unwrap_or(0)))
        })
        .collect();
    categories.sort_by(|(ca, na), (cb, nb)| nb.cmp(na).then(ca.cmp(cb)));

    UserStats {
        user_id: user_id.to_string(),
        total_quizzes_taken: int("totalQuizzesTaken"),
        total_quizzes_created: int("totalQuizzesCreated"),
        total_points: float("totalPoints"),
        current_streak: int("currentStreak"),
        longest_streak: int("longestStreak"),
        last_quiz_date: hash.get("lastQuizDate").cloned(),
        average_score: int("averageScore"),
        total_time_spent: int("totalTimeSpent"),
        level: int("level").max(1),
        experience: float("experience"),
        favorite_categories: categories.into_iter().take(3).map(|(c, _)| c).collect(),
    }
}
