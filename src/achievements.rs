use crate::db::Db;
use crate::error::ApiError;
use crate::kv::Kv;
use crate::models::{Achievement, AchievementCriteria, CreateAchievement, UserAchievement};
use crate::models::{ACHIEVEMENT_TYPES, RARITIES, UserStats};
use crate::notify::SharedNotifier;
use rusqlite::{Row, params};
use std::sync::Arc;

/// Event context an achievement check runs against. `kind` mirrors the
/// producing endpoint; per-event numbers feed the score and speed criteria.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementEvent {
    pub kind: String,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub total_time_taken: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl AchievementEvent {
    pub fn of_kind(kind: &str) -> Self {
        AchievementEvent {
            kind: kind.to_string(),
            percentage: None,
            total_time_taken: None,
            category: None,
        }
    }
}

/// Criteria evaluator and at-most-once unlocker. Unlock uniqueness is the
/// `UNIQUE(user_id, achievement_id)` constraint; completed rows never
/// change again.
#[derive(Clone)]
pub struct AchievementEngine {
    kv: Kv,
    db: Arc<Db>,
    notifier: SharedNotifier,
}

impl AchievementEngine {
    pub fn new(kv: Kv, db: Arc<Db>, notifier: SharedNotifier) -> Self {
        AchievementEngine { kv, db, notifier }
    }

    pub fn list_definitions(&self, active_only: bool) -> Result<Vec<Achievement>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let sql = if active_only {
            "SELECT id, name, description, icon, type, criteria_target, criteria_score,
                    criteria_time_limit, criteria_category, criteria_subtype, rarity, points, is_active
             FROM achievements WHERE is_active = 1 ORDER BY points ASC, name ASC"
        } else {
            "SELECT id, name, description, icon, type, criteria_target, criteria_score,
                    criteria_time_limit, criteria_category, criteria_subtype, rarity, points, is_active
             FROM achievements ORDER BY points ASC, name ASC"
        };
        let mut stmt = conn.prepare(sql).map_err(ApiError::from)?;
        let defs = stmt
            .query_map([], achievement_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(defs)
    }

    pub fn create_definition(&self, body: &CreateAchievement) -> Result<Achievement, ApiError> {
        let mut errors = vec![];
        if body.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if !ACHIEVEMENT_TYPES.contains(&body.achievement_type.as_str()) {
            errors.push(format!("unknown achievement type '{}'", body.achievement_type));
        }
        if !RARITIES.contains(&body.rarity.as_str()) {
            errors.push(format!("unknown rarity '{}'", body.rarity));
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        let achievement = Achievement {
            id: uuid::Uuid::new_v4().to_string(),
            name: body.name.trim().to_string(),
            description: body.description.clone(),
            icon: body.icon.clone(),
            achievement_type: body.achievement_type.clone(),
            criteria: body.criteria.clone(),
            rarity: body.rarity.clone(),
            points: body.points,
            is_active: true,
        };
        self.insert_definition(&achievement)?;
        Ok(achievement)
    }

    pub fn update_definition(
        &self,
        id: &str,
        body: &CreateAchievement,
    ) -> Result<Achievement, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE achievements SET name = ?2, description = ?3, icon = ?4, type = ?5,
                    criteria_target = ?6, criteria_score = ?7, criteria_time_limit = ?8,
                    criteria_category = ?9, criteria_subtype = ?10, rarity = ?11, points = ?12
                 WHERE id = ?1",
                params![
                    id,
                    body.name.trim(),
                    body.description,
                    body.icon,
                    body.achievement_type,
                    body.criteria.target,
                    body.criteria.score,
                    body.criteria.time_limit,
                    body.criteria.category,
                    body.criteria.subtype,
                    body.rarity,
                    body.points,
                ],
            )
            .map_err(ApiError::from)?;
        if changed == 0 {
            return Err(ApiError::not_found("Achievement not found"));
        }
        drop(conn);
        self.get_definition(id)?
            .ok_or_else(|| ApiError::not_found("Achievement not found"))
    }

    pub fn delete_definition(&self, id: &str) -> Result<(), ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM achievements WHERE id = ?1", params![id])
            .map_err(ApiError::from)?;
        if changed == 0 {
            return Err(ApiError::not_found("Achievement not found"));
        }
        Ok(())
    }

    pub fn get_definition(&self, id: &str) -> Result<Option<Achievement>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let def = conn
            .query_row(
                "SELECT id, name, description, icon, type, criteria_target, criteria_score,
                        criteria_time_limit, criteria_category, criteria_subtype, rarity, points, is_active
                 FROM achievements WHERE id = ?1",
                params![id],
                achievement_from_row,
            )
            .ok();
        Ok(def)
    }

    /// Install the stock definitions, skipping any name that already
    /// exists. Returns how many were inserted.
    pub fn seed_defaults(&self) -> Result<usize, ApiError> {
        let mut inserted = 0;
        for def in default_definitions() {
            match self.insert_definition(&def) {
                Ok(()) => inserted += 1,
                Err(e) if e.kind == crate::error::ErrorKind::Conflict => {}
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }

    pub fn user_achievements(
        &self,
        user_id: &str,
        completed_only: bool,
    ) -> Result<Vec<UserAchievement>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let sql = if completed_only {
            "SELECT a.id, a.name, a.description, a.icon, a.rarity, a.points,
                    ua.progress, ua.is_completed, ua.unlocked_at
             FROM user_achievements ua JOIN achievements a ON a.id = ua.achievement_id
             WHERE ua.user_id = ?1 AND ua.is_completed = 1 ORDER BY ua.unlocked_at ASC"
        } else {
            "SELECT a.id, a.name, a.description, a.icon, a.rarity, a.points,
                    ua.progress, ua.is_completed, ua.unlocked_at
             FROM user_achievements ua JOIN achievements a ON a.id = ua.achievement_id
             WHERE ua.user_id = ?1 ORDER BY ua.created_at ASC"
        };
        let mut stmt = conn.prepare(sql).map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(UserAchievement {
                    achievement_id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    icon: row.get(3)?,
                    rarity: row.get(4)?,
                    points: row.get(5)?,
                    progress: row.get(6)?,
                    is_completed: row.get::<_, i64>(7)? != 0,
                    unlocked_at: row.get(8)?,
                })
            })
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Evaluate every active definition the user has not completed and
    /// unlock the ones whose criteria now hold. Returns the new unlocks.
    pub fn run_check(
        &self,
        user_id: &str,
        event: &AchievementEvent,
        stats: &UserStats,
    ) -> Result<Vec<Achievement>, ApiError> {
        let candidates: Vec<Achievement> = {
            let conn = self.db.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT a.id, a.name, a.description, a.icon, a.type, a.criteria_target,
                            a.criteria_score, a.criteria_time_limit, a.criteria_category,
                            a.criteria_subtype, a.rarity, a.points, a.is_active
                     FROM achievements a
                     WHERE a.is_active = 1 AND NOT EXISTS (
                        SELECT 1 FROM user_achievements ua
                        WHERE ua.achievement_id = a.id AND ua.user_id = ?1 AND ua.is_completed = 1
                     )",
                )
                .map_err(ApiError::from)?;
            stmt.query_map(params![user_id], achievement_from_row)
                .map_err(ApiError::from)?
                .filter_map(|r| r.ok())
                .collect()
        };

        let mut unlocked = vec![];
        for def in candidates {
            if self.criteria_met(&def, user_id, event, stats) && self.unlock(user_id, &def)? {
                unlocked.push(def);
            }
        }
        Ok(unlocked)
    }

    /// Persist an unlock. Returns false when the user already holds the
    /// achievement; duplicate attempts are successes that change nothing.
    pub fn unlock(&self, user_id: &str, def: &Achievement) -> Result<bool, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();
        let newly_unlocked = {
            let conn = self.db.conn.lock().unwrap();
            let already: Option<i64> = conn
                .query_row(
                    "SELECT is_completed FROM user_achievements
                     WHERE user_id = ?1 AND achievement_id = ?2",
                    params![user_id, def.id],
                    |r| r.get(0),
                )
                .ok();
            match already {
                Some(1) => false,
                Some(_) => {
                    conn.execute(
                        "UPDATE user_achievements SET progress = 100, is_completed = 1, unlocked_at = ?3
                         WHERE user_id = ?1 AND achievement_id = ?2 AND is_completed = 0",
                        params![user_id, def.id, &now],
                    )
                    .map_err(ApiError::from)?
                        > 0
                }
                None => {
                    let result = conn.execute(
                        "INSERT INTO user_achievements
                            (id, user_id, achievement_id, progress, is_completed, unlocked_at, created_at)
                         VALUES (?1, ?2, ?3, 100, 1, ?4, ?4)",
                        params![uuid::Uuid::new_v4().to_string(), user_id, def.id, &now],
                    );
                    match result {
                        Ok(_) => true,
                        // Lost a race to another unlock of the same pair.
                        Err(e) if e.to_string().contains("UNIQUE") => false,
                        Err(e) => return Err(ApiError::from(e)),
                    }
                }
            }
        };

        if newly_unlocked {
            let _ = self.kv.sadd(&format!("achievements:{user_id}"), &def.id);
            self.notifier.achievement_unlocked(user_id, def);
        }
        Ok(newly_unlocked)
    }

    /// Progressive accumulation for a `(user, achievement)` pair.
    /// Reaching 100 completes through the normal unlock path.
    pub fn update_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        progress: i64,
    ) -> Result<bool, ApiError> {
        let def = self
            .get_definition(achievement_id)?
            .ok_or_else(|| ApiError::not_found("Achievement not found"))?;
        let progress = progress.clamp(0, 100);
        let _ = self.kv.hset(
            &format!("progress:{user_id}:{achievement_id}"),
            "progress",
            &progress.to_string(),
        );

        if progress >= 100 {
            return self.unlock(user_id, &def);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_achievements (id, user_id, achievement_id, progress, is_completed, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(user_id, achievement_id) DO UPDATE SET progress = ?4
             WHERE user_achievements.is_completed = 0",
            params![uuid::Uuid::new_v4().to_string(), user_id, achievement_id, progress, &now],
        )
        .map_err(ApiError::from)?;
        Ok(false)
    }

    fn criteria_met(
        &self,
        def: &Achievement,
        user_id: &str,
        event: &AchievementEvent,
        stats: &UserStats,
    ) -> bool {
        let c = &def.criteria;
        match def.achievement_type.as_str() {
            "quiz_completion" => c
                .target
                .is_some_and(|t| stats.total_quizzes_taken >= t),
            "score_achievement" => match (event.percentage, c.score) {
                (Some(p), Some(required)) => p >= required as f64,
                _ => false,
            },
            "streak" => c.target.is_some_and(|t| stats.current_streak >= t),
            "speed" => match (event.total_time_taken, c.time_limit) {
                (Some(taken), Some(limit)) => taken <= limit as f64,
                _ => false,
            },
            "category_master" => {
                let (Some(event_cat), Some(required_cat)) = (&event.category, &c.category) else {
                    return false;
                };
                if event_cat != required_cat {
                    return false;
                }
                let count: i64 = self
                    .kv
                    .hget(&format!("userstats:{user_id}"), &format!("cat:{event_cat}"))
                    .ok()
                    .flatten()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                c.target.is_some_and(|t| count >= t)
            }
            "special" => match c.subtype.as_deref() {
                Some("points") => c
                    .target
                    .is_some_and(|t| stats.total_points >= t as f64),
                Some("level") => c.target.is_some_and(|t| stats.level >= t),
                _ => false,
            },
            _ => false,
        }
    }

    fn insert_definition(&self, def: &Achievement) -> Result<(), ApiError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO achievements (id, name, description, icon, type, criteria_target,
                criteria_score, criteria_time_limit, criteria_category, criteria_subtype,
                rarity, points, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13)",
            params![
                def.id,
                def.name,
                def.description,
                def.icon,
                def.achievement_type,
                def.criteria.target,
                def.criteria.score,
                def.criteria.time_limit,
                def.criteria.category,
                def.criteria.subtype,
                def.rarity,
                def.points,
                &now,
            ],
        )
        .map_err(ApiError::from)?;
        Ok(())
    }
}

fn achievement_from_row(row: &Row<'_>) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        achievement_type: row.get(4)?,
        criteria: AchievementCriteria {
            target: row.get(5)?,
            score: row.get(6)?,
            time_limit: row.get(7)?,
            category: row.get(8)?,
            subtype: row.get(9)?,
        },
        rarity: row.get(10)?,
        points: row.get(11)?,
        is_active: row.get::<_, i64>(12)? != 0,
    })
}

fn def(
    name: &str,
    description: &str,
    icon: &str,
    achievement_type: &str,
    criteria: AchievementCriteria,
    rarity: &str,
    points: i64,
) -> Achievement {
    Achievement {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        achievement_type: achievement_type.to_string(),
        criteria,
        rarity: rarity.to_string(),
        points,
        is_active: true,
    }
}

/// The stock catalog installed by the seed endpoint.
pub fn default_definitions() -> Vec<Achievement> {
    let target = |t: i64| AchievementCriteria {
        target: Some(t),
        ..Default::default()
    };
    vec![
        def("First Steps", "Complete your first quiz", "🎯", "quiz_completion", target(1), "common", 10),
        def("Quiz Veteran", "Complete 10 quizzes", "📚", "quiz_completion", target(10), "common", 25),
        def("Century Club", "Complete 100 quizzes", "💯", "quiz_completion", target(100), "epic", 100),
        def(
            "High Achiever",
            "Score 90% or better on a quiz",
            "⭐",
            "score_achievement",
            AchievementCriteria { score: Some(90), ..Default::default() },
            "rare",
            30,
        ),
        def(
            "Perfectionist",
            "Score a perfect 100%",
            "🏆",
            "score_achievement",
            AchievementCriteria { score: Some(100), ..Default::default() },
            "epic",
            50,
        ),
        def("On Fire", "Pass quizzes 3 days in a row", "🔥", "streak", target(3), "common", 20),
        def("Unstoppable", "Pass quizzes 7 days in a row", "⚡", "streak", target(7), "rare", 50),
        def(
            "Speed Demon",
            "Finish a quiz in under a minute",
            "🚀",
            "speed",
            AchievementCriteria { time_limit: Some(60), ..Default::default() },
            "rare",
            40,
        ),
        def(
            "Math Master",
            "Complete 10 math quizzes",
            "🧮",
            "category_master",
            AchievementCriteria {
                target: Some(10),
                category: Some("math".to_string()),
                ..Default::default()
            },
            "rare",
            50,
        ),
        def(
            "Point Collector",
            "Earn 1000 total points",
            "💎",
            "special",
            AchievementCriteria {
                target: Some(1000),
                subtype: Some("points".to_string()),
                ..Default::default()
            },
            "epic",
            75,
        ),
        def(
            "Rising Star",
            "Reach level 10",
            "🌟",
            "special",
            AchievementCriteria {
                target: Some(10),
                subtype: Some("level".to_string()),
                ..Default::default()
            },
            "legendary",
            100,
        ),
    ]
}
