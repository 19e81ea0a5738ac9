use rusqlite::{Connection, params};
use std::sync::Mutex;

/// Durable store for long-lived records: users, stats spill, achievement
/// definitions and unlocks, meeting history, and the moderation ledger.
/// Unique indexes carry the at-most-once constraints the engines rely on.
pub struct Db {
    pub conn: Mutex<Connection>,
}

/// Generate a short meeting room code: 8 uppercase hex characters.
pub fn generate_room_code() -> String {
    format!("{:032X}", uuid::Uuid::new_v4().as_u128())
        .chars()
        .take(8)
        .collect()
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE,
                role TEXT NOT NULL DEFAULT 'Student',
                status TEXT NOT NULL DEFAULT 'offline',
                last_seen TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS achievements (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                icon TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL,
                criteria_target INTEGER,
                criteria_score INTEGER,
                criteria_time_limit INTEGER,
                criteria_category TEXT,
                criteria_subtype TEXT,
                rarity TEXT NOT NULL DEFAULT 'common',
                points INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_achievements (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                achievement_id TEXT NOT NULL REFERENCES achievements(id) ON DELETE CASCADE,
                progress INTEGER NOT NULL DEFAULT 0,
                is_completed INTEGER NOT NULL DEFAULT 0,
                unlocked_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, achievement_id)
            );
            CREATE INDEX IF NOT EXISTS idx_user_achievements_user ON user_achievements(user_id);

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id TEXT PRIMARY KEY,
                total_quizzes_taken INTEGER NOT NULL DEFAULT 0,
                total_quizzes_created INTEGER NOT NULL DEFAULT 0,
                total_points REAL NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_quiz_date TEXT,
                average_score INTEGER NOT NULL DEFAULT 0,
                total_time_spent INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                experience REAL NOT NULL DEFAULT 0,
                favorite_categories TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_user_stats_points ON user_stats(total_points);

            CREATE TABLE IF NOT EXISTS meetings (
                room_id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                host_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'scheduled',
                max_participants INTEGER NOT NULL DEFAULT 50,
                settings TEXT NOT NULL DEFAULT '{}',
                topology TEXT NOT NULL DEFAULT 'mesh',
                scheduled_at TEXT,
                started_at TEXT,
                ended_at TEXT,
                duration_secs INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_meetings_host ON meetings(host_id);
            CREATE INDEX IF NOT EXISTS idx_meetings_status ON meetings(status);

            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                reporter_id TEXT NOT NULL,
                reported_user_id TEXT,
                reported_content_id TEXT,
                content_type TEXT NOT NULL,
                reason TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL DEFAULT 'medium',
                moderator_id TEXT,
                moderator_notes TEXT,
                action TEXT NOT NULL DEFAULT 'none',
                evidence TEXT NOT NULL DEFAULT '[]',
                resolved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status);
            CREATE INDEX IF NOT EXISTS idx_reports_reporter ON reports(reporter_id);

            CREATE TABLE IF NOT EXISTS moderation_actions (
                id TEXT PRIMARY KEY,
                moderator_id TEXT NOT NULL,
                target_user_id TEXT NOT NULL,
                action_type TEXT NOT NULL,
                reason TEXT NOT NULL,
                duration_value INTEGER,
                duration_unit TEXT,
                expires_at TEXT,
                related_report_id TEXT,
                severity TEXT NOT NULL DEFAULT 'medium',
                is_active INTEGER NOT NULL DEFAULT 1,
                revoked_by TEXT,
                revoked_at TEXT,
                revoke_reason TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_actions_target ON moderation_actions(target_user_id);
            CREATE INDEX IF NOT EXISTS idx_actions_active ON moderation_actions(is_active);

            CREATE TABLE IF NOT EXISTS banned_users (
                user_id TEXT PRIMARY KEY,
                action_id TEXT NOT NULL,
                moderator_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                ban_type TEXT NOT NULL,
                expires_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS appeals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                action_id TEXT NOT NULL REFERENCES moderation_actions(id) ON DELETE CASCADE,
                reason TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                reviewed_by TEXT,
                review_notes TEXT,
                reviewed_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_appeals_action ON appeals(action_id);
            CREATE INDEX IF NOT EXISTS idx_appeals_user ON appeals(user_id);",
        )
        .expect("Failed to run migrations");
    }

    /// Make sure a user row exists for an id seen on an inbound event.
    /// Event producers own the identity space; this backfills the minimal
    /// record so metadata joins never miss.
    pub fn ensure_user(&self, user_id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![user_id, user_id, &now],
        )
        .ok();
    }

    pub fn user_name(&self, user_id: &str) -> Option<String> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT name FROM users WHERE id = ?1",
            params![user_id],
            |r| r.get(0),
        )
        .ok()
    }
}
