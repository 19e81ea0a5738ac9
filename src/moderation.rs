use crate::db::Db;
use crate::error::{ApiError, ErrorKind};
use crate::models::{
    ACTION_TYPES, CONTENT_TYPES, CreateAction, CreateAppeal, CreateReport, DURATION_UNITS,
    REPORT_REASONS, ReviewAppeal, UpdateReportStatus,
};
use crate::notify::SharedNotifier;
use rusqlite::{Row, params};
use std::sync::Arc;

/// Report -> action -> appeal state machine with auto-prioritization,
/// time-bounded enforcement, and read-time expiry of lapsed bans.
#[derive(Clone)]
pub struct ModerationEngine {
    db: Arc<Db>,
    notifier: SharedNotifier,
}

impl ModerationEngine {
    pub fn new(db: Arc<Db>, notifier: SharedNotifier) -> Self {
        ModerationEngine { db, notifier }
    }

    // --- reports ---

    pub fn create_report(
        &self,
        reporter_id: &str,
        body: &CreateReport,
    ) -> Result<serde_json::Value, ApiError> {
        let mut errors = vec![];
        if !CONTENT_TYPES.contains(&body.content_type.as_str()) {
            errors.push(format!("unknown content type '{}'", body.content_type));
        }
        if !REPORT_REASONS.contains(&body.reason.as_str()) {
            errors.push(format!("unknown reason '{}'", body.reason));
        }
        if body.description.len() > 1000 {
            errors.push("description must be at most 1000 characters".to_string());
        }
        if body.reported_user_id.is_none() && body.reported_content_id.is_none() {
            errors.push("either reportedUserId or reportedContentId is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        let conn = self.db.conn.lock().unwrap();

        // One open report per (reporter, content).
        if let Some(content_id) = &body.reported_content_id {
            let duplicate: Option<String> = conn
                .query_row(
                    "SELECT id FROM reports WHERE reporter_id = ?1 AND reported_content_id = ?2
                     AND status IN ('pending', 'reviewing')",
                    params![reporter_id, content_id],
                    |r| r.get(0),
                )
                .ok();
            if duplicate.is_some() {
                return Err(ApiError::conflict(
                    "You already have an open report for this content",
                ));
            }
        }

        let priority = auto_priority(&body.reason);
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO reports (id, reporter_id, reported_user_id, reported_content_id,
                content_type, reason, description, status, priority, evidence, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10, ?10)",
            params![
                id,
                reporter_id,
                body.reported_user_id,
                body.reported_content_id,
                body.content_type,
                body.reason,
                body.description,
                priority,
                serde_json::to_string(&body.evidence).unwrap_or_else(|_| "[]".into()),
                &now,
            ],
        )
        .map_err(ApiError::from)?;

        Ok(serde_json::json!({
            "reportId": id,
            "status": "pending",
            "priority": priority,
        }))
    }

    pub fn list_reports(
        &self,
        status: Option<&str>,
        priority: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, reporter_id, reported_user_id, reported_content_id, content_type,
                        reason, description, status, priority, moderator_id, moderator_notes,
                        action, evidence, resolved_at, created_at
                 FROM reports
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR priority = ?2)
                 ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![status, priority, limit, offset], report_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn reports_by_reporter(&self, reporter_id: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, reporter_id, reported_user_id, reported_content_id, content_type,
                        reason, description, status, priority, moderator_id, moderator_notes,
                        action, evidence, resolved_at, created_at
                 FROM reports WHERE reporter_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![reporter_id], report_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn report_stats(&self) -> Result<serde_json::Value, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let count = |sql: &str| -> i64 {
            conn.query_row(sql, [], |r| r.get(0)).unwrap_or(0)
        };
        Ok(serde_json::json!({
            "total": count("SELECT COUNT(*) FROM reports"),
            "pending": count("SELECT COUNT(*) FROM reports WHERE status = 'pending'"),
            "reviewing": count("SELECT COUNT(*) FROM reports WHERE status = 'reviewing'"),
            "resolved": count("SELECT COUNT(*) FROM reports WHERE status = 'resolved'"),
            "dismissed": count("SELECT COUNT(*) FROM reports WHERE status = 'dismissed'"),
            "critical": count("SELECT COUNT(*) FROM reports WHERE priority = 'critical' AND status IN ('pending','reviewing')"),
            "high": count("SELECT COUNT(*) FROM reports WHERE priority = 'high' AND status IN ('pending','reviewing')"),
        }))
    }

    /// `pending → reviewing → {resolved | dismissed}`; resolved and
    /// dismissed are terminal. Resolution stamps `resolvedAt`.
    pub fn update_report_status(
        &self,
        report_id: &str,
        moderator_id: &str,
        body: &UpdateReportStatus,
    ) -> Result<serde_json::Value, ApiError> {
        if !["pending", "reviewing", "resolved", "dismissed"].contains(&body.status.as_str()) {
            return Err(ApiError::validation(vec![format!(
                "unknown report status '{}'",
                body.status
            )]));
        }
        let conn = self.db.conn.lock().unwrap();
        let current: String = conn
            .query_row(
                "SELECT status FROM reports WHERE id = ?1",
                params![report_id],
                |r| r.get(0),
            )
            .map_err(|_| ApiError::not_found("Report not found"))?;
        if matches!(current.as_str(), "resolved" | "dismissed") {
            return Err(ApiError::conflict(format!(
                "Report is already {current}"
            )));
        }

        let resolved_at = if matches!(body.status.as_str(), "resolved" | "dismissed") {
            Some(chrono::Utc::now().to_rfc3339())
        } else {
            None
        };
        conn.execute(
            "UPDATE reports SET status = ?2, moderator_id = ?3,
                moderator_notes = COALESCE(?4, moderator_notes),
                action = COALESCE(?5, action),
                resolved_at = COALESCE(?6, resolved_at),
                updated_at = ?7
             WHERE id = ?1",
            params![
                report_id,
                body.status,
                moderator_id,
                body.moderator_notes,
                body.action,
                resolved_at,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(ApiError::from)?;
        Ok(serde_json::json!({ "reportId": report_id, "status": body.status }))
    }

    pub fn bulk_update_reports(
        &self,
        moderator_id: &str,
        report_ids: &[String],
        status: &str,
        notes: Option<&str>,
    ) -> Result<usize, ApiError> {
        let mut updated = 0;
        for id in report_ids {
            let body = UpdateReportStatus {
                status: status.to_string(),
                moderator_notes: notes.map(String::from),
                action: None,
            };
            if self.update_report_status(id, moderator_id, &body).is_ok() {
                updated += 1;
            }
        }
        Ok(updated)
    }

    // --- actions ---

    pub fn create_action(
        &self,
        moderator_id: &str,
        body: &CreateAction,
    ) -> Result<serde_json::Value, ApiError> {
        if moderator_id == body.target_user_id {
            return Err(ApiError::forbidden(
                "Moderators cannot apply actions to their own account",
            ));
        }
        let mut errors = vec![];
        if !ACTION_TYPES.contains(&body.action_type.as_str()) {
            errors.push(format!("unknown action type '{}'", body.action_type));
        }
        if body.reason.trim().is_empty() {
            errors.push("reason is required".to_string());
        }
        if let Some(d) = &body.duration {
            if !DURATION_UNITS.contains(&d.unit.as_str()) {
                errors.push(format!("unknown duration unit '{}'", d.unit));
            } else if d.unit != "permanent" && d.value <= 0 {
                errors.push("duration value must be positive".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        let expires_at = body.duration.as_ref().and_then(expiry_from_duration);
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        {
            let conn = self.db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO moderation_actions (id, moderator_id, target_user_id, action_type,
                    reason, duration_value, duration_unit, expires_at, related_report_id,
                    severity, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)",
                params![
                    id,
                    moderator_id,
                    body.target_user_id,
                    body.action_type,
                    body.reason,
                    body.duration.as_ref().map(|d| d.value),
                    body.duration.as_ref().map(|d| d.unit.clone()),
                    expires_at,
                    body.related_report_id,
                    body.severity,
                    &now,
                ],
            )
            .map_err(ApiError::from)?;

            if body.action_type == "ban" {
                let ban_type = if expires_at.is_some() { "temporary" } else { "permanent" };
                conn.execute(
                    "INSERT INTO banned_users (user_id, action_id, moderator_id, reason, ban_type,
                        expires_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(user_id) DO UPDATE SET
                        action_id = excluded.action_id,
                        moderator_id = excluded.moderator_id,
                        reason = excluded.reason,
                        ban_type = excluded.ban_type,
                        expires_at = excluded.expires_at,
                        created_at = excluded.created_at",
                    params![
                        body.target_user_id,
                        id,
                        moderator_id,
                        body.reason,
                        ban_type,
                        expires_at,
                        &now,
                    ],
                )
                .map_err(ApiError::from)?;
            }
        }

        self.notifier.moderation_action(
            &body.target_user_id,
            &body.action_type,
            expires_at.as_deref(),
            &id,
        );

        Ok(serde_json::json!({
            "actionId": id,
            "actionType": body.action_type,
            "targetUserId": body.target_user_id,
            "expiresAt": expires_at,
            "isActive": true,
        }))
    }

    pub fn list_actions(
        &self,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let sql = if active_only {
            "SELECT id, moderator_id, target_user_id, action_type, reason, duration_value,
                    duration_unit, expires_at, related_report_id, severity, is_active,
                    revoked_by, revoked_at, revoke_reason, created_at
             FROM moderation_actions WHERE is_active = 1
             ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        } else {
            "SELECT id, moderator_id, target_user_id, action_type, reason, duration_value,
                    duration_unit, expires_at, related_report_id, severity, is_active,
                    revoked_by, revoked_at, revoke_reason, created_at
             FROM moderation_actions ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        };
        let mut stmt = conn.prepare(sql).map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![limit, offset], action_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn actions_for_user(&self, user_id: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, moderator_id, target_user_id, action_type, reason, duration_value,
                        duration_unit, expires_at, related_report_id, severity, is_active,
                        revoked_by, revoked_at, revoke_reason, created_at
                 FROM moderation_actions WHERE target_user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![user_id], action_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn revoke_action(
        &self,
        action_id: &str,
        revoker_id: &str,
        reason: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let (target_user_id, action_type) = {
            let conn = self.db.conn.lock().unwrap();
            let (target, action_type, is_active): (String, String, i64) = conn
                .query_row(
                    "SELECT target_user_id, action_type, is_active
                     FROM moderation_actions WHERE id = ?1",
                    params![action_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .map_err(|_| ApiError::not_found("Action not found"))?;
            if is_active == 0 {
                return Err(ApiError::conflict("Action is already inactive"));
            }
            conn.execute(
                "UPDATE moderation_actions SET is_active = 0, revoked_by = ?2,
                    revoked_at = ?3, revoke_reason = ?4
                 WHERE id = ?1",
                params![action_id, revoker_id, chrono::Utc::now().to_rfc3339(), reason],
            )
            .map_err(ApiError::from)?;
            if action_type == "ban" {
                conn.execute(
                    "DELETE FROM banned_users WHERE action_id = ?1",
                    params![action_id],
                )
                .map_err(ApiError::from)?;
            }
            (target, action_type)
        };

        self.notifier
            .moderation_revoked(&target_user_id, &action_type, action_id);
        Ok(serde_json::json!({
            "actionId": action_id,
            "isActive": false,
            "revokedBy": revoker_id,
        }))
    }

    /// Ban lookup with read-time expiry: a lapsed temporary ban is
    /// deleted, its actions deactivated, and the caller sees not-banned.
    pub fn is_banned(&self, user_id: &str) -> Result<Option<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let row: Option<(String, String, String, Option<String>, String)> = conn
            .query_row(
                "SELECT action_id, reason, ban_type, expires_at, created_at
                 FROM banned_users WHERE user_id = ?1",
                params![user_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .ok();
        let Some((action_id, reason, ban_type, expires_at, created_at)) = row else {
            return Ok(None);
        };

        if ban_type == "temporary"
            && let Some(expiry) = expires_at
                .as_deref()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            && chrono::Utc::now() >= expiry.with_timezone(&chrono::Utc)
        {
            conn.execute(
                "DELETE FROM banned_users WHERE user_id = ?1",
                params![user_id],
            )
            .map_err(ApiError::from)?;
            conn.execute(
                "UPDATE moderation_actions SET is_active = 0
                 WHERE target_user_id = ?1 AND action_type = 'ban' AND is_active = 1",
                params![user_id],
            )
            .map_err(ApiError::from)?;
            return Ok(None);
        }

        Ok(Some(serde_json::json!({
            "userId": user_id,
            "actionId": action_id,
            "reason": reason,
            "banType": ban_type,
            "expiresAt": expires_at,
            "bannedAt": created_at,
        })))
    }

    pub fn banned_users(&self) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, action_id, moderator_id, reason, ban_type, expires_at, created_at
                 FROM banned_users ORDER BY created_at DESC",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(serde_json::json!({
                    "userId": row.get::<_, String>(0)?,
                    "actionId": row.get::<_, String>(1)?,
                    "moderatorId": row.get::<_, String>(2)?,
                    "reason": row.get::<_, String>(3)?,
                    "banType": row.get::<_, String>(4)?,
                    "expiresAt": row.get::<_, Option<String>>(5)?,
                    "bannedAt": row.get::<_, String>(6)?,
                }))
            })
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Scheduled reconciliation: deactivate every active action whose
    /// `expiresAt` has passed and drop the matching ban mirrors.
    pub fn expire_lapsed_actions(&self) -> Result<usize, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.conn.lock().unwrap();
        let lapsed: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT id FROM moderation_actions
                     WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at <= ?1",
                )
                .map_err(ApiError::from)?;
            stmt.query_map(params![&now], |r| r.get(0))
                .map_err(ApiError::from)?
                .filter_map(|r| r.ok())
                .collect()
        };
        for action_id in &lapsed {
            conn.execute(
                "UPDATE moderation_actions SET is_active = 0 WHERE id = ?1",
                params![action_id],
            )
            .map_err(ApiError::from)?;
            conn.execute(
                "DELETE FROM banned_users WHERE action_id = ?1",
                params![action_id],
            )
            .map_err(ApiError::from)?;
        }
        Ok(lapsed.len())
    }

    // --- appeals ---

    pub fn create_appeal(
        &self,
        user_id: &str,
        body: &CreateAppeal,
    ) -> Result<serde_json::Value, ApiError> {
        if body.reason.trim().is_empty() || body.reason.len() > 2000 {
            return Err(ApiError::validation(vec![
                "reason is required and must be at most 2000 characters".to_string(),
            ]));
        }
        let conn = self.db.conn.lock().unwrap();
        let (target_user_id, is_active): (String, i64) = conn
            .query_row(
                "SELECT target_user_id, is_active FROM moderation_actions WHERE id = ?1",
                params![body.action_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(|_| ApiError::not_found("Action not found"))?;
        if target_user_id != user_id {
            return Err(ApiError::forbidden("Only the action's target may appeal it"));
        }
        if is_active == 0 {
            return Err(ApiError::conflict("Action is no longer active"));
        }
        let in_flight: Option<String> = conn
            .query_row(
                "SELECT id FROM appeals WHERE action_id = ?1 AND status IN ('pending', 'under_review')",
                params![body.action_id],
                |r| r.get(0),
            )
            .ok();
        if in_flight.is_some() {
            return Err(ApiError::conflict("An appeal for this action is already open"));
        }

        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO appeals (id, user_id, action_id, reason, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![id, user_id, body.action_id, body.reason, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(ApiError::from)?;
        Ok(serde_json::json!({ "appealId": id, "status": "pending" }))
    }

    pub fn list_appeals(&self, status: Option<&str>) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, action_id, reason, status, reviewed_by, review_notes,
                        reviewed_at, created_at
                 FROM appeals WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![status], appeal_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn appeals_for_user(&self, user_id: &str) -> Result<Vec<serde_json::Value>, ApiError> {
        let conn = self.db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, action_id, reason, status, reviewed_by, review_notes,
                        reviewed_at, created_at
                 FROM appeals WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(ApiError::from)?;
        let rows = stmt
            .query_map(params![user_id], appeal_from_row)
            .map_err(ApiError::from)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// `pending → under_review → {approved | rejected}`. Approval revokes
    /// the underlying action.
    pub fn review_appeal(
        &self,
        appeal_id: &str,
        reviewer_id: &str,
        body: &ReviewAppeal,
    ) -> Result<serde_json::Value, ApiError> {
        if !["under_review", "approved", "rejected"].contains(&body.status.as_str()) {
            return Err(ApiError::validation(vec![format!(
                "unknown appeal status '{}'",
                body.status
            )]));
        }
        let action_id = {
            let conn = self.db.conn.lock().unwrap();
            let (action_id, current): (String, String) = conn
                .query_row(
                    "SELECT action_id, status FROM appeals WHERE id = ?1",
                    params![appeal_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .map_err(|_| ApiError::not_found("Appeal not found"))?;
            if matches!(current.as_str(), "approved" | "rejected") {
                return Err(ApiError::conflict(format!("Appeal is already {current}")));
            }
            conn.execute(
                "UPDATE appeals SET status = ?2, reviewed_by = ?3,
                    review_notes = COALESCE(?4, review_notes), reviewed_at = ?5
                 WHERE id = ?1",
                params![
                    appeal_id,
                    body.status,
                    reviewer_id,
                    body.review_notes,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(ApiError::from)?;
            action_id
        };

        if body.status == "approved" {
            // The action may already have expired; an approval should
            // still report success for the appeal itself.
            match self.revoke_action(&action_id, reviewer_id, "Appeal approved") {
                Ok(_) => {}
                Err(e) if e.kind == ErrorKind::Conflict => {}
                Err(e) => return Err(e),
            }
        }
        Ok(serde_json::json!({ "appealId": appeal_id, "status": body.status }))
    }
}

/// Severity buckets mandated by the intake rules.
pub fn auto_priority(reason: &str) -> &'static str {
    match reason {
        "hate_speech" | "violence" | "harassment" => "high",
        "spam" => "low",
        _ => "medium",
    }
}

fn expiry_from_duration(duration: &crate::models::ActionDuration) -> Option<String> {
    let delta = match duration.unit.as_str() {
        "hours" => chrono::Duration::hours(duration.value),
        "days" => chrono::Duration::days(duration.value),
        "weeks" => chrono::Duration::weeks(duration.value),
        "months" => chrono::Duration::days(duration.value * 30),
        _ => return None, // permanent
    };
    Some((chrono::Utc::now() + delta).to_rfc3339())
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let evidence: String = row.get(12)?;
    Ok(serde_json::json!({
        "id": row.get::<_, String>(0)?,
        "reporterId": row.get::<_, String>(1)?,
        "reportedUserId": row.get::<_, Option<String>>(2)?,
        "reportedContentId": row.get::<_, Option<String>>(3)?,
        "contentType": row.get::<_, String>(4)?,
        "reason": row.get::<_, String>(5)?,
        "description": row.get::<_, String>(6)?,
        "status": row.get::<_, String>(7)?,
        "priority": row.get::<_, String>(8)?,
        "moderatorId": row.get::<_, Option<String>>(9)?,
        "moderatorNotes": row.get::<_, Option<String>>(10)?,
        "action": row.get::<_, String>(11)?,
        "evidence": serde_json::from_str::<serde_json::Value>(&evidence)
            .unwrap_or(serde_json::json!([])),
        "resolvedAt": row.get::<_, Option<String>>(13)?,
        "createdAt": row.get::<_, String>(14)?,
    }))
}

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "id": row.get::<_, String>(0)?,
        "moderatorId": row.get::<_, String>(1)?,
        "targetUserId": row.get::<_, String>(2)?,
        "actionType": row.get::<_, String>(3)?,
        "reason": row.get::<_, String>(4)?,
        "durationValue": row.get::<_, Option<i64>>(5)?,
        "durationUnit": row.get::<_, Option<String>>(6)?,
        "expiresAt": row.get::<_, Option<String>>(7)?,
        "relatedReportId": row.get::<_, Option<String>>(8)?,
        "severity": row.get::<_, String>(9)?,
        "isActive": row.get::<_, i64>(10)? != 0,
        "revokedBy": row.get::<_, Option<String>>(11)?,
        "revokedAt": row.get::<_, Option<String>>(12)?,
        "revokeReason": row.get::<_, Option<String>>(13)?,
        "createdAt": row.get::<_, String>(14)?,
    }))
}

fn appeal_from_row(row: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "id": row.get::<_, String>(0)?,
        "userId": row.get::<_, String>(1)?,
        "actionId": row.get::<_, String>(2)?,
        "reason": row.get::<_, String>(3)?,
        "status": row.get::<_, String>(4)?,
        "reviewedBy": row.get::<_, Option<String>>(5)?,
        "reviewNotes": row.get::<_, Option<String>>(6)?,
        "reviewedAt": row.get::<_, Option<String>>(7)?,
        "createdAt": row.get::<_, String>(8)?,
    }))
}
