use crate::db::{Db, generate_room_code};
use crate::error::ApiError;
use crate::kv::Kv;
use crate::models::{CreateMeeting, Meeting, MeetingSettings, Participant};
use rusqlite::{Row, params};
use std::sync::Arc;
use std::time::Duration;

fn room_key(room_id: &str) -> String {
    format!("meeting:room:{room_id}")
}

fn participants_key(room_id: &str) -> String {
    format!("meeting:participants:{room_id}")
}

fn socket_key(connection_id: &str) -> String {
    format!("meeting:socket:{connection_id}")
}

/// Room and participant state: live copies in the cache with a rolling
/// TTL, history in the durable store. The socket reverse map is the
/// anchor for disconnect reconciliation.
#[derive(Clone)]
pub struct MeetingStore {
    kv: Kv,
    db: Arc<Db>,
    ttl: Duration,
}

impl MeetingStore {
    pub fn new(kv: Kv, db: Arc<Db>, ttl_secs: u64) -> Self {
        MeetingStore {
            kv,
            db,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Room codes are case-normalized everywhere they enter the system.
    pub fn normalize_room_id(room_id: &str) -> String {
        room_id.trim().to_uppercase()
    }

    pub fn create_meeting(&self, host_id: &str, body: &CreateMeeting) -> Result<Meeting, ApiError> {
        if body.title.trim().is_empty() {
            return Err(ApiError::validation(vec!["title is required".to_string()]));
        }
        if body.max_participants < 2 {
            return Err(ApiError::validation(vec![
                "maxParticipants must be at least 2".to_string(),
            ]));
        }
        let meeting = Meeting {
            room_id: generate_room_code(),
            title: body.title.trim().to_string(),
            host_id: host_id.to_string(),
            status: "scheduled".to_string(),
            max_participants: body.max_participants,
            settings: body.settings.clone(),
            topology: if body.topology == "sfu" { "sfu" } else { "mesh" }.to_string(),
            scheduled_at: body.scheduled_at.clone(),
            started_at: None,
            ended_at: None,
        };

        let now = chrono::Utc::now().to_rfc3339();
        {
            let conn = self.db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO meetings (room_id, title, host_id, status, max_participants,
                    settings, topology, scheduled_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    meeting.room_id,
                    meeting.title,
                    meeting.host_id,
                    meeting.status,
                    meeting.max_participants,
                    serde_json::to_string(&meeting.settings).unwrap_or_else(|_| "{}".into()),
                    meeting.topology,
                    meeting.scheduled_at,
                    &now,
                ],
            )
            .map_err(ApiError::from)?;
        }
        self.cache_meeting(&meeting);
        Ok(meeting)
    }

    /// Resolve a room: cache first, then durable history (re-caching on
    /// the way out).
    pub fn get_meeting(&self, room_id: &str) -> Option<Meeting> {
        let room_id = Self::normalize_room_id(room_id);
        if let Ok(Some(raw)) = self.kv.get(&room_key(&room_id))
            && let Ok(meeting) = serde_json::from_str::<Meeting>(&raw)
        {
            return Some(meeting);
        }
        let meeting = self.load_from_db(&room_id)?;
        self.cache_meeting(&meeting);
        Some(meeting)
    }

    pub fn cache_meeting(&self, meeting: &Meeting) {
        let raw = serde_json::to_string(meeting).unwrap_or_default();
        let _ = self
            .kv
            .set_with_ttl(&room_key(&meeting.room_id), &raw, self.ttl);
    }

    /// Mark a scheduled room active and stamp `startedAt`.
    pub fn activate(&self, meeting: &mut Meeting) {
        let now = chrono::Utc::now().to_rfc3339();
        meeting.status = "active".to_string();
        meeting.started_at = Some(now.clone());
        {
            let conn = self.db.conn.lock().unwrap();
            conn.execute(
                "UPDATE meetings SET status = 'active', started_at = ?2 WHERE room_id = ?1",
                params![meeting.room_id, &now],
            )
            .ok();
        }
        self.cache_meeting(meeting);
    }

    /// End a meeting: durable status flip with duration, cache keys gone.
    pub fn end_meeting(&self, room_id: &str) {
        let room_id = Self::normalize_room_id(room_id);
        let now = chrono::Utc::now();
        let started: Option<String> = {
            let conn = self.db.conn.lock().unwrap();
            conn.query_row(
                "SELECT started_at FROM meetings WHERE room_id = ?1",
                params![&room_id],
                |r| r.get(0),
            )
            .ok()
            .flatten()
        };
        let duration_secs = started
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|s| (now.signed_duration_since(s)).num_seconds().max(0));
        {
            let conn = self.db.conn.lock().unwrap();
            conn.execute(
                "UPDATE meetings SET status = 'ended', ended_at = ?2, duration_secs = ?3
                 WHERE room_id = ?1",
                params![&room_id, now.to_rfc3339(), duration_secs],
            )
            .ok();
        }
        let _ = self.kv.del(&room_key(&room_id));
        let _ = self.kv.del(&participants_key(&room_id));
    }

    // --- participants ---

    // Participant state lives only in the cache. A failed write cannot be
    // re-derived later, so it surfaces as upstream-unavailable and the
    // connection tears down for a clean reconnect.

    pub fn add_participant(&self, room_id: &str, participant: &Participant) -> Result<(), ApiError> {
        let room_id = Self::normalize_room_id(room_id);
        let raw = serde_json::to_string(participant)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        self.kv
            .hset(&participants_key(&room_id), &participant.user_id, &raw)
            .map_err(cache_unavailable)?;
        let binding = serde_json::json!({
            "userId": participant.user_id,
            "roomId": room_id,
        });
        self.kv
            .set_with_ttl(
                &socket_key(&participant.connection_id),
                &binding.to_string(),
                self.ttl,
            )
            .map_err(cache_unavailable)?;
        self.touch(&room_id);
        Ok(())
    }

    pub fn update_participant(
        &self,
        room_id: &str,
        participant: &Participant,
    ) -> Result<(), ApiError> {
        let room_id = Self::normalize_room_id(room_id);
        let raw = serde_json::to_string(participant)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        self.kv
            .hset(&participants_key(&room_id), &participant.user_id, &raw)
            .map_err(cache_unavailable)?;
        self.touch(&room_id);
        Ok(())
    }

    pub fn get_participant(&self, room_id: &str, user_id: &str) -> Option<Participant> {
        let room_id = Self::normalize_room_id(room_id);
        self.kv
            .hget(&participants_key(&room_id), user_id)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub fn get_participants(&self, room_id: &str) -> Vec<Participant> {
        let room_id = Self::normalize_room_id(room_id);
        let mut participants: Vec<Participant> = self
            .kv
            .hgetall(&participants_key(&room_id))
            .unwrap_or_default()
            .into_values()
            .filter_map(|raw| serde_json::from_str(&raw).ok())
            .collect();
        participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        participants
    }

    pub fn participant_count(&self, room_id: &str) -> usize {
        let room_id = Self::normalize_room_id(room_id);
        self.kv.hlen(&participants_key(&room_id)).unwrap_or(0)
    }

    pub fn remove_participant(&self, room_id: &str, user_id: &str) {
        let room_id = Self::normalize_room_id(room_id);
        let _ = self.kv.hdel(&participants_key(&room_id), user_id);
    }

    // --- socket reverse map ---

    pub fn socket_binding(&self, connection_id: &str) -> Option<(String, String)> {
        let raw = self.kv.get(&socket_key(connection_id)).ok().flatten()?;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        Some((
            value["userId"].as_str()?.to_string(),
            value["roomId"].as_str()?.to_string(),
        ))
    }

    pub fn clear_socket(&self, connection_id: &str) {
        let _ = self.kv.del(&socket_key(connection_id));
    }

    /// Renew the room's cache lease. Every successful participant-touching
    /// operation lands here.
    pub fn touch(&self, room_id: &str) {
        let room_id = Self::normalize_room_id(room_id);
        let _ = self.kv.expire(&room_key(&room_id), self.ttl);
        let _ = self.kv.expire(&participants_key(&room_id), self.ttl);
    }

    fn load_from_db(&self, room_id: &str) -> Option<Meeting> {
        let conn = self.db.conn.lock().unwrap();
        conn.query_row(
            "SELECT room_id, title, host_id, status, max_participants, settings, topology,
                    scheduled_at, started_at, ended_at
             FROM meetings WHERE room_id = ?1",
            params![room_id],
            meeting_from_row,
        )
        .ok()
    }
}

fn cache_unavailable(e: crate::kv::KvError) -> ApiError {
    ApiError::new(crate::error::ErrorKind::UpstreamUnavailable, e.to_string())
}

fn meeting_from_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let settings_raw: String = row.get(5)?;
    Ok(Meeting {
        room_id: row.get(0)?,
        title: row.get(1)?,
        host_id: row.get(2)?,
        status: row.get(3)?,
        max_participants: row.get(4)?,
        settings: serde_json::from_str::<MeetingSettings>(&settings_raw).unwrap_or_default(),
        topology: row.get(6)?,
        scheduled_at: row.get(7)?,
        started_at: row.get(8)?,
        ended_at: row.get(9)?,
    })
}
