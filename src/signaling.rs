// N-way mesh coordinator. Each network connection owns an ordered
// outbound queue and a dispatch lock: inbound messages from one
// connection are processed serially, and everything destined for a
// connection is delivered through its queue in send order. Directed
// WebRTC relays (offer/answer/ICE) therefore keep per-pair ordering
// without any room-level coordination.

use crate::config::Config;
use crate::error::{ApiError, ErrorKind};
use crate::meeting::MeetingStore;
use crate::models::{ChatMsg, JoinMeetingMsg, Participant, TargetedSignal, ToggleMsg, VideoQualityMsg};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, mpsc};

/// One outbound event on a connection's queue: `event` names the wire
/// event, `data` is its JSON payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SignalEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl SignalEvent {
    pub fn new(event: &str, data: serde_json::Value) -> Self {
        SignalEvent {
            event: event.to_string(),
            data,
        }
    }
}

pub struct Connection {
    pub id: String,
    sender: mpsc::UnboundedSender<SignalEvent>,
    pub receiver: Mutex<mpsc::UnboundedReceiver<SignalEvent>>,
    /// Serializes inbound dispatch for this connection.
    dispatch: Mutex<()>,
}

#[derive(Clone)]
pub struct SignalingRelay {
    connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
    store: MeetingStore,
    config: Arc<Config>,
}

impl SignalingRelay {
    pub fn new(store: MeetingStore, config: Arc<Config>) -> Self {
        SignalingRelay {
            connections: Arc::new(RwLock::new(HashMap::new())),
            store,
            config,
        }
    }

    /// Register a connection and hand back its id. The queue lives until
    /// `disconnect`.
    pub fn connect(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Arc::new(Connection {
            id: id.clone(),
            sender,
            receiver: Mutex::new(receiver),
            dispatch: Mutex::new(()),
        });
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), connection);
        id
    }

    pub fn connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(connection_id)
            .cloned()
    }

    /// Dispatch one inbound event. Held under the connection's dispatch
    /// lock so a connection's messages apply in arrival order. Errors are
    /// mirrored onto the connection as `meeting-error` and never reach
    /// the room.
    pub async fn handle_event(
        &self,
        connection_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), ApiError> {
        let connection = self
            .connection(connection_id)
            .ok_or_else(|| ApiError::not_found("Unknown connection"))?;
        let _guard = connection.dispatch.lock().await;

        let result = match event {
            "join-meeting" => self.handle_join(connection_id, payload),
            "webrtc-offer" | "webrtc-answer" | "ice-candidate" => {
                self.handle_targeted(connection_id, event, payload)
            }
            "toggle-audio" => self.handle_toggle(connection_id, "audio", payload),
            "toggle-video" => self.handle_toggle(connection_id, "video", payload),
            "toggle-screen-share" => self.handle_toggle(connection_id, "screen-share", payload),
            "change-video-quality" => self.handle_video_quality(connection_id, payload),
            "meeting-chat-message" => self.handle_chat(connection_id, payload),
            "leave-meeting" => {
                self.reconcile_departure(connection_id);
                Ok(())
            }
            other => Err(ApiError::validation(vec![format!(
                "unknown signaling event '{other}'"
            )])),
        };

        if let Err(e) = &result {
            self.send_to(
                connection_id,
                SignalEvent::new(
                    "meeting-error",
                    serde_json::json!({ "message": e.message.clone() }),
                ),
            );
        }
        result
    }

    /// Explicit disconnect or dropped stream: same reconciliation path.
    pub fn disconnect(&self, connection_id: &str) {
        self.reconcile_departure(connection_id);
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(connection_id);
    }

    /// Shutdown teardown: every live connection leaves its room so no
    /// cache state outlives the process.
    pub fn disconnect_all(&self) {
        let ids: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        for id in ids {
            self.disconnect(&id);
        }
    }

    /// Drain whatever is queued without blocking. The polling transport.
    pub async fn drain(&self, connection_id: &str) -> Option<Vec<SignalEvent>> {
        let connection = self.connection(connection_id)?;
        let mut receiver = connection.receiver.lock().await;
        let mut events = vec![];
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        Some(events)
    }

    // --- event handlers ---

    fn handle_join(&self, connection_id: &str, payload: serde_json::Value) -> Result<(), ApiError> {
        let msg: JoinMeetingMsg = parse(payload)?;
        let room_id = MeetingStore::normalize_room_id(&msg.room_id);
        let mut meeting = self
            .store
            .get_meeting(&room_id)
            .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

        if meeting.status == "ended" {
            return Err(ApiError::new(ErrorKind::Conflict, "Meeting has ended"));
        }
        if meeting.settings.lock_room {
            return Err(ApiError::forbidden("Meeting is locked"));
        }
        if self.store.participant_count(&room_id) as i64 >= meeting.max_participants {
            return Err(ApiError::new(ErrorKind::Conflict, "Meeting is full"));
        }

        let existing = self.store.get_participants(&room_id);
        let participant = Participant {
            user_id: msg.user_id.clone(),
            user_name: msg.user_name.clone(),
            peer_id: connection_id.to_string(),
            connection_id: connection_id.to_string(),
            audio_enabled: true,
            video_enabled: true,
            screen_sharing: false,
            video_quality: "auto".to_string(),
            joined_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.add_participant(&room_id, &participant)?;

        if meeting.status == "scheduled" {
            self.store.activate(&mut meeting);
        }

        // The joiner's bootstrap: ICE config, who is already here, ack.
        self.send_to(
            connection_id,
            SignalEvent::new(
                "ice-servers",
                serde_json::json!({ "iceServers": self.config.ice_servers() }),
            ),
        );
        let existing_annotated: Vec<serde_json::Value> = existing
            .iter()
            .map(|p| annotate_host(p, &meeting.host_id))
            .collect();
        self.send_to(
            connection_id,
            SignalEvent::new(
                "existing-participants",
                serde_json::json!({ "participants": existing_annotated }),
            ),
        );
        self.send_to(
            connection_id,
            SignalEvent::new(
                "joined-meeting",
                serde_json::json!({
                    "roomId": room_id,
                    "title": meeting.title,
                    "hostId": meeting.host_id,
                    "isHost": msg.user_id == meeting.host_id,
                    "settings": meeting.settings,
                }),
            ),
        );

        self.broadcast(
            &room_id,
            SignalEvent::new(
                "participant-joined",
                annotate_host(&participant, &meeting.host_id),
            ),
            Some(connection_id),
        );
        self.store.touch(&room_id);
        Ok(())
    }

    /// Offer/answer/ICE: deliver to exactly the addressed connection,
    /// stamped with the sender. Never persisted, never broadcast.
    fn handle_targeted(
        &self,
        connection_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), ApiError> {
        let msg: TargetedSignal = parse(payload)?;
        self.socket_room(connection_id)?;
        let target = self
            .connection(&msg.target_socket_id)
            .ok_or_else(|| ApiError::not_found("Target connection not found"))?;
        let _ = target.sender.send(SignalEvent::new(
            event,
            serde_json::json!({ "from": connection_id, "payload": msg.payload }),
        ));
        Ok(())
    }

    fn handle_toggle(
        &self,
        connection_id: &str,
        what: &str,
        payload: serde_json::Value,
    ) -> Result<(), ApiError> {
        let msg: ToggleMsg = parse(payload)?;
        let (user_id, room_id) = self.socket_room(connection_id)?;
        let meeting = self
            .store
            .get_meeting(&room_id)
            .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
        let mut participant = self
            .store
            .get_participant(&room_id, &user_id)
            .ok_or_else(|| ApiError::not_found("Participant not found"))?;

        let event = match what {
            "audio" => {
                participant.audio_enabled = msg.enabled;
                "participant-audio-changed"
            }
            "video" => {
                participant.video_enabled = msg.enabled;
                "participant-video-changed"
            }
            _ => {
                if msg.enabled && !meeting.settings.allow_screen_share {
                    return Err(ApiError::forbidden("Screen sharing is disabled in this meeting"));
                }
                participant.screen_sharing = msg.enabled;
                "participant-screen-share-changed"
            }
        };
        self.store.update_participant(&room_id, &participant)?;
        self.broadcast(
            &room_id,
            SignalEvent::new(
                event,
                serde_json::json!({ "userId": user_id, "enabled": msg.enabled }),
            ),
            Some(connection_id),
        );
        Ok(())
    }

    fn handle_video_quality(
        &self,
        connection_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), ApiError> {
        let msg: VideoQualityMsg = parse(payload)?;
        let (user_id, room_id) = self.socket_room(connection_id)?;
        let mut participant = self
            .store
            .get_participant(&room_id, &user_id)
            .ok_or_else(|| ApiError::not_found("Participant not found"))?;
        participant.video_quality = msg.quality.clone();
        self.store.update_participant(&room_id, &participant)?;
        self.broadcast(
            &room_id,
            SignalEvent::new(
                "participant-video-quality-changed",
                serde_json::json!({ "userId": user_id, "quality": msg.quality }),
            ),
            Some(connection_id),
        );
        Ok(())
    }

    fn handle_chat(&self, connection_id: &str, payload: serde_json::Value) -> Result<(), ApiError> {
        let msg: ChatMsg = parse(payload)?;
        let (user_id, room_id) = self.socket_room(connection_id)?;
        let meeting = self
            .store
            .get_meeting(&room_id)
            .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
        if !meeting.settings.allow_chat {
            return Err(ApiError::forbidden("Chat is disabled in this meeting"));
        }
        let user_name = self
            .store
            .get_participant(&room_id, &user_id)
            .map(|p| p.user_name)
            .unwrap_or_else(|| user_id.clone());
        // Chat goes to everyone, sender included, stamped with server time.
        self.broadcast(
            &room_id,
            SignalEvent::new(
                "meeting-chat-message",
                serde_json::json!({
                    "userId": user_id,
                    "userName": user_name,
                    "message": msg.message,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }),
            ),
            None,
        );
        self.store.touch(&room_id);
        Ok(())
    }

    /// Remove the connection's participant, tell the room, and end the
    /// meeting when the last one is gone. The socket reverse map is the
    /// source of truth; a connection that never joined is a no-op.
    fn reconcile_departure(&self, connection_id: &str) {
        let Some((user_id, room_id)) = self.store.socket_binding(connection_id) else {
            return;
        };
        self.store.remove_participant(&room_id, &user_id);
        self.store.clear_socket(connection_id);
        self.broadcast(
            &room_id,
            SignalEvent::new(
                "participant-left",
                serde_json::json!({ "userId": user_id }),
            ),
            Some(connection_id),
        );
        if self.store.participant_count(&room_id) == 0 {
            self.store.end_meeting(&room_id);
        }
    }

    // --- delivery ---

    pub fn send_to(&self, connection_id: &str, event: SignalEvent) {
        if let Some(connection) = self.connection(connection_id) {
            let _ = connection.sender.send(event);
        }
    }

    /// Room fan-out through the participant records' connection ids.
    pub fn broadcast(&self, room_id: &str, event: SignalEvent, exclude: Option<&str>) {
        for participant in self.store.get_participants(room_id) {
            if exclude == Some(participant.connection_id.as_str()) {
                continue;
            }
            self.send_to(&participant.connection_id, event.clone());
        }
    }

    fn socket_room(&self, connection_id: &str) -> Result<(String, String), ApiError> {
        self.store
            .socket_binding(connection_id)
            .ok_or_else(|| ApiError::new(ErrorKind::Validation, "Connection has not joined a meeting"))
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::validation(vec![format!("malformed payload: {e}")]))
}

fn annotate_host(participant: &Participant, host_id: &str) -> serde_json::Value {
    let mut value = serde_json::to_value(participant).unwrap_or_default();
    value["isHost"] = serde_json::json!(participant.user_id == host_id);
    value
}
