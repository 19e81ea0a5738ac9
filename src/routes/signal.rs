use crate::error::{ApiError, ApiResult, ok, ok_with_message};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::signaling::SignalingRelay;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use tokio::time::{Duration, interval};

use super::{AuthedUser, ClientIp, enforce_rate_limit};

/// Register a signaling connection. The returned id addresses the
/// connection for inbound events, targeted relays, and the outbound
/// stream.
#[post("/api/signal/connect")]
pub fn signal_connect(
    relay: &State<SignalingRelay>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    _caller: AuthedUser,
) -> ApiResult {
    enforce_rate_limit(limiter, "auth", &ip.0, rate.auth_max, rate.window_secs)?;
    let connection_id = relay.connect();
    Ok(ok_with_message(
        "Connected",
        serde_json::json!({ "connectionId": connection_id }),
    ))
}

/// Inbound signaling event. Processing is serialized per connection;
/// errors come back both here and as a `meeting-error` on the queue.
#[post("/api/signal/<connection_id>/<event>", format = "json", data = "<body>")]
pub async fn signal_event(
    relay: &State<SignalingRelay>,
    _caller: AuthedUser,
    connection_id: &str,
    event: &str,
    body: Json<serde_json::Value>,
) -> ApiResult {
    relay
        .handle_event(connection_id, event, body.into_inner())
        .await?;
    Ok(ok_with_message("Delivered", serde_json::json!({ "event": event })))
}

/// Polling transport: return and clear whatever is queued, in order.
#[get("/api/signal/<connection_id>/events")]
pub async fn signal_drain(
    relay: &State<SignalingRelay>,
    _caller: AuthedUser,
    connection_id: &str,
) -> ApiResult {
    let events = relay
        .drain(connection_id)
        .await
        .ok_or_else(|| ApiError::not_found("Unknown connection"))?;
    Ok(ok(serde_json::json!({ "events": events })))
}

/// Streaming transport: the same queue as an SSE stream. Dropping the
/// stream is a disconnect and reconciles room state.
#[get("/api/signal/<connection_id>/stream")]
pub fn signal_stream(
    relay: &State<SignalingRelay>,
    _caller: AuthedUser,
    connection_id: &str,
) -> Result<EventStream![], ApiError> {
    let connection = relay
        .connection(connection_id)
        .ok_or_else(|| ApiError::not_found("Unknown connection"))?;
    let relay = relay.inner().clone();
    let connection_id = connection_id.to_string();

    struct DisconnectGuard {
        relay: SignalingRelay,
        connection_id: String,
    }
    impl Drop for DisconnectGuard {
        fn drop(&mut self) {
            self.relay.disconnect(&self.connection_id);
        }
    }

    Ok(EventStream! {
        let _guard = DisconnectGuard { relay, connection_id };
        let mut receiver = connection.receiver.lock().await;
        let mut heartbeat = interval(Duration::from_secs(15));

        loop {
            tokio::select! {
                event = receiver.recv() => {
                    match event {
                        Some(signal) => {
                            yield Event::json(&signal.data).event(signal.event);
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let now = chrono::Utc::now().to_rfc3339();
                    yield Event::json(&serde_json::json!({ "time": now })).event("heartbeat");
                }
            }
        }
    })
}

/// Explicit disconnect for polling clients; stream clients disconnect by
/// dropping the stream.
#[delete("/api/signal/<connection_id>")]
pub fn signal_disconnect(
    relay: &State<SignalingRelay>,
    _caller: AuthedUser,
    connection_id: &str,
) -> ApiResult {
    if relay.connection(connection_id).is_none() {
        return Err(ApiError::not_found("Unknown connection"));
    }
    relay.disconnect(connection_id);
    Ok(ok_with_message(
        "Disconnected",
        serde_json::json!({ "connectionId": connection_id }),
    ))
}
