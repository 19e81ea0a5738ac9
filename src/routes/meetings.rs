use crate::error::{ApiError, ApiResult, ok, ok_with_message};
use crate::meeting::MeetingStore;
use crate::models::CreateMeeting;
use rocket::serde::json::Json;
use rocket::{State, get, post};

use super::{AuthedUser, TeacherUser, parse_sanitized};

/// Provision a room. Hosting is a teacher-level capability; the caller
/// becomes the host, and the short room code in the response is what
/// participants join with.
#[post("/api/meetings", format = "json", data = "<body>")]
pub fn create_meeting(
    store: &State<MeetingStore>,
    caller: TeacherUser,
    body: Json<serde_json::Value>,
) -> ApiResult {
    let body: CreateMeeting = parse_sanitized(body.into_inner())?;
    let meeting = store.create_meeting(&caller.0.sub, &body)?;
    Ok(ok_with_message(
        "Meeting created",
        serde_json::to_value(&meeting).unwrap_or_default(),
    ))
}

#[get("/api/meetings/<room_id>")]
pub fn get_meeting(store: &State<MeetingStore>, _caller: AuthedUser, room_id: &str) -> ApiResult {
    let meeting = store
        .get_meeting(room_id)
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    let participants = store.get_participants(&meeting.room_id);
    Ok(ok(serde_json::json!({
        "meeting": meeting,
        "participants": participants,
        "participantCount": participants.len(),
    })))
}
