use crate::common::{
    create_meeting, json_body, signal_connect, signal_events, signal_send, student, teacher,
    test_client,
};
use rocket::http::Status;

fn join(
    client: &crate::common::TestClient,
    user_id: &str,
    connection_id: &str,
    room_id: &str,
) {
    let res = signal_send(
        client,
        user_id,
        connection_id,
        "join-meeting",
        serde_json::json!({ "roomId": room_id, "userId": user_id, "userName": user_id }),
    );
    assert_eq!(res.status(), Status::Ok, "join failed for {user_id}");
}

fn events_named(events: &[serde_json::Value], name: &str) -> Vec<serde_json::Value> {
    events
        .iter()
        .filter(|e| e["event"] == name)
        .cloned()
        .collect()
}

#[test]
fn test_join_bootstrap_and_broadcast() {
    let client = test_client();
    let room = create_meeting(&client, "host", 10);

    let conn_host = signal_connect(&client, "host");
    join(&client, "host", &conn_host, &room);

    let host_boot = signal_events(&client, "host", &conn_host);
    // First joiner: ICE config, an empty room, and the ack.
    assert_eq!(events_named(&host_boot, "ice-servers").len(), 1);
    let ice = &events_named(&host_boot, "ice-servers")[0];
    assert!(ice["data"]["iceServers"].as_array().unwrap()[0]["urls"]
        .as_str()
        .unwrap()
        .starts_with("stun:"));
    let existing = &events_named(&host_boot, "existing-participants")[0];
    assert_eq!(existing["data"]["participants"].as_array().unwrap().len(), 0);
    let joined = &events_named(&host_boot, "joined-meeting")[0];
    assert_eq!(joined["data"]["isHost"], true);

    let conn_guest = signal_connect(&client, "guest");
    join(&client, "guest", &conn_guest, &room);

    // The second join's reply lists exactly the host, flagged as host.
    let guest_boot = signal_events(&client, "guest", &conn_guest);
    let existing = &events_named(&guest_boot, "existing-participants")[0];
    let participants = existing["data"]["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["userId"], "host");
    assert_eq!(participants[0]["isHost"], true);
    let joined = &events_named(&guest_boot, "joined-meeting")[0];
    assert_eq!(joined["data"]["isHost"], false);

    // The host sees exactly one participant-joined for the guest.
    let host_events = signal_events(&client, "host", &conn_host);
    let joins = events_named(&host_events, "participant-joined");
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0]["data"]["userId"], "guest");
    assert_eq!(joins[0]["data"]["isHost"], false);

    // Join moved the room to active.
    let meeting = json_body(
        client
            .get(format!("/api/meetings/{room}"))
            .header(student("host"))
            .dispatch(),
    );
    assert_eq!(meeting["data"]["meeting"]["status"], "active");
    assert!(meeting["data"]["meeting"]["startedAt"].is_string());
}

#[test]
fn test_targeted_offer_reaches_only_the_target() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    let conn_c = signal_connect(&client, "c");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    join(&client, "c", &conn_c, &room);

    // Clear the join chatter.
    signal_events(&client, "a", &conn_a);
    signal_events(&client, "b", &conn_b);
    signal_events(&client, "c", &conn_c);

    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "webrtc-offer",
        serde_json::json!({ "targetSocketId": conn_b, "payload": { "sdp": "offer-sdp" } }),
    );
    assert_eq!(res.status(), Status::Ok);

    let b_events = signal_events(&client, "b", &conn_b);
    let offers = events_named(&b_events, "webrtc-offer");
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["data"]["from"], conn_a.as_str());
    assert_eq!(offers[0]["data"]["payload"]["sdp"], "offer-sdp");

    let c_events = signal_events(&client, "c", &conn_c);
    assert_eq!(events_named(&c_events, "webrtc-offer").len(), 0);
}

#[test]
fn test_directed_pair_preserves_sender_order() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    signal_events(&client, "b", &conn_b);

    for i in 0..5 {
        let res = signal_send(
            &client,
            "a",
            &conn_a,
            "ice-candidate",
            serde_json::json!({ "targetSocketId": conn_b, "payload": { "candidate": i } }),
        );
        assert_eq!(res.status(), Status::Ok);
    }

    let b_events = signal_events(&client, "b", &conn_b);
    let candidates: Vec<i64> = events_named(&b_events, "ice-candidate")
        .iter()
        .map(|e| e["data"]["payload"]["candidate"].as_i64().unwrap())
        .collect();
    assert_eq!(candidates, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_capacity_limit_rejects_join() {
    let client = test_client();
    let room = create_meeting(&client, "a", 2);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    let conn_c = signal_connect(&client, "c");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);

    let res = signal_send(
        &client,
        "c",
        &conn_c,
        "join-meeting",
        serde_json::json!({ "roomId": room, "userId": "c", "userName": "c" }),
    );
    assert_eq!(res.status(), Status::Conflict);

    // The failure is isolated to C as a meeting-error.
    let c_events = signal_events(&client, "c", &conn_c);
    let errors = events_named(&c_events, "meeting-error");
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["data"]["message"].as_str().unwrap().contains("full"));
}

#[test]
fn test_toggles_broadcast_excluding_sender() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    signal_events(&client, "a", &conn_a);
    signal_events(&client, "b", &conn_b);

    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "toggle-audio",
        serde_json::json!({ "enabled": false }),
    );
    assert_eq!(res.status(), Status::Ok);

    let b_events = signal_events(&client, "b", &conn_b);
    let changes = events_named(&b_events, "participant-audio-changed");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["data"]["userId"], "a");
    assert_eq!(changes[0]["data"]["enabled"], false);

    // Sender is excluded.
    let a_events = signal_events(&client, "a", &conn_a);
    assert_eq!(events_named(&a_events, "participant-audio-changed").len(), 0);
}

#[test]
fn test_screen_share_gated_by_settings() {
    let client = test_client();
    let body = crate::common::post_json(
        &client,
        "/api/meetings",
        Some(teacher("a")),
        serde_json::json!({
            "title": "No sharing",
            "settings": { "allowScreenShare": false }
        }),
    );
    let room = body["data"]["roomId"].as_str().unwrap().to_string();
    let conn_a = signal_connect(&client, "a");
    join(&client, "a", &conn_a, &room);

    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "toggle-screen-share",
        serde_json::json!({ "enabled": true }),
    );
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_chat_broadcasts_to_everyone_with_server_timestamp() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    signal_events(&client, "a", &conn_a);
    signal_events(&client, "b", &conn_b);

    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "meeting-chat-message",
        serde_json::json!({ "message": "hello room" }),
    );
    assert_eq!(res.status(), Status::Ok);

    for (user, conn) in [("a", &conn_a), ("b", &conn_b)] {
        let events = signal_events(&client, user, conn);
        let chats = events_named(&events, "meeting-chat-message");
        assert_eq!(chats.len(), 1, "chat missing for {user}");
        assert_eq!(chats[0]["data"]["message"], "hello room");
        assert_eq!(chats[0]["data"]["userId"], "a");
        assert!(chats[0]["data"]["timestamp"].is_string());
    }
}

#[test]
fn test_chat_gated_by_settings() {
    let client = test_client();
    let body = crate::common::post_json(
        &client,
        "/api/meetings",
        Some(teacher("a")),
        serde_json::json!({ "title": "Silent", "settings": { "allowChat": false } }),
    );
    let room = body["data"]["roomId"].as_str().unwrap().to_string();
    let conn_a = signal_connect(&client, "a");
    join(&client, "a", &conn_a, &room);

    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "meeting-chat-message",
        serde_json::json!({ "message": "anyone?" }),
    );
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_leave_broadcasts_and_last_leave_ends_meeting() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    signal_events(&client, "a", &conn_a);

    let res = signal_send(&client, "b", &conn_b, "leave-meeting", serde_json::json!({}));
    assert_eq!(res.status(), Status::Ok);

    let a_events = signal_events(&client, "a", &conn_a);
    let left = events_named(&a_events, "participant-left");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["data"]["userId"], "b");

    // Meeting still active with one participant.
    let meeting = json_body(
        client
            .get(format!("/api/meetings/{room}"))
            .header(student("a"))
            .dispatch(),
    );
    assert_eq!(meeting["data"]["meeting"]["status"], "active");

    let res = signal_send(&client, "a", &conn_a, "leave-meeting", serde_json::json!({}));
    assert_eq!(res.status(), Status::Ok);

    let meeting = json_body(
        client
            .get(format!("/api/meetings/{room}"))
            .header(student("a"))
            .dispatch(),
    );
    assert_eq!(meeting["data"]["meeting"]["status"], "ended");
    assert!(meeting["data"]["meeting"]["endedAt"].is_string());
    assert_eq!(meeting["data"]["participantCount"], 0);
}

#[test]
fn test_disconnect_reconciles_like_leave() {
    let client = test_client();
    let room = create_meeting(&client, "a", 10);
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    join(&client, "a", &conn_a, &room);
    join(&client, "b", &conn_b, &room);
    signal_events(&client, "a", &conn_a);

    // Hard disconnect instead of a polite leave.
    let res = client
        .delete(format!("/api/signal/{conn_b}"))
        .header(student("b"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let a_events = signal_events(&client, "a", &conn_a);
    assert_eq!(events_named(&a_events, "participant-left").len(), 1);

    // No stale participants left behind.
    let meeting = json_body(
        client
            .get(format!("/api/meetings/{room}"))
            .header(student("a"))
            .dispatch(),
    );
    assert_eq!(meeting["data"]["participantCount"], 1);
}

#[test]
fn test_signal_to_unknown_room_errors() {
    let client = test_client();
    let conn = signal_connect(&client, "a");
    let res = signal_send(
        &client,
        "a",
        &conn,
        "join-meeting",
        serde_json::json!({ "roomId": "ZZZ99999", "userId": "a", "userName": "a" }),
    );
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_relay_without_join_is_rejected() {
    let client = test_client();
    let conn_a = signal_connect(&client, "a");
    let conn_b = signal_connect(&client, "b");
    let res = signal_send(
        &client,
        "a",
        &conn_a,
        "webrtc-offer",
        serde_json::json!({ "targetSocketId": conn_b, "payload": {} }),
    );
    assert_eq!(res.status(), Status::BadRequest);
}
