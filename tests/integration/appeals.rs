use crate::common::{json_body, moderator, student, test_client};
use rocket::http::{ContentType, Status};

fn suspend(client: &crate::common::TestClient, target: &str) -> String {
    let res = client
        .post("/api/actions")
        .header(moderator("m1"))
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "targetUserId": target,
                "actionType": "suspend",
                "reason": "policy violation",
                "duration": { "value": 7, "unit": "days" }
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    json_body(res)["data"]["actionId"].as_str().unwrap().to_string()
}

fn appeal(
    client: &crate::common::TestClient,
    user: &str,
    action_id: &str,
) -> (Status, serde_json::Value) {
    let res = client
        .post("/api/appeals")
        .header(student(user))
        .header(ContentType::JSON)
        .body(
            serde_json::json!({ "actionId": action_id, "reason": "I believe this was a mistake" })
                .to_string(),
        )
        .dispatch();
    let status = res.status();
    (status, json_body(res))
}

#[test]
fn test_only_target_may_appeal() {
    let client = test_client();
    let action_id = suspend(&client, "u2");

    let (status, _) = appeal(&client, "u3", &action_id);
    assert_eq!(status, Status::Forbidden);

    let (status, body) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["status"], "pending");
}

#[test]
fn test_one_in_flight_appeal_per_action() {
    let client = test_client();
    let action_id = suspend(&client, "u2");

    let (status, _) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Ok);
    let (status, _) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Conflict);
}

#[test]
fn test_approval_revokes_the_action() {
    let client = test_client();
    let action_id = suspend(&client, "u2");
    let (_, body) = appeal(&client, "u2", &action_id);
    let appeal_id = body["data"]["appealId"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("/api/appeals/{appeal_id}/review"))
        .header(moderator("m2"))
        .header(ContentType::JSON)
        .body(r#"{"status": "approved", "reviewNotes": "agreed"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let actions = json_body(
        client
            .get("/api/actions/user/u2")
            .header(moderator("m1"))
            .dispatch(),
    );
    let action = actions["data"]["actions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["id"] == action_id.as_str())
        .unwrap()
        .clone();
    assert_eq!(action["isActive"], false);
    assert_eq!(action["revokeReason"], "Appeal approved");
    assert_eq!(action["revokedBy"], "m2");
}

#[test]
fn test_rejection_leaves_action_active() {
    let client = test_client();
    let action_id = suspend(&client, "u2");
    let (_, body) = appeal(&client, "u2", &action_id);
    let appeal_id = body["data"]["appealId"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("/api/appeals/{appeal_id}/review"))
        .header(moderator("m2"))
        .header(ContentType::JSON)
        .body(r#"{"status": "rejected"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let actions = json_body(
        client
            .get("/api/actions?active_only=true")
            .header(moderator("m1"))
            .dispatch(),
    );
    assert_eq!(actions["data"]["actions"].as_array().unwrap().len(), 1);

    // A rejected appeal is terminal; re-review conflicts.
    let res = client
        .patch(format!("/api/appeals/{appeal_id}/review"))
        .header(moderator("m2"))
        .header(ContentType::JSON)
        .body(r#"{"status": "approved"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);

    // Once rejected, the target may open a fresh appeal.
    let (status, _) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Ok);
}

#[test]
fn test_under_review_is_an_intermediate_state() {
    let client = test_client();
    let action_id = suspend(&client, "u2");
    let (_, body) = appeal(&client, "u2", &action_id);
    let appeal_id = body["data"]["appealId"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("/api/appeals/{appeal_id}/review"))
        .header(moderator("m2"))
        .header(ContentType::JSON)
        .body(r#"{"status": "under_review"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Still blocks a second appeal while under review.
    let (status, _) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Conflict);

    let res = client
        .patch(format!("/api/appeals/{appeal_id}/review"))
        .header(moderator("m2"))
        .header(ContentType::JSON)
        .body(r#"{"status": "rejected"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_appeal_for_inactive_action_conflicts() {
    let client = test_client();
    let action_id = suspend(&client, "u2");
    let res = client
        .patch(format!("/api/actions/{action_id}/revoke"))
        .header(moderator("m1"))
        .header(ContentType::JSON)
        .body(r#"{"reason": "cleared"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let (status, _) = appeal(&client, "u2", &action_id);
    assert_eq!(status, Status::Conflict);
}

#[test]
fn test_my_appeals_scopes_to_caller() {
    let client = test_client();
    let a1 = suspend(&client, "u2");
    let a2 = suspend(&client, "u3");
    appeal(&client, "u2", &a1);
    appeal(&client, "u3", &a2);

    let mine = json_body(
        client
            .get("/api/appeals/my-appeals")
            .header(student("u2"))
            .dispatch(),
    );
    let appeals = mine["data"]["appeals"].as_array().unwrap();
    assert_eq!(appeals.len(), 1);
    assert_eq!(appeals[0]["userId"], "u2");
}

#[test]
fn test_appeal_reason_length_cap() {
    let client = test_client();
    let action_id = suspend(&client, "u2");
    let res = client
        .post("/api/appeals")
        .header(student("u2"))
        .header(ContentType::JSON)
        .body(
            serde_json::json!({ "actionId": action_id, "reason": "x".repeat(2001) }).to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
