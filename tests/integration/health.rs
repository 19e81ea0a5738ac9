use crate::common::{json_body, test_client};
use rocket::http::Status;

#[test]
fn test_health_reports_components() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body = json_body(res);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["components"]["db"], "ok");
    assert_eq!(body["data"]["components"]["kv"], "ok");
    assert!(body["data"]["components"]["queues"]["achievementCheck"].is_object());
}

#[test]
fn test_envelope_shape_on_success() {
    let client = test_client();
    let body = json_body(client.get("/health").dispatch());
    assert!(body["success"].is_boolean());
    assert!(body["message"].is_string());
    assert!(body["data"].is_object());
    assert!(body["timestamp"].is_string());
}

#[test]
fn test_envelope_shape_on_not_found() {
    let client = test_client();
    let res = client.get("/api/no-such-route").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body = json_body(res);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
}
