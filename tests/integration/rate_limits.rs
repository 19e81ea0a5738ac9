use crate::common::{student, test_client_with_rate_limits};
use learnhub_core::rate_limit::RateLimitConfig;
use rocket::http::{ContentType, Header, Status};

fn tiny_limits() -> RateLimitConfig {
    RateLimitConfig {
        general_max: 2,
        auth_max: 1,
        heavy_max: 1,
        window_secs: 900,
    }
}

#[test]
fn test_general_class_limits_event_ingestion() {
    let client = test_client_with_rate_limits(tiny_limits());
    let body = r#"{"userId": "u1", "interactionType": "like"}"#;

    for _ in 0..2 {
        let res = client
            .post("/api/events/social-interaction")
            .header(ContentType::JSON)
            .body(body)
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
    }
    let res = client
        .post("/api/events/social-interaction")
        .header(ContentType::JSON)
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
    let envelope: serde_json::Value = res.into_json().unwrap();
    assert_eq!(envelope["success"], false);
}

#[test]
fn test_auth_class_limits_connection_churn() {
    let client = test_client_with_rate_limits(tiny_limits());
    let res = client
        .post("/api/signal/connect")
        .header(student("u1"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/signal/connect")
        .header(student("u1"))
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
}

#[test]
fn test_limits_key_on_forwarded_ip() {
    let client = test_client_with_rate_limits(tiny_limits());
    // Exhaust the window for one client IP.
    for _ in 0..2 {
        let res = client
            .post("/api/events/social-interaction")
            .header(ContentType::JSON)
            .header(Header::new("X-Forwarded-For", "10.0.0.1"))
            .body(r#"{"userId": "u1", "interactionType": "like"}"#)
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
    }
    let res = client
        .post("/api/events/social-interaction")
        .header(ContentType::JSON)
        .header(Header::new("X-Forwarded-For", "10.0.0.1"))
        .body(r#"{"userId": "u1", "interactionType": "like"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);

    // A different forwarded IP has its own window.
    let res = client
        .post("/api/events/social-interaction")
        .header(ContentType::JSON)
        .header(Header::new("X-Forwarded-For", "10.0.0.2"))
        .body(r#"{"userId": "u1", "interactionType": "like"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_heavy_class_limits_admin_sweeps() {
    let client = test_client_with_rate_limits(tiny_limits());
    let res = client
        .post("/api/leaderboards/rebuild")
        .header(crate::common::admin("root"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/leaderboards/rebuild")
        .header(crate::common::admin("root"))
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
}
