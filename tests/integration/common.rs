use learnhub_core::auth::Role;
use learnhub_core::config::Config;
use learnhub_core::rate_limit::RateLimitConfig;
use rocket::http::{ContentType, Header};
use rocket::local::blocking::{Client, LocalResponse};

pub const TEST_SECRET: &str = "test-token-secret";

/// Wrapper around Client that auto-deletes the temp DB on drop. Uses
/// Option<Client> so the SQLite connection is released (WAL holds the
/// file) before the files are removed.
pub struct TestClient {
    client: Option<Client>,
    pub db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

fn temp_db_path() -> String {
    format!(
        "/tmp/learnhub_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    )
}

pub fn test_client() -> TestClient {
    let db_path = temp_db_path();
    let rocket = learnhub_core::rocket_with_config(Config::for_tests(&db_path));
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

/// Client with custom rate limits, for testing the per-window classes
/// without env var races.
pub fn test_client_with_rate_limits(rate_config: RateLimitConfig) -> TestClient {
    let db_path = temp_db_path();
    let rocket =
        learnhub_core::rocket_with_configs(Config::for_tests(&db_path), rate_config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

// --- tokens ---

pub fn token_for(user_id: &str, role: Role) -> String {
    learnhub_core::auth::issue(TEST_SECRET, user_id, role, 3600)
}

pub fn bearer(user_id: &str, role: Role) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token_for(user_id, role)))
}

pub fn student(user_id: &str) -> Header<'static> {
    bearer(user_id, Role::Student)
}

pub fn moderator(user_id: &str) -> Header<'static> {
    bearer(user_id, Role::Moderator)
}

pub fn admin(user_id: &str) -> Header<'static> {
    bearer(user_id, Role::Admin)
}

// --- request helpers ---

pub fn post_json(
    client: &Client,
    uri: &str,
    auth: Option<Header<'static>>,
    body: serde_json::Value,
) -> serde_json::Value {
    let mut req = client.post(uri.to_string()).header(ContentType::JSON);
    if let Some(header) = auth {
        req = req.header(header);
    }
    let res = req.body(body.to_string()).dispatch();
    json_body(res)
}

pub fn json_body(res: LocalResponse<'_>) -> serde_json::Value {
    res.into_json().expect("JSON response body")
}

/// Poll until `check` passes or the deadline expires. Queue-driven paths
/// (achievement unlocks, stats sync) converge within a few worker polls.
pub fn poll_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    false
}

/// Submit one quiz completion for a user through the public event surface.
pub fn complete_quiz(client: &Client, user_id: &str, points: f64, percentage: f64, passed: bool) {
    let body = serde_json::json!({
        "userId": user_id,
        "quizId": format!("quiz-{}", uuid::Uuid::new_v4()),
        "resultData": {
            "percentage": percentage,
            "pointsEarned": points,
            "passed": passed,
            "totalTimeTaken": 90,
            "experience": 50,
            "category": "math"
        }
    });
    let res = client
        .post("/api/events/quiz-completed")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::Ok);
}

/// Teacher shortcut for meeting hosts.
pub fn teacher(user_id: &str) -> Header<'static> {
    bearer(user_id, Role::Teacher)
}

/// Create a meeting (hosting requires the teacher gate) and return its
/// room code.
pub fn create_meeting(client: &Client, host_id: &str, max_participants: i64) -> String {
    let body = post_json(
        client,
        "/api/meetings",
        Some(teacher(host_id)),
        serde_json::json!({
            "title": "Study session",
            "maxParticipants": max_participants,
        }),
    );
    assert_eq!(body["success"], true, "create_meeting failed: {body}");
    body["data"]["roomId"].as_str().unwrap().to_string()
}

/// Open a signaling connection for a user and return its connection id.
pub fn signal_connect(client: &Client, user_id: &str) -> String {
    let res = client
        .post("/api/signal/connect")
        .header(student(user_id))
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body = json_body(res);
    body["data"]["connectionId"].as_str().unwrap().to_string()
}

/// Send one signaling event on a connection.
pub fn signal_send<'c>(
    client: &'c Client,
    user_id: &str,
    connection_id: &str,
    event: &str,
    payload: serde_json::Value,
) -> LocalResponse<'c> {
    client
        .post(format!("/api/signal/{connection_id}/{event}"))
        .header(student(user_id))
        .header(ContentType::JSON)
        .body(payload.to_string())
        .dispatch()
}

/// Drain a connection's queued outbound events.
pub fn signal_events(client: &Client, user_id: &str, connection_id: &str) -> Vec<serde_json::Value> {
    let res = client
        .get(format!("/api/signal/{connection_id}/events"))
        .header(student(user_id))
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::Ok);
    let body = json_body(res);
    body["data"]["events"].as_array().cloned().unwrap_or_default()
}
