use crate::common::{admin, complete_quiz, json_body, student, test_client};
use rocket::http::{ContentType, Status};

// Inbound event surface: validation at the boundary, engine effects
// observable through the stats read path.

#[test]
fn test_quiz_completed_updates_stats() {
    let client = test_client();
    complete_quiz(&client, "u1", 50.0, 80.0, true);

    let res = client
        .get("/api/stats/u1")
        .header(student("u1"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let stats = json_body(res)["data"].clone();
    assert_eq!(stats["totalQuizzesTaken"], 1);
    assert_eq!(stats["totalPoints"], 50.0);
    assert_eq!(stats["currentStreak"], 1);
    assert_eq!(stats["longestStreak"], 1);
    assert_eq!(stats["level"], 1);
    assert_eq!(stats["averageScore"], 80);
}

#[test]
fn test_failed_quiz_resets_streak() {
    let client = test_client();
    complete_quiz(&client, "u1", 50.0, 80.0, true);
    complete_quiz(&client, "u1", 60.0, 90.0, true);
    complete_quiz(&client, "u1", 5.0, 20.0, false);

    let stats = json_body(
        client.get("/api/stats/u1").header(student("u1")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(stats["currentStreak"], 0);
    assert_eq!(stats["longestStreak"], 2);
}

#[test]
fn test_average_score_is_a_running_mean() {
    let client = test_client();
    complete_quiz(&client, "u1", 10.0, 100.0, true);
    complete_quiz(&client, "u1", 10.0, 50.0, true);

    let stats = json_body(
        client.get("/api/stats/u1").header(student("u1")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(stats["averageScore"], 75);
}

#[test]
fn test_level_rises_with_experience() {
    let client = test_client();
    // Two quizzes at 50 experience each: 100 total, level 2.
    complete_quiz(&client, "u1", 10.0, 80.0, true);
    complete_quiz(&client, "u1", 10.0, 80.0, true);

    let stats = json_body(
        client.get("/api/stats/u1").header(student("u1")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(stats["experience"], 100.0);
    assert_eq!(stats["level"], 2);
}

#[test]
fn test_quiz_completed_missing_fields_is_rejected() {
    let client = test_client();
    let res = client
        .post("/api/events/quiz-completed")
        .header(ContentType::JSON)
        .body(r#"{"userId": "u1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
    let body = json_body(res);
    assert_eq!(body["success"], false);
    assert!(body["errors"].is_array());
}

#[test]
fn test_live_session_ended_applies_rank_rule() {
    let client = test_client();
    let body = serde_json::json!({
        "sessionId": "s1",
        "participants": [
            { "userId": "winner", "points": 100, "rank": 1, "accuracy": 95, "totalTime": 120, "experience": 80 },
            { "userId": "fourth", "points": 20, "rank": 4, "accuracy": 60, "totalTime": 150, "experience": 20 }
        ]
    });
    let res = client
        .post("/api/events/live-session-ended")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Top-three placement counts as passed: the winner's streak moves.
    let winner = json_body(
        client.get("/api/stats/winner").header(student("winner")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(winner["currentStreak"], 1);
    assert_eq!(winner["totalPoints"], 100.0);

    let fourth = json_body(
        client.get("/api/stats/fourth").header(student("fourth")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(fourth["currentStreak"], 0);
    assert_eq!(fourth["totalPoints"], 20.0);
}

#[test]
fn test_quiz_created_increments_created_counter() {
    let client = test_client();
    let res = client
        .post("/api/events/quiz-created")
        .header(ContentType::JSON)
        .body(r#"{"userId": "t1", "quizId": "q9", "category": "science"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let stats = json_body(
        client.get("/api/stats/t1").header(student("t1")).dispatch(),
    )["data"]
        .clone();
    assert_eq!(stats["totalQuizzesCreated"], 1);
    assert_eq!(stats["totalQuizzesTaken"], 0);
}

#[test]
fn test_social_interaction_accepts_and_acks() {
    let client = test_client();
    let res = client
        .post("/api/events/social-interaction")
        .header(ContentType::JSON)
        .body(r#"{"userId": "u1", "interactionType": "follow"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body = json_body(res);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["interactionType"], "follow");
}

#[test]
fn test_result_saved_refreshes_leaderboard() {
    let client = test_client();
    complete_quiz(&client, "u1", 40.0, 70.0, true);

    let res = client
        .post("/api/events/result-saved")
        .header(ContentType::JSON)
        .body(r#"{"userId": "u1", "resultId": "r1", "resultData": {"category": "math"}}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let board = json_body(client.get("/api/leaderboards/global?start=0&limit=5").dispatch());
    let entries = board["data"]["entries"].as_array().unwrap().clone();
    assert_eq!(entries[0]["userId"], "u1");
    assert_eq!(entries[0]["score"], 40.0);
}

#[test]
fn test_bulk_update_replays_results() {
    let client = test_client();
    let body = serde_json::json!({
        "updates": [
            { "userId": "a", "resultData": { "percentage": 80, "pointsEarned": 10, "passed": true, "totalTimeTaken": 60 } },
            { "userId": "b", "resultData": { "percentage": 60, "pointsEarned": 5, "passed": false, "totalTimeTaken": 30 } }
        ]
    });
    let res = client
        .post("/api/stats/bulk-update")
        .header(admin("root"))
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let result = json_body(res);
    assert_eq!(result["data"]["applied"], 2);
}
