use crate::common::{admin, complete_quiz, json_body, test_client};
use rocket::http::Status;

fn seed_five_users(client: &crate::common::TestClient) {
    // Totals [500, 300, 300, 100, 0]; insertion order breaks the tie.
    complete_quiz(client, "alice", 500.0, 90.0, true);
    complete_quiz(client, "bob", 300.0, 80.0, true);
    complete_quiz(client, "carol", 300.0, 80.0, true);
    complete_quiz(client, "dave", 100.0, 70.0, true);
    complete_quiz(client, "erin", 0.0, 10.0, false);
}

#[test]
fn test_global_ordering_and_ranks() {
    let client = test_client();
    seed_five_users(&client);

    let body = json_body(client.get("/api/leaderboards/global?start=0&limit=5").dispatch());
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 5);

    let scores: Vec<f64> = entries.iter().map(|e| e["score"].as_f64().unwrap()).collect();
    assert_eq!(scores, vec![500.0, 300.0, 300.0, 100.0, 0.0]);
    let ranks: Vec<u64> = entries.iter().map(|e| e["rank"].as_u64().unwrap()).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

    // Tied users occupy ranks 2 and 3 deterministically (first writer wins).
    assert_eq!(entries[1]["userId"], "bob");
    assert_eq!(entries[2]["userId"], "carol");

    // User metadata rides along.
    assert!(entries[0]["user"]["name"].is_string());
}

#[test]
fn test_pagination_offsets_ranks() {
    let client = test_client();
    seed_five_users(&client);

    let body = json_body(client.get("/api/leaderboards/global?start=2&limit=2").dispatch());
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["rank"], 3);
    assert_eq!(entries[1]["rank"], 4);
}

#[test]
fn test_rank_endpoint() {
    let client = test_client();
    seed_five_users(&client);

    let body = json_body(client.get("/api/leaderboards/rank/alice").dispatch());
    assert_eq!(body["data"]["rank"], 1);
    assert_eq!(body["data"]["score"], 500.0);

    let res = client.get("/api/leaderboards/rank/nobody").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_category_board_tracks_category_scores() {
    let client = test_client();
    complete_quiz(&client, "alice", 50.0, 90.0, true); // category math

    let body = json_body(client.get("/api/leaderboards/category/math?start=0&limit=5").dispatch());
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["userId"], "alice");

    let body = json_body(client.get("/api/leaderboards/rank/alice/category/math").dispatch());
    assert_eq!(body["data"]["rank"], 1);
}

#[test]
fn test_surrounding_window_clamps_at_top() {
    let client = test_client();
    seed_five_users(&client);

    let body = json_body(client.get("/api/leaderboards/around/bob?k=1").dispatch());
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    // bob is rank 2; the window is ranks 1..=3.
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[2]["rank"], 3);
}

#[test]
fn test_reset_then_read_rebuilds_from_durable_store() {
    let client = test_client();
    seed_five_users(&client);

    // Spill every user so the durable store holds the totals.
    for user in ["alice", "bob", "carol", "dave", "erin"] {
        let res = client
            .post(format!("/api/stats/{user}/sync"))
            .header(admin("root"))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
    }

    // Drop the weekly board, then read it: the page comes back rebuilt.
    let res = client
        .post("/api/leaderboards/reset/weekly")
        .header(admin("root"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let body = json_body(client.get("/api/leaderboards/weekly?start=0&limit=5").dispatch());
    let entries = body["data"]["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["userId"], "alice");
    assert_eq!(entries[0]["score"], 500.0);
    // The rebuild re-resolves the tie deterministically within the snapshot.
    let tied: Vec<&str> = entries[1..3]
        .iter()
        .map(|e| e["userId"].as_str().unwrap())
        .collect();
    assert!(tied == ["bob", "carol"] || tied == ["carol", "bob"]);
    let body2 = json_body(client.get("/api/leaderboards/weekly?start=0&limit=5").dispatch());
    assert_eq!(body["data"]["entries"], body2["data"]["entries"]);
}

#[test]
fn test_explicit_rebuild_requires_admin() {
    let client = test_client();
    let res = client.post("/api/leaderboards/rebuild").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    let res = client
        .post("/api/leaderboards/rebuild")
        .header(crate::common::student("u1"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .post("/api/leaderboards/rebuild")
        .header(admin("root"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_repeated_zadd_same_score_keeps_rank() {
    let client = test_client();
    complete_quiz(&client, "solo", 100.0, 80.0, true);
    let first = json_body(client.get("/api/leaderboards/rank/solo").dispatch());

    // Refreshing the same total must not move the rank.
    let res = client
        .post("/api/events/result-saved")
        .header(rocket::http::ContentType::JSON)
        .body(r#"{"userId": "solo", "resultId": "r1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let second = json_body(client.get("/api/leaderboards/rank/solo").dispatch());
    assert_eq!(first["data"]["rank"], second["data"]["rank"]);
    assert_eq!(first["data"]["score"], second["data"]["score"]);
}
