use crate::Queues;
use crate::achievements::AchievementEvent;
use crate::error::{ApiResult, ok_with_message};
use crate::leaderboard::LeaderboardEngine;
use crate::models::{
    LiveSessionEndedEvent, QuizCompletedEvent, QuizCreatedEvent, ResultData, ResultSavedEvent,
    SessionParticipant, SocialInteractionEvent,
};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::stats::StatsEngine;
use rocket::serde::json::Json;
use rocket::{State, post};

use super::{ClientIp, enforce_rate_limit, parse_sanitized};

// Inbound webhook surface for event producers. Ingress is the producer's
// only concern: shape problems are 400s, but engine failures are logged
// and recovered internally while the 200 envelope still goes out.

#[post("/api/events/quiz-completed", format = "json", data = "<body>")]
pub fn quiz_completed(
    stats: &State<StatsEngine>,
    queues: &State<Queues>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let event: QuizCompletedEvent = parse_sanitized(body.into_inner())?;

    run_quiz_pipeline(stats, queues, &event.user_id, &event.result_data);

    Ok(ok_with_message(
        "Quiz completion recorded",
        serde_json::json!({ "userId": event.user_id, "quizId": event.quiz_id }),
    ))
}

#[post("/api/events/result-saved", format = "json", data = "<body>")]
pub fn result_saved(
    stats: &State<StatsEngine>,
    leaderboard: &State<LeaderboardEngine>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let event: ResultSavedEvent = parse_sanitized(body.into_inner())?;

    // Refresh the boards from the authoritative total.
    match stats.get_stats(&event.user_id) {
        Ok(snapshot) => {
            let category = event
                .result_data
                .as_ref()
                .and_then(|d| d.category.as_deref());
            leaderboard.update_user_score(&event.user_id, snapshot.total_points, category);
        }
        Err(e) => eprintln!("⚠️ result-saved: stats read failed for {}: {e}", event.user_id),
    }

    Ok(ok_with_message(
        "Leaderboards refreshed",
        serde_json::json!({ "userId": event.user_id, "resultId": event.result_id }),
    ))
}

#[post("/api/events/live-session-ended", format = "json", data = "<body>")]
pub fn live_session_ended(
    stats: &State<StatsEngine>,
    queues: &State<Queues>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let event: LiveSessionEndedEvent = parse_sanitized(body.into_inner())?;

    for participant in &event.participants {
        let result = session_result(participant);
        run_quiz_pipeline(stats, queues, &participant.user_id, &result);
    }

    Ok(ok_with_message(
        "Session results recorded",
        serde_json::json!({
            "sessionId": event.session_id,
            "participants": event.participants.len(),
        }),
    ))
}

#[post("/api/events/quiz-created", format = "json", data = "<body>")]
pub fn quiz_created(
    stats: &State<StatsEngine>,
    queues: &State<Queues>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let event: QuizCreatedEvent = parse_sanitized(body.into_inner())?;

    if let Err(e) = stats.increment_quizzes_created(&event.user_id) {
        eprintln!("⚠️ quiz-created: stats update failed for {}: {e}", event.user_id);
    }
    let mut check = AchievementEvent::of_kind("quiz_created");
    check.category = event.category.clone();
    enqueue_check(queues, &event.user_id, check);

    Ok(ok_with_message(
        "Quiz creation recorded",
        serde_json::json!({ "userId": event.user_id, "quizId": event.quiz_id }),
    ))
}

#[post("/api/events/social-interaction", format = "json", data = "<body>")]
pub fn social_interaction(
    queues: &State<Queues>,
    limiter: &State<RateLimiter>,
    rate: &State<RateLimitConfig>,
    ip: ClientIp,
    body: Json<serde_json::Value>,
) -> ApiResult {
    enforce_rate_limit(limiter, "general", &ip.0, rate.general_max, rate.window_secs)?;
    let event: SocialInteractionEvent = parse_sanitized(body.into_inner())?;

    enqueue_check(
        queues,
        &event.user_id,
        AchievementEvent::of_kind("social_interaction"),
    );

    Ok(ok_with_message(
        "Interaction recorded",
        serde_json::json!({
            "userId": event.user_id,
            "interactionType": event.interaction_type,
        }),
    ))
}

/// The shared per-user pipeline: stats deltas, running-mean average,
/// activity stamp, achievement check. Sub-operation failures stay here.
fn run_quiz_pipeline(stats: &StatsEngine, queues: &Queues, user_id: &str, result: &ResultData) {
    if let Err(e) = stats.update_stats(user_id, result) {
        eprintln!("⚠️ quiz pipeline: stats update failed for {user_id}: {e}");
    }
    if let Err(e) = stats.update_average_score(user_id, result.percentage) {
        eprintln!("⚠️ quiz pipeline: average update failed for {user_id}: {e}");
    }
    stats.record_activity(user_id);

    let check = AchievementEvent {
        kind: "quiz_completed".to_string(),
        percentage: Some(result.percentage),
        total_time_taken: Some(result.total_time_taken),
        category: result.category.clone(),
    };
    enqueue_check(queues, user_id, check);
}

/// A live-session participant counts as passed when they placed in the
/// top three.
fn session_result(participant: &SessionParticipant) -> ResultData {
    ResultData {
        percentage: participant.accuracy,
        points_earned: participant.points,
        bonus_points: participant.bonus_points,
        experience: participant.experience,
        passed: participant.rank <= 3,
        total_time_taken: participant.total_time,
        category: None,
    }
}

fn enqueue_check(queues: &Queues, user_id: &str, event: AchievementEvent) {
    let payload = serde_json::json!({
        "userId": user_id,
        "event": event,
    });
    if let Err(e) = queues.achievement.enqueue(payload) {
        eprintln!("⚠️ Failed to enqueue achievement check for {user_id}: {e}");
    }
}
