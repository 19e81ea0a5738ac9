pub mod achievements;
pub mod auth;
pub mod config;
pub mod cron;
pub mod db;
pub mod error;
pub mod jobs;
pub mod kv;
pub mod leaderboard;
pub mod meeting;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod rate_limit;
pub mod routes;
pub mod sanitize;
pub mod signaling;
pub mod stats;

use achievements::{AchievementEngine, AchievementEvent};
use config::Config;
use db::Db;
use jobs::{Job, JobQueue};
use kv::Kv;
use leaderboard::LeaderboardEngine;
use meeting::MeetingStore;
use moderation::ModerationEngine;
use notify::Notifier;
use rate_limit::{RateLimitConfig, RateLimiter};
use rocket_cors::{AllowedOrigins, CorsOptions};
use signaling::SignalingRelay;
use stats::StatsEngine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The two background queues, exposed as managed state so the health
/// surface can report their depths.
pub struct Queues {
    pub achievement: JobQueue,
    pub stats_sync: JobQueue,
}

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("❌ {e}");
        std::process::exit(1);
    });
    rocket_with_config(config)
}

pub fn rocket_with_config(config: Config) -> rocket::Rocket<rocket::Build> {
    build_rocket(config, RateLimitConfig::from_env())
}

pub fn rocket_with_configs(
    config: Config,
    rate_config: RateLimitConfig,
) -> rocket::Rocket<rocket::Build> {
    build_rocket(config, rate_config)
}

fn build_rocket(config: Config, rate_config: RateLimitConfig) -> rocket::Rocket<rocket::Build> {
    // Ensure the data directory exists
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let config = Arc::new(config);
    let db = Arc::new(Db::new(&config.database_path));
    let kv = Kv::new();
    let notifier = Arc::new(Notifier::new(
        config.social_service_url.clone(),
        config.account_service_url.clone(),
    ));

    let achievement_queue = JobQueue::new(kv.clone(), jobs::ACHIEVEMENT_QUEUE);
    let stats_sync_queue = JobQueue::new(kv.clone(), jobs::STATS_SYNC_QUEUE);

    let leaderboard = LeaderboardEngine::new(kv.clone(), db.clone());
    let stats_engine = StatsEngine::new(
        kv.clone(),
        db.clone(),
        leaderboard.clone(),
        stats_sync_queue.clone(),
    );
    let achievement_engine = AchievementEngine::new(kv.clone(), db.clone(), notifier.clone());
    let meeting_store = MeetingStore::new(kv.clone(), db.clone(), config.meeting_ttl_secs);
    let relay = SignalingRelay::new(meeting_store.clone(), config.clone());
    let moderation = ModerationEngine::new(db.clone(), notifier.clone());

    let shutdown = Arc::new(AtomicBool::new(false));

    let cors = match &config.cors_origins {
        Some(origins) => CorsOptions {
            allowed_origins: AllowedOrigins::some_exact(origins),
            ..CorsOptions::default()
        },
        None => CorsOptions::default(),
    }
    .to_cors()
    .expect("Failed to create CORS");

    let worker_config = config.clone();
    let worker_kv = kv.clone();
    let worker_shutdown = shutdown.clone();
    let worker_stats = stats_engine.clone();
    let worker_achievements = achievement_engine.clone();
    let cron_stats = stats_engine.clone();
    let shutdown_flag = shutdown.clone();
    let shutdown_relay = relay.clone();

    rocket::build()
        .manage(config)
        .manage(db)
        .manage(kv)
        .manage(rate_config)
        .manage(RateLimiter::new())
        .manage(Queues {
            achievement: achievement_queue.clone(),
            stats_sync: stats_sync_queue.clone(),
        })
        .manage(leaderboard)
        .manage(stats_engine)
        .manage(achievement_engine)
        .manage(meeting_store)
        .manage(relay)
        .manage(moderation)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![
                routes::bad_request,
                routes::unauthorized,
                routes::forbidden,
                routes::not_found,
                routes::unprocessable,
                routes::too_many_requests,
                routes::internal_error,
            ],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                // gamification events
                routes::quiz_completed,
                routes::result_saved,
                routes::live_session_ended,
                routes::quiz_created,
                routes::social_interaction,
                // stats
                routes::get_user_stats,
                routes::sync_user_stats,
                routes::bulk_update_stats,
                // leaderboards
                routes::get_leaderboard,
                routes::category_leaderboard,
                routes::user_rank,
                routes::category_rank,
                routes::surrounding_users,
                routes::rebuild_leaderboard,
                routes::reset_leaderboard,
                // achievements
                routes::list_achievements,
                routes::user_achievements,
                routes::create_achievement,
                routes::seed_achievements,
                routes::update_achievement,
                routes::delete_achievement,
                routes::set_achievement_progress,
                // meetings + signaling
                routes::create_meeting,
                routes::get_meeting,
                routes::signal_connect,
                routes::signal_event,
                routes::signal_drain,
                routes::signal_stream,
                routes::signal_disconnect,
                // moderation
                routes::create_report,
                routes::list_reports,
                routes::report_stats,
                routes::my_reports,
                routes::update_report_status,
                routes::bulk_update_reports,
                routes::resolve_report,
                routes::dismiss_report,
                routes::create_action,
                routes::list_actions,
                routes::user_actions,
                routes::revoke_action,
                routes::check_banned,
                routes::banned_users,
                routes::expire_check,
                routes::create_appeal,
                routes::list_appeals,
                routes::my_appeals,
                routes::review_appeal,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Background Workers",
            move |_rocket| {
                Box::pin(async move {
                    spawn_workers(
                        worker_config,
                        worker_kv,
                        achievement_queue,
                        stats_sync_queue,
                        worker_stats,
                        worker_achievements,
                        cron_stats,
                        worker_shutdown,
                    );
                    println!("⚙️  Queue workers and cron tasks started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Graceful Teardown",
            move |_rocket| {
                Box::pin(async move {
                    // Workers finish their current job and refuse new ones;
                    // live signaling rooms reconcile before the cache dies
                    // with the process.
                    shutdown_flag.store(true, Ordering::Relaxed);
                    shutdown_relay.disconnect_all();
                    println!("🛑 Background workers stopping");
                })
            },
        ))
}

#[allow(clippy::too_many_arguments)]
fn spawn_workers(
    config: Arc<Config>,
    kv: Kv,
    achievement_queue: JobQueue,
    stats_sync_queue: JobQueue,
    stats_engine: StatsEngine,
    achievement_engine: AchievementEngine,
    cron_stats: StatsEngine,
    shutdown: Arc<AtomicBool>,
) {
    let poll = Duration::from_millis(config.queue_poll_interval_ms.max(10));

    let check_stats = stats_engine.clone();
    jobs::spawn_worker(
        achievement_queue,
        jobs::ACHIEVEMENT_CONCURRENCY,
        poll,
        shutdown.clone(),
        Arc::new(move |job: &Job| {
            let user_id = job.payload["userId"]
                .as_str()
                .ok_or_else(|| "achievement check without userId".to_string())?;
            let event: AchievementEvent = serde_json::from_value(job.payload["event"].clone())
                .map_err(|e| format!("malformed achievement event: {e}"))?;
            let snapshot = check_stats.get_stats(user_id).map_err(|e| e.to_string())?;
            achievement_engine
                .run_check(user_id, &event, &snapshot)
                .map_err(|e| e.to_string())?;
            Ok(())
        }),
    );

    let sync_stats = stats_engine.clone();
    jobs::spawn_worker(
        stats_sync_queue,
        jobs::STATS_SYNC_CONCURRENCY,
        poll,
        shutdown.clone(),
        Arc::new(move |job: &Job| {
            let user_id = job.payload["userId"]
                .as_str()
                .ok_or_else(|| "stats sync without userId".to_string())?;
            sync_stats.sync_to_db(user_id).map_err(|e| e.to_string())
        }),
    );

    cron::spawn_streak_reaper(stats_engine, shutdown.clone());
    cron::spawn_stats_sync_tick(cron_stats, config.stats_sync_interval_ms, shutdown.clone());
    kv::spawn_expiry_sweeper(kv, shutdown);
}
