use crate::stats::StatsEngine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Daily streak reaper: once past midnight, any user without recorded
/// activity in the last 24 hours loses their current streak.
pub fn spawn_streak_reaper(stats: StatsEngine, shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(until_next_midnight()).await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let reset = run_streak_reaper(&stats);
            if reset > 0 {
                eprintln!("🧹 Streak reaper: reset {reset} inactive streaks");
            }
        }
    });
}

/// One reaper sweep over every user the durable store knows about.
/// Returns the number of streaks reset.
pub fn run_streak_reaper(stats: &StatsEngine) -> usize {
    stats
        .all_stat_user_ids()
        .iter()
        .filter(|user_id| stats.reset_streak_if_inactive(user_id))
        .count()
}

/// Periodic spill tick: re-enqueue a sync job for every known user so
/// cached counters reconcile to the durable store even when no event has
/// fired recently.
pub fn spawn_stats_sync_tick(stats: StatsEngine, interval_ms: u64, shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let interval = Duration::from_millis(interval_ms.max(1000));
        loop {
            tokio::time::sleep(interval).await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            for user_id in stats.all_stat_user_ids() {
                stats.enqueue_sync(&user_id);
            }
        }
    });
}

fn until_next_midnight() -> Duration {
    let now = chrono::Local::now();
    let tomorrow = (now + chrono::Duration::days(1)).date_naive();
    let midnight = tomorrow
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_local());
    let until = midnight - now.naive_local();
    until.to_std().unwrap_or(Duration::from_secs(24 * 3600))
}
