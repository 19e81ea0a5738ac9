// Integration test suite for the LearnHub coordination core.
//
// Organized into focused modules by surface area. All modules share the
// common::TestClient for database lifecycle management; each test runs a
// full Rocket instance against its own throwaway SQLite file.

mod common;

mod achievements;
mod appeals;
mod events;
mod health;
mod leaderboards;
mod rate_limits;
mod signaling;
mod stats;
