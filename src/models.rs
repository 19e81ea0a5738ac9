use serde::{Deserialize, Serialize};

// Wire field names follow the platform's JSON convention (camelCase);
// producers and the browser client already speak it.

// --- Gamification events ---

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    pub percentage: f64,
    pub points_earned: f64,
    #[serde(default)]
    pub bonus_points: f64,
    #[serde(default)]
    pub experience: f64,
    pub passed: bool,
    pub total_time_taken: f64,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCompletedEvent {
    pub user_id: String,
    pub quiz_id: String,
    pub result_data: ResultData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSavedEvent {
    pub user_id: String,
    pub result_id: String,
    #[serde(default)]
    pub result_data: Option<ResultSavedData>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultSavedData {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionParticipant {
    pub user_id: String,
    pub points: f64,
    #[serde(default)]
    pub bonus_points: f64,
    pub rank: i64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub total_time: f64,
    #[serde(default)]
    pub experience: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSessionEndedEvent {
    pub session_id: String,
    pub participants: Vec<SessionParticipant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCreatedEvent {
    pub user_id: String,
    pub quiz_id: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialInteractionEvent {
    pub user_id: String,
    pub interaction_type: String,
}

// --- Stats ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub total_quizzes_taken: i64,
    pub total_quizzes_created: i64,
    pub total_points: f64,
    pub current_streak: i64,
    pub longest_streak: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_quiz_date: Option<String>,
    pub average_score: i64,
    /// Minutes.
    pub total_time_spent: i64,
    pub level: i64,
    pub experience: f64,
    pub favorite_categories: Vec<String>,
}

impl UserStats {
    pub fn initial(user_id: &str) -> Self {
        UserStats {
            user_id: user_id.to_string(),
            total_quizzes_taken: 0,
            total_quizzes_created: 0,
            total_points: 0.0,
            current_streak: 0,
            longest_streak: 0,
            last_quiz_date: None,
            average_score: 0,
            total_time_spent: 0,
            level: 1,
            experience: 0.0,
            favorite_categories: vec![],
        }
    }
}

// --- Achievements ---

pub const ACHIEVEMENT_TYPES: &[&str] = &[
    "quiz_completion",
    "score_achievement",
    "streak",
    "speed",
    "category_master",
    "special",
];

pub const RARITIES: &[&str] = &["common", "rare", "epic", "legendary"];

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub achievement_type: String,
    pub criteria: AchievementCriteria,
    pub rarity: String,
    pub points: i64,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AchievementCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAchievement {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "type")]
    pub achievement_type: String,
    #[serde(default)]
    pub criteria: AchievementCriteria,
    #[serde(default = "default_rarity")]
    pub rarity: String,
    #[serde(default)]
    pub points: i64,
}

fn default_rarity() -> String {
    "common".to_string()
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub achievement_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub rarity: String,
    pub points: i64,
    pub progress: i64,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<String>,
}

// --- Leaderboards ---

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub score: f64,
    pub user: serde_json::Value,
}

// --- Meetings ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSettings {
    #[serde(default)]
    pub allow_recording: bool,
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default = "default_true")]
    pub allow_screen_share: bool,
    #[serde(default = "default_true")]
    pub allow_chat: bool,
    #[serde(default)]
    pub lock_room: bool,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        MeetingSettings {
            allow_recording: false,
            require_approval: false,
            allow_screen_share: true,
            allow_chat: true,
            lock_room: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub room_id: String,
    pub title: String,
    pub host_id: String,
    pub status: String,
    pub max_participants: i64,
    pub settings: MeetingSettings,
    pub topology: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeeting {
    pub title: String,
    #[serde(default = "default_max_participants")]
    pub max_participants: i64,
    #[serde(default)]
    pub settings: MeetingSettings,
    #[serde(default = "default_topology")]
    pub topology: String,
    #[serde(default)]
    pub scheduled_at: Option<String>,
}

fn default_max_participants() -> i64 {
    50
}

fn default_topology() -> String {
    "mesh".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub user_name: String,
    pub peer_id: String,
    pub connection_id: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    pub video_quality: String,
    pub joined_at: String,
}

// --- Signaling payloads ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeetingMsg {
    pub room_id: String,
    pub user_id: String,
    pub user_name: String,
}

/// Directed WebRTC primitive: offer, answer, or ICE candidate. The
/// payload travels opaque; the relay never inspects SDP.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetedSignal {
    pub target_socket_id: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleMsg {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoQualityMsg {
    pub quality: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMsg {
    pub message: String,
}

// --- Moderation ---

pub const CONTENT_TYPES: &[&str] = &["post", "comment", "user", "quiz", "message", "other"];

pub const REPORT_REASONS: &[&str] = &[
    "spam",
    "harassment",
    "hate_speech",
    "violence",
    "misinformation",
    "inappropriate_content",
    "copyright",
    "impersonation",
    "other",
];

pub const ACTION_TYPES: &[&str] = &[
    "warning",
    "mute",
    "suspend",
    "ban",
    "unban",
    "content_removal",
    "account_restriction",
    "privilege_revoke",
];

pub const DURATION_UNITS: &[&str] = &["hours", "days", "weeks", "months", "permanent"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReport {
    #[serde(default)]
    pub reported_user_id: Option<String>,
    #[serde(default)]
    pub reported_content_id: Option<String>,
    pub content_type: String,
    pub reason: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportStatus {
    pub status: String,
    #[serde(default)]
    pub moderator_notes: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReportUpdate {
    pub report_ids: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub moderator_notes: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActionDuration {
    pub value: i64,
    pub unit: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAction {
    pub target_user_id: String,
    pub action_type: String,
    pub reason: String,
    #[serde(default)]
    pub duration: Option<ActionDuration>,
    #[serde(default)]
    pub related_report_id: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeAction {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppeal {
    pub action_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAppeal {
    /// `approved` or `rejected`.
    pub status: String,
    #[serde(default)]
    pub review_notes: Option<String>,
}
