use std::sync::Arc;

/// Outbound cross-service notifier. Every call is fire-and-forget: the
/// POST happens on a spawned task, failures are logged, and the caller's
/// request never waits on a collaborator. Services continue if a
/// collaborator is down.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    social_service_url: Option<String>,
    account_service_url: Option<String>,
}

impl Notifier {
    pub fn new(social_service_url: Option<String>, account_service_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Notifier {
            client,
            social_service_url,
            account_service_url,
        }
    }

    /// `POST {social}/api/events/achievement-unlocked`, one call per unlock.
    pub fn achievement_unlocked(&self, user_id: &str, achievement: &crate::models::Achievement) {
        let Some(base) = &self.social_service_url else {
            return;
        };
        let url = format!("{base}/api/events/achievement-unlocked");
        let body = serde_json::json!({
            "userId": user_id,
            "achievement": {
                "id": achievement.id,
                "name": achievement.name,
                "description": achievement.description,
                "icon": achievement.icon,
                "rarity": achievement.rarity,
                "points": achievement.points,
            },
        });
        self.post(url, body, "achievement-unlocked");
    }

    /// `POST {account}/api/internal/moderation-action` on apply.
    pub fn moderation_action(
        &self,
        user_id: &str,
        action_type: &str,
        expires_at: Option<&str>,
        action_id: &str,
    ) {
        let Some(base) = &self.account_service_url else {
            return;
        };
        let url = format!("{base}/api/internal/moderation-action");
        let body = serde_json::json!({
            "userId": user_id,
            "actionType": action_type,
            "expiresAt": expires_at,
            "moderationActionId": action_id,
        });
        self.post(url, body, "moderation-action");
    }

    /// Symmetric revocation notice.
    pub fn moderation_revoked(&self, user_id: &str, action_type: &str, action_id: &str) {
        let Some(base) = &self.account_service_url else {
            return;
        };
        let url = format!("{base}/api/internal/moderation-revoked");
        let body = serde_json::json!({
            "userId": user_id,
            "actionType": action_type,
            "moderationActionId": action_id,
        });
        self.post(url, body, "moderation-revoked");
    }

    fn post(&self, url: String, body: serde_json::Value, what: &'static str) {
        let request = self.client.post(&url).json(&body);
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    eprintln!("⚠️ {what} notification to {url} failed: HTTP {}", resp.status());
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("⚠️ {what} notification to {url} error: {e}");
                }
            }
        });
    }
}

/// Shared handle used by engines that may fire notifications from worker
/// tasks as well as request handlers.
pub type SharedNotifier = Arc<Notifier>;
