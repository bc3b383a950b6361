use teloxide::Bot;
use teloxide::requests::Requester;
use teloxide::types::ChatId;
use tracing::{info, error};

use crate::config::Config;
use crate::storage::models::ProviderRole;
use crate::verification::PassSummary;

/// Sends verification pass summaries to configured Telegram chats
pub struct PassNotifier {
    bot: Bot,
    chat_ids: Vec<i64>,
}

impl PassNotifier {
    pub fn new(config: &Config) -> Option<Self> {
        let telegram_config = config.telegram.as_ref()?;

        if !telegram_config.notifications_enabled {
            info!("Telegram notifications are disabled in config");
            return None;
        }

        if telegram_config.chat_ids.is_empty() {
            info!("No chat ids configured for notifications");
            return None;
        }

        info!("Pass notifier initialized for {} chats", telegram_config.chat_ids.len());

        Some(Self {
            bot: Bot::new(telegram_config.bot_token.clone()),
            chat_ids: telegram_config.chat_ids.clone(),
        })
    }

    pub async fn notify_pass_complete(&self, summary: &PassSummary) {
        self.send_to_all(&format_pass_message(summary)).await;
    }

    pub async fn notify_pass_failed(&self, role: ProviderRole, error_msg: &str) {
        self.send_to_all(&format_failure_message(role, error_msg)).await;
    }

    async fn send_to_all(&self, message: &str) {
        for chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(ChatId(*chat_id), message).await {
                error!("Failed to send notification to chat {}: {}", chat_id, e);
            } else {
                info!("Notification sent to chat {}", chat_id);
            }
        }
    }
}

pub fn format_pass_message(summary: &PassSummary) -> String {
    let mut message = format!(
        "Verification pass complete ({} via {})\n\n\
        Providers checked: {}\n\
        Verified: {}\n\
        Revoked: {}\n\
        Failed: {}",
        summary.role,
        summary.source,
        summary.total,
        summary.verified,
        summary.revoked,
        summary.failed
    );

    if !summary.failures.is_empty() {
        let ids: Vec<&str> = summary.failures.iter().map(|f| f.provider_id.as_str()).collect();
        message.push_str(&format!("\nFailed providers: {}", ids.join(", ")));
    }

    if summary.dry_run {
        message.push_str("\n\nDry run, nothing was written");
    }

    message
}

pub fn format_failure_message(role: ProviderRole, error_msg: &str) -> String {
    format!(
        "Verification pass for {} providers aborted\n\n{}\n\nCheck the service logs",
        role, error_msg
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::storage::models::TriggerSource;
    use crate::verification::ProviderFailure;
    use chrono::Utc;

    fn summary() -> PassSummary {
        PassSummary {
            role: ProviderRole::Company,
            source: TriggerSource::Http,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total: 12,
            verified: 2,
            revoked: 1,
            failed: 1,
            dry_run: false,
            failures: vec![ProviderFailure {
                provider_id: "acme".to_string(),
                error: "locked".to_string(),
            }],
        }
    }

    #[test]
    fn test_pass_message() {
        let message = format_pass_message(&summary());
        assert!(message.contains("company via http"));
        assert!(message.contains("Verified: 2"));
        assert!(message.contains("Revoked: 1"));
        assert!(message.contains("Failed providers: acme"));
        assert!(!message.contains("Dry run"));
    }

    #[test]
    fn test_notifier_disabled_without_config() {
        let mut config = Config::default();
        assert!(PassNotifier::new(&config).is_none());

        config.telegram = Some(TelegramConfig {
            bot_token: "token".to_string(),
            chat_ids: vec![42],
            notifications_enabled: false,
        });
        assert!(PassNotifier::new(&config).is_none());

        config.telegram = Some(TelegramConfig {
            bot_token: "token".to_string(),
            chat_ids: vec![],
            notifications_enabled: true,
        });
        assert!(PassNotifier::new(&config).is_none());
    }
}
