//! Fire-and-forget webhook notifications.
//!
//! Operational messages (staging failures, approvals) are POSTed to a
//! configured webhook as `{"content": message}`. Failures are swallowed with
//! a warning; a broken webhook must never break the main flow.

use tracing::warn;

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// A notifier that drops all messages (no webhook configured).
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Send a notification, best-effort.
    pub async fn notify(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let body = serde_json::json!({ "content": message });
        match self.http.post(url).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = %resp.status(), "Notification webhook returned non-success");
            }
            Err(e) => {
                warn!(error = %e, "Notification webhook send failed");
            }
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_is_a_no_op() {
        // Must return without attempting any network I/O.
        Notifier::disabled().notify("hello").await;
    }

    #[tokio::test]
    async fn unreachable_webhook_is_swallowed() {
        let notifier = Notifier::new(Some("http://127.0.0.1:1/webhook".to_string()));
        // The connection is refused; notify must not propagate the error.
        notifier.notify("hello").await;
    }
}
