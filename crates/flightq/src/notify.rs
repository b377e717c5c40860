//! User-facing notifications about update cycles.
//!
//! Delivery is fire-and-forget: a notifier never reports failure back to
//! the update worker. Short-lived callers use [`Notifiers::flush`] to wait
//! for deliveries still in flight before exiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Whether following the notification leads somewhere useful (the
    /// statistics view).
    pub actionable: bool,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>, actionable: bool) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            actionable,
        }
    }

    /// No route has highlighted flights.
    #[must_use]
    pub fn no_routes() -> Self {
        Self::new(
            "No flights to update",
            "No highlighted flights were found for updating statistics.",
            false,
        )
    }

    /// A cycle updated `count` flights.
    #[must_use]
    pub fn updated(count: usize) -> Self {
        Self::new(
            "Flight Statistics Updated",
            format!("Updated statistics for {count} flights"),
            true,
        )
    }

    /// A cycle finished without updating anything.
    #[must_use]
    pub fn nothing_updated() -> Self {
        Self::new(
            "Flight Update Complete",
            "No new flight statistics were available for update.",
            false,
        )
    }

    /// A cycle failed.
    #[must_use]
    pub fn failed(error: &impl std::fmt::Display) -> Self {
        Self::new(
            "Flight Update Failed",
            format!("Error updating flight statistics: {error}"),
            false,
        )
    }
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    /// Deliver `notification`. Must not block on I/O.
    fn notify(&self, notification: &Notification);

    /// Hand over deliveries still running in the background.
    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        Vec::new()
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            title = %notification.title,
            actionable = notification.actionable,
            "{}",
            notification.message
        );
    }
}

/// POSTs notifications as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            pending: Arc::default(),
        }
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: &Notification) {
        let payload = serde_json::json!({
            "title": notification.title,
            "message": notification.message,
            "actionable": notification.actionable,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(url = %self.url, "No async runtime, webhook notification dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let task = handle.spawn(async move {
            if let Err(e) = client.post(&url).json(&payload).send().await {
                warn!(url = %url, error = %e.without_url(), "Webhook POST failed");
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|t| !t.is_finished());
        pending.push(task);
    }

    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Delivers to several notifiers in order.
#[derive(Default)]
pub struct Notifiers {
    sinks: Vec<Box<dyn Notifier>>,
}

impl std::fmt::Debug for Notifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifiers")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Notifiers {
    /// The log notifier, plus a webhook when one is configured.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut notifiers = Self::default();
        notifiers.push(LogNotifier);
        if let Some(url) = &config.webhook_url {
            notifiers.push(WebhookNotifier::new(url));
        }
        notifiers
    }

    /// Add a notifier.
    pub fn push(&mut self, notifier: impl Notifier + 'static) {
        self.sinks.push(Box::new(notifier));
    }

    /// Number of notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no notifier is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Wait up to `timeout` for background deliveries to finish.
    ///
    /// Returns `false` if some were still running at the deadline; those are
    /// left to the runtime.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let pending = self.take_pending();
        if pending.is_empty() {
            return true;
        }

        let count = pending.len();
        let waited = tokio::time::timeout(timeout, async {
            for task in pending {
                let _ = task.await;
            }
        })
        .await;

        if waited.is_err() {
            warn!(count, ?timeout, "Notifications still pending at exit");
            return false;
        }
        debug!(count, "Flushed pending notifications");
        true
    }
}

impl Notifier for Notifiers {
    fn notify(&self, notification: &Notification) {
        for sink in &self.sinks {
            sink.notify(notification);
        }
    }

    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        self.sinks.iter().flat_map(|s| s.take_pending()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Notification>>>);

    impl Notifier for Recording {
        fn notify(&self, notification: &Notification) {
            self.0.lock().unwrap().push(notification.clone());
        }
    }

    #[test]
    fn test_notification_texts() {
        assert_eq!(Notification::no_routes().title, "No flights to update");
        assert_eq!(
            Notification::updated(2).message,
            "Updated statistics for 2 flights"
        );
        assert!(Notification::updated(2).actionable);
        assert_eq!(
            Notification::nothing_updated().message,
            "No new flight statistics were available for update."
        );

        let failed = Notification::failed(&"disk full");
        assert_eq!(failed.title, "Flight Update Failed");
        assert_eq!(failed.message, "Error updating flight statistics: disk full");
        assert!(!failed.actionable);
    }

    #[test]
    fn test_notifiers_fan_out() {
        let a = Recording::default();
        let b = Recording::default();
        let mut notifiers = Notifiers::default();
        notifiers.push(a.clone());
        notifiers.push(b.clone());

        notifiers.notify(&Notification::nothing_updated());

        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_notifiers_from_config() {
        let config = NotificationConfig::default();
        assert_eq!(Notifiers::from_config(&config).len(), 1);

        let config = NotificationConfig {
            webhook_url: Some("http://localhost:9/hook".to_string()),
        };
        assert_eq!(Notifiers::from_config(&config).len(), 2);
    }

    #[test]
    fn test_webhook_without_runtime_does_not_panic() {
        WebhookNotifier::new("http://localhost:9/hook").notify(&Notification::no_routes());
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notifier = WebhookNotifier::new(&format!("http://{addr}/hook"));
        assert!(notifier.url().ends_with("/hook"));

        notifier.notify(&Notification::updated(3));

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !String::from_utf8_lossy(&received).contains("actionable") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        let request = String::from_utf8_lossy(&received);
        assert!(request.starts_with("POST /hook"));
        assert!(request.contains("Updated statistics for 3 flights"));
    }

    #[tokio::test]
    async fn test_flush_waits_for_webhook_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&delivered);
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !String::from_utf8_lossy(&received).contains("actionable") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            seen.lock().unwrap().push(String::from_utf8_lossy(&received).into_owned());
            let reply = "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n";
            socket.write_all(reply.as_bytes()).await.unwrap();
        });

        let mut notifiers = Notifiers::default();
        notifiers.push(WebhookNotifier::new(&format!("http://{addr}/hook")));
        notifiers.notify(&Notification::updated(1));

        assert!(notifiers.flush(Duration::from_secs(5)).await);
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("Updated statistics for 1 flights"));
        assert!(notifiers.take_pending().is_empty());
    }

    #[tokio::test]
    async fn test_flush_gives_up_on_stalled_webhook() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let mut notifiers = Notifiers::default();
        notifiers.push(WebhookNotifier::new(&format!("http://{addr}/hook")));
        notifiers.notify(&Notification::no_routes());

        assert!(!notifiers.flush(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_flush_without_pending_deliveries() {
        let mut notifiers = Notifiers::default();
        notifiers.push(LogNotifier);
        notifiers.notify(&Notification::no_routes());
        assert!(notifiers.flush(Duration::from_millis(1)).await);
    }
}
