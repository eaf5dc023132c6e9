//! Notification relay: one visible message at a time, broadcast to subscribers.
//!
//! `show` replaces whatever is visible immediately; nothing is queued. Each
//! notification auto-dismisses after its duration unless it has already been
//! replaced or dismissed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use crate::config::DEFAULT_NOTIFY_DURATION;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub shown_at: DateTime<Utc>,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Shown { notification: Notification },
    Dismissed { id: Uuid },
}

pub struct NotificationRelay {
    current: RwLock<Option<Notification>>,
    tx: broadcast::Sender<NotificationEvent>,
    default_duration: Duration,
}

impl NotificationRelay {
    pub fn new() -> Arc<Self> {
        Self::with_default_duration(DEFAULT_NOTIFY_DURATION)
    }

    pub fn with_default_duration(default_duration: Duration) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            current: RwLock::new(None),
            tx,
            default_duration,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    /// Show a message for the default duration.
    pub async fn show(self: &Arc<Self>, message: impl Into<String>, severity: Severity) -> Notification {
        self.show_for(message, severity, self.default_duration).await
    }

    /// Show a message, replacing any visible one, and schedule its dismissal.
    pub async fn show_for(
        self: &Arc<Self>,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            duration,
            shown_at: Utc::now(),
        };

        let replaced = self.current.write().await.replace(notification.clone());
        if let Some(old) = replaced {
            debug!(id = %old.id, "Notification replaced");
            let _ = self.tx.send(NotificationEvent::Dismissed { id: old.id });
        }

        debug!(id = %notification.id, %severity, message = %notification.message, "Notification shown");
        let _ = self.tx.send(NotificationEvent::Shown {
            notification: notification.clone(),
        });

        let relay = Arc::clone(self);
        let id = notification.id;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            relay.dismiss(id).await;
        });

        notification
    }

    /// Dismiss the visible notification if it is `id`. Stale ids are ignored.
    pub async fn dismiss(&self, id: Uuid) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|n| n.id == id) {
            *current = None;
            let _ = self.tx.send(NotificationEvent::Dismissed { id });
            true
        } else {
            false
        }
    }

    pub async fn current(&self) -> Option<Notification> {
        self.current.read().await.clone()
    }
}
