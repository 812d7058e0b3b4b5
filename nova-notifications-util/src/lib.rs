pub mod error;
pub mod presentation;
pub mod request;

pub use error::IngestError;
pub use nova_notifications_config::Theme;
pub use presentation::{Bounds, Point, ResolvedTheme, SurfaceCommand, SurfaceEvent};
pub use request::{BroadcastDatagram, NewNotification, NotifyRequest, NotifyResponse};

use serde::{Deserialize, Serialize};
use std::{fmt, time::SystemTime};
use uuid::Uuid;

/// Identifier of a single notification, unique across the active and queued sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Time-ordered id: a millisecond timestamp followed by random bits (UUIDv7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a running engine, used to recognise our own broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a notification entered the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// HTTP endpoint, command line, or a forwarded secondary invocation.
    Local,
    /// A datagram received from another instance.
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Queued,
    Active,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub content: String,
    pub timeout_ms: u64,
    /// Timeout as submitted, before the default was applied
    pub requested_timeout: Option<u64>,
    pub broadcast: bool,
    pub sender_instance_id: Option<InstanceId>,
    pub origin: Origin,
    pub time: SystemTime,
}

impl Notification {
    /// Whether this notification should be re-emitted over UDP after local display.
    ///
    /// Notifications that arrived over UDP are never re-broadcast.
    pub fn should_broadcast(&self) -> bool {
        self.broadcast && self.origin == Origin::Local
    }

    pub fn duration_since(&self) -> Option<std::time::Duration> {
        SystemTime::now().duration_since(self.time).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(origin: Origin, broadcast: bool) -> Notification {
        Notification {
            id: NotificationId::generate(),
            title: "t".into(),
            content: "c".into(),
            timeout_ms: 5000,
            requested_timeout: None,
            broadcast,
            sender_instance_id: None,
            origin,
            time: SystemTime::now(),
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> =
            (0..1000).map(|_| NotificationId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_generated_ids_sort_by_creation() {
        let first = NotificationId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = NotificationId::generate();
        assert!(first < second);
    }

    #[test]
    fn test_udp_origin_never_broadcasts() {
        assert!(notification(Origin::Local, true).should_broadcast());
        assert!(!notification(Origin::Local, false).should_broadcast());
        assert!(!notification(Origin::Udp, true).should_broadcast());
    }

    #[test]
    fn test_instance_id_serializes_as_plain_string() {
        let id = InstanceId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
