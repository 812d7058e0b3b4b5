use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{InstanceId, IngestError, Notification, NotificationId, Origin};

/// Body of `POST /notify`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Countdown in milliseconds. Absent or zero means the configured default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<bool>,
}

impl NotifyRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn validate(self) -> Result<NewNotification, IngestError> {
        let (title, content) = require_text(self.title, self.content)?;
        Ok(NewNotification {
            title,
            content,
            timeout_ms: self.timeout,
            broadcast: self.broadcast.unwrap_or(false),
            sender_instance_id: None,
            origin: Origin::Local,
        })
    }
}

/// Acknowledgement body returned by the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotifyResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// JSON datagram exchanged between instances over UDP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BroadcastDatagram {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub broadcast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_instance_id: Option<InstanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl BroadcastDatagram {
    pub fn outbound(notification: &Notification, sender: &InstanceId, key: Option<&str>) -> Self {
        Self {
            title: Some(notification.title.clone()),
            content: Some(notification.content.clone()),
            timeout: notification.requested_timeout,
            broadcast: true,
            sender_instance_id: Some(sender.clone()),
            key: key.map(str::to_string),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IngestError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and filter a received datagram.
    ///
    /// Checks run in order: decoding, loopback suppression, shape validation,
    /// then the shared key when `shared_key` is non-empty.
    pub fn screen(
        bytes: &[u8],
        local: &InstanceId,
        shared_key: &str,
    ) -> Result<NewNotification, IngestError> {
        let datagram: Self = serde_json::from_slice(bytes)?;

        if datagram.sender_instance_id.as_ref() == Some(local) {
            return Err(IngestError::Loopback);
        }

        let (title, content) = require_text(datagram.title, datagram.content)?;

        if !shared_key.is_empty() && datagram.key.as_deref() != Some(shared_key) {
            return Err(IngestError::Auth);
        }

        Ok(NewNotification {
            title,
            content,
            timeout_ms: datagram.timeout,
            broadcast: false,
            sender_instance_id: datagram.sender_instance_id,
            origin: Origin::Udp,
        })
    }
}

/// A validated request, not yet admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub content: String,
    pub timeout_ms: Option<u64>,
    pub broadcast: bool,
    pub sender_instance_id: Option<InstanceId>,
    pub origin: Origin,
}

impl NewNotification {
    pub fn local(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            timeout_ms: None,
            broadcast: false,
            sender_instance_id: None,
            origin: Origin::Local,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Assign an id and resolve an absent or zero timeout to `default_timeout`.
    pub fn admit(self, default_timeout: u64) -> Notification {
        let timeout_ms = match self.timeout_ms {
            Some(ms) if ms > 0 => ms,
            _ => default_timeout,
        };
        Notification {
            id: NotificationId::generate(),
            title: self.title,
            content: self.content,
            timeout_ms,
            requested_timeout: self.timeout_ms,
            broadcast: self.broadcast,
            sender_instance_id: self.sender_instance_id,
            origin: self.origin,
            time: SystemTime::now(),
        }
    }
}

fn require_text(
    title: Option<String>,
    content: Option<String>,
) -> Result<(String, String), IngestError> {
    match (title, content) {
        (Some(title), Some(content)) if !title.is_empty() && !content.is_empty() => {
            Ok((title, content))
        }
        _ => Err(IngestError::Validation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_missing_timeout_use_default() {
        let n = NewNotification::local("A", "B").admit(5000);
        assert_eq!(n.timeout_ms, 5000);

        let n = NewNotification::local("A", "B").with_timeout(Some(0)).admit(5000);
        assert_eq!(n.timeout_ms, 5000);

        let n = NewNotification::local("A", "B").with_timeout(Some(1200)).admit(5000);
        assert_eq!(n.timeout_ms, 1200);
    }

    #[test]
    fn test_outbound_leaves_default_to_receiver() {
        let sender = InstanceId::from("me");
        let defaulted = NewNotification::local("A", "B").with_broadcast(true).admit(5000);
        let datagram = BroadcastDatagram::outbound(&defaulted, &sender, None);
        assert_eq!(datagram.timeout, None);

        let bytes = datagram.to_bytes().unwrap();
        let received = BroadcastDatagram::screen(&bytes, &InstanceId::from("peer"), "")
            .unwrap()
            .admit(8000);
        assert_eq!(received.timeout_ms, 8000);

        let explicit = NewNotification::local("A", "B").with_timeout(Some(1500)).admit(5000);
        assert_eq!(BroadcastDatagram::outbound(&explicit, &sender, None).timeout, Some(1500));
    }

    #[test]
    fn test_empty_strings_fail_validation() {
        let request = NotifyRequest {
            title: Some(String::new()),
            content: Some("body".into()),
            ..Default::default()
        };
        assert!(matches!(request.validate(), Err(IngestError::Validation)));
    }

    #[test]
    fn test_loopback_checked_before_shape() {
        let local = InstanceId::from("me");
        let bytes = br#"{"senderInstanceId":"me"}"#;
        assert!(matches!(
            BroadcastDatagram::screen(bytes, &local, ""),
            Err(IngestError::Loopback)
        ));
    }

    #[test]
    fn test_shape_checked_before_key() {
        let local = InstanceId::from("me");
        let bytes = br#"{"title":"A","senderInstanceId":"peer","key":"wrong"}"#;
        assert!(matches!(
            BroadcastDatagram::screen(bytes, &local, "abc"),
            Err(IngestError::Validation)
        ));
    }
}
