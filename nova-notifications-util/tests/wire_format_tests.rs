//! Integration tests for the HTTP and UDP wire formats
//!
//! These tests verify request decoding and datagram screening without
//! opening any sockets.

use nova_notifications_util::{
    BroadcastDatagram, IngestError, InstanceId, NotifyRequest, NotifyResponse, Origin,
};

const DEFAULT_TIMEOUT: u64 = 5000;

#[test]
fn test_http_request_minimal() {
    // Test: the smallest accepted body resolves to the default timeout
    let request = NotifyRequest::from_json(br#"{"title":"A","content":"B"}"#).unwrap();
    let notification = request.validate().unwrap().admit(DEFAULT_TIMEOUT);

    assert_eq!(notification.title, "A");
    assert_eq!(notification.content, "B");
    assert_eq!(notification.timeout_ms, 5000);
    assert!(!notification.broadcast);
    assert_eq!(notification.origin, Origin::Local);
}

#[test]
fn test_http_request_all_fields() {
    let body = br#"{"title":"Deploy","content":"**done**","timeout":10000,"broadcast":true}"#;
    let notification = NotifyRequest::from_json(body)
        .unwrap()
        .validate()
        .unwrap()
        .admit(DEFAULT_TIMEOUT);

    assert_eq!(notification.timeout_ms, 10000);
    assert!(notification.broadcast);
    assert!(notification.should_broadcast());
}

#[test]
fn test_http_request_missing_fields() {
    for body in [
        &br#"{"title":"A"}"#[..],
        br#"{"content":"B"}"#,
        br#"{}"#,
        br#"{"title":"","content":"B"}"#,
    ] {
        let result = NotifyRequest::from_json(body).unwrap().validate();
        assert!(
            matches!(result, Err(IngestError::Validation)),
            "{} should fail validation",
            String::from_utf8_lossy(body)
        );
    }
}

#[test]
fn test_http_request_malformed_json() {
    for body in [&b"{not json"[..], b"", br#""text""#, br#"{"title":"A","content":"B","timeout":-1}"#] {
        assert!(
            matches!(NotifyRequest::from_json(body), Err(IngestError::Protocol(_))),
            "{} should be a protocol error",
            String::from_utf8_lossy(body)
        );
    }
}

#[test]
fn test_response_shapes() {
    let ok = serde_json::to_value(NotifyResponse::accepted("Notification received")).unwrap();
    assert_eq!(ok["success"], true);
    assert_eq!(ok["message"], "Notification received");
    assert!(ok.get("error").is_none());

    let err = serde_json::to_value(NotifyResponse::rejected("nope")).unwrap();
    assert_eq!(err["success"], false);
    assert_eq!(err["error"], "nope");
    assert!(err.get("message").is_none());
}

#[test]
fn test_datagram_field_names() {
    let sender = InstanceId::from("instance-a");
    let notification = NotifyRequest::from_json(br#"{"title":"A","content":"B","timeout":2000,"broadcast":true}"#)
        .unwrap()
        .validate()
        .unwrap()
        .admit(DEFAULT_TIMEOUT);

    let datagram = BroadcastDatagram::outbound(&notification, &sender, Some("abc"));
    let value: serde_json::Value = serde_json::from_slice(&datagram.to_bytes().unwrap()).unwrap();

    assert_eq!(value["title"], "A");
    assert_eq!(value["content"], "B");
    assert_eq!(value["timeout"], 2000);
    assert_eq!(value["broadcast"], true);
    assert_eq!(value["senderInstanceId"], "instance-a");
    assert_eq!(value["key"], "abc");
}

#[test]
fn test_datagram_without_key_omits_field() {
    let sender = InstanceId::from("instance-a");
    let notification = NotifyRequest::from_json(br#"{"title":"A","content":"B"}"#)
        .unwrap()
        .validate()
        .unwrap()
        .admit(DEFAULT_TIMEOUT);

    let bytes = BroadcastDatagram::outbound(&notification, &sender, None)
        .to_bytes()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(value.get("key").is_none());
}

#[test]
fn test_two_instances_sharing_a_broadcast_address() {
    // Test: instance A's own listener discards its broadcast, instance B accepts it
    let a = InstanceId::generate();
    let b = InstanceId::generate();

    let notification = NotifyRequest::from_json(br#"{"title":"A","content":"B","broadcast":true}"#)
        .unwrap()
        .validate()
        .unwrap()
        .admit(DEFAULT_TIMEOUT);
    let bytes = BroadcastDatagram::outbound(&notification, &a, None)
        .to_bytes()
        .unwrap();

    assert!(matches!(
        BroadcastDatagram::screen(&bytes, &a, ""),
        Err(IngestError::Loopback)
    ));

    let received = BroadcastDatagram::screen(&bytes, &b, "").unwrap();
    assert_eq!(received.title, "A");
    assert_eq!(received.origin, Origin::Udp);
    assert!(!received.broadcast, "UDP-origin notifications are never re-broadcast");
    assert_eq!(received.sender_instance_id, Some(a));
}

#[test]
fn test_shared_key_mismatch_is_dropped() {
    let local = InstanceId::from("local");
    let bytes = br#"{"title":"A","content":"B","senderInstanceId":"peer","key":"xyz"}"#;

    assert!(matches!(
        BroadcastDatagram::screen(bytes, &local, "abc"),
        Err(IngestError::Auth)
    ));
}

#[test]
fn test_shared_key_missing_is_dropped() {
    let local = InstanceId::from("local");
    let bytes = br#"{"title":"A","content":"B","senderInstanceId":"peer"}"#;

    assert!(matches!(
        BroadcastDatagram::screen(bytes, &local, "abc"),
        Err(IngestError::Auth)
    ));
}

#[test]
fn test_shared_key_match_is_accepted() {
    let local = InstanceId::from("local");
    let bytes = br#"{"title":"A","content":"B","senderInstanceId":"peer","key":"abc"}"#;

    let accepted = BroadcastDatagram::screen(bytes, &local, "abc").unwrap();
    assert_eq!(accepted.content, "B");
}

#[test]
fn test_no_shared_key_accepts_any_key() {
    let local = InstanceId::from("local");
    let bytes = br#"{"title":"A","content":"B","key":"whatever","timeout":2500}"#;

    let accepted = BroadcastDatagram::screen(bytes, &local, "").unwrap();
    assert_eq!(accepted.timeout_ms, Some(2500));
    assert_eq!(accepted.sender_instance_id, None);
}

#[test]
fn test_datagram_malformed_or_incomplete() {
    let local = InstanceId::from("local");

    assert!(matches!(
        BroadcastDatagram::screen(b"\x00\x01garbage", &local, ""),
        Err(IngestError::Protocol(_))
    ));
    assert!(matches!(
        BroadcastDatagram::screen(br#"{"content":"B","senderInstanceId":"peer"}"#, &local, ""),
        Err(IngestError::Validation)
    ));
}
