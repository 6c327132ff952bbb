//! # Message IUs
//!
//! Fire-and-forget: one snapshot on publication, a MESSAGE event on every
//! subscriber, no table entry anywhere and no traffic afterwards.

use super::harness::{wait_until, Network, CONVERGENCE_TIMEOUT};
use iu_buffers::{AccessMode, Iu, IuEventType, LocalIu, Payload};
use std::sync::Arc;

/// Test: subscribers see MESSAGE events and never store the IU
#[test]
fn test_message_is_event_only() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let c = net.component("c", &["cat1"]);

    let message = Arc::new(
        LocalIu::message("cat1").with_payload([("word", "hello")].into_iter().collect::<Payload>()),
    );
    a.output.add(Arc::clone(&message)).unwrap();
    assert!(a.output.is_empty());
    assert!(message.is_published());

    let uid = message.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.events.count(&uid, IuEventType::Message) == 1
            && c.events.count(&uid, IuEventType::Message) == 1
    }));
    assert!(b.input.get(&uid).is_none());
    assert!(c.input.is_empty());
    assert_eq!(b.events.count(&uid, IuEventType::Added), 0);

    let seen = b.events.of_type(IuEventType::Message);
    let proxy = &seen[0].iu;
    assert_eq!(proxy.access_mode(), AccessMode::Message);
    assert!(proxy.is_read_only());
    assert_eq!(proxy.payload_value("word").as_deref(), Some("hello"));
}

/// Test: writes to a received message stay on the receiving side
#[test]
fn test_message_proxy_writes_are_local() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);

    let message = Arc::new(LocalIu::message("cat1"));
    a.output.add(Arc::clone(&message)).unwrap();
    let uid = message.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.events.count(&uid, IuEventType::Message) == 1
    }));
    let proxy = Arc::clone(&b.events.of_type(IuEventType::Message)[0].iu);

    let published = net.transport.frames_published();
    proxy.put("note", "local").unwrap();
    proxy.add_links("about", &["x"]).unwrap();
    proxy.commit().unwrap();

    assert_eq!(proxy.payload_value("note").as_deref(), Some("local"));
    assert!(proxy.is_committed());
    assert_eq!(net.transport.frames_published(), published);
    assert!(message.payload().is_empty());
    assert!(!message.is_committed());
    assert_eq!(a.events.len(), 0);
}

/// Test: owner-side writes after publication are not broadcast
#[test]
fn test_published_message_writes_are_local() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let message = Arc::new(LocalIu::message("cat1"));
    a.output.add(Arc::clone(&message)).unwrap();

    let published = net.transport.frames_published();

    message.put("late", "edit").unwrap();
    message.commit().unwrap();
    assert_eq!(message.payload_value("late").as_deref(), Some("edit"));
    assert!(message.is_committed());
    assert_eq!(message.revision(), 1);
    assert_eq!(net.transport.frames_published(), published);
}
