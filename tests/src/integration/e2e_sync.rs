//! # Owner to Proxy Synchronisation
//!
//! ```text
//! [Component A]                                  [Component B]
//! OutputBuffer ──snapshot / deltas (cat1)──→ InputBuffer
//!      ↑                                             │
//!      └───────── updatePayload / updateLinks ───────┘
//! ```

use super::harness::{wait_until, Network, CONVERGENCE_TIMEOUT};
use iu_buffers::{
    BufferConfig, BufferContext, InputBuffer, Iu, IuEventType, LinkSet, LocalIu, Payload,
    PayloadType,
};
use iu_bus::WireCodec;
use std::sync::Arc;

fn payload(items: &[(&str, &str)]) -> Payload {
    items.iter().copied().collect()
}

/// Test: the full round trip, owner write then proxy write back
#[test]
fn test_end_to_end_payload_sync() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);

    let iu = Arc::new(
        LocalIu::new("cat1")
            .with_uid("iu1")
            .with_payload(payload(&[("key1", "item1")])),
    );
    a.output.add(Arc::clone(&iu)).unwrap();

    assert!(
        wait_until(CONVERGENCE_TIMEOUT, || b.input.get("iu1").is_some()),
        "B should observe iu1"
    );
    let proxy = b.input.get("iu1").unwrap();
    assert_eq!(proxy.payload(), payload(&[("key1", "item1")]));
    assert_eq!(proxy.revision(), 1);
    assert_eq!(proxy.owner_name().as_deref(), Some(a.output.unique_name()));

    // Step 1: owner writes, proxy converges
    iu.put("key2", "value2").unwrap();
    assert_eq!(iu.revision(), 2);
    assert!(wait_until(CONVERGENCE_TIMEOUT, || proxy.revision() == 2));
    assert_eq!(
        proxy.payload(),
        payload(&[("key1", "item1"), ("key2", "value2")])
    );

    // Step 2: proxy writes through RPC, owner converges synchronously
    proxy.put("key3", "value3").unwrap();
    assert_eq!(proxy.revision(), 3);
    assert_eq!(iu.revision(), 3);
    assert_eq!(iu.payload_value("key3").as_deref(), Some("value3"));
    assert_eq!(iu.payload(), proxy.payload());

    assert_eq!(b.events.count("iu1", IuEventType::Added), 1);
    assert_eq!(a.events.count("iu1", IuEventType::Updated), 1);
    assert!(a.events.of_type(IuEventType::Updated)[0].local);
}

fn assert_snapshot_round_trip(net: &Network) {
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);

    let links: LinkSet = [("T", ["a", "b"])].into_iter().collect();
    let iu = Arc::new(
        LocalIu::new("cat1")
            .with_payload(payload(&[("k1", "v1")]))
            .with_links(links.clone())
            .with_payload_type(PayloadType::Json),
    );
    iu.commit().unwrap();
    a.output.add(Arc::clone(&iu)).unwrap();

    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    assert_eq!(proxy.uid(), iu.uid());
    assert_eq!(proxy.revision(), iu.revision());
    assert_eq!(proxy.revision(), 2);
    assert_eq!(proxy.category(), "cat1");
    assert!(proxy.is_committed());
    assert_eq!(proxy.is_read_only(), iu.is_read_only());
    assert_eq!(proxy.payload_type(), PayloadType::Json);
    assert_eq!(proxy.payload(), iu.payload());
    assert_eq!(proxy.links(), links);
    assert!(!proxy.is_local());
}

/// Test: published snapshot is mirrored field by field (JSON frames)
#[test]
fn test_snapshot_round_trip_json() {
    assert_snapshot_round_trip(&Network::new());
}

/// Test: published snapshot is mirrored field by field (bincode frames)
#[test]
fn test_snapshot_round_trip_bincode() {
    assert_snapshot_round_trip(&Network::with_config(
        BufferConfig::default().with_wire_codec(WireCodec::Bincode),
    ));
}

/// Test: link edits flow both ways
#[test]
fn test_link_sync() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);

    let iu = Arc::new(LocalIu::new("cat1").with_links([("T", ["a", "b"])].into_iter().collect()));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    iu.add_links("T", &["c"]).unwrap();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || proxy.link_targets("T").len() == 3));

    iu.set_links("T", &["z"]).unwrap();
    iu.add_links("grounded_in", &["x"]).unwrap();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || proxy.revision() == 4));
    assert_eq!(proxy.links(), iu.links());
    assert_eq!(
        proxy.link_targets("T").into_iter().collect::<Vec<_>>(),
        vec!["z".to_string()]
    );

    proxy.remove_links("T", &["z"]).unwrap();
    assert!(!iu.links().contains("T", "z"));
    assert_eq!(iu.links().link_types().count(), 1);
    assert_eq!(iu.revision(), 5);
    assert_eq!(a.events.count(&uid, IuEventType::LinksUpdated), 1);
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.events.count(&uid, IuEventType::LinksUpdated) == 3
    }));
}

/// Test: whole-payload replacement drops keys on the proxy too
#[test]
fn test_payload_replacement_sync() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);

    let iu = Arc::new(LocalIu::new("cat1").with_payload(payload(&[("old", "1"), ("keep", "2")])));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    iu.set_payload(payload(&[("keep", "3"), ("new", "4")])).unwrap();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || proxy.revision() == 2));
    assert_eq!(proxy.payload(), payload(&[("keep", "3"), ("new", "4")]));

    proxy.set_payload(payload(&[("only", "5")])).unwrap();
    assert_eq!(iu.payload(), payload(&[("only", "5")]));
    assert_eq!(iu.revision(), 3);
}

/// Test: buffers on another channel never see the IU
#[test]
fn test_channels_are_isolated() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let other_context = BufferContext::new(
        net.transport.clone(),
        BufferConfig::default().with_channel("other"),
    );
    let other = InputBuffer::new("c", ["cat1"], &other_context).unwrap();
    let same = net.component("b", &["cat1"]);

    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || same.input.get(&uid).is_some()));
    assert!(other.is_empty());
}
