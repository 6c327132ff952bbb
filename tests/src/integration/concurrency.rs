//! # Concurrent Writers
//!
//! The owner's RPC handlers take the same per-IU lock as local writers, so
//! every accepted write moves the revision by exactly one and a write based
//! on an old revision is rejected without touching the IU.

use super::harness::{wait_until, Network, CONVERGENCE_TIMEOUT};
use iu_buffers::{Iu, IuError, IuEventType, LocalIu, PayloadType, Uid};
use iu_bus::{RpcMethod, Transport};
use iu_types::{IuMessage, PayloadItem, PayloadUpdate, Revision, ANY_REVISION, FAILED_REVISION};
use std::sync::Arc;
use std::thread;

fn raw_put(net: &Network, owner: &str, uid: &Uid, revision: Revision, key: &str) -> Revision {
    let client = net.transport.connect(owner).unwrap();
    let update = IuMessage::PayloadUpdate(PayloadUpdate {
        uid: uid.clone(),
        revision,
        is_delta: true,
        writer_name: "raw-writer".to_string(),
        payload_type: PayloadType::Str,
        new_items: vec![PayloadItem::new(key, "x", PayloadType::Str)],
        keys_to_remove: Vec::new(),
    });
    let frame = net.context.codecs.encode(&update).unwrap();
    client.call(RpcMethod::UpdatePayload, frame).unwrap()
}

/// Test: stale revision is answered with 0 and leaves the owner untouched
#[test]
fn test_stale_remote_write_rejected() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    iu.put("k1", "v1").unwrap();
    iu.put("k2", "v2").unwrap();
    let before = iu.payload();

    assert_eq!(raw_put(&net, a.output.unique_name(), iu.uid(), 1, "stale"), FAILED_REVISION);
    assert_eq!(raw_put(&net, a.output.unique_name(), iu.uid(), 7, "future"), FAILED_REVISION);
    assert_eq!(iu.revision(), 3);
    assert_eq!(iu.payload(), before);
    assert_eq!(a.events.count(iu.uid().as_str(), IuEventType::Updated), 0);

    assert_eq!(raw_put(&net, a.output.unique_name(), iu.uid(), 3, "current"), 4);
    assert_eq!(raw_put(&net, a.output.unique_name(), iu.uid(), ANY_REVISION, "forced"), 5);
    assert_eq!(iu.payload_value("forced").as_deref(), Some("x"));
    assert_eq!(a.events.count(iu.uid().as_str(), IuEventType::Updated), 2);
}

/// Test: a proxy that missed an update gets UpdateFailed
#[test]
fn test_stale_proxy_write_fails() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let c = net.component("c", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || c.input.get(&uid).is_some()));
    let proxy = c.input.get(&uid).unwrap();

    c.input.remove_category_interests(["cat1"]);
    iu.put("k", "owner").unwrap();

    assert_eq!(
        proxy.put("k", "proxy"),
        Err(IuError::UpdateFailed { uid: iu.uid().clone() })
    );
    assert_eq!(proxy.revision(), 1);
    assert_eq!(iu.revision(), 2);
    assert_eq!(iu.payload_value("k").as_deref(), Some("owner"));
}

/// Test: owner refuses remote writes to read-only IUs
#[test]
fn test_read_only_iu_rejects_remote_writes() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1").with_read_only(true));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));

    let proxy = b.input.get(&uid).unwrap();
    assert!(proxy.is_read_only());
    assert_eq!(
        proxy.put("k", "v"),
        Err(IuError::ReadOnly { uid: iu.uid().clone() })
    );
    assert_eq!(
        raw_put(&net, a.output.unique_name(), iu.uid(), ANY_REVISION, "k"),
        FAILED_REVISION
    );

    iu.put("k", "owner").unwrap();
    assert_eq!(iu.revision(), 2);
}

/// Test: local and remote writers racing on one IU never double-apply
#[test]
fn test_local_and_remote_writers_race() {
    const WRITES: usize = 50;

    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    let local = {
        let iu = Arc::clone(&iu);
        thread::spawn(move || {
            for i in 0..WRITES {
                iu.put(&format!("local-{i}"), "a").unwrap();
            }
        })
    };
    let remote = {
        let proxy = Arc::clone(&proxy);
        thread::spawn(move || {
            let mut accepted = 0;
            for i in 0..WRITES {
                match proxy.put(&format!("remote-{i}"), "b") {
                    Ok(()) => accepted += 1,
                    Err(IuError::UpdateFailed { .. }) => thread::yield_now(),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            accepted
        })
    };

    local.join().unwrap();
    let accepted = remote.join().unwrap();

    let expected = (1 + WRITES + accepted) as Revision;
    assert_eq!(iu.revision(), expected);
    assert_eq!(iu.payload().len(), WRITES + accepted);
    assert_eq!(
        a.events.count(&uid, IuEventType::Updated),
        accepted,
        "owner handlers fire once per accepted remote write"
    );

    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        proxy.revision() == expected && proxy.payload() == iu.payload()
    }));
}
