//! # IU Lifecycle Across Buffers
//!
//! Commit and retraction are one-way flags. Both reach every proxy; writes
//! after either fail at the call site without reaching the owner.

use super::harness::{wait_until, Network, CONVERGENCE_TIMEOUT};
use iu_buffers::{Iu, IuError, IuEventType, LocalIu};
use iu_bus::TransportError;
use std::sync::Arc;

/// Test: commit through a proxy, then every writer is refused
#[test]
fn test_remote_commit_propagates() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let c = net.component("c", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.input.get(&uid).is_some() && c.input.get(&uid).is_some()
    }));
    let from_b = b.input.get(&uid).unwrap();
    let from_c = c.input.get(&uid).unwrap();

    from_b.commit().unwrap();
    assert!(iu.is_committed());
    assert_eq!(iu.revision(), 2);
    assert_eq!(a.events.count(&uid, IuEventType::Committed), 1);

    assert!(wait_until(CONVERGENCE_TIMEOUT, || from_c.is_committed()));
    assert_eq!(from_c.revision(), 2);
    assert_eq!(
        from_c.commit(),
        Err(IuError::Committed { uid: iu.uid().clone() })
    );
    assert_eq!(
        from_b.put("k", "v"),
        Err(IuError::Committed { uid: iu.uid().clone() })
    );
    assert_eq!(
        iu.put("k", "v"),
        Err(IuError::Committed { uid: iu.uid().clone() })
    );
    assert_eq!(iu.revision(), 2);
}

/// Test: owner retraction marks proxies and keeps them queryable
#[test]
fn test_retraction_propagates() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    assert!(a.output.retract(&uid).unwrap());
    assert!(!a.output.retract("unknown").unwrap());
    assert!(iu.is_retracted());
    assert!(a.output.get(&uid).is_some());

    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.events.count(&uid, IuEventType::Retracted) == 1
    }));
    assert!(proxy.is_retracted());
    assert_eq!(proxy.revision(), 2);
    assert!(b.input.get(&uid).is_some());
    assert_eq!(
        proxy.put("k", "v"),
        Err(IuError::Retracted { uid: iu.uid().clone() })
    );
    assert_eq!(
        proxy.commit(),
        Err(IuError::Retracted { uid: iu.uid().clone() })
    );
}

/// Test: a buffer never re-applies its own write when the owner echoes it
#[test]
fn test_self_echo_is_suppressed() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let c = net.component("c", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.input.get(&uid).is_some() && c.input.get(&uid).is_some()
    }));
    let from_b = b.input.get(&uid).unwrap();

    from_b.put("from_b", "1").unwrap();
    // A later owner write on the same topic lands after the echo.
    iu.put("from_a", "2").unwrap();

    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        b.events.count(&uid, IuEventType::Updated) == 1 && from_b.revision() == 3
    }));
    assert!(wait_until(CONVERGENCE_TIMEOUT, || {
        c.events.count(&uid, IuEventType::Updated) == 2
    }));
    assert_eq!(b.events.count(&uid, IuEventType::Updated), 1);
    assert_eq!(from_b.payload(), iu.payload());
}

/// Test: a late joiner recovers an IU through its private category
#[test]
fn test_late_joiner_resend() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    iu.put("state", "before-join").unwrap();

    let late = net.component("late", &["cat1"]);
    let uid = iu.uid().to_string();
    assert!(late.input.get(&uid).is_none());

    late.input
        .request_resend(&uid, a.output.unique_name())
        .unwrap();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || late.input.get(&uid).is_some()));
    let proxy = late.input.get(&uid).unwrap();
    assert_eq!(proxy.revision(), 2);
    assert_eq!(proxy.payload_value("state").as_deref(), Some("before-join"));

    // Later deltas arrive through the ordinary category subscription.
    iu.put("state", "after-join").unwrap();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || proxy.revision() == 3));
    assert_eq!(proxy.payload_value("state").as_deref(), Some("after-join"));
}

/// Test: proxies of a closed owner fail with a transport error
#[test]
fn test_closed_owner_fails_remote_writes() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let iu = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&iu)).unwrap();
    let uid = iu.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    proxy.put("k", "first").unwrap();
    a.output.close();
    a.output.close();
    assert!(!net.transport.is_served(a.output.unique_name()));

    assert!(matches!(
        proxy.put("k", "second"),
        Err(IuError::Transport(TransportError::NoSuchEndpoint(_)))
    ));
    assert_eq!(iu.payload_value("k").as_deref(), Some("first"));
    assert_eq!(proxy.revision(), 2);
}

/// Test: closing an input buffer stops handlers and proxies' writes
#[test]
fn test_closed_input_buffer_is_silent() {
    let net = Network::new();
    let a = net.component("a", &[]);
    let b = net.component("b", &["cat1"]);
    let first = Arc::new(LocalIu::new("cat1"));
    a.output.add(Arc::clone(&first)).unwrap();
    let uid = first.uid().to_string();
    assert!(wait_until(CONVERGENCE_TIMEOUT, || b.input.get(&uid).is_some()));
    let proxy = b.input.get(&uid).unwrap();

    b.input.close();
    let events = b.events.len();
    first.put("k", "v").unwrap();
    a.output.add(Arc::new(LocalIu::new("cat1"))).unwrap();

    assert!(matches!(
        proxy.put("k", "w"),
        Err(IuError::Transport(TransportError::Closed))
    ));
    assert_eq!(b.input.len(), 1);
    assert_eq!(b.events.len(), events);
    assert_eq!(proxy.revision(), 1);
}
