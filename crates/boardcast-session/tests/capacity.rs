//! Capacity and expiry scenarios for the session registry.

use std::net::IpAddr;
use std::time::Duration;

use boardcast_session::{SessionConfig, SessionError, SessionRegistry};

fn ip(n: u8) -> IpAddr {
    IpAddr::from([192, 168, 1, n])
}

#[tokio::test(start_paused = true)]
async fn test_create_fourth_session_succeeds_once_first_expires() {
    let mut reg: SessionRegistry<&str> = SessionRegistry::new(SessionConfig::default());

    let a = reg.create(ip(1), |_| "a").unwrap().id;
    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    reg.create(ip(2), |_| "b").unwrap();
    reg.create(ip(3), |_| "c").unwrap();

    let err = reg.create(ip(4), |_| "d").unwrap_err();
    assert!(matches!(err, SessionError::CapacityExceeded { max: 3 }));

    // A has now been idle for 35 minutes; B and C for 15.
    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    let admission = reg.create(ip(4), |_| "d").unwrap();
    assert_eq!(admission.evicted.len(), 1);
    assert_eq!(admission.evicted[0].id, a);
    assert_eq!(reg.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_at_capacity_reaps_even_right_after_periodic_reap() {
    let mut reg: SessionRegistry<()> = SessionRegistry::new(SessionConfig {
        max_sessions: 1,
        inactivity_timeout: Duration::from_secs(10),
        reap_interval: Duration::from_secs(60),
    });
    reg.create(ip(1), |_| ()).unwrap();
    assert!(reg.reap_expired().is_empty());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(reg.reap_expired().is_empty(), "periodic reap is throttled");
    assert_eq!(reg.len(), 1);

    let admission = reg.create(ip(2), |_| ()).unwrap();
    assert_eq!(admission.evicted.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replacement_frees_slot_at_capacity() {
    let mut reg: SessionRegistry<u8> = SessionRegistry::new(SessionConfig::default());
    let a = reg.create(ip(1), |_| 1).unwrap().id;
    reg.create(ip(2), |_| 2).unwrap();
    reg.create(ip(3), |_| 3).unwrap();

    reg.mark_pending_refresh(&a).unwrap();
    let admission = reg.create(ip(1), |_| 4).unwrap();
    assert_eq!(admission.evicted.len(), 1);
    assert_eq!(reg.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_summaries_serialize_camel_case() {
    let mut reg: SessionRegistry<()> = SessionRegistry::new(SessionConfig::default());
    reg.create(ip(7), |_| ()).unwrap();
    let value = serde_json::to_value(reg.summaries()).unwrap();
    assert_eq!(value[0]["ip"], "192.168.1.7");
    assert_eq!(value[0]["debugLogEnabled"], false);
    assert_eq!(value[0]["messageCount"], 0);
}
