//! End-to-end tests: gateway → session actors → mock upstream.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use boardcast::prelude::*;
use boardcast::session::SessionError;
use boardcast_transport::{MockControl, MockTransport};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

/// A gateway whose transports are built from pre-made mock controls, in
/// creation order, so a test can script a transport before it exists.
struct Harness {
    gateway: Gateway<MockTransport>,
    controls: Vec<MockControl>,
    built: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    fn with_config(config: GatewayConfig) -> Self {
        let controls: Vec<MockControl> = (0..8).map(|_| MockControl::default()).collect();
        let built = Arc::new(AtomicUsize::new(0));
        let (pool, counter) = (controls.clone(), Arc::clone(&built));
        let gateway = Gateway::new(config, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            MockTransport::with_control(pool[n].clone())
        })
        .unwrap();
        Self { gateway, controls, built }
    }

    fn control(&self, n: usize) -> MockControl {
        self.controls[n].clone()
    }
}

fn ip(n: u8) -> IpAddr {
    IpAddr::from([10, 0, 0, n])
}

/// Waits for the next message of type `ty`, skipping others.
async fn next_of(sub: &mut Subscriber, ty: &str) -> FanoutMessage {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let message = sub.recv().await.expect("fan-out closed");
            if message.event.event_type() == Some(ty) {
                return message;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {ty} event"))
}

fn black() -> CreateGameParams {
    CreateGameParams {
        color: Color::Black,
        ..Default::default()
    }
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_game_emits_game_created_tagged_with_session() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    h.control(0).push_response(200, r#"{"id":"g1"}"#);

    let submitted = h.gateway.create_game(&session, black()).await.unwrap();
    assert_eq!(submitted, Submitted::Accepted);

    let created = next_of(&mut events, "gameCreated").await;
    assert_eq!(created.session_id, session);
    let value = serde_json::to_value(&created).unwrap();
    assert_eq!(value["event"]["gameId"], "g1");
    assert_eq!(value["event"]["color"], "black");

    let status = h.gateway.status(&session).await.unwrap();
    assert!(status.active);
    assert_eq!(status.game_id, Some(GameId::new("g1")));
}

#[tokio::test(start_paused = true)]
async fn test_stream_events_are_fanned_out_without_heartbeats() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    let control = h.control(0);
    control.push_response(200, r#"{"id":"g1"}"#);
    h.gateway.create_game(&session, black()).await.unwrap();
    next_of(&mut events, "gameCreated").await;

    control.push_line("");
    control.push_line(r#"{"type":"gameState","moves":"e2e4"}"#);
    let state = next_of(&mut events, "gameState").await;
    assert_eq!(state.session_id, session);
    assert_eq!(state.event, ClientEvent::Upstream(json!({"type":"gameState","moves":"e2e4"})));

    let diag = h.gateway.diagnostics(&session).await.unwrap();
    assert_eq!(diag.heartbeats, 1);
}

#[tokio::test(start_paused = true)]
async fn test_make_move_while_busy_is_queued_and_runs_after_create() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    let control = h.control(0);
    control.push_response(200, r#"{"id":"g1"}"#);
    control.push_response(200, r#"{"ok":true}"#);

    h.gateway.create_game(&session, black()).await.unwrap();
    let queued = h.gateway.make_move(&session, "e7e5").await.unwrap();
    assert_eq!(queued, Submitted::Queued { position: 1 });

    next_of(&mut events, "gameCreated").await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let paths: Vec<String> = control.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths.last().map(String::as_str), Some("/api/board/game/g1/move/e7e5"));
    assert_eq!(control.overlaps(), 0);
    assert!(h.gateway.status(&session).await.unwrap().streaming);
}

#[tokio::test(start_paused = true)]
async fn test_commands_answer_promptly_while_request_hangs() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    h.control(0).push_hang();

    h.gateway.create_game(&session, black()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let bound = Duration::from_secs(1);

    let queued = tokio::time::timeout(bound, h.gateway.make_move(&session, "e7e5"))
        .await
        .expect("make_move waited on the upstream call")
        .unwrap();
    assert_eq!(queued, Submitted::Queued { position: 1 });

    let status = tokio::time::timeout(bound, h.gateway.status(&session))
        .await
        .expect("status waited on the upstream call")
        .unwrap();
    assert_eq!(status.state, boardcast::client::State::CreatingGame);
    assert_eq!(status.queued, 1);

    let diag = h.gateway.diagnostics(&session).await.unwrap();
    assert!(diag.call_in_flight);

    tokio::time::timeout(bound, h.gateway.delete_session(&session))
        .await
        .expect("delete waited on the upstream call")
        .unwrap();
    let failed = events
        .poll_events()
        .into_iter()
        .filter(|m| m.event.event_type() == Some("operationFailed"))
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_make_move_invalid_uci_is_usage_error() {
    let h = Harness::new();
    let session = h.gateway.create_session(ip(1)).await.unwrap();

    let err = h.gateway.make_move(&session, "e9e4").await.unwrap_err();
    assert!(err.is_usage());
    assert!(h.control(0).requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resign_without_game_is_usage_error() {
    let h = Harness::new();
    let session = h.gateway.create_session(ip(1)).await.unwrap();

    let err = h.gateway.resign(&session).await.unwrap_err();
    assert!(err.is_usage(), "{err}");
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_active_game() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    h.control(0).push_response(200, r#"{"id":"g1"}"#);
    h.gateway.create_game(&session, black()).await.unwrap();
    next_of(&mut events, "gameCreated").await;

    h.gateway.reset(&session).await.unwrap();
    let status = h.gateway.status(&session).await.unwrap();
    assert!(!status.active);
    assert!(!status.streaming);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_is_not_found() {
    let h = Harness::new();
    let err = h.gateway.status(&SessionId::new("nope")).await.unwrap_err();
    assert!(matches!(err, BoardcastError::Session(SessionError::NotFound(_))));
    assert!(err.is_usage());
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_session_past_capacity_is_rejected() {
    let h = Harness::new();
    for n in 1..=3 {
        h.gateway.create_session(ip(n)).await.unwrap();
    }
    let err = h.gateway.create_session(ip(4)).await.unwrap_err();
    assert!(matches!(
        err,
        BoardcastError::Session(SessionError::CapacityExceeded { max: 3 })
    ));
    assert_eq!(h.gateway.session_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_session_replaces_same_ip_pending_refresh() {
    let h = Harness::new();
    let old = h.gateway.create_session(ip(1)).await.unwrap();
    h.gateway.create_session(ip(2)).await.unwrap();
    h.gateway.create_session(ip(3)).await.unwrap();

    h.gateway.mark_pending_refresh(&old).await.unwrap();
    let new = h.gateway.create_session(ip(1)).await.unwrap();

    assert_ne!(new, old);
    assert_eq!(h.gateway.session_count().await, 3);
    assert!(h.gateway.status(&old).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_delete_session_reports_abandoned_requests() {
    let h = Harness::new();
    let mut events = h.gateway.subscribe();
    let session = h.gateway.create_session(ip(1)).await.unwrap();

    h.gateway.create_game(&session, black()).await.unwrap();
    h.gateway.make_move(&session, "e7e5").await.unwrap();
    h.gateway.delete_session(&session).await.unwrap();

    let failed: Vec<FanoutMessage> = events
        .poll_events()
        .into_iter()
        .filter(|m| m.event.event_type() == Some("operationFailed"))
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|m| m.session_id == session));
    assert_eq!(h.gateway.session_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_maintenance_reaps_idle_sessions() {
    let h = Harness::new();
    let idle = h.gateway.create_session(ip(1)).await.unwrap();
    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    let busy = h.gateway.create_session(ip(2)).await.unwrap();
    tokio::time::advance(Duration::from_secs(11 * 60)).await;

    assert_eq!(h.gateway.run_maintenance().await, 1);
    assert!(h.gateway.status(&idle).await.is_err());
    assert!(h.gateway.status(&busy).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_spawn_maintenance_reaps_and_stops_with_gateway() {
    let h = Harness::new();
    h.gateway.create_session(ip(1)).await.unwrap();
    let task = h.gateway.spawn_maintenance();

    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.gateway.session_count().await, 0);

    drop(h);
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("maintenance loop kept running")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sessions_overview_includes_game_status() {
    let h = Harness::new();
    h.gateway.create_session(ip(1)).await.unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;
    h.gateway.create_session("8.8.8.8".parse().unwrap()).await.unwrap();

    let overview = h.gateway.sessions_overview().await;
    assert_eq!(overview.count, 2);
    assert_eq!(overview.max, 3);

    let value = serde_json::to_value(&overview).unwrap();
    assert_eq!(value["sessions"][0]["ip"], "10.0.0.1");
    assert_eq!(value["sessions"][0]["debugLogEnabled"], false);
    assert_eq!(value["sessions"][1]["debugLogEnabled"], true);
    assert_eq!(value["sessions"][0]["game"]["active"], false);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_every_session() {
    let h = Harness::new();
    h.gateway.create_session(ip(1)).await.unwrap();
    h.gateway.create_session(ip(2)).await.unwrap();

    h.gateway.shutdown().await;
    assert_eq!(h.gateway.session_count().await, 0);
}

// =========================================================================
// Account, admins, signaling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_check_account_uses_its_own_connection() {
    let h = Harness::new();
    let session = h.gateway.create_session(ip(1)).await.unwrap();
    h.control(1).push_response(200, r#"{"username":"boardbot"}"#);

    let account = h.gateway.check_account().await.unwrap();
    assert_eq!(account.username, "boardbot");
    assert_eq!(h.built.load(Ordering::SeqCst), 2);
    assert_eq!(h.control(1).requests()[0].path, "/api/account");
    assert!(h.control(0).requests().is_empty());
    assert_eq!(h.control(1).closes(), 1);
    assert!(h.gateway.status(&session).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_check_account_rejected_token_is_protocol_error() {
    let h = Harness::new();
    h.control(0).push_response(401, r#"{"error":"No such token"}"#);

    let err = h.gateway.check_account().await.unwrap_err();
    assert!(matches!(err, BoardcastError::Client(_)), "{err}");
    assert!(!err.is_usage());
}

#[tokio::test(start_paused = true)]
async fn test_admin_list_add_remove() {
    let h = Harness::new();
    let admin: IpAddr = "192.168.1.10".parse().unwrap();

    assert!(!h.gateway.is_admin(admin).await);
    assert!(h.gateway.add_admin(admin).await);
    assert!(!h.gateway.add_admin(admin).await);
    assert!(h.gateway.is_admin(admin).await);
    assert_eq!(h.gateway.admins().await, vec![admin]);
    assert!(h.gateway.remove_admin(admin).await);
    assert!(!h.gateway.is_admin(admin).await);
}

#[tokio::test(start_paused = true)]
async fn test_signal_round_trip_between_peers() {
    let h = Harness::new();
    h.gateway
        .signal_post("QXJT", "offer", "host", json!({"sdp": "v=0"}))
        .await
        .unwrap();

    assert!(h.gateway.signal_poll("QXJT", "host").await.is_empty());
    let got = h.gateway.signal_poll("QXJT", "client").await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].payload, json!({"sdp": "v=0"}));

    let err = h
        .gateway
        .signal_post("QXJT", "offer", " ", json!(null))
        .await
        .unwrap_err();
    assert!(err.is_usage());
}
