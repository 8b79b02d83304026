use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use desk_access::TicketActionGrants;
use desk_tickets::{
    CreateChannelRequest, PlatformGateway, Principal, TicketActionRequest, TicketCategory,
    TicketError, TicketLifecycle, TicketStore, TicketStoreSnapshot, TicketSummary,
    TicketSystemConfig, TicketRecord, TICKET_STORE_FILE_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GatewayCall {
    CreateChannel { name: String },
    DeleteChannel { channel_id: String },
    SendMessage { channel_id: String },
    LogEvent { text: String },
}

#[derive(Default)]
struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    next_channel: AtomicU64,
}

impl RecordingGateway {
    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("calls mutex").clone()
    }

    fn deleted_channels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::DeleteChannel { channel_id } => Some(channel_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PlatformGateway for RecordingGateway {
    async fn create_channel(&self, request: &CreateChannelRequest) -> Result<String> {
        self.calls
            .lock()
            .expect("calls mutex")
            .push(GatewayCall::CreateChannel {
                name: request.name.clone(),
            });
        let id = self.next_channel.fetch_add(1, Ordering::SeqCst);
        Ok(format!("channel-{id}"))
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls mutex")
            .push(GatewayCall::DeleteChannel {
                channel_id: channel_id.to_string(),
            });
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, _summary: &TicketSummary) -> Result<()> {
        self.calls
            .lock()
            .expect("calls mutex")
            .push(GatewayCall::SendMessage {
                channel_id: channel_id.to_string(),
            });
        Ok(())
    }

    async fn log_event(&self, text: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls mutex")
            .push(GatewayCall::LogEvent {
                text: text.to_string(),
            });
        Ok(())
    }
}

struct Harness {
    _workspace: TempDir,
    lifecycle: TicketLifecycle,
    gateway: Arc<RecordingGateway>,
}

fn harness() -> Harness {
    let workspace = tempfile::tempdir().expect("tempdir");
    let config = TicketSystemConfig {
        grants: TicketActionGrants {
            claim: vec!["staff".to_string(), "helper".to_string()],
            close: vec!["staff".to_string(), "admin".to_string()],
            reopen: vec!["admin".to_string()],
        },
        ..TicketSystemConfig::default()
    };
    let store = TicketStore::new(workspace.path().join(TICKET_STORE_FILE_NAME));
    let gateway = Arc::new(RecordingGateway::default());
    let lifecycle =
        TicketLifecycle::new(config, store, Arc::clone(&gateway) as Arc<dyn PlatformGateway>);
    Harness {
        _workspace: workspace,
        lifecycle,
        gateway,
    }
}

fn member(id: &str) -> Principal {
    Principal::new(id, Vec::new())
}

fn with_roles(id: &str, roles: &[&str]) -> Principal {
    Principal::new(id, roles.iter().map(|role| (*role).to_string()))
}

fn open_request(owner: &str) -> TicketActionRequest {
    TicketActionRequest::Open {
        owner: member(owner),
        category: TicketCategory::Bug,
        answers: vec!["crash on login".to_string(), "mobile".to_string()],
    }
}

#[tokio::test]
async fn scenario_basic_open_then_close() {
    let harness = harness();

    let opened = harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let record = opened.ticket.expect("record");
    assert!(record.claimed_by.is_none());
    assert_eq!(record.answers[0].question, "Describe the bug");
    assert_eq!(record.answers[0].answer, "crash on login");
    assert_eq!(record.answers[1].answer, "mobile");

    harness
        .lifecycle
        .handle(TicketActionRequest::Close {
            actor: with_roles("staff-1", &["staff"]),
            channel_id: opened.channel_id.clone(),
        })
        .await
        .expect("close");

    let snapshot = harness.lifecycle.store().load().expect("load");
    assert!(snapshot.tickets.is_empty());
    assert_eq!(harness.gateway.deleted_channels(), vec![opened.channel_id]);
}

#[tokio::test]
async fn scenario_owner_uniqueness_across_open_attempts() {
    let harness = harness();
    harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("first open");

    for _ in 0..3 {
        let error = harness
            .lifecycle
            .handle(open_request("user-1"))
            .await
            .expect_err("second open must fail");
        assert!(matches!(
            error,
            TicketError::DuplicateTicket { ref owner_id } if owner_id == "user-1"
        ));
    }

    // A different owner is unaffected.
    harness
        .lifecycle
        .handle(open_request("user-2"))
        .await
        .expect("other owner opens");
    assert_eq!(harness.lifecycle.store().load().expect("load").tickets.len(), 2);
}

#[tokio::test]
async fn scenario_permission_denial_leaves_store_unchanged() {
    let harness = harness();
    let opened = harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let before = harness.lifecycle.store().load().expect("load");

    let error = harness
        .lifecycle
        .handle(TicketActionRequest::Claim {
            actor: with_roles("user-2", &["member", "booster"]),
            channel_id: opened.channel_id,
        })
        .await
        .expect_err("claim without granted role");
    assert!(matches!(error, TicketError::Forbidden { .. }));
    assert_eq!(harness.lifecycle.store().load().expect("load"), before);
}

#[tokio::test]
async fn scenario_claim_toggle_parity() {
    let harness = harness();
    let opened = harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let claim = |actor: &'static str| TicketActionRequest::Claim {
        actor: with_roles(actor, &["helper"]),
        channel_id: opened.channel_id.clone(),
    };

    // Even number of invocations lands back on unclaimed.
    let first = harness.lifecycle.handle(claim("helper-1")).await.expect("claim");
    assert_eq!(
        first.ticket.expect("record").claimed_by.as_deref(),
        Some("helper-1")
    );
    let second = harness.lifecycle.handle(claim("helper-1")).await.expect("release");
    assert!(second.ticket.expect("record").claimed_by.is_none());

    // Odd number leaves exactly one claimant; any helper can release and
    // re-take someone else's claim through the same toggle.
    harness.lifecycle.handle(claim("helper-1")).await.expect("claim");
    harness.lifecycle.handle(claim("helper-2")).await.expect("release other");
    let fifth = harness.lifecycle.handle(claim("helper-2")).await.expect("claim again");
    assert_eq!(
        fifth.ticket.expect("record").claimed_by.as_deref(),
        Some("helper-2")
    );
}

#[tokio::test]
async fn scenario_activity_timestamp_is_monotonic_across_claims() {
    let harness = harness();
    let opened = harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let mut last_activity = opened.ticket.expect("record").last_activity_unix_ms;

    for _ in 0..4 {
        let outcome = harness
            .lifecycle
            .handle(TicketActionRequest::Claim {
                actor: with_roles("staff-1", &["staff"]),
                channel_id: opened.channel_id.clone(),
            })
            .await
            .expect("claim toggle");
        let activity = outcome.ticket.expect("record").last_activity_unix_ms;
        assert!(activity >= last_activity);
        last_activity = activity;
    }
}

#[tokio::test]
async fn scenario_close_of_unknown_channel_is_a_quiet_noop() {
    let harness = harness();
    harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let before = harness.lifecycle.store().load().expect("load");
    let calls_before = harness.gateway.calls().len();

    let outcome = harness
        .lifecycle
        .handle(TicketActionRequest::Close {
            actor: with_roles("staff-1", &["staff"]),
            channel_id: "channel-does-not-exist".to_string(),
        })
        .await
        .expect("idempotent close");
    assert!(outcome.ticket.is_none());
    assert_eq!(harness.lifecycle.store().load().expect("load"), before);
    assert_eq!(harness.gateway.calls().len(), calls_before);
}

#[tokio::test]
async fn scenario_sweep_honors_per_category_thresholds() {
    const HOUR_MS: u64 = 60 * 60 * 1_000;
    let harness = harness();
    let now_ms = 1_000 * HOUR_MS;

    let aged = |owner: &str, category: TicketCategory, age_ms: u64| TicketRecord {
        owner_id: owner.to_string(),
        category,
        answers: Vec::new(),
        claimed_by: None,
        created_unix_ms: now_ms - age_ms,
        last_activity_unix_ms: now_ms - age_ms,
    };

    let mut snapshot = TicketStoreSnapshot::default();
    // 25h stale against the 24h global default: expired.
    snapshot
        .tickets
        .insert("channel-report".to_string(), aged("user-1", TicketCategory::Report, 25 * HOUR_MS));
    // Same age against the Bug category's 12h override: also expired.
    snapshot
        .tickets
        .insert("channel-bug".to_string(), aged("user-2", TicketCategory::Bug, 25 * HOUR_MS));
    // 13h stale Bug would expire under the override too; a 13h Shop does not.
    snapshot
        .tickets
        .insert("channel-shop".to_string(), aged("user-3", TicketCategory::Shop, 13 * HOUR_MS));
    harness.lifecycle.store().save(&snapshot).expect("seed");

    let report = harness.lifecycle.sweep(now_ms).await.expect("sweep");
    let mut closed = report.closed.clone();
    closed.sort();
    assert_eq!(closed, vec!["channel-bug".to_string(), "channel-report".to_string()]);

    let remaining = harness.lifecycle.store().load().expect("load");
    assert_eq!(remaining.tickets.len(), 1);
    let survivor = remaining.tickets.get("channel-shop").expect("survivor");
    // Sweep evaluates staleness without resetting it.
    assert_eq!(survivor.last_activity_unix_ms, now_ms - 13 * HOUR_MS);

    let mut deleted = harness.gateway.deleted_channels();
    deleted.sort();
    assert_eq!(deleted, vec!["channel-bug".to_string(), "channel-report".to_string()]);
}

#[tokio::test]
async fn scenario_reopen_after_close_and_already_open_rejection() {
    let harness = harness();
    let opened = harness
        .lifecycle
        .handle(open_request("user-1"))
        .await
        .expect("open");
    let admin = with_roles("admin-1", &["admin"]);

    let error = harness
        .lifecycle
        .handle(TicketActionRequest::Reopen {
            actor: admin.clone(),
            channel_id: opened.channel_id.clone(),
            owner_id: None,
        })
        .await
        .expect_err("reopen while record exists");
    assert!(matches!(error, TicketError::AlreadyOpen { .. }));

    harness
        .lifecycle
        .handle(TicketActionRequest::Close {
            actor: admin.clone(),
            channel_id: opened.channel_id.clone(),
        })
        .await
        .expect("close");

    let reopened = harness
        .lifecycle
        .handle(TicketActionRequest::Reopen {
            actor: admin,
            channel_id: opened.channel_id.clone(),
            owner_id: Some("user-1".to_string()),
        })
        .await
        .expect("reopen");
    let record = reopened.ticket.expect("record");
    assert_eq!(record.category, TicketCategory::Reopened);
    assert!(record.answers.is_empty());
    assert!(record.claimed_by.is_none());

    let snapshot = harness.lifecycle.store().load().expect("load");
    assert!(snapshot.tickets.contains_key(&opened.channel_id));
}
