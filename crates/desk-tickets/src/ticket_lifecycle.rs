use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use desk_access::{evaluate_staff_action, StaffAction};
use desk_core::current_unix_timestamp_ms;

use crate::ticket_config::TicketSystemConfig;
use crate::ticket_contract::{
    ChannelVisibility, CreateChannelRequest, Principal, TicketActionOutcome, TicketActionRequest,
    TicketAnswer, TicketCategory, TicketError, TicketRecord, TICKET_CHANNEL_NAME_PREFIX,
};
use crate::ticket_registry::TicketRegistry;
use crate::ticket_render::{render_ticket_summary, TicketSummary};
use crate::ticket_store::TicketStore;

#[async_trait]
/// Boundary to the chat platform. `create_channel` returns the
/// platform-assigned channel id and is the one call a transition depends on;
/// the rest are fire-and-forget from the core's point of view.
pub trait PlatformGateway: Send + Sync {
    async fn create_channel(&self, request: &CreateChannelRequest) -> Result<String>;
    async fn delete_channel(&self, channel_id: &str) -> Result<()>;
    async fn send_message(&self, channel_id: &str, summary: &TicketSummary) -> Result<()>;
    async fn log_event(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Outcome of one expiry sweep tick.
pub struct TicketSweepReport {
    pub swept_unix_ms: u64,
    pub scanned: usize,
    pub closed: Vec<String>,
}

/// Orchestrates the five lifecycle transitions against the store.
///
/// Every mutation holds `mutation_lock` across its full
/// load-validate-mutate-save sequence, so interaction-triggered transitions
/// and the sweep never interleave on stale snapshots. Committed store
/// mutations are never rolled back by failing side effects.
pub struct TicketLifecycle {
    config: TicketSystemConfig,
    store: TicketStore,
    gateway: Arc<dyn PlatformGateway>,
    mutation_lock: Mutex<()>,
}

impl TicketLifecycle {
    pub fn new(
        config: TicketSystemConfig,
        store: TicketStore,
        gateway: Arc<dyn PlatformGateway>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TicketSystemConfig {
        &self.config
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    pub async fn handle(
        &self,
        request: TicketActionRequest,
    ) -> Result<TicketActionOutcome, TicketError> {
        match request {
            TicketActionRequest::Open {
                owner,
                category,
                answers,
            } => self.open(owner, category, answers).await,
            TicketActionRequest::Claim { actor, channel_id } => {
                self.claim(actor, channel_id).await
            }
            TicketActionRequest::Close { actor, channel_id } => {
                self.close(actor, channel_id).await
            }
            TicketActionRequest::Reopen {
                actor,
                channel_id,
                owner_id,
            } => self.reopen(actor, channel_id, owner_id).await,
        }
    }

    /// Opens a ticket for `owner`. Validation runs before the channel is
    /// provisioned so a rejected open never leaves a stray channel behind.
    pub async fn open(
        &self,
        owner: Principal,
        category: TicketCategory,
        answers: Vec<String>,
    ) -> Result<TicketActionOutcome, TicketError> {
        let questions = self.questionnaire_for(category, answers.len())?;

        let _guard = self.mutation_lock.lock().await;
        let mut registry = self.load_registry()?;
        registry.ensure_no_open_ticket(&owner.id)?;

        let request = CreateChannelRequest {
            name: format!("{TICKET_CHANNEL_NAME_PREFIX}{}", owner.id),
            owner_id: owner.id.clone(),
            visibility: ChannelVisibility {
                hide_from_everyone: true,
                allow_user_ids: vec![owner.id.clone()],
                allow_role_ids: self.config.grants.all_role_ids(),
            },
        };
        let channel_id = self
            .gateway
            .create_channel(&request)
            .await
            .map_err(TicketError::ChannelUnavailable)?;

        let now_ms = current_unix_timestamp_ms();
        let record = TicketRecord {
            owner_id: owner.id.clone(),
            category,
            answers: questions
                .into_iter()
                .zip(answers)
                .map(|(question, answer)| TicketAnswer { question, answer })
                .collect(),
            claimed_by: None,
            created_unix_ms: now_ms,
            last_activity_unix_ms: now_ms,
        };
        registry.insert_opened(&channel_id, record.clone());
        if let Err(error) = self.save_registry(&registry) {
            // The channel exists but the record could not be persisted; drop
            // the channel again rather than leave an untracked one behind.
            self.delete_channel_best_effort(&channel_id).await;
            return Err(error);
        }

        self.send_summary_best_effort(&channel_id, &record).await;
        self.log_best_effort(&format!(
            "ticket opened: channel={channel_id} owner={} category={}",
            owner.id,
            category.as_str()
        ))
        .await;
        Ok(TicketActionOutcome {
            channel_id,
            ticket: Some(record),
        })
    }

    /// Toggles the claimant on a ticket. A second invocation releases the
    /// claim, whoever holds it.
    pub async fn claim(
        &self,
        actor: Principal,
        channel_id: String,
    ) -> Result<TicketActionOutcome, TicketError> {
        self.authorize(StaffAction::Claim, &actor)?;

        let _guard = self.mutation_lock.lock().await;
        let mut registry = self.load_registry()?;
        let record = registry
            .toggle_claim(&channel_id, &actor.id, current_unix_timestamp_ms())?
            .clone();
        self.save_registry(&registry)?;

        self.send_summary_best_effort(&channel_id, &record).await;
        self.log_best_effort(&format!(
            "ticket claim toggled: channel={channel_id} actor={} claimant={}",
            actor.id,
            record.claimed_by.as_deref().unwrap_or("none")
        ))
        .await;
        Ok(TicketActionOutcome {
            channel_id,
            ticket: Some(record),
        })
    }

    /// Closes a ticket: removal from the store is the closure. Closing an
    /// already-closed channel succeeds without touching anything.
    pub async fn close(
        &self,
        actor: Principal,
        channel_id: String,
    ) -> Result<TicketActionOutcome, TicketError> {
        self.authorize(StaffAction::Close, &actor)?;

        let _guard = self.mutation_lock.lock().await;
        let mut registry = self.load_registry()?;
        if let Some(removed) = registry.close(&channel_id) {
            self.save_registry(&registry)?;
            self.delete_channel_best_effort(&channel_id).await;
            self.log_best_effort(&format!(
                "ticket closed: channel={channel_id} owner={} actor={}",
                removed.owner_id, actor.id
            ))
            .await;
        }
        Ok(TicketActionOutcome {
            channel_id,
            ticket: None,
        })
    }

    /// Reopens a closed channel with a fresh record; the old ticket is gone
    /// for good and its answers do not come back.
    pub async fn reopen(
        &self,
        actor: Principal,
        channel_id: String,
        owner_id: Option<String>,
    ) -> Result<TicketActionOutcome, TicketError> {
        self.authorize(StaffAction::Reopen, &actor)?;

        let _guard = self.mutation_lock.lock().await;
        let mut registry = self.load_registry()?;
        let owner_id = owner_id.unwrap_or_else(|| actor.id.clone());
        let record = registry
            .reopen(&channel_id, &owner_id, current_unix_timestamp_ms())?
            .clone();
        self.save_registry(&registry)?;

        self.send_summary_best_effort(&channel_id, &record).await;
        self.log_best_effort(&format!(
            "ticket reopened: channel={channel_id} owner={owner_id} actor={}",
            actor.id
        ))
        .await;
        Ok(TicketActionOutcome {
            channel_id,
            ticket: Some(record),
        })
    }

    /// One expiry pass with system authority: collects every record past its
    /// inactivity deadline, removes them all, then saves the snapshot once.
    /// Channel deletion afterwards is best-effort — the record is already
    /// gone, so a vanished or failing channel is never retried.
    pub async fn sweep(&self, now_ms: u64) -> Result<TicketSweepReport, TicketError> {
        let _guard = self.mutation_lock.lock().await;
        let mut registry = self.load_registry()?;
        let scanned = registry.ticket_count();
        let expired = registry.expired_channels(&self.config, now_ms);
        if expired.is_empty() {
            return Ok(TicketSweepReport {
                swept_unix_ms: now_ms,
                scanned,
                closed: Vec::new(),
            });
        }

        let mut closed = Vec::new();
        for channel_id in expired {
            if let Some(removed) = registry.close(&channel_id) {
                closed.push((channel_id, removed));
            }
        }
        self.save_registry(&registry)?;

        for (channel_id, removed) in &closed {
            self.delete_channel_best_effort(channel_id).await;
            self.log_best_effort(&format!(
                "ticket expired: channel={channel_id} owner={} category={}",
                removed.owner_id,
                removed.category.as_str()
            ))
            .await;
        }
        Ok(TicketSweepReport {
            swept_unix_ms: now_ms,
            scanned,
            closed: closed.into_iter().map(|(channel_id, _)| channel_id).collect(),
        })
    }

    fn authorize(&self, action: StaffAction, actor: &Principal) -> Result<(), TicketError> {
        let decision = evaluate_staff_action(&self.config.grants, action, &actor.roles);
        if decision.is_allowed() {
            Ok(())
        } else {
            tracing::debug!(
                actor = %actor.id,
                action = action.as_str(),
                reason_code = decision.reason_code(),
                "staff action denied"
            );
            Err(TicketError::Forbidden { action })
        }
    }

    fn questionnaire_for(
        &self,
        category: TicketCategory,
        answer_count: usize,
    ) -> Result<Vec<String>, TicketError> {
        let questions = self
            .config
            .questions_for(category)
            .ok_or_else(|| TicketError::UnknownCategory {
                category: category.as_str().to_string(),
            })?;
        if questions.len() != answer_count {
            return Err(TicketError::UnknownCategory {
                category: category.as_str().to_string(),
            });
        }
        Ok(questions.to_vec())
    }

    fn load_registry(&self) -> Result<TicketRegistry, TicketError> {
        self.store
            .load()
            .map(TicketRegistry::new)
            .map_err(TicketError::StoreUnavailable)
    }

    fn save_registry(&self, registry: &TicketRegistry) -> Result<(), TicketError> {
        self.store
            .save(registry.snapshot())
            .map_err(TicketError::StoreUnavailable)
    }

    async fn send_summary_best_effort(&self, channel_id: &str, record: &TicketRecord) {
        let summary = render_ticket_summary(record);
        if let Err(error) = self.gateway.send_message(channel_id, &summary).await {
            tracing::warn!(channel_id, "ticket summary message failed: {error}");
        }
    }

    async fn delete_channel_best_effort(&self, channel_id: &str) {
        if let Err(error) = self.gateway.delete_channel(channel_id).await {
            tracing::warn!(channel_id, "ticket channel deletion failed: {error}");
        }
    }

    async fn log_best_effort(&self, text: &str) {
        if let Err(error) = self.gateway.log_event(text).await {
            tracing::warn!("ticket audit log emit failed: {error}");
        }
    }
}
