use std::collections::BTreeMap;

use desk_core::is_past_activity_deadline;

use crate::ticket_config::TicketSystemConfig;
use crate::ticket_contract::{TicketCategory, TicketError, TicketRecord};
use crate::ticket_store::TicketStoreSnapshot;

/// In-memory decision layer over one loaded snapshot.
///
/// Validates and applies transitions; persistence stays with the caller,
/// which must hold the mutation lock for the whole load-mutate-save
/// sequence. The owner index makes the one-open-ticket-per-owner check O(log n)
/// instead of a scan over every record.
#[derive(Debug)]
pub struct TicketRegistry {
    snapshot: TicketStoreSnapshot,
    owner_index: BTreeMap<String, String>,
}

impl TicketRegistry {
    pub fn new(snapshot: TicketStoreSnapshot) -> Self {
        let owner_index = snapshot
            .tickets
            .iter()
            .map(|(channel_id, record)| (record.owner_id.clone(), channel_id.clone()))
            .collect();
        Self {
            snapshot,
            owner_index,
        }
    }

    pub fn snapshot(&self) -> &TicketStoreSnapshot {
        &self.snapshot
    }

    pub fn get(&self, channel_id: &str) -> Option<&TicketRecord> {
        self.snapshot.tickets.get(channel_id)
    }

    pub fn ticket_count(&self) -> usize {
        self.snapshot.tickets.len()
    }

    /// Uniqueness gate for the open transition: one open/claimed ticket per
    /// owner at a time.
    pub fn ensure_no_open_ticket(&self, owner_id: &str) -> Result<(), TicketError> {
        if self.owner_index.contains_key(owner_id) {
            return Err(TicketError::DuplicateTicket {
                owner_id: owner_id.to_string(),
            });
        }
        Ok(())
    }

    /// Records a freshly opened ticket under its platform-assigned channel id.
    pub fn insert_opened(&mut self, channel_id: &str, record: TicketRecord) {
        self.owner_index
            .insert(record.owner_id.clone(), channel_id.to_string());
        self.snapshot.tickets.insert(channel_id.to_string(), record);
    }

    /// The claim action is a toggle: unclaimed tickets take the actor as
    /// claimant, claimed tickets are released regardless of who holds the
    /// claim. Touches the activity timestamp; the timestamp never moves
    /// backwards even against a skewed clock.
    pub fn toggle_claim(
        &mut self,
        channel_id: &str,
        actor_id: &str,
        now_ms: u64,
    ) -> Result<&TicketRecord, TicketError> {
        let record = self
            .snapshot
            .tickets
            .get_mut(channel_id)
            .ok_or_else(|| TicketError::NotFound {
                channel_id: channel_id.to_string(),
            })?;
        record.claimed_by = if record.claimed_by.is_some() {
            None
        } else {
            Some(actor_id.to_string())
        };
        record.last_activity_unix_ms = record.last_activity_unix_ms.max(now_ms);
        Ok(record)
    }

    /// Removes a ticket record. Idempotent: closing an absent channel id is
    /// a no-op, not an error.
    pub fn close(&mut self, channel_id: &str) -> Option<TicketRecord> {
        let removed = self.snapshot.tickets.remove(channel_id)?;
        if self
            .owner_index
            .get(&removed.owner_id)
            .is_some_and(|indexed| indexed == channel_id)
        {
            self.owner_index.remove(&removed.owner_id);
        }
        Some(removed)
    }

    /// Reopen never restores an old record: it creates a fresh one bound to
    /// the current channel, with empty answers and no claimant.
    pub fn reopen(
        &mut self,
        channel_id: &str,
        owner_id: &str,
        now_ms: u64,
    ) -> Result<&TicketRecord, TicketError> {
        if self.snapshot.tickets.contains_key(channel_id) {
            return Err(TicketError::AlreadyOpen {
                channel_id: channel_id.to_string(),
            });
        }
        let record = TicketRecord {
            owner_id: owner_id.to_string(),
            category: TicketCategory::Reopened,
            answers: Vec::new(),
            claimed_by: None,
            created_unix_ms: now_ms,
            last_activity_unix_ms: now_ms,
        };
        self.owner_index
            .insert(record.owner_id.clone(), channel_id.to_string());
        Ok(self
            .snapshot
            .tickets
            .entry(channel_id.to_string())
            .or_insert(record))
    }

    /// Channel ids whose inactivity deadline has passed, using the
    /// category-specific threshold with the global default as fallback.
    pub fn expired_channels(&self, config: &TicketSystemConfig, now_ms: u64) -> Vec<String> {
        self.snapshot
            .tickets
            .iter()
            .filter(|(_, record)| {
                is_past_activity_deadline(
                    record.last_activity_unix_ms,
                    config.auto_close_ms_for(record.category),
                    now_ms,
                )
            })
            .map(|(channel_id, _)| channel_id.clone())
            .collect()
    }
}
