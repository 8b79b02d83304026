use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use desk_core::write_text_atomic;

use crate::ticket_contract::TicketRecord;

pub const TICKET_STORE_SCHEMA_VERSION: u32 = 1;
pub const TICKET_STORE_FILE_NAME: &str = "tickets.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// The complete persisted ticket state: one document mapping channel id to
/// record. The document is the only source of truth; a channel id absent
/// here has no ticket.
pub struct TicketStoreSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub tickets: BTreeMap<String, TicketRecord>,
}

impl Default for TicketStoreSnapshot {
    fn default() -> Self {
        Self {
            schema_version: TICKET_STORE_SCHEMA_VERSION,
            tickets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
/// Whole-snapshot persistence: every mutation round-trips through a full
/// read, in-memory edit, full atomic write. No partial updates.
pub struct TicketStore {
    path: PathBuf,
}

impl TicketStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Loads the snapshot; a store that has never been written reads as the
    /// empty document rather than an error.
    pub fn load(&self) -> Result<TicketStoreSnapshot> {
        if !self.path.exists() {
            return Ok(TicketStoreSnapshot::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read ticket store {}", self.path.display()))?;
        let snapshot = serde_json::from_str::<TicketStoreSnapshot>(&raw)
            .with_context(|| format!("failed to parse ticket store {}", self.path.display()))?;
        if snapshot.schema_version != TICKET_STORE_SCHEMA_VERSION {
            bail!(
                "unsupported ticket store schema: expected {}, found {}",
                TICKET_STORE_SCHEMA_VERSION,
                snapshot.schema_version
            );
        }
        Ok(snapshot)
    }

    /// Writes a complete replacement document via temp file + rename, so a
    /// crash between read and write loses at most the in-flight mutation.
    pub fn save(&self, snapshot: &TicketStoreSnapshot) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(snapshot)
            .context("failed to serialize ticket store snapshot")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write ticket store {}", self.path.display()))?;
        Ok(())
    }
}
