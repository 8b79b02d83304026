use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use desk_access::StaffAction;

/// Ticket channels are named after their requester so the channel name alone
/// identifies whose ticket this is.
pub const TICKET_CHANNEL_NAME_PREFIX: &str = "ticket-";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
/// Closed set of configured ticket types. `Reopened` tags records created by
/// the reopen transition and cannot be requested from the panel.
pub enum TicketCategory {
    Report,
    Bug,
    Shop,
    Other,
    Reopened,
}

impl TicketCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Bug => "bug",
            Self::Shop => "shop",
            Self::Other => "other",
            Self::Reopened => "reopened",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Report => "Report",
            Self::Bug => "Bug",
            Self::Shop => "Shop",
            Self::Other => "Other",
            Self::Reopened => "Reopened",
        }
    }

    /// Categories a member can request from the panel, in panel order.
    pub fn panel_categories() -> [TicketCategory; 4] {
        [Self::Report, Self::Bug, Self::Shop, Self::Other]
    }

    pub fn is_panel_category(self) -> bool {
        !matches!(self, Self::Reopened)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One answered questionnaire prompt. Order within a record is the original
/// questionnaire order and must survive persistence round trips.
pub struct TicketAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// A persisted ticket, keyed by its backing channel id in the store
/// document. Absence from the document is closure; there is no tombstone.
pub struct TicketRecord {
    pub owner_id: String,
    pub category: TicketCategory,
    #[serde(default)]
    pub answers: Vec<TicketAnswer>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub created_unix_ms: u64,
    #[serde(default)]
    pub last_activity_unix_ms: u64,
}

impl TicketRecord {
    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An acting identity plus its held roles, as resolved by the platform layer.
pub struct Principal {
    pub id: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
/// Inbound boundary request, decoded once at the platform edge instead of
/// routed on string-prefixed action ids.
pub enum TicketActionRequest {
    Open {
        owner: Principal,
        category: TicketCategory,
        /// One answer per configured question, in questionnaire order.
        answers: Vec<String>,
    },
    Claim {
        actor: Principal,
        channel_id: String,
    },
    Close {
        actor: Principal,
        channel_id: String,
    },
    Reopen {
        actor: Principal,
        channel_id: String,
        /// Requester to record on the fresh ticket; defaults to the actor.
        owner_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of an accepted transition: the affected channel and the record as
/// persisted afterwards (`None` once closed).
pub struct TicketActionOutcome {
    pub channel_id: String,
    pub ticket: Option<TicketRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Visibility rules requested for a fresh ticket channel: hidden from the
/// community at large, visible to the requester and the granted staff roles.
pub struct ChannelVisibility {
    pub hide_from_everyone: bool,
    pub allow_user_ids: Vec<String>,
    pub allow_role_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Side-effect request asking the platform to provision a ticket channel.
pub struct CreateChannelRequest {
    pub name: String,
    pub owner_id: String,
    pub visibility: ChannelVisibility,
}

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("owner '{owner_id}' already has an open ticket")]
    DuplicateTicket { owner_id: String },
    #[error("unrecognized ticket category or questionnaire mismatch: {category}")]
    UnknownCategory { category: String },
    #[error("no ticket record for channel '{channel_id}'")]
    NotFound { channel_id: String },
    #[error("actor holds no role granting '{}'", action.as_str())]
    Forbidden { action: StaffAction },
    #[error("channel '{channel_id}' already has a ticket record")]
    AlreadyOpen { channel_id: String },
    #[error("ticket store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),
    #[error("platform channel provisioning failed: {0}")]
    ChannelUnavailable(anyhow::Error),
}

impl TicketError {
    /// Validation rejections are recovered locally: the store is untouched
    /// and the caller gets a user-visible rejection rather than a failure.
    pub fn is_validation_rejection(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTicket { .. }
                | Self::UnknownCategory { .. }
                | Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::AlreadyOpen { .. }
        )
    }
}
