use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates the staff-gated ticket actions.
pub enum StaffAction {
    Claim,
    Close,
    Reopen,
}

impl StaffAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Close => "close",
            Self::Reopen => "reopen",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
/// Per-action role allow-lists. An action with an empty list is granted to
/// no one (fail-closed); the expiry sweep bypasses this evaluator entirely.
pub struct TicketActionGrants {
    #[serde(default)]
    pub claim: Vec<String>,
    #[serde(default)]
    pub close: Vec<String>,
    #[serde(default)]
    pub reopen: Vec<String>,
}

impl TicketActionGrants {
    pub fn allowed_roles(&self, action: StaffAction) -> &[String] {
        match action {
            StaffAction::Claim => &self.claim,
            StaffAction::Close => &self.close,
            StaffAction::Reopen => &self.reopen,
        }
    }

    /// Every role id mentioned by any grant, sorted and deduplicated. Used
    /// to build channel visibility rules when a ticket channel is created.
    pub fn all_role_ids(&self) -> Vec<String> {
        let mut roles = self
            .claim
            .iter()
            .chain(self.close.iter())
            .chain(self.reopen.iter())
            .cloned()
            .collect::<Vec<_>>();
        roles.sort();
        roles.dedup();
        roles
    }

    pub fn validate(&self) -> Result<()> {
        for action in [StaffAction::Claim, StaffAction::Close, StaffAction::Reopen] {
            for role_id in self.allowed_roles(action) {
                if role_id.trim().is_empty() {
                    bail!(
                        "grant list for action '{}' contains an empty role id",
                        action.as_str()
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Enumerates supported `StaffAccessDecision` values.
pub enum StaffAccessDecision {
    Allow { reason_code: String },
    Deny { reason_code: String },
}

impl StaffAccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn reason_code(&self) -> &str {
        match self {
            Self::Allow { reason_code } | Self::Deny { reason_code } => reason_code,
        }
    }
}

/// Authorization succeeds iff the principal holds at least one role on the
/// action's allow-list.
pub fn evaluate_staff_action(
    grants: &TicketActionGrants,
    action: StaffAction,
    principal_roles: &BTreeSet<String>,
) -> StaffAccessDecision {
    let allowed = grants.allowed_roles(action);
    if allowed.is_empty() {
        return StaffAccessDecision::Deny {
            reason_code: format!("deny_{}_no_roles_granted", action.as_str()),
        };
    }
    if allowed.iter().any(|role_id| principal_roles.contains(role_id)) {
        StaffAccessDecision::Allow {
            reason_code: format!("allow_{}_role_match", action.as_str()),
        }
    } else {
        StaffAccessDecision::Deny {
            reason_code: format!("deny_{}_role_missing", action.as_str()),
        }
    }
}

pub fn is_staff_action_allowed(
    grants: &TicketActionGrants,
    action: StaffAction,
    principal_roles: &BTreeSet<String>,
) -> bool {
    evaluate_staff_action(grants, action, principal_roles).is_allowed()
}
