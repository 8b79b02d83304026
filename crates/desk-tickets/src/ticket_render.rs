use std::fmt::Write as _;

use serde::Serialize;

use crate::ticket_contract::{TicketAnswer, TicketRecord};

pub const UNASSIGNED_CLAIMANT_LABEL: &str = "unassigned";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Presentation-free ticket summary handed to the messaging layer. Answer
/// pairs keep the original questionnaire order.
pub struct TicketSummary {
    pub owner_id: String,
    pub category_label: String,
    pub claimant_label: String,
    pub answers: Vec<TicketAnswer>,
}

pub fn render_ticket_summary(record: &TicketRecord) -> TicketSummary {
    TicketSummary {
        owner_id: record.owner_id.clone(),
        category_label: record.category.label().to_string(),
        claimant_label: record
            .claimed_by
            .clone()
            .unwrap_or_else(|| UNASSIGNED_CLAIMANT_LABEL.to_string()),
        answers: record.answers.clone(),
    }
}

/// Plain-text rendering used for channel messages and audit log lines.
pub fn render_ticket_message(summary: &TicketSummary) -> String {
    let mut text = format!(
        "Ticket — {}\nRequester: {}\nAssigned: {}",
        summary.category_label, summary.owner_id, summary.claimant_label
    );
    for pair in &summary.answers {
        let answer = if pair.answer.trim().is_empty() {
            "—"
        } else {
            pair.answer.as_str()
        };
        let _ = write!(text, "\n{}: {}", pair.question, answer);
    }
    text
}
