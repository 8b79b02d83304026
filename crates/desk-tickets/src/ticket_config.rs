use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use desk_access::TicketActionGrants;

use crate::ticket_contract::TicketCategory;

pub const TICKET_CONFIG_SCHEMA_VERSION: u32 = 1;
pub const TICKET_CONFIG_FILE_NAME: &str = "ticket-config.json";

pub const DEFAULT_AUTO_CLOSE_MS: u64 = 24 * 60 * 60 * 1_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 10 * 60 * 1_000;
const BUG_AUTO_CLOSE_MS: u64 = 12 * 60 * 60 * 1_000;

fn default_schema_version() -> u32 {
    TICKET_CONFIG_SCHEMA_VERSION
}

fn default_auto_close_ms() -> u64 {
    DEFAULT_AUTO_CLOSE_MS
}

fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
/// Per-category questionnaire and optional inactivity-threshold override.
pub struct CategoryConfig {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default, rename = "autoCloseMs", skip_serializing_if = "Option::is_none")]
    pub auto_close_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Configuration surface consumed by the ticket core. Loaded once at
/// startup and validated so an invalid category setup never reaches the
/// transition logic.
pub struct TicketSystemConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_auto_close_ms", rename = "defaultAutoCloseMs")]
    pub default_auto_close_ms: u64,
    #[serde(default = "default_sweep_interval_ms", rename = "sweepIntervalMs")]
    pub sweep_interval_ms: u64,
    #[serde(default)]
    pub categories: BTreeMap<TicketCategory, CategoryConfig>,
    #[serde(default)]
    pub grants: TicketActionGrants,
}

impl Default for TicketSystemConfig {
    fn default() -> Self {
        Self {
            schema_version: TICKET_CONFIG_SCHEMA_VERSION,
            default_auto_close_ms: DEFAULT_AUTO_CLOSE_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            categories: default_categories(),
            grants: TicketActionGrants::default(),
        }
    }
}

impl TicketSystemConfig {
    /// Questionnaire for a panel-openable category, `None` when the category
    /// is not configured for opening.
    pub fn questions_for(&self, category: TicketCategory) -> Option<&[String]> {
        if !category.is_panel_category() {
            return None;
        }
        self.categories
            .get(&category)
            .map(|config| config.questions.as_slice())
    }

    /// Inactivity threshold for a category: its override when configured,
    /// otherwise the global default.
    pub fn auto_close_ms_for(&self, category: TicketCategory) -> u64 {
        self.categories
            .get(&category)
            .and_then(|config| config.auto_close_ms)
            .unwrap_or(self.default_auto_close_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_categories() -> BTreeMap<TicketCategory, CategoryConfig> {
    BTreeMap::from([
        (
            TicketCategory::Report,
            CategoryConfig {
                questions: vec![
                    "Describe the report".to_string(),
                    "Priority (High / Medium / Low)".to_string(),
                ],
                auto_close_ms: None,
            },
        ),
        (
            TicketCategory::Bug,
            CategoryConfig {
                questions: vec![
                    "Describe the bug".to_string(),
                    "Affected platform".to_string(),
                ],
                auto_close_ms: Some(BUG_AUTO_CLOSE_MS),
            },
        ),
        (
            TicketCategory::Shop,
            CategoryConfig {
                questions: vec![
                    "Product or problem".to_string(),
                    "Additional details".to_string(),
                ],
                auto_close_ms: None,
            },
        ),
        (
            TicketCategory::Other,
            CategoryConfig {
                questions: vec!["Describe your request".to_string()],
                auto_close_ms: None,
            },
        ),
    ])
}

/// Loads the ticket system config, falling back to built-in defaults when no
/// file exists yet.
pub fn load_ticket_system_config(path: &Path) -> Result<TicketSystemConfig> {
    if !path.exists() {
        return Ok(TicketSystemConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ticket config {}", path.display()))?;
    let parsed = serde_json::from_str::<TicketSystemConfig>(&raw)
        .with_context(|| format!("failed to parse ticket config {}", path.display()))?;
    validate_ticket_system_config(&parsed)?;
    Ok(parsed)
}

pub fn validate_ticket_system_config(config: &TicketSystemConfig) -> Result<()> {
    if config.schema_version != TICKET_CONFIG_SCHEMA_VERSION {
        bail!(
            "unsupported ticket config schema_version {} (expected {})",
            config.schema_version,
            TICKET_CONFIG_SCHEMA_VERSION
        );
    }
    if config.default_auto_close_ms == 0 {
        bail!("defaultAutoCloseMs must be greater than zero");
    }
    if config.sweep_interval_ms == 0 {
        bail!("sweepIntervalMs must be greater than zero");
    }
    for (category, category_config) in &config.categories {
        if category_config.auto_close_ms == Some(0) {
            bail!(
                "autoCloseMs override for category '{}' must be greater than zero",
                category.as_str()
            );
        }
        if *category == TicketCategory::Reopened {
            if !category_config.questions.is_empty() {
                bail!("reopened tickets take no questionnaire");
            }
            continue;
        }
        if category_config.questions.is_empty() {
            bail!(
                "category '{}' must configure at least one question",
                category.as_str()
            );
        }
        for question in &category_config.questions {
            if question.trim().is_empty() {
                bail!(
                    "category '{}' contains a blank question",
                    category.as_str()
                );
            }
        }
    }
    config.grants.validate()?;
    Ok(())
}
