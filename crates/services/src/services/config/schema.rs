use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::ConfigError;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

pub const MAX_REMINDER_DAYS_AHEAD: u32 = 365;

fn default_checkpoint_parent_titles() -> Vec<String> {
    vec!["Nominations and Deliverables Checkpoints".to_string()]
}

fn default_sealed_packet_title() -> String {
    "Sealed Packet".to_string()
}

fn default_placeholder_contacts() -> Vec<PlaceholderContact> {
    [
        ("Sample Attorney", "estate_attorney"),
        ("Sample Advisor", "financial_advisor"),
        ("Sample Paralegal", "paralegal"),
    ]
    .into_iter()
    .map(|(name, role)| PlaceholderContact {
        name: name.to_string(),
        role: role.to_string(),
    })
    .collect()
}

/// Knobs for turning a template into a dated project.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct InstantiationConfig {
    /// Children of a task with one of these titles never get an
    /// offset-derived due date.
    #[serde(alias = "checkpointParentTitles")]
    pub checkpoint_parent_titles: Vec<String>,
    #[serde(alias = "sealedPacketTitle")]
    pub sealed_packet_title: String,
    #[serde(alias = "sealedPacketOffsetDays")]
    pub sealed_packet_offset_days: i64,
    #[serde(alias = "dependencyOffsetDays")]
    pub dependency_offset_days: i64,
    /// Milestone title whose tasks are dumped at debug level while instantiating.
    #[serde(alias = "traceMilestone")]
    pub trace_milestone: Option<String>,
}

impl Default for InstantiationConfig {
    fn default() -> Self {
        Self {
            checkpoint_parent_titles: default_checkpoint_parent_titles(),
            sealed_packet_title: default_sealed_packet_title(),
            sealed_packet_offset_days: 3,
            dependency_offset_days: 1,
            trace_milestone: None,
        }
    }
}

impl InstantiationConfig {
    pub fn is_checkpoint_title(&self, title: &str) -> bool {
        let title = title.trim();
        self.checkpoint_parent_titles
            .iter()
            .any(|checkpoint| checkpoint.eq_ignore_ascii_case(title))
    }

    pub fn is_sealed_packet_title(&self, title: &str) -> bool {
        title
            .to_lowercase()
            .contains(&self.sealed_packet_title.to_lowercase())
    }

    /// Days added to a dependency's due date for a task titled `title`.
    pub fn dependency_offset_for(&self, title: &str) -> i64 {
        if self.is_sealed_packet_title(title) {
            self.sealed_packet_offset_days
        } else {
            self.dependency_offset_days
        }
    }
}

/// Seed-data contact that must never be picked by role resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PlaceholderContact {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct RoleConfig {
    #[serde(alias = "placeholderContacts")]
    pub placeholder_contacts: Vec<PlaceholderContact>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            placeholder_contacts: default_placeholder_contacts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ReminderConfig {
    #[serde(alias = "defaultDaysAhead")]
    pub default_days_ahead: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            default_days_ahead: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    pub instantiation: InstantiationConfig,
    pub roles: RoleConfig,
    pub reminders: ReminderConfig,
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => {
                let config = config.normalized();
                match config.validate() {
                    Ok(()) => config,
                    Err(e) => {
                        tracing::warn!("Invalid config: {}, using default", e);
                        Self::default()
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        let mut seen = HashSet::new();
        self.instantiation.checkpoint_parent_titles = self
            .instantiation
            .checkpoint_parent_titles
            .iter()
            .map(|title| title.trim())
            .filter(|title| !title.is_empty() && seen.insert(title.to_lowercase()))
            .map(str::to_string)
            .collect();

        let sealed = self.instantiation.sealed_packet_title.trim();
        if sealed.is_empty() {
            tracing::warn!("Empty sealed packet title, resetting to default");
            self.instantiation.sealed_packet_title = default_sealed_packet_title();
        } else {
            self.instantiation.sealed_packet_title = sealed.to_string();
        }

        if matches!(
            self.instantiation.trace_milestone.as_deref(),
            Some(title) if title.trim().is_empty()
        ) {
            self.instantiation.trace_milestone = None;
        }

        self.roles.placeholder_contacts.retain(|placeholder| {
            !placeholder.name.trim().is_empty() && !placeholder.role.trim().is_empty()
        });

        if self.reminders.default_days_ahead > MAX_REMINDER_DAYS_AHEAD {
            tracing::warn!(
                "Reminder window of {} days is too large, capping at {}",
                self.reminders.default_days_ahead,
                MAX_REMINDER_DAYS_AHEAD
            );
            self.reminders.default_days_ahead = MAX_REMINDER_DAYS_AHEAD;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instantiation.sealed_packet_offset_days < 0 {
            return Err(ConfigError::ValidationError(
                "sealed_packet_offset_days must not be negative".to_string(),
            ));
        }
        if self.instantiation.dependency_offset_days < 0 {
            return Err(ConfigError::ValidationError(
                "dependency_offset_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            instantiation: InstantiationConfig::default(),
            roles: RoleConfig::default(),
            reminders: ReminderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_config() {
        let config = Config::from_raw("{}");

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.instantiation.sealed_packet_offset_days, 3);
        assert_eq!(config.instantiation.dependency_offset_days, 1);
        assert!(
            config
                .instantiation
                .is_checkpoint_title("nominations and deliverables checkpoints ")
        );
        assert_eq!(config.roles.placeholder_contacts.len(), 3);
        assert_eq!(config.reminders.default_days_ahead, 3);
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        let config = Config::from_raw("{invalid json");

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.instantiation.sealed_packet_title, "Sealed Packet");
    }

    #[test]
    fn aliases_and_normalization_are_applied() {
        let raw = r#"{
            "configVersion": "v0",
            "instantiation": {
                "sealedPacketTitle": "  ",
                "checkpointParentTitles": [" Review Gate ", ""],
                "traceMilestone": "   "
            },
            "reminders": { "defaultDaysAhead": 9000 }
        }"#;

        let config = Config::from_raw(raw);

        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.instantiation.sealed_packet_title, "Sealed Packet");
        assert_eq!(
            config.instantiation.checkpoint_parent_titles,
            vec!["Review Gate".to_string()]
        );
        assert!(config.instantiation.trace_milestone.is_none());
        assert_eq!(config.reminders.default_days_ahead, MAX_REMINDER_DAYS_AHEAD);
    }

    #[test]
    fn negative_offsets_fall_back_to_default() {
        let raw = r#"{ "instantiation": { "dependency_offset_days": -1 } }"#;
        let config = Config::from_raw(raw);

        assert_eq!(config.instantiation.dependency_offset_days, 1);
    }

    #[test]
    fn sealed_packet_offset_applies_on_substring_match() {
        let config = InstantiationConfig::default();

        assert_eq!(config.dependency_offset_for("Deliver SEALED packet to client"), 3);
        assert_eq!(config.dependency_offset_for("Send follow-up"), 1);
    }
}
