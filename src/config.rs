// Dashboard configuration.
//
// Loaded once per run and passed by reference into the loader, calculator and
// report generator. Every field has a default, so a missing file is valid.
use crate::errors::{KpiError, Result};
use crate::kpi::{Cutoffs, Metric, Thresholds};
use crate::week::WeekEnding;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

static DEFAULT_OFFICE_ALIASES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    ["Blue Ash", "Cincinnati", "St. Bernard"]
        .into_iter()
        .map(|site| (site.to_string(), "P&G Cincinnati".to_string()))
        .collect()
});

fn default_office_aliases() -> BTreeMap<String, String> {
    DEFAULT_OFFICE_ALIASES.clone()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfficeConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub week_ending: WeekEnding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Office id -> display name and week-ending day. Unlisted offices close on Sunday.
    pub offices: BTreeMap<String, OfficeConfig>,
    /// Raw site name -> consolidated office id, applied at import.
    pub office_aliases: BTreeMap<String, String>,
    /// Per-metric percent cutoffs merged over the built-in defaults.
    pub thresholds: BTreeMap<Metric, Cutoffs>,
    pub department_priority: Vec<String>,
    pub shift_priority: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            offices: BTreeMap::new(),
            office_aliases: default_office_aliases(),
            thresholds: BTreeMap::new(),
            department_priority: Vec::new(),
            shift_priority: vec!["1".to_string(), "2".to_string(), "3".to_string()],
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config. A missing file falls back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(DashboardConfig::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!(
            "Loaded config {} ({} offices, {} threshold overrides)",
            path.display(),
            config.offices.len(),
            config.thresholds.len()
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: DashboardConfig = serde_json::from_str(text)?;
        // Surface bad cutoffs at load time rather than on first report.
        config.thresholds()?;
        if let Some((alias, _)) = config
            .office_aliases
            .iter()
            .find(|(alias, target)| alias.trim().is_empty() || target.trim().is_empty())
        {
            return Err(KpiError::Config(format!("empty office alias entry `{}`", alias)));
        }
        Ok(config)
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::with_overrides(&self.thresholds)
    }

    pub fn week_ending_for(&self, office: &str) -> WeekEnding {
        self.offices
            .get(office)
            .map(|o| o.week_ending)
            .unwrap_or_default()
    }

    pub fn display_name<'a>(&'a self, office: &'a str) -> &'a str {
        self.offices
            .get(office)
            .and_then(|o| o.display_name.as_deref())
            .unwrap_or(office)
    }

    /// Consolidate a raw site name into its reporting office.
    pub fn resolve_office<'a>(&'a self, raw: &'a str) -> &'a str {
        self.office_aliases
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::{Rate, Status};

    #[test]
    fn defaults_are_sunday_ending_and_consolidate_cincinnati() {
        let config = DashboardConfig::default();
        assert_eq!(config.week_ending_for("Anywhere"), WeekEnding::SUNDAY);
        assert_eq!(config.resolve_office("Blue Ash"), "P&G Cincinnati");
        assert_eq!(config.resolve_office("Dayton"), "Dayton");
        assert_eq!(config.display_name("Dayton"), "Dayton");
    }

    #[test]
    fn json_config_sets_conventions_and_overrides() {
        let text = r#"{
            "offices": {
                "ATL": { "display_name": "Atlanta", "week_ending": "Saturday" }
            },
            "thresholds": { "finger_rate": { "good": 97.5, "warning": 92.0 } },
            "department_priority": ["Packing", "Shipping"]
        }"#;
        let config = DashboardConfig::from_json(text).unwrap();
        assert_eq!(config.week_ending_for("ATL"), WeekEnding::SATURDAY);
        assert_eq!(config.display_name("ATL"), "Atlanta");
        // Fields left out keep their defaults.
        assert_eq!(config.resolve_office("St. Bernard"), "P&G Cincinnati");
        assert_eq!(config.shift_priority, vec!["1", "2", "3"]);

        let thresholds = config.thresholds().unwrap();
        assert_eq!(
            thresholds.classify(Metric::FingerRate, Rate::new(97, 100)),
            Some(Status::Warning)
        );
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(DashboardConfig::from_json(r#"{"offices": {"X": {"week_ending": "Someday"}}}"#).is_err());
        let inverted = r#"{"thresholds": {"write_in_rate": {"good": 5.0, "warning": 1.0}}}"#;
        assert!(matches!(DashboardConfig::from_json(inverted), Err(KpiError::Config(_))));
        assert!(DashboardConfig::from_json(r#"{"office_aliases": {"": "X"}}"#).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("bstt_report_missing_config_for_test.json");
        let config = DashboardConfig::load(&path).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }
}
