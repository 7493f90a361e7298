use crate::error::HostError;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns the histex base directory: `~/.histex`, fallback `/tmp/histex`.
pub fn histex_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".histex"))
        .unwrap_or_else(|| PathBuf::from("/tmp/histex"))
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistexConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl HistexConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: HistexConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HostError> {
        if self.capture.variable_name.trim().is_empty() {
            return Err(HostError::InvalidConfig(
                "capture.variable_name must not be empty".to_string(),
            ));
        }
        if self.capture.variable_name.starts_with('$') {
            return Err(HostError::InvalidConfig(format!(
                "capture.variable_name must not include the sigil: {}",
                self.capture.variable_name
            )));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<HistexConfig> {
    let path = std::env::var("HISTEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| histex_dir().join("config.toml"));
    if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        let config = HistexConfig::from_toml_str(&contents)?;
        tracing::debug!("loaded histex config from {}", path.display());
        Ok(config)
    } else {
        Ok(HistexConfig::default())
    }
}

// ---------------------------------------------------------------------------
// History table limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Number of execution records retained per session.
    #[serde(default = "default_maximum_entry_count")]
    pub maximum_entry_count: usize,
    /// Cap applied independently to output, output sources and errors of one record.
    #[serde(default = "default_maximum_item_count_per_entry")]
    pub maximum_item_count_per_entry: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            maximum_entry_count: default_maximum_entry_count(),
            maximum_item_count_per_entry: default_maximum_item_count_per_entry(),
        }
    }
}

fn default_maximum_entry_count() -> usize {
    200
}

fn default_maximum_item_count_per_entry() -> usize {
    1000
}

// ---------------------------------------------------------------------------
// Last-result capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Name of the last-result variable, without sigil.
    #[serde(default = "default_variable_name")]
    pub variable_name: String,
    #[serde(default = "default_maximum_item_count")]
    pub maximum_item_count: usize,
    /// Type names never stored in the last-result variable.
    #[serde(default = "default_excluded_types")]
    pub excluded_types: Vec<String>,
    /// Store a lone value-type result (numbers, booleans, ...).
    #[serde(default)]
    pub capture_value_types: bool,
    /// Overwrite the variable with null when a command produced nothing.
    #[serde(default)]
    pub capture_null: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            variable_name: default_variable_name(),
            maximum_item_count: default_maximum_item_count(),
            excluded_types: default_excluded_types(),
            capture_value_types: false,
            capture_null: false,
        }
    }
}

fn default_variable_name() -> String {
    "__".to_string()
}

fn default_maximum_item_count() -> usize {
    1000
}

fn default_excluded_types() -> Vec<String> {
    [
        "Histex.HistoryConfig",
        "Histex.CaptureConfig",
        "System.String",
        "System.Management.Automation.Runspaces.ConsolidatedString",
        "HelpInfoShort",
        "MamlCommandHelpInfo",
        "System.Management.Automation.CommandInfo",
        "Microsoft.PowerShell.Commands.GenericMeasureInfo",
        "System.Management.Automation.PSMemberInfo",
        "Microsoft.PowerShell.Commands.MemberDefinition",
        "System.Type",
        "System.Management.Automation.PSVariable",
        "Microsoft.PowerShell.Commands.HistoryInfo#Extended",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
