use blockcode_editor::LayoutMetrics;
use blockcode_language::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "blockcode.config.json";

/// Blockcode configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Indentation unit for Python export
    #[serde(default = "default_indent")]
    pub indent: String,

    /// Caret layout metrics
    #[serde(default)]
    pub layout: LayoutMetrics,

    /// Extra names added to the global scope
    #[serde(default)]
    pub builtins: Vec<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_indent() -> String {
    "    ".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            indent: self.indent.clone(),
            builtins: self.builtins.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            indent: default_indent(),
            layout: LayoutMetrics::default(),
            builtins: vec![],
        }
    }
}
