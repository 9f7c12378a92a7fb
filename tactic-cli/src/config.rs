use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tactic_core::LedgerConfig;
use tactic_match::MatchConfig;

pub const PASSWORD_ENV: &str = "TACTIC_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub verbose: bool,
    pub ledger: LedgerConfig,
    pub matches: MatchConfig,
    /// Sequence a fresh local ledger starts at.
    pub genesis_ledger: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tactic"),
            verbose: false,
            ledger: LedgerConfig::default(),
            matches: MatchConfig::default(),
            genesis_ledger: 1,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, verbose: bool) -> Self {
        let mut config = Self::default();
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        config.verbose = verbose;
        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tactic.db")
    }

    pub fn handoff_path(&self) -> PathBuf {
        self.data_dir.join("handoffs.json")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_filter(&self) -> String {
        let level = if self.verbose { "debug" } else { "info" };
        format!(
            "tactic={},tactic_core={},tactic_match={}",
            level, level, level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_data_dir() {
        let config = CliConfig::new(Some(PathBuf::from("/tmp/t")), true);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/t/tactic.db"));
        assert_eq!(config.handoff_path(), PathBuf::from("/tmp/t/handoffs.json"));
        assert_eq!(
            config.log_filter(),
            "tactic=debug,tactic_core=debug,tactic_match=debug"
        );
    }

    #[test]
    fn test_default_configs_validate() {
        let config = CliConfig::default();
        assert!(config.ledger.validate().is_ok());
        assert!(config.matches.validate().is_ok());
        assert!(config.data_dir.ends_with("tactic"));
    }
}
