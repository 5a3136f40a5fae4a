//! @ai:module:intent Configuration structs for the crank runner
//! @ai:module:layer infrastructure
//! @ai:module:public_api RunnerConfig, RunConfig, DiagnosticsConfig, DiagnosticFrequency, BenchmarkConfig, StatsConfig, EngineConfig
//! @ai:module:stateless true

use crate::engine::CallPolicy;
use crate::error::{Error, Result};
use crate::store::StorageMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// @ai:intent Main configuration for the crank runner
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// @ai:intent Block sizing, step budget and storage selection
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Units of work per checkpoint boundary
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Step budget for a run; 0 runs until the engine drains
    #[serde(default)]
    pub step_limit: u64,
    /// Wipe persisted state before opening
    #[serde(default)]
    pub force_reset: bool,
    #[serde(default)]
    pub storage: StorageMode,
    #[serde(default = "default_db_dir")]
    pub db_dir: PathBuf,
}

/// @ai:intent When a diagnostic collaborator fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticFrequency {
    PerCrank,
    #[default]
    PerBlock,
}

/// @ai:intent Observational side channels run during blocks
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// State dumps are written here when set
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
    #[serde(default = "default_dump_tag")]
    pub dump_tag: String,
    #[serde(default)]
    pub dump_frequency: DiagnosticFrequency,
    #[serde(default)]
    pub audit_refcounts: bool,
    #[serde(default)]
    pub audit_frequency: DiagnosticFrequency,
}

/// @ai:intent Benchmark workload selection
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of rounds; 0 disables benchmarking
    #[serde(default)]
    pub rounds: u32,
    #[serde(default = "default_benchmark_target")]
    pub target: String,
    #[serde(default = "default_benchmark_method")]
    pub method: String,
    #[serde(default)]
    pub policy: CallPolicy,
}

/// @ai:intent Statistics collection toggles
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default)]
    pub log_blocks: bool,
    #[serde(default)]
    pub log_memory: bool,
    #[serde(default)]
    pub log_disk: bool,
    #[serde(default)]
    pub log_engine_stats: bool,
    /// Reports are written here when set
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// @ai:intent Work costs for the reference queue engine
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_call_cost")]
    pub call_cost: u64,
    #[serde(default = "default_message_cost")]
    pub message_cost: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            step_limit: 0,
            force_reset: false,
            storage: StorageMode::default(),
            db_dir: default_db_dir(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dump_dir: None,
            dump_tag: default_dump_tag(),
            dump_frequency: DiagnosticFrequency::default(),
            audit_refcounts: false,
            audit_frequency: DiagnosticFrequency::default(),
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            rounds: 0,
            target: default_benchmark_target(),
            method: default_benchmark_method(),
            policy: CallPolicy::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_cost: default_call_cost(),
            message_cost: default_message_cost(),
        }
    }
}

fn default_block_size() -> u64 {
    200
}

fn default_db_dir() -> PathBuf {
    PathBuf::from("crank-db")
}

fn default_dump_tag() -> String {
    "state".to_string()
}

fn default_benchmark_target() -> String {
    "bootstrap".to_string()
}

fn default_benchmark_method() -> String {
    "runBenchmarkRound".to_string()
}

fn default_call_cost() -> u64 {
    3
}

fn default_message_cost() -> u64 {
    2
}

impl RunnerConfig {
    /// @ai:intent Load and validate configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("invalid configuration {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @ai:intent Reject configurations that cannot drive an engine
    /// @ai:effects pure
    pub fn validate(&self) -> Result<()> {
        if self.run.block_size == 0 {
            return Err(Error::Configuration(
                "run.block_size must be greater than zero".to_string(),
            ));
        }

        if self.benchmark.target.trim().is_empty() || self.benchmark.method.trim().is_empty() {
            return Err(Error::Configuration(
                "benchmark.target and benchmark.method must not be empty".to_string(),
            ));
        }

        if self.engine.call_cost == 0 || self.engine.message_cost == 0 {
            return Err(Error::Configuration(
                "engine costs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.block_size, 200);
        assert_eq!(config.run.step_limit, 0);
        assert_eq!(config.benchmark.method, "runBenchmarkRound");
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let mut config = RunnerConfig::default();
        config.run.block_size = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runner.toml");

        let mut config = RunnerConfig::default();
        config.run.block_size = 50;
        config.diagnostics.audit_refcounts = true;
        config.diagnostics.dump_frequency = DiagnosticFrequency::PerCrank;
        config.save(&path).unwrap();

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded.run.block_size, 50);
        assert!(loaded.diagnostics.audit_refcounts);
        assert_eq!(loaded.diagnostics.dump_frequency, DiagnosticFrequency::PerCrank);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runner.toml");
        std::fs::write(&path, "[run]\nblock_size = 10\n").unwrap();

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded.run.block_size, 10);
        assert_eq!(loaded.run.storage, StorageMode::File);
        assert_eq!(loaded.engine.call_cost, 3);
    }

    #[test]
    fn test_unknown_storage_mode_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runner.toml");
        std::fs::write(&path, "[run]\nstorage = \"lmdb\"\n").unwrap();

        let err = RunnerConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
