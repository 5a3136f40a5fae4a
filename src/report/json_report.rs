//! @ai:module:intent JSON export and re-import of run statistics
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::metrics::RunReport;
use anyhow::{Context, Result};
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()>;

    fn load(&self, input_path: &Path) -> Result<RunReport>;
}

/// @ai:intent Writes `RunReport` as pretty JSON
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:effects fs:write
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(output_path, json)?;
        Ok(())
    }

    /// @ai:intent Read a previously exported report back
    /// @ai:effects fs:read
    fn load(&self, input_path: &Path) -> Result<RunReport> {
        let content = std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read {}", input_path.display()))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", input_path.display()))?;
        Ok(report)
    }
}
