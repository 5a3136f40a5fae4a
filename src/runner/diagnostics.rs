//! @ai:module:intent Observational side channels fired per crank or per block
//! @ai:module:layer application
//! @ai:module:public_api Diagnostics, StateDumper, RefcountAuditor
//! @ai:module:stateless false

use crate::config::{DiagnosticFrequency, DiagnosticsConfig};
use crate::engine::{AuditReport, Engine};
use std::path::{Path, PathBuf};

/// @ai:intent Writes engine state snapshots to numbered JSON files
pub struct StateDumper {
    dir: PathBuf,
    tag: String,
    frequency: DiagnosticFrequency,
    written: u64,
}

impl StateDumper {
    pub fn new(dir: &Path, tag: &str, frequency: DiagnosticFrequency) -> Self {
        Self {
            dir: dir.to_path_buf(),
            tag: tag.to_string(),
            frequency,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// @ai:intent Path of the dump taken at a given crank
    /// @ai:effects pure
    pub fn path_for(&self, crank: u64) -> PathBuf {
        self.dir.join(format!("{}-{}.json", self.tag, crank))
    }

    /// @ai:intent Write the engine's debug state for this crank
    /// @ai:effects fs:write
    pub fn dump<E: Engine>(&mut self, engine: &E, crank: u64) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(crank);
        let json = serde_json::to_string_pretty(&engine.dump_state())?;
        std::fs::write(&path, json)?;
        self.written += 1;
        Ok(path)
    }
}

/// @ai:intent Runs the engine's reference-count audit and tallies failures
pub struct RefcountAuditor {
    frequency: DiagnosticFrequency,
    audits: u64,
    failures: u64,
}

impl RefcountAuditor {
    pub fn new(frequency: DiagnosticFrequency) -> Self {
        Self {
            frequency,
            audits: 0,
            failures: 0,
        }
    }

    pub fn audits(&self) -> u64 {
        self.audits
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// @ai:intent Audit the engine and log any violation
    /// @ai:effects io
    pub fn audit<E: Engine>(&mut self, engine: &E, crank: u64) -> AuditReport {
        let report = engine.audit_refcounts();
        self.audits += 1;

        if !report.is_clean() {
            self.failures += 1;
            for violation in &report.violations {
                tracing::warn!("Refcount audit failed at crank {}: {}", crank, violation);
            }
        }

        report
    }
}

/// @ai:intent The fixed set of diagnostic collaborators chosen at construction
///
/// Neither collaborator can change engine state: both only get `&E`.
/// Dump failures are logged and the run continues.
#[derive(Default)]
pub struct Diagnostics {
    dumper: Option<StateDumper>,
    auditor: Option<RefcountAuditor>,
}

impl Diagnostics {
    /// @ai:intent Build the active collaborators from config
    /// @ai:effects pure
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let dumper = config
            .dump_dir
            .as_deref()
            .map(|dir| StateDumper::new(dir, &config.dump_tag, config.dump_frequency));

        let auditor = config
            .audit_refcounts
            .then(|| RefcountAuditor::new(config.audit_frequency));

        Self { dumper, auditor }
    }

    pub fn is_empty(&self) -> bool {
        self.dumper.is_none() && self.auditor.is_none()
    }

    pub fn dumper(&self) -> Option<&StateDumper> {
        self.dumper.as_ref()
    }

    pub fn auditor(&self) -> Option<&RefcountAuditor> {
        self.auditor.as_ref()
    }

    /// @ai:intent Fire per-crank collaborators after one unit of work
    pub fn after_crank<E: Engine>(&mut self, engine: &E, crank: u64) {
        self.fire(DiagnosticFrequency::PerCrank, engine, crank);
    }

    /// @ai:intent Fire per-block collaborators after a block ends
    pub fn after_block<E: Engine>(&mut self, engine: &E, crank: u64) {
        self.fire(DiagnosticFrequency::PerBlock, engine, crank);
    }

    fn fire<E: Engine>(&mut self, when: DiagnosticFrequency, engine: &E, crank: u64) {
        if let Some(dumper) = self.dumper.as_mut().filter(|d| d.frequency == when) {
            if let Err(e) = dumper.dump(engine, crank) {
                tracing::warn!("Failed to dump state at crank {}: {}", crank, e);
            }
        }

        if let Some(auditor) = self.auditor.as_mut().filter(|a| a.frequency == when) {
            auditor.audit(engine, crank);
        }
    }
}
