//! SMEL CLI - artifact in, artifact out
//!
//! Glue between the script parser, the adapters and the executor. The binary
//! in `main.rs` only reads files, installs logging and prints what these
//! functions return.

use smel_adapters::adapter_for;
use smel_core::{Migration, SmelConfig, SmelError, SmelResult, Snapshot};
use smel_engine::{CheckReport, Executor};
use std::fmt::Write as _;

/// Result of [`migrate_artifact`].
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Parsed script.
    pub migration: Migration,
    /// Imported input schema (V1).
    pub source: Snapshot,
    /// Committed output schema (V2).
    pub target: Snapshot,
    /// Operations applied.
    pub applied: usize,
    /// V2 rendered by the target paradigm's adapter.
    pub artifact: String,
}

impl MigrationReport {
    /// One-line summary with both fingerprints.
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} v{} ({}) -> v{} ({}), {} operation(s), {} -> {}",
            self.migration.header.name,
            self.migration.header.version,
            self.target.name(),
            self.source.version(),
            self.source.paradigm(),
            self.target.version(),
            self.target.paradigm(),
            self.applied,
            short_fingerprint(&self.source),
            short_fingerprint(&self.target),
        )
    }
}

fn short_fingerprint(snapshot: &Snapshot) -> String {
    snapshot.fingerprint().chars().take(12).collect()
}

/// Configuration from a TOML file when given, otherwise from the environment.
pub fn load_config(toml_source: Option<&str>) -> SmelResult<SmelConfig> {
    let config = match toml_source {
        Some(source) => SmelConfig::from_toml_str(source)?,
        None => SmelConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

/// Parse `script` and import `source` with the adapter of its FROM paradigm.
pub fn prepare(source: &str, script: &str, config: &SmelConfig) -> SmelResult<(Migration, Snapshot)> {
    let migration = smel_dsl::parse(script)?;
    let adapter = adapter_for(migration.header.source, config)?;
    let snapshot = adapter.import_schema(source, &migration.header.schema)?;
    tracing::info!(
        schema = %migration.header.schema,
        paradigm = %migration.header.source,
        entities = snapshot.len(),
        "Imported source schema"
    );
    Ok((migration, snapshot))
}

/// Dry-run every operation of `script` against `source`.
pub fn check_artifact(source: &str, script: &str, config: &SmelConfig) -> SmelResult<CheckReport> {
    let (migration, snapshot) = prepare(source, script, config)?;
    Ok(Executor::new(config.clone()).check(&snapshot, &migration.operations))
}

/// Import `source`, apply `script`, and export the result in the script's
/// TO paradigm.
pub fn migrate_artifact(source: &str, script: &str, config: &SmelConfig) -> SmelResult<MigrationReport> {
    let (migration, snapshot) = prepare(source, script, config)?;
    let outcome = Executor::new(config.clone()).migrate(&snapshot, &migration)?;
    let artifact = adapter_for(migration.header.target, config)?.export_schema(&outcome.snapshot)?;

    Ok(MigrationReport {
        migration,
        source: snapshot,
        target: outcome.snapshot,
        applied: outcome.applied,
        artifact,
    })
}

/// Human-readable check report, one line per operation.
pub fn render_check(report: &CheckReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let _ = match outcome.error() {
            None => writeln!(out, "  [{:>3}] {:<18} ok", outcome.index, outcome.keyword),
            Some(error) => writeln!(
                out,
                "  [{:>3}] {:<18} {}: {}",
                outcome.index,
                outcome.keyword,
                error.kind(),
                error
            ),
        };
    }
    out
}

/// V1, the per-operation preview and V2 (or the failure), with fingerprints.
pub fn inspect_artifact(source: &str, script: &str, config: &SmelConfig) -> SmelResult<String> {
    let (migration, snapshot) = prepare(source, script, config)?;
    let executor = Executor::new(config.clone());

    let mut out = String::new();
    let _ = writeln!(out, "== V1 {}", snapshot.fingerprint());
    let _ = write!(out, "{}", snapshot);
    let _ = writeln!(out, "== PREVIEW");
    out.push_str(&render_check(&executor.check(&snapshot, &migration.operations)));

    match executor.migrate(&snapshot, &migration) {
        Ok(outcome) => {
            let _ = writeln!(out, "== V2 {}", outcome.snapshot.fingerprint());
            let _ = write!(out, "{}", outcome.snapshot);
        }
        Err(error) => {
            let _ = writeln!(out, "== V2 not produced: {}", SmelError::from(error));
        }
    }
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================
