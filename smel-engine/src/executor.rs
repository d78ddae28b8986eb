//! Executor: check and run operation batches against a snapshot.

use crate::ops::{self, Context};
use smel_core::{
    Entity, ExecutionError, Migration, Operation, Paradigm, SchemaError, SchemaResult,
    SmelConfig, Snapshot,
};

// ============================================================================
// REPORTS
// ============================================================================

/// Preview status of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    WouldSucceed,
    WouldFail(SchemaError),
}

/// Preview of one operation in a [`CheckReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Position of the operation in the batch.
    pub index: usize,
    pub keyword: &'static str,
    pub status: OutcomeStatus,
}

impl OperationOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::WouldSucceed
    }

    pub fn error(&self) -> Option<&SchemaError> {
        match &self.status {
            OutcomeStatus::WouldSucceed => None,
            OutcomeStatus::WouldFail(error) => Some(error),
        }
    }
}

/// Result of [`Executor::check`]: one outcome per operation, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(OperationOutcome::succeeded)
    }

    pub fn first_failure(&self) -> Option<&OperationOutcome> {
        self.failures().next()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Result of a successful [`Executor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// The committed V2.
    pub snapshot: Snapshot,
    /// Number of operations applied.
    pub applied: usize,
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Applies operation batches to snapshots.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: SmelConfig,
}

impl Executor {
    pub fn new(config: SmelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmelConfig {
        &self.config
    }

    /// Preview every operation without committing anything.
    ///
    /// A failing operation is reported and skipped: the preview state stays
    /// as it was before it, and evaluation continues with the next one.
    pub fn check(&self, snapshot: &Snapshot, operations: &[Operation]) -> CheckReport {
        let mut ctx = Context::new(snapshot.to_draft(), &self.config);
        let mut report = CheckReport::default();

        for (index, operation) in operations.iter().enumerate() {
            let mut next = ctx.clone();
            let status = match step(&mut next, operation) {
                Ok(()) => {
                    ctx = next;
                    OutcomeStatus::WouldSucceed
                }
                Err(error) => {
                    tracing::debug!(index, op = operation.keyword(), kind = %error.kind(), "check: operation would fail");
                    OutcomeStatus::WouldFail(error)
                }
            };
            report.outcomes.push(OperationOutcome {
                index,
                keyword: operation.keyword(),
                status,
            });
        }

        report
    }

    /// Apply `operations` in order and commit the result.
    ///
    /// The first failure aborts the batch; `snapshot` is never modified.
    pub fn run(&self, snapshot: &Snapshot, operations: &[Operation]) -> Result<RunOutcome, ExecutionError> {
        self.execute(snapshot, operations, None)
    }

    /// Run a parsed script and retag the result to its target paradigm.
    pub fn migrate(&self, snapshot: &Snapshot, migration: &Migration) -> Result<RunOutcome, ExecutionError> {
        let header = &migration.header;
        if header.source != snapshot.paradigm() {
            tracing::warn!(
                expected = %header.source,
                actual = %snapshot.paradigm(),
                migration = %header.name,
                "Snapshot paradigm differs from the script's source paradigm"
            );
        }
        let retag = (header.target != snapshot.paradigm()).then_some(header.target);
        self.execute(snapshot, &migration.operations, retag)
    }

    fn execute(
        &self,
        snapshot: &Snapshot,
        operations: &[Operation],
        retag: Option<Paradigm>,
    ) -> Result<RunOutcome, ExecutionError> {
        let mut ctx = Context::new(snapshot.to_draft(), &self.config);

        for (index, operation) in operations.iter().enumerate() {
            let span = tracing::debug_span!("operation", index, op = operation.keyword());
            let _guard = span.enter();

            if let Err(error) = step(&mut ctx, operation) {
                tracing::warn!(index, kind = %error.kind(), error = %error, "Operation failed, batch discarded");
                return Err(ExecutionError {
                    index,
                    operation: operation.keyword().to_string(),
                    error,
                });
            }
        }

        let applied = operations.len();
        let mut draft = ctx.draft;
        if let Some(paradigm) = retag {
            draft.paradigm = paradigm;
            for entity in &mut draft.entities {
                retag_entity(entity, paradigm);
            }
        }
        if applied > 0 || retag.is_some() {
            draft.version = snapshot.version().saturating_add(1);
        }

        let snapshot = draft.commit().map_err(|error| ExecutionError {
            index: applied,
            operation: "COMMIT".to_string(),
            error,
        })?;
        tracing::info!(
            schema = snapshot.name(),
            version = snapshot.version(),
            applied,
            "Committed schema snapshot"
        );

        Ok(RunOutcome { snapshot, applied })
    }
}

/// Apply one operation, then re-check every structural invariant.
fn step(ctx: &mut Context<'_>, operation: &Operation) -> SchemaResult<()> {
    ops::apply(ctx, operation)?;
    ctx.draft.validate()
}

fn retag_entity(entity: &mut Entity, paradigm: Paradigm) {
    entity.kind = paradigm;
    for aggregation in &mut entity.aggregations {
        retag_entity(&mut aggregation.payload, paradigm);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::{AttributePath, ErrorKind, Header, KeyStrategy};
    use smel_test_utils::fixtures::{person_document_snapshot, shop_relational_snapshot};

    fn delete(name: &str) -> Operation {
        Operation::DeleteEntity {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_empty_batch_returns_equal_snapshot() {
        let v1 = shop_relational_snapshot();
        let outcome = Executor::default().run(&v1, &[]).unwrap();
        assert_eq!(outcome.snapshot, v1);
        assert_eq!(outcome.applied, 0);
    }

    #[test]
    fn test_run_bumps_version() {
        let v1 = shop_relational_snapshot();
        let outcome = Executor::default().run(&v1, &[delete("order_line")]).unwrap();
        assert_eq!(outcome.snapshot.version(), v1.version() + 1);
        assert_eq!(outcome.applied, 1);
        assert!(outcome.snapshot.entity("order_line").is_none());
        assert!(v1.entity("order_line").is_some());
    }

    #[test]
    fn test_run_aborts_on_first_failure() {
        let v1 = shop_relational_snapshot();
        let ops = [delete("order_line"), delete("customer"), delete("orders")];
        let err = Executor::default().run(&v1, &ops).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.operation, "DELETE ENTITY");
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
    }

    #[test]
    fn test_check_skips_failures_and_continues() {
        let v1 = shop_relational_snapshot();
        let ops = [delete("customer"), delete("order_line"), delete("orders"), delete("customer")];
        let report = Executor::default().check(&v1, &ops);

        let statuses: Vec<bool> = report.outcomes.iter().map(|o| o.succeeded()).collect();
        assert_eq!(statuses, vec![false, true, true, true]);
        assert!(!report.is_ok());
        assert_eq!(report.first_failure().unwrap().index, 0);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(
            report.outcomes[0].error().map(|e| e.kind()),
            Some(ErrorKind::ReferentialConflict)
        );
    }

    #[test]
    fn test_prefixed_keys_continue_across_operations() {
        let v1 = shop_relational_snapshot();
        let ops = [
            Operation::DropPrimaryKey {
                entity: "order_line".to_string(),
                attributes: vec!["order_id".to_string(), "line_no".to_string()],
            },
            Operation::GenerateKey {
                path: AttributePath::new("order_line", "code"),
                strategy: KeyStrategy::Prefixed("ol".to_string()),
            },
        ];
        let outcome = Executor::default().run(&v1, &ops).unwrap();
        let code = outcome.snapshot.entity("order_line").unwrap().attribute("code").unwrap();
        assert_eq!(code.generator.as_ref().unwrap().first_value().as_deref(), Some("ol000001"));
    }

    #[test]
    fn test_migrate_retags_paradigm() {
        let v1 = person_document_snapshot();
        let migration = Migration {
            header: Header {
                name: "m".to_string(),
                version: "1".to_string(),
                source: Paradigm::Document,
                target: Paradigm::Relational,
                schema: v1.name().to_string(),
                schema_version: "1".to_string(),
            },
            operations: vec![],
        };
        let outcome = Executor::default().migrate(&v1, &migration).unwrap();
        assert_eq!(outcome.snapshot.paradigm(), Paradigm::Relational);
        let person = outcome.snapshot.entity("person").unwrap();
        assert_eq!(person.kind, Paradigm::Relational);
        assert!(person.aggregations.iter().all(|a| a.payload.kind == Paradigm::Relational));
        assert_eq!(outcome.snapshot.version(), 2);
    }
}
