//! End-to-end: native artifact + script -> native artifact.

use smel_adapters::{RelationalAdapter, SchemaAdapter};
use smel_cli::{check_artifact, inspect_artifact, migrate_artifact};
use smel_core::{ErrorKind, Paradigm, SmelConfig, SmelError};
use smel_test_utils::assertions::{assert_error_kind, assert_invariants, assert_primary_key};
use smel_test_utils::fixtures::{PERSON_JSON_SCHEMA, PERSON_SCRIPT, SHOP_DDL};

const SHOP_EVOLUTION: &str = "MIGRATION shop_evo:2
FROM RELATIONAL TO RELATIONAL
USING shop:1

ADD ATTRIBUTE customer.phone WITH TYPE VARCHAR(20);
RENAME ENTITY orders TO purchase;
";

#[test]
fn test_person_document_to_ddl() {
    let report = migrate_artifact(PERSON_JSON_SCHEMA, PERSON_SCRIPT, &SmelConfig::default()).unwrap();
    assert_eq!(report.applied, 4);
    assert_eq!(report.source.paradigm(), Paradigm::Document);
    assert_eq!(report.target.paradigm(), Paradigm::Relational);
    assert_ne!(report.source.fingerprint(), report.target.fingerprint());
    assert_invariants(&report.target);

    let tables = RelationalAdapter::new().import_schema(&report.artifact, "person_schema").unwrap();
    assert_eq!(tables.entity_names(), vec!["person", "address", "person_tag", "person_knows"]);
    assert_primary_key(&tables, "person_tag", &["id"]);
}

#[test]
fn test_shop_evolution_rewrites_foreign_keys() {
    let report = migrate_artifact(SHOP_DDL, SHOP_EVOLUTION, &SmelConfig::default()).unwrap();
    assert_eq!(report.target.version(), 2);
    assert!(report.artifact.contains("    phone VARCHAR(20)\n"));
    assert!(report.artifact.contains("CREATE TABLE purchase ("));
    assert!(report.artifact.contains("REFERENCES purchase(id)"));
    assert!(!report.artifact.contains("orders"));
}

#[test]
fn test_check_does_not_stop_at_first_failure() {
    let script = SHOP_EVOLUTION.replace("customer.phone", "nobody.phone");
    let report = check_artifact(SHOP_DDL, &script, &SmelConfig::default()).unwrap();
    assert!(!report.is_ok());
    assert_eq!(report.first_failure().unwrap().index, 0);
    assert!(report.outcomes[1].succeeded());
}

#[test]
fn test_inspect_shows_both_fingerprints() {
    let config = SmelConfig::default();
    let report = migrate_artifact(SHOP_DDL, SHOP_EVOLUTION, &config).unwrap();
    let text = inspect_artifact(SHOP_DDL, SHOP_EVOLUTION, &config).unwrap();
    assert!(text.contains(&format!("== V1 {}", report.source.fingerprint())));
    assert!(text.contains(&format!("== V2 {}", report.target.fingerprint())));
    assert!(text.contains("RENAME ENTITY"));
}

#[test]
fn test_pipeline_errors() {
    let config = SmelConfig::default();

    // header says DOCUMENT, input is DDL
    let result = migrate_artifact(SHOP_DDL, PERSON_SCRIPT, &config);
    assert_error_kind(&result, ErrorKind::ParseFailure);
    assert!(matches!(result, Err(SmelError::Adapter(_))));

    let result = migrate_artifact(SHOP_DDL, "MIGRATION x:1 FROM RELATIONAL", &config);
    assert!(matches!(result, Err(SmelError::Parse { .. })));

    let to_graph = SHOP_EVOLUTION.replace("TO RELATIONAL", "TO GRAPH");
    let result = migrate_artifact(SHOP_DDL, &to_graph, &config);
    assert_error_kind(&result, ErrorKind::UnsupportedConstruct);

    let failing = SHOP_EVOLUTION.replace("customer.phone", "nobody.phone");
    let result = migrate_artifact(SHOP_DDL, &failing, &config);
    assert_error_kind(&result, ErrorKind::UnknownEntity);
    assert!(matches!(result, Err(SmelError::Execution(ref e)) if e.index == 0));
}
