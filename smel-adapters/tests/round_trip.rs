//! Artifact round trips through `adapter_for`.

use proptest::prelude::*;
use smel_adapters::adapter_for;
use smel_core::{Migration, Paradigm, SmelConfig, Snapshot};
use smel_engine::Executor;
use smel_test_utils::assertions::{assert_invariants, assert_primary_key};
use smel_test_utils::fixtures::{PERSON_JSON_SCHEMA, PERSON_SCRIPT, SHOP_DDL};
use smel_test_utils::generators::arb_relational_snapshot;

fn round_trip(paradigm: Paradigm, raw: &str, name: &str) -> (Snapshot, String) {
    let adapter = adapter_for(paradigm, &SmelConfig::default()).unwrap();
    let snapshot = adapter.import_schema(raw, name).unwrap();
    let exported = adapter.export_schema(&snapshot).unwrap();
    (snapshot, exported)
}

#[test]
fn test_shop_ddl_round_trip() {
    let (snapshot, exported) = round_trip(Paradigm::Relational, SHOP_DDL, "shop");
    assert_eq!(exported, SHOP_DDL);
    assert_eq!(snapshot.entity_names(), vec!["customer", "orders", "order_line"]);
    assert_invariants(&snapshot);
}

#[test]
fn test_person_json_schema_round_trip() {
    let (snapshot, exported) = round_trip(Paradigm::Document, PERSON_JSON_SCHEMA, "person_schema");
    assert_eq!(exported, PERSON_JSON_SCHEMA);
    assert_eq!(snapshot.paradigm(), Paradigm::Document);
}

#[test]
fn test_migrated_person_exports_as_ddl() {
    let config = SmelConfig::default();
    let document = adapter_for(Paradigm::Document, &config).unwrap();
    let relational = adapter_for(Paradigm::Relational, &config).unwrap();

    let v1 = document.import_schema(PERSON_JSON_SCHEMA, "person_schema").unwrap();
    let migration: Migration = smel_dsl::parse(PERSON_SCRIPT).unwrap();
    let v2 = Executor::new(config).migrate(&v1, &migration).unwrap().snapshot;

    let ddl = relational.export_schema(&v2).unwrap();
    assert!(ddl.starts_with("CREATE TABLE person ("));
    assert!(ddl.contains("REFERENCES person(id)"));

    let reimported = relational.import_schema(&ddl, "person_schema").unwrap();
    assert_eq!(reimported.entity_names(), v2.entity_names());
    assert_primary_key(&reimported, "person_knows", &["person_id", "knows_person_id"]);
    assert_eq!(relational.export_schema(&reimported).unwrap(), ddl);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_relational_export_is_a_fixed_point(v1 in arb_relational_snapshot()) {
        let adapter = adapter_for(Paradigm::Relational, &SmelConfig::default()).unwrap();
        let first = adapter.export_schema(&v1).unwrap();
        let reimported = adapter.import_schema(&first, v1.name()).unwrap();
        prop_assert_eq!(reimported.entity_names(), v1.entity_names());
        prop_assert_eq!(adapter.export_schema(&reimported).unwrap(), first);
    }
}
