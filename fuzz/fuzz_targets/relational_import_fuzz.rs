//! Fuzz PostgreSQL DDL import. Whatever imports must export, and the export
//! must import back to the same tables (possibly reordered by dependencies).
//!
//! Run with: cargo +nightly fuzz run relational_import_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use smel_adapters::{RelationalAdapter, SchemaAdapter};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let adapter = RelationalAdapter::new();
        if let Ok(snapshot) = adapter.import_schema(input, "fuzz") {
            let ddl = adapter.export_schema(&snapshot).expect("imported snapshot exports");
            let again = adapter.import_schema(&ddl, "fuzz").expect("export imports");
            let mut before = snapshot.entity_names();
            let mut after = again.entity_names();
            before.sort_unstable();
            after.sort_unstable();
            assert_eq!(before, after);
            assert_eq!(adapter.export_schema(&again).expect("re-export"), ddl);
        }
    }
});
