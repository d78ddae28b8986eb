//! Fuzz the SMEL script parser; accepted scripts must survive the
//! pretty-printer round trip.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use smel_dsl::{parse, pretty_print};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        match parse(input) {
            Ok(migration) => {
                let canonical = pretty_print(&migration);
                let reparsed = parse(&canonical).expect("canonical form parses");
                assert_eq!(reparsed, migration);
            }
            Err(err) => {
                assert!(err.line >= 1, "Error line should be >= 1");
                assert!(err.column >= 1, "Error column should be >= 1");
                assert!(!err.message.is_empty());
            }
        }
    }
});
