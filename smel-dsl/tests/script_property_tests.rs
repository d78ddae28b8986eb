//! Property tests for the script front end.

use proptest::prelude::*;
use smel_core::{FlattenClause, KeyStrategy, Operation, Paradigm};
use smel_dsl::{parse, pretty_print, Lexer, TokenKind};
use smel_test_utils::{fixtures, generators};

#[test]
fn test_person_script_parses() {
    let migration = parse(fixtures::PERSON_SCRIPT).expect("person script parses");
    assert_eq!(migration.header.source, Paradigm::Document);
    assert_eq!(migration.header.target, Paradigm::Relational);
    assert_eq!(migration.header.schema, "person_schema");
    assert_eq!(migration.operations.len(), 4);

    match &migration.operations[1] {
        Operation::Flatten { path, into, clauses } => {
            assert!(path.array);
            assert_eq!(into, "person_tag");
            assert_eq!(
                clauses[0],
                FlattenClause::GenerateKey {
                    attribute: "id".to_string(),
                    strategy: KeyStrategy::Serial,
                }
            );
        }
        other => panic!("Expected FLATTEN, got {:?}", other),
    }
    assert!(matches!(migration.operations[3], Operation::RenameAttribute { .. }));
}

#[test]
fn test_person_script_round_trips() {
    let migration = parse(fixtures::PERSON_SCRIPT).unwrap();
    let printed = pretty_print(&migration);
    assert_eq!(parse(&printed).unwrap(), migration);
}

const HEADER: &str = "MIGRATION m:1 FROM RELATIONAL TO RELATIONAL USING s:1\n";

#[test]
fn test_keyword_names_keep_their_spelling() {
    let migration = parse(&format!("{}RENAME ENTITY Date TO Key;\nRENAME TYPE TO Default IN Date;", HEADER)).unwrap();
    assert_eq!(
        migration.operations,
        vec![
            Operation::RenameEntity {
                from: "Date".to_string(),
                to: "Key".to_string(),
            },
            Operation::RenameAttribute {
                entity: "Date".to_string(),
                from: "TYPE".to_string(),
                to: "Default".to_string(),
            },
        ]
    );
    assert_eq!(parse(&pretty_print(&migration)).unwrap(), migration);
}

/// A keyword written in arbitrary letter case.
fn arb_keyword_name() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["date", "key", "type", "entity", "value", "reference", "text"]),
        prop::collection::vec(any::<bool>(), 9),
    )
        .prop_map(|(word, upper)| {
            word.chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_keyword_names_survive_parsing(from in arb_keyword_name(), to in arb_keyword_name()) {
        let migration = parse(&format!("{}RENAME ENTITY {} TO {};", HEADER, from, to)).unwrap();
        prop_assert_eq!(&migration.operations, &vec![Operation::RenameEntity { from, to }]);
    }

    #[test]
    fn prop_pretty_print_round_trips(migration in generators::arb_migration()) {
        let printed = pretty_print(&migration);
        let reparsed = parse(&printed);
        prop_assert!(reparsed.is_ok(), "failed to reparse:\n{}\n{:?}", printed, reparsed);
        prop_assert_eq!(reparsed.unwrap(), migration);
    }

    #[test]
    fn prop_lexer_always_terminates_with_eof(source in "\\PC{0,200}") {
        let tokens = Lexer::new(&source).tokenize();
        prop_assert!(matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)));
        for token in &tokens {
            prop_assert!(token.span.start <= token.span.end);
            prop_assert!(token.span.end <= source.len());
        }
    }

    #[test]
    fn prop_parser_never_panics(source in "\\PC{0,200}") {
        let _ = parse(&source);
    }
}
