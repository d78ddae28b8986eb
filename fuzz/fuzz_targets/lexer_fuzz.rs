//! Fuzz the SMEL script lexer with arbitrary UTF-8.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use smel_dsl::{Lexer, TokenKind};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let tokens = Lexer::new(input).tokenize();

        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
        for pair in tokens.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start, "tokens overlap");
        }
        for token in &tokens {
            assert!(token.span.start <= token.span.end);
            assert!(token.span.end <= input.len());
            assert!(token.span.line >= 1 && token.span.column >= 1);
        }
    }
});
