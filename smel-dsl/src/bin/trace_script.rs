/// Script Tracer - Shows the flow through Lexer → Parser → Pretty printer
///
/// Usage: cargo run --bin trace_script <script.smel>

use smel_dsl::{parse, pretty_print, Lexer, TokenKind};
use std::fs;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin trace_script <script.smel>");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin trace_script migrations/person_d2r.smel");
        std::process::exit(1);
    }

    let path = &args[1];

    println!("╔═══════════════════════════════════════════════════════════════");
    println!("║ SMEL SCRIPT TRACER");
    println!("╚═══════════════════════════════════════════════════════════════\n");

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    println!("📝 INPUT SCRIPT:");
    println!("{}", source);
    println!();

    // Step 1: tokens
    println!("🔤 TOKENS:");
    println!("─────────────────────────────────────────────────────────────");
    let tokens = Lexer::new(&source).tokenize();
    for token in &tokens {
        let marker = if matches!(token.kind, TokenKind::Error(_)) { "❌" } else { "  " };
        println!("{} {:>4}:{:<3} {:?}", marker, token.span.line, token.span.column, token.kind);
    }
    println!();

    // Step 2: AST
    println!("🌳 AST:");
    println!("─────────────────────────────────────────────────────────────");
    match parse(&source) {
        Ok(migration) => {
            println!("{:#?}", migration);
            println!();

            // Step 3: round trip
            println!("🔄 ROUND-TRIP TEST:");
            println!("─────────────────────────────────────────────────────────────");
            let canonical = pretty_print(&migration);
            println!("{}", canonical);

            match parse(&canonical) {
                Ok(reparsed) if reparsed == migration => println!("✅ Parse succeeded, round trip stable"),
                Ok(_) => println!("⚠️  Round trip changed the AST"),
                Err(e) => println!("❌ Canonical form failed to parse: {}", e),
            }
        }
        Err(e) => {
            println!("❌ {}", e);
            std::process::exit(2);
        }
    }
}
