//! Lexer token types

// ============================================================================
// LEXER TYPES
// ============================================================================

/// Token kinds for SMEL scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Header
    Migration,
    From,
    To,
    Using,

    // Paradigms
    Relational,
    Document,
    Columnar,
    Graph,

    // Operations
    Rename,
    Add,
    Delete,
    Extract,
    Copy,
    Generate,
    Drop,
    Nest,
    Flatten,

    // Operation objects and modifiers
    Entity,
    Attribute,
    Attributes,
    Reference,
    Primary,
    Key,
    In,
    Into,
    As,
    With,
    Type,
    Not,
    Null,
    Default,
    Serial,
    Prefix,
    True,
    False,

    // Types (STRING and REFERENCE double as type names)
    Integer,
    Int,
    Decimal,
    StringType,
    Varchar,
    Text,
    Boolean,
    Date,
    Timestamp,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Comma,
    Dot,

    // Literals
    String(String),
    /// Raw text of an integer or decimal literal, sign included.
    Number(String),
    Identifier(String),

    // Special
    Eof,
    Error(String),
}

impl TokenKind {
    /// Lowercase spelling of a keyword token, `None` for everything else.
    ///
    /// The parser accepts keyword tokens where a name is expected
    /// (`DELETE ATTRIBUTE order.date`) and takes the name from the lexeme.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Migration => "migration",
            TokenKind::From => "from",
            TokenKind::To => "to",
            TokenKind::Using => "using",
            TokenKind::Relational => "relational",
            TokenKind::Document => "document",
            TokenKind::Columnar => "columnar",
            TokenKind::Graph => "graph",
            TokenKind::Rename => "rename",
            TokenKind::Add => "add",
            TokenKind::Delete => "delete",
            TokenKind::Extract => "extract",
            TokenKind::Copy => "copy",
            TokenKind::Generate => "generate",
            TokenKind::Drop => "drop",
            TokenKind::Nest => "nest",
            TokenKind::Flatten => "flatten",
            TokenKind::Entity => "entity",
            TokenKind::Attribute => "attribute",
            TokenKind::Attributes => "attributes",
            TokenKind::Reference => "reference",
            TokenKind::Primary => "primary",
            TokenKind::Key => "key",
            TokenKind::In => "in",
            TokenKind::Into => "into",
            TokenKind::As => "as",
            TokenKind::With => "with",
            TokenKind::Type => "type",
            TokenKind::Not => "not",
            TokenKind::Null => "null",
            TokenKind::Default => "default",
            TokenKind::Serial => "serial",
            TokenKind::Prefix => "prefix",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Integer => "integer",
            TokenKind::Int => "int",
            TokenKind::Decimal => "decimal",
            TokenKind::StringType => "string",
            TokenKind::Varchar => "varchar",
            TokenKind::Text => "text",
            TokenKind::Boolean => "boolean",
            TokenKind::Date => "date",
            TokenKind::Timestamp => "timestamp",
            _ => return None,
        };
        Some(text)
    }
}

/// Map an identifier to its keyword token, case-insensitively.
pub fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident.to_lowercase().as_str() {
        "migration" => TokenKind::Migration,
        "from" => TokenKind::From,
        "to" => TokenKind::To,
        "using" => TokenKind::Using,

        "relational" => TokenKind::Relational,
        "document" => TokenKind::Document,
        "columnar" => TokenKind::Columnar,
        "graph" => TokenKind::Graph,

        "rename" => TokenKind::Rename,
        "add" => TokenKind::Add,
        "delete" => TokenKind::Delete,
        "extract" => TokenKind::Extract,
        "copy" => TokenKind::Copy,
        "generate" => TokenKind::Generate,
        "drop" => TokenKind::Drop,
        "nest" => TokenKind::Nest,
        "flatten" => TokenKind::Flatten,

        "entity" => TokenKind::Entity,
        "attribute" => TokenKind::Attribute,
        "attributes" => TokenKind::Attributes,
        "reference" => TokenKind::Reference,
        "primary" => TokenKind::Primary,
        "key" => TokenKind::Key,
        "in" => TokenKind::In,
        "into" => TokenKind::Into,
        "as" => TokenKind::As,
        "with" => TokenKind::With,
        "type" => TokenKind::Type,
        "not" => TokenKind::Not,
        "null" => TokenKind::Null,
        "default" => TokenKind::Default,
        "serial" => TokenKind::Serial,
        "prefix" => TokenKind::Prefix,
        "true" => TokenKind::True,
        "false" => TokenKind::False,

        "integer" => TokenKind::Integer,
        "int" => TokenKind::Int,
        "decimal" => TokenKind::Decimal,
        "string" => TokenKind::StringType,
        "varchar" => TokenKind::Varchar,
        "text" => TokenKind::Text,
        "boolean" => TokenKind::Boolean,
        "date" => TokenKind::Date,
        "timestamp" => TokenKind::Timestamp,

        _ => return None,
    };
    Some(kind)
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Source text exactly as written; keywords used as names keep their case.
    pub lexeme: String,
}
