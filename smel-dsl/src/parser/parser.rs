//! Parser implementation

use crate::lexer::*;
use serde::{Deserialize, Serialize};
use smel_core::{
    AttributePath, AttributeSpec, CanonicalType, FlattenClause, FlattenPath, Header, KeyStrategy,
    Literal, Migration, Operation, Paradigm, Precision, SmelError,
};

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Parse error with line/column information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for SmelError {
    fn from(err: ParseError) -> Self {
        SmelError::Parse {
            message: err.message,
            line: err.line,
            column: err.column,
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Recursive-descent parser for SMEL scripts.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
}

impl Parser {
    /// Create a new parser from a vector of tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse the tokens into a [`Migration`].
    pub fn parse(&mut self) -> Result<Migration, ParseError> {
        if let Some(token) = self
            .tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
        {
            let message = match &token.kind {
                TokenKind::Error(msg) => format!("Lexer error: {}", msg),
                _ => "Lexer error".to_string(),
            };
            return Err(ParseError {
                message,
                line: token.span.line,
                column: token.span.column,
            });
        }

        let header = self.parse_header()?;

        let mut operations = Vec::new();
        while !self.is_at_end() {
            operations.push(self.parse_operation()?);
            self.optional_semicolon();
        }

        Ok(Migration { header, operations })
    }

    /// `MIGRATION name:version FROM kind TO kind USING schema:version`
    fn parse_header(&mut self) -> Result<Header, ParseError> {
        self.expect(TokenKind::Migration)?;
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let version = self.expect_version()?;

        self.expect(TokenKind::From)?;
        let source = self.parse_paradigm()?;
        self.expect(TokenKind::To)?;
        let target = self.parse_paradigm()?;

        self.expect(TokenKind::Using)?;
        let schema = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let schema_version = self.expect_version()?;
        self.optional_semicolon();

        Ok(Header {
            name,
            version,
            source,
            target,
            schema,
            schema_version,
        })
    }

    fn parse_paradigm(&mut self) -> Result<Paradigm, ParseError> {
        let paradigm = match self.current().kind {
            TokenKind::Relational => Paradigm::Relational,
            TokenKind::Document => Paradigm::Document,
            TokenKind::Columnar => Paradigm::Columnar,
            TokenKind::Graph => Paradigm::Graph,
            _ => {
                return Err(self.error("Expected database type (RELATIONAL, DOCUMENT, COLUMNAR, GRAPH)"))
            }
        };
        self.advance();
        Ok(paradigm)
    }

    /// Parse a single operation.
    fn parse_operation(&mut self) -> Result<Operation, ParseError> {
        match &self.current().kind {
            TokenKind::Rename => self.parse_rename(),
            TokenKind::Add => self.parse_add(),
            TokenKind::Delete => self.parse_delete(),
            TokenKind::Extract => self.parse_extract(),
            TokenKind::Copy => self.parse_copy(),
            TokenKind::Generate => self.parse_generate_key(),
            TokenKind::Drop => self.parse_drop_primary_key(),
            TokenKind::Nest => self.parse_nest(),
            TokenKind::Flatten => self.parse_flatten(),
            _ => Err(self.error(
                "Expected operation (RENAME, ADD, DELETE, EXTRACT, COPY, GENERATE, DROP, NEST, FLATTEN)",
            )),
        }
    }

    /// `RENAME ENTITY old TO new` or `RENAME old TO new IN entity`
    fn parse_rename(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Rename)?;

        if self.check(&TokenKind::Entity) {
            self.advance();
            let from = self.expect_name()?;
            self.expect(TokenKind::To)?;
            let to = self.expect_name()?;
            return Ok(Operation::RenameEntity { from, to });
        }

        let from = self.expect_name()?;
        self.expect(TokenKind::To)?;
        let to = self.expect_name()?;
        self.expect(TokenKind::In)?;
        let entity = self.expect_name()?;
        Ok(Operation::RenameAttribute { entity, from, to })
    }

    /// `ADD ATTRIBUTE | ENTITY | REFERENCE | PRIMARY KEY ...`
    fn parse_add(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Add)?;

        match &self.current().kind {
            TokenKind::Attribute => {
                self.advance();
                let path = self.parse_attribute_path()?;
                self.expect(TokenKind::With)?;
                self.expect(TokenKind::Type)?;
                let data_type = self.parse_type()?;
                let mut attribute = AttributeSpec::new(path.attribute, data_type);
                self.parse_attribute_modifiers(&mut attribute)?;
                Ok(Operation::AddAttribute {
                    entity: path.entity,
                    attribute,
                })
            }
            TokenKind::Entity => {
                self.advance();
                let name = self.expect_name()?;
                self.expect(TokenKind::With)?;
                self.expect(TokenKind::Attributes)?;
                self.expect(TokenKind::LParen)?;
                let mut attributes = Vec::new();
                while !self.check(&TokenKind::RParen) {
                    let attr_name = self.expect_name()?;
                    let data_type = self.parse_type()?;
                    let mut attribute = AttributeSpec::new(attr_name, data_type);
                    self.parse_attribute_modifiers(&mut attribute)?;
                    attributes.push(attribute);
                    if !self.check(&TokenKind::RParen) {
                        self.expect(TokenKind::Comma)?;
                    }
                }
                self.expect(TokenKind::RParen)?;
                if attributes.is_empty() {
                    return Err(self.error("ADD ENTITY needs at least one attribute"));
                }
                Ok(Operation::AddEntity { name, attributes })
            }
            TokenKind::Reference => {
                self.advance();
                let path = self.parse_attribute_path()?;
                self.expect(TokenKind::To)?;
                let target = self.expect_name()?;
                Ok(Operation::AddReference { path, target })
            }
            TokenKind::Primary => {
                self.advance();
                self.expect(TokenKind::Key)?;
                let attributes = self.parse_name_list()?;
                self.expect(TokenKind::To)?;
                let entity = self.expect_name()?;
                Ok(Operation::AddPrimaryKey { entity, attributes })
            }
            _ => Err(self.error("Expected ATTRIBUTE, ENTITY, REFERENCE or PRIMARY KEY after ADD")),
        }
    }

    /// `[NOT NULL] [DEFAULT literal]`
    fn parse_attribute_modifiers(&mut self, attribute: &mut AttributeSpec) -> Result<(), ParseError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            self.expect(TokenKind::Null)?;
            attribute.not_null = true;
        }
        if self.check(&TokenKind::Default) {
            self.advance();
            attribute.default = Some(self.parse_literal()?);
        }
        Ok(())
    }

    /// `DELETE ATTRIBUTE e.a | DELETE ENTITY e | DELETE REFERENCE e.a`
    fn parse_delete(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Delete)?;

        match &self.current().kind {
            TokenKind::Attribute => {
                self.advance();
                Ok(Operation::DeleteAttribute(self.parse_attribute_path()?))
            }
            TokenKind::Entity => {
                self.advance();
                let name = self.expect_name()?;
                Ok(Operation::DeleteEntity { name })
            }
            TokenKind::Reference => {
                self.advance();
                Ok(Operation::DeleteReference(self.parse_attribute_path()?))
            }
            _ => Err(self.error("Expected ATTRIBUTE, ENTITY or REFERENCE after DELETE")),
        }
    }

    /// `EXTRACT (a, b) FROM entity INTO new`
    fn parse_extract(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Extract)?;
        let attributes = self.parse_name_list()?;
        self.expect(TokenKind::From)?;
        let entity = self.expect_name()?;
        self.expect(TokenKind::Into)?;
        let into = self.expect_name()?;
        Ok(Operation::Extract {
            entity,
            attributes,
            into,
        })
    }

    /// `COPY source.attr TO target.attr`
    fn parse_copy(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Copy)?;
        let source = self.parse_attribute_path()?;
        self.expect(TokenKind::To)?;
        let target = self.parse_attribute_path()?;
        Ok(Operation::Copy { source, target })
    }

    /// `GENERATE KEY entity.name AS strategy`
    fn parse_generate_key(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Generate)?;
        self.expect(TokenKind::Key)?;
        let path = self.parse_attribute_path()?;
        self.expect(TokenKind::As)?;
        let strategy = self.parse_key_strategy()?;
        Ok(Operation::GenerateKey { path, strategy })
    }

    /// `SERIAL` or `STRING PREFIX "p"`
    fn parse_key_strategy(&mut self) -> Result<KeyStrategy, ParseError> {
        match &self.current().kind {
            TokenKind::Serial => {
                self.advance();
                Ok(KeyStrategy::Serial)
            }
            TokenKind::StringType => {
                self.advance();
                self.expect(TokenKind::Prefix)?;
                let prefix = self.expect_string()?;
                Ok(KeyStrategy::Prefixed(prefix))
            }
            _ => Err(self.error("Expected key strategy (SERIAL or STRING PREFIX)")),
        }
    }

    /// `DROP PRIMARY KEY (cols) FROM entity`
    fn parse_drop_primary_key(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Drop)?;
        self.expect(TokenKind::Primary)?;
        self.expect(TokenKind::Key)?;
        let attributes = self.parse_name_list()?;
        self.expect(TokenKind::From)?;
        let entity = self.expect_name()?;
        Ok(Operation::DropPrimaryKey { entity, attributes })
    }

    /// `NEST source INTO target AS alias`
    fn parse_nest(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Nest)?;
        let source = self.expect_name()?;
        self.expect(TokenKind::Into)?;
        let target = self.expect_name()?;
        self.expect(TokenKind::As)?;
        let alias = self.expect_name()?;
        Ok(Operation::Nest {
            source,
            target,
            alias,
        })
    }

    /// `FLATTEN entity.agg[.agg]*[[]] AS new clause*`
    fn parse_flatten(&mut self) -> Result<Operation, ParseError> {
        self.expect(TokenKind::Flatten)?;

        let entity = self.expect_name()?;
        let mut segments = Vec::new();
        while self.check(&TokenKind::Dot) {
            self.advance();
            segments.push(self.expect_name()?);
        }
        if segments.is_empty() {
            return Err(self.error("FLATTEN path must name a nested field (entity.field)"));
        }
        let array = if self.check(&TokenKind::LBracket) {
            self.advance();
            self.expect(TokenKind::RBracket)?;
            true
        } else {
            false
        };

        self.expect(TokenKind::As)?;
        let into = self.expect_name()?;

        let mut clauses = Vec::new();
        while self.at_flatten_clause() {
            clauses.push(self.parse_flatten_clause()?);
        }

        Ok(Operation::Flatten {
            path: FlattenPath {
                entity,
                segments,
                array,
            },
            into,
            clauses,
        })
    }

    /// Whether the upcoming tokens form a FLATTEN clause rather than the next
    /// statement.
    ///
    /// Clauses use unqualified names: `GENERATE KEY id AS ...` is a clause,
    /// `GENERATE KEY person.id AS ...` a statement; `RENAME a TO b` is a
    /// clause, `RENAME a TO b IN e` a statement.
    fn at_flatten_clause(&self) -> bool {
        match self.current().kind {
            TokenKind::Generate => {
                self.peek_is(1, &TokenKind::Key) && !self.peek_is(3, &TokenKind::Dot)
            }
            TokenKind::Add => {
                self.peek_is(1, &TokenKind::Reference) && !self.peek_is(3, &TokenKind::Dot)
            }
            TokenKind::Rename => {
                !self.peek_is(1, &TokenKind::Entity) && !self.peek_is(4, &TokenKind::In)
            }
            _ => false,
        }
    }

    fn parse_flatten_clause(&mut self) -> Result<FlattenClause, ParseError> {
        match &self.current().kind {
            TokenKind::Generate => {
                self.advance();
                self.expect(TokenKind::Key)?;
                let attribute = self.expect_name()?;
                self.expect(TokenKind::As)?;
                let strategy = self.parse_key_strategy()?;
                Ok(FlattenClause::GenerateKey {
                    attribute,
                    strategy,
                })
            }
            TokenKind::Add => {
                self.advance();
                self.expect(TokenKind::Reference)?;
                let attribute = self.expect_name()?;
                self.expect(TokenKind::To)?;
                let target = self.expect_name()?;
                Ok(FlattenClause::AddReference { attribute, target })
            }
            TokenKind::Rename => {
                self.advance();
                let from = self.expect_name()?;
                self.expect(TokenKind::To)?;
                let to = self.expect_name()?;
                Ok(FlattenClause::Rename { from, to })
            }
            _ => Err(self.error("Expected FLATTEN clause (GENERATE KEY, ADD REFERENCE, RENAME)")),
        }
    }

    // ========================================================================
    // Types and literals
    // ========================================================================

    /// Parse a canonical type name with optional parameters.
    fn parse_type(&mut self) -> Result<CanonicalType, ParseError> {
        let data_type = match &self.current().kind {
            TokenKind::Integer | TokenKind::Int => {
                self.advance();
                CanonicalType::Integer
            }
            TokenKind::Decimal => {
                self.advance();
                let params = self.parse_type_params()?;
                match params.as_slice() {
                    [] => CanonicalType::Decimal(None),
                    [precision] => CanonicalType::Decimal(Some(Precision {
                        precision: *precision,
                        scale: 0,
                    })),
                    [precision, scale] if scale <= precision => {
                        CanonicalType::Decimal(Some(Precision {
                            precision: *precision,
                            scale: *scale,
                        }))
                    }
                    _ => return Err(self.error("DECIMAL takes (precision) or (precision, scale) with scale <= precision")),
                }
            }
            TokenKind::StringType | TokenKind::Varchar => {
                self.advance();
                let params = self.parse_type_params()?;
                match params.as_slice() {
                    [] => CanonicalType::String(None),
                    [len] if *len > 0 => CanonicalType::String(Some(*len)),
                    _ => return Err(self.error("STRING takes a single positive length")),
                }
            }
            TokenKind::Text => {
                self.advance();
                CanonicalType::Text
            }
            TokenKind::Boolean => {
                self.advance();
                CanonicalType::Boolean
            }
            TokenKind::Date => {
                self.advance();
                CanonicalType::Date
            }
            TokenKind::Timestamp => {
                self.advance();
                CanonicalType::Timestamp
            }
            TokenKind::Reference => {
                self.advance();
                CanonicalType::Reference
            }
            _ => return Err(self.error("Expected type")),
        };
        Ok(data_type)
    }

    /// Optional `(n[, m])` after a type name.
    fn parse_type_params(&mut self) -> Result<Vec<u32>, ParseError> {
        let mut params = Vec::new();
        if !self.check(&TokenKind::LParen) {
            return Ok(params);
        }
        self.advance();
        loop {
            let value = match &self.current().kind {
                TokenKind::Number(text) => text
                    .parse::<u32>()
                    .map_err(|_| self.error(&format!("Invalid type parameter: {}", text)))?,
                _ => return Err(self.error("Expected type parameter")),
            };
            self.advance();
            params.push(value);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let literal = match &self.current().kind {
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Number(text) if text.contains('.') => {
                if text.matches('.').count() > 1 {
                    return Err(self.error(&format!("Invalid number: {}", text)));
                }
                Literal::Decimal(text.clone())
            }
            TokenKind::Number(text) => Literal::Integer(
                text.parse::<i64>()
                    .map_err(|_| self.error(&format!("Integer out of range: {}", text)))?,
            ),
            TokenKind::True => Literal::Boolean(true),
            TokenKind::False => Literal::Boolean(false),
            TokenKind::Null => Literal::Null,
            _ => return Err(self.error("Expected literal")),
        };
        self.advance();
        Ok(literal)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// `entity.attribute`
    fn parse_attribute_path(&mut self) -> Result<AttributePath, ParseError> {
        let entity = self.expect_name()?;
        self.expect(TokenKind::Dot)?;
        let attribute = self.expect_name()?;
        Ok(AttributePath { entity, attribute })
    }

    /// `(a, b, c)`, never empty.
    fn parse_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut names = vec![self.expect_name()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.expect_name()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(names)
    }

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    /// Whether the token `offset` positions ahead has the same kind as `kind`.
    pub(crate) fn peek_is(&self, offset: usize, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.pos + offset)
            .map(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("Expected {:?}", kind)))
        }
    }

    /// Expect an identifier, or a keyword used as a name (`Date`, `key`).
    /// Names are case-sensitive, so a keyword keeps the spelling it was written with.
    pub(crate) fn expect_name(&mut self) -> Result<String, ParseError> {
        let token = self.current();
        let name = match &token.kind {
            TokenKind::Identifier(s) => s.clone(),
            kind if kind.keyword_text().is_some() => token.lexeme.clone(),
            _ => return Err(self.error("Expected identifier")),
        };
        self.advance();
        Ok(name)
    }

    /// A version is a number (`1`, `1.0`, `2.1.3`) or an identifier (`v2`).
    pub(crate) fn expect_version(&mut self) -> Result<String, ParseError> {
        let version = match &self.current().kind {
            TokenKind::Number(text) => text.clone(),
            TokenKind::Identifier(s) => s.clone(),
            _ => return Err(self.error("Expected version")),
        };
        self.advance();
        Ok(version)
    }

    pub(crate) fn expect_string(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("Expected string")),
        }
    }

    pub(crate) fn optional_semicolon(&mut self) {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    pub(crate) fn error(&self, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

// ============================================================================
// CONVENIENCE FUNCTIONS
// ============================================================================

/// Parse a SMEL script into a [`Migration`].
pub fn parse(source: &str) -> Result<Migration, ParseError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse()
}

/// Parse and pretty-print a script (for round-trip testing).
pub fn round_trip(source: &str) -> Result<String, ParseError> {
    let migration = parse(source)?;
    Ok(crate::pretty_printer::pretty_print(&migration))
}

// ============================================================================
// TESTS
// ============================================================================
