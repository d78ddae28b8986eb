//! Canonical types and per-paradigm type mapping tables

use crate::error::SchemaError;
use crate::Paradigm;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length used when an unconstrained string has to become a bounded column.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Width of a document object identifier rendered as text (12 bytes, hex).
pub const OBJECT_ID_LENGTH: u32 = 24;

// ============================================================================
// CANONICAL TYPES
// ============================================================================

/// Precision and scale of a fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision {
    pub precision: u32,
    pub scale: u32,
}

/// Paradigm-independent attribute type; the pivot for every type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalType {
    Integer,
    Decimal(Option<Precision>),
    /// Bounded or unbounded character string.
    String(Option<u32>),
    /// Long-form text with no length semantics.
    Text,
    Boolean,
    Date,
    Timestamp,
    /// Opaque identifier of another record (object id, uuid key).
    Reference,
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Integer => f.write_str("INTEGER"),
            CanonicalType::Decimal(None) => f.write_str("DECIMAL"),
            CanonicalType::Decimal(Some(p)) => write!(f, "DECIMAL({},{})", p.precision, p.scale),
            CanonicalType::String(None) => f.write_str("STRING"),
            CanonicalType::String(Some(len)) => write!(f, "STRING({})", len),
            CanonicalType::Text => f.write_str("TEXT"),
            CanonicalType::Boolean => f.write_str("BOOLEAN"),
            CanonicalType::Date => f.write_str("DATE"),
            CanonicalType::Timestamp => f.write_str("TIMESTAMP"),
            CanonicalType::Reference => f.write_str("REFERENCE"),
        }
    }
}

// ============================================================================
// NATIVE TYPES
// ============================================================================

/// A paradigm-specific type as it appears in a native artifact.
///
/// `VARCHAR(40)` is `{ name: "VARCHAR", params: [40] }`; a document string with
/// `maxLength: 40` is `{ name: "string", params: [40] }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeType {
    pub name: String,
    pub params: Vec<u32>,
}

impl NativeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Parse `NAME`, `NAME(n)` or `NAME(p, s)`; inner whitespace in the name
    /// is collapsed (`DOUBLE   PRECISION` becomes `DOUBLE PRECISION`).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (name, params) = match text.find('(') {
            Some(open) => {
                let close = text.rfind(')')?;
                if close < open || !text[close + 1..].trim().is_empty() {
                    return None;
                }
                let params = text[open + 1..close]
                    .split(',')
                    .map(|p| p.trim().parse::<u32>().ok())
                    .collect::<Option<Vec<_>>>()?;
                (&text[..open], params)
            }
            None => (text, Vec::new()),
        };
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return None;
        }
        Some(Self { name, params })
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", params.join(","))?;
        }
        Ok(())
    }
}

// ============================================================================
// MAPPING TABLES
// ============================================================================

/// Map a native type of `paradigm` to its canonical type.
///
/// Fails with `UnsupportedType` for natives with no canonical counterpart.
/// Natives outside [`round_trip_natives`] are accepted but narrowed, and
/// export writes the canonical type's own native instead:
///
/// | Paradigm | Accepted | Exported as |
/// |---|---|---|
/// | Relational | `INT`, `INT4`, `SMALLINT`, `BIGINT`, `SERIAL`, `BIGSERIAL`, ... | `INTEGER` |
/// | Relational | `NUMERIC(p,s)` | `DECIMAL(p,s)` |
/// | Relational | bare `VARCHAR`, `CHARACTER VARYING` | `VARCHAR(255)` |
/// | Relational | `CHAR(n)`, `CHARACTER(n)` (fixed width, blank padded) | `VARCHAR(n)` |
/// | Relational | `TIMESTAMPTZ`, `TIMESTAMP WITH TIME ZONE` | `TIMESTAMP` |
/// | Document | `long` | `int` |
/// | Columnar | `bigint`, `smallint`, `tinyint` | `int` |
/// | Columnar | `timeuuid` | `uuid` |
/// | Graph | `Long` | `Integer` |
/// | Graph | `LocalDateTime` | `DateTime` |
///
/// Collection kinds narrow the same way outside this table: CQL `set<...>`
/// imports as an array aggregation and exports as `list<...>`.
pub fn canonical_of(paradigm: Paradigm, native: &NativeType) -> Result<CanonicalType, SchemaError> {
    let name = native.name.to_ascii_lowercase();
    let params = native.params.as_slice();
    let mapped = match paradigm {
        Paradigm::Relational => relational_canonical(&name, params),
        Paradigm::Document => document_canonical(&name, params),
        Paradigm::Columnar => columnar_canonical(&name, params),
        Paradigm::Graph => graph_canonical(&name, params),
    };
    mapped.ok_or_else(|| SchemaError::UnsupportedType {
        paradigm,
        native_type: native.to_string(),
    })
}

/// Map a canonical type to the native type `paradigm` uses for it.
pub fn native_of(paradigm: Paradigm, canonical: CanonicalType) -> NativeType {
    match paradigm {
        Paradigm::Relational => relational_native(canonical),
        Paradigm::Document => document_native(canonical),
        Paradigm::Columnar => columnar_native(canonical),
        Paradigm::Graph => graph_native(canonical),
    }
}

fn decimal_from_params(params: &[u32]) -> Option<CanonicalType> {
    match params {
        [] => Some(CanonicalType::Decimal(None)),
        [precision] => Some(CanonicalType::Decimal(Some(Precision {
            precision: *precision,
            scale: 0,
        }))),
        [precision, scale] if scale <= precision => Some(CanonicalType::Decimal(Some(Precision {
            precision: *precision,
            scale: *scale,
        }))),
        _ => None,
    }
}

fn string_from_params(params: &[u32]) -> Option<CanonicalType> {
    match params {
        [] => Some(CanonicalType::String(None)),
        [len] if *len > 0 => Some(CanonicalType::String(Some(*len))),
        _ => None,
    }
}

fn relational_canonical(name: &str, params: &[u32]) -> Option<CanonicalType> {
    match name {
        "decimal" | "numeric" => decimal_from_params(params),
        "varchar" | "character varying" => string_from_params(params),
        "char" | "character" if params.len() == 1 => string_from_params(params),
        _ if !params.is_empty() => None,
        "integer" | "int" | "int4" | "smallint" | "int2" | "bigint" | "int8" | "serial"
        | "serial4" | "bigserial" | "serial8" | "smallserial" => Some(CanonicalType::Integer),
        "text" => Some(CanonicalType::Text),
        "boolean" | "bool" => Some(CanonicalType::Boolean),
        "date" => Some(CanonicalType::Date),
        "timestamp" | "timestamptz" | "timestamp without time zone"
        | "timestamp with time zone" => Some(CanonicalType::Timestamp),
        _ => None,
    }
}

fn relational_native(canonical: CanonicalType) -> NativeType {
    match canonical {
        CanonicalType::Integer => NativeType::new("INTEGER"),
        CanonicalType::Decimal(None) => NativeType::new("DECIMAL"),
        CanonicalType::Decimal(Some(p)) => {
            NativeType::with_params("DECIMAL", vec![p.precision, p.scale])
        }
        CanonicalType::String(len) => {
            NativeType::with_params("VARCHAR", vec![len.unwrap_or(DEFAULT_STRING_LENGTH)])
        }
        CanonicalType::Text => NativeType::new("TEXT"),
        CanonicalType::Boolean => NativeType::new("BOOLEAN"),
        CanonicalType::Date => NativeType::new("DATE"),
        CanonicalType::Timestamp => NativeType::new("TIMESTAMP"),
        CanonicalType::Reference => NativeType::with_params("VARCHAR", vec![OBJECT_ID_LENGTH]),
    }
}

fn document_canonical(name: &str, params: &[u32]) -> Option<CanonicalType> {
    match name {
        "string" => string_from_params(params),
        _ if !params.is_empty() => None,
        "int" | "long" => Some(CanonicalType::Integer),
        "decimal" => Some(CanonicalType::Decimal(None)),
        "bool" => Some(CanonicalType::Boolean),
        "date" => Some(CanonicalType::Date),
        "timestamp" => Some(CanonicalType::Timestamp),
        "objectid" => Some(CanonicalType::Reference),
        _ => None,
    }
}

fn document_native(canonical: CanonicalType) -> NativeType {
    match canonical {
        CanonicalType::Integer => NativeType::new("int"),
        CanonicalType::Decimal(_) => NativeType::new("decimal"),
        CanonicalType::String(Some(len)) => NativeType::with_params("string", vec![len]),
        CanonicalType::String(None) | CanonicalType::Text => NativeType::new("string"),
        CanonicalType::Boolean => NativeType::new("bool"),
        CanonicalType::Date => NativeType::new("date"),
        CanonicalType::Timestamp => NativeType::new("timestamp"),
        CanonicalType::Reference => NativeType::new("objectId"),
    }
}

fn columnar_canonical(name: &str, params: &[u32]) -> Option<CanonicalType> {
    if !params.is_empty() {
        return None;
    }
    match name {
        "int" | "bigint" | "smallint" | "tinyint" => Some(CanonicalType::Integer),
        "decimal" => Some(CanonicalType::Decimal(None)),
        "varchar" => Some(CanonicalType::String(None)),
        "text" => Some(CanonicalType::Text),
        "boolean" => Some(CanonicalType::Boolean),
        "date" => Some(CanonicalType::Date),
        "timestamp" => Some(CanonicalType::Timestamp),
        "uuid" | "timeuuid" => Some(CanonicalType::Reference),
        _ => None,
    }
}

fn columnar_native(canonical: CanonicalType) -> NativeType {
    match canonical {
        CanonicalType::Integer => NativeType::new("int"),
        CanonicalType::Decimal(_) => NativeType::new("decimal"),
        CanonicalType::String(_) => NativeType::new("varchar"),
        CanonicalType::Text => NativeType::new("text"),
        CanonicalType::Boolean => NativeType::new("boolean"),
        CanonicalType::Date => NativeType::new("date"),
        CanonicalType::Timestamp => NativeType::new("timestamp"),
        CanonicalType::Reference => NativeType::new("uuid"),
    }
}

fn graph_canonical(name: &str, params: &[u32]) -> Option<CanonicalType> {
    if !params.is_empty() {
        return None;
    }
    match name {
        "integer" | "long" => Some(CanonicalType::Integer),
        "float" => Some(CanonicalType::Decimal(None)),
        "string" => Some(CanonicalType::String(None)),
        "boolean" => Some(CanonicalType::Boolean),
        "date" => Some(CanonicalType::Date),
        "datetime" | "localdatetime" => Some(CanonicalType::Timestamp),
        _ => None,
    }
}

fn graph_native(canonical: CanonicalType) -> NativeType {
    match canonical {
        CanonicalType::Integer => NativeType::new("Integer"),
        CanonicalType::Decimal(_) => NativeType::new("Float"),
        CanonicalType::String(_) | CanonicalType::Text | CanonicalType::Reference => {
            NativeType::new("String")
        }
        CanonicalType::Boolean => NativeType::new("Boolean"),
        CanonicalType::Date => NativeType::new("Date"),
        CanonicalType::Timestamp => NativeType::new("DateTime"),
    }
}

/// Native types of `paradigm` that survive `native_of(canonical_of(t)) == t`.
///
/// Everything else `canonical_of` accepts is a documented lossy narrowing.
pub fn round_trip_natives(paradigm: Paradigm) -> Vec<NativeType> {
    match paradigm {
        Paradigm::Relational => vec![
            NativeType::new("INTEGER"),
            NativeType::new("DECIMAL"),
            NativeType::with_params("DECIMAL", vec![13, 2]),
            NativeType::with_params("VARCHAR", vec![40]),
            NativeType::with_params("VARCHAR", vec![DEFAULT_STRING_LENGTH]),
            NativeType::new("TEXT"),
            NativeType::new("BOOLEAN"),
            NativeType::new("DATE"),
            NativeType::new("TIMESTAMP"),
        ],
        Paradigm::Document => vec![
            NativeType::new("int"),
            NativeType::new("decimal"),
            NativeType::new("string"),
            NativeType::with_params("string", vec![80]),
            NativeType::new("bool"),
            NativeType::new("date"),
            NativeType::new("timestamp"),
            NativeType::new("objectId"),
        ],
        Paradigm::Columnar => vec![
            NativeType::new("int"),
            NativeType::new("decimal"),
            NativeType::new("varchar"),
            NativeType::new("text"),
            NativeType::new("boolean"),
            NativeType::new("date"),
            NativeType::new("timestamp"),
            NativeType::new("uuid"),
        ],
        Paradigm::Graph => vec![
            NativeType::new("Integer"),
            NativeType::new("Float"),
            NativeType::new("String"),
            NativeType::new("Boolean"),
            NativeType::new("Date"),
            NativeType::new("DateTime"),
        ],
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_native_type_parse() {
        assert_eq!(
            NativeType::parse("VARCHAR(40)"),
            Some(NativeType::with_params("VARCHAR", vec![40]))
        );
        assert_eq!(
            NativeType::parse(" DECIMAL ( 10 , 2 ) "),
            Some(NativeType::with_params("DECIMAL", vec![10, 2]))
        );
        assert_eq!(
            NativeType::parse("double   precision"),
            Some(NativeType::new("double precision"))
        );
        assert_eq!(NativeType::parse("VARCHAR(abc)"), None);
        assert_eq!(NativeType::parse("VARCHAR(10"), None);
        assert_eq!(NativeType::parse(""), None);
    }

    #[test]
    fn test_round_trip_for_every_paradigm() {
        for paradigm in Paradigm::ALL {
            for native in round_trip_natives(paradigm) {
                let canonical = canonical_of(paradigm, &native)
                    .unwrap_or_else(|e| panic!("{} should map: {}", native, e));
                assert_eq!(native_of(paradigm, canonical), native, "{:?}", paradigm);
            }
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let canonical = canonical_of(Paradigm::Relational, &NativeType::new("integer")).unwrap();
        assert_eq!(canonical, CanonicalType::Integer);
        let canonical = canonical_of(Paradigm::Document, &NativeType::new("OBJECTID")).unwrap();
        assert_eq!(canonical, CanonicalType::Reference);
    }

    #[test]
    fn test_lossy_narrowings_are_accepted() {
        let bigint = canonical_of(Paradigm::Relational, &NativeType::new("BIGINT")).unwrap();
        assert_eq!(native_of(Paradigm::Relational, bigint), NativeType::new("INTEGER"));

        let bare = canonical_of(Paradigm::Relational, &NativeType::new("VARCHAR")).unwrap();
        assert_eq!(
            native_of(Paradigm::Relational, bare),
            NativeType::with_params("VARCHAR", vec![DEFAULT_STRING_LENGTH])
        );

        let long = canonical_of(Paradigm::Document, &NativeType::new("long")).unwrap();
        assert_eq!(native_of(Paradigm::Document, long), NativeType::new("int"));

        let fixed = canonical_of(Paradigm::Relational, &NativeType::with_params("CHAR", vec![2])).unwrap();
        assert_eq!(fixed, CanonicalType::String(Some(2)));
        assert_eq!(native_of(Paradigm::Relational, fixed), NativeType::with_params("VARCHAR", vec![2]));
        assert!(!round_trip_natives(Paradigm::Relational).contains(&NativeType::with_params("CHAR", vec![2])));
    }

    #[test]
    fn test_unmapped_natives_are_rejected() {
        for (paradigm, native) in [
            (Paradigm::Relational, "JSONB"),
            (Paradigm::Relational, "DOUBLE PRECISION"),
            (Paradigm::Document, "double"),
            (Paradigm::Columnar, "blob"),
            (Paradigm::Graph, "Point"),
        ] {
            let err = canonical_of(paradigm, &NativeType::new(native)).unwrap_err();
            assert!(matches!(err, SchemaError::UnsupportedType { .. }), "{}", native);
        }
    }

    #[test]
    fn test_params_on_parameterless_types_are_rejected() {
        let err = canonical_of(Paradigm::Relational, &NativeType::with_params("INTEGER", vec![4]));
        assert!(err.is_err());
        let err = canonical_of(
            Paradigm::Relational,
            &NativeType::with_params("DECIMAL", vec![2, 5]),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_reference_maps_to_identifier_types() {
        assert_eq!(
            native_of(Paradigm::Relational, CanonicalType::Reference).to_string(),
            "VARCHAR(24)"
        );
        assert_eq!(
            native_of(Paradigm::Document, CanonicalType::Reference).to_string(),
            "objectId"
        );
        assert_eq!(
            native_of(Paradigm::Columnar, CanonicalType::Reference).to_string(),
            "uuid"
        );
    }

    #[test]
    fn test_canonical_display() {
        let decimal = CanonicalType::Decimal(Some(Precision {
            precision: 10,
            scale: 2,
        }));
        assert_eq!(decimal.to_string(), "DECIMAL(10,2)");
        assert_eq!(CanonicalType::String(Some(40)).to_string(), "STRING(40)");
        assert_eq!(CanonicalType::Reference.to_string(), "REFERENCE");
    }

    fn arb_canonical() -> impl Strategy<Value = CanonicalType> {
        prop_oneof![
            Just(CanonicalType::Integer),
            Just(CanonicalType::Decimal(None)),
            (1u32..38)
                .prop_flat_map(|p| (Just(p), 0..=p))
                .prop_map(|(precision, scale)| CanonicalType::Decimal(Some(Precision { precision, scale }))),
            Just(CanonicalType::String(None)),
            (1u32..4000).prop_map(|n| CanonicalType::String(Some(n))),
            Just(CanonicalType::Text),
            Just(CanonicalType::Boolean),
            Just(CanonicalType::Date),
            Just(CanonicalType::Timestamp),
            Just(CanonicalType::Reference),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_exported_native_is_a_fixed_point(canonical in arb_canonical()) {
            for paradigm in Paradigm::ALL {
                let native = native_of(paradigm, canonical);
                let reimported = canonical_of(paradigm, &native);
                prop_assert!(reimported.is_ok(), "{:?} {} does not map back", paradigm, native);
                prop_assert_eq!(native_of(paradigm, reimported.unwrap()), native);
            }
        }

        #[test]
        fn prop_types_survive_json(canonical in arb_canonical()) {
            let json = serde_json::to_string(&canonical).unwrap();
            prop_assert_eq!(serde_json::from_str::<CanonicalType>(&json).unwrap(), canonical);

            let native = native_of(Paradigm::Relational, canonical);
            let json = serde_json::to_string(&native).unwrap();
            prop_assert_eq!(serde_json::from_str::<NativeType>(&json).unwrap(), native);
        }
    }
}
