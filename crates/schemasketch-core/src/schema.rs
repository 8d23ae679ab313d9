//! Inferred column kinds and synthesized schema descriptors

use crate::name::{NameKey, TableIdent};
use serde::{Deserialize, Serialize};

/// Coarse inferred data type of a column.
///
/// `Integer` is the default every column starts from; it yields to any
/// specific kind when evidence arrives, and two conflicting specific kinds
/// collapse to `Text` (the safe-but-imprecise choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Default kind when no evidence exists
    Integer,

    /// Character data
    Text,

    /// Boolean / bit
    Boolean,

    /// Exact numeric with fraction
    Decimal,

    /// Date and time without offset
    DateTime,

    /// Date and time with offset
    DateTimeOffset,

    /// Globally unique identifier
    Guid,

    /// Raw bytes
    ByteArray,
}

impl ColumnKind {
    /// Whether this is the evidence-free default.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Integer)
    }

    /// Concrete column type for this kind. `length` only applies to `Text`.
    pub fn to_column_type(self, length: Option<u32>) -> ColumnType {
        match self {
            Self::Integer => ColumnType::Int32,
            Self::Text => ColumnType::String { length },
            Self::Boolean => ColumnType::Bool,
            Self::Decimal => ColumnType::Decimal,
            Self::DateTime => ColumnType::DateTime,
            Self::DateTimeOffset => ColumnType::DateTimeOffset,
            Self::Guid => ColumnType::Guid,
            Self::ByteArray => ColumnType::Binary,
        }
    }

    /// The kind a concrete column type carries as evidence.
    pub fn of_type(ty: &ColumnType) -> Self {
        match ty {
            ColumnType::Int32 => Self::Integer,
            ColumnType::String { .. } => Self::Text,
            ColumnType::Bool => Self::Boolean,
            ColumnType::Decimal => Self::Decimal,
            ColumnType::DateTime => Self::DateTime,
            ColumnType::DateTimeOffset => Self::DateTimeOffset,
            ColumnType::Guid => Self::Guid,
            ColumnType::Binary => Self::ByteArray,
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::DateTimeOffset => "datetimeoffset",
            Self::Guid => "guid",
            Self::ByteArray => "bytearray",
        };
        write!(f, "{name}")
    }
}

/// Concrete column type in a synthesized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// 32-bit integer
    Int32,

    /// Character data with an optional inferred length
    String { length: Option<u32> },

    /// Boolean / bit
    Bool,

    /// Exact numeric
    Decimal,

    /// Date and time without offset
    DateTime,

    /// Date and time with offset
    DateTimeOffset,

    /// Globally unique identifier
    Guid,

    /// Raw bytes
    Binary,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int32 => write!(f, "INT"),
            Self::String { length: Some(n) } => write!(f, "VARCHAR({n})"),
            Self::String { length: None } => write!(f, "VARCHAR"),
            Self::Bool => write!(f, "BIT"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::DateTime => write!(f, "DATETIME"),
            Self::DateTimeOffset => write!(f, "DATETIMEOFFSET"),
            Self::Guid => write!(f, "UNIQUEIDENTIFIER"),
            Self::Binary => write!(f, "VARBINARY"),
        }
    }
}

/// A synthesized column: name, concrete type, nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSketch {
    /// Column name as first written in the statement
    pub name: NameKey,

    /// Concrete inferred type
    pub column_type: ColumnType,

    /// Whether usage showed the column can hold NULL
    pub nullable: bool,
}

/// A synthesized table: identity plus columns in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSketch {
    /// Physical table identity
    pub table: TableIdent,

    /// Columns in the order the statement first touched them
    pub columns: Vec<ColumnSketch>,
}

impl TableSketch {
    /// Find a column by (case-insensitive) name.
    pub fn column(&self, name: &str) -> Option<&ColumnSketch> {
        let key = NameKey::new(name);
        self.columns.iter().find(|c| c.name == key)
    }
}
