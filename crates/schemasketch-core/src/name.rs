//! Case-insensitive identifiers and table identity
//!
//! SQL object names compare case-insensitively. Rather than scattering
//! custom equality everywhere, the original spelling is kept next to a
//! pre-lowercased fold and all comparison/hashing goes through the fold.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A SQL identifier that remembers how it was written but compares
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct NameKey {
    raw: String,
    folded: String,
}

impl NameKey {
    /// Create a key from the identifier as it appeared in the SQL text.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let folded = raw.to_lowercase();
        Self { raw, folded }
    }

    /// The identifier as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The lowercased comparison key.
    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for NameKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for NameKey {}

impl Hash for NameKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for NameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl std::fmt::Display for NameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for NameKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NameKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl Serialize for NameKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for NameKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Identity of a physical table: `(database?, schema?, table)`.
///
/// Equality and hashing are case-insensitive on all three parts. The
/// identity names the table itself, independent of any alias it was
/// referenced through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdent {
    /// Database part, if the reference was three-part qualified
    pub database: Option<NameKey>,

    /// Schema part, if the reference was qualified
    pub schema: Option<NameKey>,

    /// Table name
    pub name: NameKey,
}

impl TableIdent {
    /// A bare, unqualified table name.
    pub fn new(name: impl Into<NameKey>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified table name.
    pub fn with_schema(schema: impl Into<NameKey>, name: impl Into<NameKey>) -> Self {
        Self {
            database: None,
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// A fully qualified `database.schema.table` name.
    pub fn with_database(
        database: impl Into<NameKey>,
        schema: impl Into<NameKey>,
        name: impl Into<NameKey>,
    ) -> Self {
        Self {
            database: Some(database.into()),
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Ordering key: `(database, schema, table)`, case-insensitive,
    /// unqualified parts first.
    fn sort_key(&self) -> (Option<&str>, Option<&str>, &str) {
        (
            self.database.as_ref().map(NameKey::folded),
            self.schema.as_ref().map(NameKey::folded),
            self.name.folded(),
        )
    }
}

impl PartialOrd for TableIdent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableIdent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl std::fmt::Display for TableIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(db) = &self.database {
            write!(f, "{}.", db)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.name)
    }
}
