//! Usage-driven column type inference
//!
//! Every column reference against a physical table lands in the inference
//! table, keyed by table identity. Kind evidence accumulates through the
//! hint rules in the builders; conflicting evidence merges
//! deterministically: the default Integer yields to anything specific, and
//! two different specific kinds collapse to Text. Nullability only ever
//! moves from false to true, and column insertion order is stable; it
//! becomes the synthesized column order.

use indexmap::IndexMap;
use schemasketch_core::{ColumnKind, ColumnType, NameKey, TableIdent};
use std::collections::HashMap;
use tracing::trace;

/// Accumulated evidence for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredColumn {
    /// Current kind; starts from the naming heuristic
    pub kind: ColumnKind,

    /// Whether usage showed the column can hold NULL
    pub nullable: bool,

    /// Inferred text length; only meaningful while `kind` is Text
    pub length: Option<u32>,
}

/// Per-call inference state: table identity → column map in first-seen
/// order.
#[derive(Debug, Default)]
pub struct InferenceTable {
    tables: HashMap<TableIdent, IndexMap<NameKey, InferredColumn>>,
}

impl InferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a column was referenced, with no kind evidence. First
    /// contact applies the naming heuristic, once.
    pub fn touch(&mut self, table: &TableIdent, column: &NameKey) {
        self.entry(table, column);
    }

    /// Record kind evidence for a column. `length` only matters for Text.
    pub fn hint(
        &mut self,
        table: &TableIdent,
        column: &NameKey,
        kind: ColumnKind,
        length: Option<u32>,
    ) {
        trace!(table = %table, column = %column, ?kind, "inference hint");
        let entry = self.entry(table, column);
        merge_kind(entry, kind, length);
    }

    /// Record that a column was observed against NULL.
    pub fn mark_nullable(&mut self, table: &TableIdent, column: &NameKey) {
        self.entry(table, column).nullable = true;
    }

    /// Kind evidence for a column, if it has any beyond the default.
    pub fn kind_evidence(
        &self,
        table: &TableIdent,
        column: &NameKey,
    ) -> Option<(ColumnKind, Option<u32>)> {
        let entry = self.tables.get(table)?.get(column)?;
        if entry.kind.is_default() {
            None
        } else {
            Some((entry.kind, entry.length))
        }
    }

    /// Concrete type snapshot for an emitted column reference.
    pub fn column_type(&self, table: &TableIdent, column: &NameKey) -> Option<ColumnType> {
        let entry = self.tables.get(table)?.get(column)?;
        Some(entry.kind.to_column_type(entry.length))
    }

    /// Iterate tables and their columns in first-seen column order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&TableIdent, &IndexMap<NameKey, InferredColumn>)> {
        self.tables.iter()
    }

    /// Whether nothing was inferred.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn entry(&mut self, table: &TableIdent, column: &NameKey) -> &mut InferredColumn {
        self.tables
            .entry(table.clone())
            .or_default()
            .entry(column.clone())
            .or_insert_with(|| {
                let (kind, length) = heuristic_kind(column.as_str());
                InferredColumn {
                    kind,
                    nullable: false,
                    length,
                }
            })
    }
}

/// Apply one piece of kind evidence to an existing column.
fn merge_kind(entry: &mut InferredColumn, kind: ColumnKind, length: Option<u32>) {
    if kind == entry.kind {
        if entry.kind == ColumnKind::Text {
            entry.length = max_length(entry.length, length);
        }
        return;
    }
    if kind.is_default() {
        // A weak Integer hint never displaces anything.
        return;
    }
    if entry.kind.is_default() {
        entry.kind = kind;
        entry.length = if kind == ColumnKind::Text { length } else { None };
        return;
    }
    // Two different specific kinds: collapse to Text, keeping whatever
    // length either side carried.
    entry.length = max_length(entry.length, length);
    entry.kind = ColumnKind::Text;
}

fn max_length(prior: Option<u32>, incoming: Option<u32>) -> Option<u32> {
    match (prior, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Naming fallback applied once when a column is first seen with no
/// evidence. Rule order matters: DESCRIPTION must hit the text rule before
/// the trailing-ON date rule sees it.
fn heuristic_kind(name: &str) -> (ColumnKind, Option<u32>) {
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    let n = normalized.as_str();

    if n.starts_with("IS") || n.starts_with("HAS") || n.starts_with("CAN") || n.ends_with("FLAG") {
        return (ColumnKind::Boolean, None);
    }
    if ["NAME", "DESCRIPTION", "TITLE", "COMMENT", "NOTE", "TEXT"]
        .iter()
        .any(|suffix| n.ends_with(suffix))
    {
        return (ColumnKind::Text, Some(255));
    }
    if ["DATE", "TIME", "AT", "ON"].iter().any(|s| n.ends_with(s))
        || n.contains("UTC")
        || n.contains("TIMESTAMP")
    {
        return (ColumnKind::DateTime, None);
    }
    if ["GUID", "UUID", "UID"].iter().any(|s| n.ends_with(s)) {
        return (ColumnKind::Guid, None);
    }
    if ["AMOUNT", "PRICE", "COST", "RATE", "PERCENT", "BALANCE"]
        .iter()
        .any(|s| n.ends_with(s))
    {
        return (ColumnKind::Decimal, None);
    }
    (ColumnKind::Integer, None)
}

/// Evidence a literal carries, if any. NULL carries none.
pub fn literal_evidence(
    literal: &schemasketch_core::Literal,
) -> Option<(ColumnKind, Option<u32>)> {
    use schemasketch_core::Literal;
    match literal {
        Literal::Int(_) => Some((ColumnKind::Integer, None)),
        Literal::Decimal(_) => Some((ColumnKind::Decimal, None)),
        // Lengths below the safe default are widened to it; a genuinely
        // long literal keeps its own length.
        Literal::Str(s) => Some((ColumnKind::Text, Some((s.chars().count() as u32).max(255)))),
        Literal::Bool(_) => Some((ColumnKind::Boolean, None)),
        Literal::Null => None,
    }
}

/// Fold evidence from several values (an IN list) into one, using the same
/// collapse rule the table itself uses.
pub fn merge_evidence(
    items: impl IntoIterator<Item = (ColumnKind, Option<u32>)>,
) -> Option<(ColumnKind, Option<u32>)> {
    let mut acc: Option<InferredColumn> = None;
    for (kind, length) in items {
        match &mut acc {
            None => {
                acc = Some(InferredColumn {
                    kind,
                    nullable: false,
                    length,
                })
            }
            Some(entry) => merge_kind(entry, kind, length),
        }
    }
    acc.map(|entry| (entry.kind, entry.length))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> TableIdent {
        TableIdent::new("T")
    }

    #[test]
    fn columns_start_from_the_naming_heuristic() {
        let mut table = InferenceTable::new();
        table.touch(&t(), &NameKey::new("Id"));
        table.touch(&t(), &NameKey::new("IsActive"));
        table.touch(&t(), &NameKey::new("FirstName"));
        table.touch(&t(), &NameKey::new("CreatedOn"));
        table.touch(&t(), &NameKey::new("OrderGuid"));
        table.touch(&t(), &NameKey::new("UnitPrice"));

        let lookup = |name: &str| table.column_type(&t(), &NameKey::new(name)).unwrap();
        assert_eq!(lookup("Id"), ColumnType::Int32);
        assert_eq!(lookup("IsActive"), ColumnType::Bool);
        assert_eq!(lookup("FirstName"), ColumnType::String { length: Some(255) });
        assert_eq!(lookup("CreatedOn"), ColumnType::DateTime);
        assert_eq!(lookup("OrderGuid"), ColumnType::Guid);
        assert_eq!(lookup("UnitPrice"), ColumnType::Decimal);
    }

    #[test]
    fn heuristic_normalizes_separators() {
        assert_eq!(heuristic_kind("is_deleted"), (ColumnKind::Boolean, None));
        assert_eq!(heuristic_kind("user name"), (ColumnKind::Text, Some(255)));
        assert_eq!(heuristic_kind("updated-at"), (ColumnKind::DateTime, None));
        assert_eq!(heuristic_kind("utc_offset"), (ColumnKind::DateTime, None));
    }

    #[test]
    fn description_is_text_not_date() {
        // Ends with "ON" too; the text rule must win.
        assert_eq!(heuristic_kind("Description"), (ColumnKind::Text, Some(255)));
    }

    #[test]
    fn default_yields_to_specific_evidence() {
        let mut table = InferenceTable::new();
        let col = NameKey::new("x");
        table.touch(&t(), &col);
        table.hint(&t(), &col, ColumnKind::Decimal, None);
        assert_eq!(table.column_type(&t(), &col), Some(ColumnType::Decimal));
    }

    #[test]
    fn weak_integer_hint_never_displaces() {
        let mut table = InferenceTable::new();
        let col = NameKey::new("IsActive");
        table.touch(&t(), &col);
        table.hint(&t(), &col, ColumnKind::Integer, None);
        assert_eq!(table.column_type(&t(), &col), Some(ColumnType::Bool));
    }

    #[test]
    fn conflicting_specifics_collapse_to_text() {
        // Text then Decimal.
        let mut table = InferenceTable::new();
        let col = NameKey::new("x");
        table.hint(&t(), &col, ColumnKind::Text, Some(255));
        table.hint(&t(), &col, ColumnKind::Decimal, None);
        assert_eq!(
            table.column_type(&t(), &col),
            Some(ColumnType::String { length: Some(255) })
        );

        // Decimal then Text.
        let mut table = InferenceTable::new();
        table.hint(&t(), &col, ColumnKind::Decimal, None);
        table.hint(&t(), &col, ColumnKind::Text, Some(300));
        assert_eq!(
            table.column_type(&t(), &col),
            Some(ColumnType::String { length: Some(300) })
        );
    }

    #[test]
    fn text_lengths_take_the_max() {
        let mut table = InferenceTable::new();
        let col = NameKey::new("x");
        table.hint(&t(), &col, ColumnKind::Text, Some(255));
        table.hint(&t(), &col, ColumnKind::Text, Some(400));
        table.hint(&t(), &col, ColumnKind::Text, Some(10));
        assert_eq!(
            table.column_type(&t(), &col),
            Some(ColumnType::String { length: Some(400) })
        );
    }

    #[test]
    fn nullability_is_monotone() {
        let mut table = InferenceTable::new();
        let col = NameKey::new("x");
        table.touch(&t(), &col);
        table.mark_nullable(&t(), &col);
        table.hint(&t(), &col, ColumnKind::Decimal, None);

        let (_, columns) = table.iter().next().unwrap();
        assert!(columns[&col].nullable);
    }

    #[test]
    fn kind_evidence_hides_the_default() {
        let mut table = InferenceTable::new();
        let col = NameKey::new("x");
        table.touch(&t(), &col);
        assert_eq!(table.kind_evidence(&t(), &col), None);

        table.hint(&t(), &col, ColumnKind::Guid, None);
        assert_eq!(
            table.kind_evidence(&t(), &col),
            Some((ColumnKind::Guid, None))
        );
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut table = InferenceTable::new();
        for name in ["z", "a", "m"] {
            table.touch(&t(), &NameKey::new(name));
        }
        let (_, columns) = table.iter().next().unwrap();
        let order: Vec<&str> = columns.keys().map(NameKey::as_str).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn string_literal_evidence_widens_to_255() {
        use schemasketch_core::Literal;
        assert_eq!(
            literal_evidence(&Literal::Str("abc".into())),
            Some((ColumnKind::Text, Some(255)))
        );
        let long = "x".repeat(300);
        assert_eq!(
            literal_evidence(&Literal::Str(long)),
            Some((ColumnKind::Text, Some(300)))
        );
        assert_eq!(literal_evidence(&Literal::Null), None);
    }

    #[test]
    fn in_list_evidence_merges() {
        let merged = merge_evidence([
            (ColumnKind::Integer, None),
            (ColumnKind::Decimal, None),
        ]);
        assert_eq!(merged, Some((ColumnKind::Decimal, None)));

        let collapsed = merge_evidence([
            (ColumnKind::Decimal, None),
            (ColumnKind::Text, Some(255)),
        ]);
        assert_eq!(collapsed, Some((ColumnKind::Text, Some(255))));
    }
}
