//! Table sources: named tables, derived tables, deferred CTE references,
//! and joins

use crate::expr::predicate::BoolExpr;
use crate::expr::query::QueryExpr;
use crate::name::{NameKey, TableIdent};
use serde::ser::SerializeStruct;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

/// A reference to a physical table, with the alias it was given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRef {
    /// Identity of the referenced table
    pub table: TableIdent,

    /// Alias the statement gave the reference, if any
    pub alias: Option<NameKey>,
}

impl TableRef {
    /// An unaliased reference.
    pub fn new(table: TableIdent) -> Self {
        Self { table, alias: None }
    }

    /// New node with the alias replaced.
    pub fn with_alias(&self, alias: Option<NameKey>) -> Self {
        Self {
            table: self.table.clone(),
            alias,
        }
    }

    /// The qualifier columns of this reference resolve through.
    pub fn qualifier(&self) -> &NameKey {
        self.alias.as_ref().unwrap_or(&self.table.name)
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// Error returned when a deferred CTE reference is dereferenced before its
/// body was filled. Reaching this means the statement build is using a
/// registry entry out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("CTE '{name}' was referenced before its body was built")]
pub struct UnresolvedCte {
    /// Name of the unfilled CTE
    pub name: NameKey,
}

/// Shared slot a WITH-clause entry writes its body into.
///
/// The slot is created when the CTE's name is registered, before any body
/// exists; references created while bodies are being built all point at the
/// same slot, which is what makes self- and forward-references work.
#[derive(Debug, Clone)]
pub struct CteSlot {
    name: NameKey,
    body: OnceLock<QueryExpr>,
}

impl CteSlot {
    /// An empty slot for the given CTE name.
    pub fn new(name: impl Into<NameKey>) -> Self {
        Self {
            name: name.into(),
            body: OnceLock::new(),
        }
    }

    /// The CTE name this slot belongs to.
    pub fn name(&self) -> &NameKey {
        &self.name
    }

    /// Whether the body has been filled.
    pub fn is_resolved(&self) -> bool {
        self.body.get().is_some()
    }

    /// Fill the body. Filling twice is an error.
    pub fn fill(&self, body: QueryExpr) -> Result<(), QueryExpr> {
        self.body.set(body)
    }

    /// The body, failing if it has not been filled yet.
    pub fn body(&self) -> Result<&QueryExpr, UnresolvedCte> {
        self.body.get().ok_or_else(|| UnresolvedCte {
            name: self.name.clone(),
        })
    }
}

impl PartialEq for CteSlot {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.body.get() == other.body.get()
    }
}

impl Serialize for CteSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CteSlot", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("body", &self.body.get())?;
        state.end()
    }
}

/// A deferred reference to a CTE.
///
/// Carries the shared slot rather than the body itself; the body is read
/// late, at traversal time, so a CTE can reference itself or a sibling
/// declared after it.
#[derive(Clone)]
pub struct DeferredCte {
    slot: Arc<CteSlot>,

    /// Alias the reference was given, if any
    pub alias: Option<NameKey>,
}

impl DeferredCte {
    /// A reference through the given slot.
    pub fn new(slot: Arc<CteSlot>, alias: Option<NameKey>) -> Self {
        Self { slot, alias }
    }

    /// The referenced CTE's name.
    pub fn name(&self) -> &NameKey {
        self.slot.name()
    }

    /// The qualifier columns of this reference resolve through.
    pub fn qualifier(&self) -> &NameKey {
        self.alias.as_ref().unwrap_or_else(|| self.slot.name())
    }

    /// The CTE body, failing if it has not been built yet.
    pub fn body(&self) -> Result<&QueryExpr, UnresolvedCte> {
        self.slot.body()
    }
}

// Prints the name only: a recursive CTE's body contains a reference back to
// its own slot, so printing bodies here would never terminate.
impl std::fmt::Debug for DeferredCte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredCte")
            .field("name", self.name())
            .field("alias", &self.alias)
            .finish()
    }
}

impl PartialEq for DeferredCte {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.alias == other.alias
    }
}

// Serializes the name only, for the same reason Debug does.
impl Serialize for DeferredCte {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DeferredCte", 2)?;
        state.serialize_field("cte", self.name())?;
        state.serialize_field("alias", &self.alias)?;
        state.end()
    }
}

/// A table source in a FROM clause (or MERGE USING, DELETE, UPDATE FROM).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum TableSource {
    /// Physical table reference
    Table(TableRef),

    /// Parenthesized subquery with a mandatory alias
    Derived {
        query: Box<QueryExpr>,
        alias: NameKey,
    },

    /// Deferred CTE reference
    Cte(DeferredCte),

    /// Join of two sources
    Join {
        kind: JoinKind,
        left: Box<TableSource>,
        right: Box<TableSource>,
        /// ON condition; absent for cross joins
        on: Option<BoolExpr>,
    },
}

impl TableSource {
    /// Join helper producing a new node.
    pub fn join(self, kind: JoinKind, right: TableSource, on: Option<BoolExpr>) -> Self {
        Self::Join {
            kind,
            left: Box::new(self),
            right: Box::new(right),
            on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::query::{QueryBody, QueryExpr, SelectExpr, SelectItem};
    use crate::expr::value::{Literal, ValueExpr};

    fn one_row_query() -> QueryExpr {
        QueryExpr::plain(QueryBody::Select(SelectExpr {
            distinct: false,
            top: None,
            items: vec![SelectItem::Expr {
                expr: ValueExpr::Literal(Literal::Int(1)),
                alias: None,
            }],
            from: None,
            filter: None,
            group_by: Vec::new(),
        }))
    }

    #[test]
    fn slot_rejects_reads_before_fill() {
        let slot = Arc::new(CteSlot::new("r"));
        let cte = DeferredCte::new(Arc::clone(&slot), None);

        let err = cte.body().unwrap_err();
        assert_eq!(err.name, NameKey::new("R"));

        slot.fill(one_row_query()).unwrap();
        assert!(cte.body().is_ok());
        assert!(slot.is_resolved());
    }

    #[test]
    fn slot_fills_once() {
        let slot = CteSlot::new("r");
        assert!(slot.fill(one_row_query()).is_ok());
        assert!(slot.fill(one_row_query()).is_err());
    }

    #[test]
    fn deferred_refs_share_one_slot() {
        let slot = Arc::new(CteSlot::new("totals"));
        let early = DeferredCte::new(Arc::clone(&slot), None);
        let late = DeferredCte::new(Arc::clone(&slot), Some(NameKey::new("t")));

        slot.fill(one_row_query()).unwrap();
        assert!(early.body().is_ok());
        assert!(late.body().is_ok());
        assert_eq!(late.qualifier(), &NameKey::new("t"));
    }

    #[test]
    fn table_ref_qualifier_prefers_alias() {
        let plain = TableRef::new(TableIdent::with_schema("dbo", "Users"));
        assert_eq!(plain.qualifier(), &NameKey::new("Users"));

        let aliased = plain.with_alias(Some(NameKey::new("u")));
        assert_eq!(aliased.qualifier(), &NameKey::new("u"));
    }
}
