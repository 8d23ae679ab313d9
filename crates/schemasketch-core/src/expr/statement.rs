//! Top-level statements: SELECT, INSERT, UPDATE, DELETE, MERGE

use crate::expr::predicate::BoolExpr;
use crate::expr::query::QueryExpr;
use crate::expr::source::{TableRef, TableSource};
use crate::expr::value::{ColumnExpr, ValueExpr};
use serde::Serialize;

/// A `SET column = value` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// Target column, on the statement's target table
    pub column: ColumnExpr,

    /// Assigned value
    pub value: ValueExpr,
}

/// INSERT row source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum InsertSource {
    /// `VALUES (...), (...)`
    Values(Vec<Vec<ValueExpr>>),

    /// `INSERT ... SELECT ...`
    Query(Box<QueryExpr>),
}

/// An INSERT statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertStmt {
    /// Target table
    pub target: TableRef,

    /// Explicit column list
    pub columns: Vec<ColumnExpr>,

    /// Rows or source query
    pub source: InsertSource,
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateStmt {
    /// Target table (resolved through the FROM sources when aliased)
    pub target: TableRef,

    /// SET assignments in source order
    pub assignments: Vec<Assignment>,

    /// FROM clause sources, if present
    pub from: Option<TableSource>,

    /// WHERE clause
    pub filter: Option<BoolExpr>,
}

impl UpdateStmt {
    /// New node with the WHERE clause replaced.
    pub fn with_filter(&self, filter: Option<BoolExpr>) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteStmt {
    /// Target table
    pub target: TableRef,

    /// Additional sources (`DELETE t FROM ... JOIN ...`), if present
    pub sources: Option<TableSource>,

    /// WHERE clause
    pub filter: Option<BoolExpr>,
}

/// Action of a WHEN MATCHED / WHEN NOT MATCHED BY SOURCE arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum MatchedOp {
    Update(Vec<Assignment>),
    Delete,
}

/// A WHEN MATCHED / WHEN NOT MATCHED BY SOURCE arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAction {
    /// Extra AND condition on the arm, if any
    pub predicate: Option<BoolExpr>,

    /// What the arm does
    pub action: MatchedOp,
}

/// The WHEN NOT MATCHED [BY TARGET] THEN INSERT arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotMatchedInsert {
    /// Extra AND condition on the arm, if any
    pub predicate: Option<BoolExpr>,

    /// Insert column list
    pub columns: Vec<ColumnExpr>,

    /// Single VALUES row
    pub values: Vec<ValueExpr>,
}

/// A MERGE statement. At most one arm of each kind; additional arms are
/// rejected during the build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeStmt {
    /// Target table
    pub target: TableRef,

    /// USING source
    pub source: TableSource,

    /// ON condition
    pub on: BoolExpr,

    /// WHEN MATCHED arm
    pub when_matched: Option<MatchedAction>,

    /// WHEN NOT MATCHED [BY TARGET] arm
    pub when_not_matched: Option<NotMatchedInsert>,

    /// WHEN NOT MATCHED BY SOURCE arm
    pub when_not_matched_by_source: Option<MatchedAction>,
}

/// A complete imported statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "statement", content = "value", rename_all = "snake_case")]
pub enum Statement {
    Select(QueryExpr),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Merge(MergeStmt),
}
