//! Query expressions: SELECT blocks, set operations, WITH clauses

use crate::expr::predicate::BoolExpr;
use crate::expr::source::{CteSlot, TableSource};
use crate::expr::value::ValueExpr;
use crate::name::NameKey;
use serde::Serialize;
use std::sync::Arc;

/// One declared WITH-clause entry. The body lives in the shared slot so
/// deferred references created before the body existed see it once filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CteDecl {
    /// CTE name
    pub name: NameKey,

    /// Slot holding the body
    pub slot: Arc<CteSlot>,
}

/// Set operation between two query bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOp {
    Union,
    UnionAll,
    Except,
    Intersect,
}

/// A selectable item in a projection list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum SelectItem {
    /// An expression, optionally aliased
    Expr {
        expr: ValueExpr,
        alias: Option<NameKey>,
    },

    /// `*`
    Wildcard,

    /// `qualifier.*`
    QualifiedWildcard(NameKey),
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub expr: ValueExpr,
    pub descending: bool,
}

/// A single SELECT block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectExpr {
    /// SELECT DISTINCT
    pub distinct: bool,

    /// TOP n (without PERCENT / WITH TIES, which are rejected upstream)
    pub top: Option<u64>,

    /// Projection list
    pub items: Vec<SelectItem>,

    /// FROM clause, joins already folded into one source tree
    pub from: Option<TableSource>,

    /// WHERE clause
    pub filter: Option<BoolExpr>,

    /// GROUP BY expressions
    pub group_by: Vec<ValueExpr>,
}

impl SelectExpr {
    /// New node with the projection list replaced.
    pub fn with_items(&self, items: Vec<SelectItem>) -> Self {
        Self {
            items,
            ..self.clone()
        }
    }

    /// New node with the WHERE clause replaced.
    pub fn with_filter(&self, filter: Option<BoolExpr>) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }
}

/// Body of a query: a SELECT block or a set operation over two bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum QueryBody {
    Select(SelectExpr),

    SetOp {
        op: SetOp,
        left: Box<QueryBody>,
        right: Box<QueryBody>,
    },
}

/// A full query: optional WITH clause, body, ordering and paging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryExpr {
    /// Declared CTEs in source order
    pub ctes: Vec<CteDecl>,

    /// Query body
    pub body: QueryBody,

    /// ORDER BY items
    pub order_by: Vec<OrderItem>,

    /// OFFSET n ROWS
    pub offset: Option<u64>,

    /// FETCH NEXT n ROWS ONLY
    pub fetch: Option<u64>,
}

impl QueryExpr {
    /// A query with just a body: no CTEs, ordering, or paging.
    pub fn plain(body: QueryBody) -> Self {
        Self {
            ctes: Vec::new(),
            body,
            order_by: Vec::new(),
            offset: None,
            fetch: None,
        }
    }

    /// New node with the ORDER BY list replaced.
    pub fn with_order_by(&self, order_by: Vec<OrderItem>) -> Self {
        Self {
            order_by,
            ..self.clone()
        }
    }

    /// The single SELECT block, if the body is not a set operation.
    pub fn as_select(&self) -> Option<&SelectExpr> {
        match &self.body {
            QueryBody::Select(select) => Some(select),
            QueryBody::SetOp { .. } => None,
        }
    }
}
