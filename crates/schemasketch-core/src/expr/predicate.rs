//! Boolean predicate expressions

use crate::expr::query::QueryExpr;
use crate::expr::value::ValueExpr;
use serde::Serialize;

/// Relational comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sym = match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        };
        write!(f, "{sym}")
    }
}

/// A boolean-valued expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum BoolExpr {
    /// `left <op> right`
    Compare {
        op: CompareOp,
        left: ValueExpr,
        right: ValueExpr,
    },

    /// Conjunction
    And(Box<BoolExpr>, Box<BoolExpr>),

    /// Disjunction
    Or(Box<BoolExpr>, Box<BoolExpr>),

    /// Negation
    Not(Box<BoolExpr>),

    /// `expr IS [NOT] NULL`
    IsNull { expr: ValueExpr, negated: bool },

    /// `expr [NOT] LIKE pattern`
    Like {
        expr: ValueExpr,
        pattern: ValueExpr,
        negated: bool,
    },

    /// `expr [NOT] IN (v1, v2, ...)`
    InValues {
        expr: ValueExpr,
        values: Vec<ValueExpr>,
        negated: bool,
    },

    /// `expr [NOT] IN (subquery)`
    InSubquery {
        expr: ValueExpr,
        query: Box<QueryExpr>,
        negated: bool,
    },

    /// `expr [NOT] BETWEEN low AND high`
    Between {
        expr: ValueExpr,
        low: ValueExpr,
        high: ValueExpr,
        negated: bool,
    },

    /// `[NOT] EXISTS (subquery)`
    Exists {
        query: Box<QueryExpr>,
        negated: bool,
    },
}

impl BoolExpr {
    /// Conjunction helper: `self AND other`, a new node.
    pub fn and(self, other: BoolExpr) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Disjunction helper: `self OR other`, a new node.
    pub fn or(self, other: BoolExpr) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }
}
