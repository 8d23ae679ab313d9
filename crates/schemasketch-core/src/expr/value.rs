//! Scalar value expressions
//!
//! Nodes are immutable and built bottom-up; "modifying" one means building
//! a new node (see [`crate::expr::rewrite`]).

use crate::expr::predicate::BoolExpr;
use crate::expr::query::QueryExpr;
use crate::name::NameKey;
use crate::schema::ColumnType;
use serde::Serialize;

/// A literal value as written in the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "literal", content = "value", rename_all = "lowercase")]
pub enum Literal {
    /// Integer literal
    Int(i64),

    /// Numeric literal with a fraction or exponent, kept verbatim
    Decimal(String),

    /// String literal
    Str(String),

    /// TRUE / FALSE
    Bool(bool),

    /// NULL
    Null,
}

/// Binary arithmetic / concatenation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

impl std::fmt::Display for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sym = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Concat => "||",
        };
        write!(f, "{sym}")
    }
}

/// A resolved column reference.
///
/// `source` is the qualifier the column was resolved to (the alias, or the
/// bare table name when no alias exists); it is `None` only for columns
/// that could not be tied to a visible source qualifier. `column_type` is
/// the inference snapshot baked in during the emit pass, present only for
/// columns of physical tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnExpr {
    /// Qualifier of the resolved source
    pub source: Option<NameKey>,

    /// Column name
    pub name: NameKey,

    /// Inferred concrete type, for physical-table columns in emit mode
    pub column_type: Option<ColumnType>,
}

impl ColumnExpr {
    /// An unqualified column with no type snapshot.
    pub fn bare(name: impl Into<NameKey>) -> Self {
        Self {
            source: None,
            name: name.into(),
            column_type: None,
        }
    }

    /// A qualified column with no type snapshot.
    pub fn qualified(source: impl Into<NameKey>, name: impl Into<NameKey>) -> Self {
        Self {
            source: Some(source.into()),
            name: name.into(),
            column_type: None,
        }
    }

    /// New node with the type snapshot replaced.
    pub fn with_column_type(&self, column_type: Option<ColumnType>) -> Self {
        Self {
            column_type,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}.{}", source, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncExpr {
    /// Function name
    pub name: NameKey,

    /// Ordinary arguments
    pub args: Vec<ValueExpr>,

    /// True for `f(*)`, e.g. `COUNT(*)`
    pub wildcard: bool,

    /// True for `f(DISTINCT x)`
    pub distinct: bool,
}

/// One `WHEN condition THEN result` arm of a searched CASE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseWhen {
    pub condition: BoolExpr,
    pub result: ValueExpr,
}

/// A searched CASE expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseExpr {
    /// WHEN arms in source order
    pub whens: Vec<CaseWhen>,

    /// ELSE result, if present
    pub else_value: Option<Box<ValueExpr>>,
}

/// A scalar-valued expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum ValueExpr {
    /// Column reference
    Column(ColumnExpr),

    /// Literal value
    Literal(Literal),

    /// Binary arithmetic or concatenation
    Arith {
        op: ArithOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },

    /// Unary minus
    Negate(Box<ValueExpr>),

    /// Function call
    Func(FuncExpr),

    /// Searched CASE
    Case(CaseExpr),

    /// CAST to a concrete type
    Cast {
        expr: Box<ValueExpr>,
        to: ColumnType,
    },

    /// Scalar subquery
    Subquery(Box<QueryExpr>),
}

impl ValueExpr {
    /// Shorthand for a literal node.
    pub fn literal(lit: Literal) -> Self {
        Self::Literal(lit)
    }

    /// Shorthand for a column node.
    pub fn column(col: ColumnExpr) -> Self {
        Self::Column(col)
    }

    /// The literal carried by this node, if it is one.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Whether this node is the NULL literal.
    pub fn is_null_literal(&self) -> bool {
        matches!(self, Self::Literal(Literal::Null))
    }
}
