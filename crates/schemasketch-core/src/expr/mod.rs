//! The immutable expression model
//!
//! Tagged-variant nodes for values, boolean predicates, table sources,
//! selectable items, and statements. Nodes are built bottom-up and never
//! mutated; [`visit`] provides read-only double-dispatch traversal and
//! [`rewrite`] provides pure structural rewriting.

pub mod predicate;
pub mod query;
pub mod rewrite;
pub mod source;
pub mod statement;
pub mod value;
pub mod visit;

pub use predicate::{BoolExpr, CompareOp};
pub use query::{CteDecl, OrderItem, QueryBody, QueryExpr, SelectExpr, SelectItem, SetOp};
pub use rewrite::Rewrite;
pub use source::{CteSlot, DeferredCte, JoinKind, TableRef, TableSource, UnresolvedCte};
pub use statement::{
    Assignment, DeleteStmt, InsertSource, InsertStmt, MatchedAction, MatchedOp, MergeStmt,
    NotMatchedInsert, Statement, UpdateStmt,
};
pub use value::{ArithOp, CaseExpr, CaseWhen, ColumnExpr, FuncExpr, Literal, ValueExpr};
pub use visit::{collect_nodes, find_value, Node, Visit};
