//! Schemasketch core
//!
//! The immutable expression model for imported SQL statements, the
//! case-insensitive name/identity types, and the synthesized schema
//! descriptors the importer emits.

pub mod expr;
pub mod name;
pub mod schema;

pub use expr::{
    ArithOp, Assignment, BoolExpr, CaseExpr, CaseWhen, ColumnExpr, CompareOp, CteDecl, CteSlot,
    DeferredCte, DeleteStmt, FuncExpr, InsertSource, InsertStmt, JoinKind, Literal, MatchedAction,
    MatchedOp, MergeStmt, NotMatchedInsert, OrderItem, QueryBody, QueryExpr, Rewrite, SelectExpr,
    SelectItem, SetOp, Statement, TableRef, TableSource, UnresolvedCte, UpdateStmt, ValueExpr,
    Visit,
};
pub use name::{NameKey, TableIdent};
pub use schema::{ColumnKind, ColumnSketch, ColumnType, TableSketch};
