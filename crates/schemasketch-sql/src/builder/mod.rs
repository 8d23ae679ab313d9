//! Statement builders
//!
//! Recursive builders that walk the grammatical parse tree once per pass,
//! consuming the scope resolver and the inference engine while constructing
//! the expression model. The same code runs twice: a Collect pass whose
//! tree is thrown away (it exists to run every hint), then an Emit pass
//! that bakes the completed inference state into the emitted column
//! references.
//!
//! Dispatch is a closed match over the five supported statement kinds;
//! anything else, and any unsupported clause met while descending, fails
//! immediately. No partial trees are returned.

mod dml;
mod exprs;
mod query;

use crate::cte::CteRegistry;
use crate::error::{BuildResult, ImportError};
use crate::inference::InferenceTable;
use crate::scope::QueryScope;
use schemasketch_core::{CteSlot, NameKey, Statement};
use sqlparser::ast;
use std::sync::Arc;

pub(crate) use dml::{build_delete, build_insert, build_merge, build_update};
pub(crate) use query::build_query;

/// Which of the two passes is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildMode {
    /// Populate the inference table; the built tree is discarded.
    Collect,

    /// Build the real tree, reading type snapshots out of the inference
    /// table the Collect pass completed.
    Emit,
}

/// Per-call build state threaded through both passes.
pub(crate) struct BuildContext {
    mode: BuildMode,
    pub(crate) inference: InferenceTable,
    cte_frames: Vec<CteRegistry>,
}

impl BuildContext {
    /// Fresh state for one import call, starting in Collect mode.
    pub(crate) fn new() -> Self {
        Self {
            mode: BuildMode::Collect,
            inference: InferenceTable::new(),
            cte_frames: Vec::new(),
        }
    }

    /// Switch to the Emit pass, keeping the accumulated inference state.
    pub(crate) fn begin_emit(&mut self) {
        self.mode = BuildMode::Emit;
        self.cte_frames.clear();
    }

    pub(crate) fn is_emit(&self) -> bool {
        self.mode == BuildMode::Emit
    }

    /// Push a WITH clause's registry; innermost frames win lookups.
    pub(crate) fn push_cte_frame(&mut self, registry: CteRegistry) -> usize {
        self.cte_frames.push(registry);
        self.cte_frames.len() - 1
    }

    pub(crate) fn pop_cte_frame(&mut self) {
        self.cte_frames.pop();
    }

    pub(crate) fn cte_frame(&self, index: usize) -> &CteRegistry {
        &self.cte_frames[index]
    }

    /// Find a registered CTE slot, innermost WITH clause first.
    pub(crate) fn lookup_cte(&self, name: &NameKey) -> Option<&Arc<CteSlot>> {
        self.cte_frames
            .iter()
            .rev()
            .find_map(|frame| frame.lookup(name))
    }
}

/// Closed dispatch over the supported statement kinds.
pub(crate) fn build_statement(
    ctx: &mut BuildContext,
    stmt: &ast::Statement,
) -> BuildResult<Statement> {
    match stmt {
        ast::Statement::Query(query) => {
            let root = QueryScope::root();
            Ok(Statement::Select(build_query(ctx, &root, query)?))
        }
        ast::Statement::Insert(insert) => Ok(Statement::Insert(build_insert(ctx, insert)?)),
        ast::Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => Ok(Statement::Update(build_update(
            ctx,
            table,
            assignments,
            from.as_ref(),
            selection.as_ref(),
        )?)),
        ast::Statement::Delete(delete) => Ok(Statement::Delete(build_delete(ctx, delete)?)),
        ast::Statement::Merge {
            table,
            source,
            on,
            clauses,
            ..
        } => Ok(Statement::Merge(build_merge(ctx, table, source, on, clauses)?)),
        other => Err(ImportError::unsupported(format!(
            "statement kind '{}'",
            statement_keyword(other)
        ))),
    }
}

/// First keyword of the statement's rendering, for error messages.
fn statement_keyword(stmt: &ast::Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("?")
        .to_uppercase()
}

/// Convert a parse-tree identifier into a name key.
pub(crate) fn key(ident: &ast::Ident) -> NameKey {
    NameKey::new(ident.value.clone())
}

/// Convert a (possibly qualified) object name into its parts.
pub(crate) fn object_parts(name: &ast::ObjectName) -> Vec<NameKey> {
    name.0.iter().map(key).collect()
}
