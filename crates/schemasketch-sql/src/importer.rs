//! Public import entry point
//!
//! `import` runs the whole pipeline: grammatical parse, the Collect pass
//! (inference only, tree discarded), the Emit pass (the real tree, with
//! type snapshots baked into physical column references), then schema
//! synthesis. All state lives in a per-call context, so one importer can
//! be shared across threads.

use crate::builder::{build_statement, BuildContext};
use crate::error::ImportError;
use crate::parser::SqlParser;
use crate::synthesize::synthesize;
use schemasketch_core::{Statement, TableSketch};
use serde::Serialize;
use tracing::debug;

/// Result of a successful import: the expression tree plus the synthesized
/// schema, tables ordered by identity and columns by first use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedStatement {
    /// The statement tree
    pub statement: Statement,

    /// Synthesized table descriptors; empty when no physical table was
    /// touched
    pub tables: Vec<TableSketch>,
}

/// SQL importer. Owns only the parser configuration; every call builds its
/// own context.
pub struct SqlImporter {
    parser: SqlParser,
}

impl SqlImporter {
    /// Importer for the T-SQL dialect.
    pub fn new() -> Self {
        Self {
            parser: SqlParser::new(),
        }
    }

    /// Importer for the generic SQL dialect.
    pub fn generic() -> Self {
        Self {
            parser: SqlParser::generic(),
        }
    }

    /// Import one SQL statement.
    ///
    /// On failure the error list is non-empty and ordered; no partial tree
    /// is returned. Builds are fail-fast, so the list currently carries the
    /// first failure encountered.
    pub fn import(&self, sql: &str) -> Result<ImportedStatement, Vec<ImportError>> {
        self.try_import(sql).map_err(|error| vec![error])
    }

    fn try_import(&self, sql: &str) -> Result<ImportedStatement, ImportError> {
        let parsed = self.parser.parse_one(sql)?;
        debug!("parsed one statement");

        let mut ctx = BuildContext::new();

        // Collect: run every hint, throw the tree away.
        build_statement(&mut ctx, &parsed)?;
        debug!("collect pass complete");

        // Emit: same walk, now with the completed inference table.
        ctx.begin_emit();
        let statement = build_statement(&mut ctx, &parsed)?;
        debug!("emit pass complete");

        let tables = synthesize(&ctx.inference);
        Ok(ImportedStatement { statement, tables })
    }
}

impl Default for SqlImporter {
    fn default() -> Self {
        Self::new()
    }
}
