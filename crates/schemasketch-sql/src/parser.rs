//! Grammatical parsing boundary
//!
//! The tokenizer/parser is the `sqlparser` crate, consumed as a black box.
//! This wrapper pins the dialect and enforces the one-batch/one-statement
//! contract before any analysis starts.

use crate::error::ImportError;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MsSqlDialect};
use sqlparser::parser::Parser;

/// SQL parser with a configurable dialect.
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Parser for the T-SQL dialect, the default.
    pub fn new() -> Self {
        Self {
            dialect: Box::new(MsSqlDialect {}),
        }
    }

    /// Parser for the generic dialect.
    pub fn generic() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Parse SQL that must contain exactly one statement.
    ///
    /// Multiple statements (or none) fail before any analysis happens; a
    /// grammar failure comes back as [`ImportError::Syntax`].
    pub fn parse_one(&self, sql: &str) -> Result<Statement, ImportError> {
        let mut statements = Parser::parse_sql(&*self.dialect, sql)
            .map_err(|e| ImportError::Syntax(e.to_string()))?;

        match statements.len() {
            1 => Ok(statements.remove(0)),
            0 => Err(ImportError::Syntax("no statement found".to_string())),
            n => Err(ImportError::Syntax(format!(
                "expected exactly one statement, found {n}"
            ))),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_statement() {
        let parser = SqlParser::new();
        let stmt = parser.parse_one("SELECT Id FROM Users").unwrap();
        assert!(matches!(stmt, Statement::Query(_)));
    }

    #[test]
    fn rejects_multiple_statements() {
        let parser = SqlParser::new();
        let err = parser
            .parse_one("SELECT 1; SELECT 2")
            .unwrap_err();
        assert!(matches!(err, ImportError::Syntax(_)));
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn rejects_empty_input() {
        let parser = SqlParser::new();
        assert!(matches!(
            parser.parse_one("  "),
            Err(ImportError::Syntax(_))
        ));
    }

    #[test]
    fn rejects_invalid_sql() {
        let parser = SqlParser::new();
        assert!(matches!(
            parser.parse_one("SELECT FROM WHERE"),
            Err(ImportError::Syntax(_))
        ));
    }

    #[test]
    fn parses_bracketed_identifiers() {
        let parser = SqlParser::new();
        let stmt = parser.parse_one("SELECT [Id] FROM [dbo].[Users]").unwrap();
        assert!(matches!(stmt, Statement::Query(_)));
    }
}
