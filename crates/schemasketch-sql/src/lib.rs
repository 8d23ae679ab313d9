//! SQL import and schema synthesis
//!
//! This crate handles:
//! - The grammatical parsing boundary (`sqlparser`, T-SQL dialect)
//! - Scope and alias resolution across nested query blocks
//! - CTE registration with deferred self/forward references
//! - Two-pass usage-driven column type inference
//! - Building the immutable expression model
//! - Synthesizing table descriptors from inferred usage

mod builder;

pub mod cte;
pub mod error;
pub mod importer;
pub mod inference;
pub mod parser;
pub mod scope;
pub mod synthesize;

pub use cte::CteRegistry;
pub use error::ImportError;
pub use importer::{ImportedStatement, SqlImporter};
pub use inference::{InferenceTable, InferredColumn};
pub use parser::SqlParser;
pub use scope::{QueryScope, SourceEntry, TargetScope};
pub use synthesize::synthesize;
