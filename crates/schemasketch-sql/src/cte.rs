//! CTE registry
//!
//! All names of a WITH clause are registered before any body is built, each
//! getting an empty shared slot. Table references hitting a registered name
//! resolve to a deferred placeholder over that slot, so a CTE body can
//! reference itself or a sibling declared after it; bodies are filled
//! one by one as they are built.

use crate::error::{BuildResult, ImportError};
use schemasketch_core::{CteDecl, CteSlot, NameKey, QueryExpr};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for one WITH clause.
#[derive(Debug, Default)]
pub struct CteRegistry {
    slots: Vec<Arc<CteSlot>>,
    by_name: HashMap<NameKey, usize>,
}

impl CteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every name of the clause up front. Duplicates fail here,
    /// before any body exists.
    pub fn register_names(
        &mut self,
        names: impl IntoIterator<Item = NameKey>,
    ) -> BuildResult<()> {
        for name in names {
            if self.by_name.contains_key(&name) {
                return Err(ImportError::resolution(format!(
                    "duplicate CTE name '{name}'"
                )));
            }
            let index = self.slots.len();
            self.slots.push(Arc::new(CteSlot::new(name.clone())));
            self.by_name.insert(name, index);
        }
        Ok(())
    }

    /// Fill a registered entry's body. Filling an unknown name or filling
    /// twice is an importer bug, not a statement error.
    pub fn fill_body(&self, name: &NameKey, body: QueryExpr) -> BuildResult<()> {
        let slot = self.lookup(name).ok_or_else(|| {
            ImportError::Internal(format!("CTE '{name}' was never registered"))
        })?;
        slot.fill(body).map_err(|_| {
            ImportError::Internal(format!("CTE '{name}' body filled twice"))
        })
    }

    /// The slot registered under `name`, if any.
    pub fn lookup(&self, name: &NameKey) -> Option<&Arc<CteSlot>> {
        self.by_name.get(name).map(|&index| &self.slots[index])
    }

    /// Declarations in registration order, for the emitted query node.
    pub fn declarations(&self) -> Vec<CteDecl> {
        self.slots
            .iter()
            .map(|slot| CteDecl {
                name: slot.name().clone(),
                slot: Arc::clone(slot),
            })
            .collect()
    }
}
