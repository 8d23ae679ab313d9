//! Scope resolution
//!
//! A scope is one resolution frame per query block: the sources visible to
//! column references, looked up by alias first, then by bare table name.
//! Frames chain to the enclosing block's frame, so inner blocks see outer
//! sources but never the reverse. Frames live only while their block is
//! being built; resolutions are baked into the emitted tree.
//!
//! UPDATE/DELETE/MERGE use the second flavor, [`TargetScope`], which tracks
//! the distinguished target table on top of the ordinary sources.

use crate::error::{BuildResult, ImportError};
use schemasketch_core::{NameKey, TableIdent, TableRef};
use std::collections::HashMap;

/// One visible source in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    /// Qualifier emitted column references carry: the alias, or the bare
    /// table name when no alias was given. `None` for anonymous sources.
    pub qualifier: Option<NameKey>,

    /// Physical table identity; `None` for derived tables and CTE
    /// references.
    pub identity: Option<TableIdent>,
}

/// Resolution frame for a query block.
#[derive(Debug, Default)]
pub struct QueryScope<'p> {
    parent: Option<&'p QueryScope<'p>>,
    entries: Vec<SourceEntry>,
    by_alias: HashMap<NameKey, usize>,
    by_name: HashMap<NameKey, Vec<usize>>,
}

impl<'p> QueryScope<'p> {
    /// A top-level frame with no enclosing scope.
    pub fn root() -> QueryScope<'static> {
        QueryScope::default()
    }

    /// A frame for a nested block, chained to this one.
    pub fn child(&self) -> QueryScope<'_> {
        QueryScope {
            parent: Some(self),
            entries: Vec::new(),
            by_alias: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a source. The alias, when present, must be unique within
    /// the frame; bare names may repeat and only become an error when an
    /// ambiguous reference actually resolves through them.
    pub fn register(
        &mut self,
        alias: Option<NameKey>,
        bare_name: Option<NameKey>,
        identity: Option<TableIdent>,
    ) -> BuildResult<()> {
        let qualifier = alias.clone().or_else(|| bare_name.clone());
        let index = self.entries.len();
        self.entries.push(SourceEntry {
            qualifier,
            identity,
        });

        if let Some(alias) = alias {
            if self.by_alias.insert(alias.clone(), index).is_some() {
                return Err(ImportError::resolution(format!(
                    "duplicate source alias '{alias}'"
                )));
            }
        }
        if let Some(name) = bare_name {
            self.by_name.entry(name).or_default().push(index);
        }
        Ok(())
    }

    /// Resolve a qualifier token: alias map first, then bare names, then
    /// the parent frame.
    pub fn resolve(&self, token: &NameKey) -> BuildResult<&SourceEntry> {
        if let Some(&index) = self.by_alias.get(token) {
            return Ok(&self.entries[index]);
        }
        match self.by_name.get(token).map(Vec::as_slice) {
            Some([index]) => return Ok(&self.entries[*index]),
            Some([_, _, ..]) => {
                return Err(ImportError::resolution(format!(
                    "ambiguous table reference '{token}'"
                )))
            }
            _ => {}
        }
        match self.parent {
            Some(parent) => parent.resolve(token),
            None => Err(ImportError::resolution(format!(
                "unknown source '{token}'"
            ))),
        }
    }

    /// Resolve an unqualified column: valid only when exactly one source
    /// is visible in the frame (falling through to the parent when the
    /// frame is empty).
    pub fn resolve_single(&self, column: &str) -> BuildResult<&SourceEntry> {
        match self.entries.as_slice() {
            [single] => Ok(single),
            [] => match self.parent {
                Some(parent) => parent.resolve_single(column),
                None => Err(ImportError::resolution(format!(
                    "cannot resolve source for column {column}"
                ))),
            },
            _ => Err(ImportError::resolution(format!(
                "cannot resolve source for column {column}"
            ))),
        }
    }

    /// Table identity of a resolved source, if it is a physical table.
    pub fn identity_of<'a>(&self, entry: &'a SourceEntry) -> Option<&'a TableIdent> {
        entry.identity.as_ref()
    }

    /// Number of sources registered in this frame.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this frame has no sources of its own.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unique_by_name(&self, token: &NameKey) -> Option<&SourceEntry> {
        match self.by_name.get(token).map(Vec::as_slice) {
            Some([index]) => Some(&self.entries[*index]),
            _ => None,
        }
    }

    fn by_alias(&self, token: &NameKey) -> Option<&SourceEntry> {
        self.by_alias.get(token).map(|&index| &self.entries[index])
    }
}

/// Statement-target flavor: the sources of an UPDATE/DELETE/MERGE plus the
/// distinguished target table. Converts into a query scope view for the
/// nested blocks those statements contain.
#[derive(Debug)]
pub struct TargetScope<'p> {
    scope: QueryScope<'p>,
    target: TableRef,
}

impl<'p> TargetScope<'p> {
    /// Resolve the statement's raw target token against the already
    /// registered sources: by alias first, then by unique table name, and
    /// finally by treating the token as an explicit table reference (which
    /// is then registered so SET/WHERE columns can resolve against it).
    pub fn resolve(
        mut scope: QueryScope<'p>,
        parts: Vec<NameKey>,
        alias: Option<NameKey>,
    ) -> BuildResult<TargetScope<'p>> {
        if alias.is_none() && parts.len() == 1 {
            let token = &parts[0];

            if let Some(entry) = scope.by_alias(token) {
                let identity = entry.identity.clone().ok_or_else(|| {
                    ImportError::resolution(format!(
                        "target '{token}' does not name a physical table"
                    ))
                })?;
                return Ok(TargetScope {
                    target: TableRef {
                        table: identity,
                        alias: Some(token.clone()),
                    },
                    scope,
                });
            }

            if let Some(entry) = scope.unique_by_name(token) {
                if let Some(identity) = entry.identity.clone() {
                    return Ok(TargetScope {
                        target: TableRef {
                            table: identity,
                            alias: None,
                        },
                        scope,
                    });
                }
            }
        }

        // Explicit target built from the raw reference.
        let table = ident_from_parts(parts)?;
        let target = TableRef {
            table: table.clone(),
            alias: alias.clone(),
        };
        scope.register(alias, Some(table.name.clone()), Some(table))?;
        Ok(TargetScope { target, scope })
    }

    /// The resolved target table.
    pub fn target(&self) -> &TableRef {
        &self.target
    }

    /// The statement's sources projected as a query scope, for derived
    /// tables and subqueries nested inside the statement.
    pub fn query_scope(&self) -> &QueryScope<'p> {
        &self.scope
    }
}

/// Build a table identity from a qualified name's parts.
pub fn ident_from_parts(parts: Vec<NameKey>) -> BuildResult<TableIdent> {
    let mut parts = parts;
    match parts.len() {
        1 => Ok(TableIdent::new(parts.remove(0))),
        2 => {
            let name = parts.remove(1);
            Ok(TableIdent::with_schema(parts.remove(0), name))
        }
        3 => {
            let name = parts.remove(2);
            let schema = parts.remove(1);
            Ok(TableIdent::with_database(parts.remove(0), schema, name))
        }
        n => Err(ImportError::unsupported(format!(
            "table reference with {n} name parts"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableIdent {
        TableIdent::with_schema("dbo", "Users")
    }

    fn orders() -> TableIdent {
        TableIdent::with_schema("dbo", "Orders")
    }

    #[test]
    fn resolves_alias_before_bare_name() {
        let mut scope = QueryScope::root();
        scope
            .register(Some(NameKey::new("u")), Some(NameKey::new("Users")), Some(users()))
            .unwrap();

        let entry = scope.resolve(&NameKey::new("U")).unwrap();
        assert_eq!(entry.identity, Some(users()));
        assert_eq!(entry.qualifier, Some(NameKey::new("u")));

        let by_name = scope.resolve(&NameKey::new("users")).unwrap();
        assert_eq!(by_name.identity, Some(users()));
    }

    #[test]
    fn ambiguous_bare_name_fails() {
        let mut scope = QueryScope::root();
        scope
            .register(Some(NameKey::new("a")), Some(NameKey::new("T")), None)
            .unwrap();
        scope
            .register(Some(NameKey::new("b")), Some(NameKey::new("T")), None)
            .unwrap();

        let err = scope.resolve(&NameKey::new("T")).unwrap_err();
        assert!(matches!(err, ImportError::Resolution(_)));
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn single_source_resolution() {
        let mut scope = QueryScope::root();
        scope
            .register(None, Some(NameKey::new("Users")), Some(users()))
            .unwrap();

        assert!(scope.resolve_single("Id").is_ok());

        scope
            .register(None, Some(NameKey::new("Orders")), Some(orders()))
            .unwrap();
        let err = scope.resolve_single("Id").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot resolve source for column Id"
        );
    }

    #[test]
    fn lookup_falls_through_to_parent() {
        let mut outer = QueryScope::root();
        outer
            .register(Some(NameKey::new("u")), Some(NameKey::new("Users")), Some(users()))
            .unwrap();

        let inner = outer.child();
        assert!(inner.resolve(&NameKey::new("u")).is_ok());
        assert!(inner.resolve_single("Id").is_ok());

        // The other direction never works.
        assert!(outer.resolve(&NameKey::new("missing")).is_err());
    }

    #[test]
    fn inner_sources_shadow_nothing_outward() {
        let outer = QueryScope::root();
        {
            let mut inner = outer.child();
            inner
                .register(Some(NameKey::new("o")), Some(NameKey::new("Orders")), Some(orders()))
                .unwrap();
            assert!(inner.resolve(&NameKey::new("o")).is_ok());
        }
        assert!(outer.resolve(&NameKey::new("o")).is_err());
    }

    #[test]
    fn target_resolves_by_alias_first() {
        let mut scope = QueryScope::root();
        scope
            .register(Some(NameKey::new("u")), Some(NameKey::new("Users")), Some(users()))
            .unwrap();

        let target = TargetScope::resolve(scope, vec![NameKey::new("u")], None).unwrap();
        assert_eq!(target.target().table, users());
        assert_eq!(target.target().alias, Some(NameKey::new("u")));
    }

    #[test]
    fn target_falls_back_to_unique_table_name() {
        let mut scope = QueryScope::root();
        scope
            .register(None, Some(NameKey::new("Users")), Some(users()))
            .unwrap();

        let target = TargetScope::resolve(scope, vec![NameKey::new("Users")], None).unwrap();
        assert_eq!(target.target().table, users());
        assert_eq!(target.target().alias, None);
    }

    #[test]
    fn target_builds_explicit_reference_when_unknown() {
        let scope = QueryScope::root();
        let target = TargetScope::resolve(
            scope,
            vec![NameKey::new("dbo"), NameKey::new("Users")],
            None,
        )
        .unwrap();

        assert_eq!(target.target().table, users());
        // The explicit target becomes visible to column resolution.
        assert!(target
            .query_scope()
            .resolve(&NameKey::new("Users"))
            .is_ok());
    }

    #[test]
    fn ident_from_parts_bounds() {
        assert!(ident_from_parts(vec![NameKey::new("a")]).is_ok());
        assert!(ident_from_parts(vec![
            NameKey::new("a"),
            NameKey::new("b"),
            NameKey::new("c"),
            NameKey::new("d"),
        ])
        .is_err());
    }
}
