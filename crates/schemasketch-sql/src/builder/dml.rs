//! INSERT / UPDATE / DELETE / MERGE building
//!
//! These statements use the statement-target scope flavor: the FROM/USING
//! sources are registered first, then the raw target token resolves
//! against them (alias, unique table name, explicit reference, in that
//! order). Nested derived tables and subqueries see the statement's
//! sources through the target scope's query-scope projection.

use super::exprs::{build_predicate, build_value, evidence_of};
use super::query::{build_query, build_table_factor, build_table_with_joins};
use super::{key, object_parts, BuildContext};
use crate::error::{BuildResult, ImportError};
use crate::scope::{ident_from_parts, QueryScope, TargetScope};
use schemasketch_core::{
    Assignment, ColumnExpr, DeleteStmt, InsertSource, InsertStmt, JoinKind, MatchedAction,
    MatchedOp, MergeStmt, NameKey, NotMatchedInsert, TableIdent, TableRef, TableSource,
    UpdateStmt, ValueExpr,
};
use sqlparser::ast;

/// Emit a column belonging to the statement target (single-part name) or a
/// qualified column resolved through the scope. Returns the identity hints
/// should land on, when the column is on a physical table.
fn build_target_column(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    target: &TableRef,
    parts: &[NameKey],
) -> BuildResult<(ColumnExpr, Option<TableIdent>)> {
    match parts {
        [name] => {
            ctx.inference.touch(&target.table, name);
            let column_type = if ctx.is_emit() {
                ctx.inference.column_type(&target.table, name)
            } else {
                None
            };
            Ok((
                ColumnExpr {
                    source: Some(target.qualifier().clone()),
                    name: name.clone(),
                    column_type,
                },
                Some(target.table.clone()),
            ))
        }
        [qualifier, name] => {
            let column = super::exprs::build_column(
                ctx,
                scope,
                Some(qualifier.clone()),
                name.clone(),
            )?;
            let identity = scope
                .resolve(qualifier)
                .ok()
                .and_then(|entry| entry.identity.clone());
            Ok((column, identity))
        }
        _ => Err(ImportError::unsupported(
            "assignment target with more than two name parts",
        )),
    }
}

/// Build SET assignments, hinting each assigned value's evidence onto its
/// target column the way INSERT VALUES does.
fn build_assignments(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    target: &TableRef,
    assignments: &[ast::Assignment],
) -> BuildResult<Vec<Assignment>> {
    assignments
        .iter()
        .map(|assignment| {
            let parts = match &assignment.target {
                ast::AssignmentTarget::ColumnName(name) => object_parts(name),
                ast::AssignmentTarget::Tuple(_) => {
                    return Err(ImportError::unsupported("tuple assignment target"))
                }
            };
            let (column, identity) = build_target_column(ctx, scope, target, &parts)?;
            let value = build_value(ctx, scope, &assignment.value)?;

            if let Some(identity) = identity {
                if value.is_null_literal() {
                    ctx.inference.mark_nullable(&identity, &column.name);
                } else if let Some((kind, length)) = evidence_of(ctx, scope, &value) {
                    ctx.inference.hint(&identity, &column.name, kind, length);
                }
            }

            Ok(Assignment { column, value })
        })
        .collect()
}

/// Extract the raw (parts, alias) of a plain table factor used as a
/// statement target.
fn raw_target(factor: &ast::TableFactor) -> BuildResult<(Vec<NameKey>, Option<NameKey>)> {
    match factor {
        ast::TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } => Ok((
            object_parts(name),
            alias.as_ref().map(|alias| key(&alias.name)),
        )),
        other => Err(ImportError::unsupported(format!(
            "statement target: {other}"
        ))),
    }
}

pub(crate) fn build_insert(
    ctx: &mut BuildContext,
    insert: &ast::Insert,
) -> BuildResult<InsertStmt> {
    if insert.returning.is_some() {
        return Err(ImportError::unsupported("INSERT with an output clause"));
    }
    if insert.columns.is_empty() {
        return Err(ImportError::unsupported(
            "INSERT without an explicit column list",
        ));
    }

    let ident = ident_from_parts(object_parts(&insert.table_name))?;
    let target = TableRef {
        table: ident.clone(),
        alias: insert.table_alias.as_ref().map(key),
    };

    let outer = QueryScope::root();
    let mut scope = outer.child();
    scope.register(
        target.alias.clone(),
        Some(ident.name.clone()),
        Some(ident.clone()),
    )?;

    let columns = insert
        .columns
        .iter()
        .map(|column| {
            build_target_column(ctx, &scope, &target, &[key(column)]).map(|(col, _)| col)
        })
        .collect::<BuildResult<Vec<_>>>()?;

    let source_query = insert
        .source
        .as_deref()
        .ok_or_else(|| ImportError::unsupported("INSERT without a source"))?;

    let source = match source_query.body.as_ref() {
        ast::SetExpr::Values(values) => {
            // VALUES rows cannot reference any source.
            let empty = QueryScope::root();
            let mut rows = Vec::with_capacity(values.rows.len());
            for row in &values.rows {
                if row.len() != columns.len() {
                    return Err(ImportError::resolution(format!(
                        "INSERT names {} columns but a row has {} values",
                        columns.len(),
                        row.len()
                    )));
                }
                let built: Vec<ValueExpr> = row
                    .iter()
                    .map(|expr| build_value(ctx, &empty, expr))
                    .collect::<BuildResult<_>>()?;

                // Each value's literal kind lands on its target column.
                for (column, value) in columns.iter().zip(&built) {
                    if value.is_null_literal() {
                        ctx.inference.mark_nullable(&ident, &column.name);
                    } else if let Some((kind, length)) = evidence_of(ctx, &empty, value) {
                        ctx.inference.hint(&ident, &column.name, kind, length);
                    }
                }
                rows.push(built);
            }
            InsertSource::Values(rows)
        }
        _ => {
            let root = QueryScope::root();
            InsertSource::Query(Box::new(build_query(ctx, &root, source_query)?))
        }
    };

    Ok(InsertStmt {
        target,
        columns,
        source,
    })
}

pub(crate) fn build_update(
    ctx: &mut BuildContext,
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    from: Option<&ast::TableWithJoins>,
    selection: Option<&ast::Expr>,
) -> BuildResult<UpdateStmt> {
    if !table.joins.is_empty() {
        return Err(ImportError::unsupported("joined UPDATE target"));
    }

    let outer = QueryScope::root();
    let mut scope = outer.child();
    let from_source = from
        .map(|table_with_joins| build_table_with_joins(ctx, &outer, &mut scope, table_with_joins))
        .transpose()?;

    let (parts, alias) = raw_target(&table.relation)?;
    let target_scope = TargetScope::resolve(scope, parts, alias)?;
    let target = target_scope.target().clone();

    let assignments = build_assignments(ctx, target_scope.query_scope(), &target, assignments)?;
    let filter = selection
        .map(|expr| build_predicate(ctx, target_scope.query_scope(), expr))
        .transpose()?;

    Ok(UpdateStmt {
        target,
        assignments,
        from: from_source,
        filter,
    })
}

pub(crate) fn build_delete(ctx: &mut BuildContext, delete: &ast::Delete) -> BuildResult<DeleteStmt> {
    if delete.returning.is_some() {
        return Err(ImportError::unsupported("DELETE with an output clause"));
    }
    if delete.limit.is_some() {
        return Err(ImportError::unsupported("DELETE with LIMIT"));
    }
    if !delete.order_by.is_empty() {
        return Err(ImportError::unsupported("DELETE with ORDER BY"));
    }

    let from_items: &[ast::TableWithJoins] = match &delete.from {
        ast::FromTable::WithFromKeyword(items) | ast::FromTable::WithoutKeyword(items) => items,
    };

    let outer = QueryScope::root();
    let mut scope = outer.child();

    let (target_scope, sources) = match delete.tables.as_slice() {
        // Plain `DELETE FROM T [USING ...]`.
        [] => {
            let [target_item] = from_items else {
                return Err(ImportError::unsupported("DELETE with multiple FROM items"));
            };
            if !target_item.joins.is_empty() {
                return Err(ImportError::unsupported("joined DELETE target"));
            }
            let (parts, alias) = raw_target(&target_item.relation)?;

            let mut sources = None;
            if let Some(using) = &delete.using {
                for table_with_joins in using {
                    let source =
                        build_table_with_joins(ctx, &outer, &mut scope, table_with_joins)?;
                    sources = Some(match sources {
                        None => source,
                        Some(acc) => TableSource::join(acc, JoinKind::Cross, source, None),
                    });
                }
            }

            (TargetScope::resolve(scope, parts, alias)?, sources)
        }
        // `DELETE t FROM ... JOIN ...`: the token resolves against the
        // FROM sources.
        [token] => {
            let token_parts = object_parts(token);

            let mut sources = None;
            for table_with_joins in from_items {
                let source = build_table_with_joins(ctx, &outer, &mut scope, table_with_joins)?;
                sources = Some(match sources {
                    None => source,
                    Some(acc) => TableSource::join(acc, JoinKind::Cross, source, None),
                });
            }

            (TargetScope::resolve(scope, token_parts, None)?, sources)
        }
        _ => return Err(ImportError::unsupported("multi-table DELETE")),
    };

    let filter = delete
        .selection
        .as_ref()
        .map(|expr| build_predicate(ctx, target_scope.query_scope(), expr))
        .transpose()?;

    Ok(DeleteStmt {
        target: target_scope.target().clone(),
        sources,
        filter,
    })
}

pub(crate) fn build_merge(
    ctx: &mut BuildContext,
    table: &ast::TableFactor,
    source: &ast::TableFactor,
    on: &ast::Expr,
    clauses: &[ast::MergeClause],
) -> BuildResult<MergeStmt> {
    let outer = QueryScope::root();
    let mut scope = outer.child();

    let target = match build_table_factor(ctx, &outer, &mut scope, table)? {
        TableSource::Table(table_ref) => table_ref,
        _ => {
            return Err(ImportError::unsupported(
                "MERGE target must be a physical table",
            ))
        }
    };
    // The USING source may be a derived table; it resolves through the
    // statement scope's query projection.
    let merge_source = build_table_factor(ctx, &outer, &mut scope, source)?;
    let on = build_predicate(ctx, &scope, on)?;

    let mut when_matched = None;
    let mut when_not_matched = None;
    let mut when_not_matched_by_source = None;

    for clause in clauses {
        let predicate = clause
            .predicate
            .as_ref()
            .map(|expr| build_predicate(ctx, &scope, expr))
            .transpose()?;

        match clause.clause_kind {
            ast::MergeClauseKind::Matched => {
                if when_matched.is_some() {
                    return Err(ImportError::unsupported("multiple WHEN MATCHED clauses"));
                }
                when_matched =
                    Some(build_matched_arm(ctx, &scope, &target, predicate, &clause.action)?);
            }
            ast::MergeClauseKind::NotMatched | ast::MergeClauseKind::NotMatchedByTarget => {
                if when_not_matched.is_some() {
                    return Err(ImportError::unsupported(
                        "multiple WHEN NOT MATCHED clauses",
                    ));
                }
                when_not_matched =
                    Some(build_insert_arm(ctx, &scope, &target, predicate, &clause.action)?);
            }
            ast::MergeClauseKind::NotMatchedBySource => {
                if when_not_matched_by_source.is_some() {
                    return Err(ImportError::unsupported(
                        "multiple WHEN NOT MATCHED BY SOURCE clauses",
                    ));
                }
                when_not_matched_by_source =
                    Some(build_matched_arm(ctx, &scope, &target, predicate, &clause.action)?);
            }
        }
    }

    Ok(MergeStmt {
        target,
        source: merge_source,
        on,
        when_matched,
        when_not_matched,
        when_not_matched_by_source,
    })
}

fn build_matched_arm(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    target: &TableRef,
    predicate: Option<schemasketch_core::BoolExpr>,
    action: &ast::MergeAction,
) -> BuildResult<MatchedAction> {
    let op = match action {
        ast::MergeAction::Update { assignments } => {
            MatchedOp::Update(build_assignments(ctx, scope, target, assignments)?)
        }
        ast::MergeAction::Delete => MatchedOp::Delete,
        other => {
            return Err(ImportError::unsupported(format!(
                "merge action {other:?} in a matched arm"
            )))
        }
    };
    Ok(MatchedAction {
        predicate,
        action: op,
    })
}

fn build_insert_arm(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    target: &TableRef,
    predicate: Option<schemasketch_core::BoolExpr>,
    action: &ast::MergeAction,
) -> BuildResult<NotMatchedInsert> {
    let ast::MergeAction::Insert(insert) = action else {
        return Err(ImportError::unsupported(
            "WHEN NOT MATCHED requires an INSERT action",
        ));
    };
    if insert.columns.is_empty() {
        return Err(ImportError::unsupported(
            "MERGE insert without an explicit column list",
        ));
    }

    let columns = insert
        .columns
        .iter()
        .map(|column| {
            build_target_column(ctx, scope, target, &[key(column)]).map(|(col, _)| col)
        })
        .collect::<BuildResult<Vec<_>>>()?;

    let row = match &insert.kind {
        ast::MergeInsertKind::Values(values) => match values.rows.as_slice() {
            [row] => row,
            rows => {
                return Err(ImportError::unsupported(format!(
                    "MERGE insert with {} rows",
                    rows.len()
                )))
            }
        },
        other => {
            return Err(ImportError::unsupported(format!(
                "merge insert source: {other:?}"
            )))
        }
    };
    if row.len() != columns.len() {
        return Err(ImportError::resolution(format!(
            "MERGE insert names {} columns but has {} values",
            columns.len(),
            row.len()
        )));
    }

    // Values may reference the USING source.
    let values: Vec<ValueExpr> = row
        .iter()
        .map(|expr| build_value(ctx, scope, expr))
        .collect::<BuildResult<_>>()?;

    for (column, value) in columns.iter().zip(&values) {
        if value.is_null_literal() {
            ctx.inference.mark_nullable(&target.table, &column.name);
        } else if let Some((kind, length)) = evidence_of(ctx, scope, value) {
            ctx.inference.hint(&target.table, &column.name, kind, length);
        }
    }

    Ok(NotMatchedInsert {
        predicate,
        columns,
        values,
    })
}
