//! Query building: SELECT blocks, set operations, WITH clauses, FROM trees
//!
//! Every SELECT block gets its own scope frame, chained to the enclosing
//! block's frame. Derived-table bodies chain to the block's *outer* scope
//! (siblings are not visible to each other), while WHERE-position
//! subqueries chain to the block's own frame and can correlate.

use super::exprs::{build_predicate, build_value};
use super::{key, object_parts, BuildContext};
use crate::cte::CteRegistry;
use crate::error::{BuildResult, ImportError};
use crate::scope::{ident_from_parts, QueryScope};
use schemasketch_core::{
    DeferredCte, JoinKind, OrderItem, QueryBody, QueryExpr, SelectExpr, SelectItem, SetOp,
    TableRef, TableSource,
};
use sqlparser::ast;
use std::sync::Arc;

/// Build a full query expression (WITH clause included).
pub(crate) fn build_query(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    query: &ast::Query,
) -> BuildResult<QueryExpr> {
    let cte_frame = match &query.with {
        Some(with) => {
            let mut names = Vec::with_capacity(with.cte_tables.len());
            for cte in &with.cte_tables {
                if !cte.alias.columns.is_empty() {
                    return Err(ImportError::unsupported(format!(
                        "CTE '{}' with a column list",
                        cte.alias.name
                    )));
                }
                names.push(key(&cte.alias.name));
            }

            let mut registry = CteRegistry::new();
            registry.register_names(names.clone())?;
            let frame = ctx.push_cte_frame(registry);

            // Bodies build after every name is registered, so a body can
            // reference itself or a sibling declared later.
            for (cte, name) in with.cte_tables.iter().zip(&names) {
                let body = build_query(ctx, outer, &cte.query)?;
                ctx.cte_frame(frame).fill_body(name, body)?;
            }
            Some(frame)
        }
        None => None,
    };

    let result = build_query_inner(ctx, outer, query, cte_frame);
    if cte_frame.is_some() {
        ctx.pop_cte_frame();
    }
    result
}

fn build_query_inner(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    query: &ast::Query,
    cte_frame: Option<usize>,
) -> BuildResult<QueryExpr> {
    if query.limit.is_some() {
        return Err(ImportError::unsupported("LIMIT"));
    }

    let (body, order_by) = match query.body.as_ref() {
        ast::SetExpr::Select(select) => {
            let (select_expr, frame) = build_select(ctx, outer, select)?;
            let order_by = build_order_by(ctx, &frame, query.order_by.as_ref())?;
            (QueryBody::Select(select_expr), order_by)
        }
        other => {
            let body = build_query_body(ctx, outer, other)?;
            if query
                .order_by
                .as_ref()
                .is_some_and(|order| !order.exprs.is_empty())
            {
                return Err(ImportError::unsupported("ORDER BY on a set operation"));
            }
            (body, Vec::new())
        }
    };

    let offset = query
        .offset
        .as_ref()
        .map(|offset| constant_u64(&offset.value, "OFFSET"))
        .transpose()?;
    let fetch = query.fetch.as_ref().map(build_fetch).transpose()?;

    let ctes = cte_frame
        .map(|frame| ctx.cte_frame(frame).declarations())
        .unwrap_or_default();

    Ok(QueryExpr {
        ctes,
        body,
        order_by,
        offset,
        fetch,
    })
}

fn build_query_body(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    set_expr: &ast::SetExpr,
) -> BuildResult<QueryBody> {
    match set_expr {
        ast::SetExpr::Select(select) => {
            let (select_expr, _) = build_select(ctx, outer, select)?;
            Ok(QueryBody::Select(select_expr))
        }
        ast::SetExpr::Query(inner) => {
            let has_clauses = inner.with.is_some()
                || inner
                    .order_by
                    .as_ref()
                    .is_some_and(|order| !order.exprs.is_empty())
                || inner.limit.is_some()
                || inner.offset.is_some()
                || inner.fetch.is_some();
            if has_clauses {
                return Err(ImportError::unsupported(
                    "parenthesized query with its own clauses inside a set operation",
                ));
            }
            build_query_body(ctx, outer, &inner.body)
        }
        ast::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            let op = match (op, set_quantifier) {
                (ast::SetOperator::Union, ast::SetQuantifier::All) => SetOp::UnionAll,
                (
                    ast::SetOperator::Union,
                    ast::SetQuantifier::None | ast::SetQuantifier::Distinct,
                ) => SetOp::Union,
                (
                    ast::SetOperator::Except,
                    ast::SetQuantifier::None | ast::SetQuantifier::Distinct,
                ) => SetOp::Except,
                (
                    ast::SetOperator::Intersect,
                    ast::SetQuantifier::None | ast::SetQuantifier::Distinct,
                ) => SetOp::Intersect,
                (op, quantifier) => {
                    return Err(ImportError::unsupported(format!(
                        "set operation {op} {quantifier}"
                    )))
                }
            };
            Ok(QueryBody::SetOp {
                op,
                left: Box::new(build_query_body(ctx, outer, left)?),
                right: Box::new(build_query_body(ctx, outer, right)?),
            })
        }
        ast::SetExpr::Values(_) => Err(ImportError::unsupported("VALUES outside INSERT")),
        other => Err(ImportError::unsupported(format!("query body: {other}"))),
    }
}

/// Build one SELECT block, returning its scope frame so the caller can
/// resolve ORDER BY items against it.
fn build_select<'o>(
    ctx: &mut BuildContext,
    outer: &'o QueryScope<'o>,
    select: &ast::Select,
) -> BuildResult<(SelectExpr, QueryScope<'o>)> {
    if select.having.is_some() {
        return Err(ImportError::unsupported("HAVING"));
    }
    if select.into.is_some() {
        return Err(ImportError::unsupported("SELECT INTO"));
    }
    let distinct = match &select.distinct {
        None => false,
        Some(ast::Distinct::Distinct) => true,
        Some(ast::Distinct::On(_)) => return Err(ImportError::unsupported("DISTINCT ON")),
    };
    let top = match &select.top {
        Some(top) => build_top(top)?,
        None => None,
    };

    let mut frame = outer.child();
    let from = build_from(ctx, outer, &mut frame, &select.from)?;

    let items = select
        .projection
        .iter()
        .map(|item| build_select_item(ctx, &frame, item))
        .collect::<BuildResult<Vec<_>>>()?;

    let filter = select
        .selection
        .as_ref()
        .map(|expr| build_predicate(ctx, &frame, expr))
        .transpose()?;

    let group_by = match &select.group_by {
        ast::GroupByExpr::Expressions(exprs, _) => exprs
            .iter()
            .map(|expr| build_value(ctx, &frame, expr))
            .collect::<BuildResult<Vec<_>>>()?,
        ast::GroupByExpr::All(_) => return Err(ImportError::unsupported("GROUP BY ALL")),
    };

    Ok((
        SelectExpr {
            distinct,
            top,
            items,
            from,
            filter,
            group_by,
        },
        frame,
    ))
}

fn build_top(top: &ast::Top) -> BuildResult<Option<u64>> {
    if top.percent {
        return Err(ImportError::unsupported("TOP PERCENT"));
    }
    if top.with_ties {
        return Err(ImportError::unsupported("TOP WITH TIES"));
    }
    match &top.quantity {
        None => Ok(None),
        Some(ast::TopQuantity::Constant(n)) => Ok(Some(*n)),
        Some(ast::TopQuantity::Expr(expr)) => constant_u64(expr, "TOP").map(Some),
    }
}

fn build_select_item(
    ctx: &mut BuildContext,
    frame: &QueryScope<'_>,
    item: &ast::SelectItem,
) -> BuildResult<SelectItem> {
    match item {
        ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
            expr: build_value(ctx, frame, expr)?,
            alias: None,
        }),
        ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
            expr: build_value(ctx, frame, expr)?,
            alias: Some(key(alias)),
        }),
        ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        ast::SelectItem::QualifiedWildcard(name, _) => {
            let parts = object_parts(name);
            match parts.as_slice() {
                [qualifier] => {
                    // The qualifier must name a visible source.
                    frame.resolve(qualifier)?;
                    Ok(SelectItem::QualifiedWildcard(qualifier.clone()))
                }
                _ => Err(ImportError::unsupported(format!(
                    "qualified wildcard '{name}.*'"
                ))),
            }
        }
    }
}

/// Build the FROM clause, folding comma-separated items into cross joins.
pub(super) fn build_from(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    frame: &mut QueryScope<'_>,
    from: &[ast::TableWithJoins],
) -> BuildResult<Option<TableSource>> {
    let mut result: Option<TableSource> = None;
    for table_with_joins in from {
        let source = build_table_with_joins(ctx, outer, frame, table_with_joins)?;
        result = Some(match result {
            None => source,
            Some(acc) => acc.join(JoinKind::Cross, source, None),
        });
    }
    Ok(result)
}

pub(super) fn build_table_with_joins(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    frame: &mut QueryScope<'_>,
    table_with_joins: &ast::TableWithJoins,
) -> BuildResult<TableSource> {
    let mut source = build_table_factor(ctx, outer, frame, &table_with_joins.relation)?;

    for join in &table_with_joins.joins {
        let right = build_table_factor(ctx, outer, frame, &join.relation)?;
        let (kind, constraint) = match &join.join_operator {
            ast::JoinOperator::Inner(constraint) => (JoinKind::Inner, Some(constraint)),
            ast::JoinOperator::LeftOuter(constraint) => (JoinKind::Left, Some(constraint)),
            ast::JoinOperator::RightOuter(constraint) => (JoinKind::Right, Some(constraint)),
            ast::JoinOperator::FullOuter(constraint) => (JoinKind::Full, Some(constraint)),
            ast::JoinOperator::CrossJoin => (JoinKind::Cross, None),
            other => {
                return Err(ImportError::unsupported(format!("join type: {other:?}")))
            }
        };
        // Both sides are registered before the ON condition resolves.
        let on = match constraint {
            Some(ast::JoinConstraint::On(expr)) => Some(build_predicate(ctx, frame, expr)?),
            Some(ast::JoinConstraint::None) | None => None,
            Some(ast::JoinConstraint::Using(_)) => {
                return Err(ImportError::unsupported("JOIN USING"))
            }
            Some(ast::JoinConstraint::Natural) => {
                return Err(ImportError::unsupported("NATURAL JOIN"))
            }
        };
        source = source.join(kind, right, on);
    }

    Ok(source)
}

/// Build one table reference and register it in the frame.
pub(super) fn build_table_factor(
    ctx: &mut BuildContext,
    outer: &QueryScope<'_>,
    frame: &mut QueryScope<'_>,
    factor: &ast::TableFactor,
) -> BuildResult<TableSource> {
    match factor {
        ast::TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                return Err(ImportError::unsupported(format!(
                    "table-valued function '{name}'"
                )));
            }
            let alias_key = match alias {
                Some(alias) => {
                    if !alias.columns.is_empty() {
                        return Err(ImportError::unsupported("table alias with a column list"));
                    }
                    Some(key(&alias.name))
                }
                None => None,
            };

            let parts = object_parts(name);

            // An unqualified name matching a registered CTE resolves to a
            // deferred placeholder, not a physical table.
            if parts.len() == 1 {
                if let Some(slot) = ctx.lookup_cte(&parts[0]) {
                    let slot = Arc::clone(slot);
                    frame.register(alias_key.clone(), Some(parts[0].clone()), None)?;
                    return Ok(TableSource::Cte(DeferredCte::new(slot, alias_key)));
                }
            }

            let ident = ident_from_parts(parts)?;
            frame.register(
                alias_key.clone(),
                Some(ident.name.clone()),
                Some(ident.clone()),
            )?;
            Ok(TableSource::Table(TableRef {
                table: ident,
                alias: alias_key,
            }))
        }
        ast::TableFactor::Derived {
            lateral,
            subquery,
            alias,
        } => {
            if *lateral {
                return Err(ImportError::unsupported("LATERAL derived table"));
            }
            let alias = alias
                .as_ref()
                .ok_or_else(|| ImportError::unsupported("derived table without an alias"))?;
            if !alias.columns.is_empty() {
                return Err(ImportError::unsupported("derived table with a column list"));
            }
            let alias_key = key(&alias.name);

            // The body sees the enclosing scope, not its siblings.
            let query = build_query(ctx, outer, subquery)?;
            frame.register(Some(alias_key.clone()), None, None)?;
            Ok(TableSource::Derived {
                query: Box::new(query),
                alias: alias_key,
            })
        }
        other => Err(ImportError::unsupported(format!(
            "table reference: {other}"
        ))),
    }
}

fn build_order_by(
    ctx: &mut BuildContext,
    frame: &QueryScope<'_>,
    order_by: Option<&ast::OrderBy>,
) -> BuildResult<Vec<OrderItem>> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };
    order_by
        .exprs
        .iter()
        .map(|item| {
            let ast::OrderByExpr {
                expr,
                asc,
                nulls_first,
                ..
            } = item;
            if nulls_first.is_some() {
                return Err(ImportError::unsupported("NULLS FIRST/LAST"));
            }
            Ok(OrderItem {
                expr: build_value(ctx, frame, expr)?,
                descending: matches!(asc, Some(false)),
            })
        })
        .collect()
}

fn build_fetch(fetch: &ast::Fetch) -> BuildResult<u64> {
    if fetch.with_ties {
        return Err(ImportError::unsupported("FETCH WITH TIES"));
    }
    if fetch.percent {
        return Err(ImportError::unsupported("FETCH PERCENT"));
    }
    match &fetch.quantity {
        Some(expr) => constant_u64(expr, "FETCH"),
        // FETCH FIRST ROW ONLY
        None => Ok(1),
    }
}

fn constant_u64(expr: &ast::Expr, clause: &str) -> BuildResult<u64> {
    if let ast::Expr::Value(ast::Value::Number(text, _)) = expr {
        if let Ok(n) = text.parse::<u64>() {
            return Ok(n);
        }
    }
    Err(ImportError::unsupported(format!(
        "{clause} with a non-constant row count"
    )))
}
