//! Whole-tree rewriting
//!
//! Rewriting is allocation-based: every method consumes a node and returns
//! a new one, with the defaults rebuilding each variant from rewritten
//! children. Shared subtrees behind deferred CTE slots are left as-is:
//! slots are filled once and never mutated, and a recursive CTE's body
//! points back at its own slot.

use crate::expr::predicate::BoolExpr;
use crate::expr::query::{OrderItem, QueryBody, QueryExpr, SelectExpr, SelectItem};
use crate::expr::source::TableSource;
use crate::expr::statement::{
    Assignment, DeleteStmt, InsertSource, InsertStmt, MatchedAction, MatchedOp, MergeStmt,
    NotMatchedInsert, Statement, UpdateStmt,
};
use crate::expr::value::{CaseExpr, CaseWhen, FuncExpr, ValueExpr};

/// Rewriter over owned nodes. Override the methods you care about and call
/// the matching `rewrite_*` walk function inside for the recursion.
pub trait Rewrite {
    fn rewrite_statement(&mut self, stmt: Statement) -> Statement {
        rewrite_statement(self, stmt)
    }

    fn rewrite_query(&mut self, query: QueryExpr) -> QueryExpr {
        rewrite_query(self, query)
    }

    fn rewrite_select(&mut self, select: SelectExpr) -> SelectExpr {
        rewrite_select(self, select)
    }

    fn rewrite_item(&mut self, item: SelectItem) -> SelectItem {
        rewrite_item(self, item)
    }

    fn rewrite_source(&mut self, source: TableSource) -> TableSource {
        rewrite_source(self, source)
    }

    fn rewrite_predicate(&mut self, predicate: BoolExpr) -> BoolExpr {
        rewrite_predicate(self, predicate)
    }

    fn rewrite_value(&mut self, value: ValueExpr) -> ValueExpr {
        rewrite_value(self, value)
    }
}

pub fn rewrite_statement<R: Rewrite + ?Sized>(r: &mut R, stmt: Statement) -> Statement {
    match stmt {
        Statement::Select(query) => Statement::Select(r.rewrite_query(query)),
        Statement::Insert(insert) => Statement::Insert(InsertStmt {
            target: insert.target,
            columns: insert.columns,
            source: match insert.source {
                InsertSource::Values(rows) => InsertSource::Values(
                    rows.into_iter()
                        .map(|row| row.into_iter().map(|v| r.rewrite_value(v)).collect())
                        .collect(),
                ),
                InsertSource::Query(query) => {
                    InsertSource::Query(Box::new(r.rewrite_query(*query)))
                }
            },
        }),
        Statement::Update(update) => Statement::Update(UpdateStmt {
            target: update.target,
            assignments: update
                .assignments
                .into_iter()
                .map(|a| rewrite_assignment(r, a))
                .collect(),
            from: update.from.map(|f| r.rewrite_source(f)),
            filter: update.filter.map(|p| r.rewrite_predicate(p)),
        }),
        Statement::Delete(delete) => Statement::Delete(DeleteStmt {
            target: delete.target,
            sources: delete.sources.map(|s| r.rewrite_source(s)),
            filter: delete.filter.map(|p| r.rewrite_predicate(p)),
        }),
        Statement::Merge(merge) => Statement::Merge(MergeStmt {
            target: merge.target,
            source: r.rewrite_source(merge.source),
            on: r.rewrite_predicate(merge.on),
            when_matched: merge.when_matched.map(|a| rewrite_matched(r, a)),
            when_not_matched: merge.when_not_matched.map(|a| NotMatchedInsert {
                predicate: a.predicate.map(|p| r.rewrite_predicate(p)),
                columns: a.columns,
                values: a.values.into_iter().map(|v| r.rewrite_value(v)).collect(),
            }),
            when_not_matched_by_source: merge
                .when_not_matched_by_source
                .map(|a| rewrite_matched(r, a)),
        }),
    }
}

fn rewrite_assignment<R: Rewrite + ?Sized>(r: &mut R, assignment: Assignment) -> Assignment {
    Assignment {
        column: assignment.column,
        value: r.rewrite_value(assignment.value),
    }
}

fn rewrite_matched<R: Rewrite + ?Sized>(r: &mut R, arm: MatchedAction) -> MatchedAction {
    MatchedAction {
        predicate: arm.predicate.map(|p| r.rewrite_predicate(p)),
        action: match arm.action {
            MatchedOp::Update(assignments) => MatchedOp::Update(
                assignments
                    .into_iter()
                    .map(|a| rewrite_assignment(r, a))
                    .collect(),
            ),
            MatchedOp::Delete => MatchedOp::Delete,
        },
    }
}

pub fn rewrite_query<R: Rewrite + ?Sized>(r: &mut R, query: QueryExpr) -> QueryExpr {
    QueryExpr {
        ctes: query.ctes,
        body: rewrite_query_body(r, query.body),
        order_by: query
            .order_by
            .into_iter()
            .map(|item| OrderItem {
                expr: r.rewrite_value(item.expr),
                descending: item.descending,
            })
            .collect(),
        offset: query.offset,
        fetch: query.fetch,
    }
}

fn rewrite_query_body<R: Rewrite + ?Sized>(r: &mut R, body: QueryBody) -> QueryBody {
    match body {
        QueryBody::Select(select) => QueryBody::Select(r.rewrite_select(select)),
        QueryBody::SetOp { op, left, right } => QueryBody::SetOp {
            op,
            left: Box::new(rewrite_query_body(r, *left)),
            right: Box::new(rewrite_query_body(r, *right)),
        },
    }
}

pub fn rewrite_select<R: Rewrite + ?Sized>(r: &mut R, select: SelectExpr) -> SelectExpr {
    SelectExpr {
        distinct: select.distinct,
        top: select.top,
        items: select
            .items
            .into_iter()
            .map(|item| r.rewrite_item(item))
            .collect(),
        from: select.from.map(|f| r.rewrite_source(f)),
        filter: select.filter.map(|p| r.rewrite_predicate(p)),
        group_by: select
            .group_by
            .into_iter()
            .map(|e| r.rewrite_value(e))
            .collect(),
    }
}

pub fn rewrite_item<R: Rewrite + ?Sized>(r: &mut R, item: SelectItem) -> SelectItem {
    match item {
        SelectItem::Expr { expr, alias } => SelectItem::Expr {
            expr: r.rewrite_value(expr),
            alias,
        },
        wildcard => wildcard,
    }
}

pub fn rewrite_source<R: Rewrite + ?Sized>(r: &mut R, source: TableSource) -> TableSource {
    match source {
        leaf @ (TableSource::Table(_) | TableSource::Cte(_)) => leaf,
        TableSource::Derived { query, alias } => TableSource::Derived {
            query: Box::new(r.rewrite_query(*query)),
            alias,
        },
        TableSource::Join {
            kind,
            left,
            right,
            on,
        } => TableSource::Join {
            kind,
            left: Box::new(r.rewrite_source(*left)),
            right: Box::new(r.rewrite_source(*right)),
            on: on.map(|p| r.rewrite_predicate(p)),
        },
    }
}

pub fn rewrite_predicate<R: Rewrite + ?Sized>(r: &mut R, predicate: BoolExpr) -> BoolExpr {
    match predicate {
        BoolExpr::Compare { op, left, right } => BoolExpr::Compare {
            op,
            left: r.rewrite_value(left),
            right: r.rewrite_value(right),
        },
        BoolExpr::And(left, right) => BoolExpr::And(
            Box::new(r.rewrite_predicate(*left)),
            Box::new(r.rewrite_predicate(*right)),
        ),
        BoolExpr::Or(left, right) => BoolExpr::Or(
            Box::new(r.rewrite_predicate(*left)),
            Box::new(r.rewrite_predicate(*right)),
        ),
        BoolExpr::Not(inner) => BoolExpr::Not(Box::new(r.rewrite_predicate(*inner))),
        BoolExpr::IsNull { expr, negated } => BoolExpr::IsNull {
            expr: r.rewrite_value(expr),
            negated,
        },
        BoolExpr::Like {
            expr,
            pattern,
            negated,
        } => BoolExpr::Like {
            expr: r.rewrite_value(expr),
            pattern: r.rewrite_value(pattern),
            negated,
        },
        BoolExpr::InValues {
            expr,
            values,
            negated,
        } => BoolExpr::InValues {
            expr: r.rewrite_value(expr),
            values: values.into_iter().map(|v| r.rewrite_value(v)).collect(),
            negated,
        },
        BoolExpr::InSubquery {
            expr,
            query,
            negated,
        } => BoolExpr::InSubquery {
            expr: r.rewrite_value(expr),
            query: Box::new(r.rewrite_query(*query)),
            negated,
        },
        BoolExpr::Between {
            expr,
            low,
            high,
            negated,
        } => BoolExpr::Between {
            expr: r.rewrite_value(expr),
            low: r.rewrite_value(low),
            high: r.rewrite_value(high),
            negated,
        },
        BoolExpr::Exists { query, negated } => BoolExpr::Exists {
            query: Box::new(r.rewrite_query(*query)),
            negated,
        },
    }
}

pub fn rewrite_value<R: Rewrite + ?Sized>(r: &mut R, value: ValueExpr) -> ValueExpr {
    match value {
        leaf @ (ValueExpr::Column(_) | ValueExpr::Literal(_)) => leaf,
        ValueExpr::Arith { op, left, right } => ValueExpr::Arith {
            op,
            left: Box::new(r.rewrite_value(*left)),
            right: Box::new(r.rewrite_value(*right)),
        },
        ValueExpr::Negate(inner) => ValueExpr::Negate(Box::new(r.rewrite_value(*inner))),
        ValueExpr::Func(func) => ValueExpr::Func(FuncExpr {
            name: func.name,
            args: func.args.into_iter().map(|a| r.rewrite_value(a)).collect(),
            wildcard: func.wildcard,
            distinct: func.distinct,
        }),
        ValueExpr::Case(case) => ValueExpr::Case(CaseExpr {
            whens: case
                .whens
                .into_iter()
                .map(|when| CaseWhen {
                    condition: r.rewrite_predicate(when.condition),
                    result: r.rewrite_value(when.result),
                })
                .collect(),
            else_value: case
                .else_value
                .map(|e| Box::new(r.rewrite_value(*e))),
        }),
        ValueExpr::Cast { expr, to } => ValueExpr::Cast {
            expr: Box::new(r.rewrite_value(*expr)),
            to,
        },
        ValueExpr::Subquery(query) => ValueExpr::Subquery(Box::new(r.rewrite_query(*query))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::predicate::CompareOp;
    use crate::expr::query::{QueryBody, SelectExpr, SelectItem};
    use crate::expr::source::{TableRef, TableSource};
    use crate::expr::value::{ColumnExpr, Literal};
    use crate::name::TableIdent;

    #[test]
    fn rewrites_literals_without_touching_original_shape() {
        struct BumpInts;

        impl Rewrite for BumpInts {
            fn rewrite_value(&mut self, value: ValueExpr) -> ValueExpr {
                match value {
                    ValueExpr::Literal(Literal::Int(n)) => {
                        ValueExpr::Literal(Literal::Int(n + 1))
                    }
                    other => rewrite_value(self, other),
                }
            }
        }

        let stmt = Statement::Select(QueryExpr::plain(QueryBody::Select(SelectExpr {
            distinct: false,
            top: None,
            items: vec![SelectItem::Expr {
                expr: ValueExpr::Literal(Literal::Int(41)),
                alias: None,
            }],
            from: Some(TableSource::Table(TableRef::new(TableIdent::new("T")))),
            filter: Some(BoolExpr::Compare {
                op: CompareOp::Eq,
                left: ValueExpr::Column(ColumnExpr::qualified("T", "a")),
                right: ValueExpr::Literal(Literal::Int(9)),
            }),
            group_by: Vec::new(),
        })));

        let rewritten = BumpInts.rewrite_statement(stmt);

        let Statement::Select(query) = &rewritten else {
            panic!("still a select");
        };
        let select = query.as_select().unwrap();
        assert_eq!(
            select.items[0],
            SelectItem::Expr {
                expr: ValueExpr::Literal(Literal::Int(42)),
                alias: None,
            }
        );
        assert_eq!(
            select.filter,
            Some(BoolExpr::Compare {
                op: CompareOp::Eq,
                left: ValueExpr::Column(ColumnExpr::qualified("T", "a")),
                right: ValueExpr::Literal(Literal::Int(10)),
            })
        );
    }
}
