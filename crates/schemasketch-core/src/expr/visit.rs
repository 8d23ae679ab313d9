//! Read-only traversal over the expression model
//!
//! Double dispatch: every node has an `accept` that hands itself to the
//! matching `visit_*` method, and each `visit_*` default delegates to the
//! `walk_*` function that descends into children. Traversal short-circuits
//! through [`ControlFlow`], which is what backs first-match search.
//!
//! Deferred CTE references are NOT descended into: a recursive CTE's body
//! contains a reference back to itself. Bodies are visited once, through
//! the WITH clause that declares them.

use crate::expr::predicate::BoolExpr;
use crate::expr::query::{QueryBody, QueryExpr, SelectExpr, SelectItem};
use crate::expr::source::TableSource;
use crate::expr::statement::{
    InsertSource, MatchedOp, Statement,
};
use crate::expr::value::ValueExpr;
use std::ops::ControlFlow;

/// Visitor over borrowed nodes. Implement the methods you care about; the
/// defaults walk the whole tree.
pub trait Visit<'ast> {
    fn visit_statement(&mut self, stmt: &'ast Statement) -> ControlFlow<()> {
        walk_statement(self, stmt)
    }

    fn visit_query(&mut self, query: &'ast QueryExpr) -> ControlFlow<()> {
        walk_query(self, query)
    }

    fn visit_select(&mut self, select: &'ast SelectExpr) -> ControlFlow<()> {
        walk_select(self, select)
    }

    fn visit_item(&mut self, item: &'ast SelectItem) -> ControlFlow<()> {
        walk_item(self, item)
    }

    fn visit_source(&mut self, source: &'ast TableSource) -> ControlFlow<()> {
        walk_source(self, source)
    }

    fn visit_predicate(&mut self, predicate: &'ast BoolExpr) -> ControlFlow<()> {
        walk_predicate(self, predicate)
    }

    fn visit_value(&mut self, value: &'ast ValueExpr) -> ControlFlow<()> {
        walk_value(self, value)
    }
}

impl Statement {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_statement(self)
    }
}

impl QueryExpr {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_query(self)
    }
}

impl SelectExpr {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_select(self)
    }
}

impl SelectItem {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_item(self)
    }
}

impl TableSource {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_source(self)
    }
}

impl BoolExpr {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_predicate(self)
    }
}

impl ValueExpr {
    pub fn accept<'ast, V: Visit<'ast> + ?Sized>(&'ast self, v: &mut V) -> ControlFlow<()> {
        v.visit_value(self)
    }
}

pub fn walk_statement<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    stmt: &'ast Statement,
) -> ControlFlow<()> {
    match stmt {
        Statement::Select(query) => v.visit_query(query),
        Statement::Insert(insert) => {
            match &insert.source {
                InsertSource::Values(rows) => {
                    for row in rows {
                        for value in row {
                            v.visit_value(value)?;
                        }
                    }
                }
                InsertSource::Query(query) => v.visit_query(query)?,
            }
            ControlFlow::Continue(())
        }
        Statement::Update(update) => {
            for assignment in &update.assignments {
                v.visit_value(&assignment.value)?;
            }
            if let Some(from) = &update.from {
                v.visit_source(from)?;
            }
            if let Some(filter) = &update.filter {
                v.visit_predicate(filter)?;
            }
            ControlFlow::Continue(())
        }
        Statement::Delete(delete) => {
            if let Some(sources) = &delete.sources {
                v.visit_source(sources)?;
            }
            if let Some(filter) = &delete.filter {
                v.visit_predicate(filter)?;
            }
            ControlFlow::Continue(())
        }
        Statement::Merge(merge) => {
            v.visit_source(&merge.source)?;
            v.visit_predicate(&merge.on)?;
            for arm in [&merge.when_matched, &merge.when_not_matched_by_source]
                .into_iter()
                .flatten()
            {
                if let Some(predicate) = &arm.predicate {
                    v.visit_predicate(predicate)?;
                }
                if let MatchedOp::Update(assignments) = &arm.action {
                    for assignment in assignments {
                        v.visit_value(&assignment.value)?;
                    }
                }
            }
            if let Some(insert) = &merge.when_not_matched {
                if let Some(predicate) = &insert.predicate {
                    v.visit_predicate(predicate)?;
                }
                for value in &insert.values {
                    v.visit_value(value)?;
                }
            }
            ControlFlow::Continue(())
        }
    }
}

pub fn walk_query<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    query: &'ast QueryExpr,
) -> ControlFlow<()> {
    for decl in &query.ctes {
        // An unfilled slot only occurs mid-build; nothing to walk yet.
        if let Ok(body) = decl.slot.body() {
            v.visit_query(body)?;
        }
    }
    walk_query_body(v, &query.body)?;
    for item in &query.order_by {
        v.visit_value(&item.expr)?;
    }
    ControlFlow::Continue(())
}

fn walk_query_body<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    body: &'ast QueryBody,
) -> ControlFlow<()> {
    match body {
        QueryBody::Select(select) => v.visit_select(select),
        QueryBody::SetOp { left, right, .. } => {
            walk_query_body(v, left)?;
            walk_query_body(v, right)
        }
    }
}

pub fn walk_select<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    select: &'ast SelectExpr,
) -> ControlFlow<()> {
    for item in &select.items {
        v.visit_item(item)?;
    }
    if let Some(from) = &select.from {
        v.visit_source(from)?;
    }
    if let Some(filter) = &select.filter {
        v.visit_predicate(filter)?;
    }
    for expr in &select.group_by {
        v.visit_value(expr)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_item<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    item: &'ast SelectItem,
) -> ControlFlow<()> {
    match item {
        SelectItem::Expr { expr, .. } => v.visit_value(expr),
        SelectItem::Wildcard | SelectItem::QualifiedWildcard(_) => ControlFlow::Continue(()),
    }
}

pub fn walk_source<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    source: &'ast TableSource,
) -> ControlFlow<()> {
    match source {
        TableSource::Table(_) | TableSource::Cte(_) => ControlFlow::Continue(()),
        TableSource::Derived { query, .. } => v.visit_query(query),
        TableSource::Join {
            left, right, on, ..
        } => {
            v.visit_source(left)?;
            v.visit_source(right)?;
            if let Some(on) = on {
                v.visit_predicate(on)?;
            }
            ControlFlow::Continue(())
        }
    }
}

pub fn walk_predicate<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    predicate: &'ast BoolExpr,
) -> ControlFlow<()> {
    match predicate {
        BoolExpr::Compare { left, right, .. } => {
            v.visit_value(left)?;
            v.visit_value(right)
        }
        BoolExpr::And(left, right) | BoolExpr::Or(left, right) => {
            v.visit_predicate(left)?;
            v.visit_predicate(right)
        }
        BoolExpr::Not(inner) => v.visit_predicate(inner),
        BoolExpr::IsNull { expr, .. } => v.visit_value(expr),
        BoolExpr::Like { expr, pattern, .. } => {
            v.visit_value(expr)?;
            v.visit_value(pattern)
        }
        BoolExpr::InValues { expr, values, .. } => {
            v.visit_value(expr)?;
            for value in values {
                v.visit_value(value)?;
            }
            ControlFlow::Continue(())
        }
        BoolExpr::InSubquery { expr, query, .. } => {
            v.visit_value(expr)?;
            v.visit_query(query)
        }
        BoolExpr::Between {
            expr, low, high, ..
        } => {
            v.visit_value(expr)?;
            v.visit_value(low)?;
            v.visit_value(high)
        }
        BoolExpr::Exists { query, .. } => v.visit_query(query),
    }
}

pub fn walk_value<'ast, V: Visit<'ast> + ?Sized>(
    v: &mut V,
    value: &'ast ValueExpr,
) -> ControlFlow<()> {
    match value {
        ValueExpr::Column(_) | ValueExpr::Literal(_) => ControlFlow::Continue(()),
        ValueExpr::Arith { left, right, .. } => {
            v.visit_value(left)?;
            v.visit_value(right)
        }
        ValueExpr::Negate(inner) => v.visit_value(inner),
        ValueExpr::Func(func) => {
            for arg in &func.args {
                v.visit_value(arg)?;
            }
            ControlFlow::Continue(())
        }
        ValueExpr::Case(case) => {
            for when in &case.whens {
                v.visit_predicate(&when.condition)?;
                v.visit_value(&when.result)?;
            }
            if let Some(else_value) = &case.else_value {
                v.visit_value(else_value)?;
            }
            ControlFlow::Continue(())
        }
        ValueExpr::Cast { expr, .. } => v.visit_value(expr),
        ValueExpr::Subquery(query) => v.visit_query(query),
    }
}

/// A borrowed node of any category, for flat structural export.
#[derive(Debug, Clone, Copy)]
pub enum Node<'ast> {
    Statement(&'ast Statement),
    Query(&'ast QueryExpr),
    Select(&'ast SelectExpr),
    Item(&'ast SelectItem),
    Source(&'ast TableSource),
    Predicate(&'ast BoolExpr),
    Value(&'ast ValueExpr),
}

/// Flatten a statement into its nodes in visit order.
pub fn collect_nodes(stmt: &Statement) -> Vec<Node<'_>> {
    struct Collector<'ast> {
        nodes: Vec<Node<'ast>>,
    }

    impl<'ast> Visit<'ast> for Collector<'ast> {
        fn visit_statement(&mut self, stmt: &'ast Statement) -> ControlFlow<()> {
            self.nodes.push(Node::Statement(stmt));
            walk_statement(self, stmt)
        }
        fn visit_query(&mut self, query: &'ast QueryExpr) -> ControlFlow<()> {
            self.nodes.push(Node::Query(query));
            walk_query(self, query)
        }
        fn visit_select(&mut self, select: &'ast SelectExpr) -> ControlFlow<()> {
            self.nodes.push(Node::Select(select));
            walk_select(self, select)
        }
        fn visit_item(&mut self, item: &'ast SelectItem) -> ControlFlow<()> {
            self.nodes.push(Node::Item(item));
            walk_item(self, item)
        }
        fn visit_source(&mut self, source: &'ast TableSource) -> ControlFlow<()> {
            self.nodes.push(Node::Source(source));
            walk_source(self, source)
        }
        fn visit_predicate(&mut self, predicate: &'ast BoolExpr) -> ControlFlow<()> {
            self.nodes.push(Node::Predicate(predicate));
            walk_predicate(self, predicate)
        }
        fn visit_value(&mut self, value: &'ast ValueExpr) -> ControlFlow<()> {
            self.nodes.push(Node::Value(value));
            walk_value(self, value)
        }
    }

    let mut collector = Collector { nodes: Vec::new() };
    let _ = stmt.accept(&mut collector);
    collector.nodes
}

/// First value expression matching the predicate, in visit order.
pub fn find_value<'ast>(
    stmt: &'ast Statement,
    matches: impl Fn(&ValueExpr) -> bool,
) -> Option<&'ast ValueExpr> {
    struct Finder<'ast, F> {
        matches: F,
        found: Option<&'ast ValueExpr>,
    }

    impl<'ast, F: Fn(&ValueExpr) -> bool> Visit<'ast> for Finder<'ast, F> {
        fn visit_value(&mut self, value: &'ast ValueExpr) -> ControlFlow<()> {
            if (self.matches)(value) {
                self.found = Some(value);
                return ControlFlow::Break(());
            }
            walk_value(self, value)
        }
    }

    let mut finder = Finder {
        matches,
        found: None,
    };
    let _ = stmt.accept(&mut finder);
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::query::{QueryBody, SelectExpr, SelectItem};
    use crate::expr::source::{TableRef, TableSource};
    use crate::expr::value::{ColumnExpr, Literal, ValueExpr};
    use crate::expr::predicate::CompareOp;
    use crate::name::TableIdent;

    fn sample() -> Statement {
        // SELECT a FROM T WHERE a = 1
        Statement::Select(QueryExpr::plain(QueryBody::Select(SelectExpr {
            distinct: false,
            top: None,
            items: vec![SelectItem::Expr {
                expr: ValueExpr::Column(ColumnExpr::qualified("T", "a")),
                alias: None,
            }],
            from: Some(TableSource::Table(TableRef::new(TableIdent::new("T")))),
            filter: Some(BoolExpr::Compare {
                op: CompareOp::Eq,
                left: ValueExpr::Column(ColumnExpr::qualified("T", "a")),
                right: ValueExpr::Literal(Literal::Int(1)),
            }),
            group_by: Vec::new(),
        })))
    }

    #[test]
    fn collects_every_node_once() {
        let stmt = sample();
        let nodes = collect_nodes(&stmt);

        let values = nodes
            .iter()
            .filter(|n| matches!(n, Node::Value(_)))
            .count();
        let sources = nodes
            .iter()
            .filter(|n| matches!(n, Node::Source(_)))
            .count();

        // a (item), a and 1 (comparison)
        assert_eq!(values, 3);
        assert_eq!(sources, 1);
    }

    #[test]
    fn find_value_stops_at_first_match() {
        let stmt = sample();
        let lit = find_value(&stmt, |v| matches!(v, ValueExpr::Literal(_))).unwrap();
        assert_eq!(lit, &ValueExpr::Literal(Literal::Int(1)));
    }

    #[test]
    fn find_value_misses_return_none() {
        let stmt = sample();
        assert!(find_value(&stmt, |v| matches!(v, ValueExpr::Func(_))).is_none());
    }
}
