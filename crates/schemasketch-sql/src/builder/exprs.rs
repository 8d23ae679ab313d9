//! Value and predicate building
//!
//! The grammatical tree has one expression type; the model splits it into
//! scalar values and boolean predicates, so the builder picks the entry
//! point from context (projection and arguments are values, WHERE/ON/HAVING
//! positions are predicates). All inference trigger rules live here: both
//! passes run them, and the merge rules in the inference table keep the
//! second application a no-op.

use super::{build_query, key, object_parts, BuildContext};
use crate::error::{BuildResult, ImportError};
use crate::inference::{literal_evidence, merge_evidence};
use crate::scope::QueryScope;
use schemasketch_core::{
    ArithOp, BoolExpr, CaseExpr, CaseWhen, ColumnExpr, ColumnKind, ColumnType, CompareOp,
    FuncExpr, Literal, NameKey, TableIdent, ValueExpr,
};
use sqlparser::ast;

/// Resolve and emit a column reference, registering it with the inference
/// engine when it lands on a physical table.
pub(crate) fn build_column(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    qualifier: Option<NameKey>,
    name: NameKey,
) -> BuildResult<ColumnExpr> {
    let entry = match &qualifier {
        Some(token) => scope.resolve(token)?,
        None => scope.resolve_single(name.as_str())?,
    };

    if let Some(identity) = scope.identity_of(entry) {
        ctx.inference.touch(identity, &name);
    }

    let column_type = if ctx.is_emit() {
        entry
            .identity
            .as_ref()
            .and_then(|identity| ctx.inference.column_type(identity, &name))
    } else {
        None
    };

    Ok(ColumnExpr {
        source: entry.qualifier.clone(),
        name,
        column_type,
    })
}

/// Physical-table columns referenced by a built value expression, not
/// descending into subqueries (those hint within their own scope).
fn collect_physical_columns(
    scope: &QueryScope<'_>,
    expr: &ValueExpr,
    out: &mut Vec<(TableIdent, NameKey)>,
) {
    match expr {
        ValueExpr::Column(col) => {
            let entry = match &col.source {
                Some(token) => scope.resolve(token).ok(),
                None => scope.resolve_single(col.name.as_str()).ok(),
            };
            if let Some(identity) = entry.and_then(|e| e.identity.clone()) {
                out.push((identity, col.name.clone()));
            }
        }
        ValueExpr::Arith { left, right, .. } => {
            collect_physical_columns(scope, left, out);
            collect_physical_columns(scope, right, out);
        }
        ValueExpr::Negate(inner) | ValueExpr::Cast { expr: inner, .. } => {
            collect_physical_columns(scope, inner, out);
        }
        ValueExpr::Func(func) => {
            for arg in &func.args {
                collect_physical_columns(scope, arg, out);
            }
        }
        ValueExpr::Case(case) => {
            for when in &case.whens {
                collect_physical_columns(scope, &when.result, out);
            }
            if let Some(else_value) = &case.else_value {
                collect_physical_columns(scope, else_value, out);
            }
        }
        ValueExpr::Literal(_) | ValueExpr::Subquery(_) => {}
    }
}

/// Apply kind evidence to every physical column referenced by `expr`.
pub(crate) fn hint_columns(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    expr: &ValueExpr,
    kind: ColumnKind,
    length: Option<u32>,
) {
    let mut columns = Vec::new();
    collect_physical_columns(scope, expr, &mut columns);
    for (identity, name) in columns {
        ctx.inference.hint(&identity, &name, kind, length);
    }
}

/// Mark every physical column referenced by `expr` nullable.
pub(crate) fn mark_columns_nullable(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    expr: &ValueExpr,
) {
    let mut columns = Vec::new();
    collect_physical_columns(scope, expr, &mut columns);
    for (identity, name) in columns {
        ctx.inference.mark_nullable(&identity, &name);
    }
}

/// Kind evidence a built expression carries: a literal's kind, a column's
/// previously inferred kind, or a cast's target.
pub(crate) fn evidence_of(
    ctx: &BuildContext,
    scope: &QueryScope<'_>,
    expr: &ValueExpr,
) -> Option<(ColumnKind, Option<u32>)> {
    match expr {
        ValueExpr::Literal(lit) => literal_evidence(lit),
        ValueExpr::Column(col) => {
            let entry = match &col.source {
                Some(token) => scope.resolve(token).ok()?,
                None => scope.resolve_single(col.name.as_str()).ok()?,
            };
            let identity = entry.identity.as_ref()?;
            ctx.inference.kind_evidence(identity, &col.name)
        }
        ValueExpr::Cast { to, .. } => {
            let length = match to {
                ColumnType::String { length } => *length,
                _ => None,
            };
            Some((ColumnKind::of_type(to), length))
        }
        ValueExpr::Negate(inner) => evidence_of(ctx, scope, inner),
        _ => None,
    }
}

/// Build a scalar value expression.
pub(crate) fn build_value(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    expr: &ast::Expr,
) -> BuildResult<ValueExpr> {
    match expr {
        ast::Expr::Identifier(ident) => Ok(ValueExpr::Column(build_column(
            ctx,
            scope,
            None,
            key(ident),
        )?)),
        ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [qualifier, column] => Ok(ValueExpr::Column(build_column(
                ctx,
                scope,
                Some(key(qualifier)),
                key(column),
            )?)),
            parts => Err(ImportError::unsupported(format!(
                "column reference with {} name parts",
                parts.len()
            ))),
        },
        ast::Expr::Value(value) => Ok(ValueExpr::Literal(build_literal(value)?)),
        ast::Expr::BinaryOp { left, op, right } => build_arith(ctx, scope, left, op, right),
        ast::Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => Ok(ValueExpr::Negate(Box::new(build_value(ctx, scope, expr)?))),
        ast::Expr::UnaryOp {
            op: ast::UnaryOperator::Plus,
            expr,
        } => build_value(ctx, scope, expr),
        ast::Expr::Nested(inner) => build_value(ctx, scope, inner),
        ast::Expr::Function(func) => build_function(ctx, scope, func),
        ast::Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if operand.is_some() {
                return Err(ImportError::unsupported("simple CASE with an operand"));
            }
            if conditions.len() != results.len() {
                return Err(ImportError::Internal(
                    "CASE with mismatched WHEN/THEN arms".to_string(),
                ));
            }
            let whens = conditions
                .iter()
                .zip(results)
                .map(|(condition, result)| {
                    Ok(CaseWhen {
                        condition: build_predicate(ctx, scope, condition)?,
                        result: build_value(ctx, scope, result)?,
                    })
                })
                .collect::<BuildResult<Vec<_>>>()?;
            let else_value = else_result
                .as_ref()
                .map(|e| build_value(ctx, scope, e).map(Box::new))
                .transpose()?;
            Ok(ValueExpr::Case(CaseExpr { whens, else_value }))
        }
        ast::Expr::Cast {
            expr, data_type, ..
        } => {
            let inner = build_value(ctx, scope, expr)?;
            let to = map_data_type(data_type)?;
            let length = match to {
                ColumnType::String { length } => length,
                _ => None,
            };
            hint_columns(ctx, scope, &inner, ColumnKind::of_type(&to), length);
            Ok(ValueExpr::Cast {
                expr: Box::new(inner),
                to,
            })
        }
        ast::Expr::Subquery(query) => Ok(ValueExpr::Subquery(Box::new(build_query(
            ctx, scope, query,
        )?))),
        other => Err(ImportError::unsupported(format!("expression: {other}"))),
    }
}

fn build_arith(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    left: &ast::Expr,
    op: &ast::BinaryOperator,
    right: &ast::Expr,
) -> BuildResult<ValueExpr> {
    let arith = match op {
        ast::BinaryOperator::Plus => ArithOp::Add,
        ast::BinaryOperator::Minus => ArithOp::Sub,
        ast::BinaryOperator::Multiply => ArithOp::Mul,
        ast::BinaryOperator::Divide => ArithOp::Div,
        ast::BinaryOperator::Modulo => ArithOp::Mod,
        ast::BinaryOperator::StringConcat => ArithOp::Concat,
        other => {
            return Err(ImportError::unsupported(format!(
                "operator {other} in a value position"
            )))
        }
    };

    let left = build_value(ctx, scope, left)?;
    let right = build_value(ctx, scope, right)?;

    let mut decimal_operand = false;
    let mut text_length = None;
    for side in [&left, &right] {
        match side.as_literal() {
            Some(Literal::Decimal(_)) => decimal_operand = true,
            Some(Literal::Str(s)) => {
                text_length = literal_evidence(&Literal::Str(s.clone())).and_then(|(_, l)| l)
            }
            _ => {}
        }
    }
    if decimal_operand {
        hint_columns(ctx, scope, &left, ColumnKind::Decimal, None);
        hint_columns(ctx, scope, &right, ColumnKind::Decimal, None);
    }
    if text_length.is_some() && matches!(arith, ArithOp::Add | ArithOp::Concat) {
        hint_columns(ctx, scope, &left, ColumnKind::Text, text_length);
        hint_columns(ctx, scope, &right, ColumnKind::Text, text_length);
    }

    Ok(ValueExpr::Arith {
        op: arith,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn build_function(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    func: &ast::Function,
) -> BuildResult<ValueExpr> {
    if func.over.is_some() {
        return Err(ImportError::unsupported("window function"));
    }
    let mut parts = object_parts(&func.name);
    if parts.len() != 1 {
        return Err(ImportError::unsupported(format!(
            "qualified function name '{}'",
            func.name
        )));
    }
    let name = parts.remove(0);

    let mut args = Vec::new();
    let mut wildcard = false;
    let mut distinct = false;
    match &func.args {
        ast::FunctionArguments::None => {}
        ast::FunctionArguments::Subquery(_) => {
            return Err(ImportError::unsupported("subquery as a function argument"))
        }
        ast::FunctionArguments::List(list) => {
            distinct = matches!(
                list.duplicate_treatment,
                Some(ast::DuplicateTreatment::Distinct)
            );
            if !list.clauses.is_empty() {
                return Err(ImportError::unsupported(format!(
                    "argument clauses on function '{name}'"
                )));
            }
            for arg in &list.args {
                match arg {
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(expr)) => {
                        args.push(build_value(ctx, scope, expr)?)
                    }
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard) => wildcard = true,
                    other => {
                        return Err(ImportError::unsupported(format!(
                            "function argument: {other}"
                        )))
                    }
                }
            }
        }
    }

    Ok(ValueExpr::Func(FuncExpr {
        name,
        args,
        wildcard,
        distinct,
    }))
}

/// Build a boolean predicate.
pub(crate) fn build_predicate(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    expr: &ast::Expr,
) -> BuildResult<BoolExpr> {
    match expr {
        ast::Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => Ok(build_predicate(ctx, scope, left)?
                .and(build_predicate(ctx, scope, right)?)),
            ast::BinaryOperator::Or => Ok(build_predicate(ctx, scope, left)?
                .or(build_predicate(ctx, scope, right)?)),
            ast::BinaryOperator::Eq => build_compare(ctx, scope, CompareOp::Eq, left, right),
            ast::BinaryOperator::NotEq => build_compare(ctx, scope, CompareOp::NotEq, left, right),
            ast::BinaryOperator::Lt => build_compare(ctx, scope, CompareOp::Lt, left, right),
            ast::BinaryOperator::LtEq => build_compare(ctx, scope, CompareOp::LtEq, left, right),
            ast::BinaryOperator::Gt => build_compare(ctx, scope, CompareOp::Gt, left, right),
            ast::BinaryOperator::GtEq => build_compare(ctx, scope, CompareOp::GtEq, left, right),
            other => Err(ImportError::unsupported(format!(
                "operator {other} in a boolean position"
            ))),
        },
        ast::Expr::UnaryOp {
            op: ast::UnaryOperator::Not,
            expr,
        } => Ok(BoolExpr::Not(Box::new(build_predicate(ctx, scope, expr)?))),
        ast::Expr::Nested(inner) => build_predicate(ctx, scope, inner),
        ast::Expr::IsNull(inner) => {
            let value = build_value(ctx, scope, inner)?;
            mark_columns_nullable(ctx, scope, &value);
            Ok(BoolExpr::IsNull {
                expr: value,
                negated: false,
            })
        }
        ast::Expr::IsNotNull(inner) => {
            let value = build_value(ctx, scope, inner)?;
            mark_columns_nullable(ctx, scope, &value);
            Ok(BoolExpr::IsNull {
                expr: value,
                negated: true,
            })
        }
        ast::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let value = build_value(ctx, scope, expr)?;
            let pattern = build_value(ctx, scope, pattern)?;
            hint_columns(ctx, scope, &value, ColumnKind::Text, None);
            Ok(BoolExpr::Like {
                expr: value,
                pattern,
                negated: *negated,
            })
        }
        ast::Expr::InList {
            expr,
            list,
            negated,
        } => {
            let value = build_value(ctx, scope, expr)?;
            let values = list
                .iter()
                .map(|item| build_value(ctx, scope, item))
                .collect::<BuildResult<Vec<_>>>()?;

            let evidences: Vec<_> = values
                .iter()
                .filter_map(|v| evidence_of(ctx, scope, v))
                .collect();
            if let Some((kind, length)) = merge_evidence(evidences) {
                hint_columns(ctx, scope, &value, kind, length);
            }
            if values.iter().any(ValueExpr::is_null_literal) {
                mark_columns_nullable(ctx, scope, &value);
            }

            Ok(BoolExpr::InValues {
                expr: value,
                values,
                negated: *negated,
            })
        }
        ast::Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(BoolExpr::InSubquery {
            expr: build_value(ctx, scope, expr)?,
            query: Box::new(build_query(ctx, scope, subquery)?),
            negated: *negated,
        }),
        ast::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => {
            let value = build_value(ctx, scope, expr)?;
            let low = build_value(ctx, scope, low)?;
            let high = build_value(ctx, scope, high)?;

            let bound_evidence = evidence_of(ctx, scope, &low)
                .or_else(|| evidence_of(ctx, scope, &high));
            if let Some((kind, length)) = bound_evidence {
                hint_columns(ctx, scope, &value, kind, length);
            }

            Ok(BoolExpr::Between {
                expr: value,
                low,
                high,
                negated: *negated,
            })
        }
        ast::Expr::Exists { subquery, negated } => Ok(BoolExpr::Exists {
            query: Box::new(build_query(ctx, scope, subquery)?),
            negated: *negated,
        }),
        other => Err(ImportError::unsupported(format!(
            "expected a boolean expression, found: {other}"
        ))),
    }
}

fn build_compare(
    ctx: &mut BuildContext,
    scope: &QueryScope<'_>,
    op: CompareOp,
    left: &ast::Expr,
    right: &ast::Expr,
) -> BuildResult<BoolExpr> {
    let left = build_value(ctx, scope, left)?;
    let right = build_value(ctx, scope, right)?;

    if right.is_null_literal() {
        mark_columns_nullable(ctx, scope, &left);
    } else if left.is_null_literal() {
        mark_columns_nullable(ctx, scope, &right);
    } else {
        // Snapshot evidence from both sides before hinting either, so a
        // hint applied to one side cannot masquerade as evidence from it.
        let right_evidence = evidence_of(ctx, scope, &right);
        let left_evidence = evidence_of(ctx, scope, &left);
        if let Some((kind, length)) = right_evidence {
            hint_columns(ctx, scope, &left, kind, length);
        }
        if let Some((kind, length)) = left_evidence {
            hint_columns(ctx, scope, &right, kind, length);
        }
    }

    Ok(BoolExpr::Compare { op, left, right })
}

pub(crate) fn build_literal(value: &ast::Value) -> BuildResult<Literal> {
    match value {
        ast::Value::Number(text, _) => {
            if text.contains('.') || text.contains('e') || text.contains('E') {
                Ok(Literal::Decimal(text.clone()))
            } else {
                match text.parse::<i64>() {
                    Ok(n) => Ok(Literal::Int(n)),
                    // Out-of-range integers stay numeric, just not i64.
                    Err(_) => Ok(Literal::Decimal(text.clone())),
                }
            }
        }
        ast::Value::SingleQuotedString(s)
        | ast::Value::NationalStringLiteral(s)
        | ast::Value::DoubleQuotedString(s) => Ok(Literal::Str(s.clone())),
        ast::Value::Boolean(b) => Ok(Literal::Bool(*b)),
        ast::Value::Null => Ok(Literal::Null),
        other => Err(ImportError::unsupported(format!("literal: {other}"))),
    }
}

/// Map a declared data type (CAST targets) onto a concrete column type.
fn map_data_type(data_type: &ast::DataType) -> BuildResult<ColumnType> {
    use ast::DataType;

    match data_type {
        DataType::TinyInt(_)
        | DataType::SmallInt(_)
        | DataType::Int(_)
        | DataType::Integer(_)
        | DataType::BigInt(_) => Ok(ColumnType::Int32),
        DataType::Boolean => Ok(ColumnType::Bool),
        DataType::Decimal(_)
        | DataType::Numeric(_)
        | DataType::Float(_)
        | DataType::Real
        | DataType::Double
        | DataType::DoublePrecision => Ok(ColumnType::Decimal),
        DataType::Char(len) | DataType::Varchar(len) | DataType::Nvarchar(len) => {
            Ok(ColumnType::String {
                length: character_length(len),
            })
        }
        DataType::Text => Ok(ColumnType::String { length: None }),
        DataType::Date | DataType::Datetime(_) => Ok(ColumnType::DateTime),
        DataType::Timestamp(_, tz) => match tz {
            ast::TimezoneInfo::WithTimeZone | ast::TimezoneInfo::Tz => {
                Ok(ColumnType::DateTimeOffset)
            }
            _ => Ok(ColumnType::DateTime),
        },
        DataType::Uuid => Ok(ColumnType::Guid),
        DataType::Binary(_) | DataType::Varbinary(_) | DataType::Blob(_) | DataType::Bytea => {
            Ok(ColumnType::Binary)
        }
        DataType::Custom(name, _) => {
            let folded = name.to_string().to_lowercase();
            match folded.as_str() {
                "uniqueidentifier" => Ok(ColumnType::Guid),
                "datetimeoffset" => Ok(ColumnType::DateTimeOffset),
                "money" | "smallmoney" => Ok(ColumnType::Decimal),
                "bit" => Ok(ColumnType::Bool),
                _ => Err(ImportError::unsupported(format!("data type {name}"))),
            }
        }
        other => Err(ImportError::unsupported(format!("data type {other}"))),
    }
}

fn character_length(len: &Option<ast::CharacterLength>) -> Option<u32> {
    match len {
        Some(ast::CharacterLength::IntegerLength { length, .. }) => Some(*length as u32),
        Some(ast::CharacterLength::Max) | None => None,
    }
}
