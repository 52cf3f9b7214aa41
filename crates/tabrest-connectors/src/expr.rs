//! Translation of DataFusion filter expressions into [`Constraint`]s.
//!
//! Column-vs-literal comparisons, `IN` lists, `BETWEEN`, `AND` conjunctions
//! and `OR` over a single column translate. Anything else returns `None` and
//! stays with the engine.

use datafusion::logical_expr::{BinaryExpr, Between, Expr, Operator};
use datafusion::scalar::ScalarValue;

use crate::domain::{Constraint, Domain, Literal, Range};
use crate::handle::ColumnHandle;
use crate::value::ColumnType;

/// The constraint equivalent to `expr`, or `None` when it cannot be expressed.
pub fn expr_to_constraint(expr: &Expr, columns: &[ColumnHandle]) -> Option<Constraint> {
    match strip(expr) {
        Expr::BinaryExpr(BinaryExpr { left, op, right }) if *op == Operator::And => {
            let l = expr_to_constraint(left, columns)?;
            let r = expr_to_constraint(right, columns)?;
            Some(l.intersect(&r))
        }
        Expr::BinaryExpr(BinaryExpr { left, op, right }) if *op == Operator::Or => {
            // only a disjunction over one column has a domain form
            let l = expr_to_constraint(left, columns)?;
            let r = expr_to_constraint(right, columns)?;
            match (l.column_domains(), r.column_domains()) {
                ([a], [b]) if a.column == b.column => Some(
                    Constraint::all().with_domain(a.column.clone(), a.domain.union(&b.domain)),
                ),
                _ => None,
            }
        }
        Expr::BinaryExpr(BinaryExpr { left, op, right }) => {
            let (column, op, value) = match (strip(left), strip(right)) {
                (Expr::Column(c), Expr::Literal(v)) => (&c.name, *op, v),
                (Expr::Literal(v), Expr::Column(c)) => (&c.name, op.swap()?, v),
                _ => return None,
            };
            let column = find_column(columns, column)?;
            let literal = to_literal(value, &column.column_type)?;
            let range = match op {
                Operator::Eq => return Some(single(column, Domain::single(literal))),
                Operator::Lt => Range::less_than(literal),
                Operator::LtEq => Range::less_or_equal(literal),
                Operator::Gt => Range::greater_than(literal),
                Operator::GtEq => Range::greater_or_equal(literal),
                _ => return None,
            };
            Some(single(column, Domain::ranges(vec![range])))
        }
        Expr::InList(in_list) if !in_list.negated => {
            let Expr::Column(c) = strip(&in_list.expr) else {
                return None;
            };
            let column = find_column(columns, &c.name)?;
            let values = in_list
                .list
                .iter()
                .map(|item| match strip(item) {
                    Expr::Literal(v) => to_literal(v, &column.column_type),
                    _ => None,
                })
                .collect::<Option<Vec<Literal>>>()?;
            Some(single(column, Domain::values(values)))
        }
        Expr::Between(Between {
            expr,
            negated: false,
            low,
            high,
        }) => {
            let (Expr::Column(c), Expr::Literal(low), Expr::Literal(high)) =
                (strip(expr), strip(low), strip(high))
            else {
                return None;
            };
            let column = find_column(columns, &c.name)?;
            let low = to_literal(low, &column.column_type)?;
            let high = to_literal(high, &column.column_type)?;
            Some(single(column, Domain::ranges(vec![Range::between(low, high)])))
        }
        _ => None,
    }
}

/// Column names referenced by `expr`.
pub fn referenced_columns(expr: &Expr) -> Vec<String> {
    expr.column_refs()
        .into_iter()
        .map(|c| c.name.clone())
        .collect()
}

fn strip(expr: &Expr) -> &Expr {
    match expr {
        Expr::Alias(a) => strip(&a.expr),
        _ => expr,
    }
}

fn find_column<'a>(columns: &'a [ColumnHandle], name: &str) -> Option<&'a ColumnHandle> {
    columns.iter().find(|c| c.name == name)
}

fn single(column: &ColumnHandle, domain: Domain) -> Constraint {
    Constraint::all().with_domain(column.clone(), domain)
}

/// Convert a scalar into the literal form of `column_type`.
///
/// Timestamps finer than milliseconds only translate when they carry no
/// sub-millisecond part, so range bounds stay exact.
fn to_literal(value: &ScalarValue, column_type: &ColumnType) -> Option<Literal> {
    match (column_type, value) {
        (ColumnType::Varchar, ScalarValue::Utf8(Some(s)))
        | (ColumnType::Varchar, ScalarValue::LargeUtf8(Some(s)))
        | (ColumnType::Varchar, ScalarValue::Utf8View(Some(s))) => {
            Some(Literal::Varchar(s.clone()))
        }
        (ColumnType::Boolean, ScalarValue::Boolean(Some(b))) => Some(Literal::Boolean(*b)),
        (ColumnType::BigInt, ScalarValue::Int64(Some(v))) => Some(Literal::BigInt(*v)),
        (ColumnType::BigInt, ScalarValue::Int32(Some(v))) => Some(Literal::BigInt(i64::from(*v))),
        (ColumnType::BigInt, ScalarValue::Int16(Some(v))) => Some(Literal::BigInt(i64::from(*v))),
        (ColumnType::BigInt, ScalarValue::Int8(Some(v))) => Some(Literal::BigInt(i64::from(*v))),
        (ColumnType::BigInt, ScalarValue::UInt32(Some(v))) => Some(Literal::BigInt(i64::from(*v))),
        (ColumnType::BigInt, ScalarValue::UInt64(Some(v))) => {
            i64::try_from(*v).ok().map(Literal::BigInt)
        }
        (ColumnType::Timestamp, ScalarValue::TimestampSecond(Some(v), _)) => {
            v.checked_mul(1000).map(Literal::Timestamp)
        }
        (ColumnType::Timestamp, ScalarValue::TimestampMillisecond(Some(v), _)) => {
            Some(Literal::Timestamp(*v))
        }
        (ColumnType::Timestamp, ScalarValue::TimestampMicrosecond(Some(v), _)) if v % 1000 == 0 => {
            Some(Literal::Timestamp(v / 1000))
        }
        (ColumnType::Timestamp, ScalarValue::TimestampNanosecond(Some(v), _))
            if v % 1_000_000 == 0 =>
        {
            Some(Literal::Timestamp(v / 1_000_000))
        }
        _ => None,
    }
}
