//! Static typing and NULL-propagating evaluation of scalar expressions.
//!
//! Two passes over the same [`Expr`] tree, matching the "tagged variant,
//! two passes, not a class hierarchy" guidance for the expression
//! representation: [`infer_type`] walks the tree once to assign each
//! node a [`Type`] (and reject incompatible operands) without touching
//! any row data; [`eval`] walks it again against a bound row to produce
//! a [`Value`]. Aggregate functions (`COUNT`/`SUM`/`AVG`/`MIN`/`MAX`) are
//! not handled here — the planner extracts them before grouping and
//! this module only ever sees the per-row scalar remainder.

use crate::error::{GraniteError, Result};
use crate::sql::ast::{BinaryOp, Expr, LiteralValue, UnaryOp};
use crate::types::{ColumnType, Decimal, Value};

/// One resolved column available to an expression: its binding (table
/// alias, name) plus its static type. Built by the planner from the
/// `FROM` clause (including `NULL`-extended columns introduced by a
/// `LEFT JOIN`'s right side).
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub table: Option<String>,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// The static type of an expression: its value kind plus nullability.
/// `kind: None` means an untyped `NULL` literal, which unifies with any
/// other kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Type {
    pub kind: Option<ColumnType>,
    pub nullable: bool,
}

impl Type {
    fn known(kind: ColumnType, nullable: bool) -> Type {
        Type { kind: Some(kind), nullable }
    }

    fn untyped_null() -> Type {
        Type { kind: None, nullable: true }
    }

    fn is_numeric(&self) -> bool {
        self.kind.map_or(true, |k| k.is_numeric())
    }

    fn is_temporal(&self) -> bool {
        self.kind.map_or(true, |k| k.is_temporal())
    }

    fn is_varchar(&self) -> bool {
        self.kind.map_or(true, |k| matches!(k, ColumnType::Varchar(_)))
    }

    fn is_boolean(&self) -> bool {
        self.kind.map_or(true, |k| matches!(k, ColumnType::Boolean))
    }
}

/// Resolve `table.name` (or bare `name`) against `schema`, returning its
/// index. A bare name that exists in more than one table is ambiguous.
pub fn resolve_column(table: Option<&str>, name: &str, schema: &[ResolvedColumn]) -> Result<usize> {
    let matches: Vec<usize> = schema
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.name.eq_ignore_ascii_case(name)
                && table.map_or(true, |t| c.table.as_deref().map_or(false, |ct| ct.eq_ignore_ascii_case(t)))
        })
        .map(|(i, _)| i)
        .collect();

    match matches.len() {
        0 => Err(GraniteError::Planning(format!("unresolved column: {name}"))),
        1 => Ok(matches[0]),
        _ => Err(GraniteError::Planning(format!("ambiguous column reference: {name}"))),
    }
}

/// Infer the static type of `expr` against `schema`, validating operand
/// compatibility along the way.
pub fn infer_type(expr: &Expr, schema: &[ResolvedColumn]) -> Result<Type> {
    match expr {
        Expr::Literal(LiteralValue::Null) => Ok(Type::untyped_null()),
        Expr::Literal(LiteralValue::Integer(_)) => Ok(Type::known(ColumnType::Int64, false)),
        Expr::Literal(LiteralValue::Decimal(s)) => {
            let (_, scale) = decimal_literal_scale(s);
            Ok(Type::known(ColumnType::Decimal(38, scale), false))
        }
        Expr::Literal(LiteralValue::String(s)) => {
            Ok(Type::known(ColumnType::Varchar(s.len().min(u16::MAX as usize) as u16), false))
        }
        Expr::Literal(LiteralValue::Boolean(_)) => Ok(Type::known(ColumnType::Boolean, false)),

        Expr::Column { table, name } => {
            let idx = resolve_column(table.as_deref(), name, schema)?;
            let col = &schema[idx];
            Ok(Type::known(col.column_type, col.nullable))
        }

        Expr::UnaryOp { op: UnaryOp::Not, expr } => {
            let t = infer_type(expr, schema)?;
            if !t.is_boolean() {
                return Err(GraniteError::Type("NOT requires a BOOLEAN operand".into()));
            }
            Ok(Type::known(ColumnType::Boolean, t.nullable))
        }
        Expr::UnaryOp { op: UnaryOp::Neg, expr } => {
            let t = infer_type(expr, schema)?;
            if !t.is_numeric() {
                return Err(GraniteError::Type("unary minus requires a numeric operand".into()));
            }
            Ok(t)
        }

        Expr::IsNull { expr, .. } => {
            infer_type(expr, schema)?;
            Ok(Type::known(ColumnType::Boolean, false))
        }

        Expr::Coalesce(a, b) => {
            let ta = infer_type(a, schema)?;
            let tb = infer_type(b, schema)?;
            let kind = ta.kind.or(tb.kind);
            Ok(Type { kind, nullable: tb.nullable })
        }

        Expr::BinaryOp { left, op, right } => infer_binary(left, op.clone(), right, schema),

        Expr::Function { name, args, star } => infer_function(name, args, *star, schema),
    }
}

fn infer_binary(left: &Expr, op: BinaryOp, right: &Expr, schema: &[ResolvedColumn]) -> Result<Type> {
    let lt = infer_type(left, schema)?;
    let rt = infer_type(right, schema)?;
    let nullable = lt.nullable || rt.nullable;

    match op {
        BinaryOp::And | BinaryOp::Or => {
            if !lt.is_boolean() || !rt.is_boolean() {
                return Err(GraniteError::Type(format!("{op:?} requires BOOLEAN operands")));
            }
            Ok(Type::known(ColumnType::Boolean, nullable))
        }
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let compatible = (lt.is_numeric() && rt.is_numeric())
                || (lt.is_varchar() && rt.is_varchar())
                || (lt.is_temporal() && rt.is_temporal())
                || (lt.is_boolean() && rt.is_boolean());
            if !compatible {
                return Err(GraniteError::Type(format!(
                    "incompatible operand types in comparison: {:?} vs {:?}",
                    lt.kind, rt.kind
                )));
            }
            Ok(Type::known(ColumnType::Boolean, nullable))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            if !lt.is_numeric() || !rt.is_numeric() {
                return Err(GraniteError::Type(format!("{op:?} requires numeric operands")));
            }
            Ok(Type::known(arithmetic_result_kind(lt.kind, rt.kind, op), nullable))
        }
    }
}

/// Widening rules for arithmetic between two numeric static types.
/// Add/Sub use the wider scale; Mul sums precision/scale; Div widens
/// scale to `max(s1 + 6, 6)` (the explicit resolution for the
/// underspecified DIV rule — see the design notes).
fn arithmetic_result_kind(lk: Option<ColumnType>, rk: Option<ColumnType>, op: BinaryOp) -> ColumnType {
    let is_decimal = matches!(lk, Some(ColumnType::Decimal(_, _))) || matches!(rk, Some(ColumnType::Decimal(_, _)));
    if is_decimal {
        let (p1, s1) = decimal_ps(lk);
        let (p2, s2) = decimal_ps(rk);
        return match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let scale = s1.max(s2);
                let precision = (p1 as i32 - s1 as i32).max(p2 as i32 - s2 as i32) as u8 + scale + 1;
                ColumnType::Decimal(precision.min(38), scale)
            }
            BinaryOp::Mul => {
                let precision = (p1 + p2).min(38);
                let scale = (s1 + s2).min(precision);
                ColumnType::Decimal(precision, scale)
            }
            BinaryOp::Div => {
                let scale = (s1 + 6).max(6).min(37);
                let precision = ((p1 - s1) + s2 + scale).min(38);
                ColumnType::Decimal(precision.max(scale + 1).min(38), scale)
            }
            BinaryOp::Mod => ColumnType::Decimal(p1.max(p2).min(38), s1.max(s2)),
            _ => unreachable!(),
        };
    }

    let either_64 = matches!(lk, Some(ColumnType::Int64)) || matches!(rk, Some(ColumnType::Int64));
    if either_64 {
        ColumnType::Int64
    } else {
        ColumnType::Int32
    }
}

fn decimal_ps(kind: Option<ColumnType>) -> (u8, u8) {
    match kind {
        Some(ColumnType::Decimal(p, s)) => (p, s),
        Some(ColumnType::Int32) => (10, 0),
        Some(ColumnType::Int64) => (19, 0),
        _ => (38, 0),
    }
}

fn infer_function(name: &str, args: &[Expr], star: bool, schema: &[ResolvedColumn]) -> Result<Type> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "UPPER" | "LOWER" => {
            let t = infer_type(&args[0], schema)?;
            if !t.is_varchar() {
                return Err(GraniteError::Type(format!("{upper} requires a VARCHAR argument")));
            }
            Ok(t)
        }
        "LENGTH" => {
            let t = infer_type(&args[0], schema)?;
            if !t.is_varchar() {
                return Err(GraniteError::Type("LENGTH requires a VARCHAR argument".into()));
            }
            Ok(Type::known(ColumnType::Int32, t.nullable))
        }
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" => Err(GraniteError::Internal(format!(
            "aggregate function {upper} must be extracted by the planner before scalar typing, star={star}"
        ))),
        other => Err(GraniteError::Planning(format!("unknown function: {other}"))),
    }
}

fn decimal_literal_scale(text: &str) -> (i128, u8) {
    match text.split_once('.') {
        Some((_, frac)) => (0, frac.len() as u8),
        None => (0, 0),
    }
}

/// Parse a decimal literal's text into a [`Decimal`] at its natural
/// scale (the number of digits after the decimal point).
fn parse_decimal_literal(text: &str) -> Decimal {
    let negative = text.starts_with('-');
    let unsigned = text.trim_start_matches('-');
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let scale = frac_part.len() as u8;
    let digits = format!("{int_part}{frac_part}");
    let magnitude: i128 = if digits.is_empty() { 0 } else { digits.parse().unwrap_or(0) };
    Decimal::new(if negative { -magnitude } else { magnitude }, scale)
}

/// Evaluate `expr` against a bound `row` (ordered per `schema`). NULL
/// propagates through arithmetic and comparison per SQL semantics; `IS
/// [NOT] NULL` is the only operator that always yields a non-NULL
/// BOOLEAN.
pub fn eval(expr: &Expr, schema: &[ResolvedColumn], row: &[Value]) -> Result<Value> {
    match expr {
        Expr::Literal(LiteralValue::Null) => Ok(Value::Null),
        Expr::Literal(LiteralValue::Integer(n)) => Ok(Value::Int64(*n)),
        Expr::Literal(LiteralValue::Decimal(s)) => Ok(Value::Decimal(parse_decimal_literal(s))),
        Expr::Literal(LiteralValue::String(s)) => Ok(Value::Varchar(s.clone())),
        Expr::Literal(LiteralValue::Boolean(b)) => Ok(Value::Boolean(*b)),

        Expr::Column { table, name } => {
            let idx = resolve_column(table.as_deref(), name, schema)?;
            Ok(row[idx].clone())
        }

        Expr::UnaryOp { op: UnaryOp::Not, expr } => {
            let v = eval(expr, schema, row)?;
            Ok(match v.to_bool3() {
                Some(b) => Value::Boolean(!b),
                None => Value::Null,
            })
        }
        Expr::UnaryOp { op: UnaryOp::Neg, expr } => {
            let v = eval(expr, schema, row)?;
            Ok(negate(&v))
        }

        Expr::IsNull { expr, negated } => {
            let v = eval(expr, schema, row)?;
            let is_null = v.is_null();
            Ok(Value::Boolean(if *negated { !is_null } else { is_null }))
        }

        Expr::Coalesce(a, b) => {
            let va = eval(a, schema, row)?;
            if va.is_null() {
                eval(b, schema, row)
            } else {
                Ok(va)
            }
        }

        Expr::BinaryOp { left, op, right } => eval_binary(left, op.clone(), right, schema, row),

        Expr::Function { name, args, .. } => eval_function(name, args, schema, row),
    }
}

fn negate(v: &Value) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::Int32(n) => Value::Int32(-n),
        Value::Int64(n) => Value::Int64(-n),
        Value::Decimal(d) => Value::Decimal(Decimal::new(-d.raw, d.scale)),
        other => other.clone(),
    }
}

fn eval_binary(left: &Expr, op: BinaryOp, right: &Expr, schema: &[ResolvedColumn], row: &[Value]) -> Result<Value> {
    if op == BinaryOp::And || op == BinaryOp::Or {
        return eval_three_valued_logic(left, op, right, schema, row);
    }

    let lv = eval(left, schema, row)?;
    let rv = eval(right, schema, row)?;
    if lv.is_null() || rv.is_null() {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::Eq => Ok(Value::Boolean(lv.total_cmp(&rv) == std::cmp::Ordering::Equal)),
        BinaryOp::NotEq => Ok(Value::Boolean(lv.total_cmp(&rv) != std::cmp::Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Boolean(lv.total_cmp(&rv) == std::cmp::Ordering::Less)),
        BinaryOp::Gt => Ok(Value::Boolean(lv.total_cmp(&rv) == std::cmp::Ordering::Greater)),
        BinaryOp::LtEq => Ok(Value::Boolean(lv.total_cmp(&rv) != std::cmp::Ordering::Greater)),
        BinaryOp::GtEq => Ok(Value::Boolean(lv.total_cmp(&rv) != std::cmp::Ordering::Less)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(&lv, op, &rv)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

/// `AND`/`OR` short-circuit per three-valued logic even when one side is
/// `NULL`: `FALSE AND NULL = FALSE`, `TRUE OR NULL = TRUE`.
fn eval_three_valued_logic(
    left: &Expr,
    op: BinaryOp,
    right: &Expr,
    schema: &[ResolvedColumn],
    row: &[Value],
) -> Result<Value> {
    let lv = eval(left, schema, row)?;
    let lb = lv.to_bool3();

    if op == BinaryOp::And && lb == Some(false) {
        return Ok(Value::Boolean(false));
    }
    if op == BinaryOp::Or && lb == Some(true) {
        return Ok(Value::Boolean(true));
    }

    let rv = eval(right, schema, row)?;
    let rb = rv.to_bool3();

    let result = match op {
        BinaryOp::And => match (lb, rb) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOp::Or => match (lb, rb) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        _ => unreachable!(),
    };

    Ok(match result {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    })
}

fn arithmetic(lv: &Value, op: BinaryOp, rv: &Value) -> Result<Value> {
    if let (Value::Decimal(_), _) | (_, Value::Decimal(_)) = (lv, rv) {
        let ld = to_decimal(lv);
        let rd = to_decimal(rv);
        return Ok(Value::Decimal(decimal_arithmetic(ld, op, rd)?));
    }

    match (lv, rv) {
        (Value::Int64(a), _) | (_, Value::Int64(a)) if matches!(lv, Value::Int64(_)) || matches!(rv, Value::Int64(_)) => {
            let _ = a;
            let a = to_i64(lv);
            let b = to_i64(rv);
            int64_arithmetic(a, op, b)
        }
        _ => {
            let a = to_i64(lv) as i32;
            let b = to_i64(rv) as i32;
            Ok(Value::Int32(int32_arithmetic(a, op, b)?))
        }
    }
}

fn to_i64(v: &Value) -> i64 {
    match v {
        Value::Int32(n) => *n as i64,
        Value::Int64(n) => *n,
        other => panic!("to_i64 called on non-integer value {other:?}"),
    }
}

fn to_decimal(v: &Value) -> Decimal {
    match v {
        Value::Int32(n) => Decimal::new(*n as i128, 0),
        Value::Int64(n) => Decimal::new(*n as i128, 0),
        Value::Decimal(d) => *d,
        other => panic!("to_decimal called on non-numeric value {other:?}"),
    }
}

fn int64_arithmetic(a: i64, op: BinaryOp, b: i64) -> Result<Value> {
    Ok(Value::Int64(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            a % b
        }
        _ => unreachable!(),
    }))
}

fn int32_arithmetic(a: i32, op: BinaryOp, b: i32) -> Result<i32> {
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            a % b
        }
        _ => unreachable!(),
    })
}

fn decimal_arithmetic(a: Decimal, op: BinaryOp, b: Decimal) -> Result<Decimal> {
    let kind = arithmetic_result_kind(
        Some(ColumnType::Decimal(38, a.scale)),
        Some(ColumnType::Decimal(38, b.scale)),
        op.clone(),
    );
    let scale = match kind {
        ColumnType::Decimal(_, s) => s,
        _ => unreachable!(),
    };

    match op {
        BinaryOp::Add => {
            let ar = a.rescale(scale);
            let br = b.rescale(scale);
            Ok(Decimal::new(ar.raw + br.raw, scale))
        }
        BinaryOp::Sub => {
            let ar = a.rescale(scale);
            let br = b.rescale(scale);
            Ok(Decimal::new(ar.raw - br.raw, scale))
        }
        BinaryOp::Mul => {
            let raw = a.raw * b.raw;
            Ok(Decimal::new(raw, a.scale + b.scale).rescale(scale))
        }
        BinaryOp::Div => {
            if b.raw == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            let numerator = a.raw * 10i128.pow((scale + b.scale - a.scale) as u32);
            Ok(Decimal::new(numerator / b.raw, scale))
        }
        BinaryOp::Mod => {
            let ar = a.rescale(scale);
            let br = b.rescale(scale);
            if br.raw == 0 {
                return Err(GraniteError::Constraint("division by zero".into()));
            }
            Ok(Decimal::new(ar.raw % br.raw, scale))
        }
        _ => unreachable!(),
    }
}

fn eval_function(name: &str, args: &[Expr], schema: &[ResolvedColumn], row: &[Value]) -> Result<Value> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "UPPER" => {
            let v = eval(&args[0], schema, row)?;
            Ok(match v {
                Value::Null => Value::Null,
                Value::Varchar(s) => Value::Varchar(s.to_uppercase()),
                other => other,
            })
        }
        "LOWER" => {
            let v = eval(&args[0], schema, row)?;
            Ok(match v {
                Value::Null => Value::Null,
                Value::Varchar(s) => Value::Varchar(s.to_lowercase()),
                other => other,
            })
        }
        "LENGTH" => {
            let v = eval(&args[0], schema, row)?;
            Ok(match v {
                Value::Null => Value::Null,
                Value::Varchar(s) => Value::Int32(s.len() as i32),
                other => other,
            })
        }
        other => Err(GraniteError::Internal(format!(
            "eval_function called on non-scalar function {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ResolvedColumn> {
        vec![
            ResolvedColumn { table: Some("t".into()), name: "id".into(), column_type: ColumnType::Int32, nullable: false },
            ResolvedColumn { table: Some("t".into()), name: "name".into(), column_type: ColumnType::Varchar(20), nullable: true },
            ResolvedColumn { table: Some("t".into()), name: "amount".into(), column_type: ColumnType::Decimal(10, 2), nullable: true },
        ]
    }

    #[test]
    fn resolves_qualified_and_bare_columns() {
        let s = schema();
        assert_eq!(resolve_column(Some("t"), "id", &s).unwrap(), 0);
        assert_eq!(resolve_column(None, "name", &s).unwrap(), 1);
        assert!(resolve_column(None, "missing", &s).is_err());
    }

    #[test]
    fn infers_comparison_result_is_boolean() {
        let s = schema();
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Column { table: None, name: "id".into() }),
            op: BinaryOp::Gt,
            right: Box::new(Expr::Literal(LiteralValue::Integer(0))),
        };
        let t = infer_type(&expr, &s).unwrap();
        assert_eq!(t.kind, Some(ColumnType::Boolean));
    }

    #[test]
    fn rejects_incompatible_comparison() {
        let s = schema();
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Column { table: None, name: "name".into() }),
            op: BinaryOp::Gt,
            right: Box::new(Expr::Literal(LiteralValue::Integer(0))),
        };
        assert!(matches!(infer_type(&expr, &s), Err(GraniteError::Type(_))));
    }

    #[test]
    fn decimal_arithmetic_widens_scale() {
        let a = Value::Decimal(Decimal::new(1000, 2)); // 10.00
        let b = Value::Decimal(Decimal::new(500, 1)); // 50.0
        let result = arithmetic(&a, BinaryOp::Add, &b).unwrap();
        match result {
            Value::Decimal(d) => assert_eq!(d.to_string(), "60.00"),
            _ => panic!("expected Decimal"),
        }
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Null, Value::Null];
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Column { table: None, name: "amount".into() }),
            op: BinaryOp::Add,
            right: Box::new(Expr::Literal(LiteralValue::Integer(1))),
        };
        assert!(eval(&expr, &s, &row).unwrap().is_null());
    }

    #[test]
    fn three_valued_and_short_circuits_on_false() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Null, Value::Null];
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(LiteralValue::Boolean(false))),
            op: BinaryOp::And,
            right: Box::new(Expr::Column { table: None, name: "name".into() }), // would error if evaluated as boolean
        };
        // name is Varchar, not boolean, but since lhs is FALSE we must not evaluate rhs as boolean.
        let result = eval(&expr, &s, &row).unwrap();
        assert_eq!(result.to_bool3(), Some(false));
    }

    #[test]
    fn is_null_never_returns_null() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Null, Value::Null];
        let expr = Expr::IsNull {
            expr: Box::new(Expr::Column { table: None, name: "name".into() }),
            negated: false,
        };
        assert_eq!(eval(&expr, &s, &row).unwrap().to_bool3(), Some(true));
    }

    #[test]
    fn coalesce_picks_first_non_null() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Null, Value::Null];
        let expr = Expr::Coalesce(
            Box::new(Expr::Column { table: None, name: "name".into() }),
            Box::new(Expr::Literal(LiteralValue::String("default".into()))),
        );
        assert_eq!(eval(&expr, &s, &row).unwrap().to_string(), "default");
    }

    #[test]
    fn upper_lower_length_functions() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Varchar("Ada".into()), Value::Null];
        let upper = eval_function("UPPER", &[Expr::Column { table: None, name: "name".into() }], &s, &row).unwrap();
        assert_eq!(upper.to_string(), "ADA");
        let len = eval_function("LENGTH", &[Expr::Column { table: None, name: "name".into() }], &s, &row).unwrap();
        assert_eq!(len.to_string(), "3");
    }

    #[test]
    fn null_equals_null_is_unknown_not_true() {
        let s = schema();
        let row = vec![Value::Int32(1), Value::Null, Value::Null];
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(LiteralValue::Null)),
            op: BinaryOp::Eq,
            right: Box::new(Expr::Literal(LiteralValue::Null)),
        };
        assert!(eval(&expr, &s, &row).unwrap().is_null());
    }
}
