//! 式木の部分評価
//!
//! 課題 (`Parameter`) やクエリの起点 (`Source`) に依存しない部分木を
//! 定数に置き換える。キャプチャしたクロージャもここで呼ばれる。
use super::expr::{BinaryOp, Expr, LiteralKind, UnaryOp, Value};
use super::literal::{ComparableString, LiteralDateTime, LiteralMatch};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashSet;

/// 評価可能な部分木を定数に置き換えた新しい木を返す
pub fn partial_eval(expr: &Expr) -> Result<Expr> {
    let mut candidates = HashSet::new();
    nominate(expr, &mut candidates);
    substitute(expr, &candidates)
}

/// 下から順に評価可能なノードを集める
fn nominate(expr: &Expr, candidates: &mut HashSet<*const Expr>) -> bool {
    let mut evaluable = true;
    for child in expr.children() {
        // 兄弟も全て見るので短絡させない
        evaluable &= nominate(child, candidates);
    }

    let evaluable = evaluable && !matches!(expr, Expr::Parameter | Expr::Source);
    if evaluable {
        candidates.insert(expr as *const Expr);
    }
    evaluable
}

/// 上から辿り、最初に出会った候補を評価する
fn substitute(expr: &Expr, candidates: &HashSet<*const Expr>) -> Result<Expr> {
    if candidates.contains(&(expr as *const Expr)) {
        return match expr {
            Expr::Constant(_) => Ok(expr.clone()),
            _ => Ok(Expr::Constant(evaluate(expr)?)),
        };
    }

    let rebuilt = match expr {
        Expr::Constant(_) | Expr::Parameter | Expr::Source | Expr::Captured(_) => expr.clone(),
        Expr::Member { target, field } => Expr::Member {
            target: Box::new(substitute(target, candidates)?),
            field: *field,
        },
        Expr::Index { target, key } => Expr::Index {
            target: Box::new(substitute(target, candidates)?),
            key: key.clone(),
        },
        Expr::New { kind, args } => Expr::New {
            kind: *kind,
            args: args
                .iter()
                .map(|arg| substitute(arg, candidates))
                .collect::<Result<_>>()?,
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(substitute(operand, candidates)?),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(substitute(left, candidates)?),
            right: Box::new(substitute(right, candidates)?),
        },
        Expr::Call {
            method,
            source,
            argument,
        } => Expr::Call {
            method: *method,
            source: Box::new(substitute(source, candidates)?),
            argument: Box::new(substitute(argument, candidates)?),
        },
    };
    Ok(rebuilt)
}

/// 課題に依存しない式をその場で計算する
fn evaluate(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),
        Expr::Captured(captured) => captured.invoke().map_err(Error::LocalEvaluation),
        Expr::New { kind, args } => {
            let values = args.iter().map(evaluate).collect::<Result<Vec<_>>>()?;
            construct(*kind, values)
        }
        Expr::Unary { op, operand } => unary(*op, evaluate(operand)?),
        Expr::Binary { op, left, right } => binary(*op, evaluate(left)?, evaluate(right)?),
        other => Err(Error::Unexpected(format!(
            "'{}' cannot be evaluated locally",
            other.kind_name()
        ))),
    }
}

fn local_error(message: String) -> Error {
    Error::LocalEvaluation(message.into())
}

fn construct(kind: LiteralKind, values: Vec<Value>) -> Result<Value> {
    let text = match values.as_slice() {
        [Value::Str(text)] => text.clone(),
        [Value::Comparable(text)] => text.as_str().to_string(),
        _ => {
            return Err(local_error(format!(
                "{:?} literal expects a single string argument",
                kind
            )));
        }
    };

    Ok(match kind {
        LiteralKind::Match => Value::Match(LiteralMatch::new(text)),
        LiteralKind::DateTime => Value::LiteralDateTime(LiteralDateTime::new(text)),
        LiteralKind::Comparable => Value::Comparable(ComparableString::new(text)),
    })
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (op, value) => Err(local_error(format!(
            "operator {:?} cannot be applied to {}",
            op,
            value.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    let mismatch = |left: &Value, right: &Value| {
        local_error(format!(
            "operator {:?} cannot be applied to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual
        | BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual => {
            let ordering = compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?;
            let result = match op {
                BinaryOp::GreaterThan => ordering == Ordering::Greater,
                BinaryOp::GreaterThanOrEqual => ordering != Ordering::Less,
                BinaryOp::LessThan => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::AndAlso | BinaryOp::OrElse => match (&left, &right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == BinaryOp::AndAlso {
                *l && *r
            } else {
                *l || *r
            })),
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Add => match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => l
                .checked_add(*r)
                .map(Value::Int)
                .ok_or_else(|| local_error("integer overflow".to_string())),
            (Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{}{}", l, r))),
            _ => float_op(&left, &right, |l, r| l + r).ok_or_else(|| mismatch(&left, &right)),
        },
        BinaryOp::Subtract => match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => l
                .checked_sub(*r)
                .map(Value::Int)
                .ok_or_else(|| local_error("integer overflow".to_string())),
            _ => float_op(&left, &right, |l, r| l - r).ok_or_else(|| mismatch(&left, &right)),
        },
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn float_op(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    Some(Value::Float(f(as_float(left)?, as_float(right)?)))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
        (Value::Comparable(l), Value::Comparable(r)) => Some(l.cmp(r)),
        (Value::Comparable(l), Value::Str(r)) => Some(l.as_str().cmp(r.as_str())),
        (Value::DateTime(l), Value::DateTime(r)) => Some(l.cmp(r)),
        (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
        _ => as_float(left)?.partial_cmp(&as_float(right)?),
    }
}
