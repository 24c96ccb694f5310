//! 式木から JQL への変換
use super::evaluator::partial_eval;
use super::expr::{BinaryOp, Expr, QueryMethod, Value};
use super::operators;
use crate::error::{Error, Result};
use crate::models::format_jql_datetime;

/// 変換結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JqlData {
    pub expression: String,
    pub number_of_results: Option<u32>,
    pub skip_results: Option<u32>,
}

/// 式木を JQL に変換するもの
pub trait JqlTranslator: Send + Sync {
    fn process(&self, expr: &Expr) -> Result<JqlData>;
}

/// 標準の変換器
///
/// 1回の `process` ごとに状態を作り直すので、共有して使ってよい。
#[derive(Debug, Clone, Copy, Default)]
pub struct JqlExpressionVisitor;

impl JqlExpressionVisitor {
    pub fn new() -> Self {
        Self
    }
}

impl JqlTranslator for JqlExpressionVisitor {
    fn process(&self, expr: &Expr) -> Result<JqlData> {
        let evaluated = partial_eval(expr)?;

        let mut state = Translation::default();
        state.visit(&evaluated)?;

        let data = JqlData {
            expression: format!("{}{}", state.jql_where, state.jql_order_by),
            number_of_results: state.number_of_results,
            skip_results: state.skip_results,
        };
        tracing::debug!(
            jql = %data.expression,
            take = ?data.number_of_results,
            skip = ?data.skip_results,
            "translated query"
        );
        Ok(data)
    }
}

#[derive(Default)]
struct Translation<'a> {
    jql_where: String,
    jql_order_by: String,
    number_of_results: Option<u32>,
    skip_results: Option<u32>,
    /// `Where` で登録され、まだ出力していない述語
    where_expressions: Vec<&'a Expr>,
}

impl<'a> Translation<'a> {
    fn visit(&mut self, expr: &'a Expr) -> Result<()> {
        match expr {
            Expr::Call {
                method,
                source,
                argument,
            } => {
                self.visit_call(*method, argument)?;
                self.visit(source)?;
                if *method == QueryMethod::Where {
                    self.visit(argument)?;
                }
                Ok(())
            }
            Expr::Binary { .. } => self.visit_binary(expr),
            Expr::Source => Ok(()),
            other => Err(unsupported(other)),
        }
    }

    fn visit_call(&mut self, method: QueryMethod, argument: &'a Expr) -> Result<()> {
        match method {
            QueryMethod::Where => {
                self.where_expressions.push(argument);
                Ok(())
            }
            QueryMethod::Take => {
                self.number_of_results = Some(count_argument(method, argument)?);
                Ok(())
            }
            QueryMethod::Skip => {
                self.skip_results = Some(count_argument(method, argument)?);
                Ok(())
            }
            _ => self.process_order_by(method, argument),
        }
    }

    /// 外側の呼び出しから辿るので、2つ目以降は先頭に差し込んで宣言順にする
    fn process_order_by(&mut self, method: QueryMethod, key: &Expr) -> Result<()> {
        let Expr::Member { field, .. } = key else {
            return Err(unsupported(key));
        };

        let direction = if method.is_descending() {
            operators::DESCENDING
        } else {
            operators::ASCENDING
        };
        let clause = format!("{} {}", field.property_name(), direction);

        if self.jql_order_by.is_empty() {
            self.jql_order_by.push_str(operators::ORDER_BY);
            self.jql_order_by.push_str(&clause);
        } else {
            self.jql_order_by
                .insert_str(operators::ORDER_BY.len(), &format!("{}, ", clause));
        }
        Ok(())
    }

    fn visit_binary(&mut self, expr: &'a Expr) -> Result<()> {
        let Expr::Binary { op, left, right } = expr else {
            return Err(unsupported(expr));
        };

        if let Some(index) = self
            .where_expressions
            .iter()
            .position(|pending| std::ptr::eq(*pending, expr))
        {
            if !self.jql_where.is_empty() {
                self.jql_where.push_str(" and ");
            }
            self.where_expressions.remove(index);
        }

        match op {
            BinaryOp::GreaterThan => self.process_relational(*op, left, right, operators::GREATER_THAN),
            BinaryOp::GreaterThanOrEqual => {
                self.process_relational(*op, left, right, operators::GREATER_THAN_OR_EQUALS)
            }
            BinaryOp::LessThan => self.process_relational(*op, left, right, operators::LESS_THAN),
            BinaryOp::LessThanOrEqual => {
                self.process_relational(*op, left, right, operators::LESS_THAN_OR_EQUALS)
            }
            BinaryOp::Equal => self.process_equality(*op, left, right, true),
            BinaryOp::NotEqual => self.process_equality(*op, left, right, false),
            BinaryOp::AndAlso => self.process_union(left, right, operators::AND),
            BinaryOp::OrElse => self.process_union(left, right, operators::OR),
            _ => Err(unsupported(expr)),
        }
    }

    fn process_relational(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        operator: &str,
    ) -> Result<()> {
        let field = field_name(op, left)?;
        let value = field_value(op, right)?;

        self.jql_where.push_str(&field);
        self.jql_where.push_str(&format!(" {} ", operator));
        self.jql_where.push_str(&format_value(value));
        Ok(())
    }

    fn process_equality(&mut self, op: BinaryOp, left: &Expr, right: &Expr, equal: bool) -> Result<()> {
        let field = field_name(op, left)?;
        let value = field_value(op, right)?;

        self.jql_where.push_str(&field);

        if value.is_null() || value.is_empty_string() {
            let keyword = if value.is_null() {
                operators::NULL
            } else {
                operators::EMPTY
            };
            self.jql_where
                .push_str(&format!(" {} {}", operators::is(equal), keyword));
            return Ok(());
        }

        let contains = match left {
            // 名前参照のカスタムフィールドは文字列なら部分一致
            Expr::Index { .. } => matches!(value, Value::Str(_)),
            Expr::Member { field, .. } => {
                !matches!(value, Value::Match(_)) && field.contains_equality()
            }
            _ => false,
        };

        self.jql_where
            .push_str(&format!(" {} ", operators::equality(equal, contains)));
        self.jql_where.push_str(&format_value(value));
        Ok(())
    }

    fn process_union(&mut self, left: &'a Expr, right: &'a Expr, keyword: &str) -> Result<()> {
        self.jql_where.push('(');
        self.visit(left)?;
        self.jql_where.push_str(&format!(" {} ", keyword));
        self.visit(right)?;
        self.jql_where.push(')');
        Ok(())
    }
}

fn unsupported(expr: &Expr) -> Error {
    Error::UnsupportedExpression(format!(
        "Expression type '{}' is not supported.",
        expr.kind_name()
    ))
}

/// 左辺のフィールド名 (エイリアス優先、カスタムフィールドは引用符付きの名前)
fn field_name(op: BinaryOp, left: &Expr) -> Result<String> {
    match left {
        Expr::Member { field, .. } => Ok(field.jql_name().to_string()),
        Expr::Index { key, .. } => Ok(format!("\"{}\"", key)),
        _ => Err(Error::UnsupportedExpression(format!(
            "Operator '{:?}' can only be applied on the right side of properties and property indexers.",
            op
        ))),
    }
}

/// 右辺の値 (部分評価後は定数になっている必要がある)
fn field_value(op: BinaryOp, right: &Expr) -> Result<&Value> {
    match right {
        Expr::Constant(value) => Ok(value),
        _ => Err(Error::UnsupportedExpression(format!(
            "Operator '{:?}' can only be used with constant values.",
            op
        ))),
    }
}

fn count_argument(method: QueryMethod, argument: &Expr) -> Result<u32> {
    match argument {
        Expr::Constant(Value::Int(n)) => u32::try_from(*n)
            .map_err(|_| Error::InvalidInput(format!("{:?} requires a non-negative count, got {}", method, n))),
        other => Err(Error::InvalidInput(format!(
            "{:?} requires a constant integer, got '{}'",
            method,
            other.kind_name()
        ))),
    }
}

/// JQL のリテラル表現
fn format_value(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{}\"", s),
        Value::Comparable(s) => format!("\"{}\"", s),
        Value::Match(s) => format!("\"{}\"", s),
        Value::LiteralDateTime(s) => format!("\"{}\"", s),
        Value::DateTime(dt) => format!("\"{}\"", format_jql_datetime(dt)),
        Value::Date(d) => format!("\"{}\"", format_jql_datetime(&d.and_time(chrono::NaiveTime::MIN))),
        Value::Null => operators::NULL.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Enum(name) => name.clone(),
    }
}
