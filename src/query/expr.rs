//! 課題クエリの式木
//!
//! `Expr::field(IssueField::Summary).eq("foo")` のように組み立て、
//! `JqlExpressionVisitor` で JQL に変換する。
use super::literal::{ComparableString, LiteralDateTime, LiteralMatch};
use crate::field::IssueField;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;

pub type CapturedError = Box<dyn std::error::Error + Send + Sync>;

/// 式に埋め込む値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Comparable(ComparableString),
    Match(LiteralMatch),
    LiteralDateTime(LiteralDateTime),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// 列挙値 (引用符なしで出力される)
    Enum(String),
}

impl Value {
    pub fn enumeration(name: impl Into<String>) -> Self {
        Value::Enum(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `""` と等しい値 (empty として扱う)
    pub fn is_empty_string(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Comparable(s) => s.as_str().is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Comparable(_) => "ComparableString",
            Value::Match(_) => "LiteralMatch",
            Value::LiteralDateTime(_) => "LiteralDateTime",
            Value::DateTime(_) => "DateTime",
            Value::Date(_) => "Date",
            Value::Enum(_) => "Enum",
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

value_from!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    ComparableString => Comparable,
    LiteralMatch => Match,
    LiteralDateTime => LiteralDateTime,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
);

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// クエリ組み立て時には評価されず、変換直前に呼ばれるクロージャ
#[derive(Clone)]
pub struct Captured {
    name: &'static str,
    thunk: Arc<dyn Fn() -> Result<Value, CapturedError> + Send + Sync>,
}

impl Captured {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn invoke(&self) -> Result<Value, CapturedError> {
        (self.thunk)()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captured").field("name", &self.name).finish()
    }
}

impl PartialEq for Captured {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.thunk, &other.thunk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Match,
    DateTime,
    Comparable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Where,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Take,
    Skip,
}

impl QueryMethod {
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            QueryMethod::OrderBy
                | QueryMethod::OrderByDescending
                | QueryMethod::ThenBy
                | QueryMethod::ThenByDescending
        )
    }

    pub fn is_descending(&self) -> bool {
        matches!(
            self,
            QueryMethod::OrderByDescending | QueryMethod::ThenByDescending
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// 述語が受け取る課題
    Parameter,
    /// クエリの起点 (リモートの課題一覧)
    Source,
    Member {
        target: Box<Expr>,
        field: IssueField,
    },
    /// カスタムフィールドを名前で参照する
    Index {
        target: Box<Expr>,
        key: String,
    },
    Captured(Captured),
    New {
        kind: LiteralKind,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        method: QueryMethod,
        source: Box<Expr>,
        argument: Box<Expr>,
    },
}

impl Expr {
    /// 課題のフィールド
    pub fn field(field: IssueField) -> Self {
        Expr::Member {
            target: Box::new(Expr::Parameter),
            field,
        }
    }

    /// 名前で参照するカスタムフィールド
    pub fn custom_field(name: impl Into<String>) -> Self {
        Expr::Index {
            target: Box::new(Expr::Parameter),
            key: name.into(),
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn null() -> Self {
        Expr::Constant(Value::Null)
    }

    /// 変換時に評価されるローカルな値
    pub fn captured<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::try_captured(move || Ok(f()))
    }

    /// 失敗しうるローカルな値。エラーはクエリの実行時にそのまま返る。
    pub fn try_captured<F, V>(f: F) -> Self
    where
        F: Fn() -> Result<V, CapturedError> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Expr::Captured(Captured {
            name: std::any::type_name::<F>(),
            thunk: Arc::new(move || f().map(Into::into)),
        })
    }

    /// リテラル型の生成 (引数は評価後に定数になっている必要がある)
    pub fn literal(kind: LiteralKind, arg: impl Into<Expr>) -> Self {
        Expr::New {
            kind,
            args: vec![arg.into()],
        }
    }

    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Equal, right)
    }

    pub fn ne(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::NotEqual, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::GreaterThan, right)
    }

    pub fn ge(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::GreaterThanOrEqual, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::LessThan, right)
    }

    pub fn le(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::LessThanOrEqual, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::AndAlso, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::OrElse, right)
    }

    /// ノードの種類 (エラーメッセージ用)
    pub fn kind_name(&self) -> String {
        match self {
            Expr::Constant(_) => "Constant".to_string(),
            Expr::Parameter => "Parameter".to_string(),
            Expr::Source => "Source".to_string(),
            Expr::Member { .. } => "MemberAccess".to_string(),
            Expr::Index { .. } => "Index".to_string(),
            Expr::Captured(_) => "Captured".to_string(),
            Expr::New { .. } => "New".to_string(),
            Expr::Unary { op, .. } => format!("{:?}", op),
            Expr::Binary { op, .. } => format!("{:?}", op),
            Expr::Call { method, .. } => format!("{:?}", method),
        }
    }

    /// 直下の子ノード
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_) | Expr::Parameter | Expr::Source | Expr::Captured(_) => Vec::new(),
            Expr::Member { target, .. } | Expr::Index { target, .. } => vec![target.as_ref()],
            Expr::New { args, .. } => args.iter().collect(),
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Call {
                source, argument, ..
            } => vec![source.as_ref(), argument.as_ref()],
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }
}

impl<R: Into<Expr>> std::ops::Add<R> for Expr {
    type Output = Expr;

    fn add(self, right: R) -> Expr {
        self.binary(BinaryOp::Add, right)
    }
}

impl<R: Into<Expr>> std::ops::Sub<R> for Expr {
    type Output = Expr;

    fn sub(self, right: R) -> Expr {
        self.binary(BinaryOp::Subtract, right)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

impl From<IssueField> for Expr {
    fn from(field: IssueField) -> Self {
        Expr::field(field)
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Expr::Constant(value.into())
                }
            }
        )*
    };
}

expr_from_value!(
    bool,
    i32,
    i64,
    u32,
    f64,
    String,
    &str,
    ComparableString,
    LiteralMatch,
    LiteralDateTime,
    NaiveDateTime,
    NaiveDate,
    DateTime<Utc>,
);
