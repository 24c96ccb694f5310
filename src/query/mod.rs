pub mod evaluator;
pub mod expr;
pub mod literal;
pub mod operators;
pub mod provider;
pub mod visitor;

pub use evaluator::partial_eval;
pub use expr::{BinaryOp, CapturedError, Expr, LiteralKind, QueryMethod, UnaryOp, Value};
pub use literal::{ComparableString, LiteralDateTime, LiteralMatch};
pub use provider::{IssuePredicate, IssueSearch, JiraQueryProvider, JiraQueryable};
pub use visitor::{JqlData, JqlExpressionVisitor, JqlTranslator};
