//! 遅延実行される課題クエリ
//!
//! `JiraQueryable` の組み立てでは通信しない。`to_vec` などの終端操作で
//! JQL に変換して1回だけ検索し、JQL にできない操作は取得した課題に適用する。
use super::expr::{Expr, QueryMethod, Value};
use super::visitor::{JqlData, JqlTranslator};
use crate::error::{Error, Result};
use crate::field::IssueField;
use crate::issue::Issue;
use crate::models::PagedQueryResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// JQL で課題を検索するもの
#[async_trait]
pub trait IssueSearch: Send + Sync {
    /// `take` が `None` の場合は実装側の既定の件数
    async fn search_issues(
        &self,
        jql: &str,
        skip: u32,
        take: Option<u32>,
    ) -> Result<PagedQueryResult<Issue>>;
}

pub type IssuePredicate = Arc<dyn Fn(&Issue) -> bool + Send + Sync>;

pub struct JiraQueryProvider {
    translator: Arc<dyn JqlTranslator>,
    issues: Arc<dyn IssueSearch>,
}

impl JiraQueryProvider {
    pub fn new(translator: Arc<dyn JqlTranslator>, issues: Arc<dyn IssueSearch>) -> Self {
        Self { translator, issues }
    }

    pub fn translate(&self, expr: &Expr) -> Result<JqlData> {
        self.translator.process(expr)
    }

    /// 変換して1回検索し、ローカル操作を順に適用する
    pub async fn execute(&self, expr: &Expr, local: &[IssuePredicate]) -> Result<Vec<Issue>> {
        let jql = self.translate(expr)?;
        let page = self
            .issues
            .search_issues(
                &jql.expression,
                jql.skip_results.unwrap_or(0),
                jql.number_of_results,
            )
            .await?;

        let fetched = page.len();
        let issues: Vec<Issue> = page
            .into_iter()
            .filter(|issue| local.iter().all(|predicate| predicate(issue)))
            .collect();

        if !local.is_empty() {
            tracing::debug!(
                fetched,
                kept = issues.len(),
                "applied local filters to query results"
            );
        }
        Ok(issues)
    }
}

impl fmt::Debug for JiraQueryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraQueryProvider").finish_non_exhaustive()
    }
}

/// 課題のクエリ
///
/// 組み立ては元の値を変えずに新しいクエリを返す。
#[derive(Clone)]
pub struct JiraQueryable {
    provider: Arc<JiraQueryProvider>,
    expression: Expr,
    local: Vec<IssuePredicate>,
}

impl JiraQueryable {
    pub fn new(provider: Arc<JiraQueryProvider>) -> Self {
        Self {
            provider,
            expression: Expr::Source,
            local: Vec::new(),
        }
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    fn call(&self, method: QueryMethod, argument: Expr) -> Self {
        Self {
            provider: self.provider.clone(),
            expression: Expr::Call {
                method,
                source: Box::new(self.expression.clone()),
                argument: Box::new(argument),
            },
            local: self.local.clone(),
        }
    }

    /// JQL に変換される条件
    pub fn filter(&self, predicate: Expr) -> Self {
        self.call(QueryMethod::Where, predicate)
    }

    pub fn order_by(&self, field: IssueField) -> Self {
        self.call(QueryMethod::OrderBy, Expr::field(field))
    }

    pub fn order_by_descending(&self, field: IssueField) -> Self {
        self.call(QueryMethod::OrderByDescending, Expr::field(field))
    }

    pub fn then_by(&self, field: IssueField) -> Self {
        self.call(QueryMethod::ThenBy, Expr::field(field))
    }

    pub fn then_by_descending(&self, field: IssueField) -> Self {
        self.call(QueryMethod::ThenByDescending, Expr::field(field))
    }

    pub fn take(&self, count: u32) -> Self {
        self.call(QueryMethod::Take, Expr::Constant(Value::from(count)))
    }

    pub fn skip(&self, count: u32) -> Self {
        self.call(QueryMethod::Skip, Expr::Constant(Value::from(count)))
    }

    /// 取得後の課題に適用する条件 (JQL には含まれない)
    pub fn filter_local<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Issue) -> bool + Send + Sync + 'static,
    {
        let mut next = self.clone();
        next.local.push(Arc::new(predicate));
        next
    }

    pub fn to_jql(&self) -> Result<JqlData> {
        self.provider.translate(&self.expression)
    }

    pub async fn to_vec(&self) -> Result<Vec<Issue>> {
        self.provider.execute(&self.expression, &self.local).await
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.to_vec().await?.len())
    }

    pub async fn any(&self) -> Result<bool> {
        Ok(!self.to_vec().await?.is_empty())
    }

    pub async fn first_or_none(&self) -> Result<Option<Issue>> {
        Ok(self.to_vec().await?.into_iter().next())
    }

    /// 結果が空の場合は `InvalidOperation`
    pub async fn first(&self) -> Result<Issue> {
        self.first_or_none()
            .await?
            .ok_or_else(|| Error::InvalidOperation("Sequence contains no elements".to_string()))
    }
}

impl fmt::Debug for JiraQueryable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraQueryable")
            .field("expression", &self.expression)
            .field("local_filters", &self.local.len())
            .finish()
    }
}
