//! 課題の取得・検索・保存・ワークフロー
use crate::client::JiraClient;
use crate::error::{Error, Result};
use crate::issue::{Issue, select_changed_fields};
use crate::models::{
    DEFAULT_ISSUE_FIELDS, IssueSearchOptions, IssueTransition, IssueUpdateOptions,
    PagedQueryResult, RemoteIssue,
    SearchResult, TransitionList, WorkflowTransitionUpdates,
};
use crate::models::user::user_reference;
use crate::query::{IssueSearch, JiraQueryProvider, JiraQueryable, JqlExpressionVisitor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// 更新時に null ではなく空配列で送るフィールド
const EMPTY_ARRAY_ON_CLEAR: [&str; 4] = ["labels", "components", "versions", "fixVersions"];

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraClient {
    /// 課題をキーで取得する
    pub async fn get_issue(&self, issue_key: &str) -> Result<Issue> {
        let remote = self.get_remote_issue(issue_key).await?;
        Ok(Issue::from_remote(
            remote,
            self.settings.enable_user_privacy_mode,
        ))
    }

    async fn get_remote_issue(&self, issue_key: &str) -> Result<RemoteIssue> {
        let resource = format!(
            "/rest/api/2/issue/{}?fields={}",
            urlencoding::encode(issue_key),
            DEFAULT_ISSUE_FIELDS.join(",")
        );
        let value = self
            .execute_request(reqwest::Method::GET, &resource, None)
            .await?;
        let codec = self.custom_field_codec().await?;
        RemoteIssue::from_json(value, &codec)
    }

    /// JQL で課題を検索する
    ///
    /// `take` が `None` の場合は `max_issues_per_request` 件まで取得する。
    pub async fn get_issues_from_jql(
        &self,
        jql: &str,
        skip: u32,
        take: Option<u32>,
    ) -> Result<PagedQueryResult<Issue>> {
        let max_results = take.unwrap_or(self.settings.max_issues_per_request);
        let options = IssueSearchOptions::new(jql)
            .start_at(skip)
            .max_results(max_results)
            .validate_query(self.settings.validate_query);

        tracing::debug!(jql, skip, max_results, "searching issues");
        let result: SearchResult = self.post("/rest/api/2/search", &options).await?;

        let codec = self.custom_field_codec().await?;
        let privacy_mode = self.settings.enable_user_privacy_mode;
        let issues = result
            .issues
            .into_iter()
            .map(|value| {
                RemoteIssue::from_json(value, &codec)
                    .map(|remote| Issue::from_remote(remote, privacy_mode))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PagedQueryResult::new(
            issues,
            result.start_at,
            result.max_results,
            result.total,
        ))
    }

    /// 課題のクエリ
    pub fn issues(&self) -> JiraQueryable {
        JiraQueryable::new(Arc::new(JiraQueryProvider::new(
            Arc::new(JqlExpressionVisitor),
            Arc::new(self.clone()),
        )))
    }

    /// 課題を作成し、サーバーの状態で置き換える
    pub async fn create_issue(&self, issue: &mut Issue) -> Result<String> {
        if let Some(key) = issue.key() {
            return Err(Error::InvalidOperation(format!(
                "Issue '{}' has already been created.",
                key
            )));
        }

        issue.set_privacy_mode(self.settings.enable_user_privacy_mode);
        let remote = issue.to_remote(self).await?;
        let codec = self.custom_field_codec().await?;
        let mut fields = remote.to_fields_json(&codec, issue.privacy_mode())?;
        fields.retain(|_, value| !value.is_null());

        let created: CreatedIssue = self
            .post("/rest/api/2/issue", &json!({ "fields": fields }))
            .await?;
        tracing::debug!(key = %created.key, "created issue");

        self.refresh_issue_as(issue, &created.key).await?;
        Ok(created.key)
    }

    /// 変更されたフィールドだけを送る
    ///
    /// 変更がなければリクエストは送らない。
    pub async fn update_issue(&self, issue: &mut Issue) -> Result<()> {
        self.update_issue_with(issue, &IssueUpdateOptions::default())
            .await
    }

    pub async fn update_issue_with(
        &self,
        issue: &mut Issue,
        options: &IssueUpdateOptions,
    ) -> Result<()> {
        let key = require_key(issue)?;
        let fields = self.changed_fields(issue).await?;
        if fields.is_empty() {
            tracing::debug!(key = %key, "no changes to update");
            return Ok(());
        }

        let mut resource = format!("/rest/api/2/issue/{}", urlencoding::encode(&key));
        if options.suppress_email_notification {
            resource.push_str("?notifyUsers=false");
        }
        self.put(&resource, &json!({ "fields": fields })).await?;
        Ok(())
    }

    /// 未作成なら作成、作成済みなら更新し、最新の状態を読み直す
    pub async fn save_changes(&self, issue: &mut Issue) -> Result<()> {
        if issue.key().is_none() {
            self.create_issue(issue).await?;
            return Ok(());
        }

        self.update_issue(issue).await?;
        self.refresh_issue(issue).await
    }

    /// サーバーから読み直し、スナップショットを置き換える
    pub async fn refresh_issue(&self, issue: &mut Issue) -> Result<()> {
        let key = require_key(issue)?;
        self.refresh_issue_as(issue, &key).await
    }

    async fn refresh_issue_as(&self, issue: &mut Issue, key: &str) -> Result<()> {
        let remote = self.get_remote_issue(key).await?;
        issue.reset(remote);
        Ok(())
    }

    pub async fn get_transitions(&self, issue_key: &str) -> Result<Vec<IssueTransition>> {
        let resource = format!(
            "/rest/api/2/issue/{}/transitions?expand=transitions.fields",
            urlencoding::encode(issue_key)
        );
        let list: TransitionList = self.get(&resource).await?;
        Ok(list.transitions)
    }

    /// ワークフローのアクションを実行する
    ///
    /// `action` が数値ならアクションの id、それ以外は名前として扱う。
    /// 変更されたフィールドも同じリクエストで送る。
    pub async fn execute_workflow_action(
        &self,
        issue: &mut Issue,
        action: &str,
        updates: Option<WorkflowTransitionUpdates>,
    ) -> Result<()> {
        let key = require_key(issue)?;

        let action_id = if action.parse::<u64>().is_ok() {
            action.to_string()
        } else {
            self.get_transitions(&key)
                .await?
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(action))
                .map(|t| t.id)
                .ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "Workflow action with name '{}' not found.",
                        action
                    ))
                })?
        };

        let mut body = Map::new();
        body.insert("transition".to_string(), json!({ "id": action_id }));

        let fields = self.changed_fields(issue).await?;
        if !fields.is_empty() {
            body.insert("fields".to_string(), Value::Object(fields));
        }
        if let Some(comment) = updates.and_then(|u| u.comment) {
            body.insert(
                "update".to_string(),
                json!({ "comment": [{ "add": { "body": comment } }] }),
            );
        }

        let resource = format!(
            "/rest/api/2/issue/{}/transitions",
            urlencoding::encode(&key)
        );
        self.execute_request(reqwest::Method::POST, &resource, Some(&Value::Object(body)))
            .await?;
        tracing::debug!(key = %key, action_id = %action_id, "executed workflow action");

        self.refresh_issue_as(issue, &key).await
    }

    pub async fn delete_issue(&self, issue_key: &str) -> Result<()> {
        let resource = format!("/rest/api/2/issue/{}", urlencoding::encode(issue_key));
        self.delete(&resource).await?;
        Ok(())
    }

    /// 担当者を変更する (`None` で未割り当て)
    pub async fn assign_issue(&self, issue_key: &str, assignee: Option<&str>) -> Result<()> {
        let privacy_mode = self.settings.enable_user_privacy_mode;
        let body = match assignee {
            Some(identifier) => user_reference(identifier, privacy_mode),
            None if privacy_mode => json!({ "accountId": null }),
            None => json!({ "name": null }),
        };
        let resource = format!(
            "/rest/api/2/issue/{}/assignee",
            urlencoding::encode(issue_key)
        );
        self.put(&resource, &body).await?;
        Ok(())
    }

    /// 差分に含まれるフィールドだけの `fields` オブジェクト
    async fn changed_fields(&self, issue: &mut Issue) -> Result<Map<String, Value>> {
        let changes = issue.field_changes(self).await?;
        if changes.is_empty() {
            return Ok(Map::new());
        }

        let remote = issue.to_remote(self).await?;
        let codec = self.custom_field_codec().await?;
        let all_fields = remote.to_fields_json(&codec, issue.privacy_mode())?;

        let mut fields = select_changed_fields(&all_fields, &changes);
        for name in EMPTY_ARRAY_ON_CLEAR {
            if let Some(value) = fields.get_mut(name) {
                if value.is_null() {
                    *value = json!([]);
                }
            }
        }
        Ok(fields)
    }
}

fn require_key(issue: &Issue) -> Result<String> {
    issue.key().map(str::to_string).ok_or_else(|| {
        Error::InvalidOperation("Issue has not been created on the server yet.".to_string())
    })
}

#[async_trait]
impl IssueSearch for JiraClient {
    async fn search_issues(
        &self,
        jql: &str,
        skip: u32,
        take: Option<u32>,
    ) -> Result<PagedQueryResult<Issue>> {
        self.get_issues_from_jql(jql, skip, take).await
    }
}
