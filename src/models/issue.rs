use super::datetime::option_jira_datetime;
use super::user::user_reference;
use super::{ProjectComponent, ProjectVersion, User};
use crate::error::Result;
use crate::issue::CustomFieldCodec;
use crate::issue::CustomFieldSerializer;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// サーバーから取得した課題のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssue {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "self")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    #[serde(default)]
    pub fields: RemoteIssueFields,

    /// 型情報を使って読み取ったカスタムフィールドの値
    #[serde(skip)]
    pub custom_field_values: Option<Vec<RemoteCustomFieldValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectReference>,
    #[serde(rename = "issuetype")]
    #[serde(default)]
    pub issue_type: Option<RemoteNamedEntity>,
    #[serde(default)]
    pub status: Option<RemoteNamedEntity>,
    #[serde(default)]
    pub priority: Option<RemoteNamedEntity>,
    #[serde(default)]
    pub resolution: Option<RemoteNamedEntity>,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub reporter: Option<User>,
    #[serde(default, with = "option_jira_datetime")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "option_jira_datetime")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(rename = "resolutiondate")]
    #[serde(default, with = "option_jira_datetime")]
    pub resolution_date: Option<DateTime<Utc>>,
    #[serde(rename = "duedate")]
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub components: Option<Vec<ProjectComponent>>,
    #[serde(rename = "versions")]
    #[serde(default)]
    pub affects_versions: Option<Vec<ProjectVersion>>,
    #[serde(rename = "fixVersions")]
    #[serde(default)]
    pub fix_versions: Option<Vec<ProjectVersion>>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<IssueReference>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<Votes>,

    // カスタムフィールドとその他のフィールドは動的に受け取る
    #[serde(flatten)]
    pub other_fields: HashMap<String, Value>,
}

/// id と名前だけを持つ参照 (ステータス、優先度、解決状況、課題タイプ)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteNamedEntity {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectReference {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueReference {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Votes {
    pub votes: i64,
    #[serde(rename = "hasVoted")]
    #[serde(default)]
    pub has_voted: bool,
}

/// スナップショット上のカスタムフィールドの値
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCustomFieldValue {
    pub custom_field_id: String,
    /// `None` は値が初期化されていない状態
    pub values: Option<Vec<String>>,
    pub serializer: Option<CustomFieldSerializer>,
    pub raw_value: Option<Value>,
}

impl RemoteIssue {
    pub fn from_json(value: Value, codec: &CustomFieldCodec) -> Result<Self> {
        let mut issue: RemoteIssue = serde_json::from_value(value)?;
        issue.custom_field_values = Some(issue.decode_custom_fields(codec));
        Ok(issue)
    }

    /// `customfield` で始まるフィールドを値の一覧に変換する (null は除外)
    pub fn decode_custom_fields(&self, codec: &CustomFieldCodec) -> Vec<RemoteCustomFieldValue> {
        let mut ids: Vec<&String> = self
            .fields
            .other_fields
            .iter()
            .filter(|(id, value)| id.starts_with("customfield") && !value.is_null())
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        ids.into_iter()
            .map(|id| codec.decode(id, &self.fields.other_fields[id]))
            .collect()
    }

    /// 作成/更新用の `fields` オブジェクトを組み立てる
    pub fn to_fields_json(&self, codec: &CustomFieldCodec, privacy_mode: bool) -> Result<Map<String, Value>> {
        let fields = &self.fields;
        let mut map = Map::new();

        map.insert("summary".to_string(), json!(fields.summary));
        map.insert("description".to_string(), json!(fields.description));
        map.insert("environment".to_string(), json!(fields.environment));
        map.insert(
            "assignee".to_string(),
            user_json(fields.assignee.as_ref(), privacy_mode),
        );
        map.insert(
            "reporter".to_string(),
            user_json(fields.reporter.as_ref(), privacy_mode),
        );
        map.insert("priority".to_string(), entity_json(fields.priority.as_ref()));
        map.insert("resolution".to_string(), entity_json(fields.resolution.as_ref()));
        map.insert("status".to_string(), entity_json(fields.status.as_ref()));
        map.insert("issuetype".to_string(), entity_json(fields.issue_type.as_ref()));
        map.insert(
            "duedate".to_string(),
            json!(fields.due_date.map(|d| d.format("%Y-%m-%d").to_string())),
        );
        map.insert("labels".to_string(), json!(fields.labels));
        map.insert(
            "components".to_string(),
            id_list_json(fields.components.as_ref().map(|c| c.iter().map(|c| c.id.as_str()).collect())),
        );
        map.insert(
            "versions".to_string(),
            id_list_json(fields.affects_versions.as_ref().map(|v| v.iter().map(|v| v.id.as_str()).collect())),
        );
        map.insert(
            "fixVersions".to_string(),
            id_list_json(fields.fix_versions.as_ref().map(|v| v.iter().map(|v| v.id.as_str()).collect())),
        );
        if let Some(project) = &fields.project {
            map.insert("project".to_string(), json!({ "key": project.key }));
        }
        if let Some(parent) = &fields.parent {
            map.insert("parent".to_string(), json!({ "key": parent.key }));
        }

        for value in self.custom_field_values.iter().flatten() {
            let encoded = match &value.values {
                Some(_) => codec.encode(value)?,
                None => Value::Null,
            };
            map.insert(value.custom_field_id.clone(), encoded);
        }

        Ok(map)
    }
}

fn user_json(user: Option<&User>, privacy_mode: bool) -> Value {
    user.and_then(|u| u.identifier(privacy_mode))
        .map(|identifier| user_reference(identifier, privacy_mode))
        .unwrap_or(Value::Null)
}

fn entity_json(entity: Option<&RemoteNamedEntity>) -> Value {
    match entity {
        Some(RemoteNamedEntity { id: Some(id), .. }) => json!({ "id": id }),
        Some(RemoteNamedEntity { name: Some(name), .. }) => json!({ "name": name }),
        _ => Value::Null,
    }
}

fn id_list_json(ids: Option<Vec<&str>>) -> Value {
    match ids {
        Some(ids) => Value::Array(ids.into_iter().map(|id| json!({ "id": id })).collect()),
        None => Value::Null,
    }
}

/// 課題更新時のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdateOptions {
    /// 通知メールを送らない (`notifyUsers=false`)
    pub suppress_email_notification: bool,
}

impl IssueUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress_email_notification(mut self, suppress: bool) -> Self {
        self.suppress_email_notification = suppress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_issue_json() -> Value {
        json!({
            "id": "10000",
            "key": "TST-1",
            "self": "https://example.atlassian.net/rest/api/2/issue/10000",
            "fields": {
                "summary": "Test Issue",
                "description": "This is a test issue",
                "project": {"id": "10000", "key": "TST", "name": "Test"},
                "issuetype": {"id": "1", "name": "Bug", "subtask": false},
                "priority": {"id": "3", "name": "Medium"},
                "status": {"id": "1", "name": "Open"},
                "assignee": null,
                "reporter": {"name": "admin", "displayName": "Admin"},
                "created": "2024-01-01T00:00:00.000+0000",
                "updated": "2024-01-02T00:00:00.000Z",
                "duedate": "2024-01-05",
                "labels": ["a", "b"],
                "components": [{"id": "100", "name": "Server"}],
                "fixVersions": [],
                "votes": {"votes": 2, "hasVoted": false},
                "customfield_10001": "Custom Value",
                "customfield_10002": null,
                "customfield_10003": [{"value": "red"}, {"value": "blue"}]
            }
        })
    }

    #[test]
    fn test_issue_deserialization() {
        let issue = RemoteIssue::from_json(sample_issue_json(), &CustomFieldCodec::default()).unwrap();

        assert_eq!(issue.key.as_deref(), Some("TST-1"));
        assert_eq!(issue.fields.summary.as_deref(), Some("Test Issue"));
        assert_eq!(issue.fields.project.as_ref().unwrap().key, "TST");
        assert_eq!(issue.fields.due_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(issue.fields.votes.as_ref().unwrap().votes, 2);
        assert!(issue.fields.assignee.is_none());
        assert!(issue.fields.created.is_some());

        let custom = issue.custom_field_values.unwrap();
        assert_eq!(custom.len(), 2);
        assert_eq!(custom[0].custom_field_id, "customfield_10001");
        assert_eq!(custom[0].values, Some(vec!["Custom Value".to_string()]));
        assert_eq!(
            custom[1].values,
            Some(vec!["red".to_string(), "blue".to_string()])
        );
    }

    #[test]
    fn test_to_fields_json() {
        let issue = RemoteIssue::from_json(sample_issue_json(), &CustomFieldCodec::default()).unwrap();

        let fields = issue.to_fields_json(&CustomFieldCodec::default(), false).unwrap();

        assert_eq!(fields["summary"], "Test Issue");
        assert_eq!(fields["priority"], json!({"id": "3"}));
        assert_eq!(fields["reporter"], json!({"name": "admin"}));
        assert_eq!(fields["assignee"], Value::Null);
        assert_eq!(fields["duedate"], "2024-01-05");
        assert_eq!(fields["components"], json!([{"id": "100"}]));
        assert_eq!(fields["versions"], Value::Null);
        assert_eq!(fields["project"], json!({"key": "TST"}));
        assert_eq!(fields["customfield_10001"], "Custom Value");
    }
}
