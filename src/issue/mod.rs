pub mod collections;
pub mod custom_fields;
pub mod diff;
pub mod serializers;

pub use collections::{
    CollectionEntity, IssueLabelCollection, NamedEntityCollection, ProjectComponentCollection,
    ProjectVersionCollection,
};
pub use custom_fields::{
    CascadingSelectValue, CustomFieldScope, CustomFieldValue, CustomFieldValueCollection,
};
pub use diff::{FieldChange, FieldChangeProvider, select_changed_fields};
pub use serializers::{CustomFieldCodec, CustomFieldSerializer};

use crate::entity::{IssuePriority, IssueResolution, IssueStatus, IssueType, NamedConstant, NamedEntity};
use crate::error::Result;
use crate::field::{FIELD_DESCRIPTORS, FieldKind, IssueField};
use crate::models::{
    IssueReference, ProjectReference, RemoteIssue, RemoteNamedEntity, User, format_short_date,
};
use crate::reference::ReferenceData;
use chrono::{DateTime, NaiveDate, Utc};

/// 編集可能な課題
///
/// サーバーから取得した時点のスナップショットを保持し、
/// 保存時にはスナップショットとの差分だけを送る。
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    id: Option<String>,
    key: Option<String>,
    project: String,
    parent_issue_key: Option<String>,
    status: Option<IssueStatus>,
    issue_type: Option<IssueType>,
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    resolution_date: Option<DateTime<Utc>>,
    votes: Option<i64>,
    privacy_mode: bool,
    original: RemoteIssue,

    pub summary: Option<String>,
    pub description: Option<String>,
    pub environment: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub priority: Option<IssuePriority>,
    pub resolution: Option<IssueResolution>,
    pub due_date: Option<NaiveDate>,
    pub labels: IssueLabelCollection,
    pub components: ProjectComponentCollection,
    pub affects_versions: ProjectVersionCollection,
    pub fix_versions: ProjectVersionCollection,
    pub custom_fields: CustomFieldValueCollection,
}

impl Issue {
    /// 新しい課題 (未作成)
    pub fn new(project_key: impl Into<String>) -> Self {
        let remote = RemoteIssue {
            fields: crate::models::RemoteIssueFields {
                project: Some(ProjectReference {
                    key: project_key.into(),
                    ..ProjectReference::default()
                }),
                ..Default::default()
            },
            ..RemoteIssue::default()
        };
        Self::from_remote(remote, false)
    }

    /// 親課題を持つ新しいサブタスク
    pub fn new_sub_task(project_key: impl Into<String>, parent_issue_key: impl Into<String>) -> Self {
        let mut issue = Self::new(project_key);
        let parent = IssueReference {
            id: None,
            key: parent_issue_key.into(),
        };
        issue.original.fields.parent = Some(parent.clone());
        issue.parent_issue_key = Some(parent.key);
        issue
    }

    pub fn from_remote(remote: RemoteIssue, privacy_mode: bool) -> Self {
        let fields = &remote.fields;
        let project = fields
            .project
            .as_ref()
            .map(|p| p.key.clone())
            .unwrap_or_default();

        let issue_type = fields
            .issue_type
            .as_ref()
            .and_then(|remote_type| {
                NamedEntity::from_remote(remote_type).map(|entity| {
                    let mut issue_type = IssueType::new(entity).in_project(project.clone());
                    issue_type.is_sub_task = remote_type.subtask.unwrap_or(false);
                    issue_type
                })
            });

        Self {
            id: remote.id.clone(),
            key: remote.key.clone(),
            parent_issue_key: fields.parent.as_ref().map(|p| p.key.clone()),
            status: named(fields.status.as_ref()).map(IssueStatus::new),
            issue_type,
            created: fields.created,
            updated: fields.updated,
            resolution_date: fields.resolution_date,
            votes: fields.votes.as_ref().map(|v| v.votes),
            privacy_mode,
            summary: fields.summary.clone(),
            description: fields.description.clone(),
            environment: fields.environment.clone(),
            assignee: user_identifier(fields.assignee.as_ref(), privacy_mode),
            reporter: user_identifier(fields.reporter.as_ref(), privacy_mode),
            priority: named(fields.priority.as_ref()).map(IssuePriority::new),
            resolution: named(fields.resolution.as_ref()).map(IssueResolution::new),
            due_date: fields.due_date,
            labels: IssueLabelCollection::new(fields.labels.clone().unwrap_or_default()),
            components: ProjectComponentCollection::new(
                "components",
                project.clone(),
                fields.components.clone().unwrap_or_default(),
            ),
            affects_versions: ProjectVersionCollection::new(
                "versions",
                project.clone(),
                fields.affects_versions.clone().unwrap_or_default(),
            ),
            fix_versions: ProjectVersionCollection::new(
                "fixVersions",
                project.clone(),
                fields.fix_versions.clone().unwrap_or_default(),
            ),
            custom_fields: CustomFieldValueCollection::from_remote(
                remote.custom_field_values.as_deref(),
            ),
            project,
            original: remote,
        }
    }

    /// スナップショットごと置き換える
    pub(crate) fn reset(&mut self, remote: RemoteIssue) {
        *self = Self::from_remote(remote, self.privacy_mode);
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn parent_issue_key(&self) -> Option<&str> {
        self.parent_issue_key.as_deref()
    }

    pub fn status(&self) -> Option<&IssueStatus> {
        self.status.as_ref()
    }

    pub fn issue_type(&self) -> Option<&IssueType> {
        self.issue_type.as_ref()
    }

    /// 課題タイプを設定する (課題のプロジェクトに関連付けられる)
    pub fn set_issue_type(&mut self, issue_type: impl Into<IssueType>) {
        let mut issue_type = issue_type.into();
        issue_type.project_key = Some(self.project.clone());
        self.issue_type = Some(issue_type);
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    pub fn resolution_date(&self) -> Option<DateTime<Utc>> {
        self.resolution_date
    }

    pub fn votes(&self) -> Option<i64> {
        self.votes
    }

    pub fn custom_field_scope(&self) -> CustomFieldScope<'_> {
        CustomFieldScope {
            project_key: &self.project,
            issue_type: self.issue_type.as_ref(),
        }
    }

    /// 名前でカスタムフィールドの値を取得
    pub async fn custom_field(
        &self,
        refs: &dyn ReferenceData,
        name: &str,
    ) -> Result<Option<&CustomFieldValue>> {
        self.custom_fields
            .get(refs, self.custom_field_scope(), name)
            .await
    }

    /// 名前でカスタムフィールドの値を設定 (`None` はクリア)
    pub async fn set_custom_field(
        &mut self,
        refs: &dyn ReferenceData,
        name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let scope = CustomFieldScope {
            project_key: &self.project,
            issue_type: self.issue_type.as_ref(),
        };
        self.custom_fields
            .set(refs, scope, name, value.map(str::to_string))
            .await
    }

    pub async fn add_custom_field(
        &mut self,
        refs: &dyn ReferenceData,
        name: &str,
        values: Vec<String>,
        serializer: Option<CustomFieldSerializer>,
    ) -> Result<()> {
        let scope = CustomFieldScope {
            project_key: &self.project,
            issue_type: self.issue_type.as_ref(),
        };
        self.custom_fields
            .add(refs, scope, name, values, serializer)
            .await?;
        Ok(())
    }

    /// 名前付きエンティティの id と名前を参照データで補う
    pub async fn resolve_named_entities(&mut self, refs: &dyn ReferenceData) -> Result<()> {
        if let Some(priority) = &mut self.priority {
            priority.load_id_and_name(refs).await?;
        }
        if let Some(resolution) = &mut self.resolution {
            resolution.load_id_and_name(refs).await?;
        }
        if let Some(status) = &mut self.status {
            status.load_id_and_name(refs).await?;
        }
        if let Some(issue_type) = &mut self.issue_type {
            issue_type.project_key = Some(self.project.clone());
            issue_type.load_id_and_name(refs).await?;
        }
        Ok(())
    }

    /// スナップショットから変化したフィールドの一覧
    ///
    /// スカラー値は文字列表現で比較し、コレクションはそれぞれの差分を使う。
    pub async fn field_changes(&mut self, refs: &dyn ReferenceData) -> Result<Vec<FieldChange>> {
        self.resolve_named_entities(refs).await?;

        let mut changes = Vec::new();
        for descriptor in FIELD_DESCRIPTORS.iter() {
            let Some(remote_name) = descriptor.remote_name else {
                continue;
            };

            if descriptor.kind == FieldKind::Collection {
                changes.extend(self.collection_changes(descriptor.field));
                continue;
            }

            let local = self.local_string(descriptor.field);
            let remote = self.remote_string(descriptor.field);
            if local.as_deref().unwrap_or_default() != remote.as_deref().unwrap_or_default() {
                changes.push(FieldChange::new(remote_name, local.into_iter().collect()));
            }
        }
        changes.extend(self.custom_fields.field_changes());

        tracing::debug!(
            key = self.key.as_deref().unwrap_or_default(),
            changed = ?changes.iter().map(|c| c.field_id.as_str()).collect::<Vec<_>>(),
            "computed issue changes"
        );
        Ok(changes)
    }

    fn collection_changes(&self, field: IssueField) -> Vec<FieldChange> {
        match field {
            IssueField::Components => self.components.field_changes(),
            IssueField::AffectsVersions => self.affects_versions.field_changes(),
            IssueField::FixVersions => self.fix_versions.field_changes(),
            IssueField::Labels => self.labels.field_changes(),
            _ => Vec::new(),
        }
    }

    fn local_string(&self, field: IssueField) -> Option<String> {
        match field {
            IssueField::Summary => self.summary.clone(),
            IssueField::Description => self.description.clone(),
            IssueField::Environment => self.environment.clone(),
            IssueField::Assignee => self.assignee.clone(),
            IssueField::Reporter => self.reporter.clone(),
            IssueField::Key => self.key.clone(),
            IssueField::Project => Some(self.project.clone()),
            IssueField::Priority => self.priority.as_ref().and_then(|e| e.id()).map(str::to_string),
            IssueField::Resolution => self.resolution.as_ref().and_then(|e| e.id()).map(str::to_string),
            IssueField::Status => self.status.as_ref().and_then(|e| e.id()).map(str::to_string),
            IssueField::Type => self.issue_type.as_ref().and_then(|e| e.id()).map(str::to_string),
            IssueField::Created => self.created.map(|d| format_short_date(&d.date_naive())),
            IssueField::Updated => self.updated.map(|d| format_short_date(&d.date_naive())),
            IssueField::DueDate => self.due_date.as_ref().map(format_short_date),
            IssueField::ResolutionDate => self
                .resolution_date
                .map(|d| format_short_date(&d.date_naive())),
            IssueField::Votes => self.votes.map(|v| v.to_string()),
            IssueField::Components
            | IssueField::AffectsVersions
            | IssueField::FixVersions
            | IssueField::Labels => None,
        }
    }

    fn remote_string(&self, field: IssueField) -> Option<String> {
        let fields = &self.original.fields;
        let entity_id = |entity: Option<&RemoteNamedEntity>| entity.and_then(|e| e.id.clone());

        match field {
            IssueField::Summary => fields.summary.clone(),
            IssueField::Description => fields.description.clone(),
            IssueField::Environment => fields.environment.clone(),
            IssueField::Assignee => user_identifier(fields.assignee.as_ref(), self.privacy_mode),
            IssueField::Reporter => user_identifier(fields.reporter.as_ref(), self.privacy_mode),
            IssueField::Key => self.original.key.clone(),
            IssueField::Project => fields.project.as_ref().map(|p| p.key.clone()),
            IssueField::Priority => entity_id(fields.priority.as_ref()),
            IssueField::Resolution => entity_id(fields.resolution.as_ref()),
            IssueField::Status => entity_id(fields.status.as_ref()),
            IssueField::Type => entity_id(fields.issue_type.as_ref()),
            IssueField::Created => fields.created.map(|d| format_short_date(&d.date_naive())),
            IssueField::Updated => fields.updated.map(|d| format_short_date(&d.date_naive())),
            IssueField::DueDate => fields.due_date.as_ref().map(format_short_date),
            IssueField::ResolutionDate => fields
                .resolution_date
                .map(|d| format_short_date(&d.date_naive())),
            IssueField::Votes => fields.votes.as_ref().map(|v| v.votes.to_string()),
            IssueField::Components
            | IssueField::AffectsVersions
            | IssueField::FixVersions
            | IssueField::Labels => None,
        }
    }

    /// 送信用のリモート表現 (名前付きエンティティは解決済み)
    pub async fn to_remote(&mut self, refs: &dyn ReferenceData) -> Result<RemoteIssue> {
        self.resolve_named_entities(refs).await?;

        let mut remote = self.original.clone();
        let privacy_mode = self.privacy_mode;
        let fields = &mut remote.fields;

        fields.summary = self.summary.clone();
        fields.description = self.description.clone();
        fields.environment = self.environment.clone();
        fields.assignee = self.assignee.as_deref().map(|id| user_from_identifier(id, privacy_mode));
        fields.reporter = self.reporter.as_deref().map(|id| user_from_identifier(id, privacy_mode));
        fields.priority = self.priority.as_ref().map(|e| e.entity().to_remote());
        fields.resolution = self.resolution.as_ref().map(|e| e.entity().to_remote());
        fields.status = self.status.as_ref().map(|e| e.entity().to_remote());
        fields.issue_type = self.issue_type.as_ref().map(|e| e.entity().to_remote());
        fields.due_date = self.due_date;
        fields.labels = non_empty(self.labels.as_slice());
        fields.components = non_empty(self.components.as_slice());
        fields.affects_versions = non_empty(self.affects_versions.as_slice());
        fields.fix_versions = non_empty(self.fix_versions.as_slice());
        fields.parent = self.parent_issue_key.as_ref().map(|key| IssueReference {
            id: None,
            key: key.clone(),
        });
        remote.custom_field_values = Some(self.custom_fields.to_remote_values());

        Ok(remote)
    }

    pub(crate) fn privacy_mode(&self) -> bool {
        self.privacy_mode
    }

    pub(crate) fn set_privacy_mode(&mut self, privacy_mode: bool) {
        self.privacy_mode = privacy_mode;
    }
}

fn named(remote: Option<&RemoteNamedEntity>) -> Option<NamedEntity> {
    remote.and_then(NamedEntity::from_remote)
}

fn user_identifier(user: Option<&User>, privacy_mode: bool) -> Option<String> {
    user.and_then(|u| u.identifier(privacy_mode))
        .map(str::to_string)
}

fn user_from_identifier(identifier: &str, privacy_mode: bool) -> User {
    if privacy_mode {
        User {
            account_id: Some(identifier.to_string()),
            ..User::default()
        }
    } else {
        User {
            name: Some(identifier.to_string()),
            ..User::default()
        }
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomField, ProjectVersion};
    use crate::reference::{EntityKind, StaticReferenceData};
    use serde_json::json;

    fn refs() -> StaticReferenceData {
        StaticReferenceData::new()
            .entity(EntityKind::Priority, "1", "Blocker")
            .entity(EntityKind::Priority, "3", "Major")
            .entity(EntityKind::Status, "1", "Open")
            .entity(EntityKind::IssueType, "1", "Bug")
            .entity(EntityKind::IssueType, "3", "Task")
            .entity(EntityKind::Resolution, "1", "Fixed")
            .custom_field(
                CustomField {
                    id: "customfield_10001".to_string(),
                    name: "Story Points".to_string(),
                    custom_type: None,
                },
                Some("TST"),
            )
            .version(
                "TST",
                ProjectVersion {
                    id: "10100".to_string(),
                    name: "2.0".to_string(),
                    self_url: None,
                    description: None,
                    archived: false,
                    released: false,
                    release_date: None,
                    project_id: None,
                },
            )
    }

    fn fetched_issue() -> Issue {
        let remote = RemoteIssue::from_json(
            json!({
                "id": "10000",
                "key": "TST-1",
                "fields": {
                    "summary": "Original summary",
                    "description": "Original description",
                    "project": {"key": "TST"},
                    "issuetype": {"id": "1", "name": "Bug"},
                    "priority": {"id": "3", "name": "Major"},
                    "status": {"id": "1", "name": "Open"},
                    "reporter": {"name": "admin"},
                    "created": "2024-01-01T10:00:00.000+0000",
                    "updated": "2024-01-02T10:00:00.000+0000",
                    "duedate": "2024-02-01",
                    "labels": ["a", "b"],
                    "components": [],
                    "fixVersions": [{"id": "10000", "name": "1.0"}],
                    "customfield_10001": "5"
                }
            }),
            &CustomFieldCodec::default(),
        )
        .unwrap();
        Issue::from_remote(remote, false)
    }

    #[tokio::test]
    async fn test_unmodified_issue_has_no_changes() {
        // Given: 取得したままの課題
        let mut issue = fetched_issue();

        // When: 差分を計算
        let changes = issue.field_changes(&refs()).await.unwrap();

        // Then: 変更はない
        assert!(changes.is_empty(), "unexpected changes: {:?}", changes);
    }

    #[tokio::test]
    async fn test_scalar_and_entity_changes() {
        // Given: 要約、優先度 (名前のみ)、期日を変更
        let mut issue = fetched_issue();
        issue.summary = Some("New summary".to_string());
        issue.priority = Some(IssuePriority::from_name("blocker"));
        issue.due_date = None;

        // When
        let changes = issue.field_changes(&refs()).await.unwrap();

        // Then: 優先度は解決済みの id で比較される
        assert_eq!(
            changes,
            vec![
                FieldChange::new("summary", vec!["New summary".to_string()]),
                FieldChange::new("priority", vec!["1".to_string()]),
                FieldChange::new("duedate", Vec::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_entity_by_name_is_not_a_change() {
        let mut issue = fetched_issue();
        issue.priority = Some(IssuePriority::from_name("major"));

        let changes = issue.field_changes(&refs()).await.unwrap();

        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_collection_and_custom_field_changes_in_order() {
        // Given: ラベル、修正バージョン、カスタムフィールドを変更
        let refs = refs();
        let mut issue = fetched_issue();
        issue.labels.remove("a");
        issue.labels.add("c");
        issue.fix_versions.add_by_name(&refs, "2.0").await.unwrap();
        issue
            .set_custom_field(&refs, "Story Points", Some("8"))
            .await
            .unwrap();

        // When
        let changes = issue.field_changes(&refs).await.unwrap();

        // Then: 宣言順に並び、カスタムフィールドは最後
        assert_eq!(
            changes,
            vec![
                FieldChange::new("fixVersions", vec!["10000".to_string(), "10100".to_string()]),
                FieldChange::new("labels", vec!["b".to_string(), "c".to_string()]),
                FieldChange::new("customfield_10001", vec!["8".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_name_fails() {
        let mut issue = fetched_issue();
        issue.resolution = Some(IssueResolution::from_name("Won't Do"));

        let err = issue.field_changes(&refs()).await.unwrap_err();

        assert!(err.to_string().contains("Available: [1:Fixed]"));
    }

    #[tokio::test]
    async fn test_to_remote_for_new_issue() {
        // Given: 新しい課題 (名前だけで課題タイプを指定)
        let refs = refs();
        let mut issue = Issue::new("TST");
        issue.summary = Some("Created".to_string());
        issue.set_issue_type("Task");
        issue.assignee = Some("bob".to_string());

        // When: 送信用に変換
        let remote = issue.to_remote(&refs).await.unwrap();
        let fields = remote
            .to_fields_json(&CustomFieldCodec::default(), false)
            .unwrap();

        // Then: id が解決され、ユーザーは name で参照される
        assert_eq!(fields["issuetype"], json!({"id": "3"}));
        assert_eq!(fields["assignee"], json!({"name": "bob"}));
        assert_eq!(fields["project"], json!({"key": "TST"}));
        assert_eq!(fields["components"], serde_json::Value::Null);
        assert_eq!(fields["labels"], serde_json::Value::Null);
        assert!(issue.key().is_none());
    }

    #[test]
    fn test_new_sub_task_keeps_parent() {
        let issue = Issue::new_sub_task("TST", "TST-1");

        assert_eq!(issue.parent_issue_key(), Some("TST-1"));
        assert_eq!(issue.project(), "TST");
    }

    #[test]
    fn test_reset_replaces_snapshot() {
        let mut issue = fetched_issue();
        issue.summary = Some("local edit".to_string());

        let mut remote = issue.original.clone();
        remote.fields.summary = Some("server value".to_string());
        issue.reset(remote);

        assert_eq!(issue.summary.as_deref(), Some("server value"));
        assert_eq!(issue.original.fields.summary.as_deref(), Some("server value"));
    }
}
