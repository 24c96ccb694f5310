/// 参照データの取得口
///
/// 課題の名前付きエンティティやカスタムフィールドを解決するときに使う。
/// `JiraClient` はキャッシュ経由で実装し、オフラインでは `StaticReferenceData` を使う。
use crate::entity::NamedEntity;
use crate::error::Result;
use crate::models::{CustomField, CustomFieldFetchOptions, ProjectComponent, ProjectVersion};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Status,
    Priority,
    Resolution,
    IssueType,
}

impl EntityKind {
    /// エラーメッセージに使う型名
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Status => "IssueStatus",
            EntityKind::Priority => "IssuePriority",
            EntityKind::Resolution => "IssueResolution",
            EntityKind::IssueType => "IssueType",
        }
    }
}

#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn named_entities(&self, kind: EntityKind) -> Result<Vec<NamedEntity>>;

    /// プロジェクトで使われている課題タイプ
    async fn project_issue_types(&self, project_key: &str) -> Result<Vec<NamedEntity>>;

    async fn custom_fields(&self) -> Result<Vec<CustomField>>;

    async fn custom_fields_scoped(
        &self,
        options: &CustomFieldFetchOptions,
    ) -> Result<Vec<CustomField>>;

    async fn versions(&self, project_key: &str) -> Result<Vec<ProjectVersion>>;

    async fn components(&self, project_key: &str) -> Result<Vec<ProjectComponent>>;
}

/// メモリ上の参照データ
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceData {
    entities: HashMap<EntityKind, Vec<NamedEntity>>,
    project_issue_types: HashMap<String, Vec<NamedEntity>>,
    custom_fields: Vec<CustomField>,
    project_custom_fields: HashMap<String, Vec<CustomField>>,
    versions: HashMap<String, Vec<ProjectVersion>>,
    components: HashMap<String, Vec<ProjectComponent>>,
}

impl StaticReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, kind: EntityKind, id: &str, name: &str) -> Self {
        self.entities
            .entry(kind)
            .or_default()
            .push(NamedEntity::resolved(id, name));
        self
    }

    pub fn project_issue_type(mut self, project_key: &str, id: &str, name: &str) -> Self {
        self.project_issue_types
            .entry(project_key.to_string())
            .or_default()
            .push(NamedEntity::resolved(id, name));
        self
    }

    /// `project_key` を指定するとスコープ付き検索でそのプロジェクトに現れる
    pub fn custom_field(mut self, field: CustomField, project_key: Option<&str>) -> Self {
        if let Some(project_key) = project_key {
            self.project_custom_fields
                .entry(project_key.to_string())
                .or_default()
                .push(field.clone());
        }
        self.custom_fields.push(field);
        self
    }

    pub fn version(mut self, project_key: &str, version: ProjectVersion) -> Self {
        self.versions
            .entry(project_key.to_string())
            .or_default()
            .push(version);
        self
    }

    pub fn component(mut self, project_key: &str, component: ProjectComponent) -> Self {
        self.components
            .entry(project_key.to_string())
            .or_default()
            .push(component);
        self
    }
}

#[async_trait]
impl ReferenceData for StaticReferenceData {
    async fn named_entities(&self, kind: EntityKind) -> Result<Vec<NamedEntity>> {
        Ok(self.entities.get(&kind).cloned().unwrap_or_default())
    }

    async fn project_issue_types(&self, project_key: &str) -> Result<Vec<NamedEntity>> {
        Ok(self
            .project_issue_types
            .get(project_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn custom_fields(&self) -> Result<Vec<CustomField>> {
        Ok(self.custom_fields.clone())
    }

    async fn custom_fields_scoped(
        &self,
        options: &CustomFieldFetchOptions,
    ) -> Result<Vec<CustomField>> {
        if options.project_keys.is_empty() {
            return Ok(self.custom_fields.clone());
        }

        let mut fields: Vec<CustomField> = Vec::new();
        for key in &options.project_keys {
            for field in self.project_custom_fields.get(key).into_iter().flatten() {
                if !fields.iter().any(|f| f.id == field.id) {
                    fields.push(field.clone());
                }
            }
        }
        Ok(fields)
    }

    async fn versions(&self, project_key: &str) -> Result<Vec<ProjectVersion>> {
        Ok(self.versions.get(project_key).cloned().unwrap_or_default())
    }

    async fn components(&self, project_key: &str) -> Result<Vec<ProjectComponent>> {
        Ok(self.components.get(project_key).cloned().unwrap_or_default())
    }
}
