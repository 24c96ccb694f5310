//! 参照データの取得 (キャッシュ経由)
use crate::cache::EntityDictionary;
use crate::client::JiraClient;
use crate::entity::NamedEntity;
use crate::error::{Error, Result};
use crate::issue::CustomFieldCodec;
use crate::models::{
    ComponentCreationInfo, CustomField, CustomFieldFetchOptions, Field, IssueLinkType,
    IssueLinkTypeList, JiraEntity, Project, ProjectComponent, ProjectVersion, RemoteIssueType,
    RemotePriority, RemoteResolution, RemoteStatus, VersionCreationInfo,
};
use crate::reference::{EntityKind, ReferenceData};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

impl JiraClient {
    pub async fn get_statuses(&self) -> Result<Arc<EntityDictionary<RemoteStatus>>> {
        self.cache
            .statuses
            .get_or_populate(|| self.get("/rest/api/2/status"))
            .await
    }

    pub async fn get_priorities(&self) -> Result<Arc<EntityDictionary<RemotePriority>>> {
        self.cache
            .priorities
            .get_or_populate(|| self.get("/rest/api/2/priority"))
            .await
    }

    pub async fn get_resolutions(&self) -> Result<Arc<EntityDictionary<RemoteResolution>>> {
        self.cache
            .resolutions
            .get_or_populate(|| self.get("/rest/api/2/resolution"))
            .await
    }

    pub async fn get_issue_types(&self) -> Result<Arc<EntityDictionary<RemoteIssueType>>> {
        self.cache
            .issue_types
            .get_or_populate(|| self.get("/rest/api/2/issuetype"))
            .await
    }

    /// プロジェクトで使われている課題タイプ
    pub async fn get_issue_types_for_project(
        &self,
        project_key: &str,
    ) -> Result<Arc<EntityDictionary<RemoteIssueType>>> {
        let resource = format!(
            "/rest/api/2/project/{}/statuses",
            urlencoding::encode(project_key)
        );
        self.cache
            .project_issue_types
            .get_or_populate(project_key, || self.get(&resource))
            .await
    }

    pub async fn get_issue_link_types(&self) -> Result<Arc<EntityDictionary<IssueLinkType>>> {
        self.cache
            .link_types
            .get_or_populate(|| async {
                let list: IssueLinkTypeList = self.get("/rest/api/2/issueLinkType").await?;
                Ok(list.issue_link_types)
            })
            .await
    }

    /// サーバー全体のカスタムフィールド
    pub async fn get_custom_fields(&self) -> Result<Arc<EntityDictionary<CustomField>>> {
        self.cache
            .custom_fields
            .get_or_populate(|| async {
                let fields: Vec<Field> = self.get("/rest/api/2/field").await?;
                Ok(fields
                    .into_iter()
                    .filter(Field::is_custom)
                    .map(CustomField::from)
                    .collect())
            })
            .await
    }

    /// プロジェクト・課題タイプで絞り込んだカスタムフィールド
    ///
    /// 条件が空の場合はサーバー全体の一覧を返す。
    pub async fn get_custom_fields_with(
        &self,
        options: &CustomFieldFetchOptions,
    ) -> Result<Arc<EntityDictionary<CustomField>>> {
        if options.is_empty() {
            return self.get_custom_fields().await;
        }

        let resource = format!("/rest/api/2/issue/createmeta?{}", options.to_query_string());
        self.cache
            .scoped_custom_fields
            .get_or_populate(&options.cache_key(), || async {
                let meta = self
                    .execute_request(reqwest::Method::GET, &resource, None)
                    .await?;
                custom_fields_from_create_meta(&meta, options)
            })
            .await
    }

    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        self.get("/rest/api/2/project").await
    }

    pub async fn get_project_versions(
        &self,
        project_key: &str,
    ) -> Result<Arc<EntityDictionary<ProjectVersion>>> {
        let resource = format!(
            "/rest/api/2/project/{}/versions",
            urlencoding::encode(project_key)
        );
        self.cache
            .versions
            .get_or_populate(project_key, || self.get(&resource))
            .await
    }

    pub async fn get_project_components(
        &self,
        project_key: &str,
    ) -> Result<Arc<EntityDictionary<ProjectComponent>>> {
        let resource = format!(
            "/rest/api/2/project/{}/components",
            urlencoding::encode(project_key)
        );
        self.cache
            .components
            .get_or_populate(project_key, || self.get(&resource))
            .await
    }

    /// バージョンを作成し、そのプロジェクトのバージョンキャッシュを破棄する
    pub async fn create_version(&self, info: &VersionCreationInfo) -> Result<ProjectVersion> {
        let version: ProjectVersion = self.post("/rest/api/2/version", info).await?;
        self.cache.versions.invalidate(&info.project).await;
        Ok(version)
    }

    /// バージョンを削除する
    ///
    /// 所属プロジェクトが分からないため、バージョンのキャッシュは全て破棄する。
    pub async fn delete_version(
        &self,
        version_id: &str,
        move_fix_issues_to: Option<&str>,
        move_affected_issues_to: Option<&str>,
    ) -> Result<()> {
        let mut params = Vec::new();
        if let Some(target) = move_fix_issues_to {
            params.push(format!("moveFixIssuesTo={}", urlencoding::encode(target)));
        }
        if let Some(target) = move_affected_issues_to {
            params.push(format!("moveAffectedIssuesTo={}", urlencoding::encode(target)));
        }

        let mut resource = format!("/rest/api/2/version/{}", urlencoding::encode(version_id));
        if !params.is_empty() {
            resource.push('?');
            resource.push_str(&params.join("&"));
        }

        self.delete(&resource).await?;
        self.cache.versions.clear().await;
        Ok(())
    }

    pub async fn create_component(&self, info: &ComponentCreationInfo) -> Result<ProjectComponent> {
        let component: ProjectComponent = self.post("/rest/api/2/component", info).await?;
        self.cache.components.invalidate(&info.project).await;
        Ok(component)
    }

    pub async fn delete_component(
        &self,
        component_id: &str,
        move_issues_to: Option<&str>,
    ) -> Result<()> {
        let mut resource = format!("/rest/api/2/component/{}", urlencoding::encode(component_id));
        if let Some(target) = move_issues_to {
            resource.push_str(&format!("?moveIssuesTo={}", urlencoding::encode(target)));
        }

        self.delete(&resource).await?;
        self.cache.components.clear().await;
        Ok(())
    }

    /// カスタムフィールドの読み書きに使う変換表
    pub(crate) async fn custom_field_codec(&self) -> Result<CustomFieldCodec> {
        let fields = self.get_custom_fields().await?;
        Ok(CustomFieldCodec::new(
            fields.values(),
            &self.settings.custom_field_serializers,
        ))
    }
}

/// `createmeta` のレスポンスから `customfield_` で始まるフィールドを取り出す (id で重複除去)
fn custom_fields_from_create_meta(
    meta: &Value,
    options: &CustomFieldFetchOptions,
) -> Result<Vec<CustomField>> {
    let project = meta
        .get("projects")
        .and_then(Value::as_array)
        .and_then(|projects| projects.first())
        .ok_or_else(|| {
            Error::InvalidOperation(format!(
                "Project with key '{}' was not found on the Jira server.",
                options.project_keys.join(",")
            ))
        })?;

    let mut fields: Vec<CustomField> = Vec::new();
    let issue_types = project
        .get("issuetypes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for issue_type in issue_types {
        let Some(entries) = issue_type.get("fields").and_then(Value::as_object) else {
            continue;
        };
        for (id, field) in entries {
            if !id.to_ascii_lowercase().starts_with("customfield_")
                || fields.iter().any(|f| f.id == *id)
            {
                continue;
            }
            fields.push(CustomField {
                id: id.clone(),
                name: field
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                custom_type: field
                    .pointer("/schema/custom")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }

    Ok(fields)
}

fn named_entities<T: JiraEntity>(dictionary: &EntityDictionary<T>) -> Vec<NamedEntity> {
    dictionary
        .values()
        .iter()
        .map(|entity| NamedEntity::resolved(entity.id(), entity.name()))
        .collect()
}

#[async_trait]
impl ReferenceData for JiraClient {
    async fn named_entities(&self, kind: EntityKind) -> Result<Vec<NamedEntity>> {
        Ok(match kind {
            EntityKind::Status => named_entities(&*self.get_statuses().await?),
            EntityKind::Priority => named_entities(&*self.get_priorities().await?),
            EntityKind::Resolution => named_entities(&*self.get_resolutions().await?),
            EntityKind::IssueType => named_entities(&*self.get_issue_types().await?),
        })
    }

    async fn project_issue_types(&self, project_key: &str) -> Result<Vec<NamedEntity>> {
        let types = self.get_issue_types_for_project(project_key).await?;
        Ok(named_entities(&*types))
    }

    async fn custom_fields(&self) -> Result<Vec<CustomField>> {
        Ok(self.get_custom_fields().await?.values().to_vec())
    }

    async fn custom_fields_scoped(
        &self,
        options: &CustomFieldFetchOptions,
    ) -> Result<Vec<CustomField>> {
        Ok(self.get_custom_fields_with(options).await?.values().to_vec())
    }

    async fn versions(&self, project_key: &str) -> Result<Vec<ProjectVersion>> {
        Ok(self.get_project_versions(project_key).await?.values().to_vec())
    }

    async fn components(&self, project_key: &str) -> Result<Vec<ProjectComponent>> {
        Ok(self
            .get_project_components(project_key)
            .await?
            .values()
            .to_vec())
    }
}
