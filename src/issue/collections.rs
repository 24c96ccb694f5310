use super::diff::{FieldChange, FieldChangeProvider};
use crate::error::{Error, Result};
use crate::models::{JiraEntity, ProjectComponent, ProjectVersion};
use crate::reference::ReferenceData;
use async_trait::async_trait;

/// 課題のラベル
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLabelCollection {
    original: Vec<String>,
    labels: Vec<String>,
}

impl IssueLabelCollection {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            original: labels.clone(),
            labels,
        }
    }

    pub fn add(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    pub fn extend<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
    }

    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| l != label);
        before != self.labels.len()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FieldChangeProvider for IssueLabelCollection {
    fn field_changes(&self) -> Vec<FieldChange> {
        let changed = self.original.len() != self.labels.len()
            || self.labels.iter().any(|label| !self.original.contains(label));

        if changed {
            vec![FieldChange::new("labels", self.labels.clone())]
        } else {
            Vec::new()
        }
    }
}

/// コンポーネント・バージョンのようにプロジェクトに属するエンティティ
#[async_trait]
pub trait CollectionEntity: JiraEntity + Clone + Send + Sync {
    const TYPE_NAME: &'static str;

    async fn available(refs: &dyn ReferenceData, project_key: &str) -> Result<Vec<Self>>
    where
        Self: Sized;
}

#[async_trait]
impl CollectionEntity for ProjectVersion {
    const TYPE_NAME: &'static str = "ProjectVersion";

    async fn available(refs: &dyn ReferenceData, project_key: &str) -> Result<Vec<Self>> {
        refs.versions(project_key).await
    }
}

#[async_trait]
impl CollectionEntity for ProjectComponent {
    const TYPE_NAME: &'static str = "ProjectComponent";

    async fn available(refs: &dyn ReferenceData, project_key: &str) -> Result<Vec<Self>> {
        refs.components(project_key).await
    }
}

/// id で比較されるエンティティのコレクション
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEntityCollection<T> {
    field_name: &'static str,
    project_key: String,
    original: Vec<T>,
    items: Vec<T>,
}

pub type ProjectComponentCollection = NamedEntityCollection<ProjectComponent>;
pub type ProjectVersionCollection = NamedEntityCollection<ProjectVersion>;

impl<T: CollectionEntity> NamedEntityCollection<T> {
    pub fn new(field_name: &'static str, project_key: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            field_name,
            project_key: project_key.into(),
            original: items.clone(),
            items,
        }
    }

    pub fn field_name(&self) -> &str {
        self.field_name
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// プロジェクトのエンティティから名前で探して追加する (大文字小文字は区別しない)
    pub async fn add_by_name(&mut self, refs: &dyn ReferenceData, name: &str) -> Result<()> {
        let available = T::available(refs, &self.project_key).await?;

        match available.iter().find(|item| item.name().eq_ignore_ascii_case(name)) {
            Some(item) => {
                self.items.push(item.clone());
                Ok(())
            }
            None => Err(Error::EntityNotFound {
                kind: T::TYPE_NAME.to_string(),
                id: String::new(),
                name: name.to_string(),
                available: available
                    .iter()
                    .map(|item| format!("{}:{}", item.id(), item.name()))
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let index = self.items.iter().position(|item| item.name().eq_ignore_ascii_case(name))?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|item| item.name().eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: CollectionEntity> FieldChangeProvider for NamedEntityCollection<T> {
    fn field_changes(&self) -> Vec<FieldChange> {
        let changed = self.original.len() != self.items.len()
            || self
                .items
                .iter()
                .any(|item| !self.original.iter().any(|o| o.id() == item.id()));

        if changed {
            let ids = self.items.iter().map(|item| item.id().to_string()).collect();
            vec![FieldChange::new(self.field_name, ids)]
        } else {
            Vec::new()
        }
    }
}
