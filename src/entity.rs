use crate::error::{Error, Result};
use crate::models::RemoteNamedEntity;
use crate::reference::{EntityKind, ReferenceData};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

/// id と名前の組
///
/// どちらか一方だけ分かっている状態で作成でき、
/// `NamedConstant::load_id_and_name` で残りを参照データから補う。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedEntity {
    id: Option<String>,
    name: Option<String>,
}

impl NamedEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let id = non_empty(id.into());
        let name = non_empty(name.into());
        if id.is_none() && name.is_none() {
            return Err(Error::InvalidInput(
                "A named entity requires an id or a name".to_string(),
            ));
        }
        Ok(Self { id, name })
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: non_empty(id.into()),
            name: None,
        }
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: non_empty(name.into()),
        }
    }

    pub(crate) fn resolved(id: &str, name: &str) -> Self {
        Self {
            id: non_empty(id.to_string()),
            name: non_empty(name.to_string()),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some() && self.name.is_some()
    }

    /// 候補の中から名前 (大文字小文字無視) または id が一致する最初のものを採用する
    pub(crate) fn resolve_from(&mut self, type_name: &str, candidates: &[NamedEntity]) -> Result<()> {
        if self.is_resolved() {
            return Ok(());
        }

        let found = candidates.iter().find(|candidate| {
            let name_matches = match (&self.name, &candidate.name) {
                (Some(wanted), Some(name)) => wanted.eq_ignore_ascii_case(name),
                _ => false,
            };
            let id_matches = match (&self.id, &candidate.id) {
                (Some(wanted), Some(id)) => wanted.eq_ignore_ascii_case(id),
                _ => false,
            };
            name_matches || id_matches
        });

        match found {
            Some(candidate) => {
                self.id = candidate.id.clone();
                self.name = candidate.name.clone();
                Ok(())
            }
            None => {
                let available: Vec<String> = candidates
                    .iter()
                    .map(|c| format!("{}:{}", c.id().unwrap_or(""), c.name().unwrap_or("")))
                    .collect();
                Err(Error::EntityNotFound {
                    kind: type_name.to_string(),
                    id: self.id.clone().unwrap_or_default(),
                    name: self.name.clone().unwrap_or_default(),
                    available: available.join(","),
                })
            }
        }
    }

    pub(crate) fn from_remote(remote: &RemoteNamedEntity) -> Option<Self> {
        let entity = Self {
            id: remote.id.clone().and_then(non_empty),
            name: remote.name.clone().and_then(non_empty),
        };
        if entity.id.is_none() && entity.name.is_none() {
            None
        } else {
            Some(entity)
        }
    }

    pub(crate) fn to_remote(&self) -> RemoteNamedEntity {
        RemoteNamedEntity {
            id: self.id.clone(),
            name: self.name.clone(),
            subtask: None,
        }
    }
}

/// 数字だけの文字列は id、それ以外は名前として扱う
impl From<&str> for NamedEntity {
    fn from(value: &str) -> Self {
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
            Self::from_id(value)
        } else {
            Self::from_name(value)
        }
    }
}

impl fmt::Display for NamedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.id) {
            (Some(name), _) => write!(f, "{}", name),
            (None, Some(id)) => write!(f, "{}", id),
            (None, None) => Ok(()),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// 参照データで id と名前を補える値
#[async_trait]
pub trait NamedConstant: Send + Sync {
    fn entity(&self) -> &NamedEntity;

    fn entity_mut(&mut self) -> &mut NamedEntity;

    fn type_name(&self) -> &'static str;

    async fn candidates(&self, refs: &dyn ReferenceData) -> Result<Vec<NamedEntity>>;

    fn id(&self) -> Option<&str> {
        self.entity().id()
    }

    fn name(&self) -> Option<&str> {
        self.entity().name()
    }

    async fn load_id_and_name(&mut self, refs: &dyn ReferenceData) -> Result<()> {
        if self.entity().is_resolved() {
            return Ok(());
        }
        let candidates = self.candidates(refs).await?;
        let type_name = self.type_name();
        self.entity_mut().resolve_from(type_name, &candidates)
    }
}

macro_rules! named_constant {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(NamedEntity);

        impl $name {
            pub fn new(entity: NamedEntity) -> Self {
                Self(entity)
            }

            pub fn from_id(id: impl Into<String>) -> Self {
                Self(NamedEntity::from_id(id))
            }

            pub fn from_name(name: impl Into<String>) -> Self {
                Self(NamedEntity::from_name(name))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(NamedEntity::from(value))
            }
        }

        impl From<NamedEntity> for $name {
            fn from(entity: NamedEntity) -> Self {
                Self(entity)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        #[async_trait]
        impl NamedConstant for $name {
            fn entity(&self) -> &NamedEntity {
                &self.0
            }

            fn entity_mut(&mut self) -> &mut NamedEntity {
                &mut self.0
            }

            fn type_name(&self) -> &'static str {
                $kind.type_name()
            }

            async fn candidates(&self, refs: &dyn ReferenceData) -> Result<Vec<NamedEntity>> {
                refs.named_entities($kind).await
            }
        }
    };
}

named_constant!(
    /// 課題のステータス
    IssueStatus,
    EntityKind::Status
);
named_constant!(
    /// 課題の優先度
    IssuePriority,
    EntityKind::Priority
);
named_constant!(
    /// 課題の解決状況
    IssueResolution,
    EntityKind::Resolution
);

/// 課題タイプ
///
/// 名前が重複している場合 (クラシック/次世代プロジェクトの混在) や
/// `search_by_project_only` が有効な場合は、プロジェクトの課題タイプから解決する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueType {
    entity: NamedEntity,
    pub project_key: Option<String>,
    pub search_by_project_only: bool,
    pub is_sub_task: bool,
}

impl IssueType {
    pub fn new(entity: NamedEntity) -> Self {
        Self {
            entity,
            project_key: None,
            search_by_project_only: false,
            is_sub_task: false,
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        Self::new(NamedEntity::from_id(id))
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self::new(NamedEntity::from_name(name))
    }

    pub fn in_project(mut self, project_key: impl Into<String>) -> Self {
        self.project_key = Some(project_key.into());
        self
    }
}

impl From<&str> for IssueType {
    fn from(value: &str) -> Self {
        Self::new(NamedEntity::from(value))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity.fmt(f)
    }
}

#[async_trait]
impl NamedConstant for IssueType {
    fn entity(&self) -> &NamedEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut NamedEntity {
        &mut self.entity
    }

    fn type_name(&self) -> &'static str {
        EntityKind::IssueType.type_name()
    }

    async fn candidates(&self, refs: &dyn ReferenceData) -> Result<Vec<NamedEntity>> {
        let all = refs.named_entities(EntityKind::IssueType).await?;

        let Some(project_key) = self.project_key.as_deref() else {
            return Ok(all);
        };

        if self.search_by_project_only || has_duplicate_names(&all) {
            tracing::debug!(project_key, "resolving issue type within project");
            return refs.project_issue_types(project_key).await;
        }

        Ok(all)
    }
}

fn has_duplicate_names(entities: &[NamedEntity]) -> bool {
    let mut seen = HashSet::with_capacity(entities.len());
    entities
        .iter()
        .filter_map(NamedEntity::name)
        .any(|name| !seen.insert(name.to_lowercase()))
}
