use super::diff::{FieldChange, FieldChangeProvider};
use super::serializers::CustomFieldSerializer;
use crate::entity::{IssueType, NamedConstant};
use crate::error::{Error, Result};
use crate::models::{CustomFieldFetchOptions, RemoteCustomFieldValue};
use crate::reference::ReferenceData;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 課題に設定されたカスタムフィールドの値
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFieldValue {
    id: String,
    name: Option<String>,
    /// `None` は値がクリアされた状態
    pub values: Option<Vec<String>>,
    pub serializer: Option<CustomFieldSerializer>,
    raw_value: Option<Value>,
}

impl CustomFieldValue {
    pub fn new(id: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            values: Some(values),
            serializer: None,
            raw_value: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 最初の値
    pub fn value(&self) -> Option<&str> {
        self.values.as_ref()?.first().map(String::as_str)
    }

    pub fn values(&self) -> Option<&[String]> {
        self.values.as_deref()
    }

    /// サーバーから返された JSON
    pub fn raw_value(&self) -> Option<&Value> {
        self.raw_value.as_ref()
    }

    /// 生の JSON を任意の型として読む
    pub fn deserialize_raw<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.raw_value {
            Some(raw) => Ok(Some(serde_json::from_value(raw.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = Some(values);
    }

    pub fn clear(&mut self) {
        self.values = None;
    }

    pub(crate) fn to_remote(&self) -> RemoteCustomFieldValue {
        RemoteCustomFieldValue {
            custom_field_id: self.id.clone(),
            values: self.values.clone(),
            serializer: self.serializer.clone(),
            raw_value: self.raw_value.clone(),
        }
    }
}

/// カスケード選択フィールドの値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadingSelectValue {
    pub name: String,
    pub parent_option: Option<String>,
    pub child_option: Option<String>,
}

/// 名前からフィールド id を引くときの範囲 (課題のプロジェクトと課題タイプ)
#[derive(Debug, Clone, Copy)]
pub struct CustomFieldScope<'a> {
    pub project_key: &'a str,
    pub issue_type: Option<&'a IssueType>,
}

impl CustomFieldScope<'_> {
    fn fetch_options(&self) -> CustomFieldFetchOptions {
        let mut options = CustomFieldFetchOptions::new();
        if !self.project_key.is_empty() {
            options = options.project_key(self.project_key);
        }
        if let Some(issue_type) = self.issue_type {
            if let Some(id) = issue_type.id() {
                options = options.issue_type_id(id);
            } else if let Some(name) = issue_type.name() {
                options = options.issue_type_name(name);
            }
        }
        options
    }
}

/// 課題のカスタムフィールド一覧
///
/// 元のスナップショットの値を保持し、差分計算に使う。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomFieldValueCollection {
    items: Vec<CustomFieldValue>,
    original: Option<Vec<RemoteCustomFieldValue>>,
    /// true の場合、名前の重複がなくても課題のプロジェクト内でフィールドを探す
    pub search_by_project_only: bool,
}

impl CustomFieldValueCollection {
    pub(crate) fn from_remote(original: Option<&[RemoteCustomFieldValue]>) -> Self {
        let items = original
            .unwrap_or_default()
            .iter()
            .map(|remote| CustomFieldValue {
                id: remote.custom_field_id.clone(),
                name: None,
                values: remote.values.clone(),
                serializer: remote.serializer.clone(),
                raw_value: remote.raw_value.clone(),
            })
            .collect();

        Self {
            items,
            original: original.map(<[RemoteCustomFieldValue]>::to_vec),
            search_by_project_only: false,
        }
    }

    /// フィールド名から id を解決する
    ///
    /// 同名のフィールドが複数ある場合、または `search_by_project_only` の場合は
    /// プロジェクトと課題タイプで絞り込む。
    pub async fn field_id(
        &self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
    ) -> Result<String> {
        let all = refs.custom_fields().await?;
        let mut matching: Vec<_> = all
            .into_iter()
            .filter(|field| field.name.eq_ignore_ascii_case(name))
            .collect();

        let search_by_project = matching.len() > 1 || self.search_by_project_only;
        if search_by_project {
            let options = scope.fetch_options();
            tracing::debug!(name, scope = %options.cache_key(), "resolving custom field within scope");
            matching = refs
                .custom_fields_scoped(&options)
                .await?
                .into_iter()
                .filter(|field| field.name.eq_ignore_ascii_case(name))
                .collect();
        }

        match matching.as_slice() {
            [] => Err(Error::CustomFieldNotFound {
                name: name.to_string(),
                project: search_by_project.then(|| scope.project_key.to_string()),
            }),
            [field] => Ok(field.id.clone()),
            many => Err(Error::AmbiguousEntity {
                kind: "CustomField".to_string(),
                name: name.to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&CustomFieldValue> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut CustomFieldValue> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub async fn get(
        &self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
    ) -> Result<Option<&CustomFieldValue>> {
        let id = self.field_id(refs, scope, name).await?;
        Ok(self.get_by_id(&id))
    }

    /// 名前で値を設定する。既にあれば置き換え、なければ追加する。
    pub async fn set(
        &mut self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
        value: Option<String>,
    ) -> Result<()> {
        let id = self.field_id(refs, scope, name).await?;
        match self.get_by_id_mut(&id) {
            Some(existing) => existing.values = value.map(|v| vec![v]),
            None => self.items.push(CustomFieldValue {
                id,
                name: Some(name.to_string()),
                values: value.map(|v| vec![v]),
                serializer: None,
                raw_value: None,
            }),
        }
        Ok(())
    }

    pub async fn add(
        &mut self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
        values: Vec<String>,
        serializer: Option<CustomFieldSerializer>,
    ) -> Result<&mut Self> {
        let id = self.field_id(refs, scope, name).await?;
        self.items.push(CustomFieldValue {
            id,
            name: Some(name.to_string()),
            values: Some(values),
            serializer,
            raw_value: None,
        });
        Ok(self)
    }

    /// 複数の文字列値を配列として送るフィールドを追加する
    pub async fn add_array(
        &mut self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
        values: Vec<String>,
    ) -> Result<&mut Self> {
        self.add(refs, scope, name, values, Some(CustomFieldSerializer::MultiString))
            .await
    }

    pub async fn add_cascading_select(
        &mut self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        value: CascadingSelectValue,
    ) -> Result<&mut Self> {
        let mut values = Vec::new();
        values.extend(value.parent_option);
        values.extend(value.child_option);
        self.add(
            refs,
            scope,
            &value.name,
            values,
            Some(CustomFieldSerializer::CascadingSelect),
        )
        .await
    }

    pub async fn cascading_select(
        &self,
        refs: &dyn ReferenceData,
        scope: CustomFieldScope<'_>,
        name: &str,
    ) -> Result<Option<CascadingSelectValue>> {
        let Some(field) = self.get(refs, scope, name).await? else {
            return Ok(None);
        };
        let Some(values) = field.values() else {
            return Ok(None);
        };

        Ok(Some(CascadingSelectValue {
            name: name.to_string(),
            parent_option: values.first().cloned(),
            child_option: values.get(1).cloned(),
        }))
    }

    pub fn add_by_id(&mut self, id: impl Into<String>, values: Vec<String>) -> &mut Self {
        self.items.push(CustomFieldValue::new(id, values));
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomFieldValue> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn to_remote_values(&self) -> Vec<RemoteCustomFieldValue> {
        self.items.iter().map(CustomFieldValue::to_remote).collect()
    }

    fn is_new_or_updated(&self, field: &CustomFieldValue) -> bool {
        let Some(original) = &self.original else {
            return true;
        };
        let Some(remote) = original
            .iter()
            .find(|remote| remote.custom_field_id == field.id)
        else {
            return true;
        };
        let Some(original_values) = &remote.values else {
            return true;
        };
        let Some(values) = &field.values else {
            return true;
        };
        original_values != values
    }
}

impl FieldChangeProvider for CustomFieldValueCollection {
    fn field_changes(&self) -> Vec<FieldChange> {
        self.items
            .iter()
            .filter(|field| self.is_new_or_updated(field))
            .map(|field| FieldChange::new(field.id.clone(), field.values.clone().unwrap_or_default()))
            .collect()
    }
}
