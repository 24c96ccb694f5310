use super::JiraEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(rename = "schema")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<FieldSchema>,
    #[serde(rename = "clauseNames")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(rename = "customId")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<u64>,
}

/// カスタムフィールドの定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    /// 型キー (例: `com.atlassian.jira.plugin.system.customfieldtypes:select`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
}

impl Field {
    pub fn is_custom(&self) -> bool {
        self.custom.unwrap_or(false)
    }
}

impl From<Field> for CustomField {
    fn from(field: Field) -> Self {
        Self {
            custom_type: field.schema.and_then(|schema| schema.custom),
            id: field.id,
            name: field.name,
        }
    }
}

impl JiraEntity for CustomField {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// スコープ付きカスタムフィールド取得の条件
///
/// `createmeta` に渡すプロジェクトキーと課題タイプ (id または名前)。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFieldFetchOptions {
    pub project_keys: Vec<String>,
    pub issue_type_ids: Vec<String>,
    pub issue_type_names: Vec<String>,
}

impl CustomFieldFetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_key(mut self, key: impl Into<String>) -> Self {
        self.project_keys.push(key.into());
        self
    }

    pub fn issue_type_id(mut self, id: impl Into<String>) -> Self {
        self.issue_type_ids.push(id.into());
        self
    }

    pub fn issue_type_name(mut self, name: impl Into<String>) -> Self {
        self.issue_type_names.push(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.project_keys.is_empty()
            && self.issue_type_ids.is_empty()
            && self.issue_type_names.is_empty()
    }

    /// キャッシュのキー
    pub fn cache_key(&self) -> String {
        format!(
            "{}::{}::{}",
            self.project_keys.join(","),
            self.issue_type_ids.join(","),
            self.issue_type_names.join(",")
        )
    }

    /// `issue/createmeta` のクエリ文字列
    pub fn to_query_string(&self) -> String {
        let mut query = String::from("expand=projects.issuetypes.fields");
        let params = [
            ("projectKeys", &self.project_keys),
            ("issuetypeIds", &self.issue_type_ids),
            ("issuetypeNames", &self.issue_type_names),
        ];
        for (name, values) in params {
            if !values.is_empty() {
                let encoded: Vec<String> = values
                    .iter()
                    .map(|value| urlencoding::encode(value).into_owned())
                    .collect();
                query.push_str(&format!("&{}={}", name, encoded.join(",")));
            }
        }
        query
    }
}
