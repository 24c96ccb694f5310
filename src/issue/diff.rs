/// 変更差分の単位
///
/// 各コレクションは自分の元の内容と現在の内容を比べ、
/// 変化していれば現在の値すべてを1件の `FieldChange` として返す。
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field_id: String,
    pub values: Vec<String>,
}

impl FieldChange {
    pub fn new(field_id: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field_id: field_id.into(),
            values,
        }
    }
}

pub trait FieldChangeProvider {
    fn field_changes(&self) -> Vec<FieldChange>;
}

/// 全体をシリアライズした `fields` から変更のあった id だけを取り出す
///
/// `components` が null の場合は空配列にする (Jira は null を受け付けない)。
pub fn select_changed_fields(all_fields: &Map<String, Value>, changes: &[FieldChange]) -> Map<String, Value> {
    let mut selected = Map::new();

    for change in changes {
        let value = all_fields
            .get(&change.field_id)
            .cloned()
            .unwrap_or(Value::Null);

        let value = if change.field_id == "components" && value.is_null() {
            Value::Array(Vec::new())
        } else {
            value
        };

        selected.insert(change.field_id.clone(), value);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_changed_fields() {
        // Given: 全フィールドと2件の変更
        let all = json!({
            "summary": "new summary",
            "description": "unchanged",
            "components": null
        });
        let changes = vec![
            FieldChange::new("summary", vec!["new summary".to_string()]),
            FieldChange::new("components", Vec::new()),
            FieldChange::new("customfield_1", Vec::new()),
        ];

        // When: 変更分だけを取り出す
        let selected = select_changed_fields(all.as_object().unwrap(), &changes);

        // Then: 変更のないフィールドは含まれず、components は空配列になる
        assert_eq!(
            Value::Object(selected),
            json!({"summary": "new summary", "components": [], "customfield_1": null})
        );
    }
}
