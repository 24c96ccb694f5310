use crate::error::{Error, Result};
use crate::models::{CustomField, RemoteCustomFieldValue};
use serde_json::{Value, json};
use std::collections::HashMap;

/// カスタムフィールドの値と JSON の相互変換方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomFieldSerializer {
    /// `["a", "b"]`
    MultiString,
    /// `{"<prop>": "a"}`
    SingleObject(String),
    /// `[{"<prop>": "a"}, {"<prop>": "b"}]`
    MultiObject(String),
    /// `1.5`
    Float,
    /// `{"value": "parent", "child": {"value": "child"}}`
    CascadingSelect,
}

impl CustomFieldSerializer {
    pub fn from_json(&self, value: &Value) -> Vec<String> {
        match self {
            CustomFieldSerializer::MultiString => array_items(value)
                .into_iter()
                .map(json_to_string)
                .collect(),
            CustomFieldSerializer::SingleObject(prop) => {
                value.get(prop).map(json_to_string).into_iter().collect()
            }
            CustomFieldSerializer::MultiObject(prop) => array_items(value)
                .into_iter()
                .filter_map(|item| item.get(prop))
                .map(json_to_string)
                .collect(),
            CustomFieldSerializer::Float => vec![json_to_string(value)],
            CustomFieldSerializer::CascadingSelect => {
                let mut values: Vec<String> = value.get("value").map(json_to_string).into_iter().collect();
                if let Some(child) = value.get("child").and_then(|child| child.get("value")) {
                    values.push(json_to_string(child));
                }
                values
            }
        }
    }

    pub fn to_json(&self, values: &[String]) -> Result<Value> {
        match self {
            CustomFieldSerializer::MultiString => Ok(json!(values)),
            CustomFieldSerializer::SingleObject(prop) => Ok(match values.first() {
                Some(first) => json!({ prop.as_str(): first }),
                None => Value::Null,
            }),
            CustomFieldSerializer::MultiObject(prop) => Ok(Value::Array(
                values
                    .iter()
                    .map(|value| json!({ prop.as_str(): value }))
                    .collect(),
            )),
            CustomFieldSerializer::Float => match values.first() {
                Some(first) => {
                    let number: f64 = first.parse().map_err(|_| {
                        Error::SerializationError(format!("'{}' is not a number", first))
                    })?;
                    Ok(json!(number))
                }
                None => Ok(Value::Null),
            },
            CustomFieldSerializer::CascadingSelect => match values {
                [] => Ok(Value::Null),
                [parent] => Ok(json!({ "value": parent })),
                [parent, child] => Ok(json!({ "value": parent, "child": { "value": child } })),
                _ => Err(Error::SerializationError(format!(
                    "A cascading select takes a parent and an optional child option, got {} values",
                    values.len()
                ))),
            },
        }
    }
}

/// 課題ごとのカスタムフィールド変換テーブル
///
/// フィールド id から型キーを引き、設定のシリアライザを選ぶ。
#[derive(Debug, Clone, Default)]
pub struct CustomFieldCodec {
    by_field_id: HashMap<String, CustomFieldSerializer>,
}

impl CustomFieldCodec {
    pub fn new(fields: &[CustomField], serializers: &HashMap<String, CustomFieldSerializer>) -> Self {
        let by_field_id = fields
            .iter()
            .filter_map(|field| {
                let custom_type = field.custom_type.as_ref()?;
                let serializer = serializers.iter().find_map(|(key, serializer)| {
                    key.eq_ignore_ascii_case(custom_type).then(|| serializer.clone())
                })?;
                Some((field.id.clone(), serializer))
            })
            .collect();

        Self { by_field_id }
    }

    pub fn serializer_for(&self, field_id: &str) -> Option<&CustomFieldSerializer> {
        self.by_field_id.get(field_id)
    }

    pub fn decode(&self, field_id: &str, raw: &Value) -> RemoteCustomFieldValue {
        let serializer = self.serializer_for(field_id).cloned();
        let values = match &serializer {
            Some(serializer) => serializer.from_json(raw),
            None => array_items(raw).into_iter().map(json_to_string).collect(),
        };

        RemoteCustomFieldValue {
            custom_field_id: field_id.to_string(),
            values: Some(values),
            serializer,
            raw_value: Some(raw.clone()),
        }
    }

    /// 値ごとに指定されたシリアライザ、型のシリアライザ、既定の順に使う
    pub fn encode(&self, value: &RemoteCustomFieldValue) -> Result<Value> {
        let values = value.values.as_deref().unwrap_or_default();
        let serializer = value
            .serializer
            .as_ref()
            .or_else(|| self.serializer_for(&value.custom_field_id));

        match serializer {
            Some(serializer) => serializer.to_json(values),
            None => Ok(match values {
                [] => json!([]),
                [single] => json!(single),
                many => json!(many),
            }),
        }
    }
}

fn array_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// 文字列はそのまま、オブジェクトは `value`/`name` を優先して取り出す
fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("name"))
            .map(json_to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_default_encoding() {
        let codec = CustomFieldCodec::default();
        let mut value = RemoteCustomFieldValue {
            custom_field_id: "customfield_1".to_string(),
            values: Some(strings(&["a"])),
            serializer: None,
            raw_value: None,
        };

        assert_eq!(codec.encode(&value).unwrap(), json!("a"));

        value.values = Some(Vec::new());
        assert_eq!(codec.encode(&value).unwrap(), json!([]));

        value.values = Some(strings(&["a", "b"]));
        assert_eq!(codec.encode(&value).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_codec_picks_serializer_by_type() {
        let fields = vec![CustomField {
            id: "customfield_2".to_string(),
            name: "Colors".to_string(),
            custom_type: Some("com.example:multiselect".to_string()),
        }];
        let serializers = HashMap::from([(
            "com.example:multiselect".to_string(),
            CustomFieldSerializer::MultiObject("value".to_string()),
        )]);
        let codec = CustomFieldCodec::new(&fields, &serializers);

        let decoded = codec.decode("customfield_2", &json!([{"value": "red", "id": "1"}]));
        assert_eq!(decoded.values, Some(strings(&["red"])));
        assert_eq!(decoded.serializer, Some(CustomFieldSerializer::MultiObject("value".to_string())));

        let encoded = codec.encode(&decoded).unwrap();
        assert_eq!(encoded, json!([{"value": "red"}]));
    }

    #[test]
    fn test_cascading_select() {
        let serializer = CustomFieldSerializer::CascadingSelect;

        let values = serializer.from_json(&json!({"value": "Hardware", "child": {"value": "Disk"}}));
        assert_eq!(values, strings(&["Hardware", "Disk"]));
        assert_eq!(
            serializer.to_json(&values).unwrap(),
            json!({"value": "Hardware", "child": {"value": "Disk"}})
        );
        assert!(serializer.to_json(&strings(&["a", "b", "c"])).is_err());
    }

    #[test]
    fn test_float_and_single_object() {
        assert_eq!(
            CustomFieldSerializer::Float.to_json(&strings(&["2.5"])).unwrap(),
            json!(2.5)
        );
        assert!(CustomFieldSerializer::Float.to_json(&strings(&["x"])).is_err());
        assert_eq!(
            CustomFieldSerializer::Float.from_json(&json!(3.0)),
            strings(&["3.0"])
        );

        let user = CustomFieldSerializer::SingleObject("name".to_string());
        assert_eq!(user.to_json(&strings(&["bob"])).unwrap(), json!({"name": "bob"}));
        assert_eq!(user.from_json(&json!({"name": "bob", "displayName": "Bob"})), strings(&["bob"]));
    }

    #[test]
    fn test_default_decoding_of_scalars() {
        let codec = CustomFieldCodec::default();

        assert_eq!(codec.decode("customfield_1", &json!(5)).values, Some(strings(&["5"])));
        assert_eq!(
            codec.decode("customfield_1", &json!(["x", "y"])).values,
            Some(strings(&["x", "y"]))
        );
    }
}
