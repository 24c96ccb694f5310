use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "accountId")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "displayName")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "emailAddress")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(rename = "self")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "timeZone")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl User {
    /// 課題のフィールドで使うユーザー識別子
    ///
    /// プライバシーモードでは `accountId`、それ以外は `name` を優先する。
    pub fn identifier(&self, privacy_mode: bool) -> Option<&str> {
        let (primary, fallback) = if privacy_mode {
            (&self.account_id, &self.name)
        } else {
            (&self.name, &self.account_id)
        };
        primary.as_deref().or(fallback.as_deref())
    }
}

/// ユーザー参照の JSON (`{"name": ..}` または `{"accountId": ..}`)
pub(crate) fn user_reference(identifier: &str, privacy_mode: bool) -> serde_json::Value {
    if privacy_mode {
        serde_json::json!({ "accountId": identifier })
    } else {
        serde_json::json!({ "name": identifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_deserialization() {
        let json_data = json!({
            "accountId": "557058:f58131cb-b67d-43c7-b30d-6b58d40bd077",
            "name": "tuser",
            "displayName": "Test User",
            "emailAddress": "test@example.com",
            "self": "https://example.atlassian.net/rest/api/2/user?accountId=557058:f58131cb",
            "active": true,
            "timeZone": "America/Los_Angeles"
        });

        let user: User = serde_json::from_value(json_data).unwrap();

        assert_eq!(user.display_name.as_deref(), Some("Test User"));
        assert_eq!(user.identifier(false), Some("tuser"));
        assert_eq!(
            user.identifier(true),
            Some("557058:f58131cb-b67d-43c7-b30d-6b58d40bd077")
        );
    }

    #[test]
    fn test_identifier_falls_back() {
        let user = User {
            account_id: Some("abc".to_string()),
            ..User::default()
        };

        assert_eq!(user.identifier(false), Some("abc"));
    }

    #[test]
    fn test_user_reference() {
        assert_eq!(user_reference("bob", false), json!({"name": "bob"}));
        assert_eq!(user_reference("abc", true), json!({"accountId": "abc"}));
    }
}
