//! 課題に付随するリソース (コメント・ウォッチャー・添付・プロパティ)
use crate::client::JiraClient;
use crate::error::{Error, Result};
use crate::models::{Comment, CommentPage, User};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// プロパティキーの最大長
const MAX_PROPERTY_KEY_LENGTH: usize = 255;

#[derive(Debug, Deserialize)]
struct PropertyKeyList {
    #[serde(default)]
    keys: Vec<PropertyKey>,
}

#[derive(Debug, Deserialize)]
struct PropertyKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct EntityProperty {
    key: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WatcherList {
    #[serde(default)]
    watchers: Vec<User>,
}

fn issue_resource(issue_key: &str, rest: &str) -> String {
    format!(
        "/rest/api/2/issue/{}{}",
        urlencoding::encode(issue_key),
        rest
    )
}

impl JiraClient {
    pub async fn delete_attachment(&self, attachment_id: &str) -> Result<()> {
        let resource = format!(
            "/rest/api/2/attachment/{}",
            urlencoding::encode(attachment_id)
        );
        self.delete(&resource).await?;
        Ok(())
    }

    pub async fn add_comment(&self, issue_key: &str, comment: &Comment) -> Result<Comment> {
        self.post(&issue_resource(issue_key, "/comment"), comment)
            .await
    }

    pub async fn get_comments(&self, issue_key: &str) -> Result<Vec<Comment>> {
        let page: CommentPage = self.get(&issue_resource(issue_key, "/comment")).await?;
        Ok(page.comments)
    }

    pub async fn delete_comment(&self, issue_key: &str, comment_id: &str) -> Result<()> {
        let rest = format!("/comment/{}", urlencoding::encode(comment_id));
        self.delete(&issue_resource(issue_key, &rest)).await?;
        Ok(())
    }

    /// ウォッチャーを追加する (プライバシーモードでは accountId)
    pub async fn add_watcher(&self, issue_key: &str, user: &str) -> Result<()> {
        let body = Value::String(user.to_string());
        self.execute_request(
            reqwest::Method::POST,
            &issue_resource(issue_key, "/watchers"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_watcher(&self, issue_key: &str, user: &str) -> Result<()> {
        let parameter = if self.settings.enable_user_privacy_mode {
            "accountId"
        } else {
            "username"
        };
        let rest = format!("/watchers?{}={}", parameter, urlencoding::encode(user));
        self.delete(&issue_resource(issue_key, &rest)).await?;
        Ok(())
    }

    pub async fn get_watchers(&self, issue_key: &str) -> Result<Vec<User>> {
        let list: WatcherList = self.get(&issue_resource(issue_key, "/watchers")).await?;
        Ok(list.watchers)
    }

    pub async fn get_property_keys(&self, issue_key: &str) -> Result<Vec<String>> {
        let list: PropertyKeyList = self.get(&issue_resource(issue_key, "/properties")).await?;
        Ok(list.keys.into_iter().map(|k| k.key).collect())
    }

    /// 指定したプロパティを並行して取得する
    ///
    /// 存在しないキーは結果に含まれない。
    pub async fn get_properties(
        &self,
        issue_key: &str,
        property_keys: &[&str],
    ) -> Result<HashMap<String, Value>> {
        let requests = property_keys.iter().map(|property_key| async move {
            let rest = format!("/properties/{}", urlencoding::encode(property_key));
            match self.get::<EntityProperty>(&issue_resource(issue_key, &rest)).await {
                Ok(property) => Ok(Some(property)),
                Err(Error::NotFound(_)) => {
                    tracing::warn!(issue_key, property_key, "issue property not found, skipping");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        });

        let mut properties = HashMap::new();
        for result in join_all(requests).await {
            if let Some(property) = result? {
                properties.insert(property.key, property.value);
            }
        }
        Ok(properties)
    }

    pub async fn set_property(&self, issue_key: &str, property_key: &str, value: &Value) -> Result<()> {
        if property_key.is_empty() || property_key.chars().count() > MAX_PROPERTY_KEY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Property keys must be between 1 and {} characters long: '{}'",
                MAX_PROPERTY_KEY_LENGTH, property_key
            )));
        }

        let rest = format!("/properties/{}", urlencoding::encode(property_key));
        self.put(&issue_resource(issue_key, &rest), value).await?;
        Ok(())
    }

    /// プロパティを削除する (存在しない場合は何もしない)
    pub async fn delete_property(&self, issue_key: &str, property_key: &str) -> Result<()> {
        let rest = format!("/properties/{}", urlencoding::encode(property_key));
        match self.delete(&issue_resource(issue_key, &rest)).await {
            Ok(_) | Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Auth, JiraConfig, JiraRestClientSettings};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with(server: &MockServer, settings: JiraRestClientSettings) -> JiraClient {
        let config = JiraConfig::new(
            server.uri(),
            Auth::Bearer {
                token: "token".to_string(),
            },
        )
        .unwrap();
        JiraClient::with_settings(config, settings).unwrap()
    }

    fn client(server: &MockServer) -> JiraClient {
        client_with(server, JiraRestClientSettings::default())
    }

    #[tokio::test]
    async fn test_get_properties_skips_missing_keys() {
        // Given: 1つ目のキーだけが存在する
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/TST-1/properties/color"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": "color", "value": {"rgb": "red"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/TST-1/properties/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errorMessages": ["The property with key 'missing' does not exist."]
            })))
            .mount(&server)
            .await;

        // When
        let properties = client(&server)
            .get_properties("TST-1", &["color", "missing"])
            .await
            .unwrap();

        // Then
        assert_eq!(properties.len(), 1);
        assert_eq!(properties["color"], json!({"rgb": "red"}));
    }

    #[tokio::test]
    async fn test_set_property_rejects_invalid_keys() {
        let server = MockServer::start().await;
        let client = client(&server);

        let empty = client.set_property("TST-1", "", &json!(1)).await;
        let long = client
            .set_property("TST-1", &"k".repeat(256), &json!(1))
            .await;

        assert!(matches!(empty, Err(Error::InvalidInput(_))));
        assert!(matches!(long, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_property_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/2/issue/TST-1/properties/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).delete_property("TST-1", "gone").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_property_propagates_other_errors() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/2/issue/TST-1/properties/locked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client(&server).delete_property("TST-1", "locked").await;

        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_add_watcher_sends_json_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/TST-1/watchers"))
            .and(body_json(json!("admin")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).add_watcher("TST-1", "admin").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_watcher_in_privacy_mode() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/api/2/issue/TST-1/watchers"))
            .and(query_param("accountId", "5b10a2844c20165700ede21g"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(&server, JiraRestClientSettings::new().user_privacy_mode(true));

        assert!(
            client
                .delete_watcher("TST-1", "5b10a2844c20165700ede21g")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_get_comments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/TST-1/comment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comments": [{"id": "10", "body": "first"}, {"id": "11", "body": "second"}]
            })))
            .mount(&server)
            .await;

        let comments = client(&server).get_comments("TST-1").await.unwrap();

        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }
}
