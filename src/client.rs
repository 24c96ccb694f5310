use crate::cache::JiraCache;
use crate::error::{Error, Result};
use crate::issue::CustomFieldSerializer;
use base64::Engine;
use reqwest::{Client, Method, header};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, api_token: String },
    Bearer { token: String },
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub auth: Auth,
}

impl JiraConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        let base_url = base_url.into();

        // Validate URL
        let _ = Url::parse(&base_url)
            .map_err(|_| Error::InvalidConfiguration("Invalid base URL".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_env() -> Result<Self> {
        use std::env;

        let base_url = env::var("JIRA_URL").map_err(|_| {
            Error::ConfigurationMissing("JIRA_URL not found in environment".to_string())
        })?;

        let username = env::var("JIRA_USER").map_err(|_| {
            Error::ConfigurationMissing("JIRA_USER not found in environment".to_string())
        })?;

        let api_token = env::var("JIRA_API_TOKEN").map_err(|_| {
            Error::ConfigurationMissing("JIRA_API_TOKEN not found in environment".to_string())
        })?;

        let auth = Auth::Basic {
            username,
            api_token,
        };

        Self::new(base_url, auth)
    }

    /// `.env` を読み込んでから環境変数で設定を作成する
    pub fn from_dotenv() -> Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }
        Self::from_env()
    }
}

/// クライアント全体の振る舞いを決める設定
#[derive(Debug, Clone)]
pub struct JiraRestClientSettings {
    /// 1回の検索で取得する課題数の既定値
    pub max_issues_per_request: u32,
    pub validate_query: bool,
    /// true の場合ユーザーを `name` ではなく `accountId` で参照する
    pub enable_user_privacy_mode: bool,
    /// カスタムフィールドの型キー -> シリアライザ
    pub custom_field_serializers: HashMap<String, CustomFieldSerializer>,
}

impl Default for JiraRestClientSettings {
    fn default() -> Self {
        Self {
            max_issues_per_request: 20,
            validate_query: true,
            enable_user_privacy_mode: false,
            custom_field_serializers: default_custom_field_serializers(),
        }
    }
}

impl JiraRestClientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_issues_per_request(mut self, max: u32) -> Self {
        self.max_issues_per_request = max;
        self
    }

    pub fn validate_query(mut self, validate: bool) -> Self {
        self.validate_query = validate;
        self
    }

    pub fn user_privacy_mode(mut self, enabled: bool) -> Self {
        self.enable_user_privacy_mode = enabled;
        self
    }

    pub fn custom_field_serializer(
        mut self,
        custom_type: impl Into<String>,
        serializer: CustomFieldSerializer,
    ) -> Self {
        self.custom_field_serializers
            .insert(custom_type.into(), serializer);
        self
    }

    pub fn from_env() -> Result<Self> {
        use std::env;

        let mut settings = Self::default();

        if let Ok(value) = env::var("JIRA_MAX_ISSUES_PER_REQUEST") {
            settings.max_issues_per_request = value.parse().map_err(|_| {
                Error::InvalidConfiguration(format!(
                    "JIRA_MAX_ISSUES_PER_REQUEST must be a number, got '{}'",
                    value
                ))
            })?;
        }

        if let Ok(value) = env::var("JIRA_USER_PRIVACY_MODE") {
            settings.enable_user_privacy_mode = value.eq_ignore_ascii_case("true") || value == "1";
        }

        Ok(settings)
    }
}

fn default_custom_field_serializers() -> HashMap<String, CustomFieldSerializer> {
    const PREFIX: &str = "com.atlassian.jira.plugin.system.customfieldtypes:";

    [
        ("labels", CustomFieldSerializer::MultiString),
        ("float", CustomFieldSerializer::Float),
        ("select", CustomFieldSerializer::SingleObject("value".to_string())),
        ("radiobuttons", CustomFieldSerializer::SingleObject("value".to_string())),
        ("userpicker", CustomFieldSerializer::SingleObject("name".to_string())),
        ("multiselect", CustomFieldSerializer::MultiObject("value".to_string())),
        ("multicheckboxes", CustomFieldSerializer::MultiObject("value".to_string())),
        ("multiuserpicker", CustomFieldSerializer::MultiObject("name".to_string())),
        ("multigrouppicker", CustomFieldSerializer::MultiObject("name".to_string())),
        ("multiversion", CustomFieldSerializer::MultiObject("name".to_string())),
        ("cascadingselect", CustomFieldSerializer::CascadingSelect),
    ]
    .into_iter()
    .map(|(name, serializer)| (format!("{}{}", PREFIX, name), serializer))
    .collect()
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub(crate) client: Client,
    pub(crate) config: Arc<JiraConfig>,
    pub(crate) settings: Arc<JiraRestClientSettings>,
    pub(crate) cache: Arc<JiraCache>,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        Self::with_settings(config, JiraRestClientSettings::default())
    }

    pub fn with_settings(config: JiraConfig, settings: JiraRestClientSettings) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // 認証ヘッダーを追加
        let auth_value = match &config.auth {
            Auth::Basic {
                username,
                api_token,
            } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, api_token).as_bytes());
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
        };
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth_value)
                .map_err(|_| Error::InvalidConfiguration("Invalid auth header".to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            settings: Arc::new(settings),
            cache: Arc::new(JiraCache::new()),
        })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    pub fn settings(&self) -> &JiraRestClientSettings {
        &self.settings
    }

    pub fn cache(&self) -> &JiraCache {
        &self.cache
    }

    /// 任意のリソースに対してリクエストを送り、JSONを返す。
    /// 空のレスポンスボディは `Value::Null` になる。
    pub async fn execute_request(
        &self,
        method: Method,
        resource: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, resource);
        tracing::trace!(%method, resource, "sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(error_from_response(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn get<T>(&self, endpoint: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let data = self.execute_request(Method::GET, endpoint, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub(crate) async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let body = serde_json::to_value(body)?;
        let data = self
            .execute_request(Method::POST, endpoint, Some(&body))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub(crate) async fn put<B>(&self, endpoint: &str, body: &B) -> Result<Value>
    where
        B: serde::Serialize,
    {
        let body = serde_json::to_value(body)?;
        self.execute_request(Method::PUT, endpoint, Some(&body))
            .await
    }

    pub(crate) async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.execute_request(Method::DELETE, endpoint, None).await
    }
}

/// Jira のエラーレスポンスを `Error` に変換する
fn error_from_response(status: u16, body: &str) -> Error {
    let message = jira_error_message(body).unwrap_or_else(|| {
        if body.is_empty() {
            "Unknown error".to_string()
        } else {
            body.to_string()
        }
    });

    match status {
        401 | 403 => Error::AuthenticationFailed(message),
        404 => Error::NotFound(message),
        429 => Error::RateLimitExceeded,
        _ => Error::ApiError { status, message },
    }
}

fn jira_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;

    let mut messages: Vec<String> = json
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = json.get("errors").and_then(Value::as_object) {
        let mut keys: Vec<&String> = errors.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(text) = errors[key].as_str() {
                messages.push(format!("{}: {}", key, text));
            }
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn basic_config(base_url: String) -> JiraConfig {
        JiraConfig {
            base_url,
            auth: Auth::Basic {
                username: "test@example.com".to_string(),
                api_token: "test_token".to_string(),
            },
        }
    }

    #[test]
    fn test_jira_config_new_with_valid_url() {
        // Given: 有効なURLとBasic認証情報
        let base_url = "https://example.atlassian.net/";
        let auth = Auth::Basic {
            username: "test@example.com".to_string(),
            api_token: "test_token".to_string(),
        };

        // When: JiraConfigを作成
        let config = JiraConfig::new(base_url, auth).unwrap();

        // Then: 末尾のスラッシュが取り除かれる
        assert_eq!(config.base_url, "https://example.atlassian.net");
        match config.auth {
            Auth::Basic {
                username,
                api_token,
            } => {
                assert_eq!(username, "test@example.com");
                assert_eq!(api_token, "test_token");
            }
            _ => panic!("Expected Basic auth"),
        }
    }

    #[test]
    fn test_jira_config_new_with_invalid_url() {
        // Given: 無効なURL
        let auth = Auth::Bearer {
            token: "bearer_token_123".to_string(),
        };

        // When: JiraConfigを作成
        let result = JiraConfig::new("not a valid url", auth);

        // Then: エラーが返される
        match result.unwrap_err() {
            Error::InvalidConfiguration(msg) => assert_eq!(msg, "Invalid base URL"),
            other => panic!("Expected InvalidConfiguration error, got {:?}", other),
        }
    }

    #[test]
    fn test_jira_config_from_env_missing_token() {
        // Given: 認証情報が不完全
        unsafe {
            std::env::set_var("JIRA_URL", "https://test.atlassian.net");
            std::env::set_var("JIRA_USER", "test@example.com");
            std::env::remove_var("JIRA_API_TOKEN");
        }

        // When: from_env()を呼び出す
        let result = JiraConfig::from_env();

        // Then: エラーが返される
        match result.unwrap_err() {
            Error::ConfigurationMissing(msg) => assert!(msg.contains("JIRA_API_TOKEN")),
            other => panic!("Expected ConfigurationMissing error, got {:?}", other),
        }

        unsafe {
            std::env::remove_var("JIRA_URL");
            std::env::remove_var("JIRA_USER");
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = JiraRestClientSettings::default();

        assert_eq!(settings.max_issues_per_request, 20);
        assert!(settings.validate_query);
        assert!(!settings.enable_user_privacy_mode);
        assert_eq!(
            settings.custom_field_serializers.get(
                "com.atlassian.jira.plugin.system.customfieldtypes:cascadingselect"
            ),
            Some(&CustomFieldSerializer::CascadingSelect)
        );
    }

    #[test]
    fn test_settings_builder_overrides_serializer() {
        let settings = JiraRestClientSettings::new()
            .max_issues_per_request(50)
            .user_privacy_mode(true)
            .custom_field_serializer(
                "com.example:points",
                CustomFieldSerializer::Float,
            );

        assert_eq!(settings.max_issues_per_request, 50);
        assert!(settings.enable_user_privacy_mode);
        assert_eq!(
            settings.custom_field_serializers.get("com.example:points"),
            Some(&CustomFieldSerializer::Float)
        );
    }

    #[tokio::test]
    async fn test_execute_request_sends_basic_auth() {
        // Given: 認証ヘッダーを検証するモックサーバー
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/TEST"))
            .and(header(
                "Authorization",
                "Basic dGVzdEBleGFtcGxlLmNvbTp0ZXN0X3Rva2Vu",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "10000", "name": "Test Project"})),
            )
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(basic_config(mock_server.uri())).unwrap();

        // When: GETリクエストを送信
        let data: Value = client.get("/rest/api/2/project/TEST").await.unwrap();

        // Then: 正しいレスポンスが返る
        assert_eq!(data["id"], "10000");
        assert_eq!(data["name"], "Test Project");
    }

    #[tokio::test]
    async fn test_execute_request_empty_body_is_null() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/rest/api/2/issue/TST-1"))
            .and(body_json(json!({"fields": {"summary": "x"}})))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(basic_config(mock_server.uri())).unwrap();

        let result = client
            .put("/rest/api/2/issue/TST-1", &json!({"fields": {"summary": "x"}}))
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        // Given: 各種エラーステータスを返すモックサーバー
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Project not found"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Insufficient permissions"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/invalid"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errorMessages": ["Field is required"],
                "errors": {"summary": "You must specify a summary of the issue."}
            })))
            .mount(&mock_server)
            .await;

        let client = JiraClient::new(basic_config(mock_server.uri())).unwrap();

        // When/Then: ステータスごとに型付きエラーになる
        match client.get::<Value>("/missing").await.unwrap_err() {
            Error::NotFound(msg) => assert_eq!(msg, "Project not found"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
        match client.get::<Value>("/forbidden").await.unwrap_err() {
            Error::AuthenticationFailed(msg) => assert_eq!(msg, "Insufficient permissions"),
            other => panic!("Expected AuthenticationFailed, got {:?}", other),
        }
        assert!(matches!(
            client.get::<Value>("/throttled").await.unwrap_err(),
            Error::RateLimitExceeded
        ));
        match client.get::<Value>("/invalid").await.unwrap_err() {
            Error::ApiError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(
                    message,
                    "Field is required, summary: You must specify a summary of the issue."
                );
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }
}
