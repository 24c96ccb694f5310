/// 課題の作成・更新・ワークフローのテスト
///
/// モックサーバーに送られるリクエストの内容を確認します：
/// 1. 作成時の全フィールド送信 (null は送らない)
/// 2. 更新時の変更フィールドのみの送信
/// 3. ワークフローのアクション実行
/// 4. 担当者変更・削除
use jira_sdk::{
    Auth, Issue, IssueType, JiraClient, JiraConfig, WorkflowTransitionUpdates,
};
use serde_json::{Value, json};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SELECT_TYPE: &str = "com.atlassian.jira.plugin.system.customfieldtypes:select";

fn mock_client(server: &MockServer) -> JiraClient {
    let config = JiraConfig::new(
        server.uri(),
        Auth::Basic {
            username: "test@example.com".to_string(),
            api_token: "mock-api-token".to_string(),
        },
    )
    .unwrap();
    JiraClient::new(config).unwrap()
}

/// 参照データのモックを登録する
async fn mount_reference_data(server: &MockServer) {
    let endpoints = [
        (
            "/rest/api/2/field",
            json!([
                {"id": "summary", "name": "Summary", "custom": false},
                {"id": "customfield_10010", "name": "Severity", "custom": true,
                 "schema": {"type": "option", "custom": SELECT_TYPE}}
            ]),
        ),
        (
            "/rest/api/2/issuetype",
            json!([
                {"id": "1", "name": "Bug", "subtask": false},
                {"id": "5", "name": "Sub-task", "subtask": true}
            ]),
        ),
        (
            "/rest/api/2/priority",
            json!([{"id": "1", "name": "Blocker"}, {"id": "3", "name": "Major"}]),
        ),
        (
            "/rest/api/2/resolution",
            json!([{"id": "1", "name": "Fixed"}, {"id": "2", "name": "Won't Fix"}]),
        ),
    ];

    for (resource, body) in endpoints {
        Mock::given(method("GET"))
            .and(path(resource))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

fn existing_issue() -> Value {
    json!({
        "id": "10000",
        "key": "TST-1",
        "fields": {
            "summary": "Existing",
            "project": {"id": "10000", "key": "TST", "name": "Test"},
            "issuetype": {"id": "1", "name": "Bug", "subtask": false},
            "status": {"id": "1", "name": "Open"},
            "priority": {"id": "3", "name": "Major"},
            "labels": ["a"],
            "components": [{"id": "10", "name": "Backend"}],
            "customfield_10010": {"value": "Low", "id": "20"}
        }
    })
}

async fn mount_existing_issue(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(existing_issue()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_issue_sends_resolved_fields() {
    // Given: 名前だけを指定した新しい課題
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_json(json!({
            "fields": {
                "summary": "New issue",
                "project": {"key": "TST"},
                "issuetype": {"id": "1"},
                "priority": {"id": "1"},
                "labels": ["triage"],
                "customfield_10010": {"value": "High"}
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "10001", "key": "TST-2", "self": "http://localhost/rest/api/2/issue/10001"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10001",
            "key": "TST-2",
            "fields": {"summary": "New issue", "project": {"key": "TST"}}
        })))
        .mount(&server)
        .await;
    let client = mock_client(&server);

    let mut issue = Issue::new("TST");
    issue.summary = Some("New issue".to_string());
    issue.set_issue_type("Bug");
    issue.priority = Some("Blocker".into());
    issue.labels.add("triage");
    issue
        .set_custom_field(&client, "Severity", Some("High"))
        .await
        .unwrap();

    // When
    let key = client.create_issue(&mut issue).await.unwrap();

    // Then: サーバーの状態で置き換えられている
    assert_eq!(key, "TST-2");
    assert_eq!(issue.key(), Some("TST-2"));
}

#[tokio::test]
async fn test_create_without_labels_omits_labels_field() {
    // Given: 要約と課題タイプだけを指定した新しい課題
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_json(json!({
            "fields": {
                "summary": "s",
                "project": {"key": "TST"},
                "issuetype": {"id": "1"}
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10003", "key": "TST-4"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10003",
            "key": "TST-4",
            "fields": {"summary": "s", "project": {"key": "TST"}}
        })))
        .mount(&server)
        .await;
    let client = mock_client(&server);

    let mut issue = Issue::new("TST");
    issue.summary = Some("s".to_string());
    issue.set_issue_type("Bug");

    // When / Then: labels キーは送られない (expect(1) で検証)
    assert_ok!(client.create_issue(&mut issue).await);
}

#[tokio::test]
async fn test_create_sub_task_references_parent() {
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_partial_json(json!({
            "fields": {
                "parent": {"key": "TST-1"},
                "issuetype": {"id": "5"}
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10002", "key": "TST-3"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10002",
            "key": "TST-3",
            "fields": {"project": {"key": "TST"}, "parent": {"id": "10000", "key": "TST-1"}}
        })))
        .mount(&server)
        .await;
    let client = mock_client(&server);

    let mut issue = Issue::new_sub_task("TST", "TST-1");
    issue.summary = Some("Child".to_string());
    issue.set_issue_type(IssueType::from_name("Sub-task"));

    client.save_changes(&mut issue).await.unwrap();

    assert_eq!(issue.key(), Some("TST-3"));
    assert_eq!(issue.parent_issue_key(), Some("TST-1"));
}

#[tokio::test]
async fn test_save_changes_sends_collection_and_custom_field_diffs() {
    // Given: ラベルを追加し、コンポーネントを空にし、カスタムフィールドを変更
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    mount_existing_issue(&server).await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/2/issue/TST-1"))
        .and(body_json(json!({
            "fields": {
                "labels": ["a", "urgent"],
                "components": [],
                "customfield_10010": {"value": "Critical"}
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = mock_client(&server);

    let mut issue = client.get_issue("TST-1").await.unwrap();
    issue.labels.add("urgent");
    issue.components.clear();
    issue
        .set_custom_field(&client, "Severity", Some("Critical"))
        .await
        .unwrap();

    // When
    let result = client.save_changes(&mut issue).await;

    // Then: 更新後はサーバーの状態に戻る
    assert!(result.is_ok());
    assert_eq!(issue.summary.as_deref(), Some("Existing"));
}

#[tokio::test]
async fn test_unchanged_issue_is_not_sent() {
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    mount_existing_issue(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    let client = mock_client(&server);

    let mut issue = client.get_issue("TST-1").await.unwrap();
    issue.summary = Some("Existing".to_string());

    assert_ok!(client.update_issue(&mut issue).await);
}

#[tokio::test]
async fn test_workflow_action_by_name_with_comment() {
    // Given: 解決状況を設定してから "Resolve Issue" を実行
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    mount_existing_issue(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-1/transitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transitions": [
                {"id": "5", "name": "Resolve Issue", "to": {"id": "5", "name": "Resolved"}},
                {"id": "2", "name": "Close Issue"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/TST-1/transitions"))
        .and(body_json(json!({
            "transition": {"id": "5"},
            "fields": {"resolution": {"id": "1"}},
            "update": {"comment": [{"add": {"body": "Fixed in build 42"}}]}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = mock_client(&server);
    let mut issue = client.get_issue("TST-1").await.unwrap();
    issue.resolution = Some("Fixed".into());

    // When
    let result = client
        .execute_workflow_action(
            &mut issue,
            "Resolve Issue",
            Some(WorkflowTransitionUpdates::with_comment("Fixed in build 42")),
        )
        .await;

    // Then
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_workflow_action_by_id_skips_lookup() {
    let server = MockServer::start().await;
    mount_reference_data(&server).await;
    mount_existing_issue(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/TST-1/transitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transitions": []})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/TST-1/transitions"))
        .and(body_json(json!({"transition": {"id": "2"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = mock_client(&server);
    let mut issue = client.get_issue("TST-1").await.unwrap();

    assert_ok!(client.execute_workflow_action(&mut issue, "2", None).await);
}

#[tokio::test]
async fn test_assign_and_delete_issue() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/2/issue/TST-1/assignee"))
        .and(body_json(json!({"name": "jdoe"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/api/2/issue/TST-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let client = mock_client(&server);

    assert_ok!(client.assign_issue("TST-1", Some("jdoe")).await);
    assert_ok!(client.delete_issue("TST-1").await);
}
