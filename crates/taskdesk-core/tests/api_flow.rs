use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::Url;
use serde_json::{Value, json};
use taskdesk_core::api::{ApiClient, Assignee};
use taskdesk_core::error::ApiError;
use taskdesk_core::token_store::{TokenStorage, TokenStore};
use taskdesk_shared::{LoginRequest, Role, TaskRequest, UserRequest};
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_with(payload: Value) -> String {
    encode(&Header::default(), &payload, &EncodingKey::from_secret(b"test-secret")).expect("token")
}

fn client(server: &MockServer) -> ApiClient {
    let base = Url::parse(&server.uri()).expect("server url");
    ApiClient::new(base, Duration::from_secs(5)).expect("client")
}

fn task_json(id: i64, title: &str, completed: bool) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "",
        "completed": completed,
        "dueDate": "2026-11-01T00:00:00",
        "createdAt": "2026-10-01T08:00:00",
        "user": { "id": 1, "name": "Ana", "mail": "ana@example.com" }
    })
}

fn page_json(content: Vec<Value>, number: u32, total_pages: u32) -> Value {
    json!({
        "totalElements": content.len(),
        "content": content,
        "number": number,
        "size": 10,
        "totalPages": total_pages,
        "first": number == 0,
        "last": number + 1 >= total_pages
    })
}

#[tokio::test]
async fn login_persists_token_and_authorizes_later_calls() {
    let server = MockServer::start().await;
    let token = token_with(json!({ "sub": "ana@example.com", "role": "ADMIN", "id": 1, "exp": 4_000_000_000_i64 }));

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "username": "ana@example.com", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .expect(1)
        .mount(&server)
        .await;

    let bearer = format!("Bearer {token}");
    Mock::given(method("GET"))
        .and(path("/tareas"))
        .and(header("Authorization", bearer.as_str()))
        .and(query_param("page", "0"))
        .and(query_param("size", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![task_json(1, "Write report", false)], 0, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().expect("tempdir");
    let store = TokenStore::open(dir.path()).expect("store");
    let api = client(&server);

    let credentials = LoginRequest {
        username: "ana@example.com".to_string(),
        password: "secret".to_string(),
    };
    let response = api.login(&store, &credentials).await.expect("login");
    assert_eq!(response.token, token);
    assert_eq!(store.load().expect("load").as_deref(), Some(token.as_str()));

    let authed = api.with_token(store.load().expect("load"));
    let page = authed.list_tasks(0, 10).await.expect("list");
    assert_eq!(page.content[0].title, "Write report");
    assert!(page.last);
}

#[tokio::test]
async fn rejected_login_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let dir = tempdir().expect("tempdir");
    let store = TokenStore::open(dir.path()).expect("store");
    let err = client(&server)
        .login(
            &store,
            &LoginRequest {
                username: "ana@example.com".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await
        .expect_err("must fail");

    assert_eq!(err.to_string(), "invalid credentials");
    assert_eq!(err.status(), Some(403));
    assert_eq!(store.load().expect("load"), None);
}

#[tokio::test]
async fn created_task_comes_back_with_sent_fields() {
    let server = MockServer::start().await;
    let request = TaskRequest {
        title: "Write report".to_string(),
        description: "quarterly".to_string(),
        due_date: "2026-12-31".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/tareas/usuario/me"))
        .and(body_json(json!({ "title": "Write report", "description": "quarterly", "dueDate": "2026-12-31" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9,
            "title": "Write report",
            "description": "quarterly",
            "completed": false,
            "dueDate": "2026-12-31",
            "createdAt": "2026-10-18T09:00:00",
            "user": { "id": 3, "name": "Bo", "mail": "bo@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tareas/usuario/4"))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_json(10, "Write report", false)))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).with_token(Some("t".to_string()));
    let task = api.create_task(&request, Assignee::Me).await.expect("create");
    assert_eq!(task.title, request.title);
    assert_eq!(task.description, request.description);
    assert_eq!(task.due_date, request.due_date);
    assert!(!task.completed);

    let assigned = api
        .create_task(&request, Assignee::from_user_id(Some(4)))
        .await
        .expect("create for user");
    assert_eq!(assigned.id, 10);
}

#[tokio::test]
async fn field_errors_and_plain_failures_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/usuarios"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "mail": "must be a well-formed email address",
            "password": "size must be between 6 and 64"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/usuarios/3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tareas/4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Tarea eliminada"))
        .mount(&server)
        .await;

    let api = client(&server).with_token(Some("t".to_string()));
    let err = api
        .create_user(&UserRequest {
            name: "Bo".to_string(),
            password: "x".to_string(),
            mail: "nope".to_string(),
            role: Role::User,
        })
        .await
        .expect_err("invalid user");
    match err {
        ApiError::Validation { status, fields } => {
            assert_eq!(status, 400);
            assert_eq!(fields["password"], "size must be between 6 and 64");
        }
        other => panic!("expected field errors, got {other:?}"),
    }

    let err = api.delete_user(3).await.expect_err("server error");
    assert_eq!(err.to_string(), "Error 500: Internal Server Error");

    assert_eq!(api.delete_task(4).await.expect("delete"), "Tarea eliminada");
}

#[tokio::test]
async fn current_user_walks_pages_by_mail() {
    let server = MockServer::start().await;
    let user = |id: i64, mail: &str| json!({ "id": id, "name": "x", "mail": mail, "role": "USER" });

    Mock::given(method("GET"))
        .and(path("/usuarios"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![user(1, "ana@example.com")], 0, 2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/usuarios"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![user(2, "bo@example.com")], 1, 2)))
        .mount(&server)
        .await;

    let api = client(&server).with_token(Some("t".to_string()));
    let found = api.current_user("bo@example.com", 1).await.expect("lookup");
    assert_eq!(found.map(|u| u.id), Some(2));

    let missing = api.current_user("zoe@example.com", 1).await.expect("lookup");
    assert!(missing.is_none());
}
