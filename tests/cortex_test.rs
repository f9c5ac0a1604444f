//! Cortex Search / Analyst tools end to end: YAML service file, real REST
//! provider, mocked Snowflake endpoints.

mod common;

use common::call;
use serde_json::json;
use snowflake_mcp_server::config::{Config, UnlistedStatements};
use snowflake_mcp_server::mcp::SnowflakeService;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICES_YAML: &str = r#"
search_services:
  - service_name: product-docs
    description: Search product documentation
    database_name: KB
    schema_name: PUBLIC
    columns: [TITLE, BODY]
    limit: 3
  - service_name: ""
    description: skipped
analyst_services:
  - service_name: sales
    description: Revenue questions
    semantic_model: "@SALES.PUBLIC.MODELS/revenue.yaml"
other_services:
  object_manager: false
  semantic_manager: false
sql_statement_permissions:
  - Select: true
"#;

fn service_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SERVICES_YAML.as_bytes()).unwrap();
    file
}

fn service(server: &MockServer, file: &NamedTempFile) -> SnowflakeService {
    let config = Config {
        account: Some("myorg-acct".into()),
        user: Some("alice".into()),
        password: Some("pat-secret".into()),
        host: Some(server.uri()),
        service_config_file: Some(file.path().to_path_buf()),
        unlisted_statements: Some(UnlistedStatements::Deny),
        ..Config::default()
    };
    SnowflakeService::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_registry_from_service_file() {
    let server = MockServer::start().await;
    let file = service_file();
    let svc = service(&server, &file);

    assert_eq!(
        svc.registry().names(),
        vec!["analyst_sales", "execute_query", "search_product_docs"]
    );
}

#[tokio::test]
async fn test_search_posts_descriptor_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/api/v2/databases/KB/schemas/PUBLIC/cortex-search-services/product-docs:query",
        ))
        .and(header("Authorization", "Bearer pat-secret"))
        .and(body_json(json!({
            "query": "refund policy",
            "filter": {"@eq": {"REGION": "EU"}},
            "limit": 3,
            "columns": ["TITLE", "BODY"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"TITLE": "Refunds", "BODY": "Within 30 days"}],
            "request_id": "abc",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = service_file();
    let svc = service(&server, &file);
    let (env, is_error) = call(
        svc.registry(),
        "search_product_docs",
        json!({"query": "refund policy", "filter_query": {"@eq": {"REGION": "EU"}}}),
    )
    .await;

    assert!(!is_error, "{env}");
    assert_eq!(env["success"], json!(true));
    assert_eq!(env["service"], json!("product-docs"));
    assert_eq!(env["response"]["results"][0]["TITLE"], json!("Refunds"));
}

#[tokio::test]
async fn test_analyst_uses_semantic_model_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/cortex/analyst/message"))
        .and(body_partial_json(json!({
            "semantic_model_file": "@SALES.PUBLIC.MODELS/revenue.yaml",
            "stream": false,
            "messages": [{"role": "user", "content": [{"type": "text", "text": "Revenue by month?"}]}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "analyst", "content": [{"type": "sql", "statement": "SELECT 1"}]},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = service_file();
    let svc = service(&server, &file);
    let (env, is_error) = call(svc.registry(), "analyst_sales", json!({"query": "Revenue by month?"})).await;

    assert!(!is_error, "{env}");
    assert_eq!(env["response"]["message"]["role"], json!("analyst"));
}

#[tokio::test]
async fn test_cortex_http_error_becomes_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/cortex/analyst/message"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "semantic model not found"})),
        )
        .mount(&server)
        .await;

    let file = service_file();
    let svc = service(&server, &file);
    let (env, is_error) = call(svc.registry(), "analyst_sales", json!({"query": "q"})).await;

    assert!(is_error);
    assert_eq!(env["success"], json!(false));
    assert!(env["error"].as_str().unwrap().contains("semantic model not found"));
}

#[tokio::test]
async fn test_denied_sql_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let file = service_file();
    let svc = service(&server, &file);
    let (env, is_error) = call(svc.registry(), "execute_query", json!({"query": "DELETE FROM t"})).await;

    assert!(is_error);
    assert!(env["error"].as_str().unwrap().contains("Delete"));
}
