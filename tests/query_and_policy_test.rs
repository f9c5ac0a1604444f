//! execute_query row limits and statement permission gating.

mod common;

use common::{FakeWarehouse, call, registry, registry_with};
use serde_json::json;
use snowflake_mcp_server::config::{ServiceConfig, UnlistedStatements};
use snowflake_mcp_server::policy::StatementPolicy;
use std::io::Write;

#[tokio::test]
async fn test_limit_appended_once() {
    let wh = FakeWarehouse::new();
    let tools = registry(&wh);

    let (env, is_error) = call(
        &tools,
        "execute_query",
        json!({"query": "SELECT * FROM orders;", "limit": 10}),
    )
    .await;
    assert!(!is_error, "{env}");
    assert_eq!(env["row_count"], json!(5));
    assert_eq!(env["data"][0], json!({"N": 1}));

    call(
        &tools,
        "execute_query",
        json!({"query": "select * from orders limit 3", "limit": 10}),
    )
    .await;

    let executed = wh.executed();
    assert_eq!(executed[0], "SELECT * FROM orders LIMIT 10");
    assert_eq!(executed[1], "select * from orders limit 3");
}

#[tokio::test]
async fn test_session_parameters_reach_provider() {
    let wh = FakeWarehouse::new();
    let tools = registry(&wh);

    let (env, is_error) = call(
        &tools,
        "execute_query",
        json!({"query": "SELECT 1", "session_parameters": {"query_tag": "monthly-report"}}),
    )
    .await;
    assert!(!is_error, "{env}");
    call(&tools, "execute_query", json!({"query": "SELECT 1"})).await;

    let params = wh.session_params();
    assert_eq!(params.len(), 2);
    let first = params[0].as_ref().unwrap();
    assert_eq!(first["QUERY_TAG"], json!("monthly-report"));
    assert!(params[1].is_none());
}

#[tokio::test]
async fn test_limit_truncates_non_query_rows() {
    let wh = FakeWarehouse::new();
    let tools = registry(&wh);

    let (env, is_error) = call(
        &tools,
        "execute_query",
        json!({"query": "SHOW WAREHOUSES", "limit": 2}),
    )
    .await;
    assert!(!is_error, "{env}");
    assert_eq!(env["row_count"], json!(2));
    assert_eq!(wh.executed(), vec!["SHOW WAREHOUSES".to_string()]);
}

#[tokio::test]
async fn test_denied_statement_never_reaches_provider() {
    let wh = FakeWarehouse::new();
    let policy =
        StatementPolicy::from_pairs([("Select", true), ("Drop", false)], UnlistedStatements::Allow)
            .unwrap();
    let tools = registry_with(&wh, &ServiceConfig::default(), policy);

    let (env, is_error) = call(&tools, "execute_query", json!({"query": "DROP TABLE t"})).await;
    assert!(is_error);
    assert_eq!(env["success"], json!(false));
    assert!(env["error"].as_str().unwrap().contains("Drop"));

    let (env, is_error) = call(
        &tools,
        "drop_table",
        json!({"database_name": "DB", "schema_name": "S", "table_name": "T"}),
    )
    .await;
    assert!(is_error, "{env}");

    assert_eq!(wh.connects(), 0);
    assert!(wh.executed().is_empty());
}

#[tokio::test]
async fn test_multi_statement_denied_if_any_part_denied() {
    let wh = FakeWarehouse::new();
    let policy = StatementPolicy::from_pairs([("Delete", false)], UnlistedStatements::Allow).unwrap();
    let tools = registry_with(&wh, &ServiceConfig::default(), policy);

    let (_, is_error) = call(
        &tools,
        "execute_query",
        json!({"query": "SELECT 1; DELETE FROM orders"}),
    )
    .await;
    assert!(is_error);
    assert_eq!(wh.connects(), 0);
}

#[tokio::test]
async fn test_wrapped_dml_and_scripting_denied() {
    let wh = FakeWarehouse::new();
    let policy = StatementPolicy::from_pairs(
        [("Delete", false), ("Insert", false), ("Drop", false)],
        UnlistedStatements::Allow,
    )
    .unwrap();
    let tools = registry_with(&wh, &ServiceConfig::default(), policy);

    for query in [
        "WITH x AS (SELECT 1 AS a) DELETE FROM orders WHERE a IN (SELECT a FROM x)",
        "WITH x AS (SELECT 1 AS a) INSERT INTO orders SELECT a FROM x",
        "SELECT 1 UNION ALL (DELETE FROM orders)",
        "BEGIN DROP TABLE orders; END;",
        "EXECUTE IMMEDIATE $$ BEGIN DROP TABLE orders; END; $$",
    ] {
        let (env, is_error) = call(&tools, "execute_query", json!({"query": query})).await;
        assert!(is_error, "{query}: {env}");
        assert_eq!(env["success"], json!(false), "{query}");
    }
    assert_eq!(wh.connects(), 0);
    assert!(wh.executed().is_empty());
}

#[tokio::test]
async fn test_unlisted_deny_blocks_unlisted_types() {
    let wh = FakeWarehouse::new();
    let policy = StatementPolicy::from_pairs([("Select", true)], UnlistedStatements::Deny).unwrap();
    let tools = registry_with(&wh, &ServiceConfig::default(), policy);

    let (_, is_error) = call(&tools, "execute_query", json!({"query": "SELECT 1"})).await;
    assert!(!is_error);

    let (env, is_error) = call(
        &tools,
        "execute_query",
        json!({"query": "INSERT INTO t VALUES (1)"}),
    )
    .await;
    assert!(is_error);
    assert!(env["error"].as_str().unwrap().contains("Insert"));
    assert_eq!(wh.connects(), 1);
}

#[tokio::test]
async fn test_policy_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "sql_statement_permissions:\n  - Select: true\n  - type: Create\n    allow: false\nunlisted_statements: deny"
    )
    .unwrap();

    let config = ServiceConfig::load(file.path()).unwrap();
    let policy = StatementPolicy::from_service_config(&config, None).unwrap();
    assert_eq!(policy.unlisted(), UnlistedStatements::Deny);

    let wh = FakeWarehouse::new();
    let tools = registry_with(&wh, &config, policy);
    let (env, is_error) = call(
        &tools,
        "create_table",
        json!({
            "database_name": "DB", "schema_name": "S", "table_name": "T",
            "columns": [{"name": "id", "type": "INT"}]
        }),
    )
    .await;
    assert!(is_error);
    assert!(env["error"].as_str().unwrap().contains("Create"));
    assert_eq!(wh.connects(), 0);
}

#[test]
fn test_cli_override_beats_file_unlisted_setting() {
    let config = ServiceConfig::from_yaml("unlisted_statements: deny\n").unwrap();
    let policy =
        StatementPolicy::from_service_config(&config, Some(UnlistedStatements::Allow)).unwrap();
    assert_eq!(policy.unlisted(), UnlistedStatements::Allow);
}

#[test]
fn test_conflicting_permissions_rejected() {
    let config = ServiceConfig::from_yaml(
        "sql_statement_permissions:\n  - Select: true\n  - select: false\n",
    )
    .unwrap();
    assert!(StatementPolicy::from_service_config(&config, None).is_err());
}
