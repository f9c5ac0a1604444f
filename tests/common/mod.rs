//! Shared fixtures for integration tests: an in-memory warehouse that understands
//! the statements the tools generate, plus helpers to call tools by name.

#![allow(dead_code)]

use async_trait::async_trait;
use rmcp::model::{JsonObject, RawContent};
use serde_json::{Map, Value, json};
use snowflake_mcp_server::config::ServiceConfig;
use snowflake_mcp_server::error::{ServerError, ServerResult};
use snowflake_mcp_server::policy::StatementPolicy;
use snowflake_mcp_server::registry::ToolRegistry;
use snowflake_mcp_server::warehouse::{
    ColumnMeta, ConnectionProvider, ResultSet, Row, SessionParams, StatementExecutor,
    WarehouseSession,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct FakeColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub kind: String,
    pub columns: Vec<FakeColumn>,
    pub rows: u64,
    pub bytes: u64,
}

#[derive(Default)]
struct State {
    /// Keyed by upper-case `DB.SCHEMA.TABLE`
    tables: BTreeMap<String, FakeTable>,
    views: BTreeMap<String, ()>,
    executed: Vec<String>,
    session_params: Vec<Option<SessionParams>>,
    connects: usize,
    closes: usize,
}

/// An in-memory warehouse. Cloning shares state.
#[derive(Clone, Default)]
pub struct FakeWarehouse {
    state: Arc<Mutex<State>>,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, qualified: &str, kind: &str, rows: u64, bytes: u64) {
        self.state.lock().unwrap().tables.insert(
            qualified.to_uppercase(),
            FakeTable {
                kind: kind.to_string(),
                columns: vec![FakeColumn {
                    name: "ID".into(),
                    data_type: "NUMBER(38,0)".into(),
                    nullable: false,
                    default: None,
                    comment: None,
                }],
                rows,
                bytes,
            },
        );
    }

    pub fn add_view(&self, qualified: &str) {
        self.state
            .lock()
            .unwrap()
            .views
            .insert(qualified.to_uppercase(), ());
    }

    pub fn table(&self, qualified: &str) -> Option<FakeTable> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&qualified.to_uppercase())
            .cloned()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Session parameters passed to each `connect`, in order.
    pub fn session_params(&self) -> Vec<Option<SessionParams>> {
        self.state.lock().unwrap().session_params.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    fn run(&self, sql: &str) -> ServerResult<ResultSet> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        let upper = sql.to_uppercase();

        if upper.starts_with("CREATE") {
            let (name, table) = parse_create(sql)?;
            if state.tables.contains_key(&name) && !upper.starts_with("CREATE OR REPLACE") {
                return Err(ServerError::execution(
                    format!("Object '{}' already exists.", name),
                    Some("42710".into()),
                ));
            }
            state.tables.insert(name.clone(), table);
            return Ok(status_row(format!("Table {} successfully created.", name)));
        }

        if let Some(rest) = upper.strip_prefix("DROP TABLE ") {
            let (if_exists, name) = match rest.strip_prefix("IF EXISTS ") {
                Some(name) => (true, name.trim().to_string()),
                None => (false, rest.trim().to_string()),
            };
            if state.tables.remove(&name).is_none() && !if_exists {
                return Err(not_found(&name));
            }
            return Ok(status_row(format!("{} successfully dropped.", name)));
        }

        if let Some(name) = upper.strip_prefix("DESCRIBE TABLE ") {
            let name = name.trim();
            let table = state.tables.get(name).ok_or_else(|| not_found(name))?;
            let rows = table
                .columns
                .iter()
                .map(|c| {
                    row(json!({
                        "name": c.name,
                        "type": c.data_type,
                        "kind": "COLUMN",
                        "null?": if c.nullable { "Y" } else { "N" },
                        "default": c.default,
                        "primary key": "N",
                        "unique key": "N",
                        "comment": c.comment,
                    }))
                })
                .collect();
            return Ok(ResultSet::new(vec![], rows));
        }

        if upper.starts_with("SHOW TABLES") {
            let (pattern, scope) = show_scope(&upper);
            let rows = state
                .tables
                .iter()
                .filter(|(name, _)| in_scope(name, &scope, pattern.as_deref()))
                .map(|(name, t)| {
                    let parts: Vec<&str> = name.split('.').collect();
                    row(json!({
                        "name": parts[2],
                        "database_name": parts[0],
                        "schema_name": parts[1],
                        "kind": t.kind,
                        "comment": "",
                        "rows": t.rows,
                        "bytes": t.bytes,
                        "owner": "SYSADMIN",
                        "created_on": "2024-01-01T00:00:00.000Z",
                    }))
                })
                .collect();
            return Ok(ResultSet::new(vec![], rows));
        }

        if upper.starts_with("SHOW VIEWS") {
            let (pattern, scope) = show_scope(&upper);
            let rows = state
                .views
                .keys()
                .filter(|name| in_scope(name, &scope, pattern.as_deref()))
                .map(|name| {
                    let parts: Vec<&str> = name.split('.').collect();
                    row(json!({
                        "name": parts[2],
                        "database_name": parts[0],
                        "schema_name": parts[1],
                        "comment": null,
                        "owner": "SYSADMIN",
                        "created_on": "2024-02-01T00:00:00.000Z",
                    }))
                })
                .collect();
            return Ok(ResultSet::new(vec![], rows));
        }

        if upper.starts_with("SHOW DATABASES") {
            return Ok(ResultSet::new(
                vec![],
                vec![
                    row(json!({"name": "ANALYTICS", "owner": "SYSADMIN", "comment": "", "created_on": "2024-01-01T00:00:00.000Z"})),
                    row(json!({"name": "RAW", "owner": "SYSADMIN", "comment": "landing", "created_on": "2024-01-02T00:00:00.000Z"})),
                ],
            ));
        }

        if upper.starts_with("SHOW SCHEMAS") {
            return Ok(ResultSet::new(
                vec![],
                vec![row(json!({
                    "name": "PUBLIC", "database_name": "ANALYTICS", "owner": "SYSADMIN",
                    "comment": null, "created_on": "2024-01-01T00:00:00.000Z"
                }))],
            ));
        }

        if upper.starts_with("SHOW WAREHOUSES") {
            let rows = ["WH_XS", "WH_S", "WH_M"]
                .iter()
                .map(|n| row(json!({"name": n, "state": "SUSPENDED"})))
                .collect();
            return Ok(ResultSet::new(vec![], rows));
        }

        // Any other query returns five numbered rows.
        let rows = (1..=5).map(|n| row(json!({"N": n}))).collect();
        Ok(ResultSet::new(vec![ColumnMeta::new("N", "fixed")], rows))
    }
}

#[async_trait]
impl ConnectionProvider for FakeWarehouse {
    async fn connect(
        &self,
        session_params: Option<&SessionParams>,
    ) -> ServerResult<Box<dyn WarehouseSession>> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        state.session_params.push(session_params.cloned());
        drop(state);
        Ok(Box::new(FakeSession {
            warehouse: self.clone(),
        }))
    }
}

struct FakeSession {
    warehouse: FakeWarehouse,
}

#[async_trait]
impl WarehouseSession for FakeSession {
    async fn execute(&mut self, sql: &str) -> ServerResult<ResultSet> {
        self.warehouse.run(sql)
    }

    async fn post(&mut self, api_path: &str, body: &Value) -> ServerResult<Value> {
        Ok(json!({"api_path": api_path, "echo": body}))
    }

    async fn close(self: Box<Self>) -> ServerResult<()> {
        self.warehouse.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn status_row(message: String) -> ResultSet {
    ResultSet::new(vec![], vec![row(json!({"status": message}))])
}

fn not_found(name: &str) -> ServerError {
    ServerError::execution(
        format!("Table '{}' does not exist or not authorized.", name),
        Some("42S02".into()),
    )
}

/// `(LIKE pattern, "DB.SCHEMA")` from a `SHOW ... [LIKE '..'] IN SCHEMA DB.S` statement.
fn show_scope(upper: &str) -> (Option<String>, String) {
    let pattern = upper.split_once("LIKE '").and_then(|(_, rest)| {
        rest.split_once('\'').map(|(p, _)| p.to_string())
    });
    let scope = upper
        .split_once("IN SCHEMA ")
        .map(|(_, s)| s.trim().to_string())
        .unwrap_or_default();
    (pattern, scope)
}

fn in_scope(name: &str, scope: &str, pattern: Option<&str>) -> bool {
    let Some((prefix, table)) = name.rsplit_once('.') else {
        return false;
    };
    if prefix != scope {
        return false;
    }
    match pattern {
        None => true,
        Some(p) => match p.strip_suffix('%') {
            Some(start) => table.starts_with(start),
            None => table == p,
        },
    }
}

/// Parse the `CREATE TABLE` text produced by the DDL builder.
fn parse_create(sql: &str) -> ServerResult<(String, FakeTable)> {
    let bad = || ServerError::execution(format!("syntax error: {}", sql), Some("42000".into()));
    let (head, body) = sql.split_once("(\n").ok_or_else(bad)?;
    let (columns, _) = body.rsplit_once("\n)").ok_or_else(bad)?;
    let name = head
        .trim()
        .rsplit(' ')
        .next()
        .ok_or_else(bad)?
        .to_uppercase();

    let columns = columns
        .lines()
        .map(|line| parse_column(line.trim().trim_end_matches(',')))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(bad)?;

    Ok((
        name,
        FakeTable {
            kind: "TABLE".into(),
            columns,
            rows: 0,
            bytes: 0,
        },
    ))
}

fn parse_column(def: &str) -> Option<FakeColumn> {
    let (name, rest) = def.split_once(' ')?;
    let (rest, comment) = match rest.split_once(" COMMENT '") {
        Some((r, c)) => (r, Some(c.trim_end_matches('\'').replace("''", "'"))),
        None => (rest, None),
    };
    let (rest, default) = match rest.split_once(" DEFAULT ") {
        Some((r, d)) => (r, Some(d.to_string())),
        None => (rest, None),
    };
    let (data_type, nullable) = match rest.strip_suffix(" NOT NULL") {
        Some(t) => (t, false),
        None => (rest, true),
    };
    Some(FakeColumn {
        name: name.to_uppercase(),
        data_type: data_type.to_string(),
        nullable,
        default,
        comment,
    })
}

/// Build the tool registry over `warehouse` with the given policy.
pub fn registry_with(
    warehouse: &FakeWarehouse,
    config: &ServiceConfig,
    policy: StatementPolicy,
) -> ToolRegistry {
    let executor = StatementExecutor::new(Arc::new(warehouse.clone()), Arc::new(policy));
    ToolRegistry::build(config, executor).unwrap()
}

pub fn registry(warehouse: &FakeWarehouse) -> ToolRegistry {
    registry_with(warehouse, &ServiceConfig::default(), StatementPolicy::permissive())
}

/// Call a tool and return `(envelope, is_error)`.
pub async fn call(registry: &ToolRegistry, name: &str, args: Value) -> (Value, bool) {
    let args: JsonObject = match args {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    let result = registry.call(name, args).unwrap().await;
    let text = match &result.content[0].raw {
        RawContent::Text(t) => t.text.clone(),
        other => panic!("unexpected content: {:?}", other),
    };
    let envelope: Value = serde_json::from_str(&text).unwrap();
    (envelope, result.is_error == Some(true))
}
