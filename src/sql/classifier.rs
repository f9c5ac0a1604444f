//! SQL statement classification.
//!
//! A single classifier serves both permission gating and `execute_query`'s row-limit
//! handling. Statements are parsed with [sqlparser](https://docs.rs/sqlparser/) using the
//! Snowflake dialect. Snowflake has plenty of syntax the parser does not know
//! (`SHOW WAREHOUSES`, `SHOW SEMANTIC VIEWS`, `PUT`, ...), so when parsing fails each
//! statement is classified by its leading keyword from the tokenizer instead.
//!
//! Classification looks through wrappers that Snowflake executes: DML under a
//! `WITH` clause, scripting blocks (`BEGIN ... END`) and `EXECUTE IMMEDIATE`
//! bodies all report the statements they would run.

use crate::error::{ServerError, ServerResult};
use sqlparser::ast::{Expr, SetExpr, Statement, visit_statements};
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;

/// Type of SQL statement, used as the token in permission rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Alter,
    Drop,
    TruncateTable,
    Comment,
    Describe,
    Show,
    Use,
    Grant,
    Revoke,
    Commit,
    Rollback,
    Transaction,
    Call,
    Copy,
    /// Session and stage commands (SET, UNSET, PUT, GET, LIST, ...)
    Command,
    Unknown,
}

impl StatementType {
    pub const ALL: [StatementType; 22] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Merge,
        Self::Create,
        Self::Alter,
        Self::Drop,
        Self::TruncateTable,
        Self::Comment,
        Self::Describe,
        Self::Show,
        Self::Use,
        Self::Grant,
        Self::Revoke,
        Self::Commit,
        Self::Rollback,
        Self::Transaction,
        Self::Call,
        Self::Copy,
        Self::Command,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "Select",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Merge => "Merge",
            Self::Create => "Create",
            Self::Alter => "Alter",
            Self::Drop => "Drop",
            Self::TruncateTable => "TruncateTable",
            Self::Comment => "Comment",
            Self::Describe => "Describe",
            Self::Show => "Show",
            Self::Use => "Use",
            Self::Grant => "Grant",
            Self::Revoke => "Revoke",
            Self::Commit => "Commit",
            Self::Rollback => "Rollback",
            Self::Transaction => "Transaction",
            Self::Call => "Call",
            Self::Copy => "Copy",
            Self::Command => "Command",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementType {
    type Err = ServerError;

    /// Case-insensitive; `Truncate` is accepted as an alias of `TruncateTable`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("truncate") {
            return Ok(Self::TruncateTable);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| {
                ServerError::configuration(format!(
                    "Unknown SQL statement type '{}'. Expected one of: {}",
                    token,
                    Self::ALL
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Classify every statement in `sql`.
///
/// Returns the types of everything the text would execute, in order. A query
/// whose body is DML (`WITH ... DELETE`) reports the DML type. Snowflake
/// scripting blocks and `EXECUTE IMMEDIATE` bodies report the statements inside
/// them; contents that cannot be classified report [`StatementType::Unknown`].
/// Empty input (or input that is only comments and semicolons) is a validation
/// error.
pub fn classify(sql: &str) -> ServerResult<Vec<StatementType>> {
    let dialect = SnowflakeDialect {};
    let types: Vec<StatementType> = match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements.iter().flat_map(statement_types).collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Parser rejected statement, classifying by leading keyword");
            classify_by_keyword(sql)?
        }
    };

    if types.is_empty() {
        return Err(ServerError::validation("Empty SQL statement"));
    }
    Ok(types)
}

/// Types of a top-level statement and every statement nested inside it.
fn statement_types(stmt: &Statement) -> Vec<StatementType> {
    let mut types = Vec::new();
    let _ = visit_statements(stmt, |s| {
        for ty in own_types(s) {
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        ControlFlow::<()>::Continue(())
    });
    if types.is_empty() {
        types.push(StatementType::Unknown);
    }
    types
}

/// Types contributed by one statement, not counting its nested statements.
fn own_types(stmt: &Statement) -> Vec<StatementType> {
    match stmt {
        // Scripting containers run what they hold; the visitor reports that.
        Statement::StartTransaction {
            has_end_keyword: true,
            ..
        }
        | Statement::If(_)
        | Statement::While(_)
        | Statement::Case(_) => Vec::new(),
        Statement::Execute {
            immediate: true,
            parameters,
            ..
        } => {
            let body = parameters.first().and_then(|p| match p {
                Expr::Value(v) => v.value.clone().into_string(),
                _ => None,
            });
            immediate_types(body.as_deref())
        }
        other => vec![classify_statement(other)],
    }
}

/// `EXECUTE IMMEDIATE` runs its string argument as SQL.
fn immediate_types(body: Option<&str>) -> Vec<StatementType> {
    match body.map(classify) {
        Some(Ok(types)) => types,
        _ => vec![StatementType::Unknown],
    }
}

/// Type of a query body. DML bodies come from `WITH ... INSERT/UPDATE/DELETE/MERGE`.
fn set_expr_type(body: &SetExpr) -> StatementType {
    use StatementType as T;

    match body {
        SetExpr::Query(query) => set_expr_type(&query.body),
        SetExpr::SetOperation { left, right, .. } => match set_expr_type(left) {
            T::Select => set_expr_type(right),
            other => other,
        },
        SetExpr::Insert(_) => T::Insert,
        SetExpr::Update(_) => T::Update,
        SetExpr::Delete(_) => T::Delete,
        SetExpr::Merge(_) => T::Merge,
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => T::Select,
    }
}

/// Classify a parsed statement.
fn classify_statement(stmt: &Statement) -> StatementType {
    use StatementType as T;

    match stmt {
        Statement::Query(query) => set_expr_type(&query.body),

        Statement::Insert(_) => T::Insert,
        Statement::Update { .. } => T::Update,
        Statement::Delete(_) => T::Delete,
        Statement::Merge { .. } => T::Merge,
        Statement::Copy { .. } | Statement::CopyIntoSnowflake { .. } => T::Copy,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSecret { .. }
        | Statement::CreateStage { .. }
        | Statement::CreatePolicy { .. }
        | Statement::CreateConnector { .. } => T::Create,

        Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterSchema { .. }
        | Statement::AlterRole { .. }
        | Statement::AlterSession { .. }
        | Statement::AlterPolicy { .. }
        | Statement::AlterType { .. }
        | Statement::AlterConnector { .. } => T::Alter,

        Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropProcedure { .. }
        | Statement::DropTrigger { .. }
        | Statement::DropSecret { .. }
        | Statement::DropPolicy { .. }
        | Statement::DropConnector { .. } => T::Drop,

        Statement::Truncate { .. } => T::TruncateTable,
        Statement::Comment { .. } => T::Comment,

        Statement::ExplainTable { .. } | Statement::Explain { .. } => T::Describe,

        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => T::Show,

        Statement::Use(_) => T::Use,
        Statement::Grant { .. } => T::Grant,
        Statement::Revoke { .. } => T::Revoke,

        Statement::StartTransaction { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => T::Transaction,
        Statement::Commit { .. } => T::Commit,
        Statement::Rollback { .. } => T::Rollback,

        Statement::Call { .. } | Statement::Execute { .. } => T::Call,

        Statement::Set(_) | Statement::Kill { .. } => T::Command,

        _ => T::Unknown,
    }
}

/// Map a leading keyword to a statement type.
fn classify_keyword(word: &str) -> StatementType {
    use StatementType as T;

    match word.to_ascii_uppercase().as_str() {
        "SELECT" | "WITH" | "VALUES" | "FROM" => T::Select,
        "INSERT" => T::Insert,
        "UPDATE" => T::Update,
        "DELETE" => T::Delete,
        "MERGE" => T::Merge,
        "CREATE" | "UNDROP" => T::Create,
        "ALTER" => T::Alter,
        "DROP" => T::Drop,
        "TRUNCATE" => T::TruncateTable,
        "COMMENT" => T::Comment,
        "DESCRIBE" | "DESC" | "EXPLAIN" => T::Describe,
        "SHOW" => T::Show,
        "USE" => T::Use,
        "GRANT" => T::Grant,
        "REVOKE" => T::Revoke,
        "COMMIT" => T::Commit,
        "ROLLBACK" => T::Rollback,
        "BEGIN" | "START" => T::Transaction,
        "CALL" | "EXECUTE" => T::Call,
        "COPY" => T::Copy,
        "SET" | "UNSET" | "PUT" | "GET" | "LIST" | "LS" | "REMOVE" | "RM" => T::Command,
        _ => T::Unknown,
    }
}

fn tokenize(sql: &str) -> ServerResult<Vec<Token>> {
    let dialect = SnowflakeDialect {};
    Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| ServerError::validation(format!("Failed to tokenize SQL: {}", e)))
}

/// Keywords after which a scripting block starts another statement.
const BLOCK_CONNECTORS: [&str; 6] = ["BEGIN", "THEN", "ELSE", "DO", "LOOP", "REPEAT"];

fn classify_by_keyword(sql: &str) -> ServerResult<Vec<StatementType>> {
    let tokens = tokenize(sql)?;

    let mut types = Vec::new();
    let mut segment = Vec::new();
    for token in tokens {
        match token {
            Token::SemiColon => {
                if !segment.is_empty() {
                    types.extend(classify_segment(&segment));
                    segment.clear();
                }
            }
            Token::Whitespace(_) | Token::EOF => {}
            other => segment.push(other),
        }
    }
    if !segment.is_empty() {
        types.extend(classify_segment(&segment));
    }

    Ok(types)
}

fn unquoted_word(tokens: &[Token], i: usize) -> Option<String> {
    match tokens.get(i) {
        Some(Token::Word(w)) if w.quote_style.is_none() => Some(w.value.to_ascii_uppercase()),
        _ => None,
    }
}

/// Classify the tokens between two semicolons.
///
/// `BEGIN` alone or followed by `TRANSACTION` / `WORK` starts a transaction;
/// followed by anything else it opens a scripting block and the statement after
/// it is classified instead. Statements introduced by a block connector
/// (`IF ... THEN DROP ...`) are reported alongside the leading one.
fn classify_segment(tokens: &[Token]) -> Vec<StatementType> {
    use StatementType as T;

    let mut start = tokens.iter().take_while(|t| matches!(t, Token::LParen)).count();
    while unquoted_word(tokens, start).as_deref() == Some("BEGIN") {
        match unquoted_word(tokens, start + 1).as_deref() {
            Some("TRANSACTION" | "WORK") => return vec![T::Transaction],
            _ if start + 1 >= tokens.len() => return vec![T::Transaction],
            _ => start += 1,
        }
    }
    if unquoted_word(tokens, start).as_deref() == Some("END") {
        return Vec::new();
    }

    let mut types = statement_at(tokens, start);
    for i in start..tokens.len() {
        let Some(word) = unquoted_word(tokens, i) else {
            continue;
        };
        if !BLOCK_CONNECTORS.contains(&word.as_str()) {
            continue;
        }
        for ty in statement_at(tokens, i + 1) {
            if ty != T::Unknown && !types.contains(&ty) {
                types.push(ty);
            }
        }
    }
    types
}

/// Classify the statement starting at `tokens[i]`.
fn statement_at(tokens: &[Token], i: usize) -> Vec<StatementType> {
    let Some(word) = unquoted_word(tokens, i) else {
        return vec![StatementType::Unknown];
    };
    if word == "EXECUTE" && unquoted_word(tokens, i + 1).as_deref() == Some("IMMEDIATE") {
        let body = match tokens.get(i + 2) {
            Some(Token::DollarQuotedString(s)) => Some(s.value.as_str()),
            Some(Token::SingleQuotedString(s)) => Some(s.as_str()),
            _ => None,
        };
        return immediate_types(body);
    }
    vec![classify_keyword(&word)]
}

/// Whether the SQL text already carries a row-limiting clause.
///
/// Only `LIMIT` / `FETCH` keyword tokens count. The same words inside string
/// literals, quoted identifiers or comments are ignored. Text that cannot be
/// tokenized is treated as limited so nothing is appended to it.
pub fn has_row_limit(sql: &str) -> bool {
    let Ok(tokens) = tokenize(sql) else {
        return true;
    };
    tokens.iter().any(|t| match t {
        Token::Word(w) if w.quote_style.is_none() => {
            matches!(w.keyword, Keyword::LIMIT | Keyword::FETCH)
        }
        _ => false,
    })
}

/// Append `LIMIT n` to a single statement, trimming trailing semicolons first.
pub fn append_limit(sql: &str, limit: u64) -> String {
    let trimmed = sql.trim_end().trim_end_matches(';').trim_end();

    // A trailing `--` comment would swallow a clause appended on the same line.
    let ends_in_line_comment = tokenize(trimmed)
        .ok()
        .and_then(|tokens| {
            tokens
                .into_iter()
                .rev()
                .find(|t| !matches!(t, Token::EOF | Token::Whitespace(Whitespace::Space)))
        })
        .is_some_and(|t| matches!(t, Token::Whitespace(Whitespace::SingleLineComment { .. })));

    if ends_in_line_comment {
        format!("{}\nLIMIT {}", trimmed, limit)
    } else {
        format!("{} LIMIT {}", trimmed, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(sql: &str) -> StatementType {
        let types = classify(sql).unwrap();
        assert_eq!(types.len(), 1, "expected one statement in {sql:?}");
        types[0]
    }

    #[test]
    fn test_classify_select() {
        assert_eq!(one("SELECT * FROM users"), StatementType::Select);
        assert_eq!(
            one("WITH x AS (SELECT 1 AS a) SELECT a FROM x"),
            StatementType::Select
        );
    }

    #[test]
    fn test_classify_dml() {
        assert_eq!(one("INSERT INTO t VALUES (1)"), StatementType::Insert);
        assert_eq!(one("UPDATE t SET a = 1"), StatementType::Update);
        assert_eq!(one("DELETE FROM t WHERE a = 1"), StatementType::Delete);
    }

    #[test]
    fn test_classify_ddl() {
        assert_eq!(one("CREATE TABLE t (id INT)"), StatementType::Create);
        assert_eq!(one("DROP TABLE t"), StatementType::Drop);
        assert_eq!(one("ALTER TABLE t ADD COLUMN b INT"), StatementType::Alter);
        assert_eq!(one("TRUNCATE TABLE t"), StatementType::TruncateTable);
    }

    #[test]
    fn test_classify_describe_and_show() {
        assert_eq!(one("DESCRIBE TABLE DB.S.T"), StatementType::Describe);
        assert_eq!(one("SHOW DATABASES"), StatementType::Show);
    }

    #[test]
    fn test_classify_vendor_syntax_by_keyword() {
        assert_eq!(one("SHOW WAREHOUSES"), StatementType::Show);
        assert_eq!(one("SHOW SEMANTIC VIEWS IN SCHEMA DB.S"), StatementType::Show);
        assert_eq!(one("PUT file:///tmp/x @my_stage"), StatementType::Command);
        assert_eq!(one("UNDROP TABLE t"), StatementType::Create);
    }

    #[test]
    fn test_classify_transactions() {
        assert_eq!(one("COMMIT"), StatementType::Commit);
        assert_eq!(one("ROLLBACK"), StatementType::Rollback);
        assert_eq!(classify_keyword("begin"), StatementType::Transaction);
    }

    #[test]
    fn test_classify_cte_prefixed_dml() {
        assert_eq!(
            classify("WITH x AS (SELECT 1 AS a) DELETE FROM t WHERE a IN (SELECT a FROM x)").unwrap(),
            vec![StatementType::Delete]
        );
        assert_eq!(
            classify("WITH x AS (SELECT 1 AS a) INSERT INTO t SELECT a FROM x").unwrap(),
            vec![StatementType::Insert]
        );
        assert_eq!(
            classify("WITH x AS (SELECT 1 AS a) UPDATE t SET b = 2").unwrap(),
            vec![StatementType::Update]
        );
    }

    #[test]
    fn test_set_expr_type_looks_through_set_operations() {
        use sqlparser::ast::SetExpr;

        let parsed = Parser::parse_sql(&SnowflakeDialect {}, "SELECT 1 UNION ALL SELECT 2").unwrap();
        let Statement::Query(query) = &parsed[0] else {
            panic!("expected a query");
        };
        assert!(matches!(*query.body, SetExpr::SetOperation { .. }));
        assert_eq!(set_expr_type(&query.body), StatementType::Select);
    }

    #[test]
    fn test_classify_set_operation_over_dml() {
        assert_eq!(
            classify("SELECT 1 UNION ALL (DELETE FROM t)").unwrap(),
            vec![StatementType::Delete]
        );
    }

    #[test]
    fn test_classify_scripting_block_reports_contents() {
        assert_eq!(classify("BEGIN DROP TABLE t; END;").unwrap(), vec![StatementType::Drop]);
        let types = classify("BEGIN SELECT 1; DELETE FROM t; END").unwrap();
        assert!(types.contains(&StatementType::Delete), "{types:?}");
        assert!(!types.contains(&StatementType::Transaction));
    }

    #[test]
    fn test_classify_execute_immediate_body() {
        assert_eq!(
            classify("EXECUTE IMMEDIATE $$ BEGIN DROP TABLE t; END; $$").unwrap(),
            vec![StatementType::Drop]
        );
        assert_eq!(
            classify("EXECUTE IMMEDIATE 'DELETE FROM t'").unwrap(),
            vec![StatementType::Delete]
        );
    }

    #[test]
    fn test_execute_immediate_without_literal_is_unknown() {
        assert_eq!(immediate_types(None), vec![StatementType::Unknown]);
        assert_eq!(immediate_types(Some("   ")), vec![StatementType::Unknown]);
    }

    #[test]
    fn test_keyword_fallback_scripting_block() {
        let types = classify_by_keyword("BEGIN SHOW WAREHOUSES; DROP TABLE t; END;").unwrap();
        assert_eq!(types, vec![StatementType::Show, StatementType::Drop]);

        let types = classify_by_keyword("BEGIN DROP TABLE t; END").unwrap();
        assert_eq!(types, vec![StatementType::Drop]);

        let types = classify_by_keyword("BEGIN TRANSACTION; COMMIT").unwrap();
        assert_eq!(types, vec![StatementType::Transaction, StatementType::Commit]);
    }

    #[test]
    fn test_keyword_fallback_connectors_and_immediate() {
        let types =
            classify_by_keyword("IF (x > 1) THEN DROP TABLE t; END IF; SHOW WAREHOUSES").unwrap();
        assert!(types.contains(&StatementType::Drop), "{types:?}");
        assert!(types.contains(&StatementType::Show));

        let types = classify_by_keyword("EXECUTE IMMEDIATE $$ DROP TABLE t $$").unwrap();
        assert_eq!(types, vec![StatementType::Drop]);
        let types = classify_by_keyword("EXECUTE IMMEDIATE :stmt").unwrap();
        assert_eq!(types, vec![StatementType::Unknown]);
    }

    #[test]
    fn test_classify_multiple_statements() {
        let types = classify("SELECT 1; DROP TABLE users").unwrap();
        assert_eq!(types, vec![StatementType::Select, StatementType::Drop]);
    }

    #[test]
    fn test_classify_empty_is_error() {
        assert!(classify("").is_err());
        assert!(classify("  ;  ").is_err());
    }

    #[test]
    fn test_keyword_fallback_splits_on_semicolon() {
        let types = classify_by_keyword("SHOW WAREHOUSES; DROP TABLE t;").unwrap();
        assert_eq!(types, vec![StatementType::Show, StatementType::Drop]);
    }

    #[test]
    fn test_statement_type_from_str_case_insensitive() {
        assert_eq!("select".parse::<StatementType>().unwrap(), StatementType::Select);
        assert_eq!("DROP".parse::<StatementType>().unwrap(), StatementType::Drop);
        assert_eq!(
            "truncatetable".parse::<StatementType>().unwrap(),
            StatementType::TruncateTable
        );
        assert_eq!(
            "Truncate".parse::<StatementType>().unwrap(),
            StatementType::TruncateTable
        );
    }

    #[test]
    fn test_statement_type_from_str_unknown_token() {
        let err = "Frobnicate".parse::<StatementType>().unwrap_err();
        assert!(matches!(err, ServerError::Configuration { .. }));
    }

    #[test]
    fn test_has_row_limit() {
        assert!(has_row_limit("SELECT * FROM t LIMIT 5"));
        assert!(has_row_limit("select * from t limit 5"));
        assert!(has_row_limit("SELECT * FROM t FETCH FIRST 5 ROWS ONLY"));
        assert!(!has_row_limit("SELECT * FROM t"));
    }

    #[test]
    fn test_has_row_limit_ignores_literals_and_comments() {
        assert!(!has_row_limit("SELECT 'LIMIT' FROM t"));
        assert!(!has_row_limit("SELECT \"limit\" FROM t"));
        assert!(!has_row_limit("SELECT a FROM t -- limit 10"));
        assert!(!has_row_limit("SELECT a /* LIMIT */ FROM t"));
    }

    #[test]
    fn test_append_limit_trims_semicolons() {
        assert_eq!(append_limit("SELECT * FROM t;", 10), "SELECT * FROM t LIMIT 10");
        assert_eq!(append_limit("SELECT * FROM t ;; ", 10), "SELECT * FROM t LIMIT 10");
    }

    #[test]
    fn test_append_limit_after_line_comment() {
        assert_eq!(
            append_limit("SELECT * FROM t -- recent", 5),
            "SELECT * FROM t -- recent\nLIMIT 5"
        );
    }
}
