//! Identifier and literal quoting for generated Snowflake SQL.
//!
//! Names that are valid unquoted Snowflake identifiers are emitted verbatim so that
//! Snowflake keeps resolving them case-insensitively. Reserved words are quoted in
//! upper case, which resolves to the same object. Everything else is wrapped in
//! double quotes as given, which makes the name case-sensitive and inert.

use sqlparser::keywords::{ALL_KEYWORDS, ALL_KEYWORDS_INDEX, Keyword};

/// Snowflake's reserved keywords
/// (<https://docs.snowflake.com/en/sql-reference/reserved-keywords>).
const RESERVED: &[Keyword] = &[
    Keyword::ACCOUNT,
    Keyword::ALL,
    Keyword::ALTER,
    Keyword::AND,
    Keyword::ANY,
    Keyword::AS,
    Keyword::BETWEEN,
    Keyword::BY,
    Keyword::CASE,
    Keyword::CAST,
    Keyword::CHECK,
    Keyword::COLUMN,
    Keyword::CONNECT,
    Keyword::CONNECTION,
    Keyword::CONSTRAINT,
    Keyword::CREATE,
    Keyword::CROSS,
    Keyword::CURRENT,
    Keyword::CURRENT_DATE,
    Keyword::CURRENT_TIME,
    Keyword::CURRENT_TIMESTAMP,
    Keyword::CURRENT_USER,
    Keyword::DATABASE,
    Keyword::DELETE,
    Keyword::DISTINCT,
    Keyword::DROP,
    Keyword::ELSE,
    Keyword::EXISTS,
    Keyword::FALSE,
    Keyword::FOLLOWING,
    Keyword::FOR,
    Keyword::FROM,
    Keyword::FULL,
    Keyword::GRANT,
    Keyword::GROUP,
    Keyword::HAVING,
    Keyword::ILIKE,
    Keyword::IN,
    Keyword::INCREMENT,
    Keyword::INNER,
    Keyword::INSERT,
    Keyword::INTERSECT,
    Keyword::INTO,
    Keyword::IS,
    Keyword::JOIN,
    Keyword::LATERAL,
    Keyword::LEFT,
    Keyword::LIKE,
    Keyword::LOCALTIME,
    Keyword::LOCALTIMESTAMP,
    Keyword::MINUS,
    Keyword::NATURAL,
    Keyword::NOT,
    Keyword::NULL,
    Keyword::OF,
    Keyword::ON,
    Keyword::OR,
    Keyword::ORDER,
    Keyword::ORGANIZATION,
    Keyword::QUALIFY,
    Keyword::REGEXP,
    Keyword::REVOKE,
    Keyword::RIGHT,
    Keyword::RLIKE,
    Keyword::ROW,
    Keyword::ROWS,
    Keyword::SAMPLE,
    Keyword::SCHEMA,
    Keyword::SELECT,
    Keyword::SET,
    Keyword::SOME,
    Keyword::START,
    Keyword::TABLE,
    Keyword::TABLESAMPLE,
    Keyword::THEN,
    Keyword::TO,
    Keyword::TRIGGER,
    Keyword::TRUE,
    Keyword::TRY_CAST,
    Keyword::UNION,
    Keyword::UNIQUE,
    Keyword::UPDATE,
    Keyword::USING,
    Keyword::VALUES,
    Keyword::VIEW,
    Keyword::WHEN,
    Keyword::WHENEVER,
    Keyword::WHERE,
    Keyword::WINDOW,
    Keyword::WITH,
];

/// Reserved in Snowflake but not sqlparser keywords.
const RESERVED_EXTRA: [&str; 2] = ["GSCLUSTER", "ISSUE"];

/// Returns true if `name` has identifier syntax that needs no quoting.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Returns true if `name` is a Snowflake reserved keyword, in any case.
pub fn is_reserved_word(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if RESERVED_EXTRA.contains(&upper.as_str()) {
        return true;
    }
    ALL_KEYWORDS
        .binary_search(&upper.as_str())
        .ok()
        .and_then(|i| ALL_KEYWORDS_INDEX.get(i))
        .is_some_and(|kw| RESERVED.contains(kw))
}

/// Quote a single identifier part.
pub fn quote_ident(name: &str) -> String {
    if !is_plain_identifier(name) {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else if is_reserved_word(name) {
        format!("\"{}\"", name.to_ascii_uppercase())
    } else {
        name.to_string()
    }
}

/// Quote each part and join with `.`.
pub fn qualified(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

/// Render a single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{}'", escaped)
}
