//! Query-cache keys.

use crate::store::QueryParam;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Quoted literals and identifiers are matched first so their content is
/// kept verbatim; whitespace and comment runs collapse to one space.
static SQL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|(?:\s|--[^\n]*|/\*(?s:.*?)\*/)+"#)
        .expect("valid sql token regex")
});

/// Query text as written plus its ordered parameter bindings.
///
/// The store always receives the original text. Equality and hashing use
/// the normalized text, so two signatures are equal when their texts differ
/// only in whitespace or comments outside quotes or a trailing `;`, and
/// their parameters match position by position.
#[derive(Debug, Clone)]
pub struct QuerySignature {
    sql: String,
    key: String,
    params: Vec<QueryParam>,
}

impl QuerySignature {
    pub fn new(sql: &str, params: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.to_string(),
            key: normalize_query_text(sql),
            params,
        }
    }

    /// Text handed to the store, unchanged.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Normalized text the cache is keyed on.
    pub fn key_text(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

impl PartialEq for QuerySignature {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.params == other.params
    }
}

impl Eq for QuerySignature {}

impl Hash for QuerySignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.params.hash(state);
    }
}

impl Display for QuerySignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let params = self
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} [{}]", self.key, params)
    }
}

/// Collapses whitespace and comments outside quotes, trims, and drops
/// trailing semicolons. Quoted text is never altered.
pub fn normalize_query_text(text: &str) -> String {
    let collapsed = SQL_TOKEN_RE.replace_all(text, |caps: &Captures<'_>| {
        let token = &caps[0];
        if token.starts_with('\'') || token.starts_with('"') {
            token.to_string()
        } else {
            " ".to_string()
        }
    });
    collapsed
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{normalize_query_text, QuerySignature};
    use crate::store::QueryParam;

    #[test]
    fn whitespace_and_trailing_semicolon_do_not_matter() {
        let left = QuerySignature::new("SELECT *\n   FROM authors a;", vec![]);
        let right = QuerySignature::new("  SELECT * FROM authors a ", vec![]);
        assert_eq!(left, right);
        assert_eq!(left.key_text(), "SELECT * FROM authors a");
    }

    #[test]
    fn store_text_is_kept_as_written() {
        let sql = "SELECT a.id -- ids only\nFROM authors a;";
        let signature = QuerySignature::new(sql, vec![]);
        assert_eq!(signature.sql(), sql);
        assert_eq!(signature.key_text(), "SELECT a.id FROM authors a");
    }

    #[test]
    fn quoted_whitespace_is_part_of_the_key() {
        let double = QuerySignature::new("SELECT 1 WHERE x = 'Le  Guin'", vec![]);
        let single = QuerySignature::new("SELECT 1 WHERE x = 'Le Guin'", vec![]);
        assert_ne!(double, single);
        assert_eq!(
            normalize_query_text("x =  'it''s  here'\n AND \"a  b\" /* c */ = 1"),
            "x = 'it''s  here' AND \"a  b\" = 1"
        );
    }

    #[test]
    fn parameters_are_part_of_the_key() {
        let hugo = QuerySignature::new("q", vec![QueryParam::from("Hugo")]);
        let asimov = QuerySignature::new("q", vec![QueryParam::from("Asimov")]);
        let text_one = QuerySignature::new("q", vec![QueryParam::from("1")]);
        let int_one = QuerySignature::new("q", vec![QueryParam::Integer(1)]);
        assert_ne!(hugo, asimov);
        assert_ne!(text_one, int_one);
    }

    #[test]
    fn normalize_keeps_inner_text() {
        assert_eq!(normalize_query_text("a\t\tb ;;"), "a b");
    }
}
