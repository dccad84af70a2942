//! Lexical read-only guard for ad hoc SQL.
//!
//! The guard has veto power only: it never rewrites or executes the statement. A statement
//! passes when it is a single `SELECT` (or a `WITH ... SELECT` CTE), optionally followed by
//! one semicolon, and no token outside a literal or comment is on the blocklist.
//!
//! Scanning is token-level, not a SQL parser. Content inside `'strings'`, `[brackets]`,
//! `"quoted identifiers"`, `-- line comments` and `/* block comments */` is never tokenized,
//! so keywords there are inert. Block comments nest, as they do in T-SQL.
//!
//! A CTE is accepted as soon as a `SELECT` token appears anywhere after `WITH`. Writes hidden
//! in a CTE body are caught by the blocklist scan, which always covers the whole statement.

use crate::error::{GuardResult, GuardViolation};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Tokens that are never allowed outside literals, grouped by the kind of operation.
static FORBIDDEN_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // DML
        "INSERT",
        "UPDATE",
        "DELETE",
        "MERGE",
        // DDL
        "CREATE",
        "ALTER",
        "DROP",
        "TRUNCATE",
        "RENAME",
        // DCL
        "GRANT",
        "REVOKE",
        "DENY",
        // TCL
        "BEGIN",
        "COMMIT",
        "ROLLBACK",
        "TRANSACTION",
        // Execution
        "EXEC",
        "EXECUTE",
        // Administrative
        "BACKUP",
        "RESTORE",
        "BULK",
        "SHUTDOWN",
        "RECONFIGURE",
        "KILL",
        // External access
        "OPENROWSET",
        "OPENQUERY",
        "OPENDATASOURCE",
        "OPENXML",
        // SELECT ... INTO creates a table
        "INTO",
    ]
    .into_iter()
    .collect()
});

/// Stored and extended procedure naming conventions.
const FORBIDDEN_PREFIXES: [&str; 2] = ["SP_", "XP_"];

/// Read-only SQL guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGuard;

impl SqlGuard {
    pub fn new() -> Self {
        Self
    }

    /// Validate that `sql` is a single read-only statement.
    ///
    /// Accepts `&str` or `Option<&str>`; `None`, empty and whitespace-only input fail with
    /// [`GuardViolation::EmptyStatement`].
    pub fn validate<'a>(&self, sql: impl Into<Option<&'a str>>) -> GuardResult<()> {
        let result = Self::check(sql.into());
        if let Err(violation) = &result {
            warn!("SQL guard rejected statement: {}", violation);
        }
        result
    }

    fn check(sql: Option<&str>) -> GuardResult<()> {
        let sql = match sql {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(GuardViolation::EmptyStatement),
        };

        debug!("Validating query: {}", preview(sql));

        let lexed = Scanner::new(sql).scan()?;

        if lexed.trailing_content {
            return Err(GuardViolation::MultipleStatements);
        }

        check_leading_keyword(&lexed.tokens)?;
        check_forbidden_tokens(&lexed.tokens)?;

        debug!("Query validation passed");
        Ok(())
    }
}

/// First 100 characters, for log lines.
fn preview(sql: &str) -> &str {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

fn check_leading_keyword(tokens: &[&str]) -> GuardResult<()> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(GuardViolation::MustBeginWithSelect);
    };

    if first.eq_ignore_ascii_case("SELECT") {
        return Ok(());
    }

    if first.eq_ignore_ascii_case("WITH") && rest.iter().any(|t| t.eq_ignore_ascii_case("SELECT"))
    {
        return Ok(());
    }

    Err(GuardViolation::MustBeginWithSelect)
}

fn check_forbidden_tokens(tokens: &[&str]) -> GuardResult<()> {
    for token in tokens {
        let upper = token.to_ascii_uppercase();

        if FORBIDDEN_KEYWORDS.contains(upper.as_str()) {
            return Err(GuardViolation::ForbiddenOperation(upper));
        }

        if FORBIDDEN_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            return Err(GuardViolation::ForbiddenOperation(upper));
        }
    }
    Ok(())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '#'
}

/// Output of a scan: word tokens before the terminator, and whether anything but
/// whitespace or comments follows the first top-level semicolon.
#[derive(Debug, Default)]
struct Lexed<'a> {
    tokens: Vec<&'a str>,
    terminated: bool,
    trailing_content: bool,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn scan(mut self) -> GuardResult<Lexed<'a>> {
        let mut lexed = Lexed::default();

        while let Some(c) = self.peek() {
            if self.rest().starts_with("--") {
                self.skip_line_comment();
                continue;
            }
            if self.rest().starts_with("/*") {
                self.skip_block_comment()?;
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if lexed.terminated {
                lexed.trailing_content = true;
            }

            match c {
                ';' => {
                    lexed.terminated = true;
                    self.bump();
                }
                '\'' => self.skip_delimited('\'', "string literal")?,
                '"' => self.skip_delimited('"', "quoted identifier")?,
                '[' => self.skip_delimited(']', "bracketed identifier")?,
                c if is_word_char(c) => {
                    let start = self.pos;
                    while self.peek().is_some_and(is_word_char) {
                        self.bump();
                    }
                    if !lexed.terminated {
                        lexed.tokens.push(&self.src[start..self.pos]);
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }

        Ok(lexed)
    }

    fn skip_line_comment(&mut self) {
        match self.rest().find('\n') {
            Some(offset) => self.pos += offset + 1,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_block_comment(&mut self) -> GuardResult<()> {
        self.pos += 2;
        let mut depth = 1usize;

        while depth > 0 {
            if self.rest().starts_with("/*") {
                depth += 1;
                self.pos += 2;
            } else if self.rest().starts_with("*/") {
                depth -= 1;
                self.pos += 2;
            } else if self.bump().is_none() {
                return Err(GuardViolation::UnterminatedLiteral("block comment"));
            }
        }
        Ok(())
    }

    /// Skip a literal whose closing delimiter is escaped by doubling it.
    fn skip_delimited(&mut self, close: char, what: &'static str) -> GuardResult<()> {
        self.bump();
        loop {
            match self.bump() {
                None => return Err(GuardViolation::UnterminatedLiteral(what)),
                Some(c) if c == close => {
                    if self.peek() == Some(close) {
                        self.bump();
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validate(sql: &str) -> GuardResult<()> {
        SqlGuard::new().validate(sql)
    }

    fn forbidden(sql: &str) -> Option<String> {
        match validate(sql) {
            Err(GuardViolation::ForbiddenOperation(token)) => Some(token),
            _ => None,
        }
    }

    #[test]
    fn test_valid_select() {
        assert!(validate("SELECT * FROM users").is_ok());
        assert!(validate("select id, name from dbo.Users where id = @id").is_ok());
        assert!(validate("SELECT 1 AS Value;").is_ok());
        assert!(validate("  \n SELECT TOP 10 * FROM [Sales].[Orders] ORDER BY 1 ;  ").is_ok());
        assert!(validate("(SELECT 1)").is_ok());
    }

    #[test]
    fn test_valid_cte() {
        assert!(validate("WITH cte AS (SELECT 1 AS n) SELECT * FROM cte").is_ok());
        assert!(
            validate("with a as (select 1 x), b as (select x from a) select * from b;").is_ok()
        );
    }

    #[test]
    fn test_empty_input_is_argument_error() {
        for input in [None, Some(""), Some("   "), Some("\n\t")] {
            let err = SqlGuard::new().validate(input).unwrap_err();
            assert_eq!(err, GuardViolation::EmptyStatement);
            assert!(err.is_argument_error());
        }
    }

    #[test]
    fn test_must_begin_with_select() {
        assert_eq!(
            validate("VALUES (1)"),
            Err(GuardViolation::MustBeginWithSelect)
        );
        assert_eq!(
            validate("WITH cte AS (VALUES (1)) TABLE cte"),
            Err(GuardViolation::MustBeginWithSelect)
        );
        assert_eq!(
            validate("-- only a comment"),
            Err(GuardViolation::MustBeginWithSelect)
        );
        assert_eq!(validate(";"), Err(GuardViolation::MustBeginWithSelect));
    }

    #[test]
    fn test_forbidden_keywords() {
        assert_eq!(
            validate("DELETE FROM Users"),
            Err(GuardViolation::MustBeginWithSelect)
        );
        assert_eq!(
            forbidden("SELECT * INTO #copy FROM Users").as_deref(),
            Some("INTO")
        );
        assert_eq!(
            forbidden("SELECT * FROM OPENROWSET('SQLNCLI', 'x', 'y')").as_deref(),
            Some("OPENROWSET")
        );
        assert_eq!(
            forbidden("select 1 where exists (select 1) begin transaction").as_deref(),
            Some("BEGIN")
        );
    }

    #[test]
    fn test_forbidden_keywords_are_case_insensitive() {
        for word in ["Delete", "DELETE", "delete", "dElEtE"] {
            let sql = format!("WITH x AS ({word} FROM Users OUTPUT deleted.*) SELECT 1");
            assert_eq!(forbidden(&sql).as_deref(), Some("DELETE"), "{sql}");
        }
    }

    #[test]
    fn test_cte_with_write_is_caught_by_blocklist() {
        assert_eq!(
            forbidden("WITH d AS (SELECT 1 AS n) UPDATE Users SET Name = 'x'").as_deref(),
            Some("UPDATE")
        );
    }

    #[test]
    fn test_procedure_prefixes() {
        assert_eq!(
            forbidden("SELECT * FROM sys.objects WHERE 1 = 1 AND sp_who IS NULL").as_deref(),
            Some("SP_WHO")
        );
        assert_eq!(
            forbidden("select xp_cmdshell from t").as_deref(),
            Some("XP_CMDSHELL")
        );
    }

    #[test]
    fn test_qualified_names_are_split() {
        assert_eq!(
            forbidden("SELECT * FROM master.dbo.sp_configure").as_deref(),
            Some("SP_CONFIGURE")
        );
        assert!(validate("SELECT u.Name FROM dbo.Users u").is_ok());
    }

    #[test]
    fn test_keyword_inside_string_literal_is_inert() {
        assert!(validate("select 'delete from Users' as Comment").is_ok());
        assert!(validate("SELECT N'it''s; drop table x' AS s").is_ok());
    }

    #[test]
    fn test_keyword_inside_identifiers_is_inert() {
        assert!(validate("SELECT [Delete], [Update]]Flag] FROM [Insert]").is_ok());
        assert!(validate("SELECT \"Drop\" FROM \"Exec\"\"Log\"").is_ok());
    }

    #[test]
    fn test_keyword_inside_comments_is_inert() {
        assert!(validate("select * from Users /* update Users */").is_ok());
        assert!(validate("select * from Users -- ; drop table Users\n where 1 = 1").is_ok());
        assert!(validate("select /* outer /* inner */ still; delete */ 1").is_ok());
    }

    #[test]
    fn test_nested_comment_does_not_hide_statement() {
        // The comment closes at the second */, so the quote stays inside it and DROP is visible.
        let sql = "SELECT 1 /* /* */ ' */ DROP TABLE x --'";
        assert_eq!(forbidden(sql).as_deref(), Some("DROP"));
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            validate("select * from Users; select * from Orders"),
            Err(GuardViolation::MultipleStatements)
        );
        assert_eq!(
            validate("SELECT 1;;"),
            Err(GuardViolation::MultipleStatements)
        );
        assert_eq!(
            validate("SELECT 1; 'x'"),
            Err(GuardViolation::MultipleStatements)
        );
    }

    #[test]
    fn test_trailing_comment_after_semicolon_is_allowed() {
        assert!(validate("SELECT 1; -- done").is_ok());
        assert!(validate("SELECT 1; /* done */  ").is_ok());
    }

    #[test]
    fn test_semicolon_inside_literal_is_not_a_terminator() {
        assert!(validate("SELECT 'a;b' AS s").is_ok());
        assert!(validate("SELECT [a;b] FROM t").is_ok());
    }

    #[test]
    fn test_unterminated_literals() {
        assert_eq!(
            validate("SELECT 'abc"),
            Err(GuardViolation::UnterminatedLiteral("string literal"))
        );
        assert_eq!(
            validate("SELECT [abc"),
            Err(GuardViolation::UnterminatedLiteral("bracketed identifier"))
        );
        assert_eq!(
            validate("SELECT 1 /* open"),
            Err(GuardViolation::UnterminatedLiteral("block comment"))
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let sql = "é".repeat(150);
        assert_eq!(preview(&sql).chars().count(), 100);
        assert_eq!(preview("SELECT 1"), "SELECT 1");
    }

    fn case_mixed(word: &'static str) -> impl Strategy<Value = String> {
        proptest::collection::vec(any::<bool>(), word.len()).prop_map(move |upper| {
            word.chars()
                .zip(upper)
                .map(|(c, u)| {
                    if u {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect()
        })
    }

    fn any_forbidden() -> impl Strategy<Value = &'static str> {
        let mut words: Vec<&'static str> = FORBIDDEN_KEYWORDS.iter().copied().collect();
        words.sort_unstable();
        proptest::sample::select(words)
    }

    proptest! {
        #[test]
        fn prop_forbidden_token_always_rejected(word in any_forbidden().prop_flat_map(case_mixed)) {
            let sql = format!("SELECT a FROM t WHERE b = 1 {word} c");
            prop_assert_eq!(
                validate(&sql),
                Err(GuardViolation::ForbiddenOperation(word.to_ascii_uppercase()))
            );
        }

        #[test]
        fn prop_forbidden_token_inert_in_string(
            word in any_forbidden().prop_flat_map(case_mixed),
            noise in "[a-zA-Z0-9 ;\\-/*\\[\\]\"]{0,40}",
        ) {
            let sql = format!("SELECT '{noise} {word} {noise}' AS c FROM t");
            prop_assert_eq!(validate(&sql), Ok(()));
        }

        #[test]
        fn prop_block_comment_content_inert(body in "[a-zA-Z0-9 ;'\\[\"]{0,60}") {
            let sql = format!("SELECT 1 /* {body} */ AS c");
            prop_assert_eq!(validate(&sql), Ok(()));
        }
    }
}
