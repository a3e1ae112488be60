//! Placeholder translation.
//!
//! Statements are written with `?` as the portable positional placeholder. Before
//! execution the template is rewritten into the backend's native form (`$1`, `$2`,
//! ... for PostgreSQL; `?` is already native for MySQL and SQLite). Only the
//! template text is touched: argument values are bound by the driver.
//!
//! A `?` inside a string literal, a quoted identifier or a comment is left as is
//! and does not count as a placeholder.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment,
}

/// Rewrite a portable template for `db`, checking that it has exactly `arg_count`
/// placeholders.
pub fn bind(template: &str, arg_count: usize, db: DatabaseType) -> DbResult<String> {
    let (sql, placeholders) = rewrite(template, db);
    if placeholders != arg_count {
        return Err(DbError::binding(placeholders, arg_count));
    }
    Ok(sql)
}

/// Count the placeholders the binder would rewrite.
pub fn count_placeholders(template: &str, db: DatabaseType) -> usize {
    rewrite(template, db).1
}

/// Build a comma-separated list of `n` portable placeholders: `?, ?, ?`.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn rewrite(template: &str, db: DatabaseType) -> (String, usize) {
    let backslash_escapes = db == DatabaseType::MySQL;
    let mut out = String::with_capacity(template.len() + 8);
    let mut count = 0;
    let mut state = ScanState::Normal;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            ScanState::Normal => match c {
                '?' => {
                    count += 1;
                    match db {
                        DatabaseType::PostgreSQL => {
                            out.push('$');
                            out.push_str(&count.to_string());
                        }
                        DatabaseType::MySQL | DatabaseType::SQLite => out.push('?'),
                    }
                    continue;
                }
                '\'' => state = ScanState::SingleQuoted,
                '"' => state = ScanState::DoubleQuoted,
                '`' => state = ScanState::Backtick,
                '-' if chars.peek() == Some(&'-') => state = ScanState::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    out.push(c);
                    out.extend(chars.next());
                    state = ScanState::BlockComment;
                    continue;
                }
                _ => {}
            },
            ScanState::SingleQuoted | ScanState::DoubleQuoted => {
                let quote = if state == ScanState::SingleQuoted {
                    '\''
                } else {
                    '"'
                };
                if c == '\\' && backslash_escapes {
                    out.push(c);
                    out.extend(chars.next());
                    continue;
                }
                // A doubled quote re-enters the literal on the next character.
                if c == quote {
                    state = ScanState::Normal;
                }
            }
            ScanState::Backtick => {
                if c == '`' {
                    state = ScanState::Normal;
                }
            }
            ScanState::LineComment => {
                if c == '\n' {
                    state = ScanState::Normal;
                }
            }
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push(c);
                    out.extend(chars.next());
                    state = ScanState::Normal;
                    continue;
                }
            }
        }
        out.push(c);
    }

    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_keeps_question_marks() {
        let sql = bind(
            "SELECT * FROM users WHERE id = ? AND name = ?",
            2,
            DatabaseType::MySQL,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id = ? AND name = ?");
    }

    #[test]
    fn test_postgres_numbers_placeholders_in_order() {
        let sql = bind(
            "UPDATE users SET name = ?, age = ? WHERE id = ?",
            3,
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(sql, "UPDATE users SET name = $1, age = $2 WHERE id = $3");
    }

    #[test]
    fn test_count_mismatch_is_a_binding_error() {
        let err = bind("SELECT * FROM t WHERE a = ?", 2, DatabaseType::MySQL).unwrap_err();
        assert!(matches!(
            err,
            DbError::Binding {
                placeholders: 1,
                args: 2
            }
        ));

        let err = bind("SELECT ?, ?", 0, DatabaseType::SQLite).unwrap_err();
        assert!(matches!(
            err,
            DbError::Binding {
                placeholders: 2,
                args: 0
            }
        ));
    }

    #[test]
    fn test_question_mark_in_literal_is_not_a_placeholder() {
        let template = "SELECT 'what?' AS q, \"odd?col\" FROM t WHERE a = ?";
        assert_eq!(count_placeholders(template, DatabaseType::PostgreSQL), 1);
        let sql = bind(template, 1, DatabaseType::PostgreSQL).unwrap();
        assert_eq!(
            sql,
            "SELECT 'what?' AS q, \"odd?col\" FROM t WHERE a = $1"
        );
    }

    #[test]
    fn test_doubled_quote_stays_inside_literal() {
        let template = "SELECT 'it''s ?' FROM t WHERE a = ?";
        assert_eq!(count_placeholders(template, DatabaseType::SQLite), 1);
    }

    #[test]
    fn test_mysql_backslash_escape_stays_inside_literal() {
        let template = r"SELECT 'it\'s ?' FROM `we?ird` WHERE a = ?";
        assert_eq!(count_placeholders(template, DatabaseType::MySQL), 1);
    }

    #[test]
    fn test_comments_are_skipped() {
        let template = "SELECT a -- why?\nFROM t /* really? */ WHERE b = ?";
        let sql = bind(template, 1, DatabaseType::PostgreSQL).unwrap();
        assert_eq!(sql, "SELECT a -- why?\nFROM t /* really? */ WHERE b = $1");
    }

    #[test]
    fn test_no_placeholders_no_args() {
        let sql = bind("SELECT 1", 0, DatabaseType::MySQL).unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn test_placeholders_list() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
