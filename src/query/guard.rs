//! Read-only guard for outgoing query text
//!
//! Runs on every compiled query before it can be sent. The text is split by
//! the SQL tokenizer, so quoted literals arrive as single string tokens and
//! caller values can never trip (or hide) a keyword.

use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// Commands that must never reach the upstream
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "TRUNCATE", "MERGE", "EXEC",
    "EXECUTE", "BULK", "BACKUP", "RESTORE", "GRANT", "REVOKE", "DENY",
];

/// Large binary columns that must not appear in a select list
pub const FORBIDDEN_FIELDS: &[&str] = &[
    "IMAGEM", "FOTO", "PHOTO", "PICTURE", "IMAGE", "BLOB", "BINARY", "VARBINARY",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("query is empty")]
    Empty,

    #[error("only SELECT queries are allowed")]
    NotASelect,

    #[error("forbidden command {0}")]
    ForbiddenKeyword(String),

    #[error("binary column {0} is not allowed in the select list")]
    ForbiddenField(String),

    #[error("statement separators are not allowed")]
    StatementSeparator,

    #[error("comments are not allowed")]
    Comment,

    #[error("SELECT * is not allowed, list the columns")]
    SelectStar,

    #[error("unterminated string literal")]
    UnbalancedQuotes,

    #[error("unreadable query text: {0}")]
    Unreadable(String),
}

/// Whether `column` names a large binary column
pub fn is_forbidden_field(column: &str) -> bool {
    FORBIDDEN_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(column))
}

/// Check that `text` is a single read-only statement
pub fn ensure_read_only(text: &str) -> Result<(), GuardViolation> {
    let tokens = significant_tokens(text)?;

    let Some(first) = tokens.first() else {
        return Err(GuardViolation::Empty);
    };
    if !(is_word(first, "SELECT") || is_word(first, "WITH")) {
        return Err(GuardViolation::NotASelect);
    }

    let mut in_select_list = false;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::SemiColon => return Err(GuardViolation::StatementSeparator),
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_ascii_uppercase();
                if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
                    return Err(GuardViolation::ForbiddenKeyword(upper));
                }
                match upper.as_str() {
                    "SELECT" => {
                        if selects_star(&tokens[i + 1..]) {
                            return Err(GuardViolation::SelectStar);
                        }
                        in_select_list = true;
                    }
                    "FROM" => in_select_list = false,
                    _ if in_select_list && is_forbidden_field(&upper) => {
                        return Err(GuardViolation::ForbiddenField(upper));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Tokens without layout whitespace. Comments are refused here.
fn significant_tokens(text: &str) -> Result<Vec<Token>, GuardViolation> {
    let tokens = Tokenizer::new(&MsSqlDialect {}, text)
        .tokenize()
        .map_err(|e| {
            if e.message.starts_with("Unterminated string") {
                GuardViolation::UnbalancedQuotes
            } else {
                GuardViolation::Unreadable(e.message)
            }
        })?;

    let mut significant = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Whitespace(
                Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_),
            ) => return Err(GuardViolation::Comment),
            Token::Whitespace(_) | Token::EOF => {}
            other => significant.push(other),
        }
    }
    Ok(significant)
}

/// `*` right after `SELECT [DISTINCT] [TOP n | TOP (n)]`
fn selects_star(rest: &[Token]) -> bool {
    let mut rest = rest;
    if rest.first().is_some_and(|t| is_word(t, "DISTINCT")) {
        rest = &rest[1..];
    }
    if rest.first().is_some_and(|t| is_word(t, "TOP")) {
        rest = match &rest[1..] {
            [Token::Number(..), tail @ ..] => tail,
            [Token::LParen, Token::Number(..), Token::RParen, tail @ ..] => tail,
            other => other,
        };
    }
    matches!(rest.first(), Some(Token::Mul))
}

fn is_word(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
}
