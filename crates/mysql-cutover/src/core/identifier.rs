//! Identifier and literal quoting for the SQL this crate builds.
//!
//! Table names cannot be bound as statement parameters, so every name that
//! ends up in generated SQL goes through one of these functions.

use crate::error::{CutoverError, Result};

/// MySQL identifier length limit.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects empty names, names containing null bytes and names longer than
/// MySQL allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CutoverError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(CutoverError::Validation(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(CutoverError::Validation(format!(
            "Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render an identifier for a statement: bare when it only uses characters
/// MySQL accepts unquoted, backtick-quoted otherwise.
pub fn mysql_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.chars().all(|c| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

/// Quote a string literal with single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_string(value))
}

/// Escape a value for use inside a single-quoted literal.
pub fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Escape a value for use inside a `LIKE` pattern literal, so `%` and `_`
/// match themselves.
pub fn escape_like(value: &str) -> String {
    escape_string(value)
        .replace('%', "\\%")
        .replace('_', "\\_")
}
