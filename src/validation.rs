//! Input Validation Module
//!
//! Every name that ends up in generated SQL passes through here before the
//! composer sees it. Identifiers are quoted on output (see
//! [`crate::utils::quote_ident`]), so validation only rejects names
//! PostgreSQL itself could never store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::validation::validate_sql_identifier;
//!
//! validate_sql_identifier(view_name, "view_name")?;
//! ```

use crate::config::MAX_IDENTIFIER_LENGTH;
use crate::error::{PirogueError, PirogueResult};

/// Validate a `PostgreSQL` identifier (schema, table, column, alias)
///
/// Rejects empty names, names containing NUL and names longer than
/// `NAMEDATALEN - 1` bytes (PostgreSQL would silently truncate them, which
/// breaks the view/trigger naming scheme).
pub fn validate_sql_identifier(identifier: &str, param_name: &str) -> PirogueResult<()> {
    if identifier.is_empty() {
        return Err(PirogueError::InvalidIdentifier {
            parameter: param_name.to_string(),
            value: identifier.to_string(),
            reason: "Identifier cannot be empty".to_string(),
        });
    }

    if identifier.contains('\0') {
        return Err(PirogueError::InvalidIdentifier {
            parameter: param_name.to_string(),
            value: sanitize_for_logging(identifier),
            reason: "Identifier contains a NUL character".to_string(),
        });
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(PirogueError::InvalidIdentifier {
            parameter: param_name.to_string(),
            value: format!("{}... ({} chars)", identifier.chars().take(20).collect::<String>(), identifier.len()),
            reason: format!("Identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"),
        });
    }

    Ok(())
}

/// Validate a column name (alias for identifier)
pub fn validate_column_name(name: &str) -> PirogueResult<()> {
    validate_sql_identifier(name, "column_name")
}

/// Validate a generated object name, including the longest suffix that
/// will be appended to it (`ft_<view>_insert`, `tr_<view>_on_delete`).
pub fn validate_derived_name(base: &str, longest_derived: &str, param_name: &str) -> PirogueResult<()> {
    validate_sql_identifier(base, param_name)?;
    if longest_derived.len() > MAX_IDENTIFIER_LENGTH {
        return Err(PirogueError::InvalidIdentifier {
            parameter: param_name.to_string(),
            value: sanitize_for_logging(base),
            reason: format!(
                "Derived name '{}' exceeds {} characters",
                sanitize_for_logging(longest_derived),
                MAX_IDENTIFIER_LENGTH
            ),
        });
    }
    Ok(())
}

/// Sanitize string for logging (truncate, escape control chars)
fn sanitize_for_logging(s: &str) -> String {
    let max_len = 50;
    let truncated = if s.len() > max_len {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    } else {
        s.to_string()
    };

    truncated
        .replace('\0', "\\0")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("my_table", "test").is_ok());
        assert!(validate_sql_identifier("Animal Type", "test").is_ok());
        assert!(validate_sql_identifier("fk_cat_breed", "test").is_ok());
        assert!(validate_column_name("year").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_sql_identifier("", "test").is_err());
        assert!(validate_sql_identifier("bad\0name", "test").is_err());
        assert!(validate_sql_identifier(&"x".repeat(64), "test").is_err());
    }

    #[test]
    fn test_derived_name_too_long() {
        let view = "v".repeat(55);
        let derived = format!("tr_{view}_on_delete");
        let err = validate_derived_name(&view, &derived, "view_name").unwrap_err();
        assert!(matches!(err, PirogueError::InvalidIdentifier { .. }));
        assert!(validate_derived_name("vw_cat", "tr_vw_cat_on_delete", "view_name").is_ok());
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(80);
        assert_eq!(sanitize_for_logging(&long).len(), 53);
        assert_eq!(sanitize_for_logging("a\nb"), "a\\nb");
    }
}
