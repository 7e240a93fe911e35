use std::fmt;

#[cfg(any(test, feature = "pg_test"))]
pub mod testing;

/// Coarse classification of every [`PirogueError`].
///
/// Callers that only care about "what went wrong at which stage" match on
/// this instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Relation missing, cursor not connected, or catalog query failure
    SchemaLookup,
    /// The definition or policy cannot produce a valid column set / join graph
    Composition,
    /// A shape the planner cannot express (composite keys, type mismatches)
    UnsupportedShape,
    /// Bug in the extension
    Internal,
}

/// Main error type for pg_pirogue
#[derive(Debug, Clone, PartialEq)]
pub enum PirogueError {
    // ============ Schema Lookup Errors (42P01 / 08003 / XX000) ============
    /// Requested relation does not exist in the catalog
    RelationNotFound {
        schema: String,
        table: String,
    },

    /// The catalog cursor is not connected
    CursorNotConnected,

    /// Catalog query failed at the connection level
    CatalogQueryFailed {
        query: String,
        error: String,
    },

    // ============ Composition Errors (42xxx / 22023) ============
    /// No descriptor sets were given to the composer
    EmptyComposition,

    /// A policy directive references a column that is not in the composed set
    UnknownColumn {
        column: String,
        directive: &'static str,
    },

    /// Two output columns ended up with the same effective name
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },

    /// Two directives contradict each other for the same column
    ConflictingDirectives {
        column: String,
        reason: String,
    },

    /// A declared table cannot be joined back to the child
    DisconnectedJoin {
        table: String,
        reason: String,
    },

    /// The definition document is malformed
    InvalidDefinition {
        reason: String,
    },

    /// An identifier cannot be used as a PostgreSQL name
    InvalidIdentifier {
        parameter: String,
        value: String,
        reason: String,
    },

    // ============ Unsupported Shapes (0A000) ============
    /// Primary key spans more than one column
    CompositePrimaryKey {
        table: String,
        columns: Vec<String>,
    },

    /// Joined key columns have different SQL types
    KeyTypeMismatch {
        column: String,
        left: String,
        right: String,
    },

    // ============ Internal (XX000) ============
    /// Internal error (bug in extension)
    InternalError {
        message: String,
        file: &'static str,
        line: u32,
    },
}

impl PirogueError {
    /// Get PostgreSQL SQLSTATE code for this error
    pub fn sqlstate(&self) -> &'static str {
        use PirogueError::*;
        match self {
            RelationNotFound { .. } => "42P01", // Undefined table
            CursorNotConnected => "08003", // Connection does not exist
            CatalogQueryFailed { .. } => "58000", // System error

            EmptyComposition => "22023", // Invalid parameter value
            UnknownColumn { .. } => "42703", // Undefined column
            DuplicateColumn { .. } => "42701", // Duplicate column
            ConflictingDirectives { .. } => "42P13", // Invalid function definition
            DisconnectedJoin { .. } => "42830", // Invalid foreign key
            InvalidDefinition { .. } => "22P02", // Invalid text representation
            InvalidIdentifier { .. } => "42602", // Invalid name

            CompositePrimaryKey { .. } => "0A000", // Feature not supported
            KeyTypeMismatch { .. } => "42804", // Datatype mismatch

            InternalError { .. } => "XX000",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        use PirogueError::*;
        match self {
            RelationNotFound { .. } | CursorNotConnected | CatalogQueryFailed { .. } => {
                ErrorKind::SchemaLookup
            }
            EmptyComposition
            | UnknownColumn { .. }
            | DuplicateColumn { .. }
            | ConflictingDirectives { .. }
            | DisconnectedJoin { .. }
            | InvalidDefinition { .. }
            | InvalidIdentifier { .. } => ErrorKind::Composition,
            CompositePrimaryKey { .. } | KeyTypeMismatch { .. } => ErrorKind::UnsupportedShape,
            InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Create internal error with file/line info
    pub fn internal(message: String, file: &'static str, line: u32) -> Self {
        PirogueError::InternalError { message, file, line }
    }
}

impl fmt::Display for PirogueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PirogueError::*;
        match self {
            RelationNotFound { schema, table } => {
                write!(f, "Relation '{}.{}' not found in catalog", schema, table)
            }
            CursorNotConnected => {
                write!(f, "Catalog cursor is not connected")
            }
            CatalogQueryFailed { query, error } => {
                let shown: String = query.chars().take(100).collect();
                write!(f, "Catalog query failed: {}\nQuery: {}", error, shown)
            }
            EmptyComposition => {
                write!(f, "Composition has no tables to compose")
            }
            UnknownColumn { column, directive } => {
                write!(f, "Column '{}' referenced by {} does not exist in the composed column set",
                       column, directive)
            }
            DuplicateColumn { column, first, second } => {
                write!(f, "Column '{}' is produced by both {} and {}; skip or remap one of them",
                       column, first, second)
            }
            ConflictingDirectives { column, reason } => {
                write!(f, "Conflicting directives for column '{}': {}", column, reason)
            }
            DisconnectedJoin { table, reason } => {
                write!(f, "Cannot join '{}' to the composition: {}", table, reason)
            }
            InvalidDefinition { reason } => {
                write!(f, "Invalid definition: {}", reason)
            }
            InvalidIdentifier { parameter, value, reason } => {
                write!(f, "Invalid identifier for {} '{}': {}", parameter, value, reason)
            }
            CompositePrimaryKey { table, columns } => {
                write!(f, "Table '{}' has a composite primary key ({}); only single-column keys are supported",
                       table, columns.join(", "))
            }
            KeyTypeMismatch { column, left, right } => {
                write!(f, "Key column '{}' is joined across different types ({} vs {})",
                       column, left, right)
            }
            InternalError { message, file, line } => {
                write!(f, "Internal error at {}:{}: {}\nPlease report this bug.",
                       file, line, message)
            }
        }
    }
}

impl std::error::Error for PirogueError {}

/// Result type for pg_pirogue operations
pub type PirogueResult<T> = Result<T, PirogueError>;

/// Convert serde_json::Error to PirogueError
impl From<serde_json::Error> for PirogueError {
    fn from(e: serde_json::Error) -> Self {
        PirogueError::InvalidDefinition {
            reason: e.to_string(),
        }
    }
}

/// Helper macro for creating internal errors with automatic file/line
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::PirogueError::internal($msg.to_string(), file!(), line!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PirogueError::internal(format!($fmt, $($arg)*), file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_not_found_message() {
        let err = PirogueError::RelationNotFound {
            schema: "public".to_string(),
            table: "cat".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("public.cat"));
        assert!(msg.contains("not found"));
        assert_eq!(err.sqlstate(), "42P01");
        assert_eq!(err.kind(), ErrorKind::SchemaLookup);
    }

    #[test]
    fn test_unknown_column_message() {
        let err = PirogueError::UnknownColumn {
            column: "ghost".to_string(),
            directive: "remap_columns",
        };

        let msg = err.to_string();
        assert!(msg.contains("'ghost'"));
        assert!(msg.contains("remap_columns"));
        assert_eq!(err.kind(), ErrorKind::Composition);
    }

    #[test]
    fn test_internal_error_macro() {
        let err = internal_error!("Test error at {}", "location");

        match err {
            PirogueError::InternalError { message, file, line } => {
                assert!(message.contains("Test error"));
                assert!(file.ends_with("mod.rs"));
                assert!(line > 0);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_kinds_cover_error_categories() {
        let unsupported = [
            PirogueError::CompositePrimaryKey { table: "t".to_string(), columns: vec![] },
            PirogueError::KeyTypeMismatch {
                column: "id".to_string(),
                left: "integer".to_string(),
                right: "uuid".to_string(),
            },
        ];
        for err in &unsupported {
            assert_eq!(err.kind(), ErrorKind::UnsupportedShape);
        }

        assert_eq!(PirogueError::CursorNotConnected.kind(), ErrorKind::SchemaLookup);
        assert_eq!(PirogueError::EmptyComposition.kind(), ErrorKind::Composition);
    }

    #[test]
    fn test_json_error_becomes_invalid_definition() {
        let err: PirogueError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, PirogueError::InvalidDefinition { .. }));
        assert_eq!(err.sqlstate(), "22P02");
    }
}
