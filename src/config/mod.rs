/// Schema used when a table name is not schema-qualified
pub const DEFAULT_SCHEMA: &str = "public";

/// Prefix of generated view names (`vw_<schema>_<table>`)
pub const VIEW_NAME_PREFIX: &str = "vw";

/// Prefix of generated trigger functions (`ft_<view>_<verb>`)
pub const TRIGGER_FUNCTION_PREFIX: &str = "ft";

/// Prefix of generated triggers (`tr_<view>_on_<verb>`)
pub const TRIGGER_PREFIX: &str = "tr";

/// Indentation of SELECT projection lines
pub const SELECT_INDENT: usize = 4;

/// Indentation of statements inside trigger bodies
pub const BODY_INDENT: usize = 2;

/// Maximum number of ancestor levels in a single-inheritance chain
pub const MAX_INHERITANCE_DEPTH: usize = 16;

/// PostgreSQL NAMEDATALEN - 1
pub const MAX_IDENTIFIER_LENGTH: usize = 63;
