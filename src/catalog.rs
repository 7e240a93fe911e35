use pgrx::prelude::*;
use pgrx::IntoDatum;

use crate::error::{PirogueError, PirogueResult};
use crate::schema::definition::CompositionSpec;
use crate::schema::{ColumnDescriptor, ColumnReference, TableKind, TableRef};

/// Output columns of [`COLUMNS_QUERY`], in order
pub const COLUMN_FIELDS: &[&str] = &[
    "column_name",
    "data_type",
    "is_nullable",
    "default_expr",
    "is_primary_key",
    "relkind",
];

/// Output columns of [`FOREIGN_KEYS_QUERY`], in order
pub const FOREIGN_KEY_FIELDS: &[&str] = &[
    "column_name",
    "referenced_schema",
    "referenced_table",
    "referenced_column",
];

/// Columns of one relation (`$1` schema, `$2` table) in `attnum` order,
/// with defaults and primary-key membership
pub const COLUMNS_QUERY: &str = "SELECT a.attname::text AS column_name, \
            format_type(a.atttypid, a.atttypmod) AS data_type, \
            (NOT a.attnotnull)::text AS is_nullable, \
            pg_get_expr(d.adbin, d.adrelid) AS default_expr, \
            (i.indrelid IS NOT NULL)::text AS is_primary_key, \
            c.relkind::text AS relkind \
     FROM pg_catalog.pg_class c \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid \
          AND a.attnum > 0 AND NOT a.attisdropped \
     LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum \
     LEFT JOIN pg_catalog.pg_index i ON i.indrelid = c.oid AND i.indisprimary \
          AND a.attnum = ANY(i.indkey) \
     WHERE n.nspname = $1 AND c.relname = $2 \
       AND c.relkind IN ('r', 'p', 'f', 'v', 'm') \
     ORDER BY a.attnum";

/// Single-column foreign keys of one relation (`$1` schema, `$2` table)
pub const FOREIGN_KEYS_QUERY: &str = "SELECT a.attname::text AS column_name, \
            fn.nspname::text AS referenced_schema, \
            fc.relname::text AS referenced_table, \
            fa.attname::text AS referenced_column \
     FROM pg_catalog.pg_constraint k \
     JOIN pg_catalog.pg_class c ON c.oid = k.conrelid \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_catalog.pg_attribute a ON a.attrelid = k.conrelid AND a.attnum = k.conkey[1] \
     JOIN pg_catalog.pg_class fc ON fc.oid = k.confrelid \
     JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace \
     JOIN pg_catalog.pg_attribute fa ON fa.attrelid = k.confrelid AND fa.attnum = k.confkey[1] \
     WHERE n.nspname = $1 AND c.relname = $2 \
       AND k.contype = 'f' AND array_length(k.conkey, 1) = 1 \
     ORDER BY k.conname";

/// One untyped catalog row; every value is fetched as text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogRow(pub Vec<Option<String>>);

impl CatalogRow {
    fn text(&self, idx: usize) -> PirogueResult<Option<&str>> {
        self.0
            .get(idx)
            .map(Option::as_deref)
            .ok_or_else(|| crate::internal_error!("catalog row has no field {}", idx))
    }

    fn required(&self, idx: usize) -> PirogueResult<&str> {
        self.text(idx)?
            .ok_or_else(|| crate::internal_error!("catalog field {} is NULL", idx))
    }

    fn flag(&self, idx: usize) -> PirogueResult<bool> {
        match self.required(idx)? {
            "t" | "true" => Ok(true),
            "f" | "false" => Ok(false),
            other => Err(crate::internal_error!("catalog field {} is not a boolean: {}", idx, other)),
        }
    }
}

/// Read access to the system catalog.
///
/// The caller owns the connection; resolution never opens or closes it.
pub trait CatalogCursor {
    fn is_connected(&self) -> bool {
        true
    }

    /// Run `sql` with `args` bound as text to `$1`, `$2`, ..., returning
    /// `fields` of every row as text
    fn execute(&mut self, sql: &str, args: &[&str], fields: &[&str]) -> PirogueResult<Vec<CatalogRow>>;
}

/// Catalog access through SPI, inside the calling backend
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiCursor;

impl CatalogCursor for SpiCursor {
    fn execute(&mut self, sql: &str, args: &[&str], fields: &[&str]) -> PirogueResult<Vec<CatalogRow>> {
        let bound = args
            .iter()
            .map(|arg| (PgOid::BuiltIn(PgBuiltInOids::TEXTOID), (*arg).into_datum()))
            .collect::<Vec<_>>();

        Spi::connect(|client| {
            let table = client.select(sql, None, Some(bound))?;
            let mut rows = Vec::new();
            for row in table {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(row[*field].value::<String>()?);
                }
                rows.push(CatalogRow(values));
            }
            Ok::<_, pgrx::spi::Error>(rows)
        })
        .map_err(|e| PirogueError::CatalogQueryFailed {
            query: sql.to_string(),
            error: e.to_string(),
        })
    }
}

/// Foreign keys of `schema.table`, as `(column, reference)` pairs
fn foreign_keys<C: CatalogCursor + ?Sized>(
    cursor: &mut C,
    schema: &str,
    table: &str,
) -> PirogueResult<Vec<(String, ColumnReference)>> {
    cursor
        .execute(FOREIGN_KEYS_QUERY, &[schema, table], FOREIGN_KEY_FIELDS)?
        .iter()
        .map(|row| {
            Ok((
                row.required(0)?.to_string(),
                ColumnReference {
                    schema: row.required(1)?.to_string(),
                    table: row.required(2)?.to_string(),
                    column: row.required(3)?.to_string(),
                },
            ))
        })
        .collect()
}

/// Fetch the columns of `schema.table`, in catalog order, with the
/// foreign keys each column takes part in
pub fn resolve<C: CatalogCursor + ?Sized>(
    cursor: &mut C,
    schema: &str,
    table: &str,
) -> PirogueResult<Vec<ColumnDescriptor>> {
    if !cursor.is_connected() {
        return Err(PirogueError::CursorNotConnected);
    }

    let rows = cursor.execute(COLUMNS_QUERY, &[schema, table], COLUMN_FIELDS)?;
    if rows.is_empty() {
        return Err(PirogueError::RelationNotFound {
            schema: schema.to_string(),
            table: table.to_string(),
        });
    }

    let mut table_ref = TableRef::new(schema, table);
    let relkind = rows[0].required(5)?;
    table_ref.kind = TableKind::from_relkind(relkind)
        .ok_or_else(|| crate::internal_error!("unexpected relkind '{}' for {}.{}", relkind, schema, table))?;

    let references = match table_ref.kind {
        TableKind::BaseTable => foreign_keys(cursor, schema, table)?,
        TableKind::View => Vec::new(),
    };

    rows.iter()
        .map(|row| {
            let name = row.required(0)?.to_string();
            Ok(ColumnDescriptor {
                table: table_ref.clone(),
                sql_type: row.required(1)?.to_string(),
                is_nullable: row.flag(2)?,
                default_expr: row.text(3)?.map(str::to_string),
                is_primary_key: row.flag(4)?,
                references: references
                    .iter()
                    .filter(|(column, _)| *column == name)
                    .map(|(_, reference)| reference.clone())
                    .collect(),
                name,
            })
        })
        .collect()
}

/// Resolve every table of a definition: the child, then each parent
pub fn resolve_all<C: CatalogCursor + ?Sized>(
    cursor: &mut C,
    spec: &CompositionSpec,
) -> PirogueResult<Vec<Vec<ColumnDescriptor>>> {
    spec.table_refs()
        .iter()
        .map(|table| resolve(cursor, &table.schema, &table.name))
        .collect()
}
