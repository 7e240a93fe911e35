//! DDL Generation: Inheritance Views and INSTEAD OF Triggers
//!
//! This module turns a composition definition into the SQL script that
//! creates an updatable view over a child table and its parents:
//! - **View**: `SELECT` over the child joined to every parent
//! - **Key default**: optional `ALTER VIEW ... SET DEFAULT`
//! - **Triggers**: INSERT, UPDATE and DELETE functions writing back to the
//!   underlying tables
//!
//! ## Architecture
//!
//! Generation follows this sequence:
//! 1. Parse and validate the definition (`schema::definition`)
//! 2. Resolve table columns through the catalog (`catalog`)
//! 3. Plan joins and key flow (`planner`)
//! 4. Compose the view columns (`schema::composer`)
//! 5. Emit the view (`view`) and the triggers (`trigger`)
//!
//! The functions below only return the script; running it is up to the
//! caller.

pub mod generate;
pub mod trigger;
pub mod view;

pub use generate::{generate, generate_from_descriptors, GenerationRequest};

use pgrx::prelude::*;
use pgrx::JsonB;

use crate::catalog::{resolve, SpiCursor};
use crate::schema::definition::{CompositionSpec, InheritanceKind};
use crate::utils::table_parts;

fn run_generation(request: GenerationRequest) -> Result<String, String> {
    let view = request.definition.view_ref().display_name();
    let kind = request.definition.kind.as_str();
    debug1!("pg_pirogue: generating {} inheritance view {}", kind, view);

    match generate(&mut SpiCursor, &request) {
        Ok(sql) => {
            info!("pg_pirogue: generated {} inheritance view {}", kind, view);
            Ok(sql)
        }
        Err(e) => Err(format!("Failed to generate view {} [{}]: {}", view, e.sqlstate(), e)),
    }
}

/// SQL function: Single inheritance view of `child_table` over `parent_table`
///
/// Usage: SELECT pirogue_single_inheritance('zoo.animal', 'zoo.cat');
#[pg_extern]
fn pirogue_single_inheritance(
    parent_table: &str,
    child_table: &str,
    view_schema: default!(Option<&str>, "NULL"),
    view_name: default!(Option<&str>, "NULL"),
    pkey_default_value: default!(bool, false),
    drop: default!(bool, false),
) -> Result<String, String> {
    let mut definition = CompositionSpec::single(parent_table, child_table);
    definition.view_schema = view_schema.map(str::to_string);
    definition.view_name = view_name.map(str::to_string);
    definition.pkey_default_value = pkey_default_value;

    let mut request = GenerationRequest::new(definition);
    request.drop = drop;
    run_generation(request)
}

/// SQL function: Multiple inheritance view from a JSON definition
///
/// Usage: SELECT pirogue_multiple_inheritance('{"child": "pet", "parents": [{"table": "animal"}, {"table": "owned"}]}');
#[pg_extern]
fn pirogue_multiple_inheritance(
    definition: JsonB,
    create_joins: default!(bool, false),
    drop: default!(bool, false),
) -> Result<String, String> {
    let definition = CompositionSpec::from_json_with_kind(&definition.0, InheritanceKind::Multiple)
        .map_err(|e| format!("Invalid definition: {}", e))?;

    run_generation(GenerationRequest {
        definition,
        create_joins,
        drop,
    })
}

/// SQL function: Generate from a JSON definition, kind taken from the
/// definition (`single` when absent)
#[pg_extern]
fn pirogue_generate(
    definition: JsonB,
    create_joins: default!(bool, false),
    drop: default!(bool, false),
) -> Result<String, String> {
    let definition =
        CompositionSpec::from_json(&definition.0).map_err(|e| format!("Invalid definition: {}", e))?;

    run_generation(GenerationRequest {
        definition,
        create_joins,
        drop,
    })
}

/// SQL function: Columns of a table as the generator sees them
///
/// Usage: SELECT pirogue_columns('zoo.cat');
#[pg_extern]
fn pirogue_columns(table_name: &str) -> JsonB {
    let (schema, table) = table_parts(table_name);
    match resolve(&mut SpiCursor, &schema, &table) {
        Ok(columns) => match serde_json::to_value(&columns) {
            Ok(json_value) => JsonB(json_value),
            Err(e) => {
                error!("Failed to serialize columns to JSONB: {}", e);
            }
        },
        Err(e) => {
            error!("Column lookup failed: {}", e);
        }
    }
}
