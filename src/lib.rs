use pgrx::prelude::*;

mod catalog;
mod clause;
mod planner;
mod utils;
pub mod config;
pub mod ddl;
pub mod error;
pub mod schema;
pub mod validation;

pub use catalog::{CatalogCursor, CatalogRow, SpiCursor};
pub use ddl::{generate, generate_from_descriptors, GenerationRequest};
pub use error::{PirogueError, PirogueResult};

pg_module_magic!();

/// Get the version of the pg_pirogue extension
#[pg_extern]
fn pirogue_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use pgrx::JsonB;

    use crate::error::testing::assert_error_kind;
    use crate::error::ErrorKind;
    use crate::schema::definition::CompositionSpec;
    use crate::{generate, GenerationRequest, SpiCursor};

    fn count(sql: &str) -> i64 {
        Spi::get_one::<i64>(sql).unwrap().unwrap_or(0)
    }

    fn create_zoo() {
        Spi::run("CREATE SCHEMA zoo").unwrap();
        Spi::run("CREATE TABLE zoo.animal (aid serial PRIMARY KEY, name text, year integer)").unwrap();
        Spi::run(
            "CREATE TABLE zoo.cat (aid integer PRIMARY KEY REFERENCES zoo.animal, eye_color text)",
        )
        .unwrap();
    }

    #[pg_test]
    fn test_version_callable_from_sql() {
        let version = Spi::get_one::<String>("SELECT pirogue_version()").unwrap();
        assert_eq!(version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[pg_test]
    fn test_single_inheritance_round_trip() {
        create_zoo();
        let sql = Spi::get_one::<String>("SELECT pirogue_single_inheritance('zoo.animal', 'zoo.cat')")
            .unwrap()
            .unwrap();
        Spi::run(&sql).unwrap();

        Spi::run("INSERT INTO zoo.vw_zoo_cat (name, year, eye_color) VALUES ('Felix', 2019, 'green')")
            .unwrap();
        assert_eq!(count("SELECT count(*) FROM zoo.animal"), 1);
        assert_eq!(count("SELECT count(*) FROM zoo.cat c JOIN zoo.animal a USING (aid)"), 1);

        Spi::run("UPDATE zoo.vw_zoo_cat SET year = 2020, eye_color = 'blue' WHERE name = 'Felix'").unwrap();
        let color = Spi::get_one::<String>("SELECT eye_color FROM zoo.cat").unwrap();
        assert_eq!(color.as_deref(), Some("blue"));
        assert_eq!(count("SELECT year::bigint FROM zoo.animal"), 2020);

        Spi::run("DELETE FROM zoo.vw_zoo_cat WHERE name = 'Felix'").unwrap();
        assert_eq!(count("SELECT count(*) FROM zoo.cat"), 0);
        assert_eq!(count("SELECT count(*) FROM zoo.animal"), 0);
    }

    #[pg_test]
    fn test_regenerating_replaces_view() {
        create_zoo();
        for _ in 0..2 {
            let sql = Spi::get_one::<String>(
                "SELECT pirogue_single_inheritance('zoo.animal', 'zoo.cat', view_name => 'cats')",
            )
            .unwrap()
            .unwrap();
            Spi::run(&sql).unwrap();
        }
        assert_eq!(
            count("SELECT count(*) FROM pg_trigger WHERE tgrelid = 'zoo.cats'::regclass AND NOT tgisinternal"),
            3
        );
    }

    #[pg_test]
    fn test_view_key_default() {
        create_zoo();
        let sql = Spi::get_one::<String>(
            "SELECT pirogue_single_inheritance('zoo.animal', 'zoo.cat', pkey_default_value => true, \"drop\" => true)",
        )
        .unwrap()
        .unwrap();
        assert!(sql.contains("ALTER VIEW zoo.vw_zoo_cat ALTER COLUMN aid SET DEFAULT nextval("));
        Spi::run(&sql).unwrap();

        let default = Spi::get_one::<String>(
            "SELECT column_default::text FROM information_schema.columns \
             WHERE table_schema = 'zoo' AND table_name = 'vw_zoo_cat' AND column_name = 'aid'",
        )
        .unwrap();
        assert!(default.is_some());
    }

    #[pg_test]
    fn test_multiple_inheritance_insert() {
        Spi::run("CREATE SCHEMA farm").unwrap();
        Spi::run("CREATE TABLE farm.animal (id serial PRIMARY KEY, name text)").unwrap();
        Spi::run("CREATE TABLE farm.owned (id integer PRIMARY KEY, owner text)").unwrap();
        Spi::run("CREATE TABLE farm.pet (id integer PRIMARY KEY, nickname text)").unwrap();

        let sql = Spi::get_one::<String>(
            "SELECT pirogue_multiple_inheritance('{\"child\": \"farm.pet\", \"parents\": \
             [{\"table\": \"farm.animal\"}, {\"table\": \"farm.owned\"}]}'::jsonb)",
        )
        .unwrap()
        .unwrap();
        Spi::run(&sql).unwrap();

        Spi::run("INSERT INTO farm.vw_farm_pet (name, owner, nickname) VALUES ('Rex', 'Ann', 'rexy')").unwrap();
        assert_eq!(
            count(
                "SELECT count(*) FROM farm.pet p \
                 JOIN farm.animal a USING (id) JOIN farm.owned o USING (id)"
            ),
            1
        );

        Spi::run("UPDATE farm.vw_farm_pet SET owner = 'Bob' WHERE nickname = 'rexy'").unwrap();
        let owner = Spi::get_one::<String>("SELECT owner FROM farm.owned").unwrap();
        assert_eq!(owner.as_deref(), Some("Bob"));

        Spi::run("DELETE FROM farm.vw_farm_pet").unwrap();
        assert_eq!(count("SELECT count(*) FROM farm.animal"), 0);
        assert_eq!(count("SELECT count(*) FROM farm.owned"), 0);
    }

    #[pg_test]
    fn test_foreign_key_join() {
        Spi::run("CREATE SCHEMA shop").unwrap();
        Spi::run("CREATE TABLE shop.item (iid serial PRIMARY KEY, label text)").unwrap();
        Spi::run("CREATE TABLE shop.book (item_id integer PRIMARY KEY REFERENCES shop.item, isbn text)").unwrap();

        let sql = Spi::get_one::<String>("SELECT pirogue_single_inheritance('shop.item', 'shop.book')")
            .unwrap()
            .unwrap();
        assert!(sql.contains("INNER JOIN shop.item ON book.item_id = item.iid"));
        Spi::run(&sql).unwrap();

        Spi::run("INSERT INTO shop.vw_shop_book (label, isbn) VALUES ('Dune', '978-0441013593')").unwrap();
        assert_eq!(
            count("SELECT count(*) FROM shop.book b JOIN shop.item i ON i.iid = b.item_id WHERE i.label = 'Dune'"),
            1
        );
        Spi::run("DELETE FROM shop.vw_shop_book").unwrap();
        assert_eq!(count("SELECT count(*) FROM shop.item"), 0);
    }

    #[pg_test]
    fn test_ghost_remap_rejected() {
        create_zoo();
        let mut definition = CompositionSpec::single("zoo.animal", "zoo.cat");
        definition
            .policy
            .remap_columns
            .insert("ghost".to_string(), "phantom".to_string());

        let result = generate(&mut SpiCursor, &GenerationRequest::new(definition));
        assert_error_kind(result, ErrorKind::Composition);
    }

    #[pg_test]
    fn test_missing_table_rejected() {
        let result = generate(
            &mut SpiCursor,
            &GenerationRequest::new(CompositionSpec::single("nowhere.animal", "nowhere.cat")),
        );
        assert_error_kind(result, ErrorKind::SchemaLookup);
    }

    #[pg_test]
    fn test_columns_in_catalog_order() {
        create_zoo();
        let columns = Spi::get_one::<JsonB>("SELECT pirogue_columns('zoo.animal')")
            .unwrap()
            .unwrap();
        let names: Vec<&str> = columns
            .0
            .as_array()
            .unwrap()
            .iter()
            .map(|column| column["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["aid", "name", "year"]);
        assert_eq!(columns.0[0]["is_primary_key"], true);
    }

    #[pg_test]
    #[should_panic(expected = "remap_columns")]
    fn test_error_propagates_to_postgres() {
        create_zoo();
        Spi::run(
            "SELECT pirogue_generate('{\"child\": \"zoo.cat\", \"parents\": [{\"table\": \"zoo.animal\"}], \
             \"policy\": {\"remap_columns\": {\"ghost\": \"phantom\"}}}'::jsonb)",
        )
        .unwrap();
    }
}
