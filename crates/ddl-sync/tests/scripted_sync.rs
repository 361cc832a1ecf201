//! Synchronization against scripted MySQL and PostgreSQL catalogs.
//!
//! The scripted driver answers introspection queries with canned rows and
//! records every statement, so the exact DDL sequence can be checked without
//! a server.

mod common;

use chrono::{DateTime, TimeZone as _, Utc};
use common::{
    mysql_column, mysql_defaulted, postgres_column, postgres_defaulted, ScriptedDriver,
};
use ddl_sync::prelude::*;

const MYSQL_TABLES: &str = "information_schema.TABLES";
const MYSQL_COLUMNS: &str = "information_schema.COLUMNS";
const MYSQL_INDEXES: &str = "information_schema.STATISTICS";

const PG_TABLES: &str = "information_schema.tables";
const PG_COLUMNS: &str = "information_schema.columns";
const PG_PRIMARY_KEY: &str = "AND i.indisprimary";
const PG_ENUM_LABELS: &str = "pg_enum";
const PG_ENUM_COLUMNS: &str = "a.atttypid";
const PG_INDEXES: &str = "pg_index ix";

fn table_row(name: &str) -> Row {
    Row::new().with("table_name", name)
}

fn mysql_index(name: &str, column: &str, unique: bool) -> Row {
    Row::new()
        .with("index_name", name)
        .with("column_name", column)
        .with("non_unique", i64::from(!unique))
}

fn label(value: &str) -> Row {
    Row::new().with("label", value)
}

fn launch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
}

fn mysql(driver: ScriptedDriver) -> Synchronizer<ScriptedDriver> {
    Synchronizer::with_options(
        DialectKind::Mysql,
        driver,
        SyncOptions::new().time_zone(TimeZone::utc()),
    )
}

fn postgres(driver: ScriptedDriver) -> Synchronizer<ScriptedDriver> {
    Synchronizer::with_options(
        DialectKind::Postgres,
        driver,
        SyncOptions::new().time_zone(TimeZone::utc()),
    )
}

// =============================================================================
// MySQL
// =============================================================================

#[tokio::test]
async fn test_mysql_create_with_indexes() {
    let mut sync = mysql(ScriptedDriver::new());
    sync.define_collection(
        "users",
        [
            ("id", ColumnDescriptor::serial()),
            (
                "name",
                ColumnDescriptor::text().required().default_value("John"),
            ),
            ("age", ColumnDescriptor::number().rational()),
            ("email", ColumnDescriptor::text().size(120).unique()),
        ],
    );

    let report = sync.sync().await.unwrap();
    assert_eq!(report.changes_applied, 2);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "CREATE TABLE `users` (`id` INT NOT NULL AUTO_INCREMENT, \
             `name` VARCHAR(255) NOT NULL DEFAULT 'John', `age` FLOAT, \
             `email` VARCHAR(120), PRIMARY KEY (`id`))"
                .to_string(),
            "CREATE UNIQUE INDEX `email_unique` ON `users` (`email`)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_mysql_positional_add_and_drop() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("users")])
        .respond(
            MYSQL_COLUMNS,
            vec![
                mysql_column("id", "int", false, "PRI", "auto_increment"),
                mysql_column("age", "int", true, "", ""),
                mysql_column("nickname", "varchar(255)", true, "", ""),
            ],
        );
    let mut sync = mysql(driver);
    sync.define_collection(
        "users",
        [
            ("code", ColumnDescriptor::text().size(8)),
            ("id", ColumnDescriptor::serial()),
            ("name", ColumnDescriptor::text()),
            ("age", ColumnDescriptor::number()),
        ],
    );

    let report = sync.sync().await.unwrap();
    assert_eq!(report.changes_applied, 3);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "ALTER TABLE `users` ADD COLUMN `code` VARCHAR(8) FIRST",
            "ALTER TABLE `users` ADD COLUMN `name` VARCHAR(255) AFTER `id`",
            "ALTER TABLE `users` DROP COLUMN `nickname`",
        ]
    );
}

#[tokio::test]
async fn test_mysql_converged_table_is_untouched() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("users")])
        .respond(
            MYSQL_COLUMNS,
            vec![
                mysql_column("id", "int", false, "PRI", "auto_increment"),
                mysql_column("score", "double", true, "", ""),
                mysql_column("kind", "enum('cat','dog')", false, "", ""),
            ],
        )
        .respond(
            MYSQL_INDEXES,
            vec![
                mysql_index("PRIMARY", "id", true),
                mysql_index("kind_index", "kind", false),
            ],
        );
    let mut sync = mysql(driver);
    sync.define_collection(
        "users",
        [
            ("id", ColumnDescriptor::serial()),
            ("score", ColumnDescriptor::number().rational().size(8)),
            (
                "kind",
                ColumnDescriptor::enumeration(["dog", "cat"]).required().index(),
            ),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 0);
    assert!(sync.driver().executed().is_empty());
}

#[tokio::test]
async fn test_mysql_number_size_and_enum_changes() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("pets")])
        .respond(
            MYSQL_COLUMNS,
            vec![
                mysql_column("legs", "smallint", true, "", ""),
                mysql_column("kind", "enum('cat','dog')", true, "", ""),
            ],
        );
    let mut sync = mysql(driver);
    sync.define_collection(
        "pets",
        [
            ("legs", ColumnDescriptor::number().size(8)),
            ("kind", ColumnDescriptor::enumeration(["cat", "dog", "bird"])),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 2);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "ALTER TABLE `pets` MODIFY COLUMN `legs` BIGINT",
            "ALTER TABLE `pets` MODIFY COLUMN `kind` ENUM('cat','dog','bird')",
        ]
    );
}

#[tokio::test]
async fn test_mysql_index_replaced_and_orphan_dropped() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("users")])
        .respond(
            MYSQL_COLUMNS,
            vec![
                mysql_column("email", "varchar(255)", true, "", ""),
                mysql_column("age", "int", true, "", ""),
            ],
        )
        .respond(
            MYSQL_INDEXES,
            vec![
                mysql_index("email_unique", "email", false),
                mysql_index("age_index", "age", false),
            ],
        );
    let mut sync = mysql(driver);
    sync.define_collection(
        "users",
        [
            ("email", ColumnDescriptor::text().unique()),
            ("age", ColumnDescriptor::number()),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 3);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "DROP INDEX `email_unique` ON `users`",
            "CREATE UNIQUE INDEX `email_unique` ON `users` (`email`)",
            "DROP INDEX `age_index` ON `users`",
        ]
    );
}

fn mysql_everything() -> Vec<(&'static str, ColumnDescriptor)> {
    vec![
        ("id", ColumnDescriptor::serial()),
        ("count", ColumnDescriptor::number().size(8).default_value(0)),
        ("small", ColumnDescriptor::number().size(2).default_value(-3)),
        ("ratio", ColumnDescriptor::number().rational().default_value(0.5)),
        ("precise", ColumnDescriptor::number().rational().size(8).default_value(0.1)),
        (
            "title",
            ColumnDescriptor::text().size(50).required().default_value("John"),
        ),
        ("body", ColumnDescriptor::text().big()),
        ("active", ColumnDescriptor::boolean().default_value(true)),
        ("born", ColumnDescriptor::date().default_value(launch())),
        ("launched", ColumnDescriptor::date().time().default_value(launch())),
        (
            "created",
            ColumnDescriptor::date()
                .time()
                .default_value(Literal::current_timestamp()),
        ),
        ("payload", ColumnDescriptor::binary()),
        (
            "kind",
            ColumnDescriptor::enumeration(["cat", "dog"]).default_value("dog"),
        ),
        ("location", ColumnDescriptor::point()),
        (
            "token",
            ColumnDescriptor::uuid().default_value("00000000-0000-0000-0000-000000000000"),
        ),
        ("meta", ColumnDescriptor::json()),
        ("blob", ColumnDescriptor::object()),
    ]
}

#[tokio::test]
async fn test_mysql_renders_defaults() {
    let mut sync = mysql(ScriptedDriver::new());
    sync.define_collection("everything", mysql_everything());

    assert_eq!(sync.sync().await.unwrap().changes_applied, 1);
    let executed = sync.driver().executed();
    assert_eq!(executed.len(), 1);
    for fragment in [
        "`count` BIGINT DEFAULT 0",
        "`small` SMALLINT DEFAULT -3",
        "`ratio` FLOAT DEFAULT 0.5",
        "`title` VARCHAR(50) NOT NULL DEFAULT 'John'",
        "`active` TINYINT(1) DEFAULT true",
        "`born` DATE DEFAULT '2024-01-02 03:04:05'",
        "`launched` DATETIME DEFAULT '2024-01-02 03:04:05'",
        "`created` DATETIME DEFAULT CURRENT_TIMESTAMP",
        "`kind` ENUM('cat','dog') DEFAULT 'dog'",
        "`token` CHAR(36) DEFAULT '00000000-0000-0000-0000-000000000000'",
    ] {
        assert!(executed[0].contains(fragment), "missing {fragment}");
    }
}

#[tokio::test]
async fn test_mysql_every_type_with_defaults_is_converged() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("everything")])
        .respond(
            MYSQL_COLUMNS,
            vec![
                mysql_column("id", "int", false, "PRI", "auto_increment"),
                mysql_defaulted("count", "bigint", "0"),
                mysql_defaulted("small", "smallint", "-3"),
                mysql_defaulted("ratio", "float", "0.5"),
                mysql_defaulted("precise", "double", "0.1"),
                Row::new()
                    .with("column_name", "title")
                    .with("column_type", "varchar(50)")
                    .with("is_nullable", "NO")
                    .with("column_default", "John")
                    .with("column_key", "")
                    .with("extra", ""),
                mysql_column("body", "longtext", true, "", ""),
                mysql_defaulted("active", "tinyint(1)", "1"),
                mysql_defaulted("born", "date", "2024-01-02"),
                mysql_defaulted("launched", "datetime", "2024-01-02 03:04:05"),
                Row::new()
                    .with("column_name", "created")
                    .with("column_type", "datetime")
                    .with("is_nullable", "YES")
                    .with("column_default", "CURRENT_TIMESTAMP")
                    .with("column_key", "")
                    .with("extra", "DEFAULT_GENERATED"),
                mysql_column("payload", "blob", true, "", ""),
                mysql_defaulted("kind", "enum('cat','dog')", "dog"),
                mysql_column("location", "point", true, "", ""),
                mysql_defaulted("token", "char(36)", "00000000-0000-0000-0000-000000000000"),
                mysql_column("meta", "json", true, "", ""),
                mysql_column("blob", "blob", true, "", ""),
            ],
        );
    let mut sync = mysql(driver);
    sync.define_collection("everything", mysql_everything());

    assert_eq!(sync.sync().await.unwrap().changes_applied, 0);
    assert!(sync.driver().executed().is_empty());
}

#[tokio::test]
async fn test_mysql_unknown_native_type() {
    let driver = ScriptedDriver::new()
        .respond(MYSQL_TABLES, vec![table_row("shapes")])
        .respond(
            MYSQL_COLUMNS,
            vec![mysql_column("outline", "geometry", true, "", "")],
        );
    let mut sync = mysql(driver);
    sync.define_collection("shapes", [("outline", ColumnDescriptor::point())]);

    assert!(matches!(
        sync.sync().await,
        Err(SyncError::UnknownColumnType { native, .. }) if native == "geometry"
    ));
    assert!(sync.driver().executed().is_empty());
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[tokio::test]
async fn test_postgres_enum_type_created_before_table() {
    let mut sync = postgres(ScriptedDriver::new());
    sync.define_collection(
        "pets",
        [
            ("id", ColumnDescriptor::serial()),
            ("kind", ColumnDescriptor::enumeration(["cat", "dog"]).required()),
            ("name", ColumnDescriptor::text().index()),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 2);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "CREATE TYPE \"pets_enum_kind\" AS ENUM ('cat', 'dog')",
            "CREATE TABLE \"pets\" (\"id\" SERIAL, \"kind\" \"pets_enum_kind\" NOT NULL, \
             \"name\" TEXT, PRIMARY KEY (\"id\"))",
            "CREATE INDEX \"pets_name_index\" ON \"pets\" (\"name\")",
        ]
    );
}

fn pets_catalog(labels: &[&str]) -> ScriptedDriver {
    let id = Row::new()
        .with("column_name", "id")
        .with("data_type", "integer")
        .with("udt_name", "int4")
        .with("is_nullable", "NO")
        .with("column_default", "nextval('pets_id_seq'::regclass)")
        .with("max_length", Value::Null)
        .with("is_identity", "NO");

    ScriptedDriver::new()
        .respond(PG_TABLES, vec![table_row("pets")])
        .respond(
            PG_COLUMNS,
            vec![id, postgres_column("kind", "USER-DEFINED", "pets_enum_kind", false)],
        )
        .respond(PG_PRIMARY_KEY, vec![Row::new().with("column_name", "id")])
        .respond_to(
            PG_ENUM_LABELS,
            "pets_enum_kind",
            labels.iter().map(|value| label(value)).collect(),
        )
        .respond_to(
            PG_ENUM_COLUMNS,
            "pets_enum_kind",
            vec![Row::new()
                .with("table_name", "pets")
                .with("column_name", "kind")],
        )
        .respond(
            PG_INDEXES,
            vec![Row::new()
                .with("index_name", "pets_kind_index")
                .with("column_name", "kind")
                .with("is_unique", false)],
        )
}

#[tokio::test]
async fn test_postgres_reordered_enum_is_converged() {
    let mut sync = postgres(pets_catalog(&["cat", "dog"]));
    sync.define_collection(
        "pets",
        [
            ("id", ColumnDescriptor::serial()),
            (
                "kind",
                ColumnDescriptor::enumeration(["dog", "cat"]).required().index(),
            ),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 0);
    assert!(sync.driver().executed().is_empty());
}

#[tokio::test]
async fn test_postgres_enum_change_replaces_type() {
    let mut sync = postgres(pets_catalog(&["cat", "dog"]));
    sync.define_collection(
        "pets",
        [
            ("id", ColumnDescriptor::serial()),
            (
                "kind",
                ColumnDescriptor::enumeration(["cat", "dog", "bird"])
                    .required()
                    .index(),
            ),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 1);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "DROP TYPE IF EXISTS \"pets_enum_kind__old\"",
            "ALTER TYPE \"pets_enum_kind\" RENAME TO \"pets_enum_kind__old\"",
            "CREATE TYPE \"pets_enum_kind\" AS ENUM ('cat', 'dog', 'bird')",
            "ALTER TABLE \"pets\" ALTER COLUMN \"kind\" DROP DEFAULT",
            "ALTER TABLE \"pets\" ALTER COLUMN \"kind\" TYPE \"pets_enum_kind\" \
             USING \"kind\"::text::\"pets_enum_kind\"",
            "ALTER TABLE \"pets\" ALTER COLUMN \"kind\" SET NOT NULL",
            "DROP TYPE IF EXISTS \"pets_enum_kind__old\"",
        ]
    );
}

#[tokio::test]
async fn test_postgres_index_names_are_prefixed() {
    let mut sync = postgres(pets_catalog(&["cat", "dog"]));
    sync.define_collection(
        "pets",
        [
            ("id", ColumnDescriptor::serial()),
            ("kind", ColumnDescriptor::enumeration(["cat", "dog"]).required()),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 1);
    assert_eq!(
        sync.driver().executed(),
        vec!["DROP INDEX \"pets_kind_index\""]
    );
}

#[tokio::test]
async fn test_postgres_drop_collection() {
    let sync = postgres(pets_catalog(&["cat", "dog"]));
    assert!(sync.drop_collection("pets").await.unwrap());
    assert_eq!(sync.driver().executed(), vec!["DROP TABLE \"pets\""]);
}

#[tokio::test]
async fn test_postgres_unused_enum_type_is_recreated() {
    let driver = ScriptedDriver::new().respond_to(
        PG_ENUM_LABELS,
        "pets_enum_kind",
        vec![label("cat"), label("dog")],
    );
    let mut sync = postgres(driver);
    sync.define_collection(
        "pets",
        [
            ("id", ColumnDescriptor::serial()),
            (
                "kind",
                ColumnDescriptor::enumeration(["cat", "dog", "bird"]).required(),
            ),
        ],
    );

    assert_eq!(sync.sync().await.unwrap().changes_applied, 1);
    assert_eq!(
        sync.driver().executed(),
        vec![
            "DROP TYPE \"pets_enum_kind\"",
            "CREATE TYPE \"pets_enum_kind\" AS ENUM ('cat', 'dog', 'bird')",
            "CREATE TABLE \"pets\" (\"id\" SERIAL, \"kind\" \"pets_enum_kind\" NOT NULL, \
             PRIMARY KEY (\"id\"))",
        ]
    );
}

fn postgres_everything() -> Vec<(&'static str, ColumnDescriptor)> {
    vec![
        ("id", ColumnDescriptor::serial()),
        ("count", ColumnDescriptor::number().size(8).default_value(0)),
        ("small", ColumnDescriptor::number().size(2).default_value(-3)),
        ("ratio", ColumnDescriptor::number().rational().default_value(0.5)),
        (
            "precise",
            ColumnDescriptor::number().rational().size(8).default_value(f64::NAN),
        ),
        ("title", ColumnDescriptor::text().required().default_value("John")),
        ("body", ColumnDescriptor::text().big().default_value("")),
        ("active", ColumnDescriptor::boolean().default_value(true)),
        ("born", ColumnDescriptor::date().default_value(launch())),
        ("launched", ColumnDescriptor::date().time().default_value(launch())),
        (
            "created",
            ColumnDescriptor::date()
                .time()
                .default_value(Literal::current_timestamp()),
        ),
        ("payload", ColumnDescriptor::binary().default_value(vec![0x01_u8, 0xff])),
        (
            "kind",
            ColumnDescriptor::enumeration(["cat", "dog"]).default_value("dog"),
        ),
        ("location", ColumnDescriptor::point().default_value("(1,2)")),
        (
            "token",
            ColumnDescriptor::uuid().default_value("0F8FAD5B-D9CB-469F-A165-70867728950E"),
        ),
        (
            "meta",
            ColumnDescriptor::json().default_value(r#"{"tags":[],"a":1}"#),
        ),
        ("blob", ColumnDescriptor::object().default_value(vec![0_u8])),
    ]
}

#[tokio::test]
async fn test_postgres_renders_defaults() {
    let mut sync = postgres(ScriptedDriver::new());
    sync.define_collection("everything", postgres_everything());

    assert_eq!(sync.sync().await.unwrap().changes_applied, 1);
    let executed = sync.driver().executed();
    assert_eq!(
        executed[0],
        "CREATE TYPE \"everything_enum_kind\" AS ENUM ('cat', 'dog')"
    );
    for fragment in [
        "\"small\" SMALLINT DEFAULT -3",
        "\"precise\" DOUBLE PRECISION DEFAULT 'NaN'",
        "\"title\" TEXT NOT NULL DEFAULT 'John'",
        "\"born\" DATE DEFAULT '2024-01-02T03:04:05.000Z'",
        "\"launched\" TIMESTAMP WITHOUT TIME ZONE DEFAULT '2024-01-02T03:04:05.000Z'",
        "\"created\" TIMESTAMP WITHOUT TIME ZONE DEFAULT CURRENT_TIMESTAMP",
        "\"payload\" BYTEA DEFAULT '\\x01ff'",
        "\"kind\" \"everything_enum_kind\" DEFAULT 'dog'",
        "\"meta\" JSONB DEFAULT '{\"tags\":[],\"a\":1}'",
    ] {
        assert!(executed[1].contains(fragment), "missing {fragment}");
    }
}

#[tokio::test]
async fn test_postgres_every_type_with_defaults_is_converged() {
    let id = Row::new()
        .with("column_name", "id")
        .with("data_type", "integer")
        .with("udt_name", "int4")
        .with("is_nullable", "NO")
        .with("column_default", "nextval('everything_id_seq'::regclass)")
        .with("max_length", Value::Null)
        .with("is_identity", "NO");
    let title = Row::new()
        .with("column_name", "title")
        .with("data_type", "text")
        .with("udt_name", "text")
        .with("is_nullable", "NO")
        .with("column_default", "'John'::text")
        .with("max_length", Value::Null)
        .with("is_identity", "NO");

    let driver = ScriptedDriver::new()
        .respond(PG_TABLES, vec![table_row("everything")])
        .respond(
            PG_COLUMNS,
            vec![
                id,
                postgres_defaulted("count", "bigint", "int8", "0"),
                postgres_defaulted("small", "smallint", "int2", "'-3'::integer"),
                postgres_defaulted("ratio", "real", "float4", "0.5"),
                postgres_defaulted(
                    "precise",
                    "double precision",
                    "float8",
                    "'NaN'::double precision",
                ),
                title,
                postgres_defaulted("body", "text", "text", "''::text"),
                postgres_defaulted("active", "boolean", "bool", "true"),
                postgres_defaulted("born", "date", "date", "'2024-01-02'::date"),
                postgres_defaulted(
                    "launched",
                    "timestamp without time zone",
                    "timestamp",
                    "'2024-01-02 03:04:05'::timestamp without time zone",
                ),
                postgres_defaulted(
                    "created",
                    "timestamp without time zone",
                    "timestamp",
                    "CURRENT_TIMESTAMP",
                ),
                postgres_defaulted("payload", "bytea", "bytea", "'\\x01ff'::bytea"),
                postgres_defaulted(
                    "kind",
                    "USER-DEFINED",
                    "everything_enum_kind",
                    "'dog'::everything_enum_kind",
                ),
                postgres_defaulted("location", "point", "point", "'(1,2)'::point"),
                postgres_defaulted(
                    "token",
                    "uuid",
                    "uuid",
                    "'0f8fad5b-d9cb-469f-a165-70867728950e'::uuid",
                ),
                postgres_defaulted(
                    "meta",
                    "jsonb",
                    "jsonb",
                    r#"'{"a": 1, "tags": []}'::jsonb"#,
                ),
                postgres_defaulted("blob", "bytea", "bytea", "'\\x00'::bytea"),
            ],
        )
        .respond(PG_PRIMARY_KEY, vec![Row::new().with("column_name", "id")])
        .respond_to(
            PG_ENUM_LABELS,
            "everything_enum_kind",
            vec![label("cat"), label("dog")],
        );
    let mut sync = postgres(driver);
    sync.define_collection("everything", postgres_everything());

    assert_eq!(sync.sync().await.unwrap().changes_applied, 0);
    assert!(sync.driver().executed().is_empty());
}
