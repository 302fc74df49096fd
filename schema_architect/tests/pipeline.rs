use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

use schema_architect::config::{CodegenConfig, Config, MigrationsConfig, OutputConfig};
use schema_architect::migration::MigrationState;
use schema_architect::schema::TargetLanguage;
use schema_architect::{
    write_artifacts, Error, MigrationError, MigrationOptions, SchemaArchitect, SchemaError,
};

const BLOG: &str = r#"
[[tables]]
name = "users"

[[tables.columns]]
name = "id"
type = "INTEGER"
primary_key = true
auto_increment = true

[[tables.columns]]
name = "email"
type = "TEXT"
unique = true

[[tables]]
name = "posts"

[[tables.columns]]
name = "id"
type = "INTEGER"
primary_key = true
auto_increment = true

[[tables.columns]]
name = "user_id"
type = "INTEGER"
references = { table = "users", column = "id" }
on_delete = "cascade"

[[tables.indexes]]
columns = ["user_id"]
"#;

const BIO_COLUMN: &str = r#"
[[tables.columns]]
name = "bio"
type = "TEXT"
nullable = true
"#;

fn architect(dir: &Path) -> SchemaArchitect {
    let root = dir.to_string_lossy();
    SchemaArchitect::new(Config {
        migrations: MigrationsConfig {
            directory: format!("{}/migrations", root),
            ..MigrationsConfig::default()
        },
        codegen: CodegenConfig {
            output_directory: format!("{}/generated", root),
            ..CodegenConfig::default()
        },
        output: OutputConfig {
            schema_file: format!("{}/schema.sql", root),
            diagram_file: format!("{}/schema.mmd", root),
        },
        ..Config::default()
    })
}

fn write_schema(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// BLOG with an extra nullable column on users
fn blog_with_bio() -> String {
    BLOG.replacen("[[tables]]\nname = \"posts\"", &format!("{}\n[[tables]]\nname = \"posts\"", BIO_COLUMN), 1)
}

#[test]
fn test_initial_then_additive_migration() {
    let dir = TempDir::new().unwrap();
    let architect = architect(dir.path());
    let migrations = dir.path().join("migrations");

    let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", BLOG)).unwrap();
    let (first, artifacts) = architect
        .create_migration(&schema, "Create blog", &MigrationOptions::default())
        .unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.state, MigrationState::Generated);
    assert!(first.up_sql.find("CREATE TABLE users").unwrap() < first.up_sql.find("CREATE TABLE posts").unwrap());
    assert!(first.down_sql.ends_with("DROP TABLE posts;\n\nDROP TABLE users;"));
    write_artifacts(&artifacts, dir.path()).unwrap();

    let file = fs::read_to_string(migrations.join("0001_create_blog.sql")).unwrap();
    assert!(file.starts_with("-- Migration 1: Create blog\n"));
    assert!(file.contains("-- +migrate Up\n"));
    assert!(file.contains("-- +migrate Down\n"));
    assert!(migrations.join(".schema_snapshot.json").exists());
    let tracking = fs::read_to_string(migrations.join("schema_migrations.sql")).unwrap();
    assert!(tracking.starts_with("CREATE TABLE IF NOT EXISTS schema_migrations ("));

    let schema = architect
        .load_schema(write_schema(dir.path(), "schema.toml", &blog_with_bio()))
        .unwrap();
    let (second, artifacts) = architect
        .create_migration(&schema, "Add bio", &MigrationOptions::default())
        .unwrap();
    assert_eq!(second.version, 2);
    assert!(second.up_sql.contains("ADD COLUMN bio TEXT"));
    assert!(!second.is_destructive());
    write_artifacts(&artifacts, dir.path()).unwrap();
    assert!(migrations.join("0002_add_bio.sql").exists());

    let err = architect
        .create_migration(&schema, "Nothing", &MigrationOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Migration(MigrationError::EmptyMigration(_))));
}

#[test]
fn test_destructive_migration_needs_permission() {
    let dir = TempDir::new().unwrap();
    let architect = architect(dir.path());

    let schema = architect
        .load_schema(write_schema(dir.path(), "schema.toml", &blog_with_bio()))
        .unwrap();
    let (_, artifacts) = architect
        .create_migration(&schema, "Create blog", &MigrationOptions::default())
        .unwrap();
    write_artifacts(&artifacts, dir.path()).unwrap();

    let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", BLOG)).unwrap();
    let err = architect
        .create_migration(&schema, "Drop bio", &MigrationOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Migration(MigrationError::DestructiveActionBlocked { version: 2, .. })
    ));
    assert!(!dir.path().join("migrations/0002_drop_bio.sql").exists());

    let options = MigrationOptions {
        allow_destructive: true,
        ..MigrationOptions::default()
    };
    let (migration, _) = architect.create_migration(&schema, "Drop bio", &options).unwrap();
    assert!(migration.requires_backup());
    assert!(migration.down_sql.contains("-- MANUAL ROLLBACK:"));
}

#[test]
fn test_identical_inputs_give_identical_files() {
    let render = || {
        let dir = TempDir::new().unwrap();
        let architect = architect(dir.path());
        let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", BLOG)).unwrap();
        let (migration, _) = architect
            .create_migration(&schema, "Create blog", &MigrationOptions::default())
            .unwrap();
        migration.render_file()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_schema_and_repository_artifacts() {
    let dir = TempDir::new().unwrap();
    let architect = architect(dir.path());
    let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", BLOG)).unwrap();

    let artifacts = architect.schema_artifacts(&schema).unwrap();
    write_artifacts(&artifacts, dir.path()).unwrap();
    let ddl = fs::read_to_string(dir.path().join("schema.sql")).unwrap();
    assert!(ddl.contains("CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts (user_id);"));
    let diagram = fs::read_to_string(dir.path().join("schema.mmd")).unwrap();
    assert!(diagram.starts_with("erDiagram\n"));

    let artifacts = architect.repository_artifacts(&schema, Some("posts")).unwrap();
    write_artifacts(&artifacts, dir.path()).unwrap();
    let repository = fs::read_to_string(dir.path().join("generated/repositories/posts.ts")).unwrap();
    assert!(repository.contains("export class PostRepository {"));
    assert!(dir.path().join("generated/types.ts").exists());
}

#[test]
fn test_rust_repositories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_string_lossy().into_owned();
    let architect = SchemaArchitect::new(Config {
        codegen: CodegenConfig {
            language: TargetLanguage::Rust,
            output_directory: format!("{}/src/db", root),
            page_size: 20,
        },
        ..Config::default()
    });
    let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", BLOG)).unwrap();

    let artifacts = architect.repository_artifacts(&schema, None).unwrap();
    let paths: Vec<String> = artifacts
        .keys()
        .map(|p| p.trim_start_matches(&root).to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/src/db/models.rs",
            "/src/db/repositories/mod.rs",
            "/src/db/repositories/users.rs",
            "/src/db/repositories/posts.rs",
        ]
    );
}

#[test]
fn test_check_reports_every_error() {
    let dir = TempDir::new().unwrap();
    let architect = architect(dir.path());
    let broken = BLOG
        .replace("table = \"users\"", "table = \"authors\"")
        .replace("columns = [\"user_id\"]", "columns = [\"ghost\"]");
    let schema = architect.load_schema(write_schema(dir.path(), "schema.toml", &broken)).unwrap();

    let errors = architect.check(&schema);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, SchemaError::DanglingForeignKey { .. })));
    assert!(errors.iter().any(|e| matches!(
        e,
        SchemaError::InvalidIndexColumn { index, column } if index == "idx_posts_ghost" && column == "ghost"
    )));
    assert!(architect.schema_artifacts(&schema).is_err());
}

#[rstest]
#[case("schema.yaml", "tables:\n  - name: tags\n    columns:\n      - name: id\n        type: INTEGER\n        primary_key: true\n      - name: label\n        type: TEXT\n        unique: true\n")]
#[case("schema.json", r#"{"tables": [{"name": "tags", "columns": [{"name": "id", "type": "INTEGER", "primary_key": true}, {"name": "label", "type": "TEXT", "unique": true}]}]}"#)]
#[case("schema.toml", "[[tables]]\nname = \"tags\"\n[[tables.columns]]\nname = \"id\"\ntype = \"INTEGER\"\nprimary_key = true\n[[tables.columns]]\nname = \"label\"\ntype = \"TEXT\"\nunique = true\n")]
fn test_document_formats(#[case] file: &str, #[case] text: &str) {
    let dir = TempDir::new().unwrap();
    let architect = architect(dir.path());
    let schema = architect.load_schema(write_schema(dir.path(), file, text)).unwrap();

    assert_eq!(
        schema.render_ddl().unwrap(),
        "CREATE TABLE tags (\n  id INTEGER PRIMARY KEY NOT NULL,\n  label TEXT NOT NULL UNIQUE\n);\n"
    );
}

#[test]
fn test_init_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schema_architect.toml");
    fs::write(&path, "[migrations]\nversion_width = 6\n").unwrap();

    let architect = schema_architect::init(path.to_str().unwrap()).unwrap();
    assert_eq!(architect.config().migrations.version_width, 6);
    assert!(!architect.config().migrations.allow_destructive);
}
