//! Build an [`MSchema`] from a live connection

use std::collections::HashSet;

use crate::db::SchemaSource;
use crate::error::Result;

use super::examples::{examples_to_str, SAMPLE_SIZE};
use super::{Field, ForeignKey, MSchema};

/// Which tables to describe
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Schema to introspect instead of the connection's default
    pub schema: Option<String>,
    /// Only these tables, when given
    pub include_tables: Option<Vec<String>>,
    /// Tables to leave out
    pub ignore_tables: Vec<String>,
}

/// Introspect every usable table of the connection's schema
pub async fn load_mschema<S>(db: &mut S, db_id: &str, options: &LoadOptions) -> Result<MSchema>
where
    S: SchemaSource + ?Sized,
{
    if let Some(schema) = &options.schema {
        db.use_schema(schema.clone());
    }

    let listed = db.list_tables().await?;
    let include: Option<HashSet<&str>> = options
        .include_tables
        .as_ref()
        .map(|t| t.iter().map(String::as_str).collect());
    let ignore: HashSet<&str> = options.ignore_tables.iter().map(String::as_str).collect();

    let mut mschema = MSchema::new(db_id, db.schema().map(str::to_string));

    for table in listed {
        if include.as_ref().is_some_and(|inc| !inc.contains(table.as_str()))
            || ignore.contains(table.as_str())
        {
            continue;
        }
        // Tables dropped after listing are skipped
        if !db.has_table(&table).await? {
            tracing::debug!("Table {} vanished during load, skipping", table);
            continue;
        }
        load_table(db, &mut mschema, &table).await?;
    }

    tracing::debug!("Loaded {} tables for {}", mschema.tables.len(), db_id);
    Ok(mschema)
}

async fn load_table<S>(db: &mut S, mschema: &mut MSchema, table: &str) -> Result<()>
where
    S: SchemaSource + ?Sized,
{
    let comment = if db.dialect().supports_comments() {
        db.table_comment(table).await.unwrap_or_else(|e| {
            tracing::debug!("No comment for table {}: {}", table, e);
            None
        })
    } else {
        None
    };
    mschema.add_table(table, comment);

    let primary_keys = db.primary_keys(table).await?;

    for fk in db.foreign_keys(table).await? {
        mschema.add_foreign_key(
            table,
            ForeignKey {
                column: fk.column,
                referred_schema: fk.referred_schema,
                referred_table: fk.referred_table,
                referred_column: fk.referred_column,
            },
        );
    }

    for column in db.columns(table).await? {
        let examples = match db.distinct_values(table, &column.name, SAMPLE_SIZE).await {
            Ok(values) => examples_to_str(values),
            Err(e) => {
                tracing::warn!("Could not sample {}.{}: {}", table, column.name, e);
                Vec::new()
            }
        };

        mschema.add_field(
            table,
            Field {
                primary_key: primary_keys.contains(&column.name),
                name: column.name,
                field_type: column.data_type,
                nullable: column.nullable,
                autoincrement: column.autoincrement,
                default: column.default,
                comment: column.comment.unwrap_or_default(),
                examples,
            },
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::db::{ColumnInfo, Database, Dialect, ExecutionError, ForeignKeyInfo, SqlValue};
    use crate::error::Error;
    use crate::schema::MSchemaOptions;
    use async_trait::async_trait;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Connection};

    async fn open(script: &str) -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.sqlite");
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::raw_sql(script).execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();

        let config = DbConfig {
            dialect: Dialect::Sqlite,
            host: "localhost".to_string(),
            port: None,
            user: None,
            password: None,
            database: None,
            path: Some(path),
            schema: None,
            timeout_secs: 5,
        };
        let db = Database::connect(&config).await.unwrap();
        (dir, db)
    }

    async fn library() -> (tempfile::TempDir, Database) {
        open(
            "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT, email TEXT, homepage TEXT);
             CREATE TABLE books (
                 id INTEGER PRIMARY KEY,
                 author_id INTEGER REFERENCES authors(id),
                 title VARCHAR(200),
                 published DATE,
                 cover BLOB
             );
             CREATE TABLE audit_log (id INTEGER PRIMARY KEY, note TEXT);
             INSERT INTO authors VALUES
                 (1, 'Le Guin', 'ursula@example.com', NULL),
                 (2, 'Borges', NULL, 'https://borges.example');
             INSERT INTO books VALUES
                 (1, 1, 'The Dispossessed', '1974-05-01', x'00'),
                 (2, 2, 'Ficciones', '1944-01-01', NULL);",
        )
        .await
    }

    /// A catalog with two `id`/`label` tables whose failures can be chosen
    #[derive(Default)]
    struct FakeSource {
        tables: Vec<&'static str>,
        /// Listed but gone by the time they are checked
        vanished: Vec<&'static str>,
        /// Table whose primary-key lookup fails
        broken_keys: Option<&'static str>,
        /// Column whose sampling query fails
        unsampleable: Option<&'static str>,
    }

    #[async_trait]
    impl SchemaSource for FakeSource {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn schema(&self) -> Option<&str> {
            None
        }

        fn use_schema(&mut self, _schema: String) {}

        async fn list_tables(&mut self) -> Result<Vec<String>> {
            Ok(self.tables.iter().map(|t| t.to_string()).collect())
        }

        async fn has_table(&mut self, table: &str) -> Result<bool> {
            Ok(!self.vanished.iter().any(|t| *t == table))
        }

        async fn table_comment(&mut self, _table: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
            if self.broken_keys.is_some_and(|t| t == table) {
                return Err(Error::Introspection {
                    table: table.to_string(),
                    source: sqlx::Error::Protocol("catalog unavailable".to_string()),
                });
            }
            Ok(vec!["id".to_string()])
        }

        async fn foreign_keys(&mut self, _table: &str) -> Result<Vec<ForeignKeyInfo>> {
            Ok(Vec::new())
        }

        async fn columns(&mut self, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(["id", "label"]
                .into_iter()
                .map(|name| ColumnInfo {
                    name: name.to_string(),
                    data_type: "TEXT".to_string(),
                    nullable: name != "id",
                    default: None,
                    autoincrement: false,
                    comment: None,
                })
                .collect())
        }

        async fn distinct_values(
            &mut self,
            _table: &str,
            column: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<SqlValue>, ExecutionError> {
            if self.unsampleable.is_some_and(|c| c == column) {
                return Err(ExecutionError::new("permission denied for column"));
            }
            Ok(vec![SqlValue::Text(format!("{}-1", column))])
        }
    }

    #[tokio::test]
    async fn test_load_tables_fields_and_keys() {
        let (_dir, mut db) = library().await;
        let mschema = load_mschema(&mut db, "library", &LoadOptions::default())
            .await
            .unwrap();

        let names: Vec<&str> = mschema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["audit_log", "authors", "books"]);

        let books = mschema.table("books").unwrap();
        let columns: Vec<&str> = books.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "author_id", "title", "published", "cover"]);
        assert!(books.fields[0].primary_key);
        assert_eq!(books.foreign_keys.len(), 1);
        assert_eq!(books.foreign_keys[0].referred_table, "authors");
        assert_eq!(books.fields[3].examples, vec!["1974-05-01"]);

        let authors = mschema.table("authors").unwrap();
        let email = authors.fields.iter().find(|f| f.name == "email").unwrap();
        let homepage = authors.fields.iter().find(|f| f.name == "homepage").unwrap();
        assert!(email.examples.is_empty());
        assert!(homepage.examples.is_empty());
    }

    #[tokio::test]
    async fn test_include_and_ignore() {
        let (_dir, mut db) = library().await;
        let options = LoadOptions {
            include_tables: Some(vec!["books".into(), "authors".into()]),
            ignore_tables: vec!["authors".into()],
            ..Default::default()
        };
        let mschema = load_mschema(&mut db, "library", &options).await.unwrap();
        assert_eq!(mschema.tables.len(), 1);
        assert_eq!(mschema.tables[0].name, "books");
    }

    #[tokio::test]
    async fn test_rendered_text() {
        let (_dir, mut db) = library().await;
        let mschema = load_mschema(&mut db, "library", &LoadOptions::default())
            .await
            .unwrap();
        let text = mschema.to_mschema(&MSchemaOptions::default());
        assert!(text.starts_with("【DB_ID】 library\n【Schema】\n# Table: audit_log\n"));
        assert!(text.contains("(title:VARCHAR(200), Examples: [The Dispossessed, Ficciones])"));
        assert!(text.ends_with("【Foreign keys】\nbooks.author_id=authors.id"));
    }

    #[tokio::test]
    async fn test_binary_and_float_examples() {
        let (_dir, mut db) = open(
            "CREATE TABLE files (id INTEGER PRIMARY KEY, data BLOB, avg_score REAL);
             INSERT INTO files VALUES (1, x'0001', 3.0), (2, x'ff', 4.0);",
        )
        .await;
        let mschema = load_mschema(&mut db, "library", &LoadOptions::default())
            .await
            .unwrap();

        let files = mschema.table("files").unwrap();
        assert!(files.fields[1].examples.is_empty());
        assert_eq!(files.fields[2].examples, vec!["3.0", "4.0"]);

        let text = mschema.to_mschema(&MSchemaOptions::default());
        assert!(text.contains("(data:BLOB)"), "{}", text);
        assert!(text.contains("(avg_score:REAL, Examples: [3.0, 4.0])"), "{}", text);
    }

    #[tokio::test]
    async fn test_vanished_table_skipped() {
        let mut source = FakeSource {
            tables: vec!["kept", "dropped"],
            vanished: vec!["dropped"],
            ..Default::default()
        };
        let mschema = load_mschema(&mut source, "fake", &LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(mschema.tables.len(), 1);
        assert_eq!(mschema.tables[0].name, "kept");
    }

    #[tokio::test]
    async fn test_primary_key_failure_is_fatal() {
        let mut source = FakeSource {
            tables: vec!["kept", "broken"],
            broken_keys: Some("broken"),
            ..Default::default()
        };
        let err = load_mschema(&mut source, "fake", &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Introspection { table, .. } if table == "broken"),
            "{}",
            err
        );
    }

    #[tokio::test]
    async fn test_sampling_failure_leaves_examples_empty() {
        let mut source = FakeSource {
            tables: vec!["kept"],
            unsampleable: Some("label"),
            ..Default::default()
        };
        let mschema = load_mschema(&mut source, "fake", &LoadOptions::default())
            .await
            .unwrap();

        let kept = mschema.table("kept").unwrap();
        assert!(kept.fields[0].primary_key);
        assert_eq!(kept.fields[0].examples, vec!["id-1"]);
        assert_eq!(kept.fields[1].name, "label");
        assert!(kept.fields[1].examples.is_empty());
    }
}
