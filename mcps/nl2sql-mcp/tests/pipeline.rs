//! End-to-end tests against real SQLite files with a scripted model

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nl2sql_mcp::config::DbConfig;
use nl2sql_mcp::db::Dialect;
use nl2sql_mcp::llm::{ChatModel, LlmError, Message};
use nl2sql_mcp::Nl2SqlMcpServer;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

/// Returns one canned SQL block per call and records every prompt
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(statements: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                statements
                    .iter()
                    .map(|s| format!("Here is the query:\n```sql\n{}\n```", s))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

async fn create_db(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("inventory.sqlite");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::raw_sql(script).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();
    path
}

fn sqlite_config(path: PathBuf) -> DbConfig {
    DbConfig {
        dialect: Dialect::Sqlite,
        host: "localhost".to_string(),
        port: None,
        user: None,
        password: None,
        database: None,
        path: Some(path),
        schema: None,
        timeout_secs: 5,
    }
}

const T1_ONLY: &str = "
    CREATE TABLE T1 (id INTEGER PRIMARY KEY, name TEXT);
    INSERT INTO T1 VALUES (1, 'alpha'), (2, 'beta'), (3, 'gamma');
";

const T1_T2: &str = "
    CREATE TABLE T1 (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE T2 (id INTEGER PRIMARY KEY, t1_id INTEGER REFERENCES T1(id));
    INSERT INTO T1 VALUES (1, 'alpha'), (2, 'beta');
    INSERT INTO T2 VALUES (10, 1), (11, 2);
";

#[tokio::test]
async fn test_describe_schema_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), T1_T2).await;
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), ScriptedModel::new(&[]));

    let first = server.describe_schema().await.unwrap();
    let second = server.describe_schema().await.unwrap();
    assert_eq!(first, second);

    let expected = "\
【DB_ID】 inventory
【Schema】
# Table: T1
[
(id:INTEGER, Primary Key, Examples: [1, 2]),
(name:TEXT, Examples: [alpha, beta])
]
# Table: T2
[
(id:INTEGER, Primary Key, Examples: [10, 11]),
(t1_id:INTEGER, Examples: [1, 2])
]
【Foreign keys】
T2.t1_id=T1.id";
    assert_eq!(first, expected);
}

#[tokio::test]
async fn test_count_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), T1_ONLY).await;
    let model = ScriptedModel::new(&["SELECT COUNT(*) AS n FROM T1"]);
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), model.clone());

    let text = server.answer_question("how many rows are in T1").await;
    assert_eq!(text, "| n |\n| --- |\n| 3 |");
    assert_eq!(model.calls(), 1);

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0][0].content.contains("# Table: T1"));
    assert!(prompts[0][0].content.contains("sqlite"));
}

#[tokio::test]
async fn test_one_repair_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), T1_ONLY).await;
    let model = ScriptedModel::new(&[
        "SELECT title FROM T1 WHERE id = 1",
        "SELECT name FROM T1 WHERE id = 1",
    ]);
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), model.clone());

    let text = server.answer_question("what is the name of row 1").await;
    assert_eq!(text, "| name |\n| --- |\n| alpha |");
    assert_eq!(model.calls(), 2);

    let prompts = model.prompts.lock().unwrap();
    let repair = &prompts[1][1].content;
    assert!(repair.contains("SELECT title FROM T1 WHERE id = 1"));
    assert!(repair.contains("no such column: title"), "{}", repair);
}

#[tokio::test]
async fn test_error_returned_after_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), T1_ONLY).await;
    let model = ScriptedModel::new(&[
        "SELECT a FROM T1",
        "SELECT b FROM T1",
        "SELECT c FROM T1",
        "SELECT d FROM T1",
    ]);
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), model.clone());

    let text = server.answer_question("anything").await;
    assert!(text.contains("no such column: d"), "{}", text);
    assert_eq!(model.calls(), 4);
}

#[tokio::test]
async fn test_llm_failure_is_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(dir.path(), T1_ONLY).await;
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), ScriptedModel::new(&[]));

    let text = server.answer_question("anything").await;
    assert!(text.starts_with("LLM request failed"), "{}", text);
}

#[tokio::test]
async fn test_unreachable_database() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&["SELECT 1"]);
    let server = Nl2SqlMcpServer::with_model(
        sqlite_config(dir.path().join("nowhere.sqlite")),
        model.clone(),
    );

    let text = server.answer_question("how many rows are in T1").await;
    assert!(text.starts_with("Database connection failed"), "{}", text);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_read_table_csv() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = String::from("CREATE TABLE events (id INTEGER PRIMARY KEY, kind TEXT);");
    for i in 0..150 {
        script.push_str(&format!("INSERT INTO events VALUES ({}, 'k{}');", i, i % 3));
    }
    let path = create_db(dir.path(), &script).await;
    let server = Nl2SqlMcpServer::with_model(sqlite_config(path), ScriptedModel::new(&[]));

    let csv = server.read_table("events").await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,kind");
    assert_eq!(lines[1], "0,k0");
    assert_eq!(lines.len(), 101);

    let err = server.read_table("missing").await.unwrap_err();
    assert!(err.to_string().starts_with("Database error"));
}
