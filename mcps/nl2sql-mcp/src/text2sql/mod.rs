//! Generate, execute and repair SQL for a natural-language question
//!
//! The model writes a statement, the database runs it, and on failure the
//! model is shown the statement together with the database error and asked
//! to fix it. At most [`MAX_REPAIRS`] repairs happen before the last error
//! is reported as the answer.

mod prompt;

pub use prompt::{extract_sql, generation_messages, repair_messages};

use crate::db::{Dialect, ExecutionError, QueryRows, SqlExecutor};
use crate::format;
use crate::llm::{ChatModel, LlmError};

/// Repair attempts after the first execution
pub const MAX_REPAIRS: usize = 3;

/// Rows kept in the final answer
pub const MAX_RESULT_ROWS: usize = 100;

/// Characters kept per text cell in the final answer
pub const MAX_CELL_CHARS: usize = 30;

/// Outcome of one question
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Last statement executed
    pub sql: String,
    /// Repair cycles that were needed
    pub repairs: usize,
    /// Truncated rows, or the last database error
    pub result: Result<QueryRows, ExecutionError>,
}

impl Answer {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Markdown table, or the error text verbatim
    pub fn to_markdown(&self) -> String {
        format::render(&self.result)
    }
}

/// Runs the generate / execute / repair loop against one schema
pub struct Text2Sql<'a> {
    model: &'a dyn ChatModel,
    dialect: Dialect,
    mschema: &'a str,
}

impl<'a> Text2Sql<'a> {
    pub fn new(model: &'a dyn ChatModel, dialect: Dialect, mschema: &'a str) -> Self {
        Self {
            model,
            dialect,
            mschema,
        }
    }

    /// Answer `question`; only LLM failures are returned as `Err`
    pub async fn answer<E>(&self, executor: &mut E, question: &str) -> Result<Answer, LlmError>
    where
        E: SqlExecutor + ?Sized,
    {
        let mut sql = self.generate(question).await?;
        tracing::info!("Generated SQL: {}", sql);

        let mut repairs = 0;
        let mut outcome = executor.fetch(&sql).await;

        while let Err(error) = &outcome {
            if repairs == MAX_REPAIRS {
                tracing::warn!("Giving up after {} repairs: {}", repairs, error);
                break;
            }
            repairs += 1;
            tracing::info!("Repair {}/{} after error: {}", repairs, MAX_REPAIRS, error);

            sql = self.repair(question, &sql, &error.message).await?;
            tracing::info!("Repaired SQL: {}", sql);
            outcome = executor.fetch(&sql).await;
        }

        let result = match outcome {
            // Run again so the answer reflects a clean, truncated read
            Ok(_) => executor
                .fetch(&sql)
                .await
                .map(|rows| rows.truncated(Some(MAX_RESULT_ROWS), MAX_CELL_CHARS)),
            Err(e) => Err(e),
        };

        match &result {
            Ok(rows) => tracing::info!("SQL query: {} returned {} rows", sql, rows.row_count()),
            Err(e) => tracing::info!("SQL query: {} failed: {}", sql, e),
        }

        Ok(Answer {
            sql,
            repairs,
            result,
        })
    }

    async fn generate(&self, question: &str) -> Result<String, LlmError> {
        let messages = generation_messages(self.dialect, self.mschema, question);
        let content = self.model.complete(&messages).await?;
        Ok(extract_sql(&content))
    }

    async fn repair(&self, question: &str, sql: &str, error: &str) -> Result<String, LlmError> {
        let messages = repair_messages(self.dialect, self.mschema, question, sql, error);
        let content = self.model.complete(&messages).await?;
        Ok(extract_sql(&content))
    }
}
