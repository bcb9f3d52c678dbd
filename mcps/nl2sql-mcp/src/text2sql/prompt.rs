//! Prompt construction and SQL extraction

use regex::Regex;
use std::sync::LazyLock;

use crate::db::Dialect;
use crate::llm::Message;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```sql(.*?)```").expect("Invalid SQL fence regex"));

/// The last ```` ```sql ```` block of a completion, trimmed; empty if none
pub fn extract_sql(content: &str) -> String {
    SQL_FENCE
        .captures_iter(content)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Messages asking for a first SQL statement
pub fn generation_messages(dialect: Dialect, mschema: &str, question: &str) -> Vec<Message> {
    let system = format!(
        "You are now a {dialect} data analysis expert. Your task is to write correct SQL \
         that answers the user's question, based on the reference database schema and the \
         question. Wrap the generated SQL in ```sql and ```.\n\
         【Database schema】\n\
         {mschema}\n\
         \n\
         【Question】\n\
         {question}\n"
    );
    vec![
        Message::system(system),
        Message::user(format!("The user's question is: {}", question)),
    ]
}

/// Messages asking to fix a statement the database rejected
pub fn repair_messages(
    dialect: Dialect,
    mschema: &str,
    question: &str,
    sql: &str,
    error: &str,
) -> Vec<Message> {
    let system = format!(
        "You are now a {dialect} data analysis expert. Read the user's question, the reference \
         database schema, the SQL to check for that question, and the error the database \
         returned when executing it. Fix only the errors and output the corrected SQL.\n\
         Notes:\n\
         1. Only fix the errors, do not change the logic of the SQL.\n\
         2. Wrap the generated SQL in ```sql and ```.\n\
         \n\
         【Database schema】\n\
         {mschema}\n"
    );
    let user = format!(
        "【Question】\n{question}\n\n【SQL to check】\n{sql}\n\n【Error】\n{error}"
    );
    vec![Message::system(system), Message::user(user)]
}
