//! M-Schema: the schema description handed to the LLM
//!
//! An [`MSchema`] holds tables, fields, foreign keys and sampled example
//! values, and renders them into a compact, deterministic text form:
//!
//! ```text
//! 【DB_ID】 shop
//! 【Schema】
//! # Table: orders
//! [
//! (id:INTEGER, Primary Key, Examples: [1, 2, 3]),
//! (customer_id:INTEGER, Examples: [7, 9])
//! ]
//! 【Foreign keys】
//! orders.customer_id=customers.id
//! ```

pub mod examples;
pub mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use loader::{load_mschema, LoadOptions};

/// Column types for which only a single example is shown
const TEMPORAL_TYPES: [&str; 4] = ["DATE", "TIME", "DATETIME", "TIMESTAMP"];

/// Examples longer than this are shown one at a time
const LONG_EXAMPLE: usize = 20;

/// Examples longer than this are not shown at all
const HUGE_EXAMPLE: usize = 50;

/// Serializable schema model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MSchema {
    pub db_id: String,
    pub schema: Option<String>,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub default: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// `table.column` -> `referred_table.referred_column`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub referred_schema: Option<String>,
    pub referred_table: String,
    pub referred_column: String,
}

/// Rendering switches for [`MSchema::to_mschema`]
#[derive(Debug, Clone)]
pub struct MSchemaOptions {
    /// Only these tables (case-insensitive); all when `None`
    pub selected_tables: Option<Vec<String>>,
    /// Only these `table.column` entries (case-insensitive); all when `None`
    pub selected_columns: Option<Vec<String>>,
    pub example_num: usize,
    /// Keep type parameters such as `VARCHAR(255)`
    pub show_type_detail: bool,
}

impl Default for MSchemaOptions {
    fn default() -> Self {
        Self {
            selected_tables: None,
            selected_columns: None,
            example_num: 3,
            show_type_detail: true,
        }
    }
}

impl MSchema {
    pub fn new(db_id: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            db_id: db_id.into(),
            schema,
            tables: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Add a table, replacing any previous table of the same name
    pub fn add_table(&mut self, name: impl Into<String>, comment: Option<String>) {
        let name = name.into();
        let table = Table {
            name: name.clone(),
            comment: comment.unwrap_or_default(),
            fields: Vec::new(),
            foreign_keys: Vec::new(),
        };
        match self.table_mut(&name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Append a field to an existing table; ignored for unknown tables
    pub fn add_field(&mut self, table: &str, field: Field) {
        if let Some(t) = self.table_mut(table) {
            t.fields.push(field);
        }
    }

    pub fn add_foreign_key(&mut self, table: &str, key: ForeignKey) {
        if let Some(t) = self.table_mut(table) {
            t.foreign_keys.push(key);
        }
    }

    /// Render the whole model as M-Schema text
    pub fn to_mschema(&self, options: &MSchemaOptions) -> String {
        let selected_tables = lowercase(&options.selected_tables);
        let selected_columns = lowercase(&options.selected_columns);
        let table_selected = |name: &str| {
            selected_tables
                .as_ref()
                .is_none_or(|s| s.contains(&name.to_lowercase()))
        };

        let mut output = vec![format!("【DB_ID】 {}", self.db_id), "【Schema】".to_string()];

        for table in self.tables.iter().filter(|t| table_selected(&t.name)) {
            output.push(self.render_table(table, selected_columns.as_deref(), options));
        }

        if self.tables.iter().any(|t| !t.foreign_keys.is_empty()) {
            output.push("【Foreign keys】".to_string());
            for table in &self.tables {
                for fk in &table.foreign_keys {
                    let same_schema = fk.referred_schema.is_none()
                        || fk.referred_schema.as_deref() == self.schema.as_deref();
                    if same_schema && table_selected(&table.name) && table_selected(&fk.referred_table)
                    {
                        output.push(format!(
                            "{}.{}={}.{}",
                            table.name, fk.column, fk.referred_table, fk.referred_column
                        ));
                    }
                }
            }
        }

        output.join("\n")
    }

    fn render_table(
        &self,
        table: &Table,
        selected_columns: Option<&[String]>,
        options: &MSchemaOptions,
    ) -> String {
        let qualified = match self.schema.as_deref() {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, table.name),
            _ => table.name.clone(),
        };
        let header = if table.comment.trim().is_empty() {
            format!("# Table: {}", qualified)
        } else {
            format!("# Table: {}, {}", qualified, table.comment.trim())
        };

        let field_lines: Vec<String> = table
            .fields
            .iter()
            .filter(|f| {
                selected_columns.is_none_or(|cols| {
                    cols.contains(&format!("{}.{}", table.name, f.name).to_lowercase())
                })
            })
            .map(|f| render_field(f, options))
            .collect();

        format!("{}\n[\n{}\n]", header, field_lines.join(",\n"))
    }

    /// Write the model as pretty JSON
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a model written by [`MSchema::dump`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn render_field(field: &Field, options: &MSchemaOptions) -> String {
    let field_type = if options.show_type_detail {
        field.field_type.as_str()
    } else {
        field.field_type.split('(').next().unwrap_or_default()
    };
    let field_type = field_type.trim().to_uppercase();

    let mut line = format!("({}:{}", field.name, field_type);
    if !field.comment.trim().is_empty() {
        line.push_str(", ");
        line.push_str(field.comment.trim());
    }
    if field.primary_key {
        line.push_str(", Primary Key");
    }

    let examples = displayed_examples(&field.examples, &field_type, options.example_num);
    if !examples.is_empty() {
        line.push_str(&format!(", Examples: [{}]", examples.join(", ")));
    }

    line.push(')');
    line
}

fn displayed_examples<'a>(examples: &'a [String], field_type: &str, example_num: usize) -> Vec<&'a str> {
    let mut shown: Vec<&str> = examples
        .iter()
        .map(String::as_str)
        .take(example_num)
        .collect();
    if shown.is_empty() {
        return shown;
    }

    let longest = shown.iter().map(|s| s.chars().count()).max().unwrap_or(0);
    if TEMPORAL_TYPES.contains(&field_type) {
        shown.truncate(1);
    } else if longest > HUGE_EXAMPLE {
        shown.clear();
    } else if longest > LONG_EXAMPLE {
        shown.truncate(1);
    }
    shown
}

fn lowercase(names: &Option<Vec<String>>) -> Option<Vec<String>> {
    names
        .as_ref()
        .map(|v| v.iter().map(|s| s.to_lowercase()).collect())
}
