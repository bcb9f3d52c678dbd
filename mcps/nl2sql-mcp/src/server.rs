//! NL2SQL MCP Server implementation

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, ListResourceTemplatesResult, ListResourcesResult, PaginatedRequestParam,
        RawResource, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, RoleServer,
};
use mcp_common::{text_success, CallToolResult, McpError};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::{AppConfig, DbConfig};
use crate::db::{Database, READ_TABLE_LIMIT};
use crate::error::{self, Error};
use crate::format;
use crate::llm::{ChatModel, OpenAiClient};
use crate::schema::{load_mschema, LoadOptions, MSchemaOptions};
use crate::text2sql::Text2Sql;

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for get_data_via_natural_language tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// The question in natural language, e.g. "How many orders were placed in March?"
    pub query: String,
}

// ============================================================================
// Server Implementation
// ============================================================================

/// NL2SQL MCP Server
#[derive(Clone)]
pub struct Nl2SqlMcpServer {
    database: Arc<DbConfig>,
    model: Arc<dyn ChatModel>,
    tool_router: ToolRouter<Self>,
}

impl Nl2SqlMcpServer {
    /// Create a server talking to the configured OpenAI-compatible endpoint
    pub fn new(config: AppConfig) -> error::Result<Self> {
        let model = OpenAiClient::new(&config.model)?;
        Ok(Self::with_model(config.database, Arc::new(model)))
    }

    /// Create a server with any chat model
    pub fn with_model(database: DbConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            database: Arc::new(database),
            model,
            tool_router: Self::tool_router(),
        }
    }

    /// Answer a question; every failure is reported as text
    pub async fn answer_question(&self, question: &str) -> String {
        tracing::info!("Calling tool with question: {}", question);
        let mut db = match Database::connect(&self.database).await {
            Ok(db) => db,
            Err(e) => {
                tracing::error!("{}", e);
                return e.to_string();
            }
        };

        let answer = self.answer_with(&mut db, question).await;
        db.close().await;

        answer.unwrap_or_else(|e| {
            tracing::error!("Question failed: {}", e);
            e.to_string()
        })
    }

    async fn answer_with(&self, db: &mut Database, question: &str) -> error::Result<String> {
        let mschema = load_mschema(db, &self.database.db_id(), &LoadOptions::default()).await?;
        let text = mschema.to_mschema(&MSchemaOptions::default());

        let answer = Text2Sql::new(self.model.as_ref(), db.dialect(), &text)
            .answer(db, question)
            .await?;
        Ok(answer.to_markdown())
    }

    /// The M-Schema text of the whole database
    pub async fn describe_schema(&self) -> error::Result<String> {
        let mut db = Database::connect(&self.database).await?;
        let described = load_mschema(&mut db, &self.database.db_id(), &LoadOptions::default()).await;
        db.close().await;
        Ok(described?.to_mschema(&MSchemaOptions::default()))
    }

    /// Up to 100 rows of a table as CSV
    pub async fn read_table(&self, table: &str) -> error::Result<String> {
        let mut db = Database::connect(&self.database).await?;
        let rows = db.read_table(table, READ_TABLE_LIMIT).await;
        db.close().await;
        Ok(format::to_csv(&rows?))
    }

    fn schema_uri(&self) -> String {
        self.database.schema_resource_uri()
    }

    fn table_uri_prefix(&self) -> String {
        format!("{}://", self.database.dialect.name())
    }
}

#[tool_router]
impl Nl2SqlMcpServer {
    /// Translate a question into SQL, run it and return the rows
    #[tool(description = "Fetch data from the database through a natural language query. The question is translated into SQL, executed, and the result is returned as a markdown table (or the database error if no working SQL could be produced).")]
    async fn get_data_via_natural_language(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.answer_question(&params.query).await;
        Ok(text_success(text))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for Nl2SqlMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "Natural-language access to the {} database '{}'. \
                Use get_data_via_natural_language to ask questions; read {} for the schema \
                and {}{{table_name}} for sample rows of a table.",
                self.database.dialect,
                self.database.db_id(),
                self.schema_uri(),
                self.table_uri_prefix()
            )),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resource = RawResource::new(self.schema_uri(), self.database.db_id()).no_annotation();
        Ok(ListResourcesResult::with_all_items(vec![resource]))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let template: ResourceTemplate = serde_json::from_value(serde_json::json!({
            "uriTemplate": format!("{}{{table_name}}", self.table_uri_prefix()),
            "name": "table",
            "description": "Up to 100 rows of a table as CSV",
            "mimeType": "text/csv",
        }))
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(ListResourceTemplatesResult::with_all_items(vec![template]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        tracing::info!("Reading resource {}", uri);

        // The database URI wins over a table of the same name
        let text = if uri == self.schema_uri() {
            self.describe_schema().await
        } else if let Some(table) = uri.strip_prefix(&self.table_uri_prefix()) {
            if table.is_empty() {
                return Err(McpError::resource_not_found(
                    format!("resource not found: {}", uri),
                    None,
                ));
            }
            self.read_table(table).await
        } else {
            return Err(McpError::resource_not_found(
                format!("resource not found: {}", uri),
                None,
            ));
        };

        let text = text.map_err(|e| resource_error(&e))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}

fn resource_error(err: &Error) -> McpError {
    tracing::error!("Resource read failed: {}", err);
    McpError::internal_error(err.to_string(), None)
}
