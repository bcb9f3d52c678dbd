//! MCP Common - shared pieces for the workspace's MCP servers
//!
//! - **Initialization**: [`init_tracing`] installs a stderr subscriber, since
//!   stdout carries the protocol
//! - **Results**: [`text_success`] for tools that answer with plain text

pub mod init;
pub mod result;

pub use init::init_tracing;
pub use result::text_success;

pub use rmcp::{model::CallToolResult, ErrorData as McpError};
