//! Tool result helpers

use rmcp::model::{CallToolResult, Content};

/// A successful tool result carrying one text block
///
/// ```rust,ignore
/// Ok(mcp_common::text_success(markdown))
/// ```
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}
