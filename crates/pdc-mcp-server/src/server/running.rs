use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorCode, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;
use tracing::debug;

use crate::errors::McpError;
use crate::tools::query::{QUERY_TOOL_NAME, Query};

const INSTRUCTIONS: &str = "Query the Proteomic Data Commons (PDC) GraphQL API with the `pdc_graphql_query` tool. Most fields require the `acceptDUA: true` argument.";

/// The MCP handler serving the registered tools
#[derive(Clone)]
pub(super) struct Running {
    query_tool: Query,
}

impl Running {
    pub(super) fn new(query_tool: Query) -> Self {
        Self { query_tool }
    }

    async fn call(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "Tool called");
        if request.name == QUERY_TOOL_NAME {
            self.query_tool.execute(convert_arguments(request)?).await
        } else {
            Err(tool_not_found(&request.name))
        }
    }
}

impl ServerHandler for Running {
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(request).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: vec![self.query_tool.tool.clone()],
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}

fn tool_not_found(name: &str) -> McpError {
    McpError::new(
        ErrorCode::METHOD_NOT_FOUND,
        format!("Tool {name} not found"),
        None,
    )
}

fn convert_arguments<T: serde::de::DeserializeOwned>(
    arguments: CallToolRequestParam,
) -> Result<T, McpError> {
    serde_json::from_value(Value::from(arguments.arguments))
        .map_err(|_| McpError::new(ErrorCode::INVALID_PARAMS, "Invalid input".to_string(), None))
}
