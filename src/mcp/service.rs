//! MCP service implementation using rmcp.
//!
//! This module defines the FloatService struct, which exposes the tool
//! catalog over the MCP protocol. The catalog is built at startup, so
//! `list_tools` and `call_tool` are implemented by hand over the
//! [`Dispatcher`] instead of through rmcp's tool macros.

use crate::tools::{Dispatcher, ResponseEnvelope};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, JsonObject, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};

#[derive(Clone)]
pub struct FloatService {
    /// Shared dispatcher (registry + query executor)
    dispatcher: Dispatcher,
}

impl FloatService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Tool manifest in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher.registry().mcp_tools()
    }

    /// Dispatch one call and shape the envelope as an MCP tool result.
    ///
    /// Tool failures are reported in-band (`isError: true` with an
    /// `{"error": ...}` payload); they never become protocol errors.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let envelope = self
            .dispatcher
            .dispatch(name, arguments.unwrap_or_default())
            .await;
        envelope_to_result(envelope)
    }
}

fn envelope_to_result(envelope: ResponseEnvelope) -> CallToolResult {
    match envelope {
        ResponseEnvelope::Success(payload) => CallToolResult::structured(payload),
        failure @ ResponseEnvelope::Failure { .. } => {
            CallToolResult::structured_error(failure.to_json())
        }
    }
}

impl ServerHandler for FloatService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "floatchat-mcp".to_owned(),
                title: Some("FloatChat MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools over oceanographic float (Argo) profiles.\n\
                \n\
                ## Data\n\
                - `profiles`: one row per measurement level (float_id, profile_index, time, \
                latitude, longitude, depth, temperature, salinity, qc, source_file, raw_metadata)\n\
                - `profile_summaries`: one row per profile (profile_key, float_id, time, position, \
                n_levels, depth range, mean and surface temperature/salinity)\n\
                \n\
                ## Workflow\n\
                1. Use `nearest_float` or `location_to_floatid` to find floats near a position\n\
                2. Use `profile_summary`, `float_trajectory` and the chart tools for one float\n\
                3. Use `sql_query` for anything else (single SELECT only; no semicolons or comments)\n\
                \n\
                ## Errors\n\
                Failures come back as `{\"error\": \"...\"}`. Export tools write files on the \
                server and return their paths."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.call(&request.name, request.arguments).await)
    }
}
