//! Semantic search placeholder.
//!
//! Retrieval needs an external embedding service that this server does not
//! host. The tool stays in the catalog so clients see a stable tool list, and
//! every call explains how to enable it.

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::tools::input::require_non_blank;
use crate::tools::registry::FloatTool;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const NOT_CONFIGURED: &str =
    "vector_search not configured. Deploy RAG microservice and update RAG URL in environment.";

fn default_top_k() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VectorSearchInput {
    /// Natural-language query
    pub query: String,
    /// Number of matches. Default: 5
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorSearchOutput {
    pub matches: Vec<serde_json::Value>,
}

pub struct VectorSearchTool;

impl FloatTool for VectorSearchTool {
    type Input = VectorSearchInput;
    type Output = VectorSearchOutput;

    const NAME: &'static str = "vector_search";
    const TITLE: &'static str = "Vector Search (RAG)";
    const DESCRIPTION: &'static str =
        "Semantic search over profile metadata via an external retrieval service. Not configured in this deployment.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(VectorSearchInput {
            query: require_non_blank("query", input.query)?,
            top_k: input.top_k.clamp(1, 100),
        })
    }

    async fn run(
        &self,
        _input: Self::Input,
        _executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        Err(ToolError::handler(NOT_CONFIGURED))
    }
}
