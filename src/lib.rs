//! FloatChat MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to explore oceanographic float profiles stored in PostgreSQL (or SQLite
//! for local stores).

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{ToolError, ToolResult};
pub use mcp::FloatService;
pub use tools::{Dispatcher, ToolRegistry, ToolSettings, build_registry};
