//! MCP server integration module.
//!
//! This module provides the integration between the MCP protocol and
//! the float-profile tool catalog using the rmcp framework.

pub mod service;

pub use service::FloatService;
