//! MCP facade for the xRegistry bridge.
//!
//! Exposes the Model Context Protocol registry as the `mcpproviders`
//! group; server entries become `servers` resources.

pub mod facade;
pub mod registry;

pub use facade::{DEFAULT_SERVERS_ESTIMATE, McpFacade};
pub use registry::{MCP_BASE, McpClient};
