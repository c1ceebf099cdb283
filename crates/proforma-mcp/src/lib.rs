//! MCP (Model Context Protocol) server for proforma-tools.
//!
//! Exposes every Forms and Rank adapter operation as an individually
//! invocable tool over newline-delimited JSON-RPC on stdin/stdout. This layer
//! performs logging and error-to-JSON translation; the adapters themselves
//! never format user-facing text beyond error message content.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod transport;

pub use handlers::ToolHandler;
pub use server::McpServer;
