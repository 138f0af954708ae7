//! HTTP-addressable tool gateway.
//!
//! Tools declare their descriptors next to their implementations; the
//! server exposes them as metadata and dispatches `POST /tools/{name}`
//! calls. Per-tool secrets are read from this process's environment and
//! never leave it.

pub mod builtin;
pub mod server;
pub mod tool;

pub use builtin::{CurrentTimeTool, WebSearchTool};
pub use server::tool_router;
pub use tool::{Tool, ToolFailure, ToolRegistry};
