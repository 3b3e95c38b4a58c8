//! Model Context Protocol (MCP) server runtime.
//!
//! Exposes the members of a [`Service`] as MCP tools and prompts. The server
//! communicates over a newline-delimited stdio transport using JSON-RPC 2.0
//! messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            McpServer                             │
//! │                                                                  │
//! │  ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐  │
//! │  │ Transport │──▶│ protocol │──▶│ dispatch │──▶│   binder    │  │
//! │  │  (lines)  │   │ (decode) │   │ (state)  │   │ (arguments) │  │
//! │  └───────────┘   └──────────┘   └──────────┘   └─────────────┘  │
//! │        ▲                             │                │          │
//! │        │                             ▼                ▼          │
//! │        │                      ┌────────────┐   ┌─────────────┐  │
//! │        └──────────────────────│ normalise  │◀──│   members   │  │
//! │                               │ (results)  │   │  (handlers) │  │
//! │                               └────────────┘   └─────────────┘  │
//! │                                                                  │
//! │  registry: Members ──▶ schema + docstring ──▶ Catalog (cached)   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod binder;
pub mod docstring;
pub mod normalise;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod transport;

pub use binder::Arguments;
pub use normalise::{Content, Message, PromptReturn};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::{Catalog, Members, PromptDescriptor, Service, ToolDescriptor};
pub use server::{McpServer, ServerState};
pub use transport::{BlockingTransport, LineTransport, StdioTransport};
