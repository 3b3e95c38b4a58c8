//! umcp: a minimal Model Context Protocol server runtime
//!
//! This library lets a program expose its functions to an AI host as MCP
//! tools and prompt templates, over JSON-RPC 2.0 on stdin/stdout.
//!
//! # Architecture
//!
//! A server object implements [`mcp::Service`] and registers its members by
//! name:
//!
//! - **`tool_<name>`**: invoked by `tools/call`; the result is shown to the host as text
//! - **`prompt_<name>`**: rendered by `prompts/get` into a list of chat messages
//!
//! Input schemas come from the declared parameter lists. Summaries, details
//! and prompt categories come from the documentation strings. Handlers may
//! return immediately or suspend; the dispatcher awaits both.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol implementation
//! - [`servers`]: Bundled demo services

pub mod config;
pub mod error;
pub mod mcp;
pub mod servers;
