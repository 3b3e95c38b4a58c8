//! MCP server: protocol state machine and request dispatch.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: `initialize` moves the server to [`ServerState::Ready`]
//! 2. **Operation**: listing and invoking tools, listing and rendering prompts
//! 3. **Shutdown**: end of input, or SIGINT/SIGTERM between requests
//!
//! # Execution models
//!
//! [`McpServer::run`] and [`McpServer::serve`] drive the transport on the
//! caller's async runtime. [`McpServer::run_blocking`] and
//! [`McpServer::serve_blocking`] read with blocking I/O and drive each
//! request to completion before reading the next. Both go through
//! [`McpServer::handle_line`], so the observable protocol is the same.
//!
//! Requests are handled strictly one at a time, in arrival order.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::{DispatchError, RegistryError};
use crate::mcp::binder;
use crate::mcp::normalise::{Content, PromptReturn};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId, MCP_PROTOCOL_VERSION,
};
use crate::mcp::registry::{Catalog, Members, PromptDescriptor, Service, ToolDescriptor};
use crate::mcp::transport::{BlockingTransport, LineTransport, StdioTransport};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for `initialize`.
    Uninitialised,
    /// Serving requests.
    Ready,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ListCapability,
    /// Prompt-related capabilities.
    pub prompts: ListCapability,
}

/// Capability flags of a listable primitive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by the client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters shared by `tools/call` and `prompts/get`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedCallParams {
    /// Tool or prompt name.
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments; `null` counts as absent.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<Content>,
    /// Whether the tool failed. Always serialised.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }
}

/// Text shown to the host for a tool's return value.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Decodes `params`; absent or `null` gives the default.
fn decode_params<T: DeserializeOwned + Default>(
    method: &str,
    params: Option<Value>,
) -> Result<T, DispatchError> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| DispatchError::InvalidParams(format!("Invalid {method} params: {e}"))),
    }
}

fn required_name(params: &NamedCallParams) -> Result<&str, DispatchError> {
    params
        .name
        .as_deref()
        .ok_or_else(|| DispatchError::InvalidParams("Missing 'name' parameter".to_string()))
}

/// Builds the error reply for a failed request.
fn error_reply(id: Option<RequestId>, error: &DispatchError) -> JsonRpcError {
    let mut data = JsonRpcErrorData::with_message(error.code(), error.to_string());
    if let Some(detail) = error.data() {
        data = data.with_data(detail);
    }
    JsonRpcError::new(id, data)
}

fn tool_listing(tool: &ToolDescriptor) -> Value {
    json!({
        "name": tool.name,
        "description": tool.summary,
        "inputSchema": tool.input_schema,
    })
}

fn prompt_listing(prompt: &PromptDescriptor) -> Value {
    let schema = &prompt.descriptor.input_schema;
    let arguments: Vec<Value> = schema
        .properties()
        .keys()
        .map(|name| json!({ "name": name, "required": schema.is_required(name) }))
        .collect();

    json!({
        "name": prompt.descriptor.name,
        "description": prompt.descriptor.summary,
        "inputSchema": schema,
        "categories": prompt.categories,
        "arguments": arguments,
    })
}

/// An MCP server hosting one [`Service`].
pub struct McpServer<S: Service> {
    /// Current server state.
    state: ServerState,
    /// The hosted service.
    service: Arc<S>,
    /// Registration table, filled once by [`Service::register`].
    members: Members<S>,
    /// Discovered tools and prompts, computed on first use.
    catalog: OnceLock<Catalog>,
    /// Reported in `serverInfo`.
    info: ServerInfo,
    /// Returned from `initialize`.
    instructions: String,
    /// Protocol version the client asked for, if any.
    client_protocol: Option<String>,
}

impl<S: Service> McpServer<S> {
    /// Creates a server around `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if two members map to the
    /// same tool or prompt name.
    pub fn new(service: S) -> Result<Self, RegistryError> {
        let mut members = Members::new();
        S::register(&mut members);
        members.validate()?;

        tracing::debug!(members = members.len(), "Service registered");

        Ok(Self {
            state: ServerState::Uninitialised,
            info: ServerInfo::named(service.name()),
            instructions: service.instructions(),
            service: Arc::new(service),
            members,
            catalog: OnceLock::new(),
            client_protocol: None,
        })
    }

    /// Overrides the name reported in `serverInfo`.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    /// Overrides the instructions returned from `initialize`.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Server name and version.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Protocol version the client requested during `initialize`.
    #[must_use]
    pub fn client_protocol(&self) -> Option<&str> {
        self.client_protocol.as_deref()
    }

    /// The hosted service.
    #[must_use]
    pub const fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Discovered tools and prompts. Discovery runs on the first call.
    pub fn catalog(&self) -> &Catalog {
        self.catalog.get_or_init(|| Catalog::discover(&self.members))
    }

    /// Tools by name, in registration order.
    pub fn tools(&self) -> &IndexMap<String, ToolDescriptor> {
        self.catalog().tools()
    }

    /// Prompts by name, in registration order.
    pub fn prompts(&self) -> &IndexMap<String, PromptDescriptor> {
        self.catalog().prompts()
    }

    /// Handles one line of input and returns the reply, if any.
    ///
    /// Notifications produce no reply. Undecodable input produces an error
    /// reply addressed to `null`.
    pub async fn handle_line(&mut self, line: &str) -> Option<OutgoingMessage> {
        tracing::trace!(line = %line, "Received");
        match parse_message(line) {
            Ok(message) => self.handle_message(message).await,
            Err(error) => {
                tracing::warn!(
                    code = error.error.code,
                    detail = %error.error.message,
                    "Rejected malformed message"
                );
                Some(error.into())
            }
        }
    }

    /// Handles a decoded message and returns the reply, if any.
    pub async fn handle_message(&mut self, message: IncomingMessage) -> Option<OutgoingMessage> {
        match message {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
        }
    }

    async fn handle_request(&mut self, req: JsonRpcRequest) -> OutgoingMessage {
        tracing::debug!(method = %req.method, id = %req.id, "Handling request");

        match self.route(&req.method, req.params).await {
            Ok(result) => JsonRpcResponse::success(req.id, result).into(),
            Err(error) => {
                tracing::warn!(method = %req.method, id = %req.id, error = %error, "Request failed");
                error_reply(Some(req.id), &error).into()
            }
        }
    }

    async fn handle_notification(&mut self, notif: JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("Client reported initialisation complete");
            }
            "notifications/cancelled" => {
                tracing::debug!("Ignoring cancellation; requests always run to completion");
            }
            method => match self.route(method, notif.params).await {
                Ok(_) => tracing::debug!(method = %method, "Notification processed"),
                Err(error) => {
                    tracing::debug!(method = %method, error = %error, "Notification failed");
                }
            },
        }
    }

    /// Dispatches one method call.
    async fn route(&mut self, method: &str, params: Option<Value>) -> Result<Value, DispatchError> {
        if method == "initialize" {
            return self.handle_initialize(params);
        }
        if self.state != ServerState::Ready {
            return Err(DispatchError::NotInitialised);
        }

        match method {
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(params).await,
            "prompts/list" => Ok(self.handle_prompts_list()),
            "prompts/get" => self.handle_prompts_get(params).await,
            _ => Err(DispatchError::MethodNotFound(method.to_string())),
        }
    }

    /// Handles the initialize request. Allowed again once ready.
    fn handle_initialize(&mut self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: InitializeParams = decode_params("initialize", params)?;

        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
                "Initialising"
            );
        }

        self.client_protocol = params.protocol_version;
        self.state = ServerState::Ready;

        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": self.info,
            "instructions": self.instructions,
        }))
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = self.tools().values().map(tool_listing).collect();
        json!({ "tools": tools })
    }

    fn handle_prompts_list(&self) -> Value {
        let prompts: Vec<Value> = self.prompts().values().map(prompt_listing).collect();
        json!({ "prompts": prompts })
    }

    /// Handles the tools/call request.
    ///
    /// Lookup and binding failures are protocol errors; anything the tool
    /// itself raises becomes an `isError` result.
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: NamedCallParams = decode_params("tools/call", params)?;
        let name = required_name(&params)?;

        let tool = self
            .tools()
            .get(name)
            .ok_or_else(|| DispatchError::ToolNotFound(name.to_string()))?;
        let args = binder::bind(&tool.input_schema, params.arguments.as_ref())?;

        tracing::info!(tool = %name, "Calling tool");

        let result = match self.invoke(tool.member_index(), args).await {
            Ok(Value::Null) => {
                tracing::warn!(tool = %name, "Tool returned no result");
                ToolCallResult::error(format!("Tool execution error for {name}: no result"))
            }
            Ok(value) => ToolCallResult::text(stringify(&value)),
            Err(error) => {
                tracing::warn!(tool = %name, error = %error, "Tool failed");
                ToolCallResult::error(error.to_string())
            }
        };

        serde_json::to_value(&result)
            .map_err(|e| DispatchError::Internal(format!("failed to serialise result: {e}")))
    }

    /// Handles the prompts/get request.
    ///
    /// Without `arguments` only the metadata is returned and the prompt is
    /// not rendered.
    async fn handle_prompts_get(&self, params: Option<Value>) -> Result<Value, DispatchError> {
        let params: NamedCallParams = decode_params("prompts/get", params)?;
        let name = required_name(&params)?;

        let prompt = self
            .prompts()
            .get(name)
            .ok_or_else(|| DispatchError::PromptNotFound(name.to_string()))?;

        let Some(arguments) = params.arguments.as_ref() else {
            return Ok(json!({
                "description": prompt.descriptor.summary,
                "categories": prompt.categories,
            }));
        };

        let args = binder::bind(&prompt.descriptor.input_schema, Some(arguments))?;

        tracing::info!(prompt = %name, "Rendering prompt");

        let value = self
            .invoke(prompt.descriptor.member_index(), args)
            .await
            .map_err(|source| DispatchError::PromptExecution {
                name: name.to_string(),
                source,
            })?;

        let normalised = PromptReturn::classify(value).normalise();

        let mut result: Map<String, Value> = normalised.extra;
        result.insert("description".into(), json!(prompt.descriptor.summary));
        result.insert("categories".into(), json!(prompt.categories));
        result.insert("messages".into(), Value::Array(normalised.messages));
        Ok(Value::Object(result))
    }

    async fn invoke(
        &self,
        index: usize,
        args: binder::Arguments,
    ) -> Result<Value, crate::error::CallError> {
        let member = self
            .members
            .get(index)
            .ok_or_else(|| crate::error::CallError::msg("member is no longer registered"))?;
        member.invoke(&self.service, args).await
    }

    /// Serves stdin/stdout until end of input or a shutdown signal.
    ///
    /// A request that is being handled when the signal arrives is finished
    /// and answered first.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut transport = StdioTransport::stdio();
        self.run_with_shutdown(&mut transport).await
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, shutting down");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    return Ok(());
                }

                line = transport.read_line() => {
                    let Some(line) = line? else {
                        tracing::info!("Input closed, shutting down");
                        return Ok(());
                    };
                    self.answer(transport, &line).await?;
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    return Ok(());
                }

                line = transport.read_line() => {
                    let Some(line) = line? else {
                        tracing::info!("Input closed, shutting down");
                        return Ok(());
                    };
                    self.answer(transport, &line).await?;
                }
            }
        }
    }

    /// Serves a transport until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = transport.read_line().await? {
            self.answer(transport, &line).await?;
        }
        Ok(())
    }

    async fn answer<R, W>(&mut self, transport: &mut LineTransport<R, W>, line: &str) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if line.trim().is_empty() {
            return Ok(());
        }
        match self.handle_line(line).await {
            Some(reply) => transport.write_message(&reply).await,
            None => Ok(()),
        }
    }

    /// Serves stdin/stdout with blocking I/O until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub fn run_blocking(&mut self) -> io::Result<()> {
        let mut transport = BlockingTransport::stdio();
        self.serve_blocking(&mut transport)?;
        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Serves a blocking transport until end of input.
    ///
    /// Suspending handlers are driven to completion on a private
    /// current-thread runtime before the next line is read.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created or transport I/O
    /// fails.
    pub fn serve_blocking<R: BufRead, W: Write>(
        &mut self,
        transport: &mut BlockingTransport<R, W>,
    ) -> io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        while let Some(line) = transport.read_line()? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(reply) = runtime.block_on(self.handle_line(&line)) {
                transport.write_message(&reply)?;
            }
        }
        Ok(())
    }
}
