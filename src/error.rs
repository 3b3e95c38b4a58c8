//! Error types for umcp.
//!
//! Each concern has its own enum. The dispatcher folds the per-request ones
//! into [`DispatchError`], which knows its JSON-RPC error code.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::protocol::ErrorCode;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// A member's parameter list could not be turned into a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntrospectionError {
    /// A parameter was declared with an empty name.
    #[error("parameter #{position} has an empty name")]
    EmptyParamName {
        /// Zero-based position in the declaration.
        position: usize,
    },

    /// Two parameters share a name.
    #[error("parameter '{0}' is declared more than once")]
    DuplicateParam(String),

    /// A default value could not be serialised to JSON.
    #[error("default for parameter '{param}' is not representable as JSON: {message}")]
    UnserialisableDefault {
        /// Parameter name.
        param: String,
        /// Serialiser message.
        message: String,
    },
}

/// The registration table of a service is unusable.
///
/// Raised while constructing a server, before the transport starts reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two members normalise to the same protocol-visible name.
    #[error("{kind} '{name}' is registered more than once")]
    DuplicateName {
        /// "tool" or "prompt".
        kind: &'static str,
        /// The stripped name.
        name: String,
    },
}

/// Incoming arguments do not fit a member's schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A parameter without a default was not supplied.
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// `arguments` was present but not a JSON object.
    #[error("arguments must be an object, got {0}")]
    NotAnObject(&'static str),
}

/// Failure raised by a tool or prompt handler while it runs.
#[derive(Error, Debug)]
pub enum CallError {
    /// A bound argument could not be converted to the type the handler asked for.
    #[error("argument '{name}' has the wrong type: {source}")]
    ArgumentType {
        /// Parameter name.
        name: String,
        /// The underlying conversion error.
        #[source]
        source: serde_json::Error,
    },

    /// The handler asked for a parameter it never declared.
    #[error("argument '{0}' is not declared")]
    Undeclared(String),

    /// The handler's return value could not be converted to JSON.
    #[error("failed to serialise result: {0}")]
    Serialise(#[source] serde_json::Error),

    /// Handler-defined failure.
    #[error("{0}")]
    Failed(String),
}

impl CallError {
    /// Creates a handler-defined failure.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A request could not be answered with a result.
///
/// Tool handler failures never show up here; they become `isError` results.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A method other than `initialize` arrived before initialisation.
    #[error("Server not initialised")]
    NotInitialised,

    /// Unknown JSON-RPC method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// `tools/call` named an unknown tool.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// `prompts/get` named an unknown prompt.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Malformed `params`.
    #[error("{0}")]
    InvalidParams(String),

    /// Arguments did not bind.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// A prompt handler failed.
    #[error("Prompt execution error for {name}: {source}")]
    PromptExecution {
        /// Stripped prompt name.
        name: String,
        /// What the handler raised.
        #[source]
        source: CallError,
    },

    /// Anything else that went wrong inside the server.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Returns the JSON-RPC error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialised => ErrorCode::InvalidRequest,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) | Self::PromptNotFound(_) => {
                ErrorCode::MethodNotFound
            }
            Self::InvalidParams(_) | Self::Bind(_) => ErrorCode::InvalidParams,
            Self::PromptExecution { .. } | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Structured detail attached to the error response, if any.
    #[must_use]
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Bind(BindError::MissingArgument(name)) => Some(json!({ "argument": name })),
            Self::ToolNotFound(name) => Some(json!({ "tool": name })),
            Self::PromptNotFound(name) => Some(json!({ "prompt": name })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn dispatch_error_codes() {
        assert_eq!(DispatchError::NotInitialised.code().code(), -32600);
        assert_eq!(DispatchError::ToolNotFound("x".into()).code().code(), -32601);
        assert_eq!(DispatchError::PromptNotFound("x".into()).code().code(), -32601);
        assert_eq!(
            DispatchError::from(BindError::MissingArgument("a".into()))
                .code()
                .code(),
            -32602
        );
        assert_eq!(
            DispatchError::PromptExecution {
                name: "p".into(),
                source: CallError::msg("boom"),
            }
            .code()
            .code(),
            -32603
        );
    }

    #[test]
    fn missing_argument_carries_name() {
        let error = DispatchError::from(BindError::MissingArgument("filename".into()));
        assert_eq!(error.to_string(), "Missing required argument: filename");
        assert_eq!(error.data(), Some(json!({ "argument": "filename" })));
    }
}
