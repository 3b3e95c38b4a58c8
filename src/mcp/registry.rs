//! Member registration and convention-based discovery.
//!
//! A [`Service`] fills a [`Members`] table once, at construction. Every
//! entry is named like a method of the service: members called
//! `tool_<name>` become tools, members called `prompt_<name>` become prompts,
//! anything else stays private. Discovery scans the table for a prefix,
//! strips it, introspects the parameter list and parses the documentation
//! into a descriptor.
//!
//! ```
//! use umcp::mcp::registry::{Members, Service};
//!
//! struct Calculator;
//!
//! impl Service for Calculator {
//!     fn register(members: &mut Members<Self>) {
//!         members
//!             .member("tool_add", |_, args| {
//!                 Ok(args.get::<i64>("a")? + args.get::<i64>("b")?)
//!             })
//!             .doc("Add two numbers together.")
//!             .param::<i64>("a")
//!             .param::<i64>("b");
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CallError, IntrospectionError, RegistryError};
use crate::mcp::binder::Arguments;
use crate::mcp::docstring::{self, Categories};
use crate::mcp::schema::{introspect, InputSchema, JsonType, Param, SchemaType};

/// Name prefix of protocol-visible tools.
pub const TOOL_PREFIX: &str = "tool_";

/// Name prefix of protocol-visible prompts.
pub const PROMPT_PREFIX: &str = "prompt_";

/// Boxed future returned by suspending handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What every handler produces: a JSON value or a failure.
pub type HandlerResult = Result<Value, CallError>;

type ImmediateFn<S> = dyn Fn(&S, &Arguments) -> HandlerResult + Send + Sync;
type SuspendingFn<S> = dyn Fn(Arc<S>, Arguments) -> BoxFuture<HandlerResult> + Send + Sync;

/// A server object whose members are exposed over MCP.
pub trait Service: Send + Sync + Sized + 'static {
    /// Fills the registration table. Called once per server instance.
    fn register(members: &mut Members<Self>);

    /// Name reported in `serverInfo`. Defaults to the type's name without
    /// its path or generic arguments.
    fn name(&self) -> &str {
        let path = std::any::type_name::<Self>();
        path.split('<')
            .next()
            .unwrap_or(path)
            .rsplit("::")
            .next()
            .unwrap_or_default()
    }

    /// Usage instructions returned from `initialize`.
    fn instructions(&self) -> String {
        "This server provides tool functionality via the Model Context Protocol.".to_string()
    }
}

/// How a member runs.
enum Handler<S> {
    /// Returns before the dispatcher continues.
    Immediate(Box<ImmediateFn<S>>),
    /// Returns a future the dispatcher awaits to completion.
    Suspending(Box<SuspendingFn<S>>),
}

/// One entry of the registration table.
pub struct Member<S> {
    name: String,
    doc: String,
    params: Vec<Param>,
    categories: Option<Categories>,
    handler: Handler<S>,
}

impl<S> Member<S> {
    /// Full member name, including its prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the handler suspends.
    #[must_use]
    pub const fn is_suspending(&self) -> bool {
        matches!(self.handler, Handler::Suspending(_))
    }

    /// Runs the handler to completion.
    pub async fn invoke(&self, service: &Arc<S>, args: Arguments) -> HandlerResult {
        match &self.handler {
            Handler::Immediate(f) => f(service.as_ref(), &args),
            Handler::Suspending(f) => f(Arc::clone(service), args).await,
        }
    }
}

impl<S> std::fmt::Debug for Member<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("suspending", &self.is_suspending())
            .finish_non_exhaustive()
    }
}

/// Registration table of a service.
pub struct Members<S> {
    entries: Vec<Member<S>>,
}

impl<S: Send + Sync + 'static> Members<S> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a member whose handler returns immediately.
    pub fn member<F, R>(&mut self, name: &str, handler: F) -> MemberBuilder<'_, S>
    where
        F: Fn(&S, &Arguments) -> Result<R, CallError> + Send + Sync + 'static,
        R: Serialize,
    {
        let handler = move |service: &S, args: &Arguments| {
            handler(service, args)
                .and_then(|r| serde_json::to_value(r).map_err(CallError::Serialise))
        };
        self.push(name, Handler::Immediate(Box::new(handler)))
    }

    /// Registers a member whose handler suspends (performs awaited work).
    pub fn member_async<F, Fut, R>(&mut self, name: &str, handler: F) -> MemberBuilder<'_, S>
    where
        F: Fn(Arc<S>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CallError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = move |service: Arc<S>, args: Arguments| -> BoxFuture<HandlerResult> {
            let fut = handler(service, args);
            Box::pin(async move {
                fut.await
                    .and_then(|r| serde_json::to_value(r).map_err(CallError::Serialise))
            })
        };
        self.push(name, Handler::Suspending(Box::new(handler)))
    }

    fn push(&mut self, name: &str, handler: Handler<S>) -> MemberBuilder<'_, S> {
        self.entries.push(Member {
            name: name.to_string(),
            doc: String::new(),
            params: Vec::new(),
            categories: None,
            handler,
        });
        let index = self.entries.len() - 1;
        MemberBuilder {
            member: &mut self.entries[index],
        }
    }
}

impl<S> Members<S> {
    /// Member at `index`, as recorded in a descriptor.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Member<S>> {
        self.entries.get(index)
    }

    /// Number of registered members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rejects tables in which two members map to the same tool or prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] for the first collision.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for kind in [MemberKind::Tool, MemberKind::Prompt] {
            let mut seen = std::collections::HashSet::new();
            for entry in &self.entries {
                if let Some(name) = entry.name.strip_prefix(kind.prefix()) {
                    if !seen.insert(name) {
                        return Err(RegistryError::DuplicateName {
                            kind: kind.label(),
                            name: name.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl<S: Send + Sync + 'static> Default for Members<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent declaration of a member's documentation and parameters.
pub struct MemberBuilder<'a, S> {
    member: &'a mut Member<S>,
}

impl<S> MemberBuilder<'_, S> {
    /// Sets the documentation string (summary, detail, category lines).
    pub fn doc(self, doc: &str) -> Self {
        self.member.doc = doc.to_string();
        self
    }

    /// Declares a mandatory parameter of type `T`.
    pub fn param<T: SchemaType + ?Sized>(self, name: &str) -> Self {
        self.member.params.push(Param::required(name, T::JSON_TYPE));
        self
    }

    /// Declares an optional parameter of type `T` with a default.
    pub fn param_default<T: SchemaType + Serialize>(self, name: &str, default: T) -> Self {
        self.member
            .params
            .push(Param::with_default(name, T::JSON_TYPE, &default));
        self
    }

    /// Declares a mandatory parameter without a Rust type; advertised as a string.
    pub fn param_untyped(self, name: &str) -> Self {
        self.member
            .params
            .push(Param::required(name, JsonType::String));
        self
    }

    /// Attaches categories directly instead of parsing them from the
    /// documentation string.
    ///
    /// Compatibility shim: declaration lines in the doc are still stripped
    /// from the detail text but no longer contribute categories.
    pub fn categories<I, T>(self, categories: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.member.categories = Some(categories.into_iter().collect());
        self
    }
}

/// Which kind of protocol-visible member a prefix selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `tool_<name>`.
    Tool,
    /// `prompt_<name>`.
    Prompt,
}

impl MemberKind {
    /// Name prefix selecting this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Tool => TOOL_PREFIX,
            Self::Prompt => PROMPT_PREFIX,
        }
    }

    /// Lower-case label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
        }
    }
}

/// Discovered metadata of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Stripped name.
    pub name: String,
    /// One-line description.
    pub summary: String,
    /// Remaining documentation.
    pub detail: String,
    /// Input schema derived from the parameter list.
    pub input_schema: InputSchema,
    member: usize,
}

impl ToolDescriptor {
    /// Parameters the host must supply, in declaration order.
    #[must_use]
    pub fn required_params(&self) -> &[String] {
        self.input_schema.required()
    }

    /// Index of the backing member in the registration table.
    #[must_use]
    pub const fn member_index(&self) -> usize {
        self.member
    }
}

/// Discovered metadata of a prompt: a tool descriptor plus categories.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptDescriptor {
    /// Name, documentation and schema.
    pub descriptor: ToolDescriptor,
    /// Declared categories.
    pub categories: Categories,
}

/// A member that matched a prefix and introspected cleanly.
struct Discovered {
    descriptor: ToolDescriptor,
    categories: Categories,
}

fn scan<S>(members: &Members<S>, kind: MemberKind) -> impl Iterator<Item = Discovered> + '_ {
    members
        .entries
        .iter()
        .enumerate()
        .filter_map(move |(index, entry)| {
            let name = entry.name.strip_prefix(kind.prefix())?;
            if name.is_empty() {
                tracing::warn!(member = %entry.name, "Skipping {} with an empty name", kind.label());
                return None;
            }

            let input_schema = match introspect(&entry.params) {
                Ok(schema) => schema,
                Err(e) => {
                    log_excluded(&entry.name, &e);
                    return None;
                }
            };

            let meta = docstring::parse(&entry.doc);
            Some(Discovered {
                descriptor: ToolDescriptor {
                    name: name.to_string(),
                    summary: meta.summary,
                    detail: meta.detail,
                    input_schema,
                    member: index,
                },
                categories: entry.categories.clone().unwrap_or(meta.categories),
            })
        })
}

fn log_excluded(member: &str, error: &IntrospectionError) {
    tracing::warn!(member = %member, error = %error, "Excluding member with a malformed parameter list");
}

/// Discovers every `tool_<name>` member, keyed by stripped name.
#[must_use]
pub fn discover_tools<S>(members: &Members<S>) -> IndexMap<String, ToolDescriptor> {
    scan(members, MemberKind::Tool)
        .map(|found| (found.descriptor.name.clone(), found.descriptor))
        .collect()
}

/// Discovers every `prompt_<name>` member, keyed by stripped name.
#[must_use]
pub fn discover_prompts<S>(members: &Members<S>) -> IndexMap<String, PromptDescriptor> {
    scan(members, MemberKind::Prompt)
        .map(|found| {
            (
                found.descriptor.name.clone(),
                PromptDescriptor {
                    descriptor: found.descriptor,
                    categories: found.categories,
                },
            )
        })
        .collect()
}

/// Tools and prompts of one service, computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    tools: IndexMap<String, ToolDescriptor>,
    prompts: IndexMap<String, PromptDescriptor>,
}

impl Catalog {
    /// Runs discovery for both prefixes.
    #[must_use]
    pub fn discover<S>(members: &Members<S>) -> Self {
        let catalog = Self {
            tools: discover_tools(members),
            prompts: discover_prompts(members),
        };
        tracing::debug!(
            tools = catalog.tools.len(),
            prompts = catalog.prompts.len(),
            "Discovery complete"
        );
        catalog
    }

    /// Tools by stripped name, in registration order.
    #[must_use]
    pub const fn tools(&self) -> &IndexMap<String, ToolDescriptor> {
        &self.tools
    }

    /// Prompts by stripped name, in registration order.
    #[must_use]
    pub const fn prompts(&self) -> &IndexMap<String, PromptDescriptor> {
        &self.prompts
    }
}
