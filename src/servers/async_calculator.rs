//! Calculator service mixing immediate and suspending tools.
//!
//! The `*_async` tools sleep to stand in for I/O-bound work; the dispatcher
//! awaits them exactly like the immediate ones.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::error::CallError;
use crate::mcp::binder::Arguments;
use crate::mcp::normalise::Message;
use crate::mcp::registry::{Members, Service};

/// Largest input accepted by `factorial_async`.
pub const FACTORIAL_LIMIT: u64 = 20;

/// Result of an arithmetic tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Computation {
    /// Operation name, e.g. `multiplication`.
    pub operation: &'static str,
    /// Inputs, by parameter name.
    pub inputs: Value,
    /// Result.
    pub result: Value,
    /// Whether the tool suspended.
    #[serde(rename = "async")]
    pub suspended: bool,
}

fn operands(args: &Arguments) -> Result<(f64, f64), CallError> {
    Ok((args.get("a")?, args.get("b")?))
}

fn factorial(n: u64) -> Result<u64, CallError> {
    if n > FACTORIAL_LIMIT {
        return Err(CallError::msg("Number too large for factorial calculation"));
    }
    Ok((1..=n).product())
}

/// Calculator whose slower operations suspend.
#[derive(Debug, Default)]
pub struct AsyncCalculatorServer;

impl Service for AsyncCalculatorServer {
    fn instructions(&self) -> String {
        "This server provides basic calculator functionality with async support for demonstration."
            .to_string()
    }

    #[allow(clippy::too_many_lines)]
    fn register(members: &mut Members<Self>) {
        members
            .member("tool_add", |_, args| {
                let (a, b) = operands(args)?;
                Ok(Computation {
                    operation: "addition",
                    inputs: json!({"a": a, "b": b}),
                    result: json!(a + b),
                    suspended: false,
                })
            })
            .doc("Add two numbers together (synchronous).")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member("tool_subtract", |_, args| {
                let (a, b) = operands(args)?;
                Ok(Computation {
                    operation: "subtraction",
                    inputs: json!({"a": a, "b": b}),
                    result: json!(a - b),
                    suspended: false,
                })
            })
            .doc("Subtract second number from first number (synchronous).")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member_async("tool_multiply_async", |_, args| async move {
                let (a, b) = operands(&args)?;
                sleep(Duration::from_millis(10)).await;
                Ok(Computation {
                    operation: "multiplication",
                    inputs: json!({"a": a, "b": b}),
                    result: json!(a * b),
                    suspended: true,
                })
            })
            .doc("Multiply two numbers (asynchronous with simulated delay).")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member_async("tool_divide_async", |_, args| async move {
                let (a, b) = operands(&args)?;
                if b == 0.0 {
                    return Err(CallError::msg("Division by zero is not allowed"));
                }
                sleep(Duration::from_millis(5)).await;
                Ok(Computation {
                    operation: "division",
                    inputs: json!({"a": a, "b": b}),
                    result: json!(a / b),
                    suspended: true,
                })
            })
            .doc("Divide first number by second number (asynchronous).")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member_async("tool_power_async", |_, args| async move {
                let base: f64 = args.get("base")?;
                let exponent: f64 = args.get("exponent")?;
                sleep(Duration::from_millis(20)).await;
                let result = base.powf(exponent);
                if !result.is_finite() {
                    return Err(CallError::msg("Invalid input for power operation"));
                }
                Ok(Computation {
                    operation: "power",
                    inputs: json!({"base": base, "exponent": exponent}),
                    result: json!(result),
                    suspended: true,
                })
            })
            .doc("Calculate base raised to the power of exponent (asynchronous).")
            .param::<f64>("base")
            .param::<f64>("exponent");

        members
            .member_async("tool_factorial_async", |_, args| async move {
                let n: u64 = args.get("n")?;
                let result = factorial(n)?;
                // Yield between chunks like a long computation would.
                for _ in (0..n).step_by(5) {
                    tokio::task::yield_now().await;
                }
                Ok(Computation {
                    operation: "factorial",
                    inputs: json!({"n": n}),
                    result: json!(result),
                    suspended: true,
                })
            })
            .doc("Calculate factorial of a number (asynchronous with yielding).")
            .param::<u64>("n");

        members
            .member("prompt_brainstorm", |_, args| {
                let topic: String = args.get("topic")?;
                let ideas: u32 = args.get("ideas")?;
                Ok(format!(
                    "Brainstorm {ideas} innovative ideas about '{topic}'. \
                     Provide short bullet points."
                ))
            })
            .doc(
                "Create a brainstorming prompt.
                Categories: ideation, creative
                Provide a single user message prompt body.",
            )
            .param::<String>("topic")
            .param_default("ideas", 3_u32);

        members
            .member_async("prompt_dialog_async", |_, args| async move {
                let persona: String = args.get("persona")?;
                sleep(Duration::from_millis(10)).await;
                Ok(vec![
                    Message::system(format!("You are acting as {persona}.")),
                    Message::user("Start a short dialog."),
                ])
            })
            .doc(
                "Return a list of messages (async version).
                [categories: conversation,test]
                Simulates async work while generating structured messages.",
            )
            .param_default("persona", "assistant");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factorial_bounds() {
        assert_eq!(factorial(0).unwrap(), 1);
        assert_eq!(factorial(5).unwrap(), 120);
        assert_eq!(factorial(FACTORIAL_LIMIT).unwrap(), 2_432_902_008_176_640_000);
        assert!(factorial(FACTORIAL_LIMIT + 1).is_err());
    }

    #[test]
    fn computation_serialises_async_flag() {
        let value = serde_json::to_value(Computation {
            operation: "addition",
            inputs: json!({"a": 1.0, "b": 2.0}),
            result: json!(3.0),
            suspended: false,
        })
        .unwrap();
        assert_eq!(value["async"], false);
        assert_eq!(value["result"], 3.0);
    }
}
