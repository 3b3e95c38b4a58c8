//! Calculator service: four arithmetic tools and two prompts.

use serde::Serialize;

use crate::error::CallError;
use crate::mcp::binder::Arguments;
use crate::mcp::normalise::Message;
use crate::mcp::registry::{Members, Service};

/// Result of a binary arithmetic tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Operation name, e.g. `addition`.
    pub operation: &'static str,
    /// Left operand.
    pub a: f64,
    /// Right operand.
    pub b: f64,
    /// Result.
    pub result: f64,
}

fn operands(args: &Arguments) -> Result<(f64, f64), CallError> {
    Ok((args.get("a")?, args.get("b")?))
}

/// Basic calculator.
#[derive(Debug, Default)]
pub struct CalculatorServer;

impl CalculatorServer {
    fn binary(
        args: &Arguments,
        operation: &'static str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Operation, CallError> {
        let (a, b) = operands(args)?;
        Ok(Operation {
            operation,
            a,
            b,
            result: f(a, b),
        })
    }

    fn divide(args: &Arguments) -> Result<Operation, CallError> {
        let (a, b) = operands(args)?;
        if b == 0.0 {
            return Err(CallError::msg("Division by zero is not allowed"));
        }
        Ok(Operation {
            operation: "division",
            a,
            b,
            result: a / b,
        })
    }
}

impl Service for CalculatorServer {
    fn instructions(&self) -> String {
        "This server provides basic calculator functionality including addition, \
         subtraction, multiplication, and division."
            .to_string()
    }

    fn register(members: &mut Members<Self>) {
        members
            .member("tool_add", |_, args| Self::binary(args, "addition", |a, b| a + b))
            .doc("Add two numbers together.\n\nArgs:\n    a: First number\n    b: Second number")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member("tool_subtract", |_, args| {
                Self::binary(args, "subtraction", |a, b| a - b)
            })
            .doc("Subtract second number from first number.\n\nArgs:\n    a: Minuend\n    b: Subtrahend")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member("tool_multiply", |_, args| {
                Self::binary(args, "multiplication", |a, b| a * b)
            })
            .doc("Multiply two numbers.")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member("tool_divide", |_, args| Self::divide(args))
            .doc("Divide first number by second number.\n\nArgs:\n    a: Dividend\n    b: Divisor (cannot be zero)")
            .param::<f64>("a")
            .param::<f64>("b");

        members
            .member("prompt_code_review", |_, args| {
                let filename: String = args.get("filename")?;
                let issues: u32 = args.get("issues")?;
                Ok(format!(
                    "Please review the file '{filename}'. There are approximately {issues} \
                     known issues. Provide constructive feedback and improvement suggestions."
                ))
            })
            .doc(
                "Generate a code review prompt for a given file.
                Categories: code, review
                Args:
                    filename: Name of the file being reviewed
                    issues: Approximate number of known issues (for context)",
            )
            .param::<String>("filename")
            .param_default("issues", 0_u32);

        members
            .member("prompt_summary", |_, args| {
                let topic: String = args.get("topic")?;
                let bullets: u32 = args.get("bullets")?;
                Ok(vec![
                    Message::system("You are a precise technical summarizer."),
                    Message::user(format!(
                        "Summarize the topic '{topic}' in {bullets} concise bullet points."
                    )),
                ])
            })
            .doc(
                "Return a list of messages forming a summarization conversation.
                [categories: summary, documentation]
                Generates a system and user message for multi-turn style.",
            )
            .param::<String>("topic")
            .param_default("bullets", 5_u32);
    }
}
