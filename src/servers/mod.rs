//! Bundled demo services.
//!
//! Each one is a complete [`Service`](crate::mcp::Service) that can be run
//! from the command line and doubles as a usage example.

pub mod async_calculator;
pub mod calculator;
pub mod movie;

pub use async_calculator::AsyncCalculatorServer;
pub use calculator::CalculatorServer;
pub use movie::MovieServer;
