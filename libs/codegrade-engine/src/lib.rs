//! Compile-and-run engine: one job in, one [`ExecutionResult`] out.
//!
//! [`ExecutionResult`]: codegrade_common::types::ExecutionResult

pub mod compiler;
pub mod engine;
pub mod output;
pub mod result;
pub mod runner;
pub mod sequencer;
pub mod toolchain;


pub use engine::{ExecutionEngine, Phase};
pub use toolchain::{CommandSpec, ConfiguredToolchain, Toolchain, ToolchainRegistry};
