//! BUSY is a declarative build system for C/C++ projects: a tree of
//! `BUSY` files declares products (executables, libraries, code
//! generators, copies, scripts); the evaluator resolves them into a
//! typed record graph, the command generator derives a grouped
//! operation list for the selected toolchain and target, and the
//! build runner executes it on a bounded worker pool with freshness
//! tracking.
//!
//! The phases are deliberately separable: [`ops::parse_project`]
//! evaluates, [`core::build::generate`] plans,
//! [`ops::build_project`] runs. Embedders that only need the product
//! graph (an IDE code model, say) stop after the first phase.

pub use crate::core::build::{
    BuildConfig, DepSnapshot, Executor, Operation, ProcessResult, Reporter,
};
pub use crate::core::session::{BuildMode, BuildParams, Session, TargetOs, Toolchain};
pub use crate::util::errors::BusyResult;
pub use crate::util::CancelToken;

pub mod core;
pub mod ops;
pub mod syntax;
pub mod util;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
