//! A small task-graph runner.
//!
//! Tasks are declared with their predecessors, the directories they need, an activity switch
//! and their input selection.  Jobs are derived from the file system when a task is reached,
//! skipped when their outputs are up to date, and run in parallel on a thread pool.

#[macro_use]
extern crate error_chain;

#[macro_use]
extern crate slog;

pub mod context;
pub mod graph;
pub mod pattern;
pub mod runner;
pub mod statement;
pub mod task;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use crate::context::Context;
pub use crate::errors::*;
pub use crate::graph::Pipeline;
pub use crate::pattern::FilePattern;
pub use crate::statement::Statement;
pub use crate::task::{Job, Task};
