//! Change-aware, fail-fast pipeline executor
//!
//! Selection ([`plan`]) decides which nodes run, the [`executor`] walks them
//! in topological order through a [`runner::CommandRunner`], and
//! [`evidence`] records what happened.

#![allow(missing_docs)]

pub mod evidence;
pub mod executor;
pub mod plan;
pub mod runner;

pub use evidence::{FailureContext, RunState, RunStatus, RunSummary, Stage, TraceEvent};
pub use executor::{Executor, RunOptions, RunOutcome, RunReport};
pub use plan::{NodeState, Plan, Schedule, Selection};
pub use runner::{CommandOutput, CommandRunner, ShellRunner};
