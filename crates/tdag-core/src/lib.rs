//! tdd-dag core
//!
//! Shared building blocks for the three pipeline stages:
//! - [`scenario`]: scenario records and schema validation
//! - [`pipeline`]: pipeline documents (render/parse)
//! - [`hash`]: SHA-256 content hashes for provenance
//! - [`config`]: runtime root and on-disk layout
//! - [`glob`]: change-path matching
//!
//! Stages never share in-memory state; they hand files to each other using
//! the formats defined here.

#![allow(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod glob;
pub mod hash;
pub mod logging;
pub mod pipeline;
pub mod scenario;
pub mod text;
pub mod vcs;

pub use config::{ProjectLayout, RuntimeRoot};
pub use error::{DagError, ErrorKind, IntegrityError, Result};
pub use glob::GlobSet;
pub use hash::ContentHash;
pub use pipeline::{Pipeline, PipelineNode};
pub use scenario::{Scenario, ScenarioDocument, StabilityLayer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
