//! Pipeline generator
//!
//! Reads a scenario catalog (compiling it first when pointed at the default
//! runtime directory), validates it and expands it into a pipeline document.
//! Synthetic mode skips the catalog entirely.

#![allow(missing_docs)]

pub mod catalog;
pub mod guard;
pub mod synthetic;
pub mod template;

pub use catalog::Catalog;
pub use guard::LayerGuard;
pub use synthetic::synthetic_pipeline;
pub use template::PipelineTemplate;

use std::path::PathBuf;
use tdag_compile::Compiler;
use tdag_core::error::{DagError, Result};
use tdag_core::{Pipeline, ProjectLayout};
use tracing::info;

/// Generator inputs; relative paths resolve against the project root
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Scenario directory to expand (default: the compiled directory)
    pub scenario_dir: Option<PathBuf>,
    /// Source scenarios used for auto-compile
    pub source_dir: Option<PathBuf>,
    /// Pipeline output file (default: `default.pipeline.yml`)
    pub out_file: Option<PathBuf>,
    pub dry_run: bool,
    pub synthetic_nodes: Option<i64>,
    pub no_compile: bool,
    pub enforce_layer_guard: bool,
    pub changed_files: Vec<String>,
}

/// What the generator produced
#[derive(Debug, Clone)]
pub struct Generated {
    pub pipeline: Pipeline,
    pub text: String,
    /// Destination file; `None` for dry runs
    pub written: Option<PathBuf>,
}

pub struct Generator {
    layout: ProjectLayout,
    template: PipelineTemplate,
    guard: LayerGuard,
}

impl Generator {
    /// Generator with environment-derived template and guard
    #[must_use]
    pub fn new(layout: ProjectLayout) -> Self {
        let guard = LayerGuard::from_env(layout.project_root(), layout.runtime_root().clone());
        Self {
            layout,
            template: PipelineTemplate::from_env(),
            guard,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: PipelineTemplate) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: LayerGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Build the pipeline and write it unless `dry_run` is set
    ///
    /// # Errors
    /// Returns compile, guard, schema, topology and IO errors
    pub fn generate(&self, options: &BuildOptions) -> Result<Generated> {
        let pipeline = match options.synthetic_nodes {
            Some(count) => {
                let count = usize::try_from(count)
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| {
                        DagError::usage(format!(
                            "--synthetic-nodes must be an integer >= 1 (got: {count})"
                        ))
                    })?;
                synthetic_pipeline(count)?
            }
            None => self.from_catalog(options)?,
        };
        pipeline.check_references()?;

        let text = pipeline.render();
        if options.dry_run {
            return Ok(Generated {
                pipeline,
                text,
                written: None,
            });
        }

        let out = options
            .out_file
            .as_ref()
            .map_or_else(|| self.layout.default_pipeline(), |p| self.layout.resolve(p));
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DagError::io(parent, e))?;
        }
        std::fs::write(&out, &text).map_err(|e| DagError::io(&out, e))?;
        info!(out = %out.display(), nodes = pipeline.nodes.len(), "pipeline written");
        Ok(Generated {
            pipeline,
            text,
            written: Some(out),
        })
    }

    fn from_catalog(&self, options: &BuildOptions) -> Result<Pipeline> {
        let compiled_dir = self.layout.compiled_scenarios();
        let scenario_dir = options
            .scenario_dir
            .as_ref()
            .map_or_else(|| compiled_dir.clone(), |p| self.layout.resolve(p));

        if !options.no_compile && scenario_dir == compiled_dir {
            let source_dir = options
                .source_dir
                .as_ref()
                .map_or_else(|| self.layout.source_scenarios(), |p| self.layout.resolve(p));
            if !source_dir.is_dir() {
                return Err(DagError::usage(format!(
                    "scenario source directory not found: {}",
                    source_dir.display()
                )));
            }
            let report =
                Compiler::new(self.layout.project_root(), &source_dir, &compiled_dir).compile()?;
            info!(files = report.check.files, "scenarios compiled before build");
        }

        if !scenario_dir.is_dir() {
            return Err(DagError::usage(format!(
                "scenario directory not found: {}",
                scenario_dir.display()
            )));
        }
        if options.enforce_layer_guard {
            self.guard.enforce(&options.changed_files)?;
        }

        let catalog = Catalog::load(&scenario_dir)?;
        Ok(self.template.expand(&catalog))
    }
}
