//! Benchmark pipeline sequencing
//!
//! One run: locate the codebase, prepare it, obtain an input bundle (from the
//! cache if possible), resolve engine versions, hand both to the runner, and
//! optionally remove the checkout. Each stage finishes before the next starts
//! and the first failure aborts the run.

use crate::builder::InputBundleBuilder;
use crate::bundle::BundleConfig;
use crate::cache::{CacheLookup, InputsCache};
use crate::case::{CaseDescription, CodebaseSource};
use crate::checkout::{CodebaseCheckout, GitCheckout};
use crate::config::BenchConfig;
use crate::crack::CommandCracker;
use crate::error::{BenchError, BenchResult};
use crate::process::{CommandSpec, ProcessRunner};
use crate::runner::RunnerInvocation;
use crate::versions::{RunnableReference, VersionResolver, VersionSpec};
use std::path::{Component, Path, PathBuf};

/// Per-run switches
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub case_file: PathBuf,
    pub versions: Vec<VersionSpec>,
    /// Prepare inputs and versions but do not launch the runner
    pub dry_run: bool,
    /// Delete the codebase checkout afterwards (git codebases only)
    pub cleanup: bool,
    pub force_rebuild: bool,
}

impl RunOptions {
    pub fn new(case_file: impl Into<PathBuf>, versions: Vec<VersionSpec>) -> Self {
        Self {
            case_file: case_file.into(),
            versions,
            ..Self::default()
        }
    }
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub codebase_root: PathBuf,
    pub bundle: PathBuf,
    pub cache_hit: bool,
    pub versions: Vec<RunnableReference>,
    pub runner_launched: bool,
    pub cleaned_up: bool,
}

#[derive(Debug)]
pub struct Orchestrator<'a> {
    config: BenchConfig,
    processes: &'a dyn ProcessRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: BenchConfig, processes: &'a dyn ProcessRunner) -> Self {
        Self { config, processes }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn cache(&self) -> InputsCache {
        InputsCache::new(&self.config.cache_dir)
    }

    pub fn run(&self, options: &RunOptions) -> BenchResult<RunOutcome> {
        // Configuration errors surface before anything touches disk or spawns.
        let case = CaseDescription::load(&options.case_file)?;
        let source = case.codebase_source()?;
        if options.versions.is_empty() {
            return Err(BenchError::NoVersions);
        }

        let (codebase_root, from_git) = match source {
            CodebaseSource::Git(repo) => {
                let checkout = GitCheckout::new(&self.config.checkout_dir, self.processes);
                (checkout.ensure_checked_out(repo)?, true)
            }
            CodebaseSource::Local(path) => {
                tracing::info!(path = %path.display(), "using local codebase");
                (path.to_path_buf(), false)
            }
        };

        self.prepare(&case, &codebase_root)?;

        let builder = InputBundleBuilder::new(
            CommandCracker::new(self.config.cracker.clone(), self.processes),
            BundleConfig {
                project_cache_size: self.config.project_cache_size,
            },
        );
        let lookup =
            self.cache()
                .lookup_or_build(&options.case_file, &case, &codebase_root, &builder)?;
        let cache_hit = matches!(lookup, CacheLookup::Hit(_));
        let bundle = lookup.into_path();

        let versions = VersionResolver::new(
            &self.config.checkout_dir,
            self.config.package.clone(),
            self.processes,
        )
        .force_rebuild(options.force_rebuild)
        .resolve(&options.versions)?;

        let runner_launched = if options.dry_run {
            tracing::info!(bundle = %bundle.display(), "dry run; not launching runner");
            false
        } else {
            RunnerInvocation::new(&bundle, versions.clone())
                .iterations(self.config.iterations)
                .warmup(self.config.warmup)
                .run(&self.config.runner, self.processes)?;
            true
        };

        let cleaned_up = options.cleanup && from_git;
        if cleaned_up {
            remove_checkout(&self.config.checkout_dir, &codebase_root)?;
        } else if options.cleanup {
            tracing::info!("local codebase is never removed; skipping cleanup");
        }

        Ok(RunOutcome {
            codebase_root,
            bundle,
            cache_hit,
            versions,
            runner_launched,
            cleaned_up,
        })
    }

    /// Run prep commands in declared order inside the codebase root.
    fn prepare(&self, case: &CaseDescription, root: &Path) -> BenchResult<()> {
        for prep in case.prep_commands() {
            let spec = CommandSpec::new(prep.command.as_str())
                .args(prep.args.iter().cloned())
                .current_dir(root);
            tracing::info!(command = %spec.display(), "preparing codebase");
            self.processes.run(&spec)?;
        }
        Ok(())
    }
}

/// Delete a checkout, but only one strictly below `checkout_dir`.
fn remove_checkout(checkout_dir: &Path, root: &Path) -> BenchResult<()> {
    let escapes = root
        .strip_prefix(checkout_dir)
        .map(|rest| {
            rest.as_os_str().is_empty()
                || rest.components().any(|c| !matches!(c, Component::Normal(_)))
        })
        .unwrap_or(true);
    if escapes {
        return Err(BenchError::CleanupOutsideCheckout {
            path: root.to_path_buf(),
            checkout_dir: checkout_dir.to_path_buf(),
        });
    }
    tracing::info!(path = %root.display(), "removing checkout");
    std::fs::remove_dir_all(root).map_err(|e| BenchError::io(root, e))
}
