//! Handoff to the out-of-process benchmark runner
//!
//! The runner loads the bundle from disk, runs each action against every
//! engine version, and reports timings itself. The orchestrator only builds
//! its command line and waits for it.

use crate::config::CommandConfig;
use crate::error::BenchResult;
use crate::process::{CommandSpec, ProcessRunner};
use crate::versions::RunnableReference;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInvocation {
    pub bundle: PathBuf,
    pub versions: Vec<RunnableReference>,
    pub iterations: u32,
    pub warmup: u32,
}

impl RunnerInvocation {
    pub fn new(bundle: impl AsRef<Path>, versions: Vec<RunnableReference>) -> Self {
        Self {
            bundle: bundle.as_ref().to_path_buf(),
            versions,
            iterations: 1,
            warmup: 1,
        }
    }

    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn warmup(mut self, warmup: u32) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn command(&self, runner: &CommandConfig) -> CommandSpec {
        let mut spec = CommandSpec::new(runner.program.as_str())
            .args(runner.args.iter().cloned())
            .arg("--input")
            .arg(self.bundle.to_string_lossy())
            .arg("--iterations")
            .arg(self.iterations.to_string())
            .arg("--warmup")
            .arg(self.warmup.to_string());
        for version in &self.versions {
            spec = spec.arg("--version").arg(version.to_string());
        }
        spec
    }

    /// Launch the runner and block until it exits; nonzero exit is fatal.
    pub fn run(&self, runner: &CommandConfig, processes: &dyn ProcessRunner) -> BenchResult<()> {
        tracing::info!(
            bundle = %self.bundle.display(),
            versions = self.versions.len(),
            "starting benchmark runner"
        );
        processes.run(&self.command(runner))
    }
}
