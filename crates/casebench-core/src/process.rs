//! Process abstraction for testability
//!
//! Every external step of the pipeline (codebase prep, git, package builds,
//! the project cracker, the runner) goes through the [`ProcessRunner`] trait.
//! Production code uses [`SystemProcessRunner`]; tests use
//! [`MockProcessRunner`], which records invocations and replays scripted
//! results instead of spawning anything.
//!
//! Processes inherit the orchestrator's stdio unless output is captured. A
//! nonzero exit is always reported as [`BenchError::CommandFailed`]; there are
//! no retries.

use crate::error::{BenchError, BenchResult};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::RwLock;

/// A fully specified process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by its arguments, space separated
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

/// Trait for launching external processes.
///
/// `Send + Sync` so engine revisions can be built in parallel.
pub trait ProcessRunner: Send + Sync + std::fmt::Debug {
    /// Run to completion with inherited stdio; nonzero exit is an error.
    fn run(&self, spec: &CommandSpec) -> BenchResult<()>;

    /// Run to completion capturing stdout; nonzero exit is an error.
    fn output(&self, spec: &CommandSpec) -> BenchResult<String>;
}

/// Spawns real OS processes and blocks on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, spec: &CommandSpec) -> BenchResult<()> {
        tracing::info!(command = %spec.display(), cwd = ?spec.cwd, "running");
        let status = spec
            .to_command()
            .status()
            .map_err(|e| BenchError::CommandSpawn {
                program: spec.program.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BenchError::CommandFailed {
                program: spec.program.clone(),
                code: status.code(),
            })
        }
    }

    fn output(&self, spec: &CommandSpec) -> BenchResult<String> {
        tracing::info!(command = %spec.display(), cwd = ?spec.cwd, "running (captured)");
        let output = spec
            .to_command()
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| BenchError::CommandSpawn {
                program: spec.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(BenchError::CommandFailed {
                program: spec.program.clone(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Scripted result for the mock runner.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Success { stdout: String },
    Exit { code: i32 },
}

/// Mock process runner for testing.
///
/// Records every invocation. Results are looked up by program name: queued
/// outcomes are consumed in order, and a program with nothing queued
/// succeeds with empty output.
#[derive(Debug, Default)]
pub struct MockProcessRunner {
    invocations: RwLock<Vec<CommandSpec>>,
    outcomes: RwLock<HashMap<String, VecDeque<MockOutcome>>>,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue stdout for the next successful run of `program`
    pub fn push_stdout(&self, program: &str, stdout: impl Into<String>) {
        self.push(
            program,
            MockOutcome::Success {
                stdout: stdout.into(),
            },
        );
    }

    /// Make the next run of `program` exit with `code`; zero is success
    pub fn push_exit(&self, program: &str, code: i32) {
        self.push(program, MockOutcome::Exit { code });
    }

    fn push(&self, program: &str, outcome: MockOutcome) {
        let mut outcomes = self.outcomes.write().expect("MockProcessRunner lock poisoned");
        outcomes
            .entry(program.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations
            .read()
            .expect("MockProcessRunner lock poisoned")
            .clone()
    }

    /// Invocations of one program, in order
    pub fn invocations_of(&self, program: &str) -> Vec<CommandSpec> {
        self.invocations()
            .into_iter()
            .filter(|spec| spec.program == program)
            .collect()
    }

    fn record(&self, spec: &CommandSpec) -> BenchResult<String> {
        self.invocations
            .write()
            .expect("MockProcessRunner lock poisoned")
            .push(spec.clone());

        let next = self
            .outcomes
            .write()
            .expect("MockProcessRunner lock poisoned")
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front);

        match next {
            None => Ok(String::new()),
            Some(MockOutcome::Success { stdout }) => Ok(stdout),
            Some(MockOutcome::Exit { code: 0 }) => Ok(String::new()),
            Some(MockOutcome::Exit { code }) => Err(BenchError::CommandFailed {
                program: spec.program.clone(),
                code: Some(code),
            }),
        }
    }
}

impl ProcessRunner for MockProcessRunner {
    fn run(&self, spec: &CommandSpec) -> BenchResult<()> {
        self.record(spec).map(|_| ())
    }

    fn output(&self, spec: &CommandSpec) -> BenchResult<String> {
        self.record(spec)
    }
}
