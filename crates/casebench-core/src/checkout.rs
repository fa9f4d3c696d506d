//! Git checkouts of codebases and engine revisions

use crate::case::RepoSpec;
use crate::error::{BenchError, BenchResult};
use crate::process::{CommandSpec, ProcessRunner};
use std::path::{Component, Path, PathBuf};

/// Produces a local working tree for a pinned repository.
pub trait CodebaseCheckout {
    fn ensure_checked_out(&self, repo: &RepoSpec) -> BenchResult<PathBuf>;
}

/// Clones into `<base>/<name>` when absent, then checks out the revision.
#[derive(Debug)]
pub struct GitCheckout<'a> {
    base_dir: PathBuf,
    processes: &'a dyn ProcessRunner,
}

impl<'a> GitCheckout<'a> {
    pub fn new(base_dir: impl Into<PathBuf>, processes: &'a dyn ProcessRunner) -> Self {
        Self {
            base_dir: base_dir.into(),
            processes,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/<name>`; `name` must be a single plain directory name.
    pub fn checkout_path(&self, name: &str) -> BenchResult<PathBuf> {
        validate_checkout_name(name)?;
        Ok(self.base_dir.join(name))
    }
}

impl CodebaseCheckout for GitCheckout<'_> {
    fn ensure_checked_out(&self, repo: &RepoSpec) -> BenchResult<PathBuf> {
        let dir = self.checkout_path(&repo.name)?;

        if dir.exists() {
            tracing::info!(path = %dir.display(), "reusing existing checkout");
        } else {
            std::fs::create_dir_all(&self.base_dir)
                .map_err(|e| BenchError::io(&self.base_dir, e))?;
            tracing::info!(url = %repo.git_url, path = %dir.display(), "cloning");
            self.processes.run(
                &CommandSpec::new("git")
                    .arg("clone")
                    .arg(repo.git_url.as_str())
                    .arg(dir.to_string_lossy())
                    .env("GIT_TERMINAL_PROMPT", "0"),
            )?;
        }

        tracing::info!(revision = %repo.revision, "checking out");
        self.processes.run(
            &CommandSpec::new("git")
                .args(["checkout", repo.revision.as_str()])
                .current_dir(&dir),
        )?;

        Ok(dir)
    }
}

/// Checkout names become one directory under the checkout base, so anything
/// that could resolve elsewhere is rejected.
pub fn validate_checkout_name(name: &str) -> BenchResult<()> {
    let invalid = |reason| BenchError::InvalidCheckoutName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("name must not contain path separators"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("name must be a plain directory name")),
    }
}

/// Directory-safe form of a revision or version string
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}
