//! Engine version resolution
//!
//! Turns user-facing version specs into references the runner can load.
//! Official tags and local package directories pass straight through. Source
//! revisions are checked out into a per-revision directory and packed, unless
//! a package is already there.

use crate::case::RepoSpec;
use crate::checkout::{sanitize_component, CodebaseCheckout, GitCheckout};
use crate::config::PackageConfig;
use crate::error::{BenchError, BenchResult};
use crate::hash::hash_bytes;
use crate::process::{CommandSpec, ProcessRunner};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

/// A requested engine version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Released package on the public feed
    Official(String),
    /// Directory already containing packages
    LocalDirectory(PathBuf),
    /// Engine sources that must be built
    SourceRevision { git_url: String, revision: String },
}

impl VersionSpec {
    /// Official tags must be semantic versions, e.g. `43.8.100` or `43.9.100-preview.24`.
    pub fn official(tag: &str) -> BenchResult<Self> {
        semver::Version::parse(tag).map_err(|e| BenchError::InvalidVersionSpec {
            spec: tag.to_string(),
            reason: e.to_string(),
        })?;
        Ok(VersionSpec::Official(tag.to_string()))
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        VersionSpec::LocalDirectory(path.into())
    }

    /// Parse `<git url>@<revision>`; the last `@` separates the revision.
    pub fn source(raw: &str) -> BenchResult<Self> {
        let invalid = |reason: &str| BenchError::InvalidVersionSpec {
            spec: raw.to_string(),
            reason: reason.to_string(),
        };
        let (git_url, revision) = raw
            .rsplit_once('@')
            .ok_or_else(|| invalid("expected <git url>@<revision>"))?;
        if git_url.is_empty() || revision.is_empty() {
            return Err(invalid("expected <git url>@<revision>"));
        }
        if revision.contains(':') {
            return Err(invalid("revision must not contain ':'"));
        }
        Ok(VersionSpec::SourceRevision {
            git_url: git_url.to_string(),
            revision: revision.to_string(),
        })
    }
}

/// Checkout directory for an engine source, unique per repository and revision.
pub fn engine_checkout_name(git_url: &str, revision: &str) -> String {
    let url_hash = hash_bytes(git_url.as_bytes());
    format!("engine-{}-{}", sanitize_component(revision), &url_hash[..12])
}

/// A version the runner can load directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnableReference {
    Official(String),
    Local(PathBuf),
}

impl fmt::Display for RunnableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnableReference::Official(tag) => write!(f, "official:{}", tag),
            RunnableReference::Local(path) => write!(f, "local:{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub struct VersionResolver<'a> {
    checkout_dir: PathBuf,
    package: PackageConfig,
    processes: &'a dyn ProcessRunner,
    force_rebuild: bool,
}

impl<'a> VersionResolver<'a> {
    pub fn new(
        checkout_dir: impl Into<PathBuf>,
        package: PackageConfig,
        processes: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            checkout_dir: checkout_dir.into(),
            package,
            processes,
            force_rebuild: false,
        }
    }

    /// Always run the package build for source revisions
    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Resolve every spec. Output order is grouped: local, official, then
    /// built revisions, each group in input order.
    pub fn resolve(&self, specs: &[VersionSpec]) -> BenchResult<Vec<RunnableReference>> {
        if specs.is_empty() {
            return Err(BenchError::NoVersions);
        }

        let mut local = Vec::new();
        let mut official = Vec::new();
        let mut sources = Vec::new();
        for spec in specs {
            match spec {
                VersionSpec::LocalDirectory(path) => local.push(RunnableReference::Local(path.clone())),
                VersionSpec::Official(tag) => official.push(RunnableReference::Official(tag.clone())),
                VersionSpec::SourceRevision { git_url, revision } => {
                    let source = (git_url.as_str(), revision.as_str());
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
            }
        }

        // Each (url, revision) pair has its own directory, so builds are independent.
        let built: Vec<RunnableReference> = sources
            .par_iter()
            .map(|(git_url, revision)| self.resolve_revision(git_url, revision))
            .collect::<BenchResult<_>>()?;

        let mut resolved = local;
        resolved.extend(official);
        resolved.extend(built);
        tracing::info!(versions = resolved.len(), "resolved engine versions");
        Ok(resolved)
    }

    fn resolve_revision(&self, git_url: &str, revision: &str) -> BenchResult<RunnableReference> {
        let repo = RepoSpec {
            name: engine_checkout_name(git_url, revision),
            git_url: git_url.to_string(),
            revision: revision.to_string(),
        };
        let checkout = GitCheckout::new(&self.checkout_dir, self.processes);
        let source_dir = checkout.ensure_checked_out(&repo)?;
        let package_dir = source_dir.join(&self.package.output_dir);

        if !self.force_rebuild && self.has_package(&package_dir)? {
            tracing::info!(revision, dir = %package_dir.display(), "package present; skipping build");
            return Ok(RunnableReference::Local(package_dir));
        }

        tracing::info!(revision, "building engine package");
        self.processes.run(
            &CommandSpec::new(self.package.build.program.as_str())
                .args(self.package.build.args.iter().cloned())
                .current_dir(&source_dir),
        )?;

        if !self.has_package(&package_dir)? {
            return Err(BenchError::PackageMissing {
                dir: package_dir,
                pattern: self.package.pattern.clone(),
            });
        }
        Ok(RunnableReference::Local(package_dir))
    }

    fn has_package(&self, dir: &Path) -> BenchResult<bool> {
        let pattern = glob::Pattern::new(&self.package.pattern).map_err(|e| {
            BenchError::InvalidConfig {
                path: PathBuf::from("package.pattern"),
                message: e.to_string(),
            }
        })?;

        let Ok(entries) = std::fs::read_dir(dir) else {
            return Ok(false);
        };
        Ok(entries.filter_map(Result::ok).any(|entry| {
            entry.path().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| pattern.matches(name))
        }))
    }
}
