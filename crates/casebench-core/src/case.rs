//! Case description files
//!
//! A case names the codebase to benchmark and the analysis actions to run
//! against it. Keys are PascalCase on disk.

use crate::checkout::validate_checkout_name;
use crate::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaseDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_code_root: Option<PathBuf>,

    /// Commands run in the codebase root before cracking.
    /// `None` means a single restore of the solution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebase_prep: Option<Vec<PrepCommand>>,

    pub sln_relative: PathBuf,

    #[serde(default)]
    pub check_actions: Vec<CheckAction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_actions: Vec<BuildAction>,
}

/// Git repository pinned at a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepoSpec {
    pub name: String,
    pub git_url: String,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrepCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Analyse one file of a named project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckAction {
    /// Relative to the owning project's directory
    pub file_name: PathBuf,
    pub project_name: String,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// Build a project from raw compiler arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildAction {
    pub args: Vec<String>,
    /// Relative to the codebase root
    pub project_file_name: PathBuf,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// Where the codebase comes from, once validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodebaseSource<'a> {
    Git(&'a RepoSpec),
    Local(&'a Path),
}

impl CaseDescription {
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, origin: &Path) -> BenchResult<Self> {
        serde_json::from_str(content).map_err(|e| BenchError::CaseParse {
            path: origin.to_path_buf(),
            source: e,
        })
    }

    /// Exactly one of `Repo` and `LocalCodeRoot` must be set.
    pub fn codebase_source(&self) -> BenchResult<CodebaseSource<'_>> {
        match (&self.repo, &self.local_code_root) {
            (Some(repo), None) => {
                validate_checkout_name(&repo.name)?;
                Ok(CodebaseSource::Git(repo))
            }
            (None, Some(root)) => Ok(CodebaseSource::Local(root)),
            (Some(_), Some(_)) => Err(BenchError::ConflictingCodebaseSource),
            (None, None) => Err(BenchError::MissingCodebaseSource),
        }
    }

    /// Declared prep commands, or a restore of the solution
    pub fn prep_commands(&self) -> Vec<PrepCommand> {
        match &self.codebase_prep {
            Some(commands) => commands.clone(),
            None => vec![PrepCommand {
                command: "dotnet".to_string(),
                args: vec![
                    "restore".to_string(),
                    self.sln_relative.to_string_lossy().into_owned(),
                ],
            }],
        }
    }
}
