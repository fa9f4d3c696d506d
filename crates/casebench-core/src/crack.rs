//! Solution cracking
//!
//! Turning a solution into compiler inputs needs the build toolchain of the
//! benchmarked codebase, so it is delegated to an external cracker command.
//! The cracker prints one flat JSON record per project; this module links
//! those records into a [`ProjectGraph`] by project file path.

use crate::config::CommandConfig;
use crate::error::{BenchError, BenchResult};
use crate::process::{CommandSpec, ProcessRunner};
use crate::project::{ProjectDescriptor, ProjectGraph, ProjectId, ReferencedProject};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Projects of one solution, by name
#[derive(Debug, Clone, Default)]
pub struct CrackedSolution {
    pub graph: ProjectGraph,
    pub projects: BTreeMap<String, ProjectId>,
}

impl CrackedSolution {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }
}

pub trait ProjectCracker {
    fn crack(&self, solution: &Path) -> BenchResult<CrackedSolution>;
}

/// One project as printed by the cracker
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectRecord {
    pub project_file_name: PathBuf,
    #[serde(default)]
    pub source_files: Vec<PathBuf>,
    #[serde(default)]
    pub other_options: Vec<String>,
    #[serde(default)]
    pub project_references: Vec<ProjectReferenceRecord>,
    #[serde(default)]
    pub is_incomplete: bool,
    #[serde(default)]
    pub use_script_resolution_rules: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectReferenceRecord {
    pub project_file_name: PathBuf,
    pub output_file: PathBuf,
}

/// Project name used by check actions: the project file stem
pub fn project_name(project_file: &Path) -> String {
    project_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Link flat records into an arena.
///
/// References to project files in the record set become source references.
/// Anything else is a prebuilt binary and becomes a
/// [`ReferencedProject::PortableExecutable`]. Check actions address projects
/// by name, so two project files with the same stem are an error.
pub fn link_records(records: Vec<ProjectRecord>) -> BenchResult<CrackedSolution> {
    let load_time = Utc::now();
    let mut graph = ProjectGraph::new();
    let mut projects: BTreeMap<String, ProjectId> = BTreeMap::new();
    let mut by_path: HashMap<PathBuf, ProjectId> = HashMap::new();
    let mut pending = Vec::with_capacity(records.len());

    for record in records {
        let name = project_name(&record.project_file_name);
        if let Some(&first) = projects.get(&name) {
            return Err(BenchError::DuplicateProjectName {
                name,
                first: graph.get(first).project_file.clone(),
                second: record.project_file_name,
            });
        }

        let mut descriptor = ProjectDescriptor::new(record.project_file_name.clone());
        descriptor.source_files = record.source_files;
        descriptor.other_options = record.other_options;
        descriptor.is_incomplete = record.is_incomplete;
        descriptor.use_script_resolution_rules = record.use_script_resolution_rules;
        descriptor.load_time = load_time;
        let id = graph.add(descriptor);
        projects.insert(name, id);
        by_path.insert(record.project_file_name, id);
        pending.push((id, record.project_references));
    }

    for (id, references) in pending {
        for reference in references {
            let linked = match by_path.get(&reference.project_file_name) {
                Some(&target) => ReferencedProject::Source {
                    project: target,
                    output_path: reference.output_file,
                },
                None => ReferencedProject::PortableExecutable {
                    output_path: reference.output_file,
                },
            };
            graph.get_mut(id).referenced_projects.push(linked);
        }
    }

    Ok(CrackedSolution { graph, projects })
}

/// Runs the configured cracker with the solution path appended.
#[derive(Debug)]
pub struct CommandCracker<'a> {
    command: CommandConfig,
    processes: &'a dyn ProcessRunner,
}

impl<'a> CommandCracker<'a> {
    pub fn new(command: CommandConfig, processes: &'a dyn ProcessRunner) -> Self {
        Self { command, processes }
    }
}

impl ProjectCracker for CommandCracker<'_> {
    fn crack(&self, solution: &Path) -> BenchResult<CrackedSolution> {
        let spec = CommandSpec::new(self.command.program.as_str())
            .args(self.command.args.iter().cloned())
            .arg(solution.to_string_lossy());
        let stdout = self.processes.output(&spec)?;

        let records: Vec<ProjectRecord> =
            serde_json::from_str(&stdout).map_err(|e| BenchError::CrackerOutput {
                message: e.to_string(),
            })?;
        tracing::info!(
            solution = %solution.display(),
            projects = records.len(),
            "cracked solution"
        );

        link_records(records)
    }
}
