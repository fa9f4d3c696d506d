//! In-memory project dependency graph
//!
//! Projects live in an arena and refer to each other by [`ProjectId`]. Two
//! references denote the same project exactly when their ids are equal, which
//! is what the serializer memoizes on. Structurally identical projects stored
//! in different slots are still different projects.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Index of a project inside a [`ProjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectId(usize);

impl ProjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One compilable unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDescriptor {
    /// Project file path, also the project's display identity
    pub project_file: PathBuf,
    pub source_files: Vec<PathBuf>,
    /// Opaque compiler flags, order preserved
    pub other_options: Vec<String>,
    pub referenced_projects: Vec<ReferencedProject>,
    pub is_incomplete: bool,
    pub use_script_resolution_rules: bool,
    pub load_time: DateTime<Utc>,
    pub stamp: Option<i64>,
}

impl ProjectDescriptor {
    pub fn new(project_file: impl Into<PathBuf>) -> Self {
        Self {
            project_file: project_file.into(),
            source_files: Vec::new(),
            other_options: Vec::new(),
            referenced_projects: Vec::new(),
            is_incomplete: false,
            use_script_resolution_rules: false,
            load_time: DateTime::<Utc>::UNIX_EPOCH,
            stamp: None,
        }
    }

    /// Directory containing the project file
    pub fn directory(&self) -> &Path {
        self.project_file.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// A reference from one project to another.
///
/// Only `Source` references survive serialization. The other kinds come from
/// cracking binary references and are rejected when a graph is written.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferencedProject {
    /// Project compiled from source in the same solution
    Source {
        project: ProjectId,
        output_path: PathBuf,
    },
    /// Prebuilt assembly on disk
    PortableExecutable { output_path: PathBuf },
    /// In-memory IL module
    IlModule { output_path: PathBuf },
}

impl ReferencedProject {
    pub fn output_path(&self) -> &Path {
        match self {
            ReferencedProject::Source { output_path, .. }
            | ReferencedProject::PortableExecutable { output_path }
            | ReferencedProject::IlModule { output_path } => output_path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReferencedProject::Source { .. } => "source",
            ReferencedProject::PortableExecutable { .. } => "portable-executable",
            ReferencedProject::IlModule { .. } => "il-module",
        }
    }
}

/// Arena of projects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectGraph {
    projects: Vec<ProjectDescriptor>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, project: ProjectDescriptor) -> ProjectId {
        self.projects.push(project);
        ProjectId(self.projects.len() - 1)
    }

    /// Panics if `id` came from a different graph.
    pub fn get(&self, id: ProjectId) -> &ProjectDescriptor {
        &self.projects[id.0]
    }

    pub fn get_mut(&mut self, id: ProjectId) -> &mut ProjectDescriptor {
        &mut self.projects[id.0]
    }

    /// Add a `Source` reference from `from` to `to`.
    pub fn link(&mut self, from: ProjectId, to: ProjectId, output_path: impl Into<PathBuf>) {
        self.projects[from.0]
            .referenced_projects
            .push(ReferencedProject::Source {
                project: to,
                output_path: output_path.into(),
            });
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ProjectId> {
        (0..self.projects.len()).map(ProjectId)
    }

    /// Projects directly referenced from source by `id`
    pub fn source_references(&self, id: ProjectId) -> impl Iterator<Item = ProjectId> + '_ {
        self.get(id)
            .referenced_projects
            .iter()
            .filter_map(|reference| match reference {
                ReferencedProject::Source { project, .. } => Some(*project),
                _ => None,
            })
    }
}
