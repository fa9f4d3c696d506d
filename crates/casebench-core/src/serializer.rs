//! Project graph <-> JSON-safe DTO conversion
//!
//! The DTO is a tree. The first time a project is reached during a pass it is
//! written out in full as a [`ProjectNode::Definition`]; every later encounter
//! (a shared dependency, or a back edge in a cycle) is written as a
//! [`ProjectNode::Ref`] carrying the stamp of that definition. Work is
//! therefore bounded by the number of distinct projects, not the number of
//! paths through the graph.
//!
//! Stamps are assigned by the serializer, overriding whatever the source graph
//! carried. The consuming engine treats equal stamps as identical projects, so
//! one project gets exactly one stamp per pass, and distinct projects never
//! share one.

use crate::error::{BenchError, BenchResult};
use crate::project::{ProjectDescriptor, ProjectGraph, ProjectId, ReferencedProject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A project as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectNode {
    Ref(StampRef),
    Definition(Box<ProjectOptionsDto>),
}

impl ProjectNode {
    pub fn stamp(&self) -> i64 {
        match self {
            ProjectNode::Ref(r) => r.stamp,
            ProjectNode::Definition(dto) => dto.stamp,
        }
    }
}

/// Back-reference to a project defined earlier in the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampRef {
    #[serde(rename = "StampRef")]
    pub stamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectOptionsDto {
    pub project_file_name: PathBuf,
    pub source_files: Vec<PathBuf>,
    pub other_options: Vec<String>,
    pub referenced_projects: Vec<ProjectReferenceDto>,
    pub is_incomplete_type_check_environment: bool,
    pub use_script_resolution_rules: bool,
    pub load_time: DateTime<Utc>,
    pub stamp: i64,
}

/// Carries the referenced project and, separately, its compiled output,
/// which the consumer needs without looking inside the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectReferenceDto {
    pub output_file: PathBuf,
    pub options: ProjectNode,
}

/// Monotonic stamp source.
///
/// Owned by a serializer rather than global, so independent passes (and
/// tests) do not interfere. Thread it from one serializer to the next with
/// [`GraphSerializer::into_counter`] to keep stamps increasing across passes.
#[derive(Debug, Clone)]
pub struct StampCounter {
    next: i64,
    last: Option<i64>,
}

impl StampCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: first,
            last: None,
        }
    }

    pub fn next_stamp(&mut self) -> i64 {
        let stamp = self.next;
        self.next += 1;
        self.last = Some(stamp);
        stamp
    }

    /// Highest stamp handed out so far
    pub fn last_issued(&self) -> Option<i64> {
        self.last
    }
}

impl Default for StampCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes projects of one graph into a single document.
///
/// Call [`serialize`](Self::serialize) once per root that appears in the
/// document; projects already written by an earlier call are emitted as refs.
#[derive(Debug)]
pub struct GraphSerializer<'g> {
    graph: &'g ProjectGraph,
    stamps: StampCounter,
    assigned: HashMap<ProjectId, i64>,
}

impl<'g> GraphSerializer<'g> {
    pub fn new(graph: &'g ProjectGraph) -> Self {
        Self::with_counter(graph, StampCounter::new())
    }

    pub fn with_counter(graph: &'g ProjectGraph, stamps: StampCounter) -> Self {
        Self {
            graph,
            stamps,
            assigned: HashMap::new(),
        }
    }

    pub fn serialize(&mut self, root: ProjectId) -> BenchResult<ProjectNode> {
        if let Some(&stamp) = self.assigned.get(&root) {
            return Ok(ProjectNode::Ref(StampRef { stamp }));
        }

        let graph = self.graph;
        let project = graph.get(root);
        // Record before descending so cycles terminate in a ref.
        let stamp = self.stamps.next_stamp();
        self.assigned.insert(root, stamp);

        let mut referenced_projects = Vec::with_capacity(project.referenced_projects.len());
        for reference in &project.referenced_projects {
            match reference {
                ReferencedProject::Source {
                    project: target,
                    output_path,
                } => {
                    let options = self.serialize(*target)?;
                    referenced_projects.push(ProjectReferenceDto {
                        output_file: output_path.clone(),
                        options,
                    });
                }
                other @ (ReferencedProject::PortableExecutable { .. }
                | ReferencedProject::IlModule { .. }) => {
                    return Err(BenchError::UnsupportedReference {
                        project: project.project_file.clone(),
                        kind: other.kind(),
                    });
                }
            }
        }

        Ok(ProjectNode::Definition(Box::new(ProjectOptionsDto {
            project_file_name: project.project_file.clone(),
            source_files: project.source_files.clone(),
            other_options: project.other_options.clone(),
            referenced_projects,
            is_incomplete_type_check_environment: project.is_incomplete,
            use_script_resolution_rules: project.use_script_resolution_rules,
            load_time: project.load_time,
            stamp,
        })))
    }

    /// Stamp given to `id` in this pass, if it was reached
    pub fn stamp_of(&self, id: ProjectId) -> Option<i64> {
        self.assigned.get(&id).copied()
    }

    pub fn into_counter(self) -> StampCounter {
        self.stamps
    }
}

/// Rebuilds a [`ProjectGraph`] from the nodes of one document.
#[derive(Debug, Default)]
pub struct GraphDeserializer {
    graph: ProjectGraph,
    by_stamp: HashMap<i64, ProjectId>,
}

impl GraphDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deserialize(&mut self, node: &ProjectNode) -> BenchResult<ProjectId> {
        let dto = match node {
            ProjectNode::Ref(StampRef { stamp }) => {
                return self
                    .by_stamp
                    .get(stamp)
                    .copied()
                    .ok_or(BenchError::DanglingReference { stamp: *stamp });
            }
            ProjectNode::Definition(dto) => dto,
        };

        if let Some(&id) = self.by_stamp.get(&dto.stamp) {
            return Ok(id);
        }

        let id = self.graph.add(ProjectDescriptor {
            project_file: dto.project_file_name.clone(),
            source_files: dto.source_files.clone(),
            other_options: dto.other_options.clone(),
            referenced_projects: Vec::with_capacity(dto.referenced_projects.len()),
            is_incomplete: dto.is_incomplete_type_check_environment,
            use_script_resolution_rules: dto.use_script_resolution_rules,
            load_time: dto.load_time,
            stamp: Some(dto.stamp),
        });
        self.by_stamp.insert(dto.stamp, id);

        for reference in &dto.referenced_projects {
            let target = self.deserialize(&reference.options)?;
            self.graph.link(id, target, reference.output_file.clone());
        }

        Ok(id)
    }

    pub fn finish(self) -> ProjectGraph {
        self.graph
    }
}
