//! Input bundle construction
//!
//! Combines a cracked solution with the case's requested actions. Source
//! text is read eagerly, so a bundle is self-contained once built.

use crate::bundle::{AnalysisAction, BenchmarkInputBundle, BundleConfig};
use crate::case::CaseDescription;
use crate::crack::ProjectCracker;
use crate::error::{BenchError, BenchResult};
use crate::file_utils::read_source_text;
use std::path::Path;

/// Anything that can turn a case into a bundle; the cache calls this on a miss.
pub trait BundleBuilder {
    fn build(&self, case: &CaseDescription, codebase_root: &Path)
        -> BenchResult<BenchmarkInputBundle>;
}

#[derive(Debug)]
pub struct InputBundleBuilder<C> {
    cracker: C,
    config: BundleConfig,
}

impl<C: ProjectCracker> InputBundleBuilder<C> {
    pub fn new(cracker: C, config: BundleConfig) -> Self {
        Self { cracker, config }
    }
}

impl<C: ProjectCracker> BundleBuilder for InputBundleBuilder<C> {
    fn build(
        &self,
        case: &CaseDescription,
        codebase_root: &Path,
    ) -> BenchResult<BenchmarkInputBundle> {
        let solution = codebase_root.join(&case.sln_relative);
        let cracked = self.cracker.crack(&solution)?;
        if cracked.is_empty() {
            return Err(BenchError::EmptySolution { path: solution });
        }

        let mut actions = Vec::with_capacity(case.check_actions.len() + case.build_actions.len());

        for (version, check) in case.check_actions.iter().enumerate() {
            let project = *cracked.projects.get(&check.project_name).ok_or_else(|| {
                BenchError::UnknownProject {
                    name: check.project_name.clone(),
                    known: cracked.project_names(),
                }
            })?;

            let file_name = cracked.graph.get(project).directory().join(&check.file_name);
            let source_text = read_source_text(&file_name)?;
            tracing::debug!(file = %file_name.display(), version, "resolved check action");

            actions.push(AnalysisAction::AnalyseFile {
                file_name,
                file_version: version as u32,
                source_text,
                options: project,
                repeat: check.repeat,
            });
        }

        for build in &case.build_actions {
            actions.push(AnalysisAction::BuildProject {
                args: build.args.clone(),
                project_file_name: codebase_root.join(&build.project_file_name),
                repeat: build.repeat,
            });
        }

        tracing::info!(
            actions = actions.len(),
            projects = cracked.graph.len(),
            "built input bundle"
        );

        Ok(BenchmarkInputBundle {
            projects: cracked.graph,
            actions,
            config: self.config,
        })
    }
}
