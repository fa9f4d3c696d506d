//! Benchmark input bundles
//!
//! A bundle is the unit handed to the runner process: an ordered list of
//! analysis actions over a project graph, plus engine configuration. On disk
//! it is a single JSON document whose project options share definitions
//! across actions (see [`crate::serializer`]).

use crate::config::DEFAULT_PROJECT_CACHE_SIZE;
use crate::error::{BenchError, BenchResult};
use crate::project::{ProjectGraph, ProjectId};
use crate::serializer::{GraphDeserializer, GraphSerializer, ProjectNode, StampCounter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One requested unit of engine work
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisAction {
    AnalyseFile {
        file_name: PathBuf,
        /// Position of the action in the case's check list
        file_version: u32,
        source_text: String,
        options: ProjectId,
        repeat: u32,
    },
    BuildProject {
        args: Vec<String>,
        project_file_name: PathBuf,
        repeat: u32,
    },
}

impl AnalysisAction {
    pub fn repeat(&self) -> u32 {
        match self {
            AnalysisAction::AnalyseFile { repeat, .. }
            | AnalysisAction::BuildProject { repeat, .. } => *repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BundleConfig {
    pub project_cache_size: u32,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            project_cache_size: DEFAULT_PROJECT_CACHE_SIZE,
        }
    }
}

/// Actions plus the projects they refer to
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkInputBundle {
    pub projects: ProjectGraph,
    pub actions: Vec<AnalysisAction>,
    pub config: BundleConfig,
}

/// Bundle document as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BundleFile {
    pub actions: Vec<ActionDto>,
    pub config: BundleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ActionDto {
    #[serde(rename_all = "PascalCase")]
    AnalyseFile {
        file_name: PathBuf,
        file_version: u32,
        source_text: String,
        options: ProjectNode,
        repeat: u32,
    },
    #[serde(rename_all = "PascalCase")]
    BuildProject {
        args: Vec<String>,
        project_file_name: PathBuf,
        repeat: u32,
    },
}

impl BenchmarkInputBundle {
    /// Encode with stamps starting at 1.
    pub fn encode(&self) -> BenchResult<BundleFile> {
        self.encode_with(StampCounter::new()).map(|(file, _)| file)
    }

    /// Encode continuing from `stamps`; returns the counter for the next pass.
    pub fn encode_with(&self, stamps: StampCounter) -> BenchResult<(BundleFile, StampCounter)> {
        let mut serializer = GraphSerializer::with_counter(&self.projects, stamps);
        let mut actions = Vec::with_capacity(self.actions.len());

        for action in &self.actions {
            actions.push(match action {
                AnalysisAction::AnalyseFile {
                    file_name,
                    file_version,
                    source_text,
                    options,
                    repeat,
                } => ActionDto::AnalyseFile {
                    file_name: file_name.clone(),
                    file_version: *file_version,
                    source_text: source_text.clone(),
                    options: serializer.serialize(*options)?,
                    repeat: *repeat,
                },
                AnalysisAction::BuildProject {
                    args,
                    project_file_name,
                    repeat,
                } => ActionDto::BuildProject {
                    args: args.clone(),
                    project_file_name: project_file_name.clone(),
                    repeat: *repeat,
                },
            });
        }

        let file = BundleFile {
            actions,
            config: self.config,
        };
        Ok((file, serializer.into_counter()))
    }

    pub fn write(&self, path: &Path) -> BenchResult<()> {
        let file = self.encode()?;
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).map_err(|e| BenchError::io(path, e))
    }

    pub fn read(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let file: BundleFile =
            serde_json::from_str(&content).map_err(|e| BenchError::BundleParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        file.decode()
    }
}

impl BundleFile {
    /// Rebuild the in-memory bundle. Projects shared between actions come
    /// back as one arena entry.
    pub fn decode(&self) -> BenchResult<BenchmarkInputBundle> {
        let mut deserializer = GraphDeserializer::new();
        let mut actions = Vec::with_capacity(self.actions.len());

        for action in &self.actions {
            actions.push(match action {
                ActionDto::AnalyseFile {
                    file_name,
                    file_version,
                    source_text,
                    options,
                    repeat,
                } => AnalysisAction::AnalyseFile {
                    file_name: file_name.clone(),
                    file_version: *file_version,
                    source_text: source_text.clone(),
                    options: deserializer.deserialize(options)?,
                    repeat: *repeat,
                },
                ActionDto::BuildProject {
                    args,
                    project_file_name,
                    repeat,
                } => AnalysisAction::BuildProject {
                    args: args.clone(),
                    project_file_name: project_file_name.clone(),
                    repeat: *repeat,
                },
            });
        }

        Ok(BenchmarkInputBundle {
            projects: deserializer.finish(),
            actions,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectDescriptor;
    use tempfile::TempDir;

    fn two_file_bundle() -> BenchmarkInputBundle {
        let mut projects = ProjectGraph::new();
        let core = projects.add(ProjectDescriptor::new("/c/Core/Core.fsproj"));
        let app = projects.add(ProjectDescriptor::new("/c/App/App.fsproj"));
        projects.link(app, core, "/c/Core/bin/Core.dll");

        BenchmarkInputBundle {
            projects,
            actions: vec![
                AnalysisAction::AnalyseFile {
                    file_name: PathBuf::from("/c/App/Program.fs"),
                    file_version: 0,
                    source_text: "[<EntryPoint>] let main _ = 0".to_string(),
                    options: app,
                    repeat: 2,
                },
                AnalysisAction::AnalyseFile {
                    file_name: PathBuf::from("/c/Core/Types.fs"),
                    file_version: 1,
                    source_text: "type T = A | B".to_string(),
                    options: core,
                    repeat: 1,
                },
                AnalysisAction::BuildProject {
                    args: vec!["--target:library".to_string()],
                    project_file_name: PathBuf::from("/c/Core/Core.fsproj"),
                    repeat: 1,
                },
            ],
            config: BundleConfig::default(),
        }
    }

    #[test]
    fn test_wire_shape() {
        let file = two_file_bundle().encode().unwrap();
        let value = serde_json::to_value(&file).unwrap();

        assert_eq!(value["Config"]["ProjectCacheSize"], 200);
        assert_eq!(value["Actions"][0]["tag"], "AnalyseFile");
        assert_eq!(value["Actions"][0]["FileVersion"], 0);
        assert_eq!(value["Actions"][0]["Repeat"], 2);
        assert_eq!(value["Actions"][2]["tag"], "BuildProject");
        assert_eq!(value["Actions"][2]["Args"][0], "--target:library");
        // Core was defined inside App's references, so the second action refers to it.
        assert!(value["Actions"][1]["Options"]["StampRef"].is_i64());
    }

    #[test]
    fn test_file_round_trip_shares_projects_across_actions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        two_file_bundle().write(&path).unwrap();

        let bundle = BenchmarkInputBundle::read(&path).unwrap();
        assert_eq!(bundle.projects.len(), 2);
        assert_eq!(bundle.actions.len(), 3);

        let (app, core) = match (&bundle.actions[0], &bundle.actions[1]) {
            (
                AnalysisAction::AnalyseFile { options: app, .. },
                AnalysisAction::AnalyseFile { options: core, .. },
            ) => (*app, *core),
            other => panic!("Unexpected actions {:?}", other),
        };
        let referenced: Vec<_> = bundle.projects.source_references(app).collect();
        assert_eq!(referenced, vec![core]);
        assert_eq!(
            bundle.projects.get(core).stamp,
            Some(2),
            "Core is the second project reached"
        );
    }

    #[test]
    fn test_encode_with_continues_stamps() {
        let bundle = two_file_bundle();
        let (_, counter) = bundle.encode_with(StampCounter::starting_at(10)).unwrap();
        assert_eq!(counter.last_issued(), Some(11));
    }

    #[test]
    fn test_corrupt_bundle_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        std::fs::write(&path, "{\"Actions\": 3}").unwrap();

        assert!(matches!(
            BenchmarkInputBundle::read(&path),
            Err(BenchError::BundleParse { .. })
        ));
    }

    #[test]
    fn test_repeat_accessor() {
        let bundle = two_file_bundle();
        let repeats: Vec<u32> = bundle.actions.iter().map(|a| a.repeat()).collect();
        assert_eq!(repeats, vec![2, 1, 1]);
    }
}
