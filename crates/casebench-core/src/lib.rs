//! # casebench-core
//!
//! Input generation and caching for compiler benchmarks against real codebases.
//!
//! Pipeline:
//! - Hash the case description file (cache key)
//! - Crack the codebase's solution into a project graph
//! - Serialize the graph with stamp-preserving sharing into an input bundle
//! - Cache bundles by case hash, next to a sidecar recording the hash
//! - Resolve engine versions, building source revisions when needed
//! - Hand the bundle and versions to the out-of-process runner

pub mod builder;
pub mod bundle;
pub mod cache;
pub mod case;
pub mod checkout;
pub mod config;
pub mod crack;
pub mod error;
pub mod file_utils;
pub mod hash;
pub mod orchestrator;
pub mod process;
pub mod project;
pub mod runner;
pub mod serializer;
pub mod versions;

pub use builder::{BundleBuilder, InputBundleBuilder};
pub use bundle::{AnalysisAction, BenchmarkInputBundle, BundleConfig};
pub use cache::{CacheEntry, CacheLookup, InputsCache};
pub use case::{CaseDescription, CodebaseSource};
pub use config::{BenchConfig, DEFAULT_CONFIG_FILE};
pub use error::{BenchError, BenchResult};
pub use hash::hash_file;
pub use orchestrator::{Orchestrator, RunOptions, RunOutcome};
pub use process::{MockProcessRunner, ProcessRunner, SystemProcessRunner};
pub use project::{ProjectDescriptor, ProjectGraph, ProjectId, ReferencedProject};
pub use serializer::{GraphDeserializer, GraphSerializer, StampCounter};
pub use versions::{RunnableReference, VersionResolver, VersionSpec};
