//! Benchmark configuration

use crate::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = ".casebench.toml";

/// Bundle cache-size hint for the consuming engine
pub const DEFAULT_PROJECT_CACHE_SIZE: u32 = 200;

/// Configuration for a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Where codebases and engine revisions are checked out
    pub checkout_dir: PathBuf,

    /// Where generated input bundles are cached
    pub cache_dir: PathBuf,

    /// Directory searched for `--sample <name>`
    pub samples_dir: PathBuf,

    /// Cache-size hint written into every bundle
    pub project_cache_size: u32,

    pub iterations: u32,

    pub warmup: u32,

    /// Cracks a solution into JSON project records on stdout
    pub cracker: CommandConfig,

    /// Consumes a bundle and runs the measurements
    pub runner: CommandConfig,

    /// How engine source revisions are built into packages
    pub package: PackageConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let base = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("casebench");
        Self {
            checkout_dir: base.join("checkouts"),
            cache_dir: base.join("inputs"),
            samples_dir: PathBuf::from("samples"),
            project_cache_size: DEFAULT_PROJECT_CACHE_SIZE,
            iterations: 1,
            warmup: 1,
            cracker: CommandConfig {
                program: "casebench-crack".to_string(),
                args: Vec::new(),
            },
            runner: CommandConfig {
                program: "casebench-runner".to_string(),
                args: Vec::new(),
            },
            package: PackageConfig::default(),
        }
    }
}

/// An external program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Run inside the engine checkout to produce packages
    pub build: CommandConfig,
    /// Relative to the engine checkout
    pub output_dir: PathBuf,
    /// Glob matched against file names in `output_dir`
    pub pattern: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            build: CommandConfig {
                program: "dotnet".to_string(),
                args: vec![
                    "pack".to_string(),
                    "-c".to_string(),
                    "Release".to_string(),
                ],
            },
            output_dir: PathBuf::from("artifacts/packages/Release"),
            pattern: "*.nupkg".to_string(),
        }
    }
}

impl BenchConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        toml::from_str(&content).map_err(|e| BenchError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load an explicit config, else `.casebench.toml` if present, else defaults.
    ///
    /// An explicitly named config that cannot be loaded is an error; the
    /// implicit one is only used when it exists.
    pub fn load_or_default(path: Option<&Path>) -> BenchResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    Self::load(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml(&self) -> BenchResult<String> {
        toml::to_string_pretty(self).map_err(|e| BenchError::InvalidConfig {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            message: e.to_string(),
        })
    }

    /// Path of a named sample case
    pub fn sample_path(&self, name: &str) -> PathBuf {
        self.samples_dir.join(format!("{}.json", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.project_cache_size, 200);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.package.pattern, "*.nupkg");
        assert!(config.checkout_dir.ends_with("casebench/checkouts"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bench.toml");
        std::fs::write(
            &path,
            r#"
iterations = 10
cache_dir = "/tmp/bench-inputs"

[runner]
program = "dotnet"
args = ["run", "--project", "runner"]
"#,
        )
        .unwrap();

        let config = BenchConfig::load(&path).unwrap();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.warmup, 1);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/bench-inputs"));
        assert_eq!(config.runner.program, "dotnet");
        assert_eq!(config.runner.args.len(), 3);
        assert_eq!(config.project_cache_size, DEFAULT_PROJECT_CACHE_SIZE);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bench.toml");
        std::fs::write(&path, "iterations = \"many\"").unwrap();

        assert!(matches!(
            BenchConfig::load(&path),
            Err(BenchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let result = BenchConfig::load_or_default(Some(Path::new("/nonexistent/bench.toml")));
        assert!(matches!(result, Err(BenchError::Io { .. })));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BenchConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: BenchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_sample_path() {
        let mut config = BenchConfig::default();
        config.samples_dir = PathBuf::from("/bench/samples");
        assert_eq!(
            config.sample_path("fantomas"),
            PathBuf::from("/bench/samples/fantomas.json")
        );
    }
}
