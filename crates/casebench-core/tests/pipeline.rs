//! End-to-end pipeline runs against scripted collaborators.

use casebench_core::bundle::AnalysisAction;
use casebench_core::{
    hash_file, BenchConfig, BenchError, BenchmarkInputBundle, MockProcessRunner, Orchestrator,
    RunOptions, RunnableReference, VersionSpec,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CRACKER: &str = "casebench-crack";
const RUNNER: &str = "casebench-runner";

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn config(&self) -> BenchConfig {
        BenchConfig {
            checkout_dir: self.path().join("checkouts"),
            cache_dir: self.path().join("inputs"),
            ..BenchConfig::default()
        }
    }

    fn write_case(&self, case: serde_json::Value) -> PathBuf {
        let path = self.path().join("case.json");
        fs::write(&path, serde_json::to_string_pretty(&case).unwrap()).unwrap();
        path
    }

    /// Lay out `<root>/<name>/<name>.fsproj` with one `Main.fs` per project.
    fn seed_codebase(&self, root: &Path, names: &[&str]) {
        for name in names {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}.fsproj", name)), "<Project />").unwrap();
            fs::write(dir.join("Main.fs"), format!("module {}", name)).unwrap();
        }
    }

    fn cached_files(&self, extension: &str) -> Vec<PathBuf> {
        let dir = self.path().join("inputs");
        if !dir.is_dir() {
            return Vec::new();
        }
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == extension))
            .collect()
    }
}

fn project_file(root: &Path, name: &str) -> PathBuf {
    root.join(name).join(format!("{}.fsproj", name))
}

/// Cracker output for `projects`, each `(name, referenced names)`.
fn cracker_output(root: &Path, projects: &[(&str, Vec<&str>)]) -> String {
    let records: Vec<_> = projects
        .iter()
        .map(|(name, references)| {
            let references: Vec<_> = references
                .iter()
                .map(|r| {
                    json!({
                        "ProjectFileName": project_file(root, r),
                        "OutputFile": root.join(r).join("bin").join(format!("{}.dll", r)),
                    })
                })
                .collect();
            json!({
                "ProjectFileName": project_file(root, name),
                "SourceFiles": [root.join(name).join("Main.fs")],
                "OtherOptions": ["--optimize+"],
                "ProjectReferences": references,
            })
        })
        .collect();
    serde_json::to_string(&records).unwrap()
}

fn local_case(root: &Path, project: &str) -> serde_json::Value {
    json!({
        "LocalCodeRoot": root,
        "SlnRelative": "all.sln",
        "CheckActions": [{"FileName": "Main.fs", "ProjectName": project}],
    })
}

fn official() -> Vec<VersionSpec> {
    vec![VersionSpec::official("43.8.100").unwrap()]
}

#[test]
fn test_cache_miss_then_hit() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    let orchestrator = Orchestrator::new(ws.config(), &mock);

    let first = orchestrator.run(&RunOptions::new(&case, official())).unwrap();
    assert!(!first.cache_hit);
    assert!(first.runner_launched);

    let name = first.bundle.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("bundle_") && name.ends_with(".json"), "got {}", name);
    let sidecar = first.bundle.with_extension("hash");
    assert_eq!(
        fs::read_to_string(&sidecar).unwrap(),
        hash_file(&case).unwrap()
    );

    let second = orchestrator.run(&RunOptions::new(&case, official())).unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.bundle, first.bundle);
    assert_eq!(mock.invocations_of(CRACKER).len(), 1, "cracker runs only on a miss");
    assert_eq!(mock.invocations_of(RUNNER).len(), 2);
    assert_eq!(ws.cached_files("json").len(), 1);
}

#[test]
fn test_bundle_contents_and_runner_command() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    let outcome = Orchestrator::new(ws.config(), &mock)
        .run(&RunOptions::new(
            &case,
            vec![
                VersionSpec::official("43.8.100").unwrap(),
                VersionSpec::local("/pkgs/dev"),
            ],
        ))
        .unwrap();

    assert_eq!(
        outcome.versions,
        vec![
            RunnableReference::Local(PathBuf::from("/pkgs/dev")),
            RunnableReference::Official("43.8.100".to_string()),
        ]
    );

    let bundle = BenchmarkInputBundle::read(&outcome.bundle).unwrap();
    assert_eq!(bundle.actions.len(), 1);
    match &bundle.actions[0] {
        AnalysisAction::AnalyseFile {
            file_name,
            file_version,
            source_text,
            ..
        } => {
            assert_eq!(file_name, &root.join("App").join("Main.fs"));
            assert_eq!(*file_version, 0);
            assert_eq!(source_text, "module App");
        }
        other => panic!("Expected AnalyseFile, got {:?}", other),
    }

    let runs = mock.invocations_of(RUNNER);
    assert_eq!(runs.len(), 1);
    let args = &runs[0].args;
    assert_eq!(args[0], "--input");
    assert_eq!(args[1], outcome.bundle.to_string_lossy());
    assert!(args.iter().any(|a| a == "local:/pkgs/dev"));
    assert!(args.iter().any(|a| a == "official:43.8.100"));

    let restore = &mock.invocations_of("dotnet")[0];
    assert_eq!(restore.args, vec!["restore", "all.sln"]);
    assert_eq!(restore.cwd, Some(root.clone()));
}

#[test]
fn test_shared_dependency_survives_the_round_trip() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["A", "B", "C", "D"]);
    let case = ws.write_case(local_case(&root, "A"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(
        CRACKER,
        cracker_output(
            &root,
            &[
                ("A", vec!["B", "C"]),
                ("B", vec!["D"]),
                ("C", vec!["D"]),
                ("D", vec![]),
            ],
        ),
    );
    let outcome = Orchestrator::new(ws.config(), &mock)
        .run(&RunOptions::new(&case, official()))
        .unwrap();

    let raw = fs::read_to_string(&outcome.bundle).unwrap();
    assert_eq!(raw.matches("\"StampRef\"").count(), 1, "D is defined once");

    let bundle = BenchmarkInputBundle::read(&outcome.bundle).unwrap();
    assert_eq!(bundle.projects.len(), 4);
    let AnalysisAction::AnalyseFile { options: a, .. } = &bundle.actions[0] else {
        panic!("Expected AnalyseFile");
    };
    let children: Vec<_> = bundle.projects.source_references(*a).collect();
    assert_eq!(children.len(), 2);
    let d_from_b: Vec<_> = bundle.projects.source_references(children[0]).collect();
    let d_from_c: Vec<_> = bundle.projects.source_references(children[1]).collect();
    assert_eq!(d_from_b, d_from_c);
    assert_eq!(
        bundle.projects.get(d_from_b[0]).project_file,
        project_file(&root, "D")
    );
}

#[test]
fn test_dry_run_skips_runner() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::new(&case, official())
    };
    let outcome = Orchestrator::new(ws.config(), &mock).run(&options).unwrap();

    assert!(!outcome.runner_launched);
    assert!(outcome.bundle.is_file());
    assert!(mock.invocations_of(RUNNER).is_empty());
}

#[test]
fn test_unknown_project_writes_no_bundle() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "Missing"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    let err = Orchestrator::new(ws.config(), &mock)
        .run(&RunOptions::new(&case, official()))
        .unwrap_err();

    assert!(matches!(err, BenchError::UnknownProject { ref name, .. } if name == "Missing"));
    assert!(ws.cached_files("json").is_empty());
    assert!(ws.cached_files("hash").is_empty());
    assert!(mock.invocations_of(RUNNER).is_empty());
}

#[test]
fn test_empty_solution_is_fatal() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    fs::create_dir_all(&root).unwrap();
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, "[]");
    let err = Orchestrator::new(ws.config(), &mock)
        .run(&RunOptions::new(&case, official()))
        .unwrap_err();

    assert!(matches!(err, BenchError::EmptySolution { .. }));
    assert!(ws.cached_files("json").is_empty());
}

#[test]
fn test_conflicting_sources_fail_before_any_process() {
    let ws = Workspace::new();
    let case = ws.write_case(json!({
        "Repo": {"Name": "app", "GitUrl": "https://example.com/app.git", "Revision": "v1"},
        "LocalCodeRoot": ws.path().join("code"),
        "SlnRelative": "all.sln",
        "CheckActions": [],
    }));

    let mock = MockProcessRunner::new();
    let err = Orchestrator::new(ws.config(), &mock)
        .run(&RunOptions::new(&case, official()))
        .unwrap_err();

    assert!(matches!(err, BenchError::ConflictingCodebaseSource));
    assert!(mock.invocations().is_empty());
}

#[test]
fn test_cleanup_removes_git_checkout() {
    let ws = Workspace::new();
    let checkout = ws.path().join("checkouts").join("app");
    ws.seed_codebase(&checkout, &["App"]);
    let case = ws.write_case(json!({
        "Repo": {"Name": "app", "GitUrl": "https://example.com/app.git", "Revision": "v1"},
        "SlnRelative": "all.sln",
        "CheckActions": [{"FileName": "Main.fs", "ProjectName": "App"}],
    }));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&checkout, &[("App", vec![])]));
    let options = RunOptions {
        cleanup: true,
        ..RunOptions::new(&case, official())
    };
    let outcome = Orchestrator::new(ws.config(), &mock).run(&options).unwrap();

    assert_eq!(outcome.codebase_root, checkout);
    assert!(outcome.cleaned_up);
    assert!(!checkout.exists());
    assert!(outcome.bundle.is_file(), "bundle lives outside the checkout");

    let git = mock.invocations_of("git");
    assert_eq!(git.len(), 1, "existing checkout is reused, not cloned");
    assert_eq!(git[0].args, vec!["checkout", "v1"]);
}

#[test]
fn test_cleanup_cannot_reach_outside_checkout_dir() {
    let ws = Workspace::new();
    let precious = ws.path().join("precious");
    ws.seed_codebase(&precious, &["App"]);

    for name in [
        precious.to_string_lossy().into_owned(),
        "../precious".to_string(),
    ] {
        let case = ws.write_case(json!({
            "Repo": {"Name": name, "GitUrl": "https://example.com/app.git", "Revision": "v1"},
            "SlnRelative": "all.sln",
            "CheckActions": [{"FileName": "Main.fs", "ProjectName": "App"}],
        }));

        let mock = MockProcessRunner::new();
        mock.push_stdout(CRACKER, cracker_output(&precious, &[("App", vec![])]));
        let options = RunOptions {
            cleanup: true,
            ..RunOptions::new(&case, official())
        };
        let err = Orchestrator::new(ws.config(), &mock).run(&options).unwrap_err();

        assert!(
            matches!(err, BenchError::InvalidCheckoutName { .. }),
            "got {:?}",
            err
        );
        assert!(mock.invocations().is_empty());
        assert!(precious.join("App").join("Main.fs").is_file());
    }
}

#[test]
fn test_cleanup_never_touches_local_codebase() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    let options = RunOptions {
        cleanup: true,
        ..RunOptions::new(&case, official())
    };
    let outcome = Orchestrator::new(ws.config(), &mock).run(&options).unwrap();

    assert!(!outcome.cleaned_up);
    assert!(root.join("App").join("Main.fs").is_file());
}

#[test]
fn test_runner_failure_is_fatal_but_bundle_stays_cached() {
    let ws = Workspace::new();
    let root = ws.path().join("code");
    ws.seed_codebase(&root, &["App"]);
    let case = ws.write_case(local_case(&root, "App"));

    let mock = MockProcessRunner::new();
    mock.push_stdout(CRACKER, cracker_output(&root, &[("App", vec![])]));
    mock.push_exit(RUNNER, 1);
    let orchestrator = Orchestrator::new(ws.config(), &mock);

    let err = orchestrator
        .run(&RunOptions::new(&case, official()))
        .unwrap_err();
    assert!(matches!(err, BenchError::CommandFailed { code: Some(1), .. }));
    assert_eq!(ws.cached_files("hash").len(), 1);

    let retry = orchestrator.run(&RunOptions::new(&case, official())).unwrap();
    assert!(retry.cache_hit);
}
