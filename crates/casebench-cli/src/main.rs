//! casebench CLI - compiler benchmarks against real codebases

use anyhow::{bail, Context};
use casebench_core::{
    BenchConfig, InputsCache, Orchestrator, RunOptions, SystemProcessRunner, VersionSpec,
    DEFAULT_CONFIG_FILE,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "casebench")]
#[command(author, version)]
#[command(
    about = "Benchmark a code-analysis engine against real codebases",
    long_about = "Check out a codebase, derive compiler inputs for the requested files (cached by case hash),\nand run the benchmark runner against one or more engine versions."
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Config file path (defaults to .casebench.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Case description file
    #[arg(short, long, conflicts_with = "sample")]
    case: Option<PathBuf>,

    /// Named sample case from the samples directory
    #[arg(short, long)]
    sample: Option<String>,

    /// Base directory for codebase and engine checkouts
    #[arg(long)]
    checkout_dir: Option<PathBuf>,

    /// Prepare inputs and versions without launching the runner
    #[arg(long)]
    dry_run: bool,

    /// Delete the codebase checkout afterwards (git codebases only)
    #[arg(long)]
    cleanup: bool,

    /// Measured iterations per action
    #[arg(long)]
    iterations: Option<u32>,

    /// Warmup iterations per action
    #[arg(long)]
    warmup: Option<u32>,

    /// Released engine version (repeatable)
    #[arg(long = "official", value_name = "TAG")]
    official: Vec<String>,

    /// Directory with prebuilt engine packages (repeatable)
    #[arg(long = "local", value_name = "DIR")]
    local: Vec<PathBuf>,

    /// Engine sources to build, as <git url>@<revision> (repeatable)
    #[arg(long = "git", value_name = "URL@REV")]
    git: Vec<String>,

    /// Rebuild engine packages even when one is already present
    #[arg(long)]
    force_rebuild: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark case
    Run(RunArgs),

    /// Initialize config file
    Init {
        /// Output path for config
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },

    /// Inspect or clear cached input bundles
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached bundles with their case hashes
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all cached bundles
    Clear,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and succeed; usage errors exit 1.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Run(args)) => run_command(args, &cli),
        Some(Commands::Init { output }) => init_command(output),
        Some(Commands::Cache { action }) => cache_command(action, &cli),
        None => run_command(&cli.run, &cli),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<BenchConfig> {
    let config = BenchConfig::load_or_default(cli.config.as_deref())?;
    tracing::debug!(
        checkout_dir = %config.checkout_dir.display(),
        cache_dir = %config.cache_dir.display(),
        "loaded config"
    );
    Ok(config)
}

fn run_command(args: &RunArgs, cli: &Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli)?;
    if let Some(dir) = &args.checkout_dir {
        config.checkout_dir = dir.clone();
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(warmup) = args.warmup {
        config.warmup = warmup;
    }

    let case_file = match (&args.case, &args.sample) {
        (Some(path), _) => path.clone(),
        (None, Some(name)) => config.sample_path(name),
        (None, None) => bail!("no case given; pass --case <FILE> or --sample <NAME>"),
    };
    let versions = parse_versions(args)?;

    let options = RunOptions {
        case_file,
        versions,
        dry_run: args.dry_run,
        cleanup: args.cleanup,
        force_rebuild: args.force_rebuild,
    };

    println!("{} {}", "Case:".cyan().bold(), options.case_file.display());

    let processes = SystemProcessRunner;
    let outcome = Orchestrator::new(config, &processes)
        .run(&options)
        .with_context(|| format!("benchmark case {} failed", options.case_file.display()))?;

    let origin = if outcome.cache_hit { "cached" } else { "generated" };
    println!(
        "{} {} ({})",
        "Bundle:".cyan().bold(),
        outcome.bundle.display(),
        origin.dimmed()
    );
    for version in &outcome.versions {
        println!("  {} {}", "version".dimmed(), version);
    }

    if outcome.runner_launched {
        println!("{}", "✓ Benchmark run finished".green().bold());
    } else {
        println!("{}", "Dry run: runner not launched".yellow());
    }
    if outcome.cleaned_up {
        println!(
            "  {} {}",
            "removed".dimmed(),
            outcome.codebase_root.display()
        );
    }

    Ok(())
}

/// Flag values to version specs, validated before anything runs.
fn parse_versions(args: &RunArgs) -> anyhow::Result<Vec<VersionSpec>> {
    let mut versions = Vec::with_capacity(args.official.len() + args.local.len() + args.git.len());
    for tag in &args.official {
        versions.push(VersionSpec::official(tag)?);
    }
    for dir in &args.local {
        versions.push(VersionSpec::local(dir));
    }
    for source in &args.git {
        versions.push(VersionSpec::source(source)?);
    }
    Ok(versions)
}

fn init_command(output: &Path) -> anyhow::Result<()> {
    let toml_content = BenchConfig::default().to_toml()?;

    std::fs::write(output, toml_content)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "{} Created config file: {}",
        "✓".green().bold(),
        output.display()
    );

    Ok(())
}

fn cache_command(action: &CacheCommand, cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let cache = InputsCache::new(&config.cache_dir);

    match action {
        CacheCommand::List { json } => {
            let entries = cache.entries()?;
            if *json {
                let listed: Vec<_> = entries
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "hash": entry.hash,
                            "bundle": entry.bundle,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listed)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No cached bundles in {}", cache.dir().display());
                return Ok(());
            }
            for entry in &entries {
                println!("{}  {}", entry.hash.dimmed(), entry.bundle.display());
            }
            println!("{} {}", entries.len(), if entries.len() == 1 { "entry" } else { "entries" });
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            println!(
                "{} Removed {} files from {}",
                "✓".green().bold(),
                removed,
                cache.dir().display()
            );
        }
    }

    Ok(())
}
