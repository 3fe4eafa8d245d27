//! AMD dependency graph builder (amdgraph)

use amdgraph::config::CONFIG_FILE_NAME;
use amdgraph::emit::compress_files;
use amdgraph::logging::init_logging;
use amdgraph::pipeline::{BuildRun, EntryRequest};
use amdgraph::{
    write_bundles, BuildConfig, BundlePlanner, ClosureComputer, CommandCompressor,
    DependencyResolver,
};
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "amdgraph")]
#[command(about = "AMD module dependency graph builder", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Source directory (overrides build.source)
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// Output directory (overrides build.output)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log filter (overrides build.log)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the source tree and report what was found
    Scan,
    /// List every module an entry depends on
    Deps {
        /// Module name or alias
        module: String,
        /// Only the declared dependencies
        #[arg(long)]
        direct: bool,
    },
    /// List the files an entry needs, in load order
    Files {
        /// Module name or alias
        module: String,
    },
    /// Print the bundle plan as JSON
    Plan {
        /// Entry modules (default: modules.entries / modules.entry-pattern)
        entries: Vec<String>,
    },
    /// Plan and write bundles to the output directory
    Build {
        /// Entry modules (default: modules.entries / modules.entry-pattern)
        entries: Vec<String>,
        /// Compressor command, `{input}` and `{output}` substituted
        #[arg(long)]
        compress: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(cli.log.as_deref().or(config.build.log.as_deref()));

    let request = match &cli.command {
        Commands::Plan { entries } | Commands::Build { entries, .. } if entries.is_empty() => {
            EntryRequest::Configured
        }
        Commands::Plan { entries } | Commands::Build { entries, .. } => {
            EntryRequest::Explicit(entries.clone())
        }
        _ => EntryRequest::NotNeeded,
    };
    let run = BuildRun::prepare(config, request)?;
    let config = run.config();
    let registry = run.build_registry()?;

    match cli.command {
        Commands::Scan => {
            println!(
                "{} modules in {} files",
                registry.module_count(),
                registry.file_count()
            );
        }
        Commands::Deps { module, direct } => {
            let modules = if direct {
                registry.get_deps(&module)?
            } else {
                DependencyResolver::new(&registry).find_all_dependency_modules(&module)?
            };
            for id in modules {
                println!("{}", id);
            }
        }
        Commands::Files { module } => {
            for file in DependencyResolver::new(&registry).find_all_dependency_files(&module)? {
                println!("{}", file);
            }
        }
        Commands::Plan { .. } => {
            let entries = run.entries(&registry);
            let outcome = BundlePlanner::new(&registry)
                .with_options(config.planner_options())
                .plan(&entries)?;
            println!("{}", serde_json::to_string_pretty(outcome.bundles.bundles())?);
            report_failures(&outcome.failures);
        }
        Commands::Build { compress, .. } => {
            let entries = run.entries(&registry);
            let outcome = BundlePlanner::new(&registry)
                .with_options(config.planner_options())
                .plan(&entries)?;
            report_failures(&outcome.failures);

            let output = config.output_dir()?;
            std::fs::create_dir_all(output)?;
            let report = write_bundles(&outcome.bundles, config.source_dir()?, output)?;

            if let Some(command) = compress.or_else(|| config.build.compress.clone()) {
                let failures = compress_files(&report.written, &CommandCompressor::new(command));
                if !failures.is_empty() {
                    warn!("{} bundle(s) left uncompressed", failures.len());
                }
            }
            info!("wrote {} bundle(s)", report.written.len());
        }
    }

    Ok(())
}

/// Read the config file and apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<BuildConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    let mut config = if path.is_file() {
        let mut config = BuildConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.build.source = config.build.source.map(|p| base.join(p));
        config.build.output = config.build.output.map(|p| base.join(p));
        config
    } else if cli.config.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    } else {
        BuildConfig::default()
    };

    if let Some(source) = &cli.source {
        config.build.source = Some(source.clone());
    }
    if let Some(output) = &cli.output {
        config.build.output = Some(output.clone());
    }
    Ok(config)
}

fn report_failures(failures: &[amdgraph::PlanError]) {
    for failure in failures {
        eprintln!("error: {}", failure);
    }
}
