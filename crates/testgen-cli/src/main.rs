//! testgen - oracle-driven unit test generation
//!
//! ## Commands
//!
//! - `run`: stage, generate, deduplicate, build, measure and report
//! - `normalize`: clean one file the way oracle output is cleaned
//! - `dedupe`: drop repeated test cases from one file
//! - `scan`: list the source files a run would process
//! - `check-key`: validate the oracle credentials file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use testgen_ci::{BuildRunner, CoverageCollector};
use testgen_core::{
    Deduplicator, InstructionKind, InstructionSet, InstructionSource, Normalizer, Pipeline,
    PipelineConfig, PipelineContext, SourceScanner, RUN_SUMMARY_FILE, TEST_REPORT_FILE,
};
use testgen_oracle::{load_api_key, GeminiClient, OracleClient};

#[derive(Parser)]
#[command(name = "testgen")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Oracle-driven unit test generation for C++ projects", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./testgen.toml if present)
    #[arg(short, long, global = true, env = "TESTGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full generation pipeline
    Run {
        /// Project root holding the sources and build scripts
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Key-value file holding GEMINI_API_KEY
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Directory receiving one test file per source
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Directory receiving the coverage and test reports
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Directory holding the *_prompt.yaml instruction files
        #[arg(long)]
        instructions_dir: Option<PathBuf>,

        /// Oracle-assisted repairs after the first failing build
        #[arg(long)]
        max_repairs: Option<u32>,
    },

    /// Normalize a file the way oracle responses are normalized
    Normalize {
        file: PathBuf,

        /// Print the result instead of rewriting the file
        #[arg(long)]
        stdout: bool,
    },

    /// Remove repeated test cases from a file
    Dedupe {
        file: PathBuf,

        /// Print the result instead of rewriting the file
        #[arg(long)]
        stdout: bool,
    },

    /// List the source files a run would process
    Scan {
        #[arg(long)]
        project_root: Option<PathBuf>,
    },

    /// Validate the credentials file without running anything
    CheckKey {
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

struct RunOverrides {
    project_root: Option<PathBuf>,
    env_file: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    instructions_dir: Option<PathBuf>,
    max_repairs: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    testgen_core::init_tracing(cli.json, level);

    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Run {
            project_root,
            env_file,
            staging_dir,
            output_dir,
            instructions_dir,
            max_repairs,
        } => {
            let overrides = RunOverrides {
                project_root,
                env_file,
                staging_dir,
                output_dir,
                instructions_dir,
                max_repairs,
            };
            cmd_run(apply_overrides(config, overrides)).await
        }
        Commands::Normalize { file, stdout } => cmd_normalize(&config, &file, stdout),
        Commands::Dedupe { file, stdout } => cmd_dedupe(&config, &file, stdout),
        Commands::Scan { project_root } => {
            let config = match project_root {
                Some(root) => config.with_project_root(root),
                None => config,
            };
            cmd_scan(&config)
        }
        Commands::CheckKey { env_file } => {
            cmd_check_key(env_file.as_deref().unwrap_or(config.env_file.as_path()))
        }
    }
}

fn apply_overrides(mut config: PipelineConfig, overrides: RunOverrides) -> PipelineConfig {
    if let Some(root) = overrides.project_root {
        config = config.with_project_root(root);
    }
    if let Some(env_file) = overrides.env_file {
        config.env_file = env_file;
    }
    if let Some(dir) = overrides.staging_dir {
        config = config.with_staging_dir(dir);
    }
    if let Some(dir) = overrides.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = overrides.instructions_dir {
        config = config.with_instructions_dir(dir);
    }
    if let Some(max) = overrides.max_repairs {
        config = config.with_max_repairs(max);
    }
    config
}

async fn cmd_run(config: PipelineConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    // Credentials are checked before anything touches the filesystem.
    let api_key = load_api_key(&config.env_file).with_context(|| {
        format!(
            "Failed to load oracle credentials from {:?}",
            config.env_file
        )
    })?;
    let oracle = GeminiClient::new(config.oracle.clone().with_api_key(&api_key))
        .context("Failed to create oracle client")?;

    let units = SourceScanner::new(&config.project_root, config.sources.clone())
        .scan()
        .context("Failed to scan project sources")?;
    info!(
        project = %config.project_name,
        model = oracle.model_info().as_deref().unwrap_or("unknown"),
        sources = units.len(),
        "starting test generation"
    );

    let instructions = InstructionSet::load(&config.instructions_dir)
        .context("Failed to load instruction files")?;
    for kind in InstructionKind::ALL {
        if instructions.source(kind) == InstructionSource::BuiltIn {
            warn!(file = kind.file_name(), "instruction file not found, using built-in text");
        }
    }

    let build = BuildRunner::new(&config.project_root).with_commands(config.build.clone());
    let coverage =
        CoverageCollector::new(&config.project_root).with_command(config.coverage.clone());

    let ctx = PipelineContext::new(&config, &oracle, &build, &coverage, units)
        .context("Failed to prepare pipeline")?
        .with_instructions(instructions);
    let state = Pipeline::new(ctx)
        .run()
        .await
        .context("Test generation failed")?;

    println!(
        "Generated {} test file(s) in {:?}",
        state.artifacts.len(),
        config.staging_dir
    );
    if state.build_verified {
        println!("Build verified after {} attempt(s)", state.build_attempts.len());
    } else {
        println!(
            "Build still failing after {} attempt(s)",
            state.build_attempts.len()
        );
    }
    for advisory in &state.advisories {
        println!("! {}", advisory.advisory());
    }
    println!("Report:  {:?}", config.output_dir.join(TEST_REPORT_FILE));
    println!("Summary: {:?}", config.output_dir.join(RUN_SUMMARY_FILE));
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn emit(path: &Path, content: &str, stdout: bool) -> Result<()> {
    if stdout {
        println!("{content}");
        return Ok(());
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Rewrote {:?}", path);
    Ok(())
}

fn cmd_normalize(config: &PipelineConfig, file: &Path, stdout: bool) -> Result<()> {
    let table = config.rewrite_table().context("Invalid rewrite rules")?;
    let normalized = Normalizer::new(table).normalize(&read_file(file)?);
    emit(file, &normalized, stdout)
}

fn cmd_dedupe(config: &PipelineConfig, file: &Path, stdout: bool) -> Result<()> {
    let deduplicator = Deduplicator::new(config.test_macros.clone());
    let code = read_file(file)?;
    let deduped = deduplicator.dedupe(&code);
    info!(
        test_cases = deduplicator.distinct_signatures(&deduped),
        removed_bytes = code.len().saturating_sub(deduped.len()),
        "deduplicated"
    );
    emit(file, &deduped, stdout)
}

fn cmd_scan(config: &PipelineConfig) -> Result<()> {
    let units = SourceScanner::new(&config.project_root, config.sources.clone())
        .scan()
        .context("Failed to scan project sources")?;

    if units.is_empty() {
        println!("No source files found under {:?}", config.project_root);
        return Ok(());
    }
    for unit in &units {
        println!("{:<12} {}", unit.group, unit.path.display());
    }
    println!("{} source file(s)", units.len());
    Ok(())
}

fn cmd_check_key(env_file: &Path) -> Result<()> {
    let key = load_api_key(env_file)
        .with_context(|| format!("Invalid credentials in {:?}", env_file))?;
    let visible: String = key.chars().take(8).collect();
    println!("API key OK ({visible}...) from {:?}", env_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "testgen",
            "--json",
            "run",
            "--project-root",
            "/srv/app",
            "--max-repairs",
            "1",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run {
                project_root,
                max_repairs,
                ..
            } => {
                assert_eq!(project_root, Some(PathBuf::from("/srv/app")));
                assert_eq!(max_repairs, Some(1));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let config = apply_overrides(
            PipelineConfig::default(),
            RunOverrides {
                project_root: Some(PathBuf::from("/srv/app")),
                env_file: Some(PathBuf::from("/srv/.env")),
                staging_dir: None,
                output_dir: Some(PathBuf::from("/tmp/out")),
                instructions_dir: None,
                max_repairs: Some(0),
            },
        );
        assert_eq!(config.project_root, PathBuf::from("/srv/app"));
        assert_eq!(config.env_file, PathBuf::from("/srv/.env"));
        assert_eq!(config.staging_dir, PathBuf::from("generated_tests"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.max_repairs, 0);
    }

    #[test]
    fn test_normalize_subcommand_takes_file_and_stdout() {
        let cli = Cli::try_parse_from(["testgen", "normalize", "test_A.cc", "--stdout"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Normalize { stdout: true, .. }
        ));
    }
}
