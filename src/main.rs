use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use envsync::presentation::cli_summary::{print_perf_summary, print_resolution, print_scan_summary};
use envsync::presentation::writers::{all_writers, write_to_file, writer_for};
use envsync::{
    AppConfig, ConfigEntry, Environment, LogLevel, ProjectId, ResolutionAction, ResolveRequest,
    ScanReport,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "envsync",
    about = "envsync — find and fix configuration drift across environments."
)]
struct Cli {
    /// Config file (defaults to ./envsync.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show SQL queries and connection details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect conflicts in a JSON array of decrypted entries (no database)
    Detect {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Scan a project in the configured database
    Scan {
        #[arg(short, long)]
        project: String,

        #[arg(long, default_value = "cli")]
        actor: String,

        /// Print the summary only, write no report files
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Copy a value to, or delete it from, target environments
    Resolve {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        key: String,

        /// copy | delete
        #[arg(short, long)]
        action: String,

        /// Source environment (required for copy)
        #[arg(long)]
        from: Option<Environment>,

        /// Target environment, repeatable
        #[arg(long = "to", required = true, num_args = 1..)]
        to: Vec<Environment>,

        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Create the entries and services tables
    Migrate,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Report format: json | html | all
    #[arg(short, long)]
    format: Option<String>,

    /// Report directory (overrides [output].dir)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else if cli.quiet {
        LogLevel::Error
    } else {
        LogLevel::Info
    };
    envsync::init_tracing(level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Detect { input, output } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let entries: Vec<ConfigEntry> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse entries from {}", input.display()))?;

            let conflicts = envsync::detect_conflicts(&entries);
            let project = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "detect".into());
            let report = ScanReport::new(ProjectId(project), entries.len(), conflicts);

            print_scan_summary(&report);
            if output.format.is_some() {
                let dir = output.out.clone().unwrap_or_else(|| "./output".into());
                write_reports(&report, &output, &dir)?;
            }
            Ok(exit_for_scan(&report))
        }

        Command::Scan {
            project,
            actor,
            dry_run,
            output,
        } => {
            let cfg = load_config(cli.config.as_deref())?;
            let (report, perf) =
                envsync::scan_with_timing(&cfg, &ProjectId(project), &actor).await?;

            print_scan_summary(&report);
            if cli.verbose {
                print_perf_summary(&perf);
            }
            if !dry_run {
                let dir = output
                    .out
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&cfg.output.dir));
                write_reports(&report, &output, &dir)?;
            }
            Ok(exit_for_scan(&report))
        }

        Command::Resolve {
            project,
            key,
            action,
            from,
            to,
            actor,
        } => {
            let cfg = load_config(cli.config.as_deref())?;
            let request = ResolveRequest {
                project_id: ProjectId(project),
                key_name: key,
                source_environment: from,
                target_environments: to,
                action: action.parse::<ResolutionAction>()?,
            };

            let (report, perf) = envsync::resolve_with_timing(&cfg, &request, &actor).await?;
            let failed = print_resolution(&request, &report);
            if cli.verbose {
                print_perf_summary(&perf);
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Migrate => {
            let cfg = load_config(cli.config.as_deref())?;
            envsync::migrate(&cfg).await?;
            println!("Tables are ready.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);
    AppConfig::load(&path.to_string_lossy())
}

/// Exit code 2 when critical conflicts remain, so CI can gate on it.
fn exit_for_scan(report: &ScanReport) -> ExitCode {
    if report.has_critical() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn write_reports(report: &ScanReport, output: &OutputArgs, dir: &Path) -> Result<()> {
    match output.format.as_deref().unwrap_or("all") {
        "all" => {
            for writer in all_writers() {
                let path = write_to_file(&*writer, report, dir)?;
                println!("Report written to {}", path.display());
            }
        }
        fmt => {
            let writer =
                writer_for(fmt).ok_or_else(|| anyhow::anyhow!("Unknown format: {}", fmt))?;
            let path = write_to_file(&*writer, report, dir)?;
            println!("Report written to {}", path.display());
        }
    }
    Ok(())
}
