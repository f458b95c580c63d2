use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rnv8_patcher::config::{load_for_project, load_from_path, PatchConfig};
use rnv8_patcher::edit::EditError;
use rnv8_patcher::{FileDiff, PatchError, PatchOutcome, Patcher, ProjectPaths};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rnv8-patcher")]
#[command(about = "Switch a React Native project to the V8 JavaScript runtime", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a bare React Native project
    Apply {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Config file (defaults to <project>/rnv8-patcher.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only patch the native build (Gradle, properties, host sources)
        #[arg(long, conflicts_with = "hint_only")]
        support_only: bool,

        /// Only patch the entry script
        #[arg(long)]
        hint_only: bool,

        /// Leave gradle.properties untouched
        #[arg(long)]
        no_heap: bool,

        /// Fail when no application host file is found
        #[arg(long)]
        strict_hosts: bool,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which patches would apply without writing anything
    Status {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Config file (defaults to <project>/rnv8-patcher.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the Expo prebuild sections
    Expo {
        /// Path to project root (auto-detected if not specified)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Also patch the iOS AppDelegate
        #[arg(long)]
        ios: bool,

        /// Skip android/app/build.gradle
        #[arg(long)]
        no_android: bool,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

/// Which runtime patches an `apply` run stages.
#[derive(Debug, Clone, Copy)]
struct Selection {
    support: bool,
    hint: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            project,
            config,
            support_only,
            hint_only,
            no_heap,
            strict_hosts,
            dry_run,
            diff,
        } => {
            let selection = Selection {
                support: !hint_only,
                hint: !support_only,
            };
            cmd_apply(
                project,
                config,
                selection,
                no_heap,
                strict_hosts,
                dry_run,
                diff,
            )
        }

        Commands::Status { project, config } => cmd_status(project, config),

        Commands::Expo {
            project,
            ios,
            no_android,
            dry_run,
            diff,
        } => cmd_expo(project, !no_android, ios, dry_run, diff),
    }
}

/// Diagnostics go to stderr so they never mix with the patch report.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("RNV8_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve project path using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --project flag
/// 2. RNV8_PROJECT environment variable
/// 3. Auto-detect from current directory
fn resolve_project(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_project {
        return path
            .canonicalize()
            .with_context(|| format!("project directory not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("RNV8_PROJECT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: RNV8_PROJECT is set but path doesn't exist: {env_path}").yellow()
        );
    }

    if let Some(path) = auto_detect_project() {
        println!(
            "{}",
            format!("Auto-detected project: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find a React Native project.".red(),
        "Try one of:".bold(),
        "1. cd into your project directory: cd /path/to/AwesomeProject && rnv8-patcher apply",
        "2. Specify explicitly: rnv8-patcher apply --project /path/to/AwesomeProject",
        "3. Set environment variable: export RNV8_PROJECT=/path/to/AwesomeProject"
    )
}

/// Walk up from the current directory looking for `package.json` next to
/// an `android/` directory.
fn auto_detect_project() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;
    current
        .ancestors()
        .find(|dir| dir.join("package.json").is_file() && dir.join("android").is_dir())
        .map(Path::to_path_buf)
}

fn load_config(project: &Path, config: Option<PathBuf>) -> Result<PatchConfig> {
    let config = match config {
        Some(path) => load_from_path(&path)?,
        None => load_for_project(project)?,
    };
    Ok(config)
}

fn cmd_apply(
    project: Option<PathBuf>,
    config: Option<PathBuf>,
    selection: Selection,
    no_heap: bool,
    strict_hosts: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let project = resolve_project(project)?;
    let config = load_config(&project, config)?;

    let mut options = config.options;
    if no_heap {
        options.increase_heap = false;
    }
    if strict_hosts {
        options.strict_hosts = true;
    }

    println!("Project: {}", project.display());
    println!("Runtime: {}", options.runtime_package);
    println!();

    let mut patcher = Patcher::new(ProjectPaths::new(&project, config.paths), options)?;
    let planned = stage_runtime(&mut patcher, selection);

    finish(patcher, planned, dry_run, show_diff)
}

fn cmd_status(project: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let project = resolve_project(project)?;
    let config = load_config(&project, config)?;

    println!("Project: {}", project.display());
    println!();

    let mut patcher = Patcher::new(ProjectPaths::new(&project, config.paths), config.options)?;
    let everything = Selection {
        support: true,
        hint: true,
    };
    let planned = stage_runtime(&mut patcher, everything);

    let summary = print_reports(&patcher, true);
    if let Err(err) = planned {
        report_failure(&err);
        std::process::exit(1);
    }

    println!();
    if summary.applied == 0 {
        println!("{}", "Project is fully patched".green());
    } else {
        println!(
            "{}",
            format!("{} step(s) would change the project", summary.applied).yellow()
        );
    }
    Ok(())
}

fn cmd_expo(
    project: Option<PathBuf>,
    android: bool,
    ios: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let project = resolve_project(project)?;
    let config = load_config(&project, None)?;

    println!("Project: {}", project.display());
    println!();

    let mut patcher = Patcher::new(ProjectPaths::new(&project, config.paths), config.options)?;
    let planned = patcher.add_expo_adapter(android, ios);

    finish(patcher, planned, dry_run, show_diff)
}

fn stage_runtime(patcher: &mut Patcher, selection: Selection) -> Result<(), PatchError> {
    if selection.support {
        patcher.add_runtime_support()?;
    }
    if selection.hint {
        patcher.add_runtime_hint()?;
    }
    Ok(())
}

fn finish(
    patcher: Patcher,
    planned: Result<(), PatchError>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
    }

    let summary = print_reports(&patcher, dry_run);

    if let Err(err) = planned {
        report_failure(&err);
        eprintln!("{}", "No files were written.".red());
        print_summary(&summary, 1);
        std::process::exit(1);
    }

    if show_diff {
        for diff in patcher.diffs() {
            display_diff(&diff);
        }
    }

    let mut failed = 0;
    if !dry_run {
        match patcher.commit() {
            Ok(written) => {
                println!();
                println!("Wrote {} file(s)", written.len());
            }
            Err(err) => {
                report_failure(&err);
                failed = 1;
            }
        }
    }

    println!();
    print_summary(&summary, failed);

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Summary {
    applied: usize,
    already_applied: usize,
    skipped: usize,
}

fn print_reports(patcher: &Patcher, planning: bool) -> Summary {
    let root = patcher.paths().root();
    let mut summary = Summary::default();

    for report in patcher.reports() {
        let file = report.file.strip_prefix(root).unwrap_or(&report.file);
        match &report.outcome {
            PatchOutcome::Applied { strategy } => {
                let verb = if planning { "Would apply to" } else { "Applied to" };
                println!(
                    "{} {}: {} {} ({})",
                    "✓".green(),
                    report.step,
                    verb,
                    file.display(),
                    strategy.dimmed()
                );
                summary.applied += 1;
            }
            PatchOutcome::AlreadyApplied => {
                println!(
                    "{} {}: Already applied to {}",
                    "⊙".yellow(),
                    report.step,
                    file.display()
                );
                summary.already_applied += 1;
            }
            PatchOutcome::NotApplicable { reason } => {
                println!(
                    "{} {}: Skipped {} ({})",
                    "⊘".cyan(),
                    report.step,
                    file.display(),
                    reason
                );
                summary.skipped += 1;
            }
        }
    }

    summary
}

fn print_summary(summary: &Summary, failed: usize) {
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", summary.applied).green());
    println!(
        "  {} already applied",
        format!("{}", summary.already_applied).yellow()
    );
    println!("  {} skipped", format!("{}", summary.skipped).cyan());
    println!("  {} failed", format!("{failed}").red());
}

fn report_failure(err: &PatchError) {
    eprintln!("{} {}", "✗".red(), err);

    match err {
        PatchError::BlockNotFound { file, block } => {
            eprintln!("  {}", format!("CONFLICT: no top-level '{block}' block").red());
            eprintln!("  File: {}", file.display());
            eprintln!("  Possible causes:");
            eprintln!("    - The block is indented or nested under another block");
            eprintln!("    - The build script was converted to the Kotlin DSL");
        }
        PatchError::UnbalancedBlock { file, .. } | PatchError::UnsupportedLayout { file, .. } => {
            eprintln!("  File: {}", file.display());
            eprintln!("  Action: Reformat the block so its braces sit on their own lines");
        }
        PatchError::AnchorNotFound { file, tried } => {
            eprintln!("  {}", "CONFLICT: no insertion point found".red());
            eprintln!("  File: {}", file.display());
            eprintln!("  Tried: {tried}");
        }
        PatchError::UnsupportedEngine { file, platform, .. } => {
            eprintln!("  File: {}", file.display());
            eprintln!("  Action: Set expo.jsEngine (or expo.{platform}.jsEngine) to \"jsc\"");
        }
        PatchError::NoHostFiles { root, .. } => {
            eprintln!("  Searched: {}", root.display());
            eprintln!("  Action: Set paths.host_file_names in rnv8-patcher.toml");
        }
        PatchError::Edit(EditError::ConcurrentModification { path }) => {
            eprintln!("  {}", "CONFLICT: file changed while patching".red());
            eprintln!("  File: {}", path.display());
            eprintln!("  Action: Re-run once other tools have finished writing");
        }
        _ => {}
    }
}

/// Helper: Print a staged file's unified diff with colored hunks
fn display_diff(diff: &FileDiff) {
    println!();
    for line in diff.unified.lines() {
        let styled = if line.starts_with("---") || line.starts_with("+++") {
            line.dimmed()
        } else if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else {
            line.normal()
        };
        println!("{styled}");
    }
}
