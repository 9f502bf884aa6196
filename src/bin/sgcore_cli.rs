//! sgcore-cli: command-line front end over the sgcore library, one
//! subcommand per host-facing tool-surface operation (spec §6).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sgcore::core::config::CoreConfig;
use sgcore::core::context::CoreContext;
use sgcore::core::errors::CoreError;
use sgcore::core::model::{ApplyReport, RankedCandidate, RefactoringPlan, Severity, Violation};
use sgcore::executor::SubprocessMatcher;
use sgcore::tools::{self, FixTypes};

/// JSON/text-renderable shape for `analyze-deduplication-candidates` output.
#[derive(serde::Serialize)]
struct AnalysisOutput {
    top_candidates: Vec<RankedCandidate>,
    savings: i64,
    total_groups_found: usize,
}

/// Output rendering mode shared by every subcommand.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON (default).
    Json,
    /// Human-readable table/summary.
    Text,
}

#[derive(Parser)]
#[command(name = "sgcore", version = sgcore::VERSION, about = "Structural code analysis and refactoring")]
struct Cli {
    /// Emit debug-level logs.
    #[arg(long, global = true)]
    verbose: bool,

    /// Rendering mode for command output.
    #[arg(short = 'o', long, global = true, value_enum, default_value = "json")]
    output: OutputFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Json,
    Text,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Text => OutputFormat::Text,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List duplicate groups without ranking or enrichment.
    FindDuplication {
        /// Project root to scan.
        project_root: PathBuf,
        /// Target language.
        #[arg(long)]
        language: String,
        /// Minimum hybrid similarity for a pair to be accepted.
        #[arg(long)]
        min_similarity: Option<f64>,
        /// Minimum construct line count to be considered.
        #[arg(long)]
        min_lines: Option<usize>,
        /// Glob patterns excluded from the file set.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Run the full orchestrated pipeline and return ranked candidates.
    AnalyzeDeduplicationCandidates {
        /// Project root to scan.
        project_root: PathBuf,
        /// Target language.
        #[arg(long)]
        language: String,
        /// Minimum hybrid similarity for a pair to be accepted.
        #[arg(long)]
        min_similarity: Option<f64>,
        /// Minimum construct line count to be considered.
        #[arg(long)]
        min_lines: Option<usize>,
        /// Truncate ranked candidates to this many.
        #[arg(long)]
        max_candidates: Option<usize>,
        /// Glob patterns excluded from the file set.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Apply a materialized refactoring plan (JSON file) to a project.
    ApplyDeduplication {
        /// Project root to modify.
        project_root: PathBuf,
        /// Path to a JSON-encoded `RefactoringPlan`.
        #[arg(long)]
        plan: PathBuf,
        /// Actually write files (default is dry-run, per spec §7).
        #[arg(long)]
        no_dry_run: bool,
        /// Skip snapshotting a backup before writing.
        #[arg(long)]
        no_backup: bool,
    },
    /// Run rule-based enforcement and report violations.
    EnforceStandards {
        /// Project root to scan.
        project_root: PathBuf,
        /// Target language.
        #[arg(long)]
        language: String,
        /// Built-in rule set name (`recommended`, `security`, `performance`, `style`, `all`).
        #[arg(long)]
        rule_set: Option<String>,
        /// Custom rule ids to restrict to, within the merged set.
        #[arg(long, value_delimiter = ',')]
        custom_rules: Vec<String>,
        /// Minimum severity surfaced.
        #[arg(long, value_enum, default_value = "info")]
        severity_threshold: SeverityArg,
        /// Stop after this many violations (0 = unlimited).
        #[arg(long, default_value_t = 0)]
        max_violations: usize,
        /// Worker pool size for parallel rule execution.
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },
    /// Apply fixes for a batch of violations (JSON file) produced by `enforce-standards`.
    ApplyStandardsFixes {
        /// Project root to modify.
        project_root: PathBuf,
        /// Path to a JSON-encoded list of `Violation`.
        #[arg(long)]
        violations: PathBuf,
        /// Which fix-safety classes to apply.
        #[arg(long, value_enum, default_value = "safe")]
        fix_types: FixTypesArg,
        /// Actually write files (default is dry-run, per spec §7).
        #[arg(long)]
        no_dry_run: bool,
        /// Skip snapshotting a backup before writing.
        #[arg(long)]
        no_backup: bool,
    },
    /// Restore a backup by id.
    RollbackRewrite {
        /// Backup id to restore.
        backup_id: String,
        /// Backups root directory.
        #[arg(long)]
        backups_root: PathBuf,
    },
    /// List every known backup.
    ListBackups {
        /// Backups root directory.
        #[arg(long)]
        backups_root: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FixTypesArg {
    Safe,
    Suggested,
    All,
}

impl From<FixTypesArg> for FixTypes {
    fn from(value: FixTypesArg) -> Self {
        match value {
            FixTypesArg::Safe => FixTypes::Safe,
            FixTypesArg::Suggested => FixTypes::Suggested,
            FixTypesArg::All => FixTypes::All,
        }
    }
}

fn default_backups_root(project_root: &std::path::Path) -> PathBuf {
    CoreConfig::default().backup.resolve_root(project_root)
}

fn print_result<T: serde::Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Exit codes per the tool-surface contract: 0 success, 1 caller/input error,
/// 2 matcher/runtime error, 3 validation failure after an apply.
fn exit_code_for(error: &CoreError) -> i32 {
    match error {
        CoreError::InvalidInput { .. } | CoreError::InvalidPattern { .. } => 1,
        CoreError::Validation { .. } => 3,
        _ => 2,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).with_target(false).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err.downcast_ref::<CoreError>().map(exit_code_for).unwrap_or(1);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let output: OutputFormat = cli.output.into();

    match cli.command {
        Commands::FindDuplication { project_root, language, min_similarity, min_lines, exclude } => {
            let context = CoreContext::new(CoreConfig::default());
            let matcher = SubprocessMatcher::new(&context.config.executor.matcher_binary);
            let groups = tools::find_duplication(&matcher, &context, project_root, language, min_similarity, min_lines, exclude).await?;
            print_result(&groups, output)?;
            Ok(0)
        }
        Commands::AnalyzeDeduplicationCandidates { project_root, language, min_similarity, min_lines, max_candidates, exclude } => {
            let context = CoreContext::new(CoreConfig::default());
            let matcher = SubprocessMatcher::new(&context.config.executor.matcher_binary);
            let verbose = cli.verbose;
            let analysis = tools::analyze_deduplication_candidates(
                &matcher,
                &context,
                project_root,
                language,
                min_similarity,
                min_lines,
                max_candidates,
                exclude,
                |p| {
                    if verbose {
                        tracing::debug!(stage = p.stage, fraction = p.fraction, "progress");
                    }
                },
            )
            .await?;
            print_result(&AnalysisOutput {
                top_candidates: analysis.top_candidates,
                savings: analysis.savings,
                total_groups_found: analysis.analysis,
            }, output)?;
            Ok(0)
        }
        Commands::ApplyDeduplication { project_root, plan, no_dry_run, no_backup } => {
            let plan_content = std::fs::read_to_string(&plan)?;
            let plan: RefactoringPlan = serde_json::from_str(&plan_content)?;
            let backups_root = default_backups_root(&project_root);
            let report: ApplyReport = tools::apply_deduplication(backups_root, &plan, project_root, !no_dry_run, !no_backup).await?;
            let code = if report.validation_passed { 0 } else { 3 };
            print_result(&report, output)?;
            Ok(code)
        }
        Commands::EnforceStandards { project_root, language, rule_set, custom_rules, severity_threshold, max_violations, parallelism } => {
            let context = CoreContext::new(CoreConfig::default());
            let matcher = SubprocessMatcher::new(&context.config.executor.matcher_binary);
            let result = tools::enforce_standards(
                &matcher,
                &context,
                project_root,
                language,
                rule_set,
                custom_rules,
                Vec::new(),
                Vec::new(),
                Some(severity_threshold.into()),
                Some(max_violations),
                Some(parallelism),
                &context.config.rule_engine.rule_dir_name,
            )
            .await?;
            print_result(&result, output)?;
            Ok(0)
        }
        Commands::ApplyStandardsFixes { project_root, violations, fix_types, no_dry_run, no_backup } => {
            let violations_content = std::fs::read_to_string(&violations)?;
            let violations: Vec<Violation> = serde_json::from_str(&violations_content)?;
            let backups_root = default_backups_root(&project_root);
            let result = tools::apply_standards_fixes(backups_root, &violations, project_root, fix_types.into(), !no_dry_run, !no_backup)?;
            let code = if result.validation_passed { 0 } else { 3 };
            print_result(&result, output)?;
            Ok(code)
        }
        Commands::RollbackRewrite { backup_id, backups_root } => {
            let report = tools::rollback_rewrite(backups_root, &backup_id)?;
            print_result(&report, output)?;
            Ok(0)
        }
        Commands::ListBackups { backups_root } => {
            let entries = tools::list_backups(backups_root)?;
            print_result(&entries, output)?;
            Ok(0)
        }
    }
}
