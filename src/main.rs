use std::path::PathBuf;

use anyhow::Context;
use attendance_report::clean::clean_dataset;
use attendance_report::columns::{Role, RoleMap};
use attendance_report::config::{ReportOptions, UploadPolicy, DEFAULT_MAX_BYTES};
use attendance_report::models::Dataset;
use attendance_report::report::{build_report, render_markdown, Report, ReportDocument};
use attendance_report::{decode, logging, DecodeError};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "attendance-report")]
#[command(about = "Attendance and intervention analytics for student record spreadsheets", long_about = None)]
struct Cli {
    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full analytics report
    Report {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        limits: Limits,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show which column each role resolved to
    Columns {
        #[command(flatten)]
        source: Source,
    },
    /// Rank students by non-attendance
    Top {
        #[command(flatten)]
        source: Source,
        /// Rank within one module instead of across all modules
        #[arg(long)]
        module: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Args)]
struct Source {
    /// Spreadsheet to analyse (.csv, .xlsx, .xlsm, .xls, .ods)
    #[arg(long)]
    input: PathBuf,
    /// Largest accepted file in bytes
    #[arg(long, env = "ATTENDANCE_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    max_bytes: u64,
}

#[derive(Args)]
struct Limits {
    #[arg(long, env = "ATTENDANCE_TOP_REASONS")]
    top_reasons: Option<usize>,
    #[arg(long, env = "ATTENDANCE_TOP_STUDENTS")]
    top_students: Option<usize>,
    #[arg(long, env = "ATTENDANCE_TOP_STUDENTS_PER_MODULE")]
    top_students_per_module: Option<usize>,
    #[arg(long, env = "ATTENDANCE_REPEATED_STUDENTS")]
    repeated_students: Option<usize>,
    #[arg(long, env = "ATTENDANCE_REPEATED_PREVIEW_ROWS")]
    repeated_preview_rows: Option<usize>,
    #[arg(long, env = "ATTENDANCE_SAMPLE_ROWS")]
    sample_rows: Option<usize>,
}

impl Limits {
    fn options(&self) -> ReportOptions {
        let defaults = ReportOptions::default();
        ReportOptions {
            top_reasons: self.top_reasons.unwrap_or(defaults.top_reasons),
            top_students_global: self.top_students.unwrap_or(defaults.top_students_global),
            top_students_per_module: self
                .top_students_per_module
                .unwrap_or(defaults.top_students_per_module),
            repeated_students: self.repeated_students.unwrap_or(defaults.repeated_students),
            repeated_preview_rows: self
                .repeated_preview_rows
                .unwrap_or(defaults.repeated_preview_rows),
            sample_rows: self.sample_rows.unwrap_or(defaults.sample_rows),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Report {
            source,
            limits,
            format,
            out,
        } => {
            let (file_name, dataset) = load(&source).await?;
            let report = build(dataset, limits.options()).await?;
            let document = ReportDocument::new(file_name, report);
            let rendered = match format {
                Format::Json => {
                    serde_json::to_string_pretty(&document).context("failed to serialise report")?
                }
                Format::Markdown => render_markdown(&document),
            };
            match out {
                Some(path) => {
                    tokio::fs::write(&path, rendered)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Columns { source } => {
            let (_, dataset) = load(&source).await?;
            let (dataset, _) = clean_dataset(dataset);
            let roles = RoleMap::resolve(&dataset.columns);
            println!("Resolved columns:");
            for role in Role::ALL {
                match roles.column(role) {
                    Some(column) => println!("- {role}: {column}"),
                    None => println!("- {role}: (not found)"),
                }
            }
        }
        Commands::Top {
            source,
            module,
            limit,
        } => {
            let (_, dataset) = load(&source).await?;
            let report = build(dataset, ReportOptions::default()).await?;
            let ranked = match module.as_deref() {
                Some(module) => report
                    .students
                    .module_top_students_att
                    .get(module)
                    .cloned()
                    .unwrap_or_default(),
                None => report.students.global_top_students_att.clone(),
            };

            if ranked.is_empty() {
                println!("No non-attendance found.");
                return Ok(());
            }

            match module.as_deref() {
                Some(module) => println!("Top students by non-attendance in {module}:"),
                None => println!("Top students by non-attendance:"),
            }
            for student in ranked.iter().take(limit) {
                println!(
                    "- {} {} absences ({:.1}% of estimated sessions)",
                    student.label, student.count, student.rate
                );
            }
        }
    }

    Ok(())
}

/// Reads and decodes the input off the async runtime. Decode failures keep
/// their message and end the command.
async fn load(source: &Source) -> anyhow::Result<(String, Dataset)> {
    let file_name = source
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let policy = UploadPolicy::with_max_bytes(source.max_bytes);

    let metadata = tokio::fs::metadata(&source.input)
        .await
        .with_context(|| format!("failed to open {}", source.input.display()))?;
    policy
        .check(&file_name, metadata.len())
        .map_err(read_failure)?;

    let bytes = tokio::fs::read(&source.input)
        .await
        .with_context(|| format!("failed to read {}", source.input.display()))?;
    info!(file = %file_name, bytes = bytes.len(), "loaded upload");

    let name = file_name.clone();
    let dataset = tokio::task::spawn_blocking(move || decode::decode(&name, bytes))
        .await
        .context("decode task failed")?
        .map_err(read_failure)?;
    Ok((file_name, dataset))
}

async fn build(dataset: Dataset, options: ReportOptions) -> anyhow::Result<Report> {
    tokio::task::spawn_blocking(move || build_report(dataset, &options))
        .await
        .context("report task failed")
}

fn read_failure(err: DecodeError) -> anyhow::Error {
    anyhow::anyhow!("Failed to read spreadsheet: {err}")
}
