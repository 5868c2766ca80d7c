use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::glob;
use pcapdiff_core::{
    CaptureLoader, ComparisonResult, DEFAULT_ALIGNMENT_THRESHOLD, DEFAULT_TIME_WINDOW, DiffConfig,
    DiffType, IngestError, LoadedCapture, PacketDiffer, UntimestampedPolicy,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod export;

const SAMPLE_DIFFS: usize = 10;
const SAMPLE_FIELDS: usize = 3;
/// Inputs at least this large log decode progress.
const PROGRESS_MIN_BYTES: u64 = 16 * 1024 * 1024;
const PROGRESS_STEP: u64 = 10_000;
const GLOB_MATCHES_SHOWN: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "pcapdiff")]
#[command(version, long_version = long_version())]
#[command(
    about = "Field-level comparison of two packet captures (pcap / pcapng).",
    long_about = None,
    after_help = "Examples:\n  pcapdiff compare before.pcapng after.pcapng\n  pcapdiff compare -t 0.5 --export html a.pcap b.pcap\n  pcapdiff compare a.pcap b.pcap -e json -o diff.json --pretty"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align two captures by timestamp and report per-field differences.
    #[command(alias = "diff")]
    Compare(CompareArgs),
}

#[derive(clap::Args, Debug)]
struct CompareArgs {
    /// First (reference) capture; a glob pattern must match exactly one file
    file1: PathBuf,

    /// Second capture; a glob pattern must match exactly one file
    file2: PathBuf,

    /// Maximum timestamp difference (seconds) for two packets to match
    #[arg(short = 't', long, default_value_t = DEFAULT_TIME_WINDOW)]
    time_window: f64,

    /// Minimum similarity for alignment, in [0, 1] (validated, not yet enforced)
    #[arg(long, default_value_t = DEFAULT_ALIGNMENT_THRESHOLD)]
    alignment_threshold: f64,

    /// Extra field to ignore, as `field` or `layer.field` (repeatable)
    #[arg(long = "ignore-field", value_name = "NAME")]
    ignore_fields: Vec<String>,

    /// Pair packets without timestamps by position instead of skipping them
    #[arg(long)]
    align_untimestamped: bool,

    /// Export the comparison as a report file
    #[arg(short = 'e', long, value_enum)]
    export: Option<ExportFormat>,

    /// Report path (default: pcap_diff_report.<format>)
    #[arg(short = 'o', long, requires = "export")]
    output: Option<PathBuf>,

    /// Pretty-print JSON exports
    #[arg(long)]
    pretty: bool,

    /// Suppress the console summary
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log alignment and cache details to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Exit with a non-zero code if any packet differs
    #[arg(long)]
    fail_on_diff: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Txt,
    Html,
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit: ",
        env!("PCAPDIFF_BUILD_COMMIT"),
        "\nbuilt: ",
        env!("PCAPDIFF_BUILD_DATE")
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare(args) => {
            init_logging(args.verbose, args.quiet);
            cmd_compare(args)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

/// `RUST_LOG` wins over the flags when set.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        let message = err
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        CliError::new(message, None)
    }
}

impl From<IngestError> for CliError {
    fn from(err: IngestError) -> Self {
        let hint = match &err {
            IngestError::NotFound(_) => "check the path; expected a .pcap or .pcapng file",
            IngestError::Io { .. } => "check file permissions",
            IngestError::Source { .. } => "the file is not a readable pcap/pcapng capture",
        };
        CliError::new(err.to_string(), Some(hint.to_string()))
    }
}

fn cmd_compare(args: CompareArgs) -> Result<(), CliError> {
    let file1 = resolve_input_path(&args.file1)?;
    let file2 = resolve_input_path(&args.file2)?;
    validate_input_file(&file1)?;
    validate_input_file(&file2)?;

    let mut config = DiffConfig::default()
        .with_time_window(args.time_window)
        .with_alignment_threshold(args.alignment_threshold)
        .with_ignore_fields(&args.ignore_fields);
    if args.align_untimestamped {
        config = config.with_untimestamped(UntimestampedPolicy::AlignByPosition);
    }
    let differ = PacketDiffer::new(config).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("use a time window >= 0 and a threshold between 0 and 1".to_string()),
        )
    })?;

    let report_path = args.export.map(|format| {
        args.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("pcap_diff_report.{}", format.extension())))
    });
    if let Some(report_path) = report_path.as_ref() {
        ensure_distinct_output(report_path, &[&file1, &file2])?;
    }

    let loader = CaptureLoader::new();
    let first = load_input(&loader, &file1)?;
    let second = load_input(&loader, &file2)?;
    if !args.quiet {
        println!("Loaded {} packets from {}", first.capture.len(), file1.display());
        println!("Loaded {} packets from {}", second.capture.len(), file2.display());
    }

    info!(
        file1 = %file1.display(),
        file2 = %file2.display(),
        time_window = differ.config().time_window,
        "comparing captures"
    );
    let result = differ.compare_captures(
        &first.capture,
        &second.capture,
        first.metadata.clone(),
        second.metadata.clone(),
    );

    if !args.quiet {
        print_summary(&result);
    }

    if let (Some(format), Some(report_path)) = (args.export, report_path) {
        let contents = export::render(&result, format, args.pretty)
            .context("failed to render report")?;
        if let Some(parent) = report_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        fs::write(&report_path, contents)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
        if !args.quiet {
            eprintln!("OK: report written -> {}", report_path.display());
        }
    }

    if args.fail_on_diff && result.has_differences() {
        return Err(CliError::new(
            "captures differ",
            Some("run without --fail-on-diff to only report differences".to_string()),
        ));
    }
    Ok(())
}

fn load_input(loader: &CaptureLoader, path: &Path) -> Result<Arc<LoadedCapture>, CliError> {
    let large = fs::metadata(path).is_ok_and(|meta| meta.len() >= PROGRESS_MIN_BYTES);
    if !large {
        return Ok(loader.load(path)?);
    }
    let loaded = loader.load_with_progress(path, |current, total| {
        if current % PROGRESS_STEP == 0 || current == total {
            info!(path = %path.display(), current, total, "decoding capture");
        }
    })?;
    Ok(loaded)
}

fn print_summary(result: &ComparisonResult) {
    println!("File 1: {}", result.file1_metadata.summary());
    println!("File 2: {}", result.file2_metadata.summary());
    println!();
    println!("{}", "=".repeat(60));
    println!("COMPARISON RESULTS");
    println!("{}", "=".repeat(60));
    println!("{}", result.summary());

    println!();
    println!("Detailed breakdown:");
    for (diff_type, count) in result.diff_counts().iter() {
        println!("  {} packets: {}", diff_type.title(), count);
    }
    if result.excluded_packets_1 > 0 || result.excluded_packets_2 > 0 {
        println!(
            "  Skipped (no timestamp): {} / {}",
            result.excluded_packets_1, result.excluded_packets_2
        );
    }

    let samples: Vec<_> = result
        .packet_diffs
        .iter()
        .filter(|diff| diff.has_differences())
        .take(SAMPLE_DIFFS)
        .collect();
    if samples.is_empty() {
        return;
    }
    println!();
    println!("Sample differences (showing first {SAMPLE_DIFFS}):");
    for diff in samples {
        println!("  Packet {}: {}", diff.packet_id, diff.summary());
        if diff.diff_type != DiffType::Modified {
            continue;
        }
        for (layer, fields) in &diff.layer_diffs {
            let names: Vec<_> = fields.keys().take(SAMPLE_FIELDS).map(String::as_str).collect();
            println!("    {}: {}", layer, names.join(", "));
        }
    }
}

fn ensure_distinct_output(report_path: &Path, inputs: &[&Path]) -> Result<(), CliError> {
    let report_dir = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent),
        _ => fs::canonicalize("."),
    };
    // A missing parent directory is created later, so it cannot hold an input.
    let Ok(report_dir) = report_dir else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path: {}", report_path.display()))?;
    let report_target = report_dir.join(file_name);

    for input in inputs {
        let input_abs = fs::canonicalize(input)
            .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
        if report_target == input_abs {
            return Err(CliError::new(
                format!(
                    "report path must differ from inputs: {}",
                    report_path.display()
                ),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let meta = fs::metadata(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !pcapdiff_core::is_valid_capture_file(input) {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap, .pcapng or .cap capture file".to_string()),
        ));
    }
    Ok(())
}

/// Expand a glob input to the single capture file it names.
fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let bad_pattern = |detail: String| {
        CliError::new(
            format!("invalid input pattern '{pattern}'"),
            Some(format!("pattern error: {detail}")),
        )
    };
    let mut files = Vec::new();
    for entry in glob(&pattern).map_err(|err| bad_pattern(err.msg.to_string()))? {
        let path = entry.map_err(|err| bad_pattern(err.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }

    match files.as_slice() {
        [] => Err(CliError::new(
            format!("no files match pattern '{pattern}'"),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        [capture] => Ok(capture.clone()),
        many => {
            let shown: Vec<_> = many
                .iter()
                .take(GLOB_MATCHES_SHOWN)
                .map(|path| path.display().to_string())
                .collect();
            let more = if many.len() > GLOB_MATCHES_SHOWN { ", ..." } else { "" };
            Err(CliError::new(
                format!(
                    "multiple files match pattern '{pattern}' ({} matches): {}{more}",
                    many.len(),
                    shown.join(", ")
                ),
                Some("pass a single capture file per side".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
