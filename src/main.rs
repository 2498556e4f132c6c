use paper_diff::constant::MEMO_CAPACITY;
use paper_diff::diff::{
    DiffLineData, DiffLineType, LineError, ReconstructionMemo, SideBySideRowData,
    UnknownDiffMode, calculate_stats,
};
use paper_diff::{Config, DiffError, DiffMode, DiffOrchestrator};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: paper-diff <old> <new> [lines|words|chars|json|smart] [unified|split]";

#[derive(Error, Debug)]
enum CliError {
    #[error("Invalid arguments")]
    Usage,

    #[error("Unknown layout: {0}")]
    Layout(String),

    #[error(transparent)]
    Mode(#[from] UnknownDiffMode),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Lines(#[from] LineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Unified,
    Split,
}

struct Args {
    old: PathBuf,
    new: PathBuf,
    mode: DiffMode,
    layout: Layout,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, CliError> {
    let old = args.next().map(PathBuf::from).ok_or(CliError::Usage)?;
    let new = args.next().map(PathBuf::from).ok_or(CliError::Usage)?;
    let mode = match args.next() {
        Some(mode) => mode.parse()?,
        None => DiffMode::Lines,
    };
    let layout = match args.next().as_deref() {
        None | Some("unified") => Layout::Unified,
        Some("split") => Layout::Split,
        Some(other) => return Err(CliError::Layout(other.to_string())),
    };
    if args.next().is_some() {
        return Err(CliError::Usage);
    }

    Ok(Args {
        old,
        new,
        mode,
        layout,
    })
}

fn read(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn line_number(number: Option<usize>) -> String {
    number.map(|n| n.to_string()).unwrap_or_default()
}

fn render_line(line: &DiffLineData) -> String {
    match line.line_type {
        DiffLineType::Collapsed => format!(
            "{:>5} {:>5}   @@ {} unchanged lines @@",
            "",
            "",
            line.hidden_lines.unwrap_or(0)
        ),
        line_type => {
            let marker = match line_type {
                DiffLineType::Add => '+',
                DiffLineType::Remove => '-',
                _ if line.is_modified => '~',
                _ => ' ',
            };
            format!(
                "{:>5} {:>5} {} {}",
                line_number(line.old_line_num),
                line_number(line.new_line_num),
                marker,
                line.content
            )
        }
    }
}

fn render_row(row: &SideBySideRowData) -> String {
    let side = |line: &Option<DiffLineData>| match line {
        Some(line) if line.line_type == DiffLineType::Collapsed => {
            format!("@@ {} hidden @@", line.hidden_lines.unwrap_or(0))
        }
        Some(line) => line.content.clone(),
        None => String::new(),
    };
    format!("{:<40} | {}", side(&row.left), side(&row.right))
}

fn run() -> Result<(), CliError> {
    let args = parse_args(std::env::args().skip(1))?;
    let old = read(&args.old)?;
    let new = read(&args.new)?;

    let config = Config::default();
    let orchestrator = DiffOrchestrator::new(&config.settings);
    let note_id = args.new.display().to_string();
    let changes = orchestrator.generate_diff(
        &note_id,
        &args.old.display().to_string(),
        &args.new.display().to_string(),
        &old,
        &new,
        args.mode,
    )?;

    let mut memo = ReconstructionMemo::new(MEMO_CAPACITY, config.settings.context_size);
    match args.layout {
        Layout::Unified => {
            for line in memo.unified(&changes, args.mode)?.iter() {
                println!("{}", render_line(line));
            }
        }
        Layout::Split => {
            for row in memo.side_by_side(&changes, args.mode)?.iter() {
                println!("{}", render_row(row));
            }
        }
    }

    let stats = calculate_stats(&changes);
    println!(
        "\n{} lines added, {} lines removed (+{} / -{} chars)",
        stats.added_lines, stats.removed_lines, stats.added_chars, stats.removed_chars
    );

    orchestrator.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage) => {
            eprintln!("{}", USAGE);
            ExitCode::from(2)
        }
        Err(CliError::Diff(e)) => {
            error!("Diff failed: {}", e);
            eprintln!("{}: {}", e.code(), e);
            ExitCode::FAILURE
        }
        Err(CliError::Lines(e)) => {
            error!("Line reconstruction failed: {}", e);
            eprintln!("{}: {}", e.code(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
