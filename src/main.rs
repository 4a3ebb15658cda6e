use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sheetbridge::dispatch::{self, Outcome};
use sheetbridge::{ConvertOptions, ErrorPolicy, WidthPolicy, MAX_ROWS};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Width {
    /// Pad every row to the sheet's widest row
    Widest,
    /// Pad to the first row; wider rows are written as-is
    FirstRow,
}

/// Convert CSV files to XLSX and XLSX files to CSV, chosen by file extension.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Files to convert (.csv -> .xlsx, .xlsx/.xlsm -> one .csv per sheet)
    files: Vec<PathBuf>,

    /// Rows per sheet before a CSV rolls over into the next sheet
    #[arg(long, value_name = "N", default_value_t = MAX_ROWS)]
    rows: u32,

    /// Field count exported CSV rows are padded to
    #[arg(long, value_enum, default_value = "widest")]
    width: Width,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Keep converting the remaining files after one fails
    #[arg(long)]
    keep_going: bool,
}

fn command_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

fn print_usage() {
    let cmd = command_name();
    println!(
        "{} version {} {}/{}\n",
        cmd,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!("usage:\n\t{} file.csv|file.xlsx...", cmd);
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.files.is_empty() {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let delimiter = match u8::try_from(args.delimiter) {
        Ok(byte) if byte.is_ascii() => byte,
        _ => {
            eprintln!("error: delimiter must be a single ASCII character");
            return ExitCode::FAILURE;
        }
    };

    let options = ConvertOptions::default()
        .row_capacity(args.rows)
        .delimiter(delimiter)
        .width_policy(match args.width {
            Width::Widest => WidthPolicy::Widest,
            Width::FirstRow => WidthPolicy::FirstRow,
        })
        .error_policy(if args.keep_going {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::FailFast
        });

    let result = dispatch::run(&args.files, &options, |outcome| {
        if let Outcome::Skipped { input } = outcome {
            let name = input
                .file_name()
                .map(|name| name.to_string_lossy())
                .unwrap_or_else(|| input.to_string_lossy());
            println!("skipping file {}", name);
        }
    });

    match result {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            for (path, e) in &summary.failures {
                eprintln!("error: {}: {}", path.display(), e);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
