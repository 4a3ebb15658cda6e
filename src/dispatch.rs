//! Route input files to a conversion by extension

use std::path::{Path, PathBuf};

use crate::config::{ConvertOptions, ErrorPolicy};
use crate::convert;
use crate::error::{ConvertError, Result};

/// Input formats recognized by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Workbook,
}

impl FileKind {
    /// Classify a path by its extension, case-insensitively
    ///
    /// ```
    /// use sheetbridge::dispatch::FileKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(FileKind::from_path(Path::new("a.CSV")), Some(FileKind::Csv));
    /// assert_eq!(FileKind::from_path(Path::new("b.xlsx")), Some(FileKind::Workbook));
    /// assert_eq!(FileKind::from_path(Path::new("c.txt")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xlsm" => Some(FileKind::Workbook),
            _ => None,
        }
    }
}

/// Result of one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converted { input: PathBuf, outputs: Vec<PathBuf> },
    Skipped { input: PathBuf },
}

/// Convert one file, choosing the direction from its extension
///
/// Unsupported extensions are reported as [`ConvertError::UnsupportedExtension`].
pub fn convert_path(path: &Path, options: &ConvertOptions) -> Result<Vec<PathBuf>> {
    match FileKind::from_path(path) {
        Some(FileKind::Csv) => convert::csv_file_to_xlsx(path, options).map(|output| vec![output]),
        Some(FileKind::Workbook) => convert::xlsx_file_to_csv(path, options),
        None => Err(ConvertError::UnsupportedExtension(path.to_path_buf())),
    }
}

/// What a multi-file run did
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
    /// Files that failed under [`ErrorPolicy::Continue`]
    pub failures: Vec<(PathBuf, ConvertError)>,
}

impl RunSummary {
    /// Every output file written, in order
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .flat_map(|outcome| match outcome {
                Outcome::Converted { outputs, .. } => outputs.iter(),
                Outcome::Skipped { .. } => [].iter(),
            })
            .map(PathBuf::as_path)
    }

    /// Inputs skipped for their extension
    pub fn skipped(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            Outcome::Skipped { input } => Some(input.as_path()),
            Outcome::Converted { .. } => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Convert files one at a time, in order
///
/// Files with an unsupported extension are skipped and the run continues. Any
/// other failure stops the run under [`ErrorPolicy::FailFast`], or is recorded
/// in the summary under [`ErrorPolicy::Continue`]. `on_outcome` sees each
/// outcome as soon as the file is done.
pub fn run<P, F>(paths: &[P], options: &ConvertOptions, mut on_outcome: F) -> Result<RunSummary>
where
    P: AsRef<Path>,
    F: FnMut(&Outcome),
{
    options.validate()?;

    let mut summary = RunSummary::default();
    for path in paths {
        let path = path.as_ref();
        let outcome = match convert_path(path, options) {
            Ok(outputs) => Outcome::Converted {
                input: path.to_path_buf(),
                outputs,
            },
            Err(e) if e.is_skippable() => {
                log::warn!("skipping {}: {}", path.display(), e);
                Outcome::Skipped {
                    input: path.to_path_buf(),
                }
            }
            Err(e) => match options.error_policy {
                ErrorPolicy::FailFast => return Err(e),
                ErrorPolicy::Continue => {
                    log::error!("{}: {}", path.display(), e);
                    summary.failures.push((path.to_path_buf(), e));
                    continue;
                }
            },
        };
        on_outcome(&outcome);
        summary.outcomes.push(outcome);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_path(Path::new("x.csv")), Some(FileKind::Csv));
        assert_eq!(FileKind::from_path(Path::new("x.Csv")), Some(FileKind::Csv));
        assert_eq!(FileKind::from_path(Path::new("x.XLSM")), Some(FileKind::Workbook));
        assert_eq!(FileKind::from_path(Path::new("x.xls")), None);
        assert_eq!(FileKind::from_path(Path::new("noext")), None);
        assert_eq!(FileKind::from_path(Path::new("archive.csv.gz")), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = convert_path(Path::new("notes.txt"), &ConvertOptions::default()).unwrap_err();
        assert!(err.is_skippable());
    }

    #[test]
    fn test_run_skips_and_continues() -> Result<()> {
        let dir = TempDir::new()?;
        let csv = dir.path().join("a.csv");
        let txt = dir.path().join("b.txt");
        fs::write(&csv, "x,y\n1,2\n")?;
        fs::write(&txt, "ignored")?;

        let mut seen = Vec::new();
        let summary = run(&[&csv, &txt], &ConvertOptions::default(), |outcome| {
            seen.push(outcome.clone())
        })?;

        assert_eq!(seen.len(), 2);
        assert_eq!(
            summary.outputs().collect::<Vec<_>>(),
            vec![dir.path().join("a.xlsx").as_path()]
        );
        assert_eq!(summary.skipped().collect::<Vec<_>>(), vec![txt.as_path()]);
        assert!(summary.is_success());
        assert!(dir.path().join("a.xlsx").exists());
        Ok(())
    }

    #[test]
    fn test_fail_fast_stops_run() -> Result<()> {
        let dir = TempDir::new()?;
        let missing = dir.path().join("missing.csv");
        let good = dir.path().join("good.csv");
        fs::write(&good, "a\n")?;

        let result = run(&[&missing, &good], &ConvertOptions::default(), |_| {});
        assert!(matches!(result, Err(ConvertError::Open { .. })));
        assert!(!dir.path().join("good.xlsx").exists());
        Ok(())
    }

    #[test]
    fn test_continue_policy_records_failures() -> Result<()> {
        let dir = TempDir::new()?;
        let bad = dir.path().join("bad.csv");
        let good = dir.path().join("good.csv");
        fs::write(&bad, "a,\"unterminated\n")?;
        fs::write(&good, "a\n")?;

        let options = ConvertOptions::default().error_policy(ErrorPolicy::Continue);
        let summary = run(&[&bad, &good], &options, |_| {})?;

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, bad);
        assert!(matches!(summary.failures[0].1, ConvertError::Parse { line: 1, .. }));
        assert!(!summary.is_success());
        assert!(dir.path().join("good.xlsx").exists());
        Ok(())
    }
}
