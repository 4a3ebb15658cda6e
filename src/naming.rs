//! Deterministic sheet and output file naming

use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};

/// Name of the first sheet; exporting it produces the bare `<base>.csv`
pub const PRIMARY_SHEET: &str = "Sheet1";

/// 1-based ordinal of the sheet holding the record at 0-based global index `row_index`
pub fn sheet_ordinal(row_index: u64, row_capacity: u32) -> u64 {
    row_index / u64::from(row_capacity) + 1
}

/// 1-based row number of the record inside its sheet
pub fn local_row(row_index: u64, row_capacity: u32) -> u32 {
    // The remainder is always below `row_capacity`, so it fits
    (row_index % u64::from(row_capacity)) as u32 + 1
}

/// Whether the record at `row_index` opens a new sheet
pub fn starts_sheet(row_index: u64, row_capacity: u32) -> bool {
    row_index % u64::from(row_capacity) == 0
}

/// Sheet name for the record at `row_index`: `"Sheet1"`, `"Sheet2"`, ...
pub fn sheet_name_for_row(row_index: u64, row_capacity: u32) -> String {
    sheet_name(sheet_ordinal(row_index, row_capacity))
}

/// Sheet name for a 1-based ordinal
pub fn sheet_name(ordinal: u64) -> String {
    format!("Sheet{}", ordinal)
}

/// Longest sheet name spreadsheet applications accept
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Check a sheet name against the workbook format's rules
///
/// Names are 1-31 characters, contain none of `\ / ? * [ ] :` and do not start
/// or end with an apostrophe. These rules also keep exported file names free of
/// path separators.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let length = name.chars().count();
    let invalid = if length == 0 {
        Some("empty")
    } else if length > MAX_SHEET_NAME_LEN {
        Some("longer than 31 characters")
    } else if name.contains(['\\', '/', '?', '*', '[', ']', ':']) {
        Some("contains one of \\ / ? * [ ] :")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("starts or ends with an apostrophe")
    } else {
        None
    };
    match invalid {
        Some(reason) => Err(ConvertError::Write(format!(
            "invalid sheet name '{}': {}",
            name, reason
        ))),
        None => Ok(()),
    }
}

/// Output identity of an exported sheet: `base` for the primary sheet, `base_<sheet>` otherwise
pub fn csv_stem(base: &str, sheet: &str) -> String {
    if sheet == PRIMARY_SHEET {
        base.to_string()
    } else {
        format!("{}_{}", base, sheet)
    }
}

/// Input path with its extension removed; outputs are written next to the input
pub fn base_path(input: &Path) -> PathBuf {
    input.with_extension("")
}

/// `<base>.xlsx` for a CSV input
pub fn workbook_path(input: &Path) -> PathBuf {
    append_extension(&base_path(input), "xlsx")
}

/// `<base>.csv` or `<base>_<sheet>.csv` for one sheet of a workbook input
pub fn csv_path(input: &Path, sheet: &str) -> PathBuf {
    let base = base_path(input);
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}.csv", csv_stem(&stem, sheet));
    base.with_file_name(file_name)
}

// `Path::with_extension` would clobber dots already present in the stem ("v1.2")
fn append_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_placement() {
        let capacity = 3;
        let placed: Vec<(u64, u32)> = (0..7)
            .map(|r| (sheet_ordinal(r, capacity), local_row(r, capacity)))
            .collect();
        assert_eq!(
            placed,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3), (3, 1)]
        );
        assert!(starts_sheet(0, capacity));
        assert!(starts_sheet(3, capacity));
        assert!(!starts_sheet(4, capacity));
    }

    #[test]
    fn test_sheet_names() {
        assert_eq!(sheet_name_for_row(0, 1_048_576), "Sheet1");
        assert_eq!(sheet_name_for_row(1_048_575, 1_048_576), "Sheet1");
        assert_eq!(sheet_name_for_row(1_048_576, 1_048_576), "Sheet2");
        assert_eq!(sheet_name_for_row(5, 2), "Sheet3");
    }

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("Sheet1").is_ok());
        assert!(validate_sheet_name("Q1 Data (final)").is_ok());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a:b").is_err());
        assert!(validate_sheet_name("'quoted'").is_err());
    }

    #[test]
    fn test_csv_stem() {
        assert_eq!(csv_stem("report", "Sheet1"), "report");
        assert_eq!(csv_stem("report", "Data"), "report_Data");
        assert_eq!(csv_stem("report", "Sheet2"), "report_Sheet2");
    }

    #[test]
    fn test_output_paths() {
        let input = Path::new("out/report.XLSX");
        assert_eq!(csv_path(input, "Sheet1"), PathBuf::from("out/report.csv"));
        assert_eq!(csv_path(input, "Data"), PathBuf::from("out/report_Data.csv"));

        let input = Path::new("dump.v1.2.csv");
        assert_eq!(workbook_path(input), PathBuf::from("dump.v1.2.xlsx"));
    }
}
