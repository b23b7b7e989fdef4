use std::fs;
use std::path::{Path, PathBuf};

const SHEET_EXTENSION: &str = "csv";

pub fn ensure_workbook_dir(path: &Path) -> std::io::Result<PathBuf> {
    ensure_dir(path)?;
    Ok(path.to_path_buf())
}

/// File backing one sheet of a workbook directory. Path separators in the
/// sheet name are replaced so every sheet stays inside the workbook.
pub fn sheet_path(workbook_dir: &Path, sheet: &str) -> PathBuf {
    let file_stem: String = sheet
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    workbook_dir.join(format!("{}.{}", file_stem, SHEET_EXTENSION))
}

pub fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_path_stays_in_workbook() {
        let dir = Path::new("/tmp/book");
        assert_eq!(sheet_path(dir, "SV_1_responses"), dir.join("SV_1_responses.csv"));
        assert_eq!(sheet_path(dir, "../x/y"), dir.join(".._x_y.csv"));
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());
    }
}
