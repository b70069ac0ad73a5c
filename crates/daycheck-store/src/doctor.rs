use anyhow::Result;
use std::path::Path;

pub fn check_store(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::ensure!(path.is_file(), "store.path is not a file: {}", path.display());
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    anyhow::ensure!(parent.is_dir(), "store.path folder missing: {}", parent.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_file_in_cwd_is_fine() {
        check_store(Path::new("reports.jsonl")).unwrap();
    }

    #[test]
    fn missing_folder_is_reported() {
        assert!(check_store(Path::new("/nonexistent/daycheck/reports.jsonl")).is_err());
    }
}
