use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Recursively collects flight logs under `root` whose extension matches
/// `ext` (case-insensitive), sorted by path. Symlinked folders are not
/// descended into.
pub fn discover_logs(root: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(root, ext, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for ent in entries {
        let ent = ent?;
        let path = ent.path();
        if ent.file_type()?.is_dir() {
            walk(&path, ext, out)?;
        } else if path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scratch_dir;

    #[test]
    fn finds_logs_in_nested_folders() {
        let root = scratch_dir("discover");
        std::fs::create_dir_all(root.join("day2/drone7")).unwrap();
        for p in ["b.BIN", "a.bin", "notes.txt", "day2/drone7/c.BIN", "day2/c_EV.csv"] {
            std::fs::write(root.join(p), b"").unwrap();
        }
        let logs = discover_logs(&root, "BIN").unwrap();
        let names: Vec<_> = logs.iter().map(|p| p.strip_prefix(&root).unwrap().to_path_buf()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.bin"), PathBuf::from("b.BIN"), PathBuf::from("day2/drone7/c.BIN")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_lists_each_log_once() {
        let root = scratch_dir("discover-loop");
        std::fs::create_dir_all(root.join("day1")).unwrap();
        std::fs::write(root.join("day1/a.BIN"), b"").unwrap();
        std::os::unix::fs::symlink(&root, root.join("day1/up")).unwrap();

        let logs = discover_logs(&root, "BIN").unwrap();
        assert_eq!(logs, vec![root.join("day1/a.BIN")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(discover_logs(Path::new("/nonexistent/daycheck/root"), "BIN").is_err());
    }
}
