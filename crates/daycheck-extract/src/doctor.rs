use anyhow::Result;
use std::path::Path;

use crate::decoder::DecoderConfig;

pub fn check_decoder(cfg: &DecoderConfig) -> Result<()> {
    anyhow::ensure!(cfg.workers >= 1, "decoder.workers must be >= 1");
    anyhow::ensure!(!cfg.program.trim().is_empty(), "decoder.program is empty");
    anyhow::ensure!(
        program_resolvable(&cfg.program),
        "decoder.program not found: {} (not a file and not on PATH)",
        cfg.program
    );
    if let Some(dir) = &cfg.artifact_dir {
        if dir.exists() {
            anyhow::ensure!(dir.is_dir(), "decoder.artifact_dir is not a dir: {}", dir.display());
        }
    }
    Ok(())
}

pub fn check_logs_root(root: &Path) -> Result<()> {
    anyhow::ensure!(root.is_dir(), "logs.root is not a directory: {}", root.display());
    Ok(())
}

fn program_resolvable(program: &str) -> bool {
    let p = Path::new(program);
    if p.components().count() > 1 {
        return p.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(program: &str, workers: usize) -> DecoderConfig {
        DecoderConfig { program: program.into(), args: vec![], workers, artifact_dir: None }
    }

    #[test]
    fn rejects_zero_workers_and_unknown_program() {
        assert!(check_decoder(&cfg("sh", 0)).is_err());
        assert!(check_decoder(&cfg("daycheck-no-such-decoder", 2)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn accepts_program_on_path() {
        check_decoder(&cfg("sh", 2)).unwrap();
        check_decoder(&cfg("/bin/sh", 2)).unwrap();
    }
}
