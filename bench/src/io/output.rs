//! Output directory lifecycle: skip, create fresh, or archive then recreate.
//!
//! Prior output is never deleted or overwritten. Without `--force` an existing
//! directory makes the item a skip; with `--force` it is renamed into the
//! backup area first.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// What to do with one item's output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    /// Output already exists and `--force` was not given.
    Skip,
    CreateFresh,
    /// Move the existing output to the backup area, then create it fresh.
    ArchiveAndRecreate,
}

impl OutputAction {
    pub fn decide(output_exists: bool, force: bool) -> Self {
        match (output_exists, force) {
            (true, false) => OutputAction::Skip,
            (true, true) => OutputAction::ArchiveAndRecreate,
            (false, _) => OutputAction::CreateFresh,
        }
    }

    pub fn for_dir(output_dir: &Path, force: bool) -> Self {
        Self::decide(output_dir.exists(), force)
    }
}

/// Batch-namespaced backup location: `<backup_base>/<name>.<batch_id>`.
pub fn backup_path(backup_base: &Path, output_dir_name: &str, batch_id: &str) -> PathBuf {
    backup_base.join(format!("{output_dir_name}.{batch_id}"))
}

/// Apply `action` to `output_dir`, returning the backup path if one was made.
pub fn prepare_output_dir(
    output_dir: &Path,
    backup_dir: &Path,
    action: OutputAction,
) -> Result<Option<PathBuf>> {
    match action {
        OutputAction::Skip => Ok(None),
        OutputAction::CreateFresh => {
            fs::create_dir_all(output_dir)
                .with_context(|| format!("create output dir {}", output_dir.display()))?;
            debug!(output_dir = %output_dir.display(), "output dir created");
            Ok(None)
        }
        OutputAction::ArchiveAndRecreate => {
            if backup_dir.exists() {
                bail!(
                    "backup target {} already exists; refusing to overwrite",
                    backup_dir.display()
                );
            }
            if let Some(parent) = backup_dir.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create backup dir {}", parent.display()))?;
            }
            fs::rename(output_dir, backup_dir).with_context(|| {
                format!(
                    "move {} to {}",
                    output_dir.display(),
                    backup_dir.display()
                )
            })?;
            fs::create_dir_all(output_dir)
                .with_context(|| format!("create output dir {}", output_dir.display()))?;
            info!(
                output_dir = %output_dir.display(),
                backup_dir = %backup_dir.display(),
                "previous output archived"
            );
            Ok(Some(backup_dir.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decision_table() {
        assert_eq!(OutputAction::decide(true, false), OutputAction::Skip);
        assert_eq!(
            OutputAction::decide(true, true),
            OutputAction::ArchiveAndRecreate
        );
        assert_eq!(OutputAction::decide(false, false), OutputAction::CreateFresh);
        assert_eq!(OutputAction::decide(false, true), OutputAction::CreateFresh);
    }

    #[test]
    fn backup_path_is_batch_namespaced() {
        let path = backup_path(Path::new("/b"), "codex--m--pong", "20260101_000000_abc123");
        assert_eq!(
            path,
            PathBuf::from("/b/codex--m--pong.20260101_000000_abc123")
        );
    }

    #[test]
    fn skip_touches_nothing() {
        let temp = tempdir().expect("tempdir");
        let output = temp.path().join("out");
        fs::create_dir_all(&output).expect("mkdir");
        fs::write(output.join("keep.txt"), "prior").expect("write");

        let backup = temp.path().join("backup");
        let result = prepare_output_dir(&output, &backup, OutputAction::Skip).expect("skip");
        assert!(result.is_none());
        assert_eq!(fs::read_to_string(output.join("keep.txt")).expect("read"), "prior");
        assert!(!backup.exists());
    }

    #[test]
    fn archive_preserves_prior_contents_and_recreates_empty() {
        let temp = tempdir().expect("tempdir");
        let output = temp.path().join("out/codex--m--pong");
        fs::create_dir_all(output.join("dist")).expect("mkdir");
        fs::write(output.join("dist/index.html"), b"<canvas></canvas>").expect("write");
        fs::write(output.join("package.json"), b"{}").expect("write");

        let backup = backup_path(&temp.path().join("backups"), "codex--m--pong", "batch1");
        let result = prepare_output_dir(&output, &backup, OutputAction::ArchiveAndRecreate)
            .expect("archive");

        assert_eq!(result.as_deref(), Some(backup.as_path()));
        assert_eq!(
            fs::read(backup.join("dist/index.html")).expect("read"),
            b"<canvas></canvas>"
        );
        assert_eq!(fs::read(backup.join("package.json")).expect("read"), b"{}");
        assert!(output.is_dir());
        assert_eq!(fs::read_dir(&output).expect("read dir").count(), 0);
    }

    #[test]
    fn archive_refuses_to_overwrite_existing_backup() {
        let temp = tempdir().expect("tempdir");
        let output = temp.path().join("out");
        let backup = temp.path().join("backup");
        fs::create_dir_all(&output).expect("mkdir");
        fs::create_dir_all(&backup).expect("mkdir");

        let err = prepare_output_dir(&output, &backup, OutputAction::ArchiveAndRecreate)
            .expect_err("collision");
        assert!(err.to_string().contains("refusing to overwrite"));
        assert!(output.exists());
    }

    #[test]
    fn create_fresh_makes_parents() {
        let temp = tempdir().expect("tempdir");
        let output = temp.path().join("a/b/c");
        prepare_output_dir(&output, &temp.path().join("x"), OutputAction::CreateFresh)
            .expect("create");
        assert!(output.is_dir());
    }
}
