//! Saving produced parts to disk.

use std::path::{Path, PathBuf};

use sf_core::{Error, OutputArtifact, Result};

/// Write every artifact into `dir`, creating it if needed, and record each
/// saved path in [`OutputArtifact::location`].
///
/// Nothing is written if any target exists and `overwrite` is false.
///
/// # Errors
///
/// [`Error::Conflict`] for an existing target, [`Error::Io`] for write
/// failures.
pub async fn save_artifacts(
    artifacts: &mut [OutputArtifact],
    dir: &Path,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let targets: Vec<PathBuf> = artifacts.iter().map(|a| target_path(dir, &a.name)).collect();

    if !overwrite {
        ensure_absent(&targets).await?;
    }

    for (artifact, target) in artifacts.iter_mut().zip(&targets) {
        tokio::fs::write(target, &artifact.data).await?;
        tracing::debug!("wrote {} ({} bytes)", target.display(), artifact.len());
        artifact.location = Some(target.clone());
    }

    Ok(targets)
}

/// Fail with [`Error::Conflict`] if any of the named parts already exists in
/// `dir`. A no-op when `overwrite` is set.
pub async fn check_targets<'a>(
    names: impl IntoIterator<Item = &'a str>,
    dir: &Path,
    overwrite: bool,
) -> Result<()> {
    if overwrite {
        return Ok(());
    }
    let targets: Vec<PathBuf> = names.into_iter().map(|n| target_path(dir, n)).collect();
    ensure_absent(&targets).await
}

async fn ensure_absent(targets: &[PathBuf]) -> Result<()> {
    for target in targets {
        if tokio::fs::try_exists(target).await? {
            return Err(Error::Conflict(format!(
                "{} already exists (use --overwrite to replace it)",
                target.display()
            )));
        }
    }
    Ok(())
}

fn target_path(dir: &Path, name: &str) -> PathBuf {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "part".into());
    dir.join(file_name)
}
