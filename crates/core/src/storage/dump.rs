use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TMP_PREFIX: &str = "._new_";

/// Writes `payload` to `path` for postmortem inspection.
///
/// The bytes go to an exclusively created sibling temp file which is synced and then renamed
/// over `path`, so `path` only ever holds a complete payload. Fails if the temp file already
/// exists (another dump in progress).
pub fn preserve_payload(path: &Path, payload: &[u8]) -> anyhow::Result<()> {
    let tmp_path = tmp_path_for(path)?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&tmp_path)
        .with_context(|| format!("failed to create dump temp file {}", tmp_path.display()))?;

    let written = file
        .write_all(payload)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("failed to write dump temp file {}", tmp_path.display()));
    drop(file);

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                tmp_path.display(),
                path.display()
            )
        });
    }

    tracing::error!(path = %path.display(), bytes = payload.len(), "failed payload written");
    Ok(())
}

fn tmp_path_for(path: &Path) -> anyhow::Result<PathBuf> {
    let file_name = path
        .file_name()
        .with_context(|| format!("dump path has no file name: {}", path.display()))?;
    Ok(path.with_file_name(format!("{TMP_PREFIX}{}", file_name.to_string_lossy())))
}
