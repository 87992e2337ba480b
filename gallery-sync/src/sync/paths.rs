use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("remote path is empty")]
    Empty,
    #[error("remote path contains unsupported component: {0}")]
    UnsupportedComponent(String),
}

/// Maps a `/`-separated root-relative remote path under `root`.
pub fn local_path_for(root: &Path, remote_path: &str) -> Result<PathBuf, PathError> {
    if remote_path.trim_matches('/').is_empty() {
        return Err(PathError::Empty);
    }

    let mut out = root.to_path_buf();
    for segment in remote_path.split('/') {
        match Path::new(segment).components().next() {
            None => continue,
            Some(Component::CurDir) => continue,
            Some(Component::Normal(part)) if part == segment => out.push(part),
            _ => return Err(PathError::UnsupportedComponent(segment.to_string())),
        }
    }
    Ok(out)
}

/// Root-relative path of `path` with `/` separators, or `None` if it is not under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

pub fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

/// Writes `bytes` next to `target` and renames it into place.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(target);
    let result = (|| {
        let mut file = std::fs::File::create(&partial)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&partial, target)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}
