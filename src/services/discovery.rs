use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Derive the join key between a source file and its enhanced artifact.
///
/// Keeps only `[A-Za-z0-9_.-]` from the file name, then strips every `.<ext>`
/// token until none remain.
pub fn sanitize_base_name(path: &Path, extension: &str) -> String {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    let mut name: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let token = format!(".{extension}");
    while name.contains(&token) {
        name = name.replace(&token, "");
    }
    name
}

/// Where the enhanced artifact for `source` is (or will be) stored.
pub fn expected_output_path(source: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", sanitize_base_name(source, extension), extension))
}

/// Source files with the configured extension that have no artifact yet.
///
/// The output directory is the only source of truth here: a file counts as done
/// if and only if its sanitized artifact exists.
pub fn discover_pending(
    source_dir: &Path,
    output_dir: &Path,
    extension: &str,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = std::fs::read_dir(source_dir).map_err(|source| DiscoveryError::ReadDir {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::ReadDir {
            path: source_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if expected_output_path(&path, output_dir, extension).exists() {
            tracing::debug!(source = %path.display(), "Artifact already present, skipping");
            continue;
        }
        candidates.push(path);
    }

    candidates.sort();

    // Two sources sharing a key would race on the same remote refs and artifact.
    let mut keys = HashSet::new();
    candidates.retain(|path| {
        let key = sanitize_base_name(path, extension);
        if keys.insert(key.clone()) {
            true
        } else {
            tracing::warn!(
                source = %path.display(),
                key = %key,
                "Sanitized name collides with an earlier source, skipping"
            );
            false
        }
    });

    if let Some(limit) = limit {
        candidates.truncate(limit);
    }

    Ok(candidates)
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to list source directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
