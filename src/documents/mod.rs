// Document loading
// Reads scraped documentation files into memory for indexing

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::Result;

/// One documentation file, stored as the payload of its indexed point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source path, unique per loaded set
    pub name: String,
    /// Full file text; this is what gets embedded
    pub content: String,
}

impl Document {
    #[inline]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Load documents from a single file or from the regular files directly
/// inside a directory.
///
/// Candidates are sorted by path so that point ids are stable across
/// platforms. Files that cannot be read as UTF-8, or that are empty, are
/// skipped with a warning. Only an unreadable root is an error.
#[inline]
pub fn load_documents(root: &Path) -> Result<Vec<Document>> {
    let metadata = fs::metadata(root)?;

    let candidates = if metadata.is_file() {
        vec![root.to_path_buf()]
    } else {
        list_regular_files(root)?
    };

    debug!(
        "Found {} candidate files under {}",
        candidates.len(),
        root.display()
    );

    let mut documents = Vec::with_capacity(candidates.len());
    let mut skipped = 0usize;

    for path in candidates {
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => {
                debug!("Skipping empty file {}", path.display());
                skipped += 1;
            }
            Ok(content) => documents.push(Document {
                name: path.to_string_lossy().into_owned(),
                content,
            }),
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} documents from {} ({} skipped)",
        documents.len(),
        root.display(),
        skipped
    );

    Ok(documents)
}

fn list_regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        // Follows symlinks, so a link to a regular file counts as one
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
