//! Find candidate images under a root directory

use std::path::Path;

use tracing::{debug, warn};
use transform::WorkItem;
use walkdir::WalkDir;

/// Extensions picked up by a sweep, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has one of the image extensions.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Item id for `path`: its location relative to `root`, `/`-separated.
///
/// Stable across runs and platforms so the ledger stays valid when the
/// tree is moved as a whole.
pub fn item_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Walk `root` and return every image file, sorted by path.
///
/// Unreadable entries are logged and skipped. Symlinks are not followed.
/// Blocking; call from `spawn_blocking`.
pub fn discover(root: &Path) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping file without metadata");
                continue;
            }
        };
        let Some(id) = item_id(root, entry.path()) else {
            continue;
        };
        items.push(WorkItem::new(id, entry.path(), size));
    }
    debug!(root = %root.display(), found = items.len(), "discovery finished");
    items
}
