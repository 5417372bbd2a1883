use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// What goes into the codebase map.
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// File extensions to include, without the leading dot.
    pub extensions: Vec<String>,
    /// Directory names skipped anywhere in the tree.
    pub exclude_dirs: Vec<String>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            extensions: ["js", "ts", "tsx", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_dirs: ["node_modules", ".git", ".next", "out", "dist", "public", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Render the flat bullet-list codebase map every agent prompt consumes.
///
/// Pure function of filesystem state; I/O errors propagate unmodified.
pub fn build_map(root: &Path, options: &MapOptions) -> io::Result<String> {
    let mut paths = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, &options.exclude_dirs));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_wanted_extension(&entry, &options.extensions) {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        paths.push(relative.to_string_lossy().replace('\\', "/"));
    }

    paths.sort();

    let mut map = String::from("Codebase Structure:\n");
    for path in paths {
        map.push_str("- ");
        map.push_str(&path);
        map.push('\n');
    }
    Ok(map)
}

fn is_excluded(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.iter().any(|d| d == name))
            .unwrap_or(false)
}

fn has_wanted_extension(entry: &DirEntry, extensions: &[String]) -> bool {
    entry
        .path()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}
