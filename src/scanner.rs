use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::FinderError;

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Glob include/exclude rules applied to file paths.
#[derive(Debug, Default, Clone)]
pub struct FilterRules {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl FilterRules {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self, FinderError> {
        let compile = |patterns: &[String]| -> Result<Vec<Pattern>, FinderError> {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p).map_err(|source| FinderError::Pattern {
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect()
        };
        let rules = FilterRules {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        };

        if !rules.includes.is_empty() {
            log::info!("Include rules active: {}", join_patterns(&rules.includes));
        }
        if !rules.excludes.is_empty() {
            log::info!("Exclude rules active: {}", join_patterns(&rules.excludes));
        }
        Ok(rules)
    }

    /// Excludes win over includes. With no include rules every file that is
    /// not excluded matches.
    pub fn is_match(&self, path: &Path) -> bool {
        if self.excludes.iter().any(|p| p.matches_path(path)) {
            return false;
        }
        if !self.includes.is_empty() {
            return self.includes.iter().any(|p| p.matches_path(path));
        }
        true
    }
}

fn join_patterns(patterns: &[Pattern]) -> String {
    patterns
        .iter()
        .map(Pattern::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which files a scan picks up.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions without the leading dot, compared case-insensitively.
    pub extensions: Vec<String>,
    pub filters: FilterRules,
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            filters: FilterRules::default(),
            skip_hidden: false,
        }
    }
}

impl ScanOptions {
    fn has_image_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Recursively collect image files under `root`.
///
/// Returns `Ok(None)` if `cancel` fires during the walk. The paths are
/// absolute and sorted. A directory that cannot be opened aborts the scan
/// with [`FinderError::FileSystem`]; other unreadable entries are skipped.
pub fn scan(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<Option<Vec<PathBuf>>, FinderError> {
    let root = fs::canonicalize(root).map_err(|source| FinderError::FileSystem {
        path: root.to_path_buf(),
        source,
    })?;
    if !root.is_dir() {
        return Err(FinderError::NotADirectory(root));
    }
    log::info!("Scanning {:?} for images", root);

    let skip_hidden = options.skip_hidden;
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(skip_hidden && e.depth() > 0 && is_hidden(e)));

    collect_images(&root, walker, options, cancel)
}

/// Drain walk results into the sorted list of matching files, checking
/// `cancel` before each entry.
fn collect_images<I>(
    root: &Path,
    entries: I,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<Option<Vec<PathBuf>>, FinderError>
where
    I: IntoIterator<Item = walkdir::Result<walkdir::DirEntry>>,
{
    let mut paths = Vec::new();
    for entry in entries {
        if cancel.is_cancelled() {
            log::info!("Scan cancelled after {} images", paths.len());
            return Ok(None);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if is_unreadable_dir(&e) {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed"));
                    return Err(FinderError::FileSystem { path, source });
                }
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if options.has_image_extension(path) && options.filters.is_match(path) {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    log::info!("Found {} image files", paths.len());
    Ok(Some(paths))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_unreadable_dir(err: &walkdir::Error) -> bool {
    err.io_error().is_some() && err.path().map(Path::is_dir).unwrap_or(true)
}
