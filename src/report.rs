use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::finder::FindResult;
use crate::grouping::Group;

/// Formats accepted by [`DuplicateReport::write`].
pub const REPORT_FORMATS: &[&str] = &["json", "toml"];

/// Serializable summary of a finished search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub generated_at: String,
    pub root: PathBuf,
    pub threshold: u64,
    pub groups: Vec<GroupEntry>,
    pub failed: Vec<FailedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub keep: PathBuf,
    pub remove: Vec<PathBuf>,
    /// Combined size of the files in `remove`.
    pub reclaimable_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntry {
    pub path: PathBuf,
    pub error: String,
}

impl GroupEntry {
    pub fn from_group(group: &Group) -> Option<Self> {
        let keep = group.representative()?.path().to_path_buf();
        let remove: Vec<PathBuf> = group
            .marked_for_removal()
            .map(|r| r.path().to_path_buf())
            .collect();
        let reclaimable_bytes = remove.iter().map(|p| file_size(p)).sum();
        Some(Self {
            keep,
            remove,
            reclaimable_bytes,
        })
    }
}

fn file_size(path: &Path) -> u64 {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            log::warn!("Failed to get metadata for {:?}: {}", path, e);
            0
        }
    }
}

impl DuplicateReport {
    pub fn new(root: &Path, threshold: u64, result: &FindResult) -> Self {
        let groups = result
            .groups
            .iter()
            .filter_map(GroupEntry::from_group)
            .collect();
        let failed = result
            .failed
            .iter()
            .map(|r| FailedEntry {
                path: r.path().to_path_buf(),
                error: r.error().map(ToString::to_string).unwrap_or_default(),
            })
            .collect();
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            root: root.to_path_buf(),
            threshold,
            groups,
            failed,
        }
    }

    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups.iter().map(|g| g.reclaimable_bytes).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize report to TOML")
    }

    /// Write the report to `output_path` as `json` or `toml`.
    pub fn write(&self, output_path: &Path, format: &str) -> Result<()> {
        log::info!(
            "Writing {} duplicate groups to {:?} in {} format",
            self.groups.len(),
            output_path,
            format
        );

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
                log::debug!("Created parent directory: {:?}", parent);
            }
        }

        let contents = match format {
            "json" => self.to_json()?,
            "toml" => self.to_toml()?,
            other => anyhow::bail!("Unsupported output format: {}", other),
        };
        fs::write(output_path, contents)
            .with_context(|| format!("Failed to write report: {:?}", output_path))?;
        Ok(())
    }
}
