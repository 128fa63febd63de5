//! Class id to human-readable label resolution.
//!
//! Labels come from a `labels.txt` file shipped next to the detector model:
//! one label per line, where the line index is the class id. SSD label files
//! pad unused ids with `???`; those ids are treated as unknown.

use anyhow::{Context, Result};
use std::path::Path;

pub const DEFAULT_LABELS_PATH: &str = "labels.txt";

/// Placeholder the COCO SSD label files use for unused class ids.
const PLACEHOLDER_LABEL: &str = "???";

/// Resolves a detector class id to the name spoken in warnings.
pub trait LabelResolver: Send + Sync {
    /// `None` means the id cannot be named (unknown class id).
    fn resolve(&self, class_id: u32) -> Option<&str>;
}

#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    labels: Vec<Option<String>>,
}

impl LabelMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        let map = Self::from_lines(raw.lines());
        log::info!(
            "loaded {} labels ({} named) from {}",
            map.len(),
            map.named_count(),
            path.display()
        );
        Ok(map)
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = lines
            .into_iter()
            .map(|line| {
                let label = line.as_ref().trim();
                if label.is_empty() || label == PLACEHOLDER_LABEL {
                    None
                } else {
                    Some(label.to_string())
                }
            })
            .collect();
        Self { labels }
    }

    /// Number of class ids covered, named or not.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn named_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }
}

impl LabelResolver for LabelMap {
    fn resolve(&self, class_id: u32) -> Option<&str> {
        self.labels
            .get(class_id as usize)
            .and_then(|label| label.as_deref())
    }
}
