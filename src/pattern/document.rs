// Pattern documents: the interchange format for save/load and clipboard-ish
// sharing, plus on-disk persistence of the working pattern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use super::{Pattern, PatternStore};
use crate::shared::{roster_position, unix_timestamp};

const RUMBLESEQ_DIR: &str = ".rumbleseq";
const PATTERN_FILE: &str = "pattern.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternDocument {
    pub pattern: Pattern,
    pub metadata: DocumentMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created: u64, // unix seconds
    pub instruments: Vec<String>,
    pub steps: usize,
}

impl PatternStore {
    pub fn export_document(&self) -> PatternDocument {
        let mut instruments: Vec<String> = self.current.rows().keys().cloned().collect();
        instruments.sort_by_key(|name| (roster_position(name), name.clone()));
        PatternDocument {
            pattern: self.current.clone(),
            metadata: DocumentMetadata {
                created: unix_timestamp(),
                instruments,
                steps: self.current.len(),
            },
        }
    }

    /// Accepts any JSON document with a well-shaped `pattern` field; anything
    /// else is rejected and the working pattern stays as it was.
    pub fn import_document(&mut self, value: &serde_json::Value) -> anyhow::Result<()> {
        let Some(pattern_value) = value.get("pattern") else {
            bail!("document has no pattern field");
        };
        let map: HashMap<String, Vec<bool>> = serde_json::from_value(pattern_value.clone())
            .context("pattern field has the wrong shape")?;
        self.current = Pattern::from_map(map);
        Ok(())
    }
}

// <project_dir>/.rumbleseq/pattern.json
fn pattern_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(RUMBLESEQ_DIR).join(PATTERN_FILE)
}

pub fn load_document(project_dir: &Path) -> Option<PatternDocument> {
    let path = pattern_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

// Save the working pattern to disk, creating the directory if needed
pub fn save_document(project_dir: &Path, document: &PatternDocument) -> anyhow::Result<()> {
    let path = pattern_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(&path, json)?;
    Ok(())
}
