//! `manifest.json`: where every entry and source ended up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Entry name to the files a page needs for it, stylesheets first.
    pub entries: BTreeMap<String, Vec<String>>,
    /// Context-relative source path to the files produced from it.
    pub files: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    pub fn add_entry_file(&mut self, entry: &str, path: &str) {
        push_unique(self.entries.entry(entry.to_string()).or_default(), path);
    }

    pub fn add_source_file(&mut self, source: &str, path: &str) {
        push_unique(self.files.entry(source.to_string()).or_default(), path);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn push_unique(list: &mut Vec<String>, path: &str) {
    if !list.iter().any(|p| p == path) {
        list.push(path.to_string());
    }
}
