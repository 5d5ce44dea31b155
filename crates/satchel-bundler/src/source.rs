//! Source files and the reference graph between them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// Index of a source in its [`SourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

/// Why a file is part of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// Picked up from a `copy` directory; nothing requires it.
    Scanned,
    /// Referenced from another source.
    Dependency,
    /// Listed in an entry.
    Entry,
}

impl Origin {
    /// Entries and their dependencies must be handled by some rule.
    pub fn is_required(self) -> bool {
        !matches!(self, Origin::Scanned)
    }
}

/// Coarse file classification used to pick a reference scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script,
    Style,
    Sass,
    Other,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx") => SourceKind::Script,
            Some("css") => SourceKind::Style,
            Some("scss" | "sass") => SourceKind::Sass,
            _ => SourceKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `import … from` / `import '…'`
    Import,
    /// `export … from`
    Export,
    /// `import('…')`
    Dynamic,
    /// `require('…')`
    Require,
    /// CSS `@import`
    StyleImport,
    /// CSS `url(…)`
    StyleUrl,
}

/// A resolved, local reference from one source to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Specifier exactly as written, including any `?query` / `#hash`.
    pub specifier: String,
    pub kind: ReferenceKind,
    pub target: SourceId,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the context directory, `/`-separated.
    pub rel: String,
    pub kind: SourceKind,
    pub origin: Origin,
    /// Entries this source is reachable from.
    pub entries: BTreeSet<String>,
    pub references: Vec<Reference>,
}

impl Source {
    /// Target of `specifier`, if this source references it.
    pub fn target_of(&self, specifier: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.specifier == specifier)
    }
}

/// One item of an entry list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryItem {
    Local(SourceId),
    /// Bare package specifier left for the browser (import maps).
    External(String),
}

/// Every source of a build plus the entry lists that pulled them in.
#[derive(Debug, Clone, Default)]
pub struct SourceGraph {
    sources: Vec<Source>,
    by_path: FxHashMap<PathBuf, SourceId>,
    entries: IndexMap<String, Vec<EntryItem>>,
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `path` or upgrade its origin. Returns the id and whether the
    /// source is new.
    pub fn insert(&mut self, path: PathBuf, rel: String, origin: Origin) -> (SourceId, bool) {
        if let Some(&id) = self.by_path.get(&path) {
            let source = &mut self.sources[id.0];
            source.origin = source.origin.max(origin);
            return (id, false);
        }

        let id = SourceId(self.sources.len());
        self.sources.push(Source {
            id,
            kind: SourceKind::from_path(&path),
            path: path.clone(),
            rel,
            origin,
            entries: BTreeSet::new(),
            references: Vec::new(),
        });
        self.by_path.insert(path, id);
        (id, true)
    }

    pub fn add_reference(&mut self, from: SourceId, reference: Reference) {
        let source = &mut self.sources[from.0];
        if !source.references.contains(&reference) {
            source.references.push(reference);
        }
    }

    pub fn push_entry_item(&mut self, entry: &str, item: EntryItem) {
        self.entries.entry(entry.to_string()).or_default().push(item);
    }

    pub fn get(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub fn id_of(&self, path: &Path) -> Option<SourceId> {
        self.by_path.get(path).copied()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn entries(&self) -> &IndexMap<String, Vec<EntryItem>> {
        &self.entries
    }

    /// Local sources listed directly in `entry`, in declaration order.
    pub fn entry_sources(&self, entry: &str) -> Vec<SourceId> {
        self.entries
            .get(entry)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        EntryItem::Local(id) => Some(*id),
                        EntryItem::External(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sources reachable from `roots`, dependencies before dependents.
    ///
    /// Cycles are cut at the first revisit, so every source appears once.
    pub fn post_order(&self, roots: &[SourceId]) -> Vec<SourceId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        for &root in roots {
            self.visit(root, &mut visited, &mut order);
        }
        order
    }

    fn visit(&self, id: SourceId, visited: &mut FxHashSet<SourceId>, order: &mut Vec<SourceId>) {
        if !visited.insert(id) {
            return;
        }
        for reference in &self.sources[id.0].references {
            self.visit(reference.target, visited, order);
        }
        order.push(id);
    }

    /// Record entry membership for every source reachable from each entry.
    pub fn propagate_entries(&mut self) {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            let roots = self.entry_sources(&name);
            for id in self.post_order(&roots) {
                self.sources[id.0].entries.insert(name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(paths: &[&str]) -> (SourceGraph, Vec<SourceId>) {
        let mut graph = SourceGraph::new();
        let ids = paths
            .iter()
            .map(|p| graph.insert(PathBuf::from(p), p.to_string(), Origin::Dependency).0)
            .collect();
        (graph, ids)
    }

    fn link(graph: &mut SourceGraph, from: SourceId, to: SourceId) {
        graph.add_reference(
            from,
            Reference {
                specifier: format!("./{}", to.0),
                kind: ReferenceKind::Import,
                target: to,
            },
        );
    }

    #[test]
    fn test_origin_upgrades_but_never_downgrades() {
        let mut graph = SourceGraph::new();
        let (id, new) = graph.insert(PathBuf::from("/a.js"), "a.js".into(), Origin::Dependency);
        assert!(new);
        graph.insert(PathBuf::from("/a.js"), "a.js".into(), Origin::Entry);
        assert_eq!(graph.get(id).origin, Origin::Entry);
        let (_, new) = graph.insert(PathBuf::from("/a.js"), "a.js".into(), Origin::Scanned);
        assert!(!new);
        assert_eq!(graph.get(id).origin, Origin::Entry);
    }

    #[test]
    fn test_post_order_with_cycle() {
        let (mut graph, ids) = graph_with(&["/a.js", "/b.js", "/c.js"]);
        link(&mut graph, ids[0], ids[1]);
        link(&mut graph, ids[1], ids[2]);
        link(&mut graph, ids[2], ids[0]);

        let order = graph.post_order(&[ids[0]]);
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_propagate_entries() {
        let (mut graph, ids) = graph_with(&["/a.js", "/b.js", "/shared.css"]);
        link(&mut graph, ids[0], ids[2]);
        link(&mut graph, ids[1], ids[2]);
        graph.push_entry_item("one", EntryItem::Local(ids[0]));
        graph.push_entry_item("two", EntryItem::Local(ids[1]));
        graph.propagate_entries();

        let shared = &graph.get(ids[2]).entries;
        assert_eq!(shared.len(), 2);
        assert!(graph.get(ids[0]).entries.contains("one"));
        assert!(!graph.get(ids[0]).entries.contains("two"));
    }
}
