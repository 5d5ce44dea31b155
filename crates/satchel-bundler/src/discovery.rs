//! Source discovery: walk from the entries through every local reference.
//!
//! Scripts are parsed with oxc so commented-out or type-only imports never
//! become dependencies. Stylesheets are scanned with regexes after comments
//! are stripped. Sass partials pulled in through `@import`/`@use` are inlined
//! by the compiler, so they are followed for `url()` references but never
//! become sources of their own.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression,
    ImportDeclaration, ImportExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;
use path_clean::PathClean;
use regex::Regex;
use rustc_hash::FxHashSet;
use satchel_config::ResolvedConfig;
use tracing::debug;
use walkdir::WalkDir;

use crate::resolve::{Dialect, Resolution, Resolver, is_external_url};
use crate::source::{EntryItem, Origin, Reference, ReferenceKind, SourceGraph, SourceId, SourceKind};
use crate::{Error, Result};

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*//.*$").expect("valid regex"));
static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"'\s);]+)["']?\s*\)?"#).expect("valid regex")
});
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]+))\s*\)"#).expect("valid regex")
});
static SASS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(?:import|use|forward)\s+([^;\n]+)").expect("valid regex"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid regex"));

/// A reference as found in the text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub specifier: String,
    pub kind: ReferenceKind,
}

impl RawReference {
    fn new(specifier: &str, kind: ReferenceKind) -> Self {
        Self {
            specifier: specifier.to_string(),
            kind,
        }
    }

    fn dialect(&self) -> Dialect {
        match self.kind {
            ReferenceKind::StyleImport | ReferenceKind::StyleUrl => Dialect::Style,
            _ => Dialect::Script,
        }
    }
}

/// Builds the [`SourceGraph`] for a resolved configuration.
pub struct Discovery<'a> {
    config: &'a ResolvedConfig,
    resolver: Resolver,
}

impl<'a> Discovery<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self {
            config,
            resolver: Resolver::new(config),
        }
    }

    pub fn discover(&self) -> Result<SourceGraph> {
        let mut graph = SourceGraph::new();
        let mut queue = VecDeque::new();

        for (entry, files) in &self.config.entries {
            for file in files {
                match self.resolve_entry_file(entry, file)? {
                    Resolution::Local(path) => {
                        let (id, new) = self.insert(&mut graph, path, Origin::Entry);
                        graph.push_entry_item(entry, EntryItem::Local(id));
                        if new {
                            queue.push_back(id);
                        }
                    }
                    Resolution::External => {
                        debug!("entry '{}' keeps '{}' as an external import", entry, file);
                        graph.push_entry_item(entry, EntryItem::External(file.clone()));
                    }
                }
            }
        }

        for dir in &self.config.copy {
            for path in scan_directory(dir) {
                let (id, new) = self.insert(&mut graph, path, Origin::Scanned);
                if new {
                    queue.push_back(id);
                }
            }
        }

        while let Some(id) = queue.pop_front() {
            let (path, kind) = {
                let source = graph.get(id);
                (source.path.clone(), source.kind)
            };

            for raw in self.scan(&path, kind)? {
                let target = match self.resolver.resolve(&raw.specifier, &path, raw.dialect())? {
                    Resolution::Local(target) => target,
                    Resolution::External => continue,
                };

                let (target_id, new) = self.insert(&mut graph, target, Origin::Dependency);
                graph.add_reference(
                    id,
                    Reference {
                        specifier: raw.specifier,
                        kind: raw.kind,
                        target: target_id,
                    },
                );
                if new {
                    queue.push_back(target_id);
                }
            }
        }

        graph.propagate_entries();
        debug!(
            sources = graph.len(),
            entries = graph.entries().len(),
            "source graph built"
        );
        Ok(graph)
    }

    fn insert(&self, graph: &mut SourceGraph, path: PathBuf, origin: Origin) -> (SourceId, bool) {
        let rel = self.config.relative_to_context(&path);
        graph.insert(path, rel, origin)
    }

    fn resolve_entry_file(&self, entry: &str, file: &str) -> Result<Resolution> {
        let importer = self.config.context.join("__entry__");
        let explicit_local = file.starts_with("./") || file.starts_with("../");

        match self.resolver.resolve(file, &importer, Dialect::Script) {
            Ok(Resolution::External) if !explicit_local => {
                // `js/index.js` without the leading dot is still a local file
                // when it exists under the context directory.
                let candidate = self.config.context.join(file).clean();
                Ok(self
                    .resolver
                    .probe(&candidate)
                    .map(Resolution::Local)
                    .unwrap_or(Resolution::External))
            }
            Ok(resolution) => Ok(resolution),
            Err(Error::UnresolvedReference { .. }) => Err(Error::EntryNotFound {
                entry: entry.to_string(),
                file: self.config.context.join(file).clean(),
            }),
            Err(other) => Err(other),
        }
    }

    fn scan(&self, path: &Path, kind: SourceKind) -> Result<Vec<RawReference>> {
        if kind == SourceKind::Other {
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let Ok(text) = String::from_utf8(bytes) else {
            debug!("{} is not UTF-8, skipping reference scan", path.display());
            return Ok(Vec::new());
        };

        Ok(match kind {
            SourceKind::Script => scan_script(path, &text),
            SourceKind::Style => scan_style(&text),
            SourceKind::Sass => self.scan_sass(path, &text),
            SourceKind::Other => Vec::new(),
        })
    }

    /// `url()` references of a Sass file and every partial it pulls in.
    fn scan_sass(&self, path: &Path, text: &str) -> Vec<RawReference> {
        let mut references = Vec::new();
        let mut seen = FxHashSet::default();
        let mut pending = vec![(path.to_path_buf(), text.to_string())];
        seen.insert(path.to_path_buf());

        while let Some((file, text)) = pending.pop() {
            let text = strip_sass_comments(&text);
            references.extend(scan_urls(&text));

            for specifier in sass_imports(&text) {
                let Some(partial) = find_partial(&file, &self.config.context, &specifier) else {
                    debug!(
                        "sass import '{}' in {} left to the compiler",
                        specifier,
                        file.display()
                    );
                    continue;
                };
                if seen.insert(partial.clone()) {
                    if let Ok(contents) = std::fs::read_to_string(&partial) {
                        pending.push((partial, contents));
                    }
                }
            }
        }

        references
    }
}

/// Static, dynamic and CommonJS imports of a script.
pub fn scan_script(path: &Path, text: &str) -> Vec<RawReference> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    let ret = Parser::new(&allocator, text, source_type).parse();
    if ret.panicked {
        debug!("{} failed to parse, no references collected", path.display());
        return Vec::new();
    }

    let mut collector = ImportCollector::default();
    collector.visit_program(&ret.program);
    collector.references
}

#[derive(Default)]
struct ImportCollector {
    references: Vec<RawReference>,
}

impl ImportCollector {
    fn push(&mut self, specifier: &str, kind: ReferenceKind) {
        let reference = RawReference::new(specifier, kind);
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }
}

impl<'a> Visit<'a> for ImportCollector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if !decl.import_kind.is_type() {
            self.push(decl.source.value.as_str(), ReferenceKind::Import);
        }
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            if !decl.export_kind.is_type() {
                self.push(source.value.as_str(), ReferenceKind::Export);
            }
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        if !decl.export_kind.is_type() {
            self.push(decl.source.value.as_str(), ReferenceKind::Export);
        }
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.push(lit.value.as_str(), ReferenceKind::Dynamic);
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &call.callee {
            if ident.name.as_str() == "require" && call.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(lit)) = call.arguments.first() {
                    self.push(lit.value.as_str(), ReferenceKind::Require);
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

/// `@import` and `url()` references of plain CSS.
pub fn scan_style(text: &str) -> Vec<RawReference> {
    let text = BLOCK_COMMENT.replace_all(text, "");
    let mut references: Vec<RawReference> = CSS_IMPORT
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .map(|m| RawReference::new(m.as_str(), ReferenceKind::StyleImport))
        .collect();

    for reference in scan_urls(&text) {
        let imported = references
            .iter()
            .any(|r| r.kind == ReferenceKind::StyleImport && r.specifier == reference.specifier);
        if !imported && !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn scan_urls(text: &str) -> Vec<RawReference> {
    let mut references = Vec::new();
    for caps in CSS_URL.captures_iter(text) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let specifier = m.as_str().trim();
        if is_external_url(specifier) {
            continue;
        }
        let reference = RawReference::new(specifier, ReferenceKind::StyleUrl);
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn strip_sass_comments(text: &str) -> String {
    let text = BLOCK_COMMENT.replace_all(text, "");
    LINE_COMMENT.replace_all(&text, "").into_owned()
}

fn sass_imports(text: &str) -> Vec<String> {
    SASS_IMPORT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|list| {
            QUOTED
                .captures_iter(list.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .filter(|spec| {
            !spec.starts_with("sass:")
                && !spec.ends_with(".css")
                && !spec.starts_with("http:")
                && !spec.starts_with("https:")
        })
        .collect()
}

/// Locate a Sass partial the way the compiler's load paths would.
pub fn find_partial(importer: &Path, context: &Path, specifier: &str) -> Option<PathBuf> {
    let bases = [
        importer.parent().map(Path::to_path_buf),
        Some(context.to_path_buf()),
    ];

    for base in bases.into_iter().flatten() {
        let target = base.join(specifier).clean();
        let dir = target.parent()?.to_path_buf();
        let name = target.file_name()?.to_string_lossy().into_owned();

        let mut candidates = Vec::new();
        if target.extension().is_some() {
            candidates.push(target.clone());
            candidates.push(dir.join(format!("_{name}")));
        } else {
            for ext in ["scss", "sass", "css"] {
                candidates.push(dir.join(format!("{name}.{ext}")));
                candidates.push(dir.join(format!("_{name}.{ext}")));
            }
            for index in ["_index.scss", "index.scss", "_index.sass", "index.sass"] {
                candidates.push(target.join(index));
            }
        }

        if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
            return Some(found);
        }
    }
    None
}

fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(refs: &[RawReference]) -> Vec<&str> {
        refs.iter().map(|r| r.specifier.as_str()).collect()
    }

    #[test]
    fn test_scan_script_collects_every_form() {
        let refs = scan_script(
            Path::new("index.ts"),
            r#"
            import React from 'react';
            import './style.scss';
            import type { Props } from './types';
            export { helper } from './helper';
            export * from './all';
            // import './commented';
            const lazy = () => import('./lazy');
            const data = require('./data.json');
            "#,
        );

        assert_eq!(
            specifiers(&refs),
            vec![
                "react",
                "./style.scss",
                "./helper",
                "./all",
                "./lazy",
                "./data.json"
            ]
        );
        assert_eq!(refs[4].kind, ReferenceKind::Dynamic);
        assert_eq!(refs[5].kind, ReferenceKind::Require);
    }

    #[test]
    fn test_scan_style() {
        let refs = scan_style(
            r#"
            @import "./reset.css";
            /* url(ignored.png) */
            body { background: url(../img/bg.png); }
            @font-face { src: url('fonts/a.woff2') format('woff2'), url("data:font/woff;base64,AA"); }
            .x { background: url(/abs.png); }
            "#,
        );

        assert_eq!(
            specifiers(&refs),
            vec!["./reset.css", "../img/bg.png", "fonts/a.woff2"]
        );
        assert_eq!(refs[0].kind, ReferenceKind::StyleImport);
        assert_eq!(refs[1].kind, ReferenceKind::StyleUrl);
    }

    #[test]
    fn test_sass_imports_skip_builtins_and_css() {
        let imports = sass_imports(
            r#"
            @use "sass:math";
            @import 'variables', 'mixins';
            @import "plain.css";
            @forward "theme";
            "#,
        );
        assert_eq!(imports, vec!["variables", "mixins", "theme"]);
    }

    #[test]
    fn test_find_partial_prefers_underscore_file() {
        let dir = tempfile::tempdir().unwrap();
        let scss = dir.path().join("scss");
        std::fs::create_dir_all(&scss).unwrap();
        std::fs::write(scss.join("_vars.scss"), "$a: 1;").unwrap();
        std::fs::write(scss.join("main.scss"), "@import 'vars';").unwrap();

        let found = find_partial(&scss.join("main.scss"), dir.path(), "vars").unwrap();
        assert_eq!(found, scss.join("_vars.scss"));
    }
}
