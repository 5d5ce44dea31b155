//! Output assembly.
//!
//! Takes every terminal artifact of a build and produces the complete list
//! of output files plus the manifest. Nothing here touches the output
//! directory; [`crate::output::write_output`] does that once assembly has
//! succeeded, so a failure at any step leaves the previous build in place.

pub mod entries;
pub mod html;
pub mod minify;
pub mod naming;
pub mod rewrite;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use satchel_config::ResolvedConfig;
use tracing::debug;

use self::rewrite::{RewrittenStyle, Target};
use crate::artifact::{Artifact, ArtifactRole};
use crate::hash::{TemplateParts, content_hash, render_template};
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::output::OutputFile;
use crate::source::{EntryItem, Source, SourceGraph, SourceId};
use crate::{Error, Result};

/// Everything a build writes.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub files: Vec<OutputFile>,
    pub manifest: Manifest,
}

pub struct Assembler<'a> {
    config: &'a ResolvedConfig,
    graph: &'a SourceGraph,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a ResolvedConfig, graph: &'a SourceGraph) -> Self {
        Self { config, graph }
    }

    /// Artifacts must be ordered by source, then rule, then chain output.
    pub fn assemble(&self, mut artifacts: Vec<Artifact>) -> Result<Assembly> {
        if self.config.minify {
            self.minify_scripts(&mut artifacts)?;
        }

        let primary = naming::primary_artifacts(&artifacts);
        naming::name_artifacts(self.config, self.graph, &mut artifacts, &primary);
        let targets = self.targets(&artifacts, &primary);

        let mut out = Outputs::default();
        let mut manifest = Manifest::default();

        self.emit_scripts_and_assets(&artifacts, &targets, &mut out, &mut manifest)?;

        let styles = self.rewrite_styles(&artifacts, &primary, &targets)?;
        self.emit_standalone_styles(&artifacts, &primary, &targets, &styles, &mut out, &mut manifest)?;

        let page = self.emit_entries(&artifacts, &primary, &targets, &styles, &mut out, &mut manifest)?;
        self.emit_html(&page, &mut out)?;

        let json = manifest
            .to_json()
            .map_err(|e| Error::assembly("manifest", e))?;
        out.insert(MANIFEST_FILE.to_string(), json.into_bytes())?;

        debug!(files = out.files.len(), "assembled output");
        Ok(Assembly {
            files: out.into_files(),
            manifest,
        })
    }

    fn minify_scripts(&self, artifacts: &mut [Artifact]) -> Result<()> {
        for artifact in artifacts
            .iter_mut()
            .filter(|a| a.role == ArtifactRole::Script)
        {
            let code = utf8(artifact)?;
            let minified = minify::minify_script(code, &artifact.file_name).map_err(|e| {
                Error::assembly(
                    "minify",
                    format!("{}: {:#}", artifact.source_path.display(), e),
                )
            })?;
            artifact.bytes = minified.into_bytes();
            artifact.source_map = None;
        }
        Ok(())
    }

    fn targets(
        &self,
        artifacts: &[Artifact],
        primary: &FxHashMap<SourceId, usize>,
    ) -> FxHashMap<SourceId, Target> {
        primary
            .iter()
            .filter_map(|(&id, &index)| {
                let artifact = &artifacts[index];
                let target = match (artifact.role, &artifact.output_path) {
                    (ArtifactRole::Style, _) => Target::Style,
                    (ArtifactRole::Script, Some(path)) => {
                        Target::Script(self.config.public_url(path))
                    }
                    (ArtifactRole::Asset, Some(path)) => Target::Asset(self.config.public_url(path)),
                    _ => return None,
                };
                Some((id, target))
            })
            .collect()
    }

    fn emit_scripts_and_assets(
        &self,
        artifacts: &[Artifact],
        targets: &FxHashMap<SourceId, Target>,
        out: &mut Outputs,
        manifest: &mut Manifest,
    ) -> Result<()> {
        for artifact in artifacts {
            let Some(path) = &artifact.output_path else {
                continue;
            };
            let source = self.graph.get(artifact.source);

            let bytes = match artifact.role {
                ArtifactRole::Script => {
                    let mut code =
                        rewrite::rewrite_script(utf8(artifact)?, |spec| lookup(source, spec, targets));
                    if let Some(map) = &artifact.source_map {
                        let map_path = format!("{path}.map");
                        code.push_str(&format!(
                            "\n//# sourceMappingURL={}\n",
                            file_name(&map_path)
                        ));
                        out.insert(map_path, map.clone().into_bytes())?;
                    }
                    code.into_bytes()
                }
                ArtifactRole::Asset => artifact.bytes.clone(),
                ArtifactRole::Style => continue,
            };

            out.insert(path.clone(), bytes)?;
            manifest.add_source_file(&source.rel, path);
        }
        Ok(())
    }

    fn rewrite_styles(
        &self,
        artifacts: &[Artifact],
        primary: &FxHashMap<SourceId, usize>,
        targets: &FxHashMap<SourceId, Target>,
    ) -> Result<FxHashMap<SourceId, RewrittenStyle>> {
        let mut styles = FxHashMap::default();
        for (&id, &index) in primary {
            let artifact = &artifacts[index];
            if artifact.role != ArtifactRole::Style {
                continue;
            }
            let source = self.graph.get(id);
            let rewritten =
                rewrite::rewrite_style(utf8(artifact)?, |spec| lookup(source, spec, targets));
            styles.insert(id, rewritten);
        }

        for (id, conditions) in self.import_conditions(&styles) {
            if let Some(style) = styles.get_mut(&id) {
                style.body = conditions
                    .iter()
                    .map(|condition| rewrite::wrap_conditional(&style.body, condition))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
        }
        Ok(styles)
    }

    /// Conditions each stylesheet is imported under, for sheets that are
    /// only ever imported conditionally. A sheet listed in an entry or
    /// referenced plainly anywhere is left out.
    fn import_conditions(
        &self,
        styles: &FxHashMap<SourceId, RewrittenStyle>,
    ) -> FxHashMap<SourceId, Vec<String>> {
        let mut plain: FxHashSet<SourceId> = self
            .graph
            .entries()
            .values()
            .flatten()
            .filter_map(|item| match item {
                EntryItem::Local(id) => Some(*id),
                EntryItem::External(_) => None,
            })
            .collect();
        let mut conditions: FxHashMap<SourceId, Vec<String>> = FxHashMap::default();

        for source in self.graph.sources() {
            for reference in &source.references {
                if !styles.contains_key(&reference.target) {
                    continue;
                }
                let condition = styles.get(&source.id).and_then(|style| {
                    style
                        .conditional
                        .iter()
                        .find(|(specifier, _)| *specifier == reference.specifier)
                });
                match condition {
                    Some((_, condition)) => {
                        let list = conditions.entry(reference.target).or_default();
                        if !list.contains(condition) {
                            list.push(condition.clone());
                        }
                    }
                    None => {
                        plain.insert(reference.target);
                    }
                }
            }
        }

        conditions.retain(|id, _| !plain.contains(id));
        conditions
    }

    /// Stylesheets no entry reaches (from `copy` directories) are written on
    /// their own, as is every style artifact beyond a source's first (a
    /// second rule under `all-match`).
    fn emit_standalone_styles(
        &self,
        artifacts: &[Artifact],
        primary: &FxHashMap<SourceId, usize>,
        targets: &FxHashMap<SourceId, Target>,
        styles: &FxHashMap<SourceId, RewrittenStyle>,
        out: &mut Outputs,
        manifest: &mut Manifest,
    ) -> Result<()> {
        for (index, artifact) in artifacts.iter().enumerate() {
            if artifact.role != ArtifactRole::Style {
                continue;
            }
            let source = self.graph.get(artifact.source);
            let rewritten = if primary.get(&artifact.source) == Some(&index) {
                if !source.entries.is_empty() {
                    continue;
                }
                match styles.get(&artifact.source) {
                    Some(style) => style.clone(),
                    None => continue,
                }
            } else {
                rewrite::rewrite_style(utf8(artifact)?, |spec| lookup(source, spec, targets))
            };

            let css = self.finish_css(&artifact.file_name, entries::concat_styles([&rewritten]))?;
            let hash = content_hash(css.as_bytes(), self.config.output.hash_length);
            let path = naming::output_path(artifact, self.graph, &hash);
            manifest.add_source_file(&source.rel, &path);
            out.insert(path, css.into_bytes())?;
        }
        Ok(())
    }

    fn emit_entries(
        &self,
        artifacts: &[Artifact],
        primary: &FxHashMap<SourceId, usize>,
        targets: &FxHashMap<SourceId, Target>,
        styles: &FxHashMap<SourceId, RewrittenStyle>,
        out: &mut Outputs,
        manifest: &mut Manifest,
    ) -> Result<Page> {
        let mut page = Page::default();

        let shared = self.shared_styles(styles);
        let shared_path = if shared.is_empty() {
            None
        } else {
            let css = self.finish_css("shared.css", entries::concat_styles(shared.iter().map(|id| &styles[id])))?;
            let path = self.entry_file_name("shared", "css", css.as_bytes());
            for id in &shared {
                manifest.add_source_file(&self.graph.get(*id).rel, &path);
            }
            out.insert(path.clone(), css.into_bytes())?;
            Some(path)
        };

        for (name, items) in self.graph.entries() {
            let order = self.graph.post_order(&self.graph.entry_sources(name));

            if let Some(path) = &shared_path {
                if order.iter().any(|id| shared.contains(id)) {
                    manifest.add_entry_file(name, path);
                    page.add_style(self.config.public_url(path));
                }
            }

            let own: Vec<SourceId> = order
                .iter()
                .copied()
                .filter(|id| styles.contains_key(id) && !shared.contains(id))
                .collect();
            if !own.is_empty() {
                let css = self.finish_css(
                    &format!("{name}.css"),
                    entries::concat_styles(own.iter().map(|id| &styles[id])),
                )?;
                let path = self.entry_file_name(name, "css", css.as_bytes());
                for id in &own {
                    manifest.add_source_file(&self.graph.get(*id).rel, &path);
                }
                manifest.add_entry_file(name, &path);
                page.add_style(self.config.public_url(&path));
                out.insert(path, css.into_bytes())?;
            }

            let mut externals = Vec::new();
            let mut scripts = Vec::new();
            let mut assets = Vec::new();
            for item in items {
                match item {
                    EntryItem::External(specifier) => externals.push(specifier.clone()),
                    EntryItem::Local(id) => match targets.get(id) {
                        Some(Target::Script(url)) => scripts.push(url.clone()),
                        Some(Target::Asset(_)) => {
                            if let Some(path) = &artifacts[primary[id]].output_path {
                                assets.push(path.clone());
                            }
                        }
                        Some(Target::Style) | None => {}
                    },
                }
            }

            if !externals.is_empty() || !scripts.is_empty() {
                let code = entries::facade(&externals, &scripts);
                let path = self.entry_file_name(name, "js", code.as_bytes());
                manifest.add_entry_file(name, &path);
                page.add_script(self.config.public_url(&path));
                out.insert(path, code.into_bytes())?;
            }

            for path in assets {
                manifest.add_entry_file(name, &path);
            }
        }

        Ok(page)
    }

    /// Styles reached by two or more entries, in first-use order.
    fn shared_styles(&self, styles: &FxHashMap<SourceId, RewrittenStyle>) -> Vec<SourceId> {
        if !self.config.split_chunks {
            return Vec::new();
        }
        let mut shared = Vec::new();
        for name in self.graph.entries().keys() {
            for id in self.graph.post_order(&self.graph.entry_sources(name)) {
                if styles.contains_key(&id)
                    && self.graph.get(id).entries.len() > 1
                    && !shared.contains(&id)
                {
                    shared.push(id);
                }
            }
        }
        shared
    }

    fn emit_html(&self, page: &Page, out: &mut Outputs) -> Result<()> {
        let Some(config) = &self.config.html else {
            return Ok(());
        };

        let template = match std::fs::read_to_string(&config.template) {
            Ok(template) => template,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "no template at {}, using the built-in page",
                    config.template.display()
                );
                html::default_template(&config.title)
            }
            Err(e) => return Err(Error::io(&config.template, e)),
        };

        let mut document = html::inject_assets(&template, &page.styles, &page.scripts);
        if config.collapse_whitespace {
            document = html::collapse_whitespace(&document);
        }
        out.insert(config.filename.clone(), document.into_bytes())
    }

    fn finish_css(&self, name: &str, css: String) -> Result<String> {
        if !self.config.minify {
            return Ok(css);
        }
        minify::minify_style(&css, name)
            .map_err(|e| Error::assembly("minify", format!("{:#}", e)))
    }

    fn entry_file_name(&self, name: &str, ext: &str, bytes: &[u8]) -> String {
        let hash = content_hash(bytes, self.config.output.hash_length);
        render_template(
            &self.config.output.filename,
            TemplateParts {
                name,
                ext,
                path: "",
                hash: &hash,
            },
        )
    }
}

/// URLs the HTML page loads.
#[derive(Debug, Default)]
struct Page {
    styles: Vec<String>,
    scripts: Vec<String>,
}

impl Page {
    fn add_style(&mut self, url: String) {
        if !self.styles.contains(&url) {
            self.styles.push(url);
        }
    }

    fn add_script(&mut self, url: String) {
        if !self.scripts.contains(&url) {
            self.scripts.push(url);
        }
    }
}

/// Output files keyed by path, in emission order.
#[derive(Debug, Default)]
struct Outputs {
    files: IndexMap<String, Vec<u8>>,
}

impl Outputs {
    fn insert(&mut self, path: String, bytes: Vec<u8>) -> Result<()> {
        match self.files.get(&path) {
            Some(existing) if *existing != bytes => Err(Error::assembly(
                "naming",
                format!(
                    "two different files map to '{}'; add [hash] or [path] to the template",
                    path
                ),
            )),
            Some(_) => Ok(()),
            None => {
                self.files.insert(path, bytes);
                Ok(())
            }
        }
    }

    fn into_files(self) -> Vec<OutputFile> {
        self.files
            .into_iter()
            .map(|(path, bytes)| OutputFile::new(path, bytes))
            .collect()
    }
}

fn lookup(source: &Source, specifier: &str, targets: &FxHashMap<SourceId, Target>) -> Option<Target> {
    source
        .target_of(specifier)
        .and_then(|reference| targets.get(&reference.target))
        .cloned()
}

fn utf8(artifact: &Artifact) -> Result<&str> {
    std::str::from_utf8(&artifact.bytes).map_err(|e| {
        Error::assembly(
            "rewrite",
            format!("{} is not UTF-8: {}", artifact.source_path.display(), e),
        )
    })
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
