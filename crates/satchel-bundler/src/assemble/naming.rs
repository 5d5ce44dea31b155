//! Content-hash naming of scripts and assets.
//!
//! An asset is named by the hash of its bytes. A script's name also covers
//! every script and asset it reaches through imports, because their URLs end
//! up inside it once references are rewritten: each member contributes its
//! bytes and its file name with the hash left out, and the public path is
//! folded in once. Hashing the reachable set instead of rewritten bytes
//! keeps import cycles well-defined.

use rustc_hash::{FxHashMap, FxHashSet};
use satchel_config::ResolvedConfig;

use crate::artifact::{Artifact, ArtifactRole};
use crate::hash::{TemplateParts, combined_hash, content_hash, render_template, template_dir};
use crate::source::{SourceGraph, SourceId};

/// The artifact references to a source resolve to: its first one.
pub fn primary_artifacts(artifacts: &[Artifact]) -> FxHashMap<SourceId, usize> {
    let mut primary = FxHashMap::default();
    for (index, artifact) in artifacts.iter().enumerate() {
        primary.entry(artifact.source).or_insert(index);
    }
    primary
}

/// Set `content_hash` and `output_path` on every script and asset.
pub fn name_artifacts(
    config: &ResolvedConfig,
    graph: &SourceGraph,
    artifacts: &mut [Artifact],
    primary: &FxHashMap<SourceId, usize>,
) {
    let len = config.output.hash_length;
    let view: &[Artifact] = artifacts;
    let hashes: Vec<Option<String>> = view
        .iter()
        .enumerate()
        .map(|(index, artifact)| match artifact.role {
            ArtifactRole::Asset => Some(content_hash(&artifact.bytes, len)),
            ArtifactRole::Script => Some(closure_hash(index, view, graph, primary, config)),
            ArtifactRole::Style => None,
        })
        .collect();

    for (artifact, hash) in artifacts.iter_mut().zip(hashes) {
        if let Some(hash) = hash {
            let path = output_path(artifact, graph, &hash);
            artifact.output_path = Some(path);
            artifact.content_hash = Some(hash);
        }
    }
}

/// Expand an artifact's template with `hash`.
pub fn output_path(artifact: &Artifact, graph: &SourceGraph, hash: &str) -> String {
    let dir = template_dir(&graph.get(artifact.source).rel);
    render_template(
        &artifact.template,
        TemplateParts {
            name: artifact.stem(),
            ext: artifact.extension(),
            path: &dir,
            hash,
        },
    )
}

fn closure_hash(
    index: usize,
    artifacts: &[Artifact],
    graph: &SourceGraph,
    primary: &FxHashMap<SourceId, usize>,
    config: &ResolvedConfig,
) -> String {
    let root = &artifacts[index];
    let mut visited = FxHashSet::default();
    visited.insert(root.source);
    let mut stack = vec![root.source];
    let mut members: Vec<(&str, String, &[u8])> = Vec::new();

    while let Some(id) = stack.pop() {
        for reference in &graph.get(id).references {
            if !visited.insert(reference.target) {
                continue;
            }
            let Some(&target_index) = primary.get(&reference.target) else {
                continue;
            };
            let target = &artifacts[target_index];
            let rel = graph.get(reference.target).rel.as_str();
            match target.role {
                ArtifactRole::Script => {
                    members.push((rel, output_path(target, graph, ""), &target.bytes));
                    stack.push(reference.target);
                }
                ArtifactRole::Asset => {
                    members.push((rel, output_path(target, graph, ""), &target.bytes));
                }
                ArtifactRole::Style => {}
            }
        }
    }

    members.sort_by(|a, b| a.0.cmp(b.0));
    let parts = [root.bytes.as_slice(), config.output.public_path.as_bytes()]
        .into_iter()
        .chain(
            members
                .iter()
                .flat_map(|(rel, shape, bytes)| [rel.as_bytes(), shape.as_bytes(), *bytes]),
        );
    combined_hash(parts, config.output.hash_length)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use satchel_config::{ConfigLoader, RuleConfig, TransformKind};

    use super::*;
    use crate::matcher::RuleMatcher;
    use crate::source::{Origin, Reference, ReferenceKind};
    use crate::transforms::Payload;

    struct Fixture {
        config: ResolvedConfig,
        graph: SourceGraph,
        artifacts: Vec<Artifact>,
    }

    /// `index.js` importing `logo.png`, both through a plain `file` rule.
    fn fixture(configure: impl FnOnce(&mut ResolvedConfig)) -> Fixture {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let mut config = ConfigLoader::new(dir.path())
            .without_env()
            .resolve()
            .expect("config");
        config.output.module_filename = "[path][name].[hash].[ext]".to_string();
        config.output.asset_filename = "[name].[hash].[ext]".to_string();
        config.rules = vec![RuleConfig::new(r"\.(js|png)$", vec![TransformKind::File.into()])];
        configure(&mut config);

        let matcher = RuleMatcher::new(&config.rules, config.match_strategy).expect("rules");
        let rule = &matcher.rules()[0];

        let mut graph = SourceGraph::new();
        let (script, _) = graph.insert(
            PathBuf::from("/p/src/js/index.js"),
            "js/index.js".into(),
            Origin::Entry,
        );
        let (logo, _) = graph.insert(
            PathBuf::from("/p/src/logo.png"),
            "logo.png".into(),
            Origin::Dependency,
        );
        graph.add_reference(
            script,
            Reference {
                specifier: "../logo.png".to_string(),
                kind: ReferenceKind::Import,
                target: logo,
            },
        );

        let sources: [(SourceId, &str, &[u8]); 2] = [
            (script, "index.js", b"import logo from '../logo.png';"),
            (logo, "logo.png", b"PNG"),
        ];
        let artifacts = sources
            .into_iter()
            .map(|(id, name, bytes)| {
                Artifact::new(
                    id,
                    graph.get(id).path.clone(),
                    rule,
                    Vec::new(),
                    Payload::new(name.to_string(), bytes.to_vec()),
                    &config,
                )
            })
            .collect();

        Fixture { config, graph, artifacts }
    }

    fn script_path(configure: impl FnOnce(&mut ResolvedConfig)) -> String {
        let mut f = fixture(configure);
        let primary = primary_artifacts(&f.artifacts);
        name_artifacts(&f.config, &f.graph, &mut f.artifacts, &primary);
        f.artifacts[0].output_path.clone().expect("named")
    }

    #[test]
    fn test_script_name_follows_public_path() {
        let plain = script_path(|_| {});
        assert!(plain.starts_with("js/index.") && plain.ends_with(".js"), "{plain}");
        assert_eq!(plain, script_path(|_| {}));
        assert_ne!(plain, script_path(|c| c.output.public_path = "/static/".to_string()));
    }

    #[test]
    fn test_script_name_follows_asset_location() {
        let plain = script_path(|_| {});
        let moved = script_path(|c| c.output.asset_filename = "img/[name].[hash].[ext]".to_string());
        assert_ne!(plain, moved);
    }
}
