//! Terminal chain outputs on their way to disk.

use std::path::PathBuf;

use satchel_config::ResolvedConfig;

use crate::matcher::CompiledRule;
use crate::source::SourceId;
use crate::transforms::Payload;

/// How the assembler treats an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRole {
    /// An ES module, emitted under `output.module_filename`.
    Script,
    /// A stylesheet, concatenated into its entries' bundles.
    Style,
    /// Anything else, emitted under the rule or asset template.
    Asset,
}

impl ArtifactRole {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "mjs" => ArtifactRole::Script,
            "css" => ArtifactRole::Style,
            _ => ArtifactRole::Asset,
        }
    }
}

/// One terminal output of one chain run on one source.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub source: SourceId,
    /// Absolute path of the originating source.
    pub source_path: PathBuf,
    /// Index of the rule whose chain produced this artifact.
    pub rule_index: usize,
    /// Names of the transforms applied, in order.
    pub chain: Vec<&'static str>,
    pub role: ArtifactRole,
    /// Output path template, before expansion.
    pub template: String,
    /// File name suggested by the last transform.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub source_map: Option<String>,
    /// Set once the assembler has named the artifact.
    pub content_hash: Option<String>,
    /// Path relative to the output directory, set with the hash.
    pub output_path: Option<String>,
}

impl Artifact {
    pub fn new(
        source: SourceId,
        source_path: PathBuf,
        rule: &CompiledRule,
        chain: Vec<&'static str>,
        payload: Payload,
        config: &ResolvedConfig,
    ) -> Self {
        let role = ArtifactRole::from_extension(payload.extension());
        let template = output_template(role, rule, config);
        Self {
            source,
            source_path,
            rule_index: rule.index,
            chain,
            role,
            template,
            file_name: payload.file_name,
            bytes: payload.bytes,
            source_map: payload.source_map,
            content_hash: None,
            output_path: None,
        }
    }

    pub fn stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_name)
    }

    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("")
    }
}

/// Template an artifact is named with. A rule `filename` wins; otherwise
/// scripts use the module template, and assets (or stylesheets written on
/// their own) the asset template under the rule's `output_dir`.
pub fn output_template(role: ArtifactRole, rule: &CompiledRule, config: &ResolvedConfig) -> String {
    if let Some(filename) = &rule.rule.filename {
        return filename.clone();
    }
    match (role, &rule.rule.output_dir) {
        (ArtifactRole::Script, _) => config.output.module_filename.clone(),
        (ArtifactRole::Style | ArtifactRole::Asset, Some(dir)) => {
            format!("{}/{}", dir.trim_end_matches('/'), config.output.asset_filename)
        }
        (ArtifactRole::Style, None) => config.output.filename.clone(),
        (ArtifactRole::Asset, None) => config.output.asset_filename.clone(),
    }
}
