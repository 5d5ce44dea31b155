//! Rule and transform declarations.
//!
//! A rule pairs a path predicate with an ordered chain of transforms. The
//! transform set is closed: every kind the pipeline knows how to run is a
//! variant of [`TransformKind`], so a typo in a config file is a parse error
//! rather than a runtime surprise.

use serde::{Deserialize, Serialize};

/// How the matcher treats a file that several rules accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// The first rule in declaration order wins.
    #[default]
    FirstMatch,
    /// Every matching rule runs its chain on the file.
    AllMatch,
}

/// One entry of the rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regex tested against the source path relative to the context
    /// directory, using `/` separators.
    pub test: String,

    /// Regex that vetoes a match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Ordered transform chain.
    #[serde(rename = "use")]
    pub chain: Vec<TransformSpec>,

    /// Sub-directory of the output dir for this rule's artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// File-name template overriding `output.asset_filename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl RuleConfig {
    pub fn new(test: impl Into<String>, chain: Vec<TransformSpec>) -> Self {
        Self {
            test: test.into(),
            exclude: None,
            chain,
            output_dir: None,
            filename: None,
        }
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_filename(mut self, template: impl Into<String>) -> Self {
        self.filename = Some(template.into());
        self
    }

    /// Names of the transforms in chain order.
    pub fn chain_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|spec| spec.kind.name()).collect()
    }
}

/// A transform plus its failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    #[serde(flatten)]
    pub kind: TransformKind,

    /// When set, a failure is logged and the stage's input passes through.
    #[serde(default)]
    pub best_effort: bool,
}

impl TransformSpec {
    pub fn new(kind: TransformKind) -> Self {
        Self {
            kind,
            best_effort: false,
        }
    }

    pub fn best_effort(kind: TransformKind) -> Self {
        Self {
            kind,
            best_effort: true,
        }
    }
}

impl From<TransformKind> for TransformSpec {
    fn from(kind: TransformKind) -> Self {
        Self::new(kind)
    }
}

/// Every transform the pipeline can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformKind {
    /// Sass/SCSS to CSS. `indented` defaults to true for `.sass` files.
    Sass {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        indented: Option<bool>,
    },

    /// Parse and normalize CSS.
    Css,

    /// TypeScript / JSX / modern JS down to an ES module for `target`.
    Script {
        #[serde(default = "default_script_target")]
        target: String,
    },

    /// Lossy JPEG / lossless PNG recompression.
    Image {
        #[serde(default = "default_jpeg_quality")]
        jpeg_quality: u8,
    },

    /// Keeps the input and adds a WebP encoding of it.
    Webp {
        #[serde(default = "default_webp_quality")]
        quality: f32,
    },

    /// Emit the bytes unchanged.
    File,

    /// Turn a data file into an `export default` module.
    Data { format: DataFormat },
}

impl TransformKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::Sass { .. } => "sass",
            TransformKind::Css => "css",
            TransformKind::Script { .. } => "script",
            TransformKind::Image { .. } => "image",
            TransformKind::Webp { .. } => "webp",
            TransformKind::File => "file",
            TransformKind::Data { .. } => "data",
        }
    }

    /// Whether this transform can yield more than one output.
    pub fn fans_out(&self) -> bool {
        matches!(self, TransformKind::Webp { .. })
    }

    pub fn sass() -> Self {
        TransformKind::Sass { indented: None }
    }

    pub fn script() -> Self {
        TransformKind::Script {
            target: default_script_target(),
        }
    }

    pub fn image() -> Self {
        TransformKind::Image {
            jpeg_quality: default_jpeg_quality(),
        }
    }

    pub fn webp() -> Self {
        TransformKind::Webp {
            quality: default_webp_quality(),
        }
    }

    pub fn data(format: DataFormat) -> Self {
        TransformKind::Data { format }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Xml,
    Csv,
    Json,
}

pub fn default_script_target() -> String {
    "es2015".to_string()
}

pub fn default_jpeg_quality() -> u8 {
    65
}

pub fn default_webp_quality() -> f32 {
    75.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_spec_from_toml() {
        let rule: RuleConfig = toml::from_str(
            r#"
            test = "\\.png$"
            output_dir = "img"
            use = [
                { kind = "image", jpeg_quality = 80 },
                { kind = "webp", best_effort = true },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(rule.output_dir.as_deref(), Some("img"));
        assert_eq!(rule.chain.len(), 2);
        assert_eq!(rule.chain[0].kind, TransformKind::Image { jpeg_quality: 80 });
        assert!(!rule.chain[0].best_effort);
        assert_eq!(rule.chain[1].kind, TransformKind::webp());
        assert!(rule.chain[1].best_effort);
    }

    #[test]
    fn test_unit_variant_from_json() {
        let spec: TransformSpec = serde_json::from_str(r#"{"kind":"css"}"#).unwrap();
        assert_eq!(spec.kind, TransformKind::Css);
        assert!(!spec.best_effort);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: Result<TransformSpec, _> = serde_json::from_str(r#"{"kind":"less"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_fan_out_flag() {
        assert!(TransformKind::webp().fans_out());
        assert!(!TransformKind::image().fans_out());
        assert!(!TransformKind::Css.fans_out());
    }
}
