//! Built-in transforms.
//!
//! A transform turns one [`Payload`] into one or more payloads. Transforms
//! are synchronous and CPU-bound; the chain executor runs them on the
//! blocking pool so a slow image encode never stalls the runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use satchel_config::TransformKind;

mod css;
mod data;
mod file;
mod image;
mod sass;
mod script;
mod webp;

pub use self::css::{CssTransform, process_css};
pub use self::data::{DataTransform, csv_rows, xml_to_json};
pub use self::file::FileTransform;
pub use self::image::ImageTransform;
pub use self::sass::SassTransform;
pub use self::script::ScriptTransform;
pub use self::webp::WebpTransform;

/// Bytes flowing through a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    /// File name the bytes would have on disk; its extension drives the
    /// next stage and the output template.
    pub file_name: String,
    pub source_map: Option<String>,
}

impl Payload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            source_map: None,
        }
    }

    pub fn text(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {}", self.file_name, e))
    }

    pub fn extension(&self) -> &str {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|e| e.to_str())
            .unwrap_or(&self.file_name)
    }

    /// Same stem, new extension.
    pub fn renamed(&self, ext: &str) -> String {
        format!("{}.{}", self.stem(), ext)
    }
}

/// What a transform may know about the file it is working on.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Absolute path of the original source.
    pub source: PathBuf,
    /// Context directory, used as an extra Sass load path.
    pub context_dir: PathBuf,
    pub source_maps: bool,
}

pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, payload: Payload, ctx: &TransformContext) -> anyhow::Result<Vec<Payload>>;
}

/// Instantiate the transform a rule names.
pub fn build_transform(kind: &TransformKind) -> Arc<dyn Transform> {
    match kind {
        TransformKind::Sass { indented } => Arc::new(SassTransform::new(*indented)),
        TransformKind::Css => Arc::new(CssTransform),
        TransformKind::Script { target } => Arc::new(ScriptTransform::new(target.clone())),
        TransformKind::Image { jpeg_quality } => Arc::new(ImageTransform::new(*jpeg_quality)),
        TransformKind::Webp { quality } => Arc::new(WebpTransform::new(*quality)),
        TransformKind::File => Arc::new(FileTransform),
        TransformKind::Data { format } => Arc::new(DataTransform::new(*format)),
    }
}
