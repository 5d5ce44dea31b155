use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};

use super::{Payload, Transform, TransformContext};

/// Parse and re-print CSS, rejecting malformed stylesheets early.
pub struct CssTransform;

impl Transform for CssTransform {
    fn name(&self) -> &'static str {
        "css"
    }

    fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let css = process_css(&payload.file_name, payload.text()?, false)?;
        Ok(vec![Payload::new(payload.renamed("css"), css.into_bytes())])
    }
}

/// Run a stylesheet through lightningcss, optionally minifying it.
pub fn process_css(name: &str, source: &str, minify: bool) -> anyhow::Result<String> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: name.to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("Failed to parse CSS from {}: {}", name, e))?;

    if minify {
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| anyhow::anyhow!("Failed to minify CSS from {}: {}", name, e))?;
    }

    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("Failed to print CSS from {}: {}", name, e))?;

    Ok(result.code)
}
