//! Whole-file minification of emitted scripts and stylesheets.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::transforms::process_css;

/// Minify an ES module. Import specifiers survive untouched, so references
/// can still be rewritten afterwards.
pub fn minify_script(code: &str, name: &str) -> anyhow::Result<String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("cannot minify {}: {}", name, messages.join(", "));
    }
    let mut program = parsed.program;

    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::default()),
        ..Default::default()
    };
    let minified = Minifier::new(options).minify(&allocator, &mut program);

    let generated = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program);
    Ok(generated.code)
}

pub fn minify_style(css: &str, name: &str) -> anyhow::Result<String> {
    process_css(name, css, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_script_keeps_specifiers() {
        let code = "import { helper } from './util.js';\n\nexport function run(value) {\n    const doubled = value * 2;\n    return helper(doubled);\n}\n";
        let out = minify_script(code, "index.js").unwrap();
        assert!(out.len() < code.len());
        assert!(out.contains("./util.js"));
        assert!(out.contains("run"));
    }

    #[test]
    fn test_minify_style() {
        let out = minify_style("body {\n  margin: 0px;\n}\n", "main.css").unwrap();
        assert_eq!(out, "body{margin:0}");
    }
}
