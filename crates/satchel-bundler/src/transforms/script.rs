use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions, Transformer};

use super::{Payload, Transform, TransformContext};

/// Lower TypeScript, JSX and modern syntax to an ES module for `target`.
pub struct ScriptTransform {
    target: String,
}

impl ScriptTransform {
    pub fn new(target: String) -> Self {
        Self { target }
    }

    fn options(&self) -> anyhow::Result<TransformOptions> {
        let mut options = TransformOptions::from_target(&self.target)
            .map_err(|e| anyhow::anyhow!("invalid script target '{}': {}", self.target, e))?;
        options.jsx = JsxOptions {
            runtime: JsxRuntime::Classic,
            ..Default::default()
        };
        Ok(options)
    }
}

impl Transform for ScriptTransform {
    fn name(&self) -> &'static str {
        "script"
    }

    fn apply(&self, payload: Payload, ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let source = payload.text()?;
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(&payload.file_name)
            .unwrap_or_else(|_| SourceType::mjs().with_jsx(true));

        let parsed = Parser::new(&allocator, source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!("syntax error: {}", messages.join(", "));
        }
        let mut program = parsed.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let options = self.options()?;
        let transformed = Transformer::new(&allocator, &ctx.source, &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            let messages: Vec<String> = transformed.errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!("{}", messages.join(", "));
        }

        let codegen_options = CodegenOptions {
            source_map_path: ctx.source_maps.then(|| PathBuf::from(&ctx.source)),
            ..Default::default()
        };
        let generated = Codegen::new().with_options(codegen_options).build(&program);

        Ok(vec![Payload {
            bytes: generated.code.into_bytes(),
            file_name: payload.renamed("js"),
            source_map: generated.map.map(|map| map.to_json_string()),
        }])
    }
}
