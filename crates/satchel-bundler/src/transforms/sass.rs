use std::path::Path;

use grass::{InputSyntax, Options, OutputStyle};

use super::{Payload, Transform, TransformContext};

/// Sass/SCSS to CSS through grass.
pub struct SassTransform {
    indented: Option<bool>,
}

impl SassTransform {
    pub fn new(indented: Option<bool>) -> Self {
        Self { indented }
    }
}

impl Transform for SassTransform {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, payload: Payload, ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let source = payload.text()?;
        let indented = self.indented.unwrap_or(payload.extension() == "sass");
        let syntax = if indented {
            InputSyntax::Sass
        } else {
            InputSyntax::Scss
        };

        let parent = ctx.source.parent().map(Path::to_path_buf);
        let mut options = Options::default()
            .style(OutputStyle::Expanded)
            .input_syntax(syntax);
        if let Some(dir) = &parent {
            options = options.load_path(dir);
        }
        options = options.load_path(&ctx.context_dir);

        let css = grass::from_string(source.to_string(), &options)
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(vec![Payload::new(payload.renamed("css"), css.into_bytes())])
    }
}
