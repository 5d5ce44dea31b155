//! Per-entry bundles: the facade module and the concatenated stylesheet.

use super::rewrite::RewrittenStyle;

/// Module that loads an entry: its bare package imports, then its scripts,
/// in declaration order.
pub fn facade(externals: &[String], scripts: &[String]) -> String {
    let mut code = String::new();
    for specifier in externals.iter().chain(scripts) {
        code.push_str(&format!("import \"{}\";\n", specifier.replace('"', "\\\"")));
    }
    code
}

/// Concatenate stylesheets in order. Remote `@import` rules are hoisted to
/// the top, where CSS requires them.
pub fn concat_styles<'a>(styles: impl IntoIterator<Item = &'a RewrittenStyle>) -> String {
    let mut imports: Vec<&str> = Vec::new();
    let mut bodies: Vec<&str> = Vec::new();
    for style in styles {
        for import in &style.imports {
            if !imports.contains(&import.as_str()) {
                imports.push(import);
            }
        }
        let body = style.body.trim();
        if !body.is_empty() {
            bodies.push(body);
        }
    }

    let mut css = String::new();
    for import in imports {
        css.push_str(import);
        css.push('\n');
    }
    for body in bodies {
        css.push_str(body);
        css.push('\n');
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_order() {
        let code = facade(
            &["@babel/polyfill".to_string()],
            &["/js/index.1234.js".to_string()],
        );
        assert_eq!(code, "import \"@babel/polyfill\";\nimport \"/js/index.1234.js\";\n");
    }

    #[test]
    fn test_concat_hoists_imports() {
        let reset = RewrittenStyle {
            body: "html{margin:0}".to_string(),
            imports: vec!["@import url(\"https://x/font.css\");".to_string()],
            ..Default::default()
        };
        let main = RewrittenStyle {
            body: "body{color:red}\n".to_string(),
            imports: vec!["@import url(\"https://x/font.css\");".to_string()],
            ..Default::default()
        };
        assert_eq!(
            concat_styles([&reset, &main]),
            "@import url(\"https://x/font.css\");\nhtml{margin:0}\nbody{color:red}\n"
        );
    }
}
