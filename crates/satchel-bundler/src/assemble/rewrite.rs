//! Reference rewriting in emitted scripts and stylesheets.
//!
//! Works on transform output text. Specifiers are looked up exactly as
//! written in the source; anything the lookup does not know (packages,
//! URLs already rewritten) is left alone. Scripts are parsed with oxc and
//! edited by span, so string literals and comments that merely look like
//! imports are never touched.

use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, ExportSpecifier,
    Expression, ImportDeclaration, ImportDeclarationSpecifier, ImportExpression, ModuleExportName,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use regex::{Captures, Regex};
use tracing::debug;

use crate::resolve::suffix_of;

static STYLE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"@import\s+(?:url\(\s*)?(?:"(?P<d>[^"]*)"|'(?P<s>[^']*)'|(?P<u>[^"'\s);]+))\s*\)?(?P<condition>[^;]*);"#,
    )
    .expect("valid regex")
});
static STYLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"(?P<d>[^"]*)"|'(?P<s>[^']*)'|(?P<u>[^)"'\s]+))\s*\)"#)
        .expect("valid regex")
});

/// What a specifier points at once everything is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Another emitted module.
    Script(String),
    /// A stylesheet; it lives in the entry bundle, not at a URL.
    Style,
    /// A file with a public URL.
    Asset(String),
}

/// Rewrite import/export/require specifiers in a script.
///
/// Code that does not parse as a module or as a CommonJS script comes back
/// unchanged.
pub fn rewrite_script(code: &str, lookup: impl Fn(&str) -> Option<Target>) -> String {
    let allocator = Allocator::default();
    let parsed = [SourceType::mjs(), SourceType::cjs()]
        .into_iter()
        .map(|source_type| Parser::new(&allocator, code, source_type).parse())
        .find(|ret| !ret.panicked && ret.errors.is_empty());
    let Some(ret) = parsed else {
        debug!("script does not parse, references left as written");
        return code.to_string();
    };

    let mut collector = EditCollector {
        lookup: &lookup,
        edits: Vec::new(),
    };
    collector.visit_program(&ret.program);
    splice(code, collector.edits)
}

/// Replacement of one source range.
#[derive(Debug)]
struct Edit {
    span: Span,
    text: String,
}

/// Apply `edits` back to front. An edit overlapping one already applied is
/// dropped.
fn splice(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut out = code.to_string();
    let mut limit = code.len();
    for edit in edits {
        let (start, end) = (edit.span.start as usize, edit.span.end as usize);
        if end > limit {
            continue;
        }
        let text = keep_lines(edit.text, &code[start..end]);
        out.replace_range(start..end, &text);
        limit = start;
    }
    out
}

struct EditCollector<'l, F> {
    lookup: &'l F,
    edits: Vec<Edit>,
}

impl<F: Fn(&str) -> Option<Target>> EditCollector<'_, F> {
    fn replace(&mut self, span: Span, text: String) {
        self.edits.push(Edit { span, text });
    }

    /// Point a specifier literal at `url`.
    fn retarget(&mut self, literal: Span, url: &str) {
        self.replace(literal, quote(url));
    }
}

impl<'a, F: Fn(&str) -> Option<Target>> Visit<'a> for EditCollector<'_, F> {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if decl.import_kind.is_type() {
            return;
        }
        let default_value = match (self.lookup)(decl.source.value.as_str()) {
            Some(Target::Script(url)) => {
                self.retarget(decl.source.span, &url);
                return;
            }
            Some(Target::Asset(url)) => quote(&url),
            Some(Target::Style) => "{}".to_string(),
            None => return,
        };
        let bindings: Vec<Binding> = decl.specifiers.iter().flatten().map(binding).collect();
        self.replace(decl.span, bind(&bindings, &default_value));
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        let Some(source) = &decl.source else {
            walk::walk_export_named_declaration(self, decl);
            return;
        };
        if decl.export_kind.is_type() {
            return;
        }
        match (self.lookup)(source.value.as_str()) {
            Some(Target::Script(url)) => self.retarget(source.span, &url),
            Some(Target::Asset(url)) => {
                self.replace(decl.span, export_default(&decl.specifiers, &quote(&url)));
            }
            Some(Target::Style) => self.replace(decl.span, export_default(&decl.specifiers, "{}")),
            None => {}
        }
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        if decl.export_kind.is_type() {
            return;
        }
        let default_value = match (self.lookup)(decl.source.value.as_str()) {
            Some(Target::Script(url)) => {
                self.retarget(decl.source.span, &url);
                return;
            }
            Some(Target::Asset(url)) => quote(&url),
            Some(Target::Style) => "{}".to_string(),
            None => return,
        };
        // `export * from "./logo.png"` has nothing to re-export
        let text = match &decl.exported {
            Some(ModuleExportName::StringLiteral(_)) | None => String::new(),
            Some(name) => format!("export const {} = {{ default: {default_value} }};", name.name()),
        };
        self.replace(decl.span, text);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        let Expression::StringLiteral(literal) = &expr.source else {
            walk::walk_import_expression(self, expr);
            return;
        };
        match (self.lookup)(literal.value.as_str()) {
            Some(Target::Script(url)) => self.retarget(literal.span, &url),
            Some(Target::Asset(url)) => self.replace(
                expr.span,
                format!("Promise.resolve({{ default: {} }})", quote(&url)),
            ),
            Some(Target::Style) => {
                self.replace(expr.span, "Promise.resolve({ default: {} })".to_string());
            }
            None => {}
        }
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let Some((literal, specifier)) = require_specifier(call) else {
            walk::walk_call_expression(self, call);
            return;
        };
        match (self.lookup)(specifier) {
            Some(Target::Script(url)) => self.retarget(literal, &url),
            Some(Target::Asset(url)) => self.replace(call.span, quote(&url)),
            Some(Target::Style) => self.replace(call.span, "{}".to_string()),
            None => {}
        }
    }
}

/// `require("…")` with exactly one string argument.
fn require_specifier<'b>(call: &'b CallExpression<'_>) -> Option<(Span, &'b str)> {
    match (&call.callee, &call.arguments[..]) {
        (Expression::Identifier(ident), [Argument::StringLiteral(literal)])
            if ident.name.as_str() == "require" =>
        {
            Some((literal.span, literal.value.as_str()))
        }
        _ => None,
    }
}

/// One name an import declaration binds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Default(String),
    Namespace(String),
    Named { imported: String, local: String },
}

fn binding(specifier: &ImportDeclarationSpecifier<'_>) -> Binding {
    match specifier {
        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
            Binding::Default(s.local.name.to_string())
        }
        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
            Binding::Namespace(s.local.name.to_string())
        }
        ImportDeclarationSpecifier::ImportSpecifier(s) => Binding::Named {
            imported: property_key(&s.imported),
            local: s.local.name.to_string(),
        },
    }
}

fn property_key(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::StringLiteral(literal) => quote(literal.value.as_str()),
        other => other.name().to_string(),
    }
}

/// Declarations binding an import's names to a module whose default export
/// is `default_value`.
fn bind(bindings: &[Binding], default_value: &str) -> String {
    let namespace = format!("{{ default: {default_value} }}");
    let mut declarations = Vec::new();
    let mut fields = Vec::new();

    for binding in bindings {
        match binding {
            Binding::Default(local) => declarations.push(format!("const {local} = {default_value};")),
            Binding::Namespace(local) => declarations.push(format!("const {local} = {namespace};")),
            Binding::Named { imported, local } if imported == local => fields.push(local.clone()),
            Binding::Named { imported, local } => fields.push(format!("{imported}: {local}")),
        }
    }
    if !fields.is_empty() {
        declarations.push(format!("const {{ {} }} = {namespace};", fields.join(", ")));
    }

    declarations.join(" ")
}

/// `export { default as x } from "./asset"` keeps `x`; other forms have
/// nothing to re-export.
fn export_default(specifiers: &[ExportSpecifier<'_>], default_value: &str) -> String {
    specifiers
        .iter()
        .filter(|s| s.local.name().as_str() == "default")
        .filter_map(|s| match &s.exported {
            ModuleExportName::StringLiteral(_) => None,
            exported => Some(format!("export const {} = {default_value};", exported.name())),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A stylesheet with local `@import` rules removed and `url()`s rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenStyle {
    pub body: String,
    /// `@import` rules that stay (remote sheets); they must lead the bundle.
    pub imports: Vec<String>,
    /// Local sheets imported under a media query, `supports()` or `layer`,
    /// as `(specifier, condition)`.
    pub conditional: Vec<(String, String)>,
}

pub fn rewrite_style(css: &str, lookup: impl Fn(&str) -> Option<Target>) -> RewrittenStyle {
    let mut imports = Vec::new();
    let mut conditional = Vec::new();
    let body = STYLE_IMPORT.replace_all(css, |caps: &Captures<'_>| {
        let spec = specifier(caps);
        if lookup(spec).is_none() {
            imports.push(caps[0].trim().to_string());
        } else {
            let condition = caps.name("condition").map_or("", |m| m.as_str()).trim();
            if !condition.is_empty() {
                conditional.push((spec.to_string(), condition.to_string()));
            }
        }
        String::new()
    });

    let body = STYLE_URL.replace_all(&body, |caps: &Captures<'_>| {
        let spec = specifier(caps).trim();
        match lookup(spec) {
            Some(Target::Asset(url) | Target::Script(url)) => {
                format!("url(\"{}{}\")", url, suffix_of(spec))
            }
            Some(Target::Style) | None => caps[0].to_string(),
        }
    });

    RewrittenStyle {
        body: body.trim_start().to_string(),
        imports,
        conditional,
    }
}

/// Wrap an inlined sheet in the rules its `@import` condition stands for:
/// `layer` innermost, then `supports()`, then the media query.
pub fn wrap_conditional(body: &str, condition: &str) -> String {
    let mut rest = condition.trim();

    let mut layer = None;
    if let Some(after) = rest.strip_prefix("layer(") {
        let (name, tail) = split_group(after);
        layer = Some(format!("@layer {}", name.trim()));
        rest = tail.trim_start();
    } else if rest == "layer" || rest.starts_with("layer ") {
        layer = Some("@layer".to_string());
        rest = rest["layer".len()..].trim_start();
    }

    let mut supports = None;
    if let Some(after) = rest.strip_prefix("supports(") {
        let (inner, tail) = split_group(after);
        supports = Some(format!("@supports {}", supports_condition(inner.trim())));
        rest = tail.trim_start();
    }

    let media = (!rest.is_empty()).then(|| format!("@media {rest}"));

    let mut css = body.trim().to_string();
    for rule in [layer, supports, media].into_iter().flatten() {
        css = format!("{rule} {{\n{css}\n}}");
    }
    css
}

/// Split text following an opening paren at its matching close.
fn split_group(text: &str) -> (&str, &str) {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return (&text[..i], &text[i + 1..]),
            ')' => depth -= 1,
            _ => {}
        }
    }
    (text, "")
}

/// `supports(display: grid)` holds a bare declaration; `@supports` needs it
/// in parentheses.
fn supports_condition(inner: &str) -> String {
    if inner.starts_with('(') || inner.starts_with("not ") || inner.starts_with("selector(") {
        inner.to_string()
    } else {
        format!("({inner})")
    }
}

fn specifier<'t>(caps: &Captures<'t>) -> &'t str {
    caps.name("d")
        .or_else(|| caps.name("s"))
        .or_else(|| caps.name("u"))
        .map_or("", |m| m.as_str())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Pad `replacement` with the newlines it swallowed so later lines keep
/// their numbers.
fn keep_lines(mut replacement: String, original: &str) -> String {
    let lost = original
        .matches('\n')
        .count()
        .saturating_sub(replacement.matches('\n').count());
    replacement.push_str(&"\n".repeat(lost));
    replacement
}
