//! Content hashes and output file-name templates.

/// Hex blake3 digest of `bytes`, truncated to `len` characters.
pub fn content_hash(bytes: &[u8], len: usize) -> String {
    truncate(blake3::hash(bytes).to_hex().as_str(), len)
}

/// Digest over several parts, each length-prefixed so that `["ab", "c"]`
/// and `["a", "bc"]` differ.
pub fn combined_hash<'a>(parts: impl IntoIterator<Item = &'a [u8]>, len: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    truncate(hasher.finalize().to_hex().as_str(), len)
}

fn truncate(hex: &str, len: usize) -> String {
    hex[..len.min(hex.len())].to_string()
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateParts<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    /// Source directory relative to the context, with a trailing `/` unless
    /// empty.
    pub path: &'a str,
    pub hash: &'a str,
}

/// Expand `[name]`, `[ext]`, `[path]` and `[hash]`.
pub fn render_template(template: &str, parts: TemplateParts<'_>) -> String {
    template
        .replace("[name]", parts.name)
        .replace("[ext]", parts.ext)
        .replace("[path]", parts.path)
        .replace("[hash]", parts.hash)
}

/// `[path]` value for a context-relative source path.
pub fn template_dir(rel: &str) -> String {
    match rel.rfind('/') {
        Some(pos) => format!("{}/", &rel[..pos]),
        None => String::new(),
    }
}
