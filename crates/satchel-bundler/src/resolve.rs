//! Specifier resolution: aliases, relative paths and extension probing.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use satchel_config::ResolvedConfig;

use crate::{Error, Result};

/// Which syntax a specifier was written in.
///
/// Scripts treat anything that is not relative or aliased as a package
/// import. Stylesheets treat plain `url(img/a.png)` as relative and use a
/// leading `~` to opt into alias / package lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Script,
    Style,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local(PathBuf),
    External,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    aliases: Vec<(String, PathBuf)>,
    extensions: Vec<String>,
}

impl Resolver {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            aliases: config.aliases.clone(),
            extensions: config.extensions.clone(),
        }
    }

    pub fn with_parts(aliases: Vec<(String, PathBuf)>, extensions: Vec<String>) -> Self {
        Self {
            aliases,
            extensions,
        }
    }

    /// Resolve `specifier` as written in `importer`.
    pub fn resolve(&self, specifier: &str, importer: &Path, dialect: Dialect) -> Result<Resolution> {
        let request = strip_suffix(specifier.trim());
        if is_external_url(request) {
            return Ok(Resolution::External);
        }

        let (request, tilde) = match request.strip_prefix('~') {
            Some(rest) => (rest, true),
            None => (request, false),
        };

        let candidate = if let Some(path) = self.apply_alias(request) {
            path
        } else if request.starts_with("./") || request.starts_with("../") {
            relative_to(importer, request)
        } else if dialect == Dialect::Style && !tilde {
            relative_to(importer, request)
        } else {
            return Ok(Resolution::External);
        };

        self.probe(&candidate)
            .map(Resolution::Local)
            .ok_or_else(|| Error::UnresolvedReference {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            })
    }

    fn apply_alias(&self, request: &str) -> Option<PathBuf> {
        self.aliases.iter().find_map(|(prefix, dir)| {
            let rest = request.strip_prefix(prefix.as_str())?;
            if rest.is_empty() {
                Some(dir.clone())
            } else {
                rest.strip_prefix('/').map(|rest| dir.join(rest).clean())
            }
        })
    }

    /// Find the file a candidate path refers to.
    pub fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate.to_path_buf());
        }

        let base = candidate.as_os_str().to_string_lossy();
        for ext in &self.extensions {
            let with_ext = PathBuf::from(format!("{base}{ext}"));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if candidate.is_dir() {
            for ext in &self.extensions {
                let index = candidate.join(format!("index{ext}"));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }
}

/// Drop a `?query` or `#fragment` from a specifier.
pub fn strip_suffix(specifier: &str) -> &str {
    match specifier.find(['?', '#']) {
        Some(0) => specifier,
        Some(pos) => &specifier[..pos],
        None => specifier,
    }
}

/// The `?query#fragment` tail of a specifier, if any.
pub fn suffix_of(specifier: &str) -> &str {
    let path = strip_suffix(specifier);
    &specifier[path.len()..]
}

/// URLs that are never files on disk.
pub fn is_external_url(specifier: &str) -> bool {
    specifier.is_empty()
        || specifier.starts_with('#')
        || specifier.starts_with('/')
        || specifier.starts_with("data:")
        || specifier.starts_with("http:")
        || specifier.starts_with("https:")
        || specifier.starts_with("blob:")
        || specifier.starts_with("mailto:")
}

fn relative_to(importer: &Path, request: &str) -> PathBuf {
    importer
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(request)
        .clean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        for file in [
            "js/index.js",
            "js/util.js",
            "js/lib/index.js",
            "img/logo.png",
            "fonts/a.woff",
            "data.json",
        ] {
            let path = src.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        let resolver = Resolver::with_parts(
            vec![
                ("@img".to_string(), src.join("img")),
                ("@".to_string(), src.clone()),
            ],
            vec![".js".to_string(), ".json".to_string()],
        );
        (dir, resolver)
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/js/index.js");
        let resolved = resolver.resolve("./util", &importer, Dialect::Script).unwrap();
        assert_eq!(resolved, Resolution::Local(dir.path().join("src/js/util.js")));
    }

    #[test]
    fn test_directory_index() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/js/index.js");
        let resolved = resolver.resolve("./lib", &importer, Dialect::Script).unwrap();
        assert_eq!(
            resolved,
            Resolution::Local(dir.path().join("src/js/lib/index.js"))
        );
    }

    #[test]
    fn test_alias_longest_prefix_and_boundary() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/js/index.js");

        let logo = resolver
            .resolve("@img/logo.png", &importer, Dialect::Script)
            .unwrap();
        assert_eq!(logo, Resolution::Local(dir.path().join("src/img/logo.png")));

        let data = resolver.resolve("@/data", &importer, Dialect::Script).unwrap();
        assert_eq!(data, Resolution::Local(dir.path().join("src/data.json")));

        // scoped packages are not the "@" alias
        let pkg = resolver
            .resolve("@babel/polyfill", &importer, Dialect::Script)
            .unwrap();
        assert_eq!(pkg, Resolution::External);
    }

    #[test]
    fn test_style_urls_are_relative_by_default() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/main.css");

        let font = resolver
            .resolve("fonts/a.woff?v=2#iefix", &importer, Dialect::Style)
            .unwrap();
        assert_eq!(font, Resolution::Local(dir.path().join("src/fonts/a.woff")));

        let aliased = resolver
            .resolve("~@img/logo.png", &importer, Dialect::Style)
            .unwrap();
        assert_eq!(aliased, Resolution::Local(dir.path().join("src/img/logo.png")));

        let package = resolver
            .resolve("~normalize.css", &importer, Dialect::Style)
            .unwrap();
        assert_eq!(package, Resolution::External);
    }

    #[test]
    fn test_external_urls() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/main.css");
        for url in ["data:image/png;base64,AAAA", "https://x/y.png", "/static/a.png", "#frag"] {
            assert_eq!(
                resolver.resolve(url, &importer, Dialect::Style).unwrap(),
                Resolution::External,
                "{url}"
            );
        }
    }

    #[test]
    fn test_missing_local_file() {
        let (dir, resolver) = fixture();
        let importer = dir.path().join("src/js/index.js");
        let err = resolver
            .resolve("./missing", &importer, Dialect::Script)
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { ref specifier, .. } if specifier == "./missing"));
    }

    #[test]
    fn test_suffix_helpers() {
        assert_eq!(strip_suffix("a.woff?v=1#x"), "a.woff");
        assert_eq!(suffix_of("a.woff?v=1#x"), "?v=1#x");
        assert_eq!(suffix_of("a.woff"), "");
    }
}
