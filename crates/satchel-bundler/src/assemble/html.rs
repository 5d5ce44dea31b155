//! The HTML page that loads every entry.

use std::sync::LazyLock;

use regex::Regex;

static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<textarea\b.*?</textarea>|<script\b.*?</script>|<style\b.*?</style>")
        .expect("valid regex")
});
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Shell used when the project has no template.
pub fn default_template(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{}</title>
</head>
<body>
  <div id="root"></div>
</body>
</html>
"#,
        html_escape(title)
    )
}

/// Link `styles` before `</head>` and load `scripts` as modules before
/// `</body>`.
pub fn inject_assets(template: &str, styles: &[String], scripts: &[String]) -> String {
    let links: String = styles
        .iter()
        .map(|href| format!("  <link rel=\"stylesheet\" href=\"{}\">\n", html_escape(href)))
        .collect();
    let tags: String = scripts
        .iter()
        .map(|src| format!("  <script type=\"module\" src=\"{}\"></script>\n", html_escape(src)))
        .collect();

    let mut html = template.to_string();
    if !links.is_empty() {
        html = insert_before(&html, "</head>", &links, true);
    }
    if !tags.is_empty() {
        html = insert_before(&html, "</body>", &tags, false);
    }
    html
}

fn insert_before(html: &str, marker: &str, content: &str, at_start_when_missing: bool) -> String {
    let position = find_ignore_case(html, marker);
    let mut result = String::with_capacity(html.len() + content.len());
    match position {
        Some(pos) => {
            result.push_str(&html[..pos]);
            result.push_str(content);
            result.push_str(&html[pos..]);
        }
        None if at_start_when_missing => {
            result.push_str(content);
            result.push_str(html);
        }
        None => {
            result.push_str(html);
            result.push('\n');
            result.push_str(content);
        }
    }
    result
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().rfind(&needle.to_ascii_lowercase())
}

/// Collapse insignificant whitespace, leaving `<pre>`, `<textarea>`,
/// `<script>` and `<style>` blocks as written.
pub fn collapse_whitespace(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut last = 0;
    for block in PROTECTED.find_iter(html) {
        let segment = collapse_segment(&html[last..block.start()], last > 0);
        // the block opens with a tag, so whitespace before it sits between tags
        if segment.trim_end().ends_with('>') {
            result.push_str(segment.trim_end());
        } else {
            result.push_str(&segment);
        }
        result.push_str(block.as_str());
        last = block.end();
    }
    result.push_str(&collapse_segment(&html[last..], last > 0));
    result.trim().to_string()
}

fn collapse_segment(segment: &str, after_block: bool) -> String {
    let collapsed = BETWEEN_TAGS.replace_all(segment, "><");
    let collapsed = WHITESPACE.replace_all(&collapsed, " ");
    if after_block && collapsed.trim_start().starts_with('<') {
        collapsed.trim_start().to_string()
    } else {
        collapsed.into_owned()
    }
}

pub fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_assets() {
        let html = inject_assets(
            &default_template("Demo"),
            &["/main.1234.css".to_string()],
            &["/main.abcd.js".to_string()],
        );

        let link = html.find("<link rel=\"stylesheet\" href=\"/main.1234.css\">").unwrap();
        let head_end = html.find("</head>").unwrap();
        let script = html
            .find("<script type=\"module\" src=\"/main.abcd.js\"></script>")
            .unwrap();
        let body_end = html.find("</body>").unwrap();
        assert!(link < head_end);
        assert!(head_end < script && script < body_end);
        assert!(html.contains("<title>Demo</title>"));
    }

    #[test]
    fn test_inject_without_markers() {
        let html = inject_assets("<p>hi</p>", &["/a.css".to_string()], &["/a.js".to_string()]);
        assert!(html.starts_with("  <link"));
        assert!(html.trim_end().ends_with("</script>"));
    }

    #[test]
    fn test_collapse_whitespace_keeps_pre() {
        let html = "<html>\n  <body>\n    <p>a   b</p>\n    <pre>  keep\n  this</pre>\n  </body>\n</html>\n";
        assert_eq!(
            collapse_whitespace(html),
            "<html><body><p>a b</p><pre>  keep\n  this</pre></body></html>"
        );
    }

    #[test]
    fn test_title_is_escaped() {
        assert!(default_template("<x>").contains("<title>&lt;x&gt;</title>"));
    }
}
