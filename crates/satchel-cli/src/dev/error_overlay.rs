//! Error overlay shown in the browser while the build is broken.
//!
//! The page listens on the reload channel like any other page, so it goes
//! away as soon as the next build succeeds.

use satchel_bundler::assemble::html::html_escape;

use crate::dev::server::RELOAD_SCRIPT_PATH;

/// Render the overlay page for a build error. The message is escaped.
pub fn generate_error_overlay(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Build failed</title>
  <style>
    body {{ margin: 0; background: #1e1e1e; color: #e8e8e8; font: 14px/1.5 ui-monospace, Menlo, Consolas, monospace; }}
    main {{ max-width: 960px; margin: 48px auto; padding: 0 24px; }}
    h1 {{ color: #ff6b6b; font-size: 20px; }}
    pre {{ background: #2a1215; border-left: 4px solid #ff6b6b; padding: 16px; white-space: pre-wrap; word-break: break-word; }}
    p {{ color: #9a9a9a; }}
  </style>
</head>
<body>
  <main>
    <h1>Build failed</h1>
    <pre>{}</pre>
    <p>Fix the error and save; this page reloads when the next build succeeds.</p>
  </main>
  <script src="{}"></script>
</body>
</html>
"#,
        html_escape(error),
        RELOAD_SCRIPT_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_escapes_message() {
        let html = generate_error_overlay("<script>alert('x')</script> & more");
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp; more"));
    }

    #[test]
    fn test_overlay_loads_reload_client() {
        let html = generate_error_overlay("boom");
        assert!(html.contains(r#"<script src="/__satchel_reload__.js"></script>"#));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
