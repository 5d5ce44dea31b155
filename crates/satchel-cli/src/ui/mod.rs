//! Terminal output: status lines and the build summary.
//!
//! Everything goes to stderr so stdout stays free for piping.
//!
//! ```no_run
//! use satchel_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Build complete");
//! ui::warning("webp skipped for img/logo.png");
//! ```

mod format;
mod messages;

pub use format::{SummaryRow, format_duration, format_size, print_build_summary, summary_rows};
pub use messages::{error, info, success, warning};

/// Whether running under a CI service.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Whether color should be used on stderr.
///
/// Respects `NO_COLOR` and `FORCE_COLOR`, then falls back to terminal
/// detection.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision globally. `--no-color` always wins.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    owo_colors::set_override(enabled);
    console::set_colors_enabled_stderr(enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_no_color_env() {
        unsafe { std::env::set_var("NO_COLOR", "1") };
        assert!(!should_use_color());
        unsafe { std::env::remove_var("NO_COLOR") };
    }

    #[test]
    #[serial]
    fn test_is_ci() {
        unsafe { std::env::set_var("CI", "true") };
        assert!(is_ci());
        unsafe { std::env::remove_var("CI") };
    }
}
