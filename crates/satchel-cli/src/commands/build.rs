//! `satchel build`.

use satchel_bundler::Bundler;
use satchel_config::DevOverrides;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// 1. Load configuration (flags > env > file > defaults) and validate it
/// 2. Compile the rule table
/// 3. Run the build; Ctrl+C cancels it and leaves the output untouched
/// 4. Print warnings and the summary
pub async fn execute(args: BuildArgs) -> Result<()> {
    let loader = utils::config_loader(&args.project, DevOverrides::default())?;
    let config = loader.resolve()?;

    ui::info(&format!(
        "Building {} ({} mode)",
        config.root.display(),
        config.mode
    ));
    debug!("resolved configuration: {:?}", config);

    let bundler = Bundler::new(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::warning("Interrupted, cancelling build...");
            on_interrupt.cancel();
        }
    });

    let result = bundler.build(cancel).await;
    interrupt.abort();
    let report = result?;

    for warning in &report.warnings {
        ui::warning(warning);
    }
    ui::print_build_summary(&report);
    ui::success(&format!(
        "Wrote {} to {}",
        ui::format_size(report.total_size() as u64),
        bundler.config().output.dir.display()
    ));

    Ok(())
}
