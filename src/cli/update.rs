use super::ui;
use crate::core::engine::RateEngine;
use crate::core::updater::UpdateSummary;
use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::info;

impl UpdateSummary {
    pub fn display(&self) -> String {
        let mut output = format!(
            "Updated {} pair(s), {} new history record(s). Last refresh: {}",
            ui::style_text(&self.updated_count.to_string(), ui::StyleType::Value),
            ui::style_text(&self.history_added.to_string(), ui::StyleType::Value),
            ui::format_stored_timestamp(&self.last_refresh)
        );
        for error in &self.errors {
            output.push('\n');
            output.push_str(&ui::style_text(error, ui::StyleType::Error));
        }
        output
    }
}

/// Refreshes the cache from all sources, or the one matching `source`.
///
/// Fails when every selected source failed.
pub async fn update_rates(engine: &RateEngine, source: Option<&str>) -> Result<()> {
    let pb = ui::new_spinner("Fetching latest rates...");
    let result = engine.run_update(source).await;
    pb.finish_and_clear();

    let summary = result?;
    println!("{}", summary.display());
    if !summary.is_success() {
        bail!("Update failed: no source returned rates");
    }
    Ok(())
}

/// Runs periodic updates until Ctrl+C. An update in flight completes first.
pub async fn schedule(engine: &RateEngine, interval: Duration) -> Result<()> {
    let scheduler = engine.scheduler();
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Updating rates every {}s. Press Ctrl+C to stop.",
                interval.as_secs()
            ),
            ui::StyleType::Subtle
        )
    );

    let run = scheduler.run_forever(interval);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => return result.map_err(Into::into),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C");
        }
    }

    scheduler.stop();
    run.await?;
    println!("{}", ui::style_text("Scheduler stopped", ui::StyleType::Subtle));
    Ok(())
}
