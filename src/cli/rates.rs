use super::ui;
use crate::core::currency::normalize_currency_code;
use crate::core::engine::{Conversion, RateEngine};
use crate::core::rates::RatesCache;
use crate::core::resolver::ResolvedRate;
use anyhow::{Result, bail};
use comfy_table::Cell;

impl ResolvedRate {
    pub fn display(&self) -> String {
        let (from, to) = (self.pair.from_code(), self.pair.to_code());
        format!(
            "Rate {from} → {to}: {}\nInverse {to} → {from}: {}\n{}",
            ui::style_text(&ui::format_rate(self.rate), ui::StyleType::Success),
            ui::format_rate(self.inverse_rate()),
            ui::style_text(
                &format!(
                    "Updated {} (source: {}, {})",
                    ui::format_datetime(self.updated_at),
                    self.source,
                    self.origin
                ),
                ui::StyleType::Subtle
            )
        )
    }
}

impl Conversion {
    pub fn display(&self) -> String {
        let (from, to) = (self.rate.pair.from_code(), self.rate.pair.to_code());
        format!(
            "{:.2} {from} = {} {to}\n{}",
            self.amount,
            ui::style_text(&format!("{:.4}", self.converted), ui::StyleType::Success),
            ui::style_text(
                &format!(
                    "Rate {} as of {} (source: {})",
                    ui::format_rate(self.rate.rate),
                    ui::format_datetime(self.rate.updated_at),
                    self.rate.source
                ),
                ui::StyleType::Subtle
            )
        )
    }
}

pub async fn get_rate(engine: &RateEngine, from: &str, to: &str) -> Result<()> {
    let resolved = engine.resolve(from, to, engine.ttl_seconds()).await?;
    println!("{}", resolved.display());
    Ok(())
}

pub async fn convert(engine: &RateEngine, amount: f64, from: &str, to: &str) -> Result<()> {
    let conversion = engine.convert(amount, from, to).await?;
    println!("{}", conversion.display());
    Ok(())
}

/// Filters for listing the cached pairs.
#[derive(Debug, Default, Clone)]
pub struct RatesFilter {
    pub currency: Option<String>,
    pub base: Option<String>,
    pub top: Option<usize>,
}

/// Renders the cached pairs matching `filter`. Errors when the cache is empty
/// or nothing matches.
pub fn render_rates(cache: &RatesCache, filter: &RatesFilter) -> Result<String> {
    if cache.is_empty() {
        bail!("Local rates cache is empty. Run 'update-rates' to fetch rates.");
    }
    let currency = filter
        .currency
        .as_deref()
        .map(normalize_currency_code)
        .transpose()?;
    let base = filter
        .base
        .as_deref()
        .map(normalize_currency_code)
        .transpose()?;

    let rows = cache.select(currency.as_deref(), base.as_deref(), filter.top);
    if rows.is_empty() {
        let mut wanted = Vec::new();
        if let Some(currency) = &currency {
            wanted.push(format!("currency {currency}"));
        }
        if let Some(base) = &base {
            wanted.push(format!("base {base}"));
        }
        bail!("No cached rates for {}", wanted.join(" and "));
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Updated"),
        ui::header_cell("Source"),
    ]);
    for (pair, entry) in &rows {
        table.add_row(vec![
            Cell::new(format!("{} → {}", pair.from_code(), pair.to_code())),
            ui::rate_cell(entry.rate),
            Cell::new(ui::format_stored_timestamp(&entry.updated_at)),
            Cell::new(&entry.source),
        ]);
    }

    let last_refresh = cache
        .last_refresh
        .as_deref()
        .map_or_else(|| "never".to_string(), ui::format_stored_timestamp);
    Ok(format!(
        "{}\n\n{}\n\n{}",
        ui::style_text("Cached rates", ui::StyleType::Title),
        table,
        ui::style_text(
            &format!("{} pair(s), last refresh: {last_refresh}", rows.len()),
            ui::StyleType::Subtle
        )
    ))
}

pub fn show_rates(engine: &RateEngine, filter: &RatesFilter) -> Result<()> {
    println!("{}", render_rates(&engine.read_cache(), filter)?);
    Ok(())
}
