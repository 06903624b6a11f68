use super::ui;
use crate::core::currency::normalize_currency_code;
use crate::core::engine::RateEngine;
use crate::core::rates::HistoryRecord;
use anyhow::Result;
use comfy_table::Cell;

#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: usize,
}

/// The newest `limit` records matching the filter, newest first.
pub fn select_history<'a>(
    records: &'a [HistoryRecord],
    filter: &HistoryFilter,
) -> Result<Vec<&'a HistoryRecord>> {
    let from = filter
        .from
        .as_deref()
        .map(normalize_currency_code)
        .transpose()?;
    let to = filter
        .to
        .as_deref()
        .map(normalize_currency_code)
        .transpose()?;

    Ok(records
        .iter()
        .rev()
        .filter(|r| from.as_deref().is_none_or(|c| r.from_currency == c))
        .filter(|r| to.as_deref().is_none_or(|c| r.to_currency == c))
        .take(filter.limit)
        .collect())
}

pub fn render_history(records: &[&HistoryRecord]) -> String {
    if records.is_empty() {
        return ui::style_text("No history records found", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Timestamp"),
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(ui::format_stored_timestamp(&record.timestamp)),
            Cell::new(format!("{} → {}", record.from_currency, record.to_currency)),
            ui::rate_cell(record.rate),
            Cell::new(&record.source),
        ]);
    }
    format!(
        "{}\n\n{}",
        ui::style_text("Rate history", ui::StyleType::Title),
        table
    )
}

pub fn show_history(engine: &RateEngine, filter: &HistoryFilter) -> Result<()> {
    let records = engine.read_history();
    let selected = select_history(&records, filter)?;
    println!("{}", render_history(&selected));
    Ok(())
}
