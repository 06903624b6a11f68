use super::ui;
use crate::core::engine::RateEngine;
use crate::core::registry::CurrencyRegistry;
use anyhow::Result;
use comfy_table::Cell;

pub fn render_currencies(registry: &CurrencyRegistry) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Type"),
        ui::header_cell("Name"),
        ui::header_cell("Source id"),
    ]);
    for currency in registry.iter() {
        table.add_row(vec![
            Cell::new(&currency.code),
            Cell::new(currency.kind.to_string()),
            Cell::new(&currency.name),
            Cell::new(currency.source_id.as_deref().unwrap_or("-")),
        ]);
    }
    format!(
        "{}\n\n{}\n\n{}",
        ui::style_text("Supported currencies", ui::StyleType::Title),
        table,
        ui::style_text(
            &format!("{} configured", registry.len()),
            ui::StyleType::Subtle
        )
    )
}

pub fn show_currencies(engine: &RateEngine) -> Result<()> {
    println!("{}", render_currencies(engine.currencies()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    #[test]
    fn test_render_currencies() {
        let registry = CurrencyRegistry::from_config(&AppConfig::default());
        let output = render_currencies(&registry);
        let output = console::strip_ansi_codes(&output);
        assert!(output.contains("Bitcoin"));
        assert!(output.contains("bitcoin"));
        assert!(output.contains("US Dollar"));
        assert!(output.contains("CRYPTO"));
        assert!(output.contains("7 configured"));
    }
}
