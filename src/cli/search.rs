use super::ui::{self, OutputFormat};
use crate::core::CatalogEntry;
use crate::service::StockService;
use anyhow::Result;
use comfy_table::Cell;

/// Renders catalog entries as a titled table.
pub fn render_entries(title: &str, entries: &[CatalogEntry]) -> String {
    if entries.is_empty() {
        return ui::style_text("No matching stocks found.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Exchange"),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.symbol),
            Cell::new(&entry.name),
            Cell::new(&entry.exchange),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text(title, ui::StyleType::Title),
        table
    )
}

pub async fn run(service: &StockService, query: &str, format: OutputFormat) -> Result<()> {
    let results = service.search_stocks(query).await;
    match format {
        OutputFormat::Json => ui::print_json(&results),
        OutputFormat::Table => {
            println!("{}", render_entries(&format!("Results for \"{query}\""), &results));
            Ok(())
        }
    }
}
