use super::ui::{self, OutputFormat};
use crate::core::LivePriceSnapshot;
use crate::service::StockService;
use anyhow::Result;
use comfy_table::Cell;

pub fn render_live(quote: &LivePriceSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Field"),
        ui::header_cell(&quote.currency),
        ui::header_cell(&quote.converted_currency),
    ]);
    for (label, value, converted) in [
        ("Price", quote.price, quote.price_converted),
        ("Open", quote.open, quote.open_converted),
        ("High", quote.high, quote.high_converted),
        ("Low", quote.low, quote.low_converted),
        (
            "Previous close",
            quote.previous_close,
            quote.previous_close_converted,
        ),
    ] {
        table.add_row(vec![
            Cell::new(label),
            ui::price_cell(value),
            ui::price_cell(converted),
        ]);
    }
    table.add_row(vec![
        Cell::new("Change"),
        ui::price_cell(quote.change),
        ui::price_cell(quote.price_converted - quote.previous_close_converted),
    ]);
    table.add_row(vec![
        Cell::new("Change %"),
        ui::change_cell(quote.change_percent),
        ui::change_cell(quote.change_percent),
    ]);
    table.add_row(vec![
        Cell::new("Volume"),
        ui::volume_cell(quote.volume),
        Cell::new(""),
    ]);

    let title = format!("{} ({})", quote.name, quote.symbol);
    let stamp = format!("As of {}", quote.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    format!(
        "{}\n{}\n\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        ui::style_text(&stamp, ui::StyleType::Subtle),
        table
    )
}

pub async fn run(service: &StockService, symbol: &str, format: OutputFormat) -> Result<()> {
    let quote = service.get_live_price(symbol).await?;
    match format {
        OutputFormat::Json => ui::print_json(&quote),
        OutputFormat::Table => {
            println!("{}", render_live(&quote));
            Ok(())
        }
    }
}
