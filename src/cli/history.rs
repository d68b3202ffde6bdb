use super::ui::{self, OutputFormat};
use crate::core::{Period, StockSnapshot};
use crate::service::StockService;
use anyhow::Result;
use comfy_table::Cell;

/// Most recent bars shown in the table view. JSON output carries the full history.
const TABLE_ROWS: usize = 10;

fn render_summary(snapshot: &StockSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Field"),
        ui::header_cell(&snapshot.currency),
        ui::header_cell(&snapshot.converted_currency),
    ]);
    table.add_row(vec![
        Cell::new("Price"),
        ui::price_cell(snapshot.current_price),
        ui::price_cell(snapshot.current_price_converted),
    ]);
    table.add_row(vec![
        Cell::new("Previous close"),
        ui::price_cell(snapshot.previous_close),
        ui::price_cell(snapshot.previous_close_converted),
    ]);
    table.add_row(vec![
        Cell::new("52w high"),
        ui::price_cell(snapshot.fifty_two_week_high),
        ui::price_cell(snapshot.fifty_two_week_high_converted),
    ]);
    table.add_row(vec![
        Cell::new("52w low"),
        ui::price_cell(snapshot.fifty_two_week_low),
        ui::price_cell(snapshot.fifty_two_week_low_converted),
    ]);
    table.add_row(vec![
        Cell::new("Change"),
        ui::price_cell(snapshot.change),
        ui::price_cell(snapshot.current_price_converted - snapshot.previous_close_converted),
    ]);
    table.add_row(vec![
        Cell::new("Change %"),
        ui::change_cell(snapshot.change_percent),
        ui::change_cell(snapshot.change_percent),
    ]);
    table.to_string()
}

fn render_history(snapshot: &StockSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Volume"),
    ]);

    let skip = snapshot.history.len().saturating_sub(TABLE_ROWS);
    for point in snapshot.history.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(&point.date),
            ui::price_cell(point.open),
            ui::price_cell(point.high),
            ui::price_cell(point.low),
            ui::price_cell(point.close),
            ui::volume_cell(point.volume),
        ]);
    }
    table.to_string()
}

pub fn render_snapshot(snapshot: &StockSnapshot, period: Period) -> String {
    let title = format!(
        "{} ({}) on {}",
        snapshot.name, snapshot.symbol, snapshot.exchange
    );
    let cap = if snapshot.market_cap > 0 {
        format!("Market cap: {}", ui::group_thousands(snapshot.market_cap))
    } else {
        "Market cap: N/A".to_string()
    };

    format!(
        "{}\n{}\n\n{}\n\n{}\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        ui::style_text(&cap, ui::StyleType::Subtle),
        render_summary(snapshot),
        ui::style_text(&format!("History ({period})"), ui::StyleType::Label),
        render_history(snapshot)
    )
}

pub async fn run(
    service: &StockService,
    symbol: &str,
    period: Period,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = service.get_stock_data(symbol, period).await?;
    match format {
        OutputFormat::Json => ui::print_json(&snapshot),
        OutputFormat::Table => {
            println!("{}", render_snapshot(&snapshot, period));
            Ok(())
        }
    }
}
