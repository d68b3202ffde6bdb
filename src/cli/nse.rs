use super::search::render_entries;
use super::ui::{self, OutputFormat};
use crate::core::{CatalogEntry, LivePriceSnapshot};
use crate::service::StockService;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotedEntry {
    #[serde(flatten)]
    entry: CatalogEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote: Option<LivePriceSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn fetch_quotes(service: &StockService, entries: Vec<CatalogEntry>) -> Vec<QuotedEntry> {
    let pb = ui::new_progress_bar(entries.len() as u64);
    let futures = entries.into_iter().map(|entry| {
        let pb = pb.clone();
        async move {
            let result = service.get_live_price(&entry.symbol).await;
            pb.inc(1);
            match result {
                Ok(quote) => QuotedEntry {
                    entry,
                    quote: Some(quote),
                    error: None,
                },
                Err(e) => QuotedEntry {
                    entry,
                    quote: None,
                    error: Some(e.to_string()),
                },
            }
        }
    });
    let quoted = join_all(futures).await;
    pb.finish_and_clear();
    quoted
}

fn render_quotes(rows: &[QuotedEntry]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
    ]);

    let mut errors = Vec::new();
    for row in rows {
        let mut cells = vec![Cell::new(&row.entry.symbol), Cell::new(&row.entry.name)];
        match &row.quote {
            Some(q) => {
                cells.push(ui::price_cell(q.price_converted));
                cells.push(ui::change_cell(q.change_percent));
            }
            None => {
                cells.push(ui::na_cell(row.error.is_some()));
                cells.push(ui::na_cell(row.error.is_some()));
            }
        }
        table.add_row(cells);
        if let Some(e) = &row.error {
            errors.push(format!("{}: {}", row.entry.symbol, e));
        }
    }

    let mut output = format!(
        "{}\n\n{}",
        ui::style_text("NSE stocks", ui::StyleType::Title),
        table
    );
    for e in errors {
        output.push('\n');
        output.push_str(&ui::style_text(&e, ui::StyleType::Error));
    }
    output
}

pub async fn run(service: &StockService, with_prices: bool, format: OutputFormat) -> Result<()> {
    let entries = service.get_nse_stocks();

    if !with_prices {
        return match format {
            OutputFormat::Json => ui::print_json(&entries),
            OutputFormat::Table => {
                println!("{}", render_entries("NSE stocks", &entries));
                Ok(())
            }
        };
    }

    let rows = fetch_quotes(service, entries).await;
    match format {
        OutputFormat::Json => ui::print_json(&rows),
        OutputFormat::Table => {
            println!("{}", render_quotes(&rows));
            Ok(())
        }
    }
}
