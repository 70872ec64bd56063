use rust_xlsxwriter::Workbook;

use crate::analytics::opportunity::OpportunityRecord;
use crate::error::AppError;
use crate::export::{create_header_format, create_number_format};

const HEADERS: [&str; 10] = [
    "Customer",
    "Country",
    "Product",
    "Score",
    "Units (norm)",
    "Usage (norm)",
    "GDP (norm)",
    "Momentum",
    "Lifecycle",
    "Sales Boost",
];

/// Classement des opportunités au format CSV, composantes incluses.
pub fn opportunities_to_csv(records: &[OpportunityRecord]) -> Result<String, AppError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(HEADERS)?;
    for r in records {
        wtr.write_record([
            r.customer.clone(),
            r.country.clone(),
            r.product.clone(),
            format!("{:.4}", r.score),
            format!("{:.4}", r.components.units_norm),
            format!("{:.4}", r.components.usage_norm),
            format!("{:.4}", r.components.gdp_norm),
            format!("{:.4}", r.components.momentum),
            format!("{:.4}", r.components.lifecycle_score),
            format!("{:.4}", r.components.sales_boost),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Custom(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Custom(e.to_string()))
}

/// Génère le rapport XLSX du classement des opportunités.
pub fn generate_opportunity_report(records: &[OpportunityRecord]) -> Result<Vec<u8>, AppError> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Opportunités")?;

    let hdr = create_header_format();
    let num = create_number_format();

    for (col, h) in HEADERS.iter().enumerate() {
        ws.write_with_format(0, col as u16, *h, &hdr)?;
    }

    for (i, r) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write(row, 0, r.customer.as_str())?;
        ws.write(row, 1, r.country.as_str())?;
        ws.write(row, 2, r.product.as_str())?;
        ws.write_with_format(row, 3, r.score, &num)?;
        ws.write_with_format(row, 4, r.components.units_norm, &num)?;
        ws.write_with_format(row, 5, r.components.usage_norm, &num)?;
        ws.write_with_format(row, 6, r.components.gdp_norm, &num)?;
        ws.write_with_format(row, 7, r.components.momentum, &num)?;
        ws.write_with_format(row, 8, r.components.lifecycle_score, &num)?;
        ws.write_with_format(row, 9, r.components.sales_boost, &num)?;
    }

    if !records.is_empty() {
        let last_row = records.len() as u32;
        ws.set_freeze_panes(1, 0)?;
        ws.autofilter(0, 0, last_row, (HEADERS.len() - 1) as u16)?;
    }

    ws.set_column_width(0, 24)?;
    ws.set_column_width(1, 16)?;
    ws.set_column_width(2, 14)?;
    for col in 3u16..=9 {
        ws.set_column_width(col, 12)?;
    }

    Ok(wb.save_to_buffer()?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
