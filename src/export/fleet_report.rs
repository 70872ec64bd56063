use rust_xlsxwriter::Workbook;

use crate::analyzer::fleet::AugmentedRecord;
use crate::error::AppError;
use crate::export::{
    create_header_format, create_integer_format, create_number_format, create_percent_format,
};

const HEADERS: [&str; 14] = [
    "Equipment ID",
    "Location",
    "Usage Hours",
    "Service History",
    "Needs Maintenance",
    "Entitled Usage",
    "Entitlement Method",
    "Utilization %",
    "Utilization Flag",
    "Anomaly",
    "Churn Risk",
    "Forecasted Annual Usage",
    "Annual Revenue",
    "Total Forecast Revenue",
];

fn method_label(row: &AugmentedRecord) -> &'static str {
    match row.entitlement_method {
        crate::config::EntitlementMethod::Survival => "Survival",
        crate::config::EntitlementMethod::PeerBenchmark => "PeerBenchmark",
    }
}

fn anomaly_label(row: &AugmentedRecord) -> &'static str {
    match row.anomaly_flag {
        Some(flag) => flag.as_str(),
        None => "",
    }
}

fn churn_label(row: &AugmentedRecord) -> String {
    match row.churn_label {
        Some(l) => l.to_string(),
        None => String::new(),
    }
}

/// Table augmentée au format CSV, en-têtes incluses.
pub fn fleet_to_csv(rows: &[AugmentedRecord]) -> Result<String, AppError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.write_record([
            row.equipment_id.clone(),
            row.location.clone(),
            row.usage_hours.to_string(),
            row.service_history.clone(),
            row.needs_maintenance.to_string(),
            format!("{:.2}", row.entitled_hours),
            method_label(row).to_string(),
            format!("{:.2}", row.utilization_pct),
            row.utilization_flag.as_str().to_string(),
            anomaly_label(row).to_string(),
            churn_label(row),
            format!("{:.2}", row.forecasted_annual_usage),
            format!("{:.2}", row.annual_revenue),
            format!("{:.2}", row.total_forecast_revenue),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Custom(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Custom(e.to_string()))
}

/// Génère le rapport XLSX de la table augmentée.
/// Retourne les bytes via workbook.save_to_buffer().
pub fn generate_fleet_report(rows: &[AugmentedRecord]) -> Result<Vec<u8>, AppError> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Parc installé")?;

    let hdr = create_header_format();
    let num = create_number_format();
    let int = create_integer_format();
    let pct = create_percent_format();

    for (col, h) in HEADERS.iter().enumerate() {
        ws.write_with_format(0, col as u16, *h, &hdr)?;
    }

    for (i, r) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write(row, 0, r.equipment_id.as_str())?;
        ws.write(row, 1, r.location.as_str())?;
        ws.write_with_format(row, 2, r.usage_hours, &int)?;
        ws.write(row, 3, r.service_history.as_str())?;
        ws.write(row, 4, if r.needs_maintenance { "Oui" } else { "Non" })?;
        ws.write_with_format(row, 5, r.entitled_hours, &num)?;
        ws.write(row, 6, method_label(r))?;
        ws.write_with_format(row, 7, r.utilization_pct / 100.0, &pct)?;
        ws.write(row, 8, r.utilization_flag.as_str())?;
        ws.write(row, 9, anomaly_label(r))?;
        ws.write(row, 10, churn_label(r).as_str())?;
        ws.write_with_format(row, 11, r.forecasted_annual_usage, &num)?;
        ws.write_with_format(row, 12, r.annual_revenue, &num)?;
        ws.write_with_format(row, 13, r.total_forecast_revenue, &num)?;
    }

    if !rows.is_empty() {
        let last_row = rows.len() as u32;
        ws.set_freeze_panes(1, 0)?;
        ws.autofilter(0, 0, last_row, (HEADERS.len() - 1) as u16)?;
    }

    ws.set_column_width(0, 16)?;
    ws.set_column_width(1, 18)?;
    ws.set_column_width(3, 24)?;
    for col in [2u16, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13] {
        ws.set_column_width(col, 14)?;
    }

    Ok(wb.save_to_buffer()?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::anomalies::AnomalyLabel;
    use crate::analyzer::utilization::UtilizationFlag;
    use crate::config::EntitlementMethod;

    fn make_row(id: &str) -> AugmentedRecord {
        AugmentedRecord {
            equipment_id: id.to_string(),
            location: "Lyon".to_string(),
            usage_hours: 5200.0,
            service_history: "Regular".to_string(),
            needs_maintenance: false,
            entitled_hours: 9780.0,
            entitlement_method: EntitlementMethod::PeerBenchmark,
            utilization_pct: 53.17,
            utilization_flag: UtilizationFlag::Underused,
            anomaly_flag: Some(AnomalyLabel::Normal),
            churn_label: Some(1),
            forecasted_annual_usage: 5200.0,
            annual_revenue: 78_000.0,
            total_forecast_revenue: 234_000.0,
        }
    }

    #[test]
    fn test_csv_has_headers_and_rows() {
        let csv = fleet_to_csv(&[make_row("101"), make_row("102")]).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Equipment ID,Location"));
        assert_eq!(lines.count(), 2);
        assert!(csv.contains("Underused"));
        assert!(csv.contains("9780.00"));
    }

    #[test]
    fn test_csv_empty_flags_left_blank() {
        let mut row = make_row("101");
        row.anomaly_flag = None;
        row.churn_label = None;
        let csv = fleet_to_csv(&[row]).unwrap();
        let data_line = csv.lines().nth(1).unwrap();
        assert!(data_line.contains(",Underused,,,"));
    }

    #[test]
    fn test_xlsx_signature() {
        let bytes = generate_fleet_report(&[make_row("101")]).unwrap();
        assert!(bytes.len() > 4, "XLSX trop petit");
        // ZIP magic bytes PK (0x50 0x4B)
        assert_eq!(bytes[0], 0x50);
        assert_eq!(bytes[1], 0x4B);
    }

    #[test]
    fn test_xlsx_empty_rows() {
        let bytes = generate_fleet_report(&[]).unwrap();
        assert_eq!(bytes[0], 0x50);
        assert_eq!(bytes[1], 0x4B);
    }
}
