use std::collections::HashSet;
use std::io::Read;
use std::time::Instant;

use crate::error::AppError;
use crate::parser::columns::{validate_columns, ColumnMap};
use crate::parser::deserializers::{
    parse_opt_f64, parse_opt_string, parse_spaced_f64, parse_timestamp,
};
use crate::parser::types::{DutyCycle, Environment, EquipmentRecord, ParseOutput, ParseWarning};

/// Parse an installed-base CSV file from `path`.
pub fn parse_csv(path: &str) -> Result<ParseOutput, AppError> {
    let file = std::fs::File::open(path)?;
    parse_csv_reader(std::io::BufReader::new(file))
}

/// Core parsing logic — accepts any `Read` source, useful for tests.
///
/// Phase 1 valide les colonnes obligatoires avant toute lecture de lignes
/// (jamais de table partiellement traitée). Phase 2 normalise chaque ligne :
/// un champ obligatoire invalide rejette tout le fichier en nommant la ligne
/// et la colonne ; un champ optionnel invalide devient None avec avertissement.
pub fn parse_csv_reader<R: Read>(reader: R) -> Result<ParseOutput, AppError> {
    let start = Instant::now();

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    // Phase 1: validate columns
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(AppError::EmptyFile);
    }
    let col_map = ColumnMap::from_headers(&headers);
    let col_validation = validate_columns(&col_map)?;

    // Phase 2: parse and normalise records
    let mut records: Vec<EquipmentRecord> = Vec::new();
    let mut warnings: Vec<ParseWarning> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut row_idx = 0usize;

    for result in rdr.records() {
        row_idx += 1;
        let line = row_idx + 1; // +1 for the header row
        let record = result?;

        let normalized = normalize_record(&col_map, &record, line, &mut warnings)?;

        if !seen_ids.insert(normalized.equipment_id.clone()) {
            return Err(AppError::DuplicateId(normalized.equipment_id));
        }
        records.push(normalized);
    }

    if row_idx == 0 {
        return Err(AppError::EmptyFile);
    }

    Ok(ParseOutput {
        records,
        warnings,
        total_rows_processed: row_idx,
        detected_columns: col_validation.present,
        missing_optional_columns: col_validation.missing_optional,
        parse_duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn normalize_record(
    col_map: &ColumnMap,
    record: &csv::StringRecord,
    line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Result<EquipmentRecord, AppError> {
    // Equipment ID (required, non-empty)
    let id = col_map
        .get(record, "Equipment ID")
        .unwrap_or("")
        .trim()
        .to_string();
    if id.is_empty() {
        return Err(AppError::InvalidField {
            line,
            column: "Equipment ID".to_string(),
            value: String::new(),
        });
    }

    // Usage Hours (required, numeric, non-negative)
    let usage_str = col_map.get(record, "Usage Hours").unwrap_or("").to_string();
    let usage_hours = parse_spaced_f64(&usage_str).ok_or_else(|| AppError::InvalidField {
        line,
        column: "Usage Hours".to_string(),
        value: usage_str.clone(),
    })?;
    if usage_hours < 0.0 || !usage_hours.is_finite() {
        return Err(AppError::InvalidField {
            line,
            column: "Usage Hours".to_string(),
            value: usage_str,
        });
    }

    let location = col_map.get(record, "Location").unwrap_or("").trim().to_string();
    let service_history = col_map
        .get(record, "Service History")
        .unwrap_or("")
        .trim()
        .to_string();

    // Champs numériques optionnels : valeur illisible → None + avertissement
    let mut opt_f64 = |col: &str| -> Option<f64> {
        let raw = col_map.get(record, col)?;
        if raw.trim().is_empty() {
            return None;
        }
        match parse_opt_f64(raw) {
            Some(v) => Some(v),
            None => {
                warnings.push(ParseWarning {
                    line,
                    message: format!("Valeur {col} illisible: {raw:?} — ignorée"),
                });
                None
            }
        }
    };

    let latitude = opt_f64("Latitude");
    let longitude = opt_f64("Longitude");
    let temperature = opt_f64("Temperature");
    let pressure = opt_f64("Pressure");
    let flow_rate = opt_f64("Flow Rate");
    let rpm = opt_f64("RPM");
    let voltage = opt_f64("Voltage");
    let current = opt_f64("Current");

    let timestamp = match col_map.get(record, "Timestamp") {
        Some(raw) if !raw.trim().is_empty() => match parse_timestamp(raw) {
            Some(ts) => Some(ts),
            None => {
                warnings.push(ParseWarning {
                    line,
                    message: format!("Timestamp illisible: {raw:?} — ignoré"),
                });
                None
            }
        },
        _ => None,
    };

    let opt_str =
        |col: &str| -> Option<String> { col_map.get(record, col).and_then(parse_opt_string) };

    let environment = match col_map.get(record, "Environment").map(str::trim) {
        Some(raw) if !raw.is_empty() => match Environment::parse(raw) {
            Some(env) => Some(env),
            None => {
                warnings.push(ParseWarning {
                    line,
                    message: format!("Environment inconnu: {raw:?} — ignoré"),
                });
                None
            }
        },
        _ => None,
    };

    let duty_cycle = match col_map.get(record, "Duty Cycle").map(str::trim) {
        Some(raw) if !raw.is_empty() => match DutyCycle::parse(raw) {
            Some(dc) => Some(dc),
            None => {
                warnings.push(ParseWarning {
                    line,
                    message: format!("Duty Cycle inconnu: {raw:?} — ignoré"),
                });
                None
            }
        },
        _ => None,
    };

    Ok(EquipmentRecord {
        equipment_id: id,
        location,
        usage_hours,
        service_history,
        latitude,
        longitude,
        timestamp,
        temperature,
        pressure,
        flow_rate,
        rpm,
        voltage,
        current,
        brand: opt_str("Brand"),
        application: opt_str("Application"),
        market: opt_str("Market"),
        product_code: opt_str("Product Code"),
        equipment_type: opt_str("Equipment Type"),
        industry: opt_str("Industry"),
        environment,
        duty_cycle,
        customer: opt_str("Customer"),
        country: opt_str("Country"),
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const HDR: &str = "Equipment ID,Location,Usage Hours,Service History";

    fn parse(csv: &str) -> ParseOutput {
        parse_csv_reader(csv.as_bytes()).unwrap()
    }

    fn parse_err(csv: &str) -> AppError {
        parse_csv_reader(csv.as_bytes()).unwrap_err()
    }

    #[test]
    fn test_minimal_fleet() {
        let csv = format!(
            "{HDR}\n101,New York,5200,Regular\n102,Berlin,11000,Heavy failure repair"
        );
        let out = parse(&csv);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].equipment_id, "101");
        assert_eq!(out.records[0].usage_hours, 5200.0);
        assert_eq!(out.records[1].location, "Berlin");
        assert_eq!(out.total_rows_processed, 2);
    }

    #[test]
    fn test_missing_required_column_error() {
        let csv = "Location,Service History\nBerlin,None";
        match parse_err(csv) {
            AppError::MissingColumns(cols) => {
                assert!(cols.contains(&"Equipment ID".to_string()));
                assert!(cols.contains(&"Usage Hours".to_string()));
            }
            e => panic!("Expected MissingColumns, got {:?}", e),
        }
    }

    #[test]
    fn test_non_numeric_usage_hours_rejected() {
        let csv = format!("{HDR}\n101,Berlin,beaucoup,None");
        match parse_err(&csv) {
            AppError::InvalidField { line, column, value } => {
                assert_eq!(line, 2);
                assert_eq!(column, "Usage Hours");
                assert_eq!(value, "beaucoup");
            }
            e => panic!("Expected InvalidField, got {:?}", e),
        }
    }

    #[test]
    fn test_negative_usage_hours_rejected() {
        let csv = format!("{HDR}\n101,Berlin,-50,None");
        match parse_err(&csv) {
            AppError::InvalidField { column, .. } => assert_eq!(column, "Usage Hours"),
            e => panic!("Expected InvalidField, got {:?}", e),
        }
    }

    #[test]
    fn test_spaced_usage_hours() {
        let csv = format!("{HDR}\n101,Berlin,5 200,None");
        let out = parse(&csv);
        assert_eq!(out.records[0].usage_hours, 5200.0);
    }

    #[test]
    fn test_duplicate_equipment_id_rejected() {
        let csv = format!("{HDR}\n101,Berlin,100,None\n101,Tokyo,200,None");
        match parse_err(&csv) {
            AppError::DuplicateId(id) => assert_eq!(id, "101"),
            e => panic!("Expected DuplicateId, got {:?}", e),
        }
    }

    #[test]
    fn test_empty_equipment_id_rejected() {
        let csv = format!("{HDR}\n ,Berlin,100,None");
        match parse_err(&csv) {
            AppError::InvalidField { column, .. } => assert_eq!(column, "Equipment ID"),
            e => panic!("Expected InvalidField, got {:?}", e),
        }
    }

    #[test]
    fn test_empty_file_error() {
        match parse_err("") {
            AppError::EmptyFile | AppError::MissingColumns(_) | AppError::Csv(_) => {}
            e => panic!("Expected EmptyFile or related error, got {:?}", e),
        }
    }

    #[test]
    fn test_header_only_is_empty() {
        match parse_err(HDR) {
            AppError::EmptyFile => {}
            e => panic!("Expected EmptyFile, got {:?}", e),
        }
    }

    #[test]
    fn test_optional_columns_parsed() {
        let csv = format!(
            "{HDR},Latitude,Longitude,Temperature,Environment,Duty Cycle,Equipment Type,Timestamp\n\
             101,Berlin,5200,None,52.5,13.4,81.5,Harsh,High,Excavator,2025-06-01 08:00:00"
        );
        let out = parse(&csv);
        let r = &out.records[0];
        assert_eq!(r.latitude, Some(52.5));
        assert_eq!(r.temperature, Some(81.5));
        assert_eq!(r.environment, Some(Environment::Harsh));
        assert_eq!(r.duty_cycle, Some(DutyCycle::High));
        assert_eq!(r.equipment_type.as_deref(), Some("Excavator"));
        assert!(r.timestamp.is_some());
        assert!(out.missing_optional_columns.contains(&"Pressure".to_string()));
    }

    #[test]
    fn test_malformed_optional_becomes_none_with_warning() {
        let csv = format!("{HDR},Temperature\n101,Berlin,5200,None,tiède");
        let out = parse(&csv);
        assert!(out.records[0].temperature.is_none());
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("Temperature"));
        assert_eq!(out.warnings[0].line, 2);
    }

    #[test]
    fn test_unknown_environment_becomes_none_with_warning() {
        let csv = format!("{HDR},Environment\n101,Berlin,5200,None,Tropical");
        let out = parse(&csv);
        assert!(out.records[0].environment.is_none());
        assert!(out.warnings[0].message.contains("Environment"));
    }

    #[test]
    fn test_empty_optional_fields_no_warning() {
        let csv = format!("{HDR},Temperature,Environment\n101,Berlin,5200,None,,");
        let out = parse(&csv);
        assert!(out.records[0].temperature.is_none());
        assert!(out.warnings.is_empty(), "Champ vide ≠ champ illisible");
    }
}
