use std::collections::HashMap;

use crate::error::AppError;

/// Colonnes obligatoires — l'ingestion échoue si l'une d'elles est absente.
pub const REQUIRED: &[&str] = &["Equipment ID", "Location", "Usage Hours", "Service History"];

/// Colonnes de télémétrie — optionnelles, débloquent la détection d'anomalies
/// multivariée et enrichissent les features du churn.
pub const TELEMETRY: &[&str] = &[
    "Temperature",
    "Pressure",
    "Flow Rate",
    "RPM",
    "Voltage",
    "Current",
];

/// Colonnes optionnelles — absentes = valeur par défaut, signalées dans le résultat.
pub const OPTIONAL: &[&str] = &[
    "Latitude",
    "Longitude",
    "Timestamp",
    "Temperature",
    "Pressure",
    "Flow Rate",
    "RPM",
    "Voltage",
    "Current",
    "Brand",
    "Application",
    "Market",
    "Product Code",
    "Equipment Type",
    "Industry",
    "Environment",
    "Duty Cycle",
    "Customer",
    "Country",
];

/// Maps column names to their index in a CSV record.
pub struct ColumnMap {
    indices: HashMap<String, usize>,
    headers: Vec<String>,
}

impl ColumnMap {
    /// Build a ColumnMap from the CSV header record.
    /// Header fields are trimmed of surrounding whitespace.
    pub fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut indices = HashMap::new();
        let mut header_list = Vec::new();
        for (i, field) in headers.iter().enumerate() {
            let name = field.trim().to_string();
            indices.insert(name.clone(), i);
            header_list.push(name);
        }
        ColumnMap {
            indices,
            headers: header_list,
        }
    }

    /// Get the value of a named column from a record.
    pub fn get<'a>(&self, record: &'a csv::StringRecord, col: &str) -> Option<&'a str> {
        self.indices.get(col).and_then(|&i| record.get(i))
    }

    /// Returns true if the column is present in the CSV headers.
    pub fn has(&self, col: &str) -> bool {
        self.indices.contains_key(col)
    }

    /// All header names in order.
    pub fn all_headers(&self) -> &[String] {
        &self.headers
    }
}

/// Result of column validation.
#[derive(Debug)]
pub struct ColumnValidation {
    /// All column names present in the CSV.
    pub present: Vec<String>,
    /// Optional columns that are absent from the CSV.
    pub missing_optional: Vec<String>,
}

/// Validate that all required columns are present.
/// Returns `AppError::MissingColumns` if any required column is absent.
pub fn validate_columns(col_map: &ColumnMap) -> Result<ColumnValidation, AppError> {
    let missing_required: Vec<String> = REQUIRED
        .iter()
        .filter(|&&c| !col_map.has(c))
        .map(|c| c.to_string())
        .collect();

    if !missing_required.is_empty() {
        return Err(AppError::MissingColumns(missing_required));
    }

    let missing_optional = OPTIONAL
        .iter()
        .filter(|&&c| !col_map.has(c))
        .map(|c| c.to_string())
        .collect();

    Ok(ColumnValidation {
        present: col_map.all_headers().to_vec(),
        missing_optional,
    })
}
