use chrono::NaiveDateTime;
use serde::Serialize;

/// Environnement d'exploitation déclaré d'une unité.
/// L'entitlement décroît strictement avec la sévérité (1.0 > 0.85 > 0.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Normal,
    Harsh,
    Severe,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(Environment::Normal),
            "harsh" => Some(Environment::Harsh),
            "severe" => Some(Environment::Severe),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Environment::Normal => 1.0,
            Environment::Harsh => 0.85,
            Environment::Severe => 0.7,
        }
    }
}

/// Cycle de service déclaré d'une unité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DutyCycle {
    Low,
    Medium,
    High,
}

impl DutyCycle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(DutyCycle::Low),
            "medium" => Some(DutyCycle::Medium),
            "high" => Some(DutyCycle::High),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            DutyCycle::Low => 0.75,
            DutyCycle::Medium => 1.0,
            DutyCycle::High => 1.25,
        }
    }
}

/// Ligne normalisée du parc installé. Immuable après ingestion : aucune étape
/// d'analyse ne modifie ces enregistrements en place.
#[derive(Debug, Clone)]
pub struct EquipmentRecord {
    pub equipment_id: String,
    pub location: String,
    pub usage_hours: f64,
    pub service_history: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub flow_rate: Option<f64>,
    pub rpm: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub brand: Option<String>,
    pub application: Option<String>,
    pub market: Option<String>,
    pub product_code: Option<String>,
    pub equipment_type: Option<String>,
    pub industry: Option<String>,
    pub environment: Option<Environment>,
    pub duty_cycle: Option<DutyCycle>,
    pub customer: Option<String>,
    pub country: Option<String>,
}

impl EquipmentRecord {
    /// Enregistrement minimal : colonnes obligatoires seules, optionnelles à None.
    pub fn new(
        equipment_id: impl Into<String>,
        location: impl Into<String>,
        usage_hours: f64,
        service_history: impl Into<String>,
    ) -> Self {
        EquipmentRecord {
            equipment_id: equipment_id.into(),
            location: location.into(),
            usage_hours,
            service_history: service_history.into(),
            latitude: None,
            longitude: None,
            timestamp: None,
            temperature: None,
            pressure: None,
            flow_rate: None,
            rpm: None,
            voltage: None,
            current: None,
            brand: None,
            application: None,
            market: None,
            product_code: None,
            equipment_type: None,
            industry: None,
            environment: None,
            duty_cycle: None,
            customer: None,
            country: None,
        }
    }

    /// Valeur de télémétrie par nom de colonne canonique (voir `columns::TELEMETRY`).
    pub fn telemetry_value(&self, column: &str) -> Option<f64> {
        match column {
            "Temperature" => self.temperature,
            "Pressure" => self.pressure,
            "Flow Rate" => self.flow_rate,
            "RPM" => self.rpm,
            "Voltage" => self.voltage,
            "Current" => self.current,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

/// Output of `parse_csv` — carries normalized records and ingestion metadata.
#[derive(Debug)]
pub struct ParseOutput {
    pub records: Vec<EquipmentRecord>,
    pub warnings: Vec<ParseWarning>,
    pub total_rows_processed: usize,
    pub detected_columns: Vec<String>,
    pub missing_optional_columns: Vec<String>,
    pub parse_duration_ms: u64,
}
