// Orchestration du pipeline d'analyse du parc : entitlement → utilisation →
// maintenance → anomalies → churn → revenus. Chaque étape lit les sorties des
// précédentes et n'écrit que dans la table augmentée finale.

use ndarray::Array2;
use serde::Serialize;

use crate::analytics::anomalies::{self, AnomalyLabel, IsolationForestParams};
use crate::analytics::churn::{self, ChurnReport};
use crate::analyzer::{entitlement, maintenance, revenue, utilization};
use crate::config::{AnalysisConfig, EntitlementMethod};
use crate::error::{AppError, ComputationWarning};
use crate::parser::columns::TELEMETRY;
use crate::parser::types::EquipmentRecord;

/// Ligne de la table augmentée : l'enregistrement d'origine enrichi de toutes
/// les colonnes dérivées.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentedRecord {
    pub equipment_id: String,
    pub location: String,
    pub usage_hours: f64,
    pub service_history: String,
    pub needs_maintenance: bool,
    pub entitled_hours: f64,
    pub entitlement_method: EntitlementMethod,
    pub utilization_pct: f64,
    pub utilization_flag: utilization::UtilizationFlag,
    /// None si la détection a été sautée (modèle dégénéré ou parc trop petit).
    pub anomaly_flag: Option<AnomalyLabel>,
    /// None si le modèle de churn a été sauté ou la ligne écartée (feature manquante).
    pub churn_label: Option<u8>,
    pub forecasted_annual_usage: f64,
    pub annual_revenue: f64,
    pub total_forecast_revenue: f64,
}

/// Résultat complet d'une passe d'analyse.
#[derive(Debug, Clone)]
pub struct FleetAnalysis {
    pub rows: Vec<AugmentedRecord>,
    pub churn_report: Option<ChurnReport>,
    pub warnings: Vec<ComputationWarning>,
}

/// Colonnes de télémétrie renseignées sur TOUTES les lignes du parc.
fn telemetry_on_all_rows(records: &[EquipmentRecord]) -> Vec<&'static str> {
    TELEMETRY
        .iter()
        .copied()
        .filter(|col| records.iter().all(|r| r.telemetry_value(col).is_some()))
        .collect()
}

/// Colonnes de télémétrie renseignées sur AU MOINS une ligne du parc.
fn telemetry_on_any_row(records: &[EquipmentRecord]) -> Vec<&'static str> {
    TELEMETRY
        .iter()
        .copied()
        .filter(|col| records.iter().any(|r| r.telemetry_value(col).is_some()))
        .collect()
}

fn run_anomaly_stage(
    records: &[EquipmentRecord],
    pcts: &[f64],
    config: &AnalysisConfig,
    warnings: &mut Vec<ComputationWarning>,
) -> Vec<Option<AnomalyLabel>> {
    let telemetry = telemetry_on_all_rows(records);
    if telemetry.is_empty() {
        warnings.push(ComputationWarning::new(
            "anomalies",
            "aucune colonne de télémétrie complète — détection restreinte à l'utilisation seule",
        ));
    }

    let n_features = 1 + telemetry.len();
    let mut values = Vec::with_capacity(records.len() * n_features);
    for (record, &pct) in records.iter().zip(pcts) {
        values.push(pct);
        for col in &telemetry {
            // telemetry_on_all_rows garantit la présence
            values.push(record.telemetry_value(col).unwrap_or(0.0));
        }
    }

    let data = match Array2::from_shape_vec((records.len(), n_features), values) {
        Ok(d) => d,
        Err(e) => {
            warnings.push(ComputationWarning::new(
                "anomalies",
                format!("matrice de features invalide ({e}) — étape sautée"),
            ));
            return vec![None; records.len()];
        }
    };

    let params = IsolationForestParams::new(config.anomaly_contamination, config.seed);
    match anomalies::detect_anomalies(&data, &params) {
        Ok(labels) => labels.into_iter().map(Some).collect(),
        Err(AppError::DegenerateModel(reason)) => {
            warnings.push(ComputationWarning::new(
                "anomalies",
                format!("détection d'anomalies sautée: {reason}"),
            ));
            vec![None; records.len()]
        }
        Err(e) => {
            warnings.push(ComputationWarning::new(
                "anomalies",
                format!("détection d'anomalies en échec: {e}"),
            ));
            vec![None; records.len()]
        }
    }
}

fn run_churn_stage(
    records: &[EquipmentRecord],
    entitled: &[f64],
    pcts: &[f64],
    config: &AnalysisConfig,
    warnings: &mut Vec<ComputationWarning>,
) -> (Vec<Option<u8>>, Option<ChurnReport>) {
    let telemetry = telemetry_on_any_row(records);

    // Lignes utilisables : toutes les features (base + télémétrie) renseignées
    let mut usable_idx = Vec::new();
    let mut values = Vec::new();
    let mut labels = Vec::new();
    'rows: for (i, record) in records.iter().enumerate() {
        let mut row = vec![record.usage_hours, entitled[i], pcts[i]];
        for col in &telemetry {
            match record.telemetry_value(col) {
                Some(v) => row.push(v),
                None => continue 'rows,
            }
        }
        usable_idx.push(i);
        values.extend(row);
        labels.push(churn::churn_label(&record.service_history));
    }

    let dropped = records.len() - usable_idx.len();
    if dropped > 0 {
        warnings.push(ComputationWarning::new(
            "churn",
            format!("{dropped} ligne(s) écartée(s) du modèle de churn (télémétrie incomplète)"),
        ));
    }

    let n_features = 3 + telemetry.len();
    let features = match Array2::from_shape_vec((usable_idx.len(), n_features), values) {
        Ok(f) => f,
        Err(e) => {
            warnings.push(ComputationWarning::new(
                "churn",
                format!("matrice de features invalide ({e}) — étape sautée"),
            ));
            return (vec![None; records.len()], None);
        }
    };

    match churn::predict_churn(&features, &labels, config.seed) {
        Ok(output) => {
            let mut per_row = vec![None; records.len()];
            for (&idx, &pred) in usable_idx.iter().zip(&output.predictions) {
                per_row[idx] = Some(pred as u8);
            }
            (per_row, Some(output.report))
        }
        Err(AppError::DegenerateModel(reason)) => {
            warnings.push(ComputationWarning::new(
                "churn",
                format!("modèle de churn sauté: {reason}"),
            ));
            (vec![None; records.len()], None)
        }
        Err(e) => {
            warnings.push(ComputationWarning::new(
                "churn",
                format!("modèle de churn en échec: {e}"),
            ));
            (vec![None; records.len()], None)
        }
    }
}

/// Passe d'analyse complète sur la table du parc.
///
/// Les étapes statistiques (anomalies, churn) dégénèrent en avertissements,
/// jamais en erreur fatale ; entitlement, utilisation et revenus sont
/// obligatoires et arrêtent la passe s'ils échouent.
pub fn run_analysis(
    records: &[EquipmentRecord],
    config: &AnalysisConfig,
) -> Result<FleetAnalysis, AppError> {
    config.validate()?;
    if records.is_empty() {
        return Err(AppError::EmptyFile);
    }

    let mut warnings = Vec::new();

    let (entitlements, ent_warnings) = entitlement::estimate_with_fallback(records, config)?;
    warnings.extend(ent_warnings);

    let ids: Vec<String> = records.iter().map(|r| r.equipment_id.clone()).collect();
    let usage: Vec<f64> = records.iter().map(|r| r.usage_hours).collect();
    let entitled: Vec<f64> = entitlements.iter().map(|e| e.entitled_hours).collect();

    let util_records =
        utilization::compute(&ids, &usage, &entitled, config.utilization_flag_policy)?;
    let pcts: Vec<f64> = util_records.iter().map(|u| u.utilization_pct).collect();

    let needs_maintenance = maintenance::flag_maintenance(&usage, config.maintenance_threshold);

    let anomaly_flags = run_anomaly_stage(records, &pcts, config, &mut warnings);
    let (churn_labels, churn_report) =
        run_churn_stage(records, &entitled, &pcts, config, &mut warnings);

    let forecasts = revenue::forecast(
        &ids,
        &entitled,
        &pcts,
        config.revenue_per_hour,
        config.forecast_horizon_years,
    );

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, r)| AugmentedRecord {
            equipment_id: r.equipment_id.clone(),
            location: r.location.clone(),
            usage_hours: r.usage_hours,
            service_history: r.service_history.clone(),
            needs_maintenance: needs_maintenance[i],
            entitled_hours: entitlements[i].entitled_hours,
            entitlement_method: entitlements[i].method,
            utilization_pct: pcts[i],
            utilization_flag: util_records[i].flag,
            anomaly_flag: anomaly_flags[i],
            churn_label: churn_labels[i],
            forecasted_annual_usage: forecasts[i].forecasted_annual_usage,
            annual_revenue: forecasts[i].annual_revenue,
            total_forecast_revenue: forecasts[i].total_forecast_revenue,
        })
        .collect();

    Ok(FleetAnalysis {
        rows,
        churn_report,
        warnings,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
