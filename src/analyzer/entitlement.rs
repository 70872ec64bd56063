// Estimation de l'entitlement (usage attendu) — deux stratégies interchangeables :
// courbe de survie Kaplan-Meier ou benchmark de groupe de pairs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyzer::stats;
use crate::config::{AnalysisConfig, BenchmarkStatistic, EntitlementMethod};
use crate::error::{AppError, ComputationWarning};
use crate::parser::types::EquipmentRecord;

/// Indicateurs de panne recherchés dans l'historique de service
/// (sous-chaîne, insensible à la casse).
const FAILURE_INDICATORS: &[&str] = &["failure", "failed", "breakdown"];

/// Uplift historique appliqué à chaque statistique de benchmark.
fn statistic_uplift(stat: BenchmarkStatistic) -> f64 {
    match stat {
        BenchmarkStatistic::Mean => 1.0,
        BenchmarkStatistic::TrimmedMean => 1.1,
        BenchmarkStatistic::Median => 1.2,
    }
}

/// Entitlement d'une unité, avec la méthode effectivement utilisée.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResult {
    pub equipment_id: String,
    pub entitled_hours: f64,
    pub method: EntitlementMethod,
}

/// Point de la fonction de survie : S(time) = probability.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalPoint {
    pub time: f64,
    pub probability: f64,
}

/// Fonction de survie en escalier, continue à droite, partant de S(0) = 1.0.
#[derive(Debug, Clone)]
pub struct SurvivalCurve {
    pub points: Vec<SurvivalPoint>,
}

impl SurvivalCurve {
    /// Plus petite durée t telle que S(t) ≤ 0.5, si la courbe l'atteint.
    pub fn median_survival_time(&self) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.probability <= 0.5)
            .map(|p| p.time)
    }
}

/// True si l'historique de service contient un indicateur de panne.
pub fn has_failure_event(service_history: &str) -> bool {
    let lower = service_history.to_lowercase();
    FAILURE_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Ajuste la courbe de survie Kaplan-Meier sur des paires (durée, événement).
///
/// # Algorithme
/// 1. Trier les durées croissantes
/// 2. À chaque durée observée : d événements, c censures simultanés
/// 3. Si d > 0 : S ← S × (1 − d / n_at_risk), nouveau point de la courbe
/// 4. Réduire le risk set de d + c (les ex æquo sortent ensemble)
///
/// La courbe commence toujours à (0, 1.0) et est monotone non croissante.
pub fn fit_survival_curve(pairs: &[(f64, bool)]) -> SurvivalCurve {
    let mut sorted: Vec<(f64, bool)> = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut points = vec![SurvivalPoint {
        time: 0.0,
        probability: 1.0,
    }];

    let mut at_risk = sorted.len();
    let mut survival = 1.0f64;
    let mut i = 0;

    while i < sorted.len() {
        let t = sorted[i].0;
        let mut deaths = 0usize;
        let mut censored = 0usize;
        while i < sorted.len() && sorted[i].0 == t {
            if sorted[i].1 {
                deaths += 1;
            } else {
                censored += 1;
            }
            i += 1;
        }
        if deaths > 0 && at_risk > 0 {
            survival *= 1.0 - deaths as f64 / at_risk as f64;
            points.push(SurvivalPoint {
                time: t,
                probability: survival,
            });
        }
        at_risk -= deaths + censored;
    }

    SurvivalCurve { points }
}

/// Entitlement par médiane de survie : valeur unique pour tout le parc.
///
/// # Erreurs
/// `DegenerateModel` si aucun événement de panne n'est observé (courbe plate
/// à 1.0) ou si la courbe ne descend jamais sous 0.5 — jamais de valeur fictive.
pub fn survival_entitlement(records: &[EquipmentRecord]) -> Result<f64, AppError> {
    if records.is_empty() {
        return Err(AppError::DegenerateModel(
            "aucune unité pour l'estimation de survie".to_string(),
        ));
    }

    let pairs: Vec<(f64, bool)> = records
        .iter()
        .map(|r| (r.usage_hours, has_failure_event(&r.service_history)))
        .collect();

    if !pairs.iter().any(|(_, event)| *event) {
        return Err(AppError::DegenerateModel(
            "aucun événement de panne observé — la courbe de survie reste plate à 1.0".to_string(),
        ));
    }

    let curve = fit_survival_curve(&pairs);
    curve.median_survival_time().ok_or_else(|| {
        AppError::DegenerateModel(
            "la courbe de survie ne descend jamais sous 0.5 — médiane indéfinie".to_string(),
        )
    })
}

/// Clé de comparabilité d'une unité : type d'équipement, sinon application,
/// sinon groupe unique couvrant tout le parc.
fn peer_key(record: &EquipmentRecord) -> String {
    record
        .equipment_type
        .clone()
        .or_else(|| record.application.clone())
        .unwrap_or_else(|| "<fleet>".to_string())
}

/// Entitlement par benchmark de pairs, une valeur par unité.
///
/// benchmark(groupe) = statistique(usage du groupe) × uplift
/// entitlement(unité) = benchmark × mult(environnement) × mult(cycle de service)
pub fn peer_benchmark_entitlements(
    records: &[EquipmentRecord],
    statistic: BenchmarkStatistic,
) -> Result<Vec<f64>, AppError> {
    if records.is_empty() {
        return Err(AppError::DegenerateModel(
            "aucune unité pour le benchmark de pairs".to_string(),
        ));
    }

    // BTreeMap pour un ordre de groupes déterministe
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        groups
            .entry(peer_key(record))
            .or_default()
            .push(record.usage_hours);
    }

    let mut benchmarks: BTreeMap<String, f64> = BTreeMap::new();
    for (key, usage) in &groups {
        let base = match statistic {
            BenchmarkStatistic::Mean => stats::mean(usage),
            BenchmarkStatistic::TrimmedMean => stats::trimmed_mean(usage, 0.1),
            BenchmarkStatistic::Median => stats::median(usage),
        };
        let benchmark = base * statistic_uplift(statistic);
        if benchmark <= 0.0 {
            return Err(AppError::DegenerateModel(format!(
                "benchmark non positif ({benchmark}) pour le groupe {key:?}"
            )));
        }
        benchmarks.insert(key.clone(), benchmark);
    }

    Ok(records
        .iter()
        .map(|r| {
            let benchmark = benchmarks[&peer_key(r)];
            let env_mult = r.environment.map(|e| e.multiplier()).unwrap_or(1.0);
            let duty_mult = r.duty_cycle.map(|d| d.multiplier()).unwrap_or(1.0);
            benchmark * env_mult * duty_mult
        })
        .collect())
}

/// Estime l'entitlement de chaque unité selon la méthode configurée.
///
/// Politique de repli : si l'estimation de survie dégénère, bascule sur le
/// benchmark de pairs avec un avertissement — le pipeline ne s'arrête jamais ici.
pub fn estimate_with_fallback(
    records: &[EquipmentRecord],
    config: &AnalysisConfig,
) -> Result<(Vec<EntitlementResult>, Vec<ComputationWarning>), AppError> {
    let mut warnings = Vec::new();

    let (values, method) = match config.entitlement_method {
        EntitlementMethod::Survival => match survival_entitlement(records) {
            Ok(median) => (vec![median; records.len()], EntitlementMethod::Survival),
            Err(AppError::DegenerateModel(reason)) => {
                warnings.push(ComputationWarning::new(
                    "entitlement",
                    format!("estimation de survie dégénérée ({reason}) — repli sur le benchmark de pairs"),
                ));
                (
                    peer_benchmark_entitlements(records, config.benchmark_statistic)?,
                    EntitlementMethod::PeerBenchmark,
                )
            }
            Err(e) => return Err(e),
        },
        EntitlementMethod::PeerBenchmark => (
            peer_benchmark_entitlements(records, config.benchmark_statistic)?,
            EntitlementMethod::PeerBenchmark,
        ),
    };

    let results = records
        .iter()
        .zip(values)
        .map(|(r, entitled_hours)| EntitlementResult {
            equipment_id: r.equipment_id.clone(),
            entitled_hours,
            method,
        })
        .collect();

    Ok((results, warnings))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
