use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Méthode d'estimation de l'entitlement (usage attendu).
/// Sélection explicite par variante — jamais par comparaison de chaînes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitlementMethod {
    /// Courbe de survie non paramétrique (Kaplan-Meier), médiane de survie.
    Survival,
    /// Statistique de groupe de pairs × multiplicateurs environnement/cycle.
    PeerBenchmark,
}

/// Statistique centrale du benchmark de pairs. Chaque variante porte son
/// facteur d'uplift historique (voir DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenchmarkStatistic {
    /// Moyenne arithmétique, sans uplift.
    Mean,
    /// Moyenne tronquée à 10 %, uplift ×1.1.
    TrimmedMean,
    /// Médiane, uplift ×1.2.
    Median,
}

/// Politique d'affectation du drapeau d'utilisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtilizationFlagPolicy {
    /// Seuils fixes : > 120 % Overused, < 80 % Underused, sinon Optimal.
    FixedThreshold,
    /// Z-score sur la distribution du parc : z > 1 Overused, z < -1 Underused.
    StandardScore,
}

/// Seuil de maintenance — les deux politiques existent dans l'historique.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum MaintenanceThreshold {
    /// Constante en heures (historiquement 10 000 h).
    FixedHours(f64),
    /// Percentile des heures d'usage du parc (historiquement P90).
    UsagePercentile(f64),
}

/// Formule de scoring des opportunités. Les deux formules ne sont jamais
/// mélangées : l'appelant en choisit une explicitement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityFormula {
    /// Formule canonique pondérée (poids sommant à 1.0).
    Weighted,
    /// Accumulation de points avec pénalités d'intensité concurrentielle,
    /// observée dans les itérations antérieures.
    LegacyAdditive,
}

/// Surface de configuration complète du moteur — aucun défaut caché dans les
/// chemins de calcul.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub revenue_per_hour: f64,
    pub forecast_horizon_years: u32,
    pub entitlement_method: EntitlementMethod,
    pub benchmark_statistic: BenchmarkStatistic,
    pub utilization_flag_policy: UtilizationFlagPolicy,
    pub maintenance_threshold: MaintenanceThreshold,
    pub anomaly_contamination: f64,
    pub opportunity_formula: OpportunityFormula,
    pub top_opportunities: usize,
    /// Graine des étapes stochastiques (forêts, split train/test).
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            revenue_per_hour: 15.0,
            forecast_horizon_years: 3,
            entitlement_method: EntitlementMethod::Survival,
            benchmark_statistic: BenchmarkStatistic::Median,
            utilization_flag_policy: UtilizationFlagPolicy::FixedThreshold,
            maintenance_threshold: MaintenanceThreshold::UsagePercentile(90.0),
            anomaly_contamination: 0.1,
            opportunity_formula: OpportunityFormula::Weighted,
            top_opportunities: 3,
            seed: 42,
        }
    }
}

impl AnalysisConfig {
    /// Valide les bornes de chaque paramètre, en nommant le champ fautif.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.revenue_per_hour <= 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "revenue_per_hour doit être > 0 (reçu {})",
                self.revenue_per_hour
            )));
        }
        if !(1..=5).contains(&self.forecast_horizon_years) {
            return Err(AppError::InvalidConfig(format!(
                "forecast_horizon_years doit être dans 1..=5 (reçu {})",
                self.forecast_horizon_years
            )));
        }
        if self.anomaly_contamination <= 0.0 || self.anomaly_contamination > 0.5 {
            return Err(AppError::InvalidConfig(format!(
                "anomaly_contamination doit être dans (0, 0.5] (reçu {})",
                self.anomaly_contamination
            )));
        }
        if let MaintenanceThreshold::UsagePercentile(p) = self.maintenance_threshold {
            if !(0.0..=100.0).contains(&p) {
                return Err(AppError::InvalidConfig(format!(
                    "maintenance_threshold: percentile hors [0, 100] (reçu {p})"
                )));
            }
        }
        if let MaintenanceThreshold::FixedHours(h) = self.maintenance_threshold {
            if h <= 0.0 {
                return Err(AppError::InvalidConfig(format!(
                    "maintenance_threshold: heures fixes doivent être > 0 (reçu {h})"
                )));
            }
        }
        if self.top_opportunities == 0 {
            return Err(AppError::InvalidConfig(
                "top_opportunities doit être ≥ 1".to_string(),
            ));
        }
        Ok(())
    }
}
