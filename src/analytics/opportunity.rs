// Score d'opportunité commerciale par client : agrégats du parc joints aux
// références macro-économiques (pays) et de rentabilité (produit).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::OpportunityFormula;
use crate::error::ComputationWarning;
use crate::parser::types::EquipmentRecord;

// Bornes de normalisation du score pondéré
const UNITS_UPPER: f64 = 150.0;
const USAGE_UPPER: f64 = 12_000.0;
const GDP_UPPER: f64 = 10.0;

/// Parc agrégé d'un client pour un produit et un pays donnés.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFleet {
    pub customer: String,
    pub country: String,
    pub product: String,
    pub units: usize,
    pub avg_usage_hours: f64,
    /// Nombre de transactions de vente antérieures enregistrées.
    pub sales_history: u32,
    /// Stade de cycle de vie du marché ("Growth", "Mature", "Decline", ...).
    pub lifecycle_stage: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitiveIntensity {
    Low,
    Medium,
    High,
}

/// Indicateur macro-économique par pays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicIndicator {
    pub country: String,
    pub gdp_growth_pct: f64,
    /// Croissance d'indice de marché, dans [0, 1].
    pub momentum_index: f64,
    pub competitive_intensity: CompetitiveIntensity,
}

/// Référence de rentabilité par produit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProfile {
    pub product: String,
    pub gross_margin_pct: f64,
    pub replacement_cycle_years: f64,
}

/// Décomposition du score pondéré, exportée telle quelle dans les rapports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub units_norm: f64,
    pub usage_norm: f64,
    pub gdp_norm: f64,
    pub momentum: f64,
    pub lifecycle_score: f64,
    pub sales_boost: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    pub customer: String,
    pub country: String,
    pub product: String,
    pub score: f64,
    pub components: ScoreComponents,
}

/// Classement complet + extraction des meilleures opportunités.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRanking {
    pub records: Vec<OpportunityRecord>,
    pub top: Vec<OpportunityRecord>,
    pub warnings: Vec<ComputationWarning>,
}

fn norm(value: f64, upper: f64) -> f64 {
    (value / upper).clamp(0.0, 1.0)
}

/// Growth 1.0, Mature 0.5, Decline 0.2, tout le reste 0.3.
pub fn lifecycle_score(stage: &str) -> f64 {
    match stage.to_lowercase().as_str() {
        "growth" => 1.0,
        "mature" => 0.5,
        "decline" => 0.2,
        _ => 0.3,
    }
}

/// Score canonique pondéré — les poids somment à 1,0. Le boost commercial
/// (0,1 × transactions) est déjà dans le terme 0,10, jamais recompté.
fn weighted_score(fleet: &CustomerFleet, indicator: Option<&EconomicIndicator>) -> ScoreComponents {
    let (gdp_norm, momentum) = match indicator {
        Some(ind) => (norm(ind.gdp_growth_pct, GDP_UPPER), ind.momentum_index),
        None => (0.0, 0.0),
    };
    ScoreComponents {
        units_norm: norm(fleet.units as f64, UNITS_UPPER),
        usage_norm: norm(fleet.avg_usage_hours, USAGE_UPPER),
        gdp_norm,
        momentum,
        lifecycle_score: lifecycle_score(&fleet.lifecycle_stage),
        sales_boost: 0.1 * f64::from(fleet.sales_history),
    }
}

fn combine_weighted(c: &ScoreComponents) -> f64 {
    0.20 * c.units_norm
        + 0.20 * c.usage_norm
        + 0.25 * c.gdp_norm
        + 0.15 * c.momentum
        + 0.10 * c.lifecycle_score
        + 0.10 * c.sales_boost
}

/// Formule additive historique : accumulation de points bruts avec pénalités
/// d'intensité concurrentielle. Conservée comme variante explicite, jamais
/// mélangée à la formule pondérée.
fn legacy_additive_score(
    fleet: &CustomerFleet,
    indicator: Option<&EconomicIndicator>,
    profile: Option<&ProductProfile>,
) -> f64 {
    let mut points = 0.0;

    if fleet.units >= 100 {
        points += 2.0;
    } else if fleet.units >= 50 {
        points += 1.0;
    }

    if fleet.avg_usage_hours >= 10_000.0 {
        points += 2.0;
    } else if fleet.avg_usage_hours >= 8000.0 {
        points += 1.0;
    }

    if let Some(ind) = indicator {
        if ind.gdp_growth_pct >= 5.0 {
            points += 2.0;
        } else if ind.gdp_growth_pct >= 2.0 {
            points += 1.0;
        }
        if ind.momentum_index >= 0.7 {
            points += 1.0;
        }
        points += match ind.competitive_intensity {
            CompetitiveIntensity::High => -2.0,
            CompetitiveIntensity::Medium => -1.0,
            CompetitiveIntensity::Low => 0.0,
        };
    }

    points += match fleet.lifecycle_stage.to_lowercase().as_str() {
        "growth" => 2.0,
        "mature" => 1.0,
        _ => 0.0,
    };

    points += f64::from(fleet.sales_history);

    if let Some(p) = profile {
        if p.gross_margin_pct >= 40.0 {
            points += 2.0;
        } else if p.gross_margin_pct >= 25.0 {
            points += 1.0;
        }
        if p.replacement_cycle_years <= 3.0 {
            points += 1.0;
        }
    }

    points
}

/// Score chaque parc client et produit le classement décroissant.
/// Égalités départagées par le nom de client, ordre déterministe.
pub fn score_opportunities(
    fleets: &[CustomerFleet],
    indicators: &[EconomicIndicator],
    profiles: &[ProductProfile],
    formula: OpportunityFormula,
    top_n: usize,
) -> OpportunityRanking {
    let by_country: BTreeMap<&str, &EconomicIndicator> = indicators
        .iter()
        .map(|i| (i.country.as_str(), i))
        .collect();
    let by_product: BTreeMap<&str, &ProductProfile> =
        profiles.iter().map(|p| (p.product.as_str(), p)).collect();

    let mut warnings = Vec::new();
    let mut records: Vec<OpportunityRecord> = fleets
        .iter()
        .map(|fleet| {
            let indicator = by_country.get(fleet.country.as_str()).copied();
            if indicator.is_none() {
                warnings.push(ComputationWarning::new(
                    "opportunity",
                    format!(
                        "Pas d'indicateur économique pour « {} » — composantes macro neutres",
                        fleet.country
                    ),
                ));
            }
            let profile = by_product.get(fleet.product.as_str()).copied();
            if profile.is_none() && formula == OpportunityFormula::LegacyAdditive {
                warnings.push(ComputationWarning::new(
                    "opportunity",
                    format!(
                        "Pas de profil produit pour « {} » — points de marge ignorés",
                        fleet.product
                    ),
                ));
            }

            let components = weighted_score(fleet, indicator);
            let score = match formula {
                OpportunityFormula::Weighted => combine_weighted(&components),
                OpportunityFormula::LegacyAdditive => {
                    legacy_additive_score(fleet, indicator, profile)
                }
            };

            OpportunityRecord {
                customer: fleet.customer.clone(),
                country: fleet.country.clone(),
                product: fleet.product.clone(),
                score,
                components,
            }
        })
        .collect();

    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.customer.cmp(&b.customer))
    });

    let top = records.iter().take(top_n).cloned().collect();

    OpportunityRanking {
        records,
        top,
        warnings,
    }
}

/// Agrège la table du parc en parcs clients quand les colonnes Customer et
/// Country sont renseignées. Pas d'historique de ventes dans le CSV parc, le
/// compteur reste à zéro et le stade de cycle de vie est inconnu.
pub fn aggregate_fleet(records: &[EquipmentRecord]) -> Vec<CustomerFleet> {
    let mut groups: BTreeMap<(String, String, String), (usize, f64)> = BTreeMap::new();
    for r in records {
        let (customer, country) = match (&r.customer, &r.country) {
            (Some(cu), Some(co)) => (cu.clone(), co.clone()),
            _ => continue,
        };
        let product = r.product_code.clone().unwrap_or_default();
        let entry = groups.entry((customer, country, product)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += r.usage_hours;
    }

    groups
        .into_iter()
        .map(|((customer, country, product), (units, total_usage))| CustomerFleet {
            customer,
            country,
            product,
            units,
            avg_usage_hours: total_usage / units as f64,
            sales_history: 0,
            lifecycle_stage: "Unknown".to_string(),
        })
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
