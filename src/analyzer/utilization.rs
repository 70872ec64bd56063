// Ratio d'utilisation et drapeau trois états, selon la politique configurée.

use serde::Serialize;

use crate::analyzer::stats;
use crate::config::UtilizationFlagPolicy;
use crate::error::AppError;

/// Drapeau d'utilisation d'une unité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UtilizationFlag {
    Underused,
    Optimal,
    Overused,
}

impl UtilizationFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            UtilizationFlag::Underused => "Underused",
            UtilizationFlag::Optimal => "Optimal",
            UtilizationFlag::Overused => "Overused",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationRecord {
    pub equipment_id: String,
    pub utilization_pct: f64,
    pub flag: UtilizationFlag,
}

/// utilization_pct = usage / entitled × 100.
/// Un entitlement non strictement positif est une erreur — jamais de division
/// par zéro silencieuse.
pub fn utilization_pct(usage_hours: f64, entitled_hours: f64) -> Result<f64, AppError> {
    if entitled_hours <= 0.0 || !entitled_hours.is_finite() {
        return Err(AppError::DegenerateModel(format!(
            "entitlement non positif ({entitled_hours}) — utilisation incalculable"
        )));
    }
    Ok(usage_hours / entitled_hours * 100.0)
}

/// Seuils fixes : > 120 % Overused, < 80 % Underused, bornes incluses Optimal.
fn fixed_threshold_flag(pct: f64) -> UtilizationFlag {
    if pct > 120.0 {
        UtilizationFlag::Overused
    } else if pct < 80.0 {
        UtilizationFlag::Underused
    } else {
        UtilizationFlag::Optimal
    }
}

/// Affecte les drapeaux sur l'ensemble du parc selon la politique choisie.
///
/// `StandardScore` est relatif à la distribution du parc : z > 1 Overused,
/// z < -1 Underused. Écart-type nul → tout le parc Optimal.
pub fn assign_flags(pcts: &[f64], policy: UtilizationFlagPolicy) -> Vec<UtilizationFlag> {
    match policy {
        UtilizationFlagPolicy::FixedThreshold => {
            pcts.iter().map(|&p| fixed_threshold_flag(p)).collect()
        }
        UtilizationFlagPolicy::StandardScore => {
            let m = stats::mean(pcts);
            let sd = stats::std_dev(pcts);
            if sd < 1e-10 {
                return vec![UtilizationFlag::Optimal; pcts.len()];
            }
            pcts.iter()
                .map(|&p| {
                    let z = (p - m) / sd;
                    if z > 1.0 {
                        UtilizationFlag::Overused
                    } else if z < -1.0 {
                        UtilizationFlag::Underused
                    } else {
                        UtilizationFlag::Optimal
                    }
                })
                .collect()
        }
    }
}

/// Calcule utilisation + drapeau pour chaque unité du parc.
pub fn compute(
    ids: &[String],
    usage: &[f64],
    entitled: &[f64],
    policy: UtilizationFlagPolicy,
) -> Result<Vec<UtilizationRecord>, AppError> {
    let pcts: Vec<f64> = usage
        .iter()
        .zip(entitled.iter())
        .map(|(&u, &e)| utilization_pct(u, e))
        .collect::<Result<_, _>>()?;

    let flags = assign_flags(&pcts, policy);

    Ok(ids
        .iter()
        .zip(pcts.iter().zip(flags))
        .map(|(id, (&pct, flag))| UtilizationRecord {
            equipment_id: id.clone(),
            utilization_pct: pct,
            flag,
        })
        .collect())
}
