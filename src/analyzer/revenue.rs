// Projection de revenus pilotée par l'entitlement — purement déterministe,
// aucun ajustement de modèle.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueForecast {
    pub equipment_id: String,
    pub forecasted_annual_usage: f64,
    pub annual_revenue: f64,
    pub total_forecast_revenue: f64,
}

/// forecasted_annual_usage = entitled × utilisation / 100
/// annual_revenue = forecasted_annual_usage × revenue_per_hour
/// total = annual_revenue × horizon (années)
pub fn forecast_unit(
    entitled_hours: f64,
    utilization_pct: f64,
    revenue_per_hour: f64,
    horizon_years: u32,
) -> (f64, f64, f64) {
    let forecasted_annual_usage = entitled_hours * utilization_pct / 100.0;
    let annual_revenue = forecasted_annual_usage * revenue_per_hour;
    let total = annual_revenue * horizon_years as f64;
    (forecasted_annual_usage, annual_revenue, total)
}

/// Projection pour chaque unité du parc.
pub fn forecast(
    ids: &[String],
    entitled: &[f64],
    utilization_pct: &[f64],
    revenue_per_hour: f64,
    horizon_years: u32,
) -> Vec<RevenueForecast> {
    ids.iter()
        .zip(entitled.iter().zip(utilization_pct))
        .map(|(id, (&e, &u))| {
            let (usage, annual, total) = forecast_unit(e, u, revenue_per_hour, horizon_years);
            RevenueForecast {
                equipment_id: id.clone(),
                forecasted_annual_usage: usage,
                annual_revenue: annual,
                total_forecast_revenue: total,
            }
        })
        .collect()
}
