// Drapeau needs_maintenance — seuil constant ou percentile du parc, les deux
// politiques observées dans l'historique du produit.

use crate::analyzer::stats;
use crate::config::MaintenanceThreshold;

/// Seuil effectif en heures pour le parc donné.
pub fn maintenance_cutoff(usage_hours: &[f64], policy: MaintenanceThreshold) -> f64 {
    match policy {
        MaintenanceThreshold::FixedHours(hours) => hours,
        MaintenanceThreshold::UsagePercentile(p) => stats::percentile(usage_hours, p),
    }
}

/// needs_maintenance = usage strictement supérieur au seuil.
pub fn flag_maintenance(usage_hours: &[f64], policy: MaintenanceThreshold) -> Vec<bool> {
    let cutoff = maintenance_cutoff(usage_hours, policy);
    usage_hours.iter().map(|&u| u > cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_hours_cutoff() {
        let usage = [5000.0, 12_000.0, 9000.0];
        let flags = flag_maintenance(&usage, MaintenanceThreshold::FixedHours(10_000.0));
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_fixed_hours_boundary_not_flagged() {
        // Strictement supérieur : 10 000 exactement n'est pas signalé
        let flags = flag_maintenance(&[10_000.0], MaintenanceThreshold::FixedHours(10_000.0));
        assert_eq!(flags, vec![false]);
    }

    #[test]
    fn test_percentile_cutoff() {
        let usage: Vec<f64> = (1..=10).map(|x| x as f64 * 1000.0).collect();
        let cutoff = maintenance_cutoff(&usage, MaintenanceThreshold::UsagePercentile(90.0));
        // percentile interpolé : rank 8.1 → 9100
        assert!((cutoff - 9100.0).abs() < 1e-9);
        let flags = flag_maintenance(&usage, MaintenanceThreshold::UsagePercentile(90.0));
        assert_eq!(flags.iter().filter(|&&f| f).count(), 1);
        assert!(flags[9], "Seule l'unité à 10 000 h dépasse P90");
    }
}
