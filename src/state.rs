use std::sync::Mutex;

use crate::analyzer::fleet::{self, FleetAnalysis};
use crate::config::AnalysisConfig;
use crate::error::AppError;
use crate::parser::types::EquipmentRecord;

/// Session en cours : la table du parc chargée et, le cas échéant, la dernière
/// analyse calculée dessus.
pub struct FleetSession {
    pub records: Vec<EquipmentRecord>,
    pub analysis: Option<FleetAnalysis>,
}

/// État partagé de l'application. Tout cache dérivé vit dans la session et
/// meurt avec elle : un nouveau chargement invalide tout.
pub struct SessionState {
    session: Mutex<Option<FleetSession>>,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            session: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<FleetSession>>, AppError> {
        self.session
            .lock()
            .map_err(|e| AppError::Custom(format!("Mutex poisoned: {e}")))
    }

    /// Remplace la table du parc. Toute analyse antérieure est invalidée.
    pub fn load_fleet(&self, records: Vec<EquipmentRecord>) -> Result<(), AppError> {
        let mut guard = self.lock()?;
        *guard = Some(FleetSession {
            records,
            analysis: None,
        });
        Ok(())
    }

    /// Lance la passe d'analyse complète sur le parc chargé et met le résultat
    /// en cache dans la session.
    pub fn analyze(&self, config: &AnalysisConfig) -> Result<FleetAnalysis, AppError> {
        let mut guard = self.lock()?;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::Custom("Aucun parc chargé".to_string()))?;
        let analysis = fleet::run_analysis(&session.records, config)?;
        session.analysis = Some(analysis.clone());
        Ok(analysis)
    }

    /// Dernière analyse en cache, si la session en porte une.
    pub fn cached_analysis(&self) -> Result<Option<FleetAnalysis>, AppError> {
        let guard = self.lock()?;
        Ok(guard.as_ref().and_then(|s| s.analysis.clone()))
    }

    /// Vide entièrement la session.
    pub fn clear(&self) -> Result<(), AppError> {
        let mut guard = self.lock()?;
        *guard = None;
        Ok(())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BenchmarkStatistic, EntitlementMethod};

    fn fleet() -> Vec<EquipmentRecord> {
        vec![
            EquipmentRecord::new("101", "Lyon", 5200.0, "Regular"),
            EquipmentRecord::new("102", "Lyon", 11_000.0, "Heavy"),
            EquipmentRecord::new("103", "Lyon", 8700.0, "Moderate"),
            EquipmentRecord::new("104", "Lyon", 7600.0, "Light"),
        ]
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            entitlement_method: EntitlementMethod::PeerBenchmark,
            benchmark_statistic: BenchmarkStatistic::Median,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_analyze_requires_loaded_fleet() {
        let state = SessionState::new();
        assert!(state.analyze(&config()).is_err());
    }

    #[test]
    fn test_analysis_cached_after_run() {
        let state = SessionState::new();
        state.load_fleet(fleet()).unwrap();
        assert!(state.cached_analysis().unwrap().is_none());

        let analysis = state.analyze(&config()).unwrap();
        assert_eq!(analysis.rows.len(), 4);

        let cached = state.cached_analysis().unwrap().expect("cache attendu");
        assert_eq!(cached.rows.len(), 4);
    }

    #[test]
    fn test_reload_invalidates_cache() {
        let state = SessionState::new();
        state.load_fleet(fleet()).unwrap();
        state.analyze(&config()).unwrap();

        // Nouveau chargement : le cache dérivé doit disparaître
        state
            .load_fleet(vec![EquipmentRecord::new("201", "Nice", 3000.0, "None")])
            .unwrap();
        assert!(state.cached_analysis().unwrap().is_none());
    }

    #[test]
    fn test_clear_empties_session() {
        let state = SessionState::new();
        state.load_fleet(fleet()).unwrap();
        state.clear().unwrap();
        assert!(state.analyze(&config()).is_err());
    }
}
