// Prédiction de churn par forêt aléatoire (bagging d'arbres linfa-trees).
// Label dérivé de l'historique de service ; le rapport reprend le format
// precision/recall/f1 par classe.

use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::AppError;

const N_TREES: usize = 25;
const MAX_DEPTH: usize = 10;
const TEST_FRACTION: f64 = 0.2;

/// Label de churn : 0 = client fidèle (aucun service consommé), 1 = à risque.
pub fn churn_label(service_history: &str) -> usize {
    if service_history.to_lowercase().contains("none") {
        0
    } else {
        1
    }
}

/// Métriques d'une classe sur le jeu de test.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetrics {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Rapport de classification, dans l'esprit d'un classification_report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub train_size: usize,
    pub test_size: usize,
}

/// Sortie complète : une prédiction par ligne d'entrée + le rapport.
#[derive(Debug, Clone)]
pub struct ChurnOutput {
    pub predictions: Vec<usize>,
    pub report: ChurnReport,
}

struct RandomForest {
    trees: Vec<DecisionTree<f64, usize>>,
}

impl RandomForest {
    /// Bagging : chaque arbre est ajusté sur un ré-échantillonnage avec remise.
    fn fit(features: &Array2<f64>, labels: &Array1<usize>, rng: &mut StdRng) -> Result<Self, AppError> {
        let n = features.nrows();
        let mut trees = Vec::with_capacity(N_TREES);
        for _ in 0..N_TREES {
            let picks: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let boot_x = features.select(ndarray::Axis(0), &picks);
            let boot_y = labels.select(ndarray::Axis(0), &picks);
            let dataset = Dataset::new(boot_x, boot_y);
            let tree = DecisionTree::params()
                .max_depth(Some(MAX_DEPTH))
                .fit(&dataset)
                .map_err(|e| AppError::Custom(format!("Ajustement de l'arbre impossible: {e}")))?;
            trees.push(tree);
        }
        Ok(RandomForest { trees })
    }

    /// Vote majoritaire. N_TREES impair, pas d'égalité possible en binaire.
    fn predict(&self, features: &Array2<f64>) -> Vec<usize> {
        let votes: Vec<Array1<usize>> = self
            .trees
            .iter()
            .map(|t| t.predict(features))
            .collect();
        (0..features.nrows())
            .map(|row| {
                let ones = votes.iter().filter(|v| v[row] == 1).count();
                usize::from(ones * 2 > N_TREES)
            })
            .collect()
    }
}

fn class_metrics(truth: &[usize], predicted: &[usize], label: usize) -> ClassMetrics {
    let tp = truth
        .iter()
        .zip(predicted)
        .filter(|(&t, &p)| t == label && p == label)
        .count() as f64;
    let fp = truth
        .iter()
        .zip(predicted)
        .filter(|(&t, &p)| t != label && p == label)
        .count() as f64;
    let fn_ = truth
        .iter()
        .zip(predicted)
        .filter(|(&t, &p)| t == label && p != label)
        .count() as f64;
    let support = truth.iter().filter(|&&t| t == label).count();

    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassMetrics {
        label,
        precision,
        recall,
        f1,
        support,
    }
}

/// Entraîne la forêt sur un découpage 80/20 et prédit le churn de toutes les
/// lignes fournies.
///
/// Dégénéré si moins de 10 lignes, si une seule classe est présente, ou si le
/// découpage laisse un jeu d'entraînement mono-classe.
pub fn predict_churn(
    features: &Array2<f64>,
    labels: &[usize],
    seed: u64,
) -> Result<ChurnOutput, AppError> {
    let n = features.nrows();
    if n != labels.len() {
        return Err(AppError::Custom(format!(
            "Dimensions incohérentes: {n} lignes de features, {} labels",
            labels.len()
        )));
    }
    if n < 10 {
        return Err(AppError::DegenerateModel(format!(
            "trop peu de lignes ({n}) pour le modèle de churn (minimum 10)"
        )));
    }
    let has_zero = labels.contains(&0);
    let has_one = labels.contains(&1);
    if !(has_zero && has_one) {
        return Err(AppError::DegenerateModel(
            "une seule classe de churn présente dans le parc".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);

    let test_n = ((n as f64 * TEST_FRACTION).round() as usize).max(1);
    let (test_idx, train_idx) = order.split_at(test_n);

    let train_labels: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
    if !(train_labels.contains(&0) && train_labels.contains(&1)) {
        return Err(AppError::DegenerateModel(
            "le jeu d'entraînement ne couvre pas les deux classes de churn".to_string(),
        ));
    }

    let train_x = features.select(ndarray::Axis(0), train_idx);
    let train_y = Array1::from_vec(train_labels);
    let forest = RandomForest::fit(&train_x, &train_y, &mut rng)?;

    let predictions = forest.predict(features);

    let test_truth: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();
    let test_pred: Vec<usize> = test_idx.iter().map(|&i| predictions[i]).collect();
    let correct = test_truth
        .iter()
        .zip(&test_pred)
        .filter(|(t, p)| t == p)
        .count();

    let report = ChurnReport {
        classes: vec![
            class_metrics(&test_truth, &test_pred, 0),
            class_metrics(&test_truth, &test_pred, 1),
        ],
        accuracy: correct as f64 / test_truth.len() as f64,
        train_size: train_idx.len(),
        test_size: test_idx.len(),
    };

    Ok(ChurnOutput {
        predictions,
        report,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_churn_label_from_history() {
        assert_eq!(churn_label("None"), 0);
        assert_eq!(churn_label("none reported"), 0);
        assert_eq!(churn_label("NONE"), 0);
        assert_eq!(churn_label("Pump failure 2023"), 1);
        assert_eq!(churn_label("Routine maintenance"), 1);
        assert_eq!(churn_label(""), 1);
    }

    /// Parc synthétique bien séparé : classe 0 à faible usage, classe 1 à fort.
    fn separable_fleet() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            let jitter = (i % 4) as f64 * 50.0;
            rows.extend_from_slice(&[2000.0 + jitter, 8000.0, 25.0 + jitter / 100.0]);
            labels.push(0);
        }
        for i in 0..12 {
            let jitter = (i % 4) as f64 * 50.0;
            rows.extend_from_slice(&[11_000.0 + jitter, 8000.0, 137.0 + jitter / 100.0]);
            labels.push(1);
        }
        (Array2::from_shape_vec((24, 3), rows).unwrap(), labels)
    }

    #[test]
    fn test_separable_classes_learned() {
        let (features, labels) = separable_fleet();
        let out = predict_churn(&features, &labels, 42).unwrap();
        assert_eq!(out.predictions.len(), 24);
        assert_eq!(out.report.train_size + out.report.test_size, 24);
        assert_eq!(out.report.test_size, 5);
        // Classes parfaitement séparées : la forêt doit être exacte
        assert!((out.report.accuracy - 1.0).abs() < 1e-9, "Accuracy: {}", out.report.accuracy);
        assert_eq!(out.predictions, labels);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (features, labels) = separable_fleet();
        let a = predict_churn(&features, &labels, 7).unwrap();
        let b = predict_churn(&features, &labels, 7).unwrap();
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.report.accuracy, b.report.accuracy);
    }

    #[test]
    fn test_single_class_degenerate() {
        let features = Array2::from_elem((12, 3), 1.0);
        let labels = vec![1usize; 12];
        assert!(matches!(
            predict_churn(&features, &labels, 42),
            Err(AppError::DegenerateModel(_))
        ));
    }

    #[test]
    fn test_too_few_rows_degenerate() {
        let features = Array2::from_elem((6, 3), 1.0);
        let labels = vec![0, 1, 0, 1, 0, 1];
        assert!(matches!(
            predict_churn(&features, &labels, 42),
            Err(AppError::DegenerateModel(_))
        ));
    }

    #[test]
    fn test_report_supports_sum_to_test_size() {
        let (features, labels) = separable_fleet();
        let out = predict_churn(&features, &labels, 42).unwrap();
        let total: usize = out.report.classes.iter().map(|c| c.support).sum();
        assert_eq!(total, out.report.test_size);
    }
}
