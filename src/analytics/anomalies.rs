// Détection d'anomalies d'utilisation par Isolation Forest.
// Implémentation maison sur ndarray : les partitions aléatoires isolent les
// points atypiques en peu de coupes, d'où un chemin moyen court.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::AppError;

/// Constante d'Euler-Mascheroni, pour la longueur de chemin moyenne d'un BST.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Étiquette binaire par enregistrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyLabel {
    Normal,
    Anomaly,
}

impl AnomalyLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyLabel::Normal => "Normal",
            AnomalyLabel::Anomaly => "Anomaly",
        }
    }
}

/// Paramètres de la forêt d'isolation. La graine est obligatoire : les
/// partitions sont aléatoires, les tests exigent la reproductibilité.
#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl IsolationForestParams {
    pub fn new(contamination: f64, seed: u64) -> Self {
        IsolationForestParams {
            n_trees: 100,
            max_samples: 256,
            contamination,
            seed,
        }
    }
}

enum IsoNode {
    Split {
        dim: usize,
        value: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
    Leaf {
        size: usize,
    },
}

/// Longueur moyenne de recherche infructueuse dans un BST de n nœuds.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    let harmonic = (n - 1.0).ln() + EULER_GAMMA;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}

fn build_tree(
    data: &Array2<f64>,
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> IsoNode {
    if depth >= height_limit || indices.len() <= 1 {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    // Dimensions encore séparables (min < max) sur ce sous-ensemble
    let n_dims = data.ncols();
    let splittable: Vec<(usize, f64, f64)> = (0..n_dims)
        .filter_map(|d| {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &i in indices {
                let v = data[[i, d]];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi > lo {
                Some((d, lo, hi))
            } else {
                None
            }
        })
        .collect();

    if splittable.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    let (dim, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let value = rng.gen_range(lo..hi);

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| data[[i, dim]] < value);

    IsoNode::Split {
        dim,
        value,
        left: Box::new(build_tree(data, &left_idx, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, &right_idx, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &IsoNode, data: &Array2<f64>, row: usize, depth: usize) -> f64 {
    match node {
        IsoNode::Leaf { size } => depth as f64 + average_path_length(*size),
        IsoNode::Split {
            dim,
            value,
            left,
            right,
        } => {
            if data[[row, *dim]] < *value {
                path_length(left, data, row, depth + 1)
            } else {
                path_length(right, data, row, depth + 1)
            }
        }
    }
}

/// Score d'anomalie par enregistrement : s = 2^(−E[h]/c(n)), dans (0, 1),
/// proche de 1 = isolé rapidement = anormal.
pub fn anomaly_scores(data: &Array2<f64>, params: &IsolationForestParams) -> Result<Vec<f64>, AppError> {
    let n = data.nrows();
    if n < 8 {
        return Err(AppError::DegenerateModel(format!(
            "trop peu de lignes ({n}) pour la forêt d'isolation (minimum 8)"
        )));
    }
    if data.ncols() == 0 {
        return Err(AppError::DegenerateModel(
            "aucune colonne numérique pour la détection d'anomalies".to_string(),
        ));
    }

    let sample_size = params.max_samples.min(n);
    let height_limit = (sample_size as f64).log2().ceil() as usize;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut trees = Vec::with_capacity(params.n_trees);
    let mut all_indices: Vec<usize> = (0..n).collect();
    for _ in 0..params.n_trees {
        all_indices.shuffle(&mut rng);
        let sample = &all_indices[..sample_size];
        trees.push(build_tree(data, sample, 0, height_limit, &mut rng));
    }

    let c_norm = average_path_length(sample_size);
    let scores = (0..n)
        .map(|row| {
            let avg: f64 = trees
                .iter()
                .map(|t| path_length(t, data, row, 0))
                .sum::<f64>()
                / trees.len() as f64;
            2f64.powf(-avg / c_norm)
        })
        .collect();

    Ok(scores)
}

/// Étiquette la fraction `contamination` du parc la plus anormale.
/// Départage déterministe : score décroissant puis index croissant.
pub fn detect_anomalies(
    data: &Array2<f64>,
    params: &IsolationForestParams,
) -> Result<Vec<AnomalyLabel>, AppError> {
    let scores = anomaly_scores(data, params)?;
    let n = scores.len();

    let k = (params.contamination * n as f64).round() as usize;
    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut labels = vec![AnomalyLabel::Normal; n];
    for &idx in ranked.iter().take(k) {
        labels[idx] = AnomalyLabel::Anomaly;
    }
    Ok(labels)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Parc d'utilisations serrées autour de 100 % + un extrême.
    fn outlier_data() -> Array2<f64> {
        let mut values: Vec<f64> = (0..19).map(|i| 95.0 + (i % 5) as f64).collect();
        values.push(400.0);
        Array2::from_shape_vec((20, 1), values).unwrap()
    }

    #[test]
    fn test_obvious_outlier_detected() {
        let params = IsolationForestParams::new(0.1, 42);
        let labels = detect_anomalies(&outlier_data(), &params).unwrap();
        assert_eq!(labels[19], AnomalyLabel::Anomaly, "L'extrême à 400 % doit être signalé");
        // contamination 0.1 × 20 lignes = 2 anomalies exactement
        let count = labels.iter().filter(|&&l| l == AnomalyLabel::Anomaly).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let data = outlier_data();
        let params = IsolationForestParams::new(0.1, 7);
        let a = detect_anomalies(&data, &params).unwrap();
        let b = detect_anomalies(&data, &params).unwrap();
        assert_eq!(a, b, "Même graine → mêmes étiquettes");
    }

    #[test]
    fn test_outlier_has_top_score() {
        let data = outlier_data();
        let params = IsolationForestParams::new(0.1, 42);
        let scores = anomaly_scores(&data, &params).unwrap();
        let max_idx = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(max_idx, 19);
        for s in scores {
            assert!(s > 0.0 && s < 1.0, "Score hors (0, 1): {s}");
        }
    }

    #[test]
    fn test_too_few_rows_degenerate() {
        let data = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let params = IsolationForestParams::new(0.1, 42);
        assert!(matches!(
            detect_anomalies(&data, &params),
            Err(AppError::DegenerateModel(_))
        ));
    }

    #[test]
    fn test_multivariate_features() {
        // Télémétrie jointe : l'extrême est atypique sur les deux dimensions
        let mut values = Vec::new();
        for i in 0..15 {
            values.push(100.0 + (i % 3) as f64);
            values.push(70.0 + (i % 4) as f64);
        }
        values.push(250.0);
        values.push(160.0);
        let data = Array2::from_shape_vec((16, 2), values).unwrap();
        let params = IsolationForestParams::new(0.1, 42);
        let labels = detect_anomalies(&data, &params).unwrap();
        assert_eq!(labels[15], AnomalyLabel::Anomaly);
    }

    #[test]
    fn test_constant_column_all_leaves() {
        // Colonne constante : aucune coupe possible, scores égaux, k étiquettes
        // prises par index croissant (déterminisme du départage)
        let data = Array2::from_shape_vec((10, 1), vec![5.0; 10]).unwrap();
        let params = IsolationForestParams::new(0.1, 42);
        let labels = detect_anomalies(&data, &params).unwrap();
        let count = labels.iter().filter(|&&l| l == AnomalyLabel::Anomaly).count();
        assert_eq!(count, 1);
        assert_eq!(labels[0], AnomalyLabel::Anomaly);
    }
}
