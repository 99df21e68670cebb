//! Bagged decision-tree forest used for risk classification.

use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ForestConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::RiskLevel;

/// A trained model mapping feature rows to risk levels.
pub trait RiskModel: Send + Sync {
    fn classify(&self, features: &Array2<f64>) -> Vec<RiskLevel>;
}

/// Majority vote over decision trees fitted on bootstrap samples.
pub struct RandomForest {
    trees: Vec<DecisionTree<f64, usize>>,
}

impl RandomForest {
    pub fn fit(
        features: &Array2<f64>,
        labels: &[RiskLevel],
        config: &ForestConfig,
    ) -> Result<Self> {
        let n_rows = features.nrows();
        if n_rows == 0 || n_rows != labels.len() {
            return Err(AnalyticsError::ModelTraining(format!(
                "expected matching non-empty features and labels, got {} rows and {} labels",
                n_rows,
                labels.len()
            )));
        }

        let targets: Array1<usize> = labels.iter().map(|l| l.index()).collect();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_trees);

        for _ in 0..config.n_trees {
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let dataset = Dataset::new(
                features.select(Axis(0), &sample),
                targets.select(Axis(0), &sample),
            );
            let tree = DecisionTree::<f64, usize>::params()
                .max_depth(Some(config.max_depth))
                .fit(&dataset)
                .map_err(|e| AnalyticsError::ModelTraining(e.to_string()))?;
            trees.push(tree);
        }

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl RiskModel for RandomForest {
    fn classify(&self, features: &Array2<f64>) -> Vec<RiskLevel> {
        let mut votes = vec![[0usize; RiskLevel::COUNT]; features.nrows()];
        for tree in &self.trees {
            let predictions: Array1<usize> = tree.predict(features);
            for (row, &class) in predictions.iter().enumerate() {
                if class < RiskLevel::COUNT {
                    votes[row][class] += 1;
                }
            }
        }

        votes
            .iter()
            .map(|counts| {
                // Ties resolve to the lowest class index.
                let mut best = 0;
                for class in 1..RiskLevel::COUNT {
                    if counts[class] > counts[best] {
                        best = class;
                    }
                }
                RiskLevel::from_index(best).unwrap_or(RiskLevel::High)
            })
            .collect()
    }
}

/// Fraction of predictions that agree with the targets.
pub fn calculate_accuracy(predictions: &[RiskLevel], targets: &[RiskLevel]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets.iter())
        .filter(|(pred, actual)| pred == actual)
        .count() as f64
        / targets.len() as f64
}
