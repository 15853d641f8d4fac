//! Plain SGD over the rows a batch touched.

use crate::error::{config_error, Result};
use crate::nce::SparseGradient;
use crate::real;
use crate::store::EmbeddingStore;

/// Plain gradient descent with a fixed learning rate.
///
/// Only the rows present in the gradient are visited, so a step costs time
/// proportional to the batch, not to the vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    learning_rate: real,
}

impl Sgd {
    pub fn new(learning_rate: real) -> Result<Self> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(config_error(format!(
                "learning_rate must be a positive number, got {learning_rate}"
            )));
        }
        Ok(Sgd { learning_rate })
    }

    pub fn learning_rate(&self) -> real {
        self.learning_rate
    }

    /// `param -= learning_rate * gradient` for every touched coordinate.
    ///
    /// Takes the store by `&mut`, so nothing can read it until every row of
    /// the update has landed.
    pub fn step(&self, store: &mut EmbeddingStore, grad: &SparseGradient) {
        let rate = self.learning_rate;
        for (id, g) in grad.input_rows() {
            store.input_row_mut(id).scaled_add(-rate, &g);
        }
        for (id, g) in grad.output_rows() {
            store.output_row_mut(id).scaled_add(-rate, &g);
        }
        for (id, g) in grad.bias_entries() {
            *store.bias_mut(id) -= rate * g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nce::NceLoss;
    use crate::noise::{NegativeSampler, NoiseDistribution};
    use crate::window::Pair;
    use ndarray::prelude::*;

    #[test]
    fn rejects_bad_rates() {
        assert!(Sgd::new(0.0).is_err());
        assert!(Sgd::new(-1.0).is_err());
        assert!(Sgd::new(real::NAN).is_err());
        assert!(Sgd::new(0.5).is_ok());
    }

    #[test]
    fn update_law() {
        let store = EmbeddingStore::new(12, 5, 3).unwrap();
        let noise = NegativeSampler::new(NoiseDistribution::LogUniform, 12, &[], 1).unwrap();
        let nce = NceLoss::new(3).unwrap();
        let pairs = vec![Pair { target: 2, context: 7 }, Pair { target: 8, context: 1 }];
        let negatives = vec![0, 0, 4, 1, 9, 3];
        let (_, grad) = nce.loss_and_gradient(&store, &noise, &pairs, &negatives).unwrap();

        let sgd = Sgd::new(0.75).unwrap();
        let mut updated = store.clone();
        sgd.step(&mut updated, &grad);

        for id in 0..12 {
            let g_in = grad.input(id).map(|g| g.to_owned()).unwrap_or_else(|| Array1::zeros(5));
            let g_out = grad.output(id).map(|g| g.to_owned()).unwrap_or_else(|| Array1::zeros(5));
            for c in 0..5 {
                let expected = store.input()[[id, c]] - 0.75 * g_in[c];
                assert!((updated.input()[[id, c]] - expected).abs() <= 1e-6);
                let expected = store.output()[[id, c]] - 0.75 * g_out[c];
                assert!((updated.output()[[id, c]] - expected).abs() <= 1e-6);
            }
            let expected = store.bias()[id] - 0.75 * grad.bias(id).unwrap_or(0.0);
            assert!((updated.bias()[id] - expected).abs() <= 1e-6);
        }

        // Untouched rows come through bit-for-bit.
        assert_eq!(updated.input_row(5), store.input_row(5));
        assert_eq!(updated.output_row(11), store.output_row(11));
    }

    #[test]
    fn descending_lowers_the_loss() {
        let mut store = EmbeddingStore::new(30, 10, 8).unwrap();
        let noise = NegativeSampler::new(NoiseDistribution::LogUniform, 30, &[], 2).unwrap();
        let nce = NceLoss::new(4).unwrap();
        let pairs = vec![Pair { target: 3, context: 4 }, Pair { target: 4, context: 3 }];
        let negatives = vec![0, 1, 2, 9, 0, 5, 6, 7];
        let sgd = Sgd::new(0.5).unwrap();

        let before = nce.loss(&store, &noise, &pairs, &negatives).unwrap();
        for _ in 0..20 {
            let (_, grad) = nce.loss_and_gradient(&store, &noise, &pairs, &negatives).unwrap();
            sgd.step(&mut store, &grad);
        }
        let after = nce.loss(&store, &noise, &pairs, &negatives).unwrap();
        assert!(after < before, "loss went from {before} to {after}");
    }
}
