//! Noise-contrastive estimation loss for skip-gram pairs.
//!
//! For each (target, context) pair we score the true context class and `K`
//! sampled noise classes against the target's embedding:
//!
//! ```text
//! logit(c) = e · W[c] + b[c] - ln(K · Q(c))
//! ```
//!
//! and train a binary classifier to say "true" for the context class and
//! "noise" for each sample. The `ln(K · Q(c))` term corrects for how often the
//! noise distribution proposes `c`, which makes this a stand-in for softmax
//! cross-entropy over the whole vocabulary.
//!
//! Loss for one pair is the mean binary cross-entropy over its `K + 1` logits;
//! loss for a batch is the mean over pairs.

use std::collections::BTreeMap;

use ndarray::prelude::*;

use crate::error::{config_error, Error, Result};
use crate::noise::NegativeSampler;
use crate::real;
use crate::store::{EmbeddingStore, Tensor};
use crate::window::Pair;

/// `ln(1 + e^x)`, without overflowing for large `x`.
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// The logistic function `1 / (1 + e^-x)`, without overflowing for large `|x|`.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Binary cross-entropy of a logit against a label, `-ln σ(x)` for true
/// examples and `-ln(1 - σ(x))` for noise.
pub fn logistic_loss(x: f64, label: bool) -> f64 {
    if label {
        softplus(-x)
    } else {
        softplus(x)
    }
}

/// Gradient of the loss restricted to the rows it touches.
///
/// A row that isn't present has gradient exactly zero.
#[derive(Debug, Clone)]
pub struct SparseGradient {
    embedding_size: usize,
    input: BTreeMap<usize, Array1<real>>,
    output: BTreeMap<usize, Array1<real>>,
    bias: BTreeMap<usize, real>,
}

impl SparseGradient {
    pub fn new(embedding_size: usize) -> Self {
        SparseGradient {
            embedding_size,
            input: BTreeMap::new(),
            output: BTreeMap::new(),
            bias: BTreeMap::new(),
        }
    }

    fn input_entry(&mut self, id: usize) -> &mut Array1<real> {
        let d = self.embedding_size;
        self.input.entry(id).or_insert_with(|| Array1::zeros(d))
    }

    fn output_entry(&mut self, id: usize) -> &mut Array1<real> {
        let d = self.embedding_size;
        self.output.entry(id).or_insert_with(|| Array1::zeros(d))
    }

    pub fn input(&self, id: usize) -> Option<ArrayView1<'_, real>> {
        self.input.get(&id).map(|g| g.view())
    }

    pub fn output(&self, id: usize) -> Option<ArrayView1<'_, real>> {
        self.output.get(&id).map(|g| g.view())
    }

    pub fn bias(&self, id: usize) -> Option<real> {
        self.bias.get(&id).copied()
    }

    /// Rows of `tensor` with a (possibly zero) gradient entry, in increasing order.
    pub fn touched(&self, tensor: Tensor) -> Vec<usize> {
        match tensor {
            Tensor::Input => self.input.keys().copied().collect(),
            Tensor::Output => self.output.keys().copied().collect(),
            Tensor::Bias => self.bias.keys().copied().collect(),
        }
    }

    pub fn input_rows(&self) -> impl Iterator<Item = (usize, ArrayView1<'_, real>)> {
        self.input.iter().map(|(&id, g)| (id, g.view()))
    }

    pub fn output_rows(&self) -> impl Iterator<Item = (usize, ArrayView1<'_, real>)> {
        self.output.iter().map(|(&id, g)| (id, g.view()))
    }

    pub fn bias_entries(&self) -> impl Iterator<Item = (usize, real)> + '_ {
        self.bias.iter().map(|(&id, &g)| (id, g))
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty() && self.bias.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.input.values().all(|g| g.iter().all(|x| x.is_finite()))
            && self.output.values().all(|g| g.iter().all(|x| x.is_finite()))
            && self.bias.values().all(|x| x.is_finite())
    }

    /// Euclidean norm over every touched coordinate.
    pub fn norm(&self) -> f64 {
        let rows = self.input.values().chain(self.output.values());
        let sq: f64 = rows
            .flat_map(|g| g.iter())
            .chain(self.bias.values())
            .map(|&x| (x as f64) * (x as f64))
            .sum();
        sq.sqrt()
    }
}

/// The NCE loss with `num_sampled` negatives per positive pair.
#[derive(Debug, Clone, Copy)]
pub struct NceLoss {
    num_sampled: usize,
}

impl NceLoss {
    pub fn new(num_sampled: usize) -> Result<Self> {
        if num_sampled == 0 {
            return Err(config_error("num_negative_samples must be positive"));
        }
        Ok(NceLoss { num_sampled })
    }

    pub fn num_sampled(&self) -> usize {
        self.num_sampled
    }

    /// Draw `num_sampled` negatives for each of `num_pairs` pairs, laid out
    /// pair by pair.
    pub fn draw_negatives(&self, noise: &mut NegativeSampler, num_pairs: usize) -> Vec<usize> {
        noise.sample(num_pairs * self.num_sampled)
    }

    /// Mean loss over `pairs`. `negatives[i * K..(i + 1) * K]` are the noise
    /// classes for `pairs[i]`.
    pub fn loss(
        &self,
        store: &EmbeddingStore,
        noise: &NegativeSampler,
        pairs: &[Pair],
        negatives: &[usize],
    ) -> Result<real> {
        self.run(store, noise, pairs, negatives, None)
    }

    /// Mean loss and its gradient with respect to every parameter it touches.
    pub fn loss_and_gradient(
        &self,
        store: &EmbeddingStore,
        noise: &NegativeSampler,
        pairs: &[Pair],
        negatives: &[usize],
    ) -> Result<(real, SparseGradient)> {
        let mut grad = SparseGradient::new(store.embedding_size());
        let loss = self.run(store, noise, pairs, negatives, Some(&mut grad))?;
        Ok((loss, grad))
    }

    fn check_inputs(
        &self,
        store: &EmbeddingStore,
        noise: &NegativeSampler,
        pairs: &[Pair],
        negatives: &[usize],
    ) -> Result<()> {
        let v = store.vocab_size();
        if noise.vocab_size() != v {
            return Err(Error::InvalidArgument(format!(
                "noise distribution covers {} classes but the model has {v}",
                noise.vocab_size()
            )));
        }
        if negatives.len() != pairs.len() * self.num_sampled {
            return Err(Error::InvalidArgument(format!(
                "expected {} negatives for {} pairs, got {}",
                pairs.len() * self.num_sampled,
                pairs.len(),
                negatives.len()
            )));
        }
        let ids = pairs
            .iter()
            .flat_map(|p| [p.target, p.context])
            .chain(negatives.iter().copied());
        for id in ids {
            if id >= v {
                return Err(Error::InvalidArgument(format!(
                    "id {id} out of range for vocabulary of {v}"
                )));
            }
        }
        Ok(())
    }

    fn run(
        &self,
        store: &EmbeddingStore,
        noise: &NegativeSampler,
        pairs: &[Pair],
        negatives: &[usize],
        mut grad: Option<&mut SparseGradient>,
    ) -> Result<real> {
        self.check_inputs(store, noise, pairs, negatives)?;
        if pairs.is_empty() {
            return Ok(0.0);
        }

        let k = self.num_sampled;
        let scale = 1.0 / ((k + 1) * pairs.len()) as f64;
        let bias = store.bias();
        let mut total = 0.0f64;
        let mut d_embedding = Array1::<real>::zeros(store.embedding_size());

        for (pair, noise_ids) in pairs.iter().zip(negatives.chunks(k)) {
            let e = store.input_row(pair.target);
            d_embedding.fill(0.0);

            let classes = std::iter::once((pair.context, true))
                .chain(noise_ids.iter().map(|&c| (c, false)));
            for (class, label) in classes {
                let w = store.output_row(class);
                let logit = e.dot(&w) as f64 + bias[class] as f64
                    - noise.log_expected_count(class, k)?;
                total += logistic_loss(logit, label);

                if let Some(grad) = grad.as_deref_mut() {
                    // d(loss)/d(logit) = σ(logit) - label
                    let dz = if label { -sigmoid(-logit) } else { sigmoid(logit) };
                    let g = (dz * scale) as real;
                    d_embedding.scaled_add(g, &w);
                    grad.output_entry(class).scaled_add(g, &e);
                    *grad.bias.entry(class).or_insert(0.0) += g;
                }
            }

            if let Some(grad) = grad.as_deref_mut() {
                *grad.input_entry(pair.target) += &d_embedding;
            }
        }

        Ok((total * scale) as real)
    }
}
