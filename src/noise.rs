//! Negative sampling: drawing "noise" classes for the contrastive loss.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{config_error, Error, Result};

/// Which fixed distribution negatives are drawn from.
///
/// Both put more mass on low ids, which are the frequent words.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseDistribution {
    /// Zipfian: `Q(c) = ln((c + 2) / (c + 1)) / ln(V + 1)`. Needs nothing but V.
    LogUniform,
    /// Word counts raised to `power` (0.75 is the usual choice), normalized.
    Unigram { power: f64 },
}

impl Default for NoiseDistribution {
    fn default() -> Self {
        NoiseDistribution::LogUniform
    }
}

#[derive(Debug, Clone)]
enum Table {
    LogUniform {
        /// `ln(V + 1)`
        log_range: f64,
    },
    Unigram {
        probs: Vec<f64>,
        index: WeightedIndex<f64>,
    },
}

/// Draws negative class ids with replacement, independent of the true class.
///
/// A negative may coincide with the true class or with another negative.
/// The loss accepts that rather than resampling, so the probabilities
/// reported by [`NegativeSampler::probability`] are exactly the ones used.
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    vocab_size: usize,
    table: Table,
    rng: StdRng,
}

impl NegativeSampler {
    /// `counts` is only consulted for [`NoiseDistribution::Unigram`]; it must
    /// have one entry per id. A zero count is treated as one, so every id,
    /// UNK included, can be drawn and has a finite log-probability.
    pub fn new(
        distribution: NoiseDistribution,
        vocab_size: usize,
        counts: &[u64],
        seed: u64,
    ) -> Result<Self> {
        if vocab_size == 0 {
            return Err(config_error("vocabulary_size must be positive"));
        }
        let table = match distribution {
            NoiseDistribution::LogUniform => Table::LogUniform {
                log_range: ((vocab_size + 1) as f64).ln(),
            },
            NoiseDistribution::Unigram { power } => {
                if !(power.is_finite() && power >= 0.0) {
                    return Err(config_error(format!(
                        "unigram power must be a non-negative number, got {power}"
                    )));
                }
                if counts.len() != vocab_size {
                    return Err(config_error(format!(
                        "unigram noise needs {vocab_size} word counts, got {}",
                        counts.len()
                    )));
                }
                let weights: Vec<f64> = counts
                    .iter()
                    .map(|&c| (c.max(1) as f64).powf(power))
                    .collect();
                let total: f64 = weights.iter().sum();
                let index = WeightedIndex::new(&weights)
                    .map_err(|err| config_error(format!("unigram noise: {err}")))?;
                Table::Unigram {
                    probs: weights.iter().map(|w| w / total).collect(),
                    index,
                }
            }
        };
        Ok(NegativeSampler {
            vocab_size,
            table,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Draw one id.
    pub fn draw(&mut self) -> usize {
        match &self.table {
            Table::LogUniform { log_range } => {
                let u: f64 = self.rng.gen();
                let x = (u * log_range).exp().floor() as usize;
                x.saturating_sub(1).min(self.vocab_size - 1)
            }
            Table::Unigram { index, .. } => index.sample(&mut self.rng),
        }
    }

    /// Draw `k` ids, each in `0..vocab_size`.
    pub fn sample(&mut self, k: usize) -> Vec<usize> {
        (0..k).map(|_| self.draw()).collect()
    }

    fn check_id(&self, id: usize) -> Result<()> {
        if id >= self.vocab_size {
            return Err(Error::InvalidArgument(format!(
                "id {id} is out of range for vocabulary of {}",
                self.vocab_size
            )));
        }
        Ok(())
    }

    /// The probability `Q(id)` that a single draw returns `id`.
    pub fn probability(&self, id: usize) -> Result<f64> {
        self.check_id(id)?;
        Ok(self.log_probability(id).exp())
    }

    /// `ln Q(id)`, computed without going through `Q(id)` so it stays accurate
    /// for rare ids. `id` must be below `vocab_size`.
    fn log_probability(&self, id: usize) -> f64 {
        match &self.table {
            Table::LogUniform { log_range } => (1.0 / (id + 1) as f64).ln_1p().ln() - log_range.ln(),
            Table::Unigram { probs, .. } => probs[id].ln(),
        }
    }

    /// How many times `id` is expected to appear in `draws` draws.
    pub fn expected_count(&self, id: usize, draws: usize) -> Result<f64> {
        Ok(draws as f64 * self.probability(id)?)
    }

    /// `ln(expected_count(id, draws))`, the correction subtracted from each logit.
    pub fn log_expected_count(&self, id: usize, draws: usize) -> Result<f64> {
        self.check_id(id)?;
        Ok((draws as f64).ln() + self.log_probability(id))
    }
}
