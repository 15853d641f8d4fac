//! Training options, checked once before anything is built.

use serde::{Deserialize, Serialize};

use crate::error::{config_error, Error, Result};
use crate::noise::NoiseDistribution;
use crate::real;
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// D, the length of each word vector.
    pub embedding_size: usize,
    /// V. Must equal the size of the vocabulary the stream was encoded with.
    pub vocabulary_size: usize,
    /// How many words to consider left and right of the center word.
    pub skip_window: usize,
    /// How many context words to use per center word.
    pub num_skips: usize,
    pub batch_size: usize,
    /// K, negatives drawn per (target, context) pair.
    pub num_negative_samples: usize,
    pub learning_rate: real,
    pub total_steps: usize,
    /// Report the loss every this many steps; 0 never reports.
    pub display_step: usize,
    /// Show nearest neighbors of `eval_query_words` every this many steps
    /// (and at step 1); 0 only evaluates at step 1.
    pub eval_step: usize,
    pub eval_query_words: Vec<String>,
    pub seed: u64,
    pub noise: NoiseDistribution,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            embedding_size: 128,
            vocabulary_size: 50_000,
            skip_window: 1,
            num_skips: 2,
            batch_size: 128,
            num_negative_samples: 64,
            learning_rate: 1.0,
            total_steps: 100_001,
            display_step: 2000,
            eval_step: 10_000,
            eval_query_words: vec![],
            seed: 1,
            noise: NoiseDistribution::LogUniform,
        }
    }
}

/// A configuration that passed [`TrainingConfig::validate`], with the
/// evaluation words resolved to ids.
#[derive(Debug, Clone)]
pub struct Settings {
    config: TrainingConfig,
    eval_query_ids: Vec<usize>,
}

impl Settings {
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// `(word, id)` for each evaluation query, in configuration order.
    pub fn eval_queries(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.config
            .eval_query_words
            .iter()
            .map(String::as_str)
            .zip(self.eval_query_ids.iter().copied())
    }

    pub fn eval_query_ids(&self) -> &[usize] {
        &self.eval_query_ids
    }
}

impl TrainingConfig {
    /// Check every option against each other, the vocabulary, and the length
    /// of the token stream.
    pub fn validate(&self, vocabulary: &Vocabulary, stream_len: usize) -> Result<Settings> {
        if self.embedding_size == 0 {
            return Err(config_error("embedding_size must be positive"));
        }
        if self.vocabulary_size == 0 {
            return Err(config_error("vocabulary_size must be positive"));
        }
        if self.vocabulary_size != vocabulary.len() {
            return Err(config_error(format!(
                "vocabulary_size is {} but the vocabulary has {} words",
                self.vocabulary_size,
                vocabulary.len()
            )));
        }
        if self.skip_window == 0 {
            return Err(config_error("skip_window must be positive"));
        }
        if self.num_skips == 0 || self.num_skips > 2 * self.skip_window {
            return Err(config_error(format!(
                "num_skips must be between 1 and 2 * skip_window = {}, got {}",
                2 * self.skip_window,
                self.num_skips
            )));
        }
        if self.batch_size == 0 || self.batch_size % self.num_skips != 0 {
            return Err(config_error(format!(
                "batch_size ({}) must be a positive multiple of num_skips ({})",
                self.batch_size, self.num_skips
            )));
        }
        if self.num_negative_samples == 0 {
            return Err(config_error("num_negative_samples must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(config_error(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        let span = 2 * self.skip_window + 1;
        if stream_len < span {
            return Err(config_error(format!(
                "token stream has {stream_len} tokens, fewer than the window span {span}"
            )));
        }
        if let NoiseDistribution::Unigram { power } = self.noise {
            if !(power.is_finite() && power >= 0.0) {
                return Err(config_error(format!(
                    "unigram power must be a non-negative number, got {power}"
                )));
            }
        }

        let eval_query_ids = self
            .eval_query_words
            .iter()
            .map(|w| vocabulary.id(w).ok_or_else(|| Error::UnknownWord(w.clone())))
            .collect::<Result<Vec<usize>>>()?;

        Ok(Settings {
            config: self.clone(),
            eval_query_ids,
        })
    }
}
