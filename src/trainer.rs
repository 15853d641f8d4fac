//! The training loop.

use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{config_error, Error, Result};
use crate::eval::Evaluator;
use crate::nce::NceLoss;
use crate::noise::NegativeSampler;
use crate::optim::Sgd;
use crate::real;
use crate::store::EmbeddingStore;
use crate::vocab::Vocabulary;
use crate::window::WindowSampler;

/// Number of neighbors listed for each evaluation word.
pub const EVAL_TOP_K: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// Built, no steps taken.
    Idle,
    Running,
    /// Computing nearest neighbors between steps. Parameters are not changing.
    Evaluating,
    /// The step budget ran out or a step failed.
    Done,
}

/// A progress report from [`Trainer::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Loss {
        step: usize,
        /// Loss on the most recent batch.
        loss: real,
        /// Mean batch loss since the previous loss report.
        average_loss: real,
    },
    Neighbors {
        step: usize,
        query_word: String,
        /// Closest words first; the query itself is never listed.
        neighbors: Vec<String>,
    },
}

impl Diagnostic {
    /// Log this record at `info` level.
    pub fn log(&self) {
        match self {
            Diagnostic::Loss {
                step,
                loss,
                average_loss,
            } => info!(step, loss, average_loss, "loss"),
            Diagnostic::Neighbors {
                step,
                query_word,
                neighbors,
            } => info!(
                step,
                query = %query_word,
                neighbors = %neighbors.join(" "),
                "nearest"
            ),
        }
    }
}

/// Owns all training state and advances it one batch at a time.
///
/// Each step samples a batch, draws negatives, computes the loss and its
/// gradient, and applies the update. Steps never overlap: the next batch is
/// scored against the parameters the previous step left behind.
pub struct Trainer<'a> {
    settings: Settings,
    vocabulary: &'a Vocabulary,
    windows: WindowSampler<'a>,
    noise: NegativeSampler,
    store: EmbeddingStore,
    loss: NceLoss,
    sgd: Sgd,
    state: TrainerState,
    /// Steps completed so far.
    step: usize,
    loss_since_report: f64,
    steps_since_report: usize,
}

impl<'a> Trainer<'a> {
    /// Set up training over `tokens` with freshly initialized parameters.
    pub fn new(settings: Settings, vocabulary: &'a Vocabulary, tokens: &'a [usize]) -> Result<Self> {
        let config = settings.config();
        let mut seeds = StdRng::seed_from_u64(config.seed);
        let store = EmbeddingStore::new(config.vocabulary_size, config.embedding_size, seeds.gen())?;
        Self::build(settings, vocabulary, tokens, store, &mut seeds)
    }

    /// Like [`Trainer::new`], but start from existing parameters.
    pub fn with_store(
        settings: Settings,
        vocabulary: &'a Vocabulary,
        tokens: &'a [usize],
        store: EmbeddingStore,
    ) -> Result<Self> {
        let config = settings.config();
        if store.vocab_size() != config.vocabulary_size
            || store.embedding_size() != config.embedding_size
        {
            return Err(config_error(format!(
                "parameters are {}×{} but the configuration says {}×{}",
                store.vocab_size(),
                store.embedding_size(),
                config.vocabulary_size,
                config.embedding_size
            )));
        }
        let mut seeds = StdRng::seed_from_u64(config.seed);
        let _: u64 = seeds.gen(); // the initialization seed, unused here
        Self::build(settings, vocabulary, tokens, store, &mut seeds)
    }

    fn build(
        settings: Settings,
        vocabulary: &'a Vocabulary,
        tokens: &'a [usize],
        store: EmbeddingStore,
        seeds: &mut StdRng,
    ) -> Result<Self> {
        let config = settings.config();
        if vocabulary.len() != config.vocabulary_size {
            return Err(config_error(format!(
                "vocabulary_size is {} but the vocabulary has {} words",
                config.vocabulary_size,
                vocabulary.len()
            )));
        }
        if let Some(pos) = tokens.iter().position(|&t| t >= config.vocabulary_size) {
            return Err(Error::InvalidArgument(format!(
                "token {} at position {pos} is out of range for vocabulary of {}",
                tokens[pos], config.vocabulary_size
            )));
        }

        let windows = WindowSampler::new(
            tokens,
            config.batch_size,
            config.num_skips,
            config.skip_window,
            seeds.gen(),
        )?;
        let noise = NegativeSampler::new(
            config.noise,
            config.vocabulary_size,
            vocabulary.counts(),
            seeds.gen(),
        )?;
        let loss = NceLoss::new(config.num_negative_samples)?;
        let sgd = Sgd::new(config.learning_rate)?;

        info!(
            vocabulary = config.vocabulary_size,
            tokens = tokens.len(),
            embedding_size = config.embedding_size,
            steps = config.total_steps,
            "training set up"
        );

        Ok(Trainer {
            settings,
            vocabulary,
            windows,
            noise,
            store,
            loss,
            sgd,
            state: TrainerState::Idle,
            step: 0,
            loss_since_report: 0.0,
            steps_since_report: 0,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Number of steps completed.
    pub fn steps_done(&self) -> usize {
        self.step
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// The word vectors, row `i` for word `i`.
    pub fn embeddings(&self) -> ArrayView2<'_, real> {
        self.store.input()
    }

    pub fn into_embeddings(self) -> Array2<real> {
        self.store.into_input()
    }

    /// Run one training step and return the batch loss.
    ///
    /// If the loss or any gradient entry is NaN or infinite, the parameters
    /// are left exactly as they were and [`Error::NonFinite`] is returned.
    pub fn step(&mut self) -> Result<real> {
        let step = self.step + 1;
        let pairs = self.windows.next_batch();
        let negatives = self.loss.draw_negatives(&mut self.noise, pairs.len());
        let (loss, grad) =
            self.loss
                .loss_and_gradient(&self.store, &self.noise, &pairs, &negatives)?;
        if !loss.is_finite() {
            return Err(Error::NonFinite {
                step,
                what: format!("loss ({loss})"),
            });
        }
        if !grad.is_finite() {
            return Err(Error::NonFinite {
                step,
                what: "gradient".to_string(),
            });
        }
        debug!(step, loss, grad_norm = grad.norm(), "step");

        self.sgd.step(&mut self.store, &grad);
        self.step = step;
        Ok(loss)
    }

    /// Nearest neighbors of each evaluation word under the current parameters.
    pub fn nearest_neighbors(&self) -> Result<Vec<Diagnostic>> {
        let evaluator = Evaluator::new(self.store.input());
        let results = evaluator.nearest_batch(self.settings.eval_query_ids(), EVAL_TOP_K)?;
        Ok(self
            .settings
            .eval_queries()
            .zip(results)
            .map(|((word, _), neighbors)| Diagnostic::Neighbors {
                step: self.step,
                query_word: word.to_string(),
                neighbors: neighbors
                    .iter()
                    .map(|n| self.vocabulary.word(n.id).to_string())
                    .collect(),
            })
            .collect())
    }

    /// Train until `total_steps` steps are done, passing every diagnostic
    /// record to `on_record` as it is produced.
    ///
    /// The first error stops the loop and is returned; the trainer is then
    /// [`TrainerState::Done`].
    pub fn run(&mut self, on_record: impl FnMut(Diagnostic)) -> Result<()> {
        self.run_with_progress(|_| {}, on_record)
    }

    /// [`run`](Self::run), also calling `on_step` with the step number after
    /// every completed step.
    pub fn run_with_progress(
        &mut self,
        mut on_step: impl FnMut(usize),
        mut on_record: impl FnMut(Diagnostic),
    ) -> Result<()> {
        let result = self.run_inner(&mut on_step, &mut on_record);
        self.state = TrainerState::Done;
        result
    }

    fn run_inner(
        &mut self,
        on_step: &mut impl FnMut(usize),
        on_record: &mut impl FnMut(Diagnostic),
    ) -> Result<()> {
        let config = self.settings.config().clone();
        self.state = TrainerState::Running;
        while self.step < config.total_steps {
            let loss = self.step()?;
            let step = self.step;
            self.loss_since_report += loss as f64;
            self.steps_since_report += 1;
            on_step(step);

            if config.display_step > 0 && step % config.display_step == 0 {
                let average_loss = self.loss_since_report / self.steps_since_report as f64;
                self.loss_since_report = 0.0;
                self.steps_since_report = 0;
                on_record(Diagnostic::Loss {
                    step,
                    loss,
                    average_loss: average_loss as real,
                });
            }

            let eval_due = step == 1 || (config.eval_step > 0 && step % config.eval_step == 0);
            if eval_due && !self.settings.eval_query_ids().is_empty() {
                self.state = TrainerState::Evaluating;
                for record in self.nearest_neighbors()? {
                    on_record(record);
                }
                self.state = TrainerState::Running;
            }
        }
        Ok(())
    }
}
