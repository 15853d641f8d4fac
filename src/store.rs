//! The trained parameters: input and output embeddings plus output biases.

use ndarray::prelude::*;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{config_error, Error, Result};
use crate::real;

/// Names one of the three trained tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tensor {
    /// `V × D` word embeddings; row `i` is the vector for word `i`.
    Input,
    /// `V × D` classifier weights, one row per output class.
    Output,
    /// Length-`V` classifier biases.
    Bias,
}

/// The model parameters.
///
/// Shapes are fixed at construction: every tensor has exactly
/// `vocab_size` rows, and the matrices have `embedding_size` columns.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    input: Array2<real>,
    output: Array2<real>,
    bias: Array1<real>,
}

impl EmbeddingStore {
    /// Random initial parameters: input rows uniform on `[-1, 1)`, output
    /// rows normal with standard deviation `1/√D`, biases zero.
    pub fn new(vocab_size: usize, embedding_size: usize, seed: u64) -> Result<Self> {
        if vocab_size == 0 || embedding_size == 0 {
            return Err(config_error(format!(
                "vocabulary_size and embedding_size must be positive, got {vocab_size} and {embedding_size}"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let stddev = 1.0 / (embedding_size as real).sqrt();
        let normal = Normal::new(0.0, stddev)
            .map_err(|err| config_error(format!("bad initialization scale: {err}")))?;
        Ok(EmbeddingStore {
            input: Array::random_using(
                (vocab_size, embedding_size),
                Uniform::new(-1.0, 1.0),
                &mut rng,
            ),
            output: Array::random_using((vocab_size, embedding_size), normal, &mut rng),
            bias: Array1::zeros(vocab_size),
        })
    }

    /// Build a store from existing tensors.
    pub fn from_parts(input: Array2<real>, output: Array2<real>, bias: Array1<real>) -> Result<Self> {
        let (v, d) = input.dim();
        if v == 0 || d == 0 {
            return Err(config_error("parameter tensors must not be empty"));
        }
        if output.dim() != (v, d) || bias.len() != v {
            return Err(config_error(format!(
                "parameter shapes disagree: input {:?}, output {:?}, bias {}",
                input.dim(),
                output.dim(),
                bias.len()
            )));
        }
        Ok(EmbeddingStore { input, output, bias })
    }

    pub fn vocab_size(&self) -> usize {
        self.input.nrows()
    }

    pub fn embedding_size(&self) -> usize {
        self.input.ncols()
    }

    pub fn input(&self) -> ArrayView2<'_, real> {
        self.input.view()
    }

    pub fn output(&self) -> ArrayView2<'_, real> {
        self.output.view()
    }

    pub fn bias(&self) -> ArrayView1<'_, real> {
        self.bias.view()
    }

    /// The embedding of word `id`. Panics if `id` is out of range.
    pub fn input_row(&self, id: usize) -> ArrayView1<'_, real> {
        self.input.row(id)
    }

    pub fn output_row(&self, id: usize) -> ArrayView1<'_, real> {
        self.output.row(id)
    }

    /// Gather input embeddings for several ids into one `ids.len() × D` matrix.
    pub fn input_rows(&self, ids: &[usize]) -> Array2<real> {
        self.input.select(Axis(0), ids)
    }

    /// Add `delta` to row `row` of `tensor`. For [`Tensor::Bias`], `delta`
    /// must have length 1.
    pub fn add_to_row(&mut self, tensor: Tensor, row: usize, delta: ArrayView1<'_, real>) -> Result<()> {
        if row >= self.vocab_size() {
            return Err(Error::InvalidArgument(format!(
                "row {row} out of range for vocabulary of {}",
                self.vocab_size()
            )));
        }
        let expected = match tensor {
            Tensor::Bias => 1,
            _ => self.embedding_size(),
        };
        if delta.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "{tensor:?} update has length {}, expected {expected}",
                delta.len()
            )));
        }
        match tensor {
            Tensor::Input => self.input.row_mut(row).scaled_add(1.0, &delta),
            Tensor::Output => self.output.row_mut(row).scaled_add(1.0, &delta),
            Tensor::Bias => self.bias[row] += delta[0],
        }
        Ok(())
    }

    pub(crate) fn input_row_mut(&mut self, id: usize) -> ArrayViewMut1<'_, real> {
        self.input.row_mut(id)
    }

    pub(crate) fn output_row_mut(&mut self, id: usize) -> ArrayViewMut1<'_, real> {
        self.output.row_mut(id)
    }

    pub(crate) fn bias_mut(&mut self, id: usize) -> &mut real {
        &mut self.bias[id]
    }

    /// Consume the store, keeping only the word embeddings.
    pub fn into_input(self) -> Array2<real> {
        self.input
    }
}
