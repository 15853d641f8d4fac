//! Skip-gram word embeddings trained with noise-contrastive estimation.
//!
//! The pieces, leaves first: a [`WindowSampler`] turns a token-id stream into
//! (target, context) pairs; a [`NegativeSampler`] proposes noise classes;
//! [`NceLoss`] scores both against the parameters in an [`EmbeddingStore`]
//! and produces a [`SparseGradient`]; [`Sgd`] applies it. A [`Trainer`] runs
//! that loop and periodically asks an [`Evaluator`] for nearest neighbors.

pub mod cluster;
pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod logging;
pub mod nce;
pub mod noise;
pub mod optim;
pub mod store;
pub mod trainer;
pub mod vectors;
pub mod vocab;
pub mod window;

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

pub use config::{Settings, TrainingConfig};
pub use error::{Error, Result};
pub use eval::{Evaluator, Neighbor};
pub use nce::{NceLoss, SparseGradient};
pub use noise::{NegativeSampler, NoiseDistribution};
pub use optim::Sgd;
pub use store::{EmbeddingStore, Tensor};
pub use trainer::{Diagnostic, Trainer, TrainerState};
pub use vectors::{OutputFormat, Vectors};
pub use vocab::Vocabulary;
pub use window::{Pair, WindowSampler};
