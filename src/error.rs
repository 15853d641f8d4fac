use std::io;

use thiserror::Error;

/// Everything that can go wrong while configuring, training, or querying a model.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration was rejected before any training state was created.
    #[error("configuration error: {0}")]
    Config(String),

    /// An evaluation word isn't in the vocabulary.
    #[error("word {0:?} is not in the vocabulary")]
    UnknownWord(String),

    /// A caller passed an id or argument outside the documented range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Training produced NaN or infinity. The update for `step` was not applied.
    #[error("training diverged at step {step}: non-finite {what}")]
    NonFinite { step: usize, what: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A model or vocabulary file is malformed.
    #[error("invalid file format: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn config_error(message: impl Into<String>) -> Error {
    Error::Config(message.into())
}
