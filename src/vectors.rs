//! Writing trained word vectors to disk and reading them back.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::eval::normalize;
use crate::real;
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `V D` header, then one line per word: the word and D decimal numbers.
    Text,
    /// `V D` header, then per word: the word, a space, D native-endian `f32`s, a newline.
    Binary,
    /// A bincode image of [`SavedModel`].
    Bincode,
}

/// Everything needed to look words up again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedModel {
    pub words: Vec<String>,
    pub size: usize,
    /// `embeddings[k * size..(k + 1) * size]` is the vector for word `k`.
    pub embeddings: Vec<real>,
}

fn format_error(message: impl Into<String>) -> Error {
    Error::Format(message.into())
}

/// Save `matrix`, one row per vocabulary entry.
pub fn save(
    path: &Path,
    vocabulary: &Vocabulary,
    matrix: ArrayView2<'_, real>,
    format: OutputFormat,
) -> Result<()> {
    let (num_words, size) = matrix.dim();
    if num_words != vocabulary.len() {
        return Err(Error::InvalidArgument(format!(
            "matrix has {num_words} rows but the vocabulary has {} words",
            vocabulary.len()
        )));
    }

    let mut fo = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Bincode => {
            let model = SavedModel {
                words: vocabulary.words().to_vec(),
                size,
                embeddings: matrix.iter().copied().collect(),
            };
            bincode::serialize_into(&mut fo, &model)
                .map_err(|err| format_error(format!("error encoding model: {err}")))?;
        }
        OutputFormat::Text | OutputFormat::Binary => {
            writeln!(fo, "{num_words} {size}")?;
            for (word, row) in vocabulary.words().iter().zip(matrix.rows()) {
                write!(fo, "{word} ")?;
                if format == OutputFormat::Binary {
                    let row = row.to_vec();
                    fo.write_all(bytemuck::cast_slice::<real, u8>(&row))?;
                } else {
                    for x in row {
                        write!(fo, "{x} ")?;
                    }
                }
                writeln!(fo)?;
            }
        }
    }
    fo.flush()?;
    Ok(())
}

/// Word vectors loaded from disk, each normalized to unit length.
pub struct Vectors {
    vocab: Vec<String>,
    embeddings: Array2<real>,
}

impl Vectors {
    /// Read a file in [`OutputFormat::Binary`].
    pub fn load(file_name: &Path) -> Result<Self> {
        let mut f = BufReader::new(File::open(file_name)?);
        let mut line = String::new();
        f.read_line(&mut line)?;
        let mut fields = line.split_whitespace();
        let mut header_field = |what: &str| -> Result<usize> {
            fields
                .next()
                .ok_or_else(|| format_error(format!("missing {what} in header")))?
                .parse()
                .map_err(|_| format_error(format!("invalid {what} in header")))
        };
        let num_words = header_field("word count")?;
        let size = header_field("vector size")?;

        let mut vocab: Vec<String> = Vec::with_capacity(num_words);
        let mut m = Array2::<real>::zeros((num_words, size));
        for mut row in m.rows_mut() {
            let mut vocab_word = Vec::<u8>::new();
            let count = f.read_until(b' ', &mut vocab_word)?;
            if count == 0 {
                return Err(format_error(format!(
                    "expected {num_words} words, found {}",
                    vocab.len()
                )));
            }
            if vocab_word.last() == Some(&b' ') {
                vocab_word.pop();
            }
            vocab_word.retain(|c| *c != b'\n');
            let word = String::from_utf8(vocab_word)
                .map_err(|_| format_error(format!("word {} is not UTF-8", vocab.len())))?;
            vocab.push(word);

            let mut buf = vec![0.0 as real; size];
            f.read_exact(bytemuck::cast_slice_mut::<real, u8>(&mut buf))?;
            row.assign(&ArrayView1::from(&buf[..]));
            normalize(row);
        }

        Ok(Vectors {
            vocab,
            embeddings: m,
        })
    }

    /// Read a file in [`OutputFormat::Bincode`].
    pub fn load_bincode(file_name: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_name)?);
        let model: SavedModel = bincode::deserialize_from(f)
            .map_err(|err| format_error(format!("error decoding model: {err}")))?;
        let shape = (model.words.len(), model.size);
        let mut embeddings = Array2::from_shape_vec(shape, model.embeddings)
            .map_err(|err| format_error(format!("embedding table has the wrong size: {err}")))?;
        for row in embeddings.rows_mut() {
            normalize(row);
        }
        Ok(Vectors {
            vocab: model.words,
            embeddings,
        })
    }

    pub fn num_words(&self) -> usize {
        self.vocab.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn embeddings(&self) -> ArrayView2<'_, real> {
        self.embeddings.view()
    }

    /// Get the index for a word as string. Exact match only, case-sensitive.
    pub fn lookup_word(&self, word: &str) -> Option<usize> {
        self.vocab.iter().position(|v| v == word)
    }

    /// Get the word for a word-index. Panics if `word` is out of range.
    pub fn word(&self, word: usize) -> &str {
        &self.vocab[word]
    }

    /// The unit-length vector for a word-index. Panics if `word` is out of range.
    pub fn vector(&self, word: usize) -> ArrayView1<'_, real> {
        self.embeddings.row(word)
    }
}
