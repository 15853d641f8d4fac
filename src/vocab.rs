//! The id ↔ word mapping.
//!
//! Ids are assigned by descending frequency. Id 0 is reserved for [`UNK`],
//! which stands for every word that didn't make the cut.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{config_error, Error, Result};

/// The out-of-vocabulary sentinel, always id 0.
pub const UNK: &str = "UNK";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Count `words` and keep at most `max_size - 1` of the most frequent
    /// ones that occur at least `min_count` times. Ties are broken by
    /// comparing the words, so the result doesn't depend on hash order.
    pub fn build<I, S>(words: I, max_size: usize, min_count: u64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if max_size < 2 {
            return Err(config_error(
                "vocabulary size must be at least 2 (UNK plus one word)",
            ));
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        for word in words {
            let word = word.as_ref();
            match counts.get_mut(word) {
                Some(n) => *n += 1,
                None => {
                    counts.insert(word.to_string(), 1);
                }
            }
        }
        let mut unk_count = counts.remove(UNK).unwrap_or(0);

        let mut sorted: Vec<(String, u64)> = counts.into_iter().collect();
        sorted.sort_by(|(wa, ca), (wb, cb)| cb.cmp(ca).then_with(|| wa.cmp(wb)));

        let mut vocab = Vocabulary::with_unk();
        for (word, count) in sorted {
            if vocab.len() < max_size && count >= min_count {
                vocab.push(word, count);
            } else {
                unk_count += count;
            }
        }
        vocab.counts[0] = unk_count;
        Ok(vocab)
    }

    fn with_unk() -> Self {
        let mut vocab = Vocabulary {
            words: vec![],
            counts: vec![],
            index: HashMap::new(),
        };
        vocab.push(UNK.to_string(), 0);
        vocab
    }

    fn push(&mut self, word: String, count: u64) {
        self.index.insert(word.clone(), self.words.len());
        self.words.push(word);
        self.counts.push(count);
    }

    /// Map a sequence of words to ids. Unknown words become 0.
    pub fn encode<I, S>(&self, words: I) -> Vec<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        words
            .into_iter()
            .map(|w| self.id(w.as_ref()).unwrap_or(0))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the id of a word. Exact match only, case-sensitive.
    pub fn id(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Get the word for an id. Panics if `id` is out of range.
    pub fn word(&self, id: usize) -> &str {
        &self.words[id]
    }

    pub fn count(&self, id: usize) -> u64 {
        self.counts[id]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Write one `word count` line per entry, in id order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (word, count) in self.words.iter().zip(&self.counts) {
            writeln!(out, "{word} {count}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read a file written by [`Vocabulary::save`].
    ///
    /// The first line must be the `UNK` entry. Ids follow line order.
    pub fn load(path: &Path) -> Result<Self> {
        let input = BufReader::new(File::open(path)?);
        let mut vocab = Vocabulary {
            words: vec![],
            counts: vec![],
            index: HashMap::new(),
        };
        for (line_num, line) in input.lines().enumerate() {
            let line = line?;
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            if fields.len() != 2 {
                return Err(Error::Format(format!(
                    "vocabulary file syntax error on line {}",
                    line_num + 1
                )));
            }
            let count = fields[1].parse::<u64>().map_err(|_| {
                Error::Format(format!(
                    "unrecognized frequency number format on line {}",
                    line_num + 1
                ))
            })?;
            if vocab.index.contains_key(fields[0]) {
                return Err(Error::Format(format!(
                    "duplicate word {:?} on line {}",
                    fields[0],
                    line_num + 1
                )));
            }
            vocab.push(fields[0].to_string(), count);
        }
        if vocab.words.first().map(String::as_str) != Some(UNK) {
            return Err(Error::Format(format!(
                "vocabulary file must start with {UNK}"
            )));
        }
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_by_descending_frequency() {
        let text = "a b b c c c d d d d";
        let vocab = Vocabulary::build(text.split(' '), 10, 1).unwrap();
        assert_eq!(vocab.words(), &["UNK", "d", "c", "b", "a"]);
        assert_eq!(vocab.counts(), &[0, 4, 3, 2, 1]);
        assert_eq!(vocab.id("c"), Some(2));
        assert_eq!(vocab.word(1), "d");
    }

    #[test]
    fn rare_words_fold_into_unk() {
        let text = "a b b c c c d d d d";
        let vocab = Vocabulary::build(text.split(' '), 3, 1).unwrap();
        assert_eq!(vocab.words(), &["UNK", "d", "c"]);
        assert_eq!(vocab.count(0), 3);
        assert_eq!(vocab.encode(["d", "a", "zzz", "c"]), vec![1, 0, 0, 2]);

        let vocab = Vocabulary::build(text.split(' '), 10, 3).unwrap();
        assert_eq!(vocab.words(), &["UNK", "d", "c"]);
    }

    #[test]
    fn ties_break_by_word() {
        let vocab = Vocabulary::build(["y", "x", "z", "x", "y", "z"], 10, 1).unwrap();
        assert_eq!(vocab.words(), &["UNK", "x", "y", "z"]);
    }

    #[test]
    fn too_small() {
        assert!(matches!(
            Vocabulary::build(["a"], 1, 1),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        let vocab = Vocabulary::build("one two two three three three".split(' '), 10, 1).unwrap();
        vocab.save(&path).unwrap();
        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.words(), vocab.words());
        assert_eq!(loaded.counts(), vocab.counts());
        assert_eq!(loaded.id("two"), Some(2));
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "UNK 0\nword\n").unwrap();
        assert!(matches!(Vocabulary::load(&path), Err(Error::Format(_))));
        std::fs::write(&path, "word 3\n").unwrap();
        assert!(matches!(Vocabulary::load(&path), Err(Error::Format(_))));
    }
}
