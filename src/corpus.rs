//! Splitting raw text into words.

use std::io::{self, BufReader, Read};
use std::iter;

/// Longest word we keep, in bytes. Longer words are truncated.
pub const MAX_WORD_LEN: usize = 100;

/// Read words from `input`, treating space, tab and newline as word boundaries.
///
/// Carriage returns are dropped, so CRLF text reads the same as LF text.
/// Bytes that aren't valid UTF-8 are replaced rather than rejected.
pub fn read_words<R: Read>(input: R) -> impl Iterator<Item = io::Result<String>> {
    let mut bytes = BufReader::new(input).bytes().peekable();
    iter::from_fn(move || -> Option<io::Result<String>> {
        let mut word = Vec::<u8>::new();
        while let Some(res) = bytes.peek() {
            let ch = match res {
                Err(_) => {
                    return match bytes.next() {
                        Some(Err(err)) => Some(Err(err)),
                        _ => None,
                    }
                }
                Ok(ch) => *ch,
            };
            bytes.next();
            match ch {
                b'\r' => {}
                b' ' | b'\t' | b'\n' => {
                    if !word.is_empty() {
                        break;
                    }
                }
                _ => {
                    if word.len() < MAX_WORD_LEN {
                        word.push(ch);
                    }
                }
            }
        }
        if word.is_empty() {
            None
        } else {
            Some(Ok(String::from_utf8_lossy(&word).into_owned()))
        }
    })
}
