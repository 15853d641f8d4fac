//! Turning a token stream into skip-gram training pairs.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{config_error, Result};

/// One skip-gram training example: predict `context` given `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub target: usize,
    pub context: usize,
}

/// Slides a window of `2 * skip_window + 1` tokens over a token stream,
/// emitting `num_skips` (center, neighbor) pairs per window position.
///
/// Each sampler owns its cursor and random state; any number of them can
/// walk the same stream independently.
#[derive(Debug)]
pub struct WindowSampler<'a> {
    tokens: &'a [usize],
    batch_size: usize,
    num_skips: usize,
    skip_window: usize,
    /// Index of the first token of the next batch's first window.
    cursor: usize,
    /// Positions within the window other than the center, `0..span` minus `skip_window`.
    context_offsets: Vec<usize>,
    rng: StdRng,
}

impl<'a> WindowSampler<'a> {
    pub fn new(
        tokens: &'a [usize],
        batch_size: usize,
        num_skips: usize,
        skip_window: usize,
        seed: u64,
    ) -> Result<Self> {
        if skip_window == 0 {
            return Err(config_error("skip_window must be positive"));
        }
        if num_skips == 0 || num_skips > 2 * skip_window {
            return Err(config_error(format!(
                "num_skips must be between 1 and 2 * skip_window = {}, got {num_skips}",
                2 * skip_window
            )));
        }
        if batch_size == 0 || batch_size % num_skips != 0 {
            return Err(config_error(format!(
                "batch_size ({batch_size}) must be a positive multiple of num_skips ({num_skips})"
            )));
        }
        let span = 2 * skip_window + 1;
        if tokens.len() < span {
            return Err(config_error(format!(
                "token stream has {} tokens, fewer than the window span {span}",
                tokens.len()
            )));
        }

        Ok(WindowSampler {
            tokens,
            batch_size,
            num_skips,
            skip_window,
            cursor: 0,
            context_offsets: (0..span).filter(|&i| i != skip_window).collect(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Number of tokens in one window.
    pub fn span(&self) -> usize {
        2 * self.skip_window + 1
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Produce the next `batch_size` pairs.
    pub fn next_batch(&mut self) -> Vec<Pair> {
        let n = self.tokens.len();
        let span = self.span();
        let mut batch = Vec::with_capacity(self.batch_size);

        let mut pos = self.cursor;
        if pos + span > n {
            pos = 0;
        }
        let mut buffer: VecDeque<usize> = self.tokens[pos..pos + span].iter().copied().collect();
        pos += span;

        for _ in 0..self.batch_size / self.num_skips {
            let center = buffer[self.skip_window];
            for &offset in self
                .context_offsets
                .choose_multiple(&mut self.rng, self.num_skips)
            {
                batch.push(Pair {
                    target: center,
                    context: buffer[offset],
                });
            }

            if pos == n {
                // Start over at the beginning rather than reading past the end.
                buffer.clear();
                buffer.extend(&self.tokens[..span]);
                pos = span;
            } else {
                buffer.pop_front();
                buffer.push_back(self.tokens[pos]);
                pos += 1;
            }
        }

        // Back up so the next batch starts with the window we just slid onto.
        self.cursor = (pos + n - span) % n;
        batch
    }
}
