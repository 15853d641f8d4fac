//! Nearest-neighbor lookup by cosine similarity.

use std::cmp::Reverse;

use ndarray::prelude::*;
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::real;

pub fn norm(v: ArrayView1<'_, real>) -> real {
    v.dot(&v).sqrt()
}

/// Scale `v` to unit length. A zero vector is left alone.
pub fn normalize(mut v: ArrayViewMut1<'_, real>) {
    let len = norm(v.view());
    if len > 0.0 {
        v /= len;
    }
}

/// Cosine of the angle between `a` and `b`, or 0 if either is a zero vector.
pub fn cosine_similarity(a: ArrayView1<'_, real>, b: ArrayView1<'_, real>) -> real {
    assert_eq!(a.len(), b.len());
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        a.dot(&b) / (na * nb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub similarity: real,
}

/// Ranks vocabulary rows by cosine similarity.
///
/// Rows are normalized once, up front; every query after that is one
/// matrix-vector product against the normalized table. Build a new
/// `Evaluator` after training changes the embeddings.
#[derive(Debug, Clone)]
pub struct Evaluator {
    normalized: Array2<real>,
}

impl Evaluator {
    pub fn new(embeddings: ArrayView2<'_, real>) -> Self {
        let mut normalized = embeddings.to_owned();
        for row in normalized.rows_mut() {
            normalize(row);
        }
        Evaluator { normalized }
    }

    pub fn vocab_size(&self) -> usize {
        self.normalized.nrows()
    }

    fn check_id(&self, id: usize) -> Result<()> {
        if id >= self.vocab_size() {
            return Err(Error::InvalidArgument(format!(
                "id {id} out of range for vocabulary of {}",
                self.vocab_size()
            )));
        }
        Ok(())
    }

    /// Cosine similarity between the embeddings of two ids.
    pub fn similarity(&self, a: usize, b: usize) -> Result<real> {
        self.check_id(a)?;
        self.check_id(b)?;
        Ok(self.normalized.row(a).dot(&self.normalized.row(b)))
    }

    /// The `top_k` ids most similar to `query`, best first, never including
    /// `query` itself. Returns fewer than `top_k` only if the vocabulary is
    /// that small.
    pub fn nearest(&self, query: usize, top_k: usize) -> Result<Vec<Neighbor>> {
        self.check_id(query)?;
        Ok(self.rank(self.normalized.row(query), &[query], top_k))
    }

    /// [`nearest`](Self::nearest) for several queries at once.
    pub fn nearest_batch(&self, queries: &[usize], top_k: usize) -> Result<Vec<Vec<Neighbor>>> {
        for &q in queries {
            self.check_id(q)?;
        }
        Ok(queries
            .par_iter()
            .map(|&q| self.rank(self.normalized.row(q), &[q], top_k))
            .collect())
    }

    /// Rank every id against an arbitrary vector, skipping `exclude`.
    pub fn nearest_to_vector(
        &self,
        v: ArrayView1<'_, real>,
        exclude: &[usize],
        top_k: usize,
    ) -> Result<Vec<Neighbor>> {
        if v.len() != self.normalized.ncols() {
            return Err(Error::InvalidArgument(format!(
                "query vector has {} dimensions, embeddings have {}",
                v.len(),
                self.normalized.ncols()
            )));
        }
        let mut v = v.to_owned();
        normalize(v.view_mut());
        Ok(self.rank(v.view(), exclude, top_k))
    }

    fn rank(&self, unit_query: ArrayView1<'_, real>, exclude: &[usize], top_k: usize) -> Vec<Neighbor> {
        let sims = self.normalized.dot(&unit_query);
        let mut best: Vec<Neighbor> = sims
            .iter()
            .enumerate()
            .filter(|(id, _)| !exclude.contains(id))
            .map(|(id, &similarity)| Neighbor { id, similarity })
            .collect();
        best.sort_by_key(|n| (Reverse(OrderedFloat(n.similarity)), n.id));
        best.truncate(top_k);
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EmbeddingStore;

    #[test]
    fn self_similarity_is_one() {
        let store = EmbeddingStore::new(25, 16, 5).unwrap();
        let eval = Evaluator::new(store.input());
        for id in 0..25 {
            let s = eval.similarity(id, id).unwrap();
            assert!((s - 1.0).abs() < 1e-5, "similarity of {id} with itself = {s}");
            let direct = cosine_similarity(store.input_row(id), store.input_row(id));
            assert!((direct - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn nearest_excludes_query_and_is_sorted() {
        let store = EmbeddingStore::new(40, 8, 2).unwrap();
        let eval = Evaluator::new(store.input());
        for q in 0..40 {
            let result = eval.nearest(q, 10).unwrap();
            assert_eq!(result.len(), 10);
            assert!(result.iter().all(|n| n.id != q));
            for w in result.windows(2) {
                assert!(w[0].similarity >= w[1].similarity);
            }
            // The best answer really is the best.
            let best = (0..40)
                .filter(|&i| i != q)
                .map(|i| cosine_similarity(store.input_row(q), store.input_row(i)))
                .fold(real::MIN, real::max);
            assert!((result[0].similarity - best).abs() < 1e-5);
        }
    }

    #[test]
    fn hand_computed_ranking() {
        let m = array![
            [1.0, 0.0],
            [10.0, 1.0],
            [0.0, 3.0],
            [-1.0, 0.0],
            [1.0, 1.0]
        ];
        let eval = Evaluator::new(m.view());
        let ids: Vec<usize> = eval.nearest(0, 4).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 4, 2, 3]);
        let result = eval.nearest(0, 2).unwrap();
        assert!((result[1].similarity - 0.5f32.sqrt()).abs() < 1e-6);
        assert!((eval.similarity(0, 3).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn batch_matches_single_queries() {
        let store = EmbeddingStore::new(30, 6, 9).unwrap();
        let eval = Evaluator::new(store.input());
        let queries = [3, 0, 29, 3];
        let batch = eval.nearest_batch(&queries, 5).unwrap();
        assert_eq!(batch.len(), 4);
        for (q, result) in queries.iter().zip(&batch) {
            assert_eq!(result, &eval.nearest(*q, 5).unwrap());
        }
    }

    #[test]
    fn zero_rows_are_harmless() {
        let m = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let eval = Evaluator::new(m.view());
        assert_eq!(eval.similarity(0, 1).unwrap(), 0.0);
        assert_eq!(eval.similarity(0, 0).unwrap(), 0.0);
        let result = eval.nearest(0, 2).unwrap();
        assert!(result.iter().all(|n| n.similarity == 0.0));
        assert_eq!(result.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(eval.nearest(1, 5).unwrap()[0].id, 0);
        assert_eq!(cosine_similarity(m.row(0), m.row(1)), 0.0);
    }

    #[test]
    fn short_vocabulary_and_bad_ids() {
        let m = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let eval = Evaluator::new(m.view());
        assert_eq!(eval.nearest(2, 10).unwrap().len(), 2);
        assert!(matches!(eval.nearest(3, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            eval.nearest_batch(&[0, 7], 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(eval.similarity(0, 3).is_err());
        assert!(eval.nearest_to_vector(array![1.0].view(), &[], 1).is_err());
    }

    #[test]
    fn nearest_to_summed_vector() {
        let m = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [-1.0, -1.0]];
        let eval = Evaluator::new(m.view());
        let sum = &m.row(0) + &m.row(1);
        let result = eval.nearest_to_vector(sum.view(), &[0, 1], 3).unwrap();
        assert_eq!(result[0].id, 2);
        assert!((result[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(result[1].id, 3);
    }
}
