//! K-means over word vectors, for writing word classes instead of vectors.

use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::eval::normalize;
use crate::real;

/// Assign each row of `matrix` to one of `classes` clusters.
///
/// Rows start out dealt round-robin into classes. Each iteration recomputes
/// every class center, normalizes it to length 1, and moves each row to the
/// class whose center has the largest dot product with it. Ties go to the
/// lower class number.
pub fn kmeans(matrix: ArrayView2<'_, real>, classes: usize, iterations: usize) -> Result<Vec<usize>> {
    if classes == 0 {
        return Err(Error::InvalidArgument("number of classes must be positive".to_string()));
    }
    let (num_words, size) = matrix.dim();
    let mut cl: Vec<usize> = (0..num_words).map(|a| a % classes).collect();
    let mut cent = Array2::<real>::zeros((classes, size));
    let mut centcn = vec![0usize; classes];

    for _ in 0..iterations {
        cent.fill(0.0);
        // Counts start at 1 so an empty class divides by 1, not 0.
        centcn.fill(1);
        for (row, &c) in matrix.rows().into_iter().zip(&cl) {
            cent.row_mut(c).scaled_add(1.0, &row);
            centcn[c] += 1;
        }
        for (mut center, &n) in cent.rows_mut().into_iter().zip(&centcn) {
            center /= n as real;
            normalize(center);
        }

        let scores = matrix.dot(&cent.t());
        for (assignment, row_scores) in cl.iter_mut().zip(scores.rows()) {
            let mut closev = real::NEG_INFINITY;
            let mut closeid = 0;
            for (d, &x) in row_scores.iter().enumerate() {
                if x > closev {
                    closev = x;
                    closeid = d;
                }
            }
            *assignment = closeid;
        }
    }
    Ok(cl)
}
